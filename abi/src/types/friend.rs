use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// friend link as stored in mongodb
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Friend {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub avatar: String,
    pub name: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub position: i32,
    pub location: String,
    pub is_approved: bool,
}

/// client-safe shape: the database id becomes an opaque hex string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendView {
    pub id: String,
    pub avatar: String,
    pub name: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub position: i32,
    pub location: String,
    pub is_approved: bool,
}

impl From<Friend> for FriendView {
    fn from(f: Friend) -> Self {
        Self {
            id: f.id.map(|id| id.to_hex()).unwrap_or_default(),
            avatar: f.avatar,
            name: f.name,
            title: f.title,
            description: f.description,
            link: f.link,
            position: f.position,
            location: f.location,
            is_approved: f.is_approved,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendCreate {
    pub avatar: String,
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub link: String,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub is_approved: bool,
}

impl From<FriendCreate> for Friend {
    fn from(c: FriendCreate) -> Self {
        Self {
            id: None,
            avatar: c.avatar,
            name: c.name,
            title: c.title,
            description: c.description,
            link: c.link,
            position: c.position,
            location: c.location,
            is_approved: c.is_approved,
        }
    }
}

/// partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FriendUpdate {
    pub avatar: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub position: Option<i32>,
    pub location: Option<String>,
    pub is_approved: Option<bool>,
}

impl FriendUpdate {
    pub fn is_empty(&self) -> bool {
        self.avatar.is_none()
            && self.name.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.link.is_none()
            && self.position.is_none()
            && self.location.is_none()
            && self.is_approved.is_none()
    }
}

/// `{success, friends}` list envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendsResponse {
    pub success: bool,
    pub friends: Vec<FriendView>,
}

/// `{success, friend}` single-entity envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendResponse {
    pub success: bool,
    pub friend: FriendView,
}
