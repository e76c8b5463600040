use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::{Client, Collection, Database};
use tracing::debug;

use abi::config::Config;
use abi::errors::Error;
use abi::types::{Friend, FriendCreate, FriendUpdate, ObjectId};

use crate::database::friend::FriendRepo;

const COLL_FRIEND: &str = "friends";

pub(crate) struct MongoFriend {
    coll: Collection<Friend>,
}

impl MongoFriend {
    pub fn new(db: Database) -> Self {
        Self {
            coll: db.collection(COLL_FRIEND),
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self, Error> {
        let db = Client::with_uri_str(config.db.url())
            .await?
            .database(&config.db.database);
        Ok(Self::new(db))
    }
}

fn set_doc(update: &FriendUpdate) -> Result<Document, Error> {
    let mut set = Document::new();
    if let Some(v) = &update.avatar {
        set.insert("avatar", v.as_str());
    }
    if let Some(v) = &update.name {
        set.insert("name", v.as_str());
    }
    if let Some(v) = &update.title {
        set.insert("title", v.as_str());
    }
    if let Some(v) = &update.description {
        set.insert("description", v.as_str());
    }
    if let Some(v) = &update.link {
        set.insert("link", v.as_str());
    }
    if let Some(v) = update.position {
        set.insert("position", v);
    }
    if let Some(v) = &update.location {
        set.insert("location", v.as_str());
    }
    if let Some(v) = update.is_approved {
        set.insert("is_approved", v);
    }
    if set.is_empty() {
        return Err(Error::bad_request("nothing to update"));
    }
    Ok(set)
}

#[async_trait]
impl FriendRepo for MongoFriend {
    async fn create(&self, friend: FriendCreate) -> Result<Friend, Error> {
        if self
            .coll
            .find_one(doc! {"link": friend.link.as_str()}, None)
            .await?
            .is_some()
        {
            return Err(Error::conflict(format!(
                "friend link already exists: {}",
                friend.link
            )));
        }

        let mut friend = Friend::from(friend);
        let result = self.coll.insert_one(&friend, None).await?;
        friend.id = result.inserted_id.as_object_id();
        debug!("created friend: {:?}", friend.id);
        Ok(friend)
    }

    async fn get(&self, id: &ObjectId) -> Result<Option<Friend>, Error> {
        Ok(self.coll.find_one(doc! {"_id": *id}, None).await?)
    }

    async fn get_all(&self) -> Result<Vec<Friend>, Error> {
        let options = FindOptions::builder()
            .sort(doc! {"position": 1})
            .build();
        let cursor = self.coll.find(None, Some(options)).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update(&self, id: &ObjectId, update: FriendUpdate) -> Result<Friend, Error> {
        let set = set_doc(&update)?;
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.coll
            .find_one_and_update(doc! {"_id": *id}, doc! {"$set": set}, options)
            .await?
            .ok_or_else(|| Error::not_found_with_details(format!("friend not found: {id}")))
    }

    async fn delete(&self, id: &ObjectId) -> Result<(), Error> {
        let result = self.coll.delete_one(doc! {"_id": *id}, None).await?;
        if result.deleted_count == 0 {
            return Err(Error::not_found_with_details(format!(
                "friend not found: {id}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_doc_skips_absent_fields() {
        let update = FriendUpdate {
            name: Some("bob".into()),
            position: Some(3),
            ..Default::default()
        };
        let set = set_doc(&update).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get_str("name").unwrap(), "bob");
        assert_eq!(set.get_i32("position").unwrap(), 3);
        assert!(set.get("avatar").is_none());
    }

    #[test]
    fn set_doc_rejects_empty_update() {
        assert!(set_doc(&FriendUpdate::default()).is_err());
    }
}
