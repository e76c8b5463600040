use async_trait::async_trait;

use abi::errors::Error;
use abi::types::{Friend, FriendCreate, FriendUpdate, ObjectId};

#[async_trait]
pub trait FriendRepo: Send + Sync {
    /// create a friend link; the database assigns the id.
    /// a link that already exists is a conflict
    async fn create(&self, friend: FriendCreate) -> Result<Friend, Error>;

    async fn get(&self, id: &ObjectId) -> Result<Option<Friend>, Error>;

    /// full list ordered by position
    async fn get_all(&self) -> Result<Vec<Friend>, Error>;

    /// partial update; returns the document after the update
    async fn update(&self, id: &ObjectId, update: FriendUpdate) -> Result<Friend, Error>;

    async fn delete(&self, id: &ObjectId) -> Result<(), Error>;
}
