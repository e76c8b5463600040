pub(crate) mod friend;
mod mongodb;

use std::sync::Arc;

use abi::config::Config;
use abi::errors::Error;

use crate::database::friend::FriendRepo;

/// holds one repo per entity; the driver keeps a process-wide pool
/// behind the client handle
pub struct DbRepo {
    pub friend: Arc<dyn FriendRepo>,
}

impl DbRepo {
    pub async fn new(config: &Config) -> Result<Self, Error> {
        let friend = Arc::new(mongodb::MongoFriend::from_config(config).await?);
        Ok(Self { friend })
    }
}
