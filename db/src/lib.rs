mod database;

pub use database::friend::FriendRepo;
pub use database::DbRepo;
