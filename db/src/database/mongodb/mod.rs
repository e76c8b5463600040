mod friend;

pub(crate) use friend::MongoFriend;
