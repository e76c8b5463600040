pub(crate) mod friend_handlers;
