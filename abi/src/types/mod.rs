mod friend;

pub use friend::*;

use chrono::Utc;
use serde::{Deserialize, Serialize};

pub use mongodb::bson::oid::ObjectId;

use crate::errors::Error;

/// the uniform envelope every api response is wrapped in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// set on failures only, mirroring the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: i64,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 20000,
            success: true,
            message: String::from("ok"),
            data: Some(data),
            error: None,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn err(code: i32, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            code,
            success: false,
            message: message.clone(),
            data: None,
            error: Some(message),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

pub fn parse_object_id(id: &str) -> Result<ObjectId, Error> {
    ObjectId::parse_str(id).map_err(|_| Error::bad_request(format!("invalid id: {id}")))
}
