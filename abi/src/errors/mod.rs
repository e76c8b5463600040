use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;
use tracing::error;

use crate::types::ApiResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    BadRequest,
    UnAuthorized,
    Forbidden,
    NotFound,
    Conflict,
    TooManyRequests,
    InternalServer,
    DbError,
    OSSError,
    ConfigReadError,
    ConfigParseError,
    ParseError,
    BodyParsing,
    PathParsing,
    IOError,
    ReqwestError,
    Canceled,
    UnknownError,
}

impl ErrorKind {
    /// business code carried in the response envelope
    pub fn code(&self) -> i32 {
        match self {
            ErrorKind::BadRequest => 40000,
            ErrorKind::BodyParsing => 40001,
            ErrorKind::PathParsing => 40002,
            ErrorKind::UnAuthorized => 40100,
            ErrorKind::Forbidden => 40300,
            ErrorKind::NotFound => 40400,
            ErrorKind::Conflict => 40900,
            ErrorKind::TooManyRequests => 42900,
            ErrorKind::Canceled => 49900,
            ErrorKind::InternalServer
            | ErrorKind::DbError
            | ErrorKind::OSSError
            | ErrorKind::ConfigReadError
            | ErrorKind::ConfigParseError
            | ErrorKind::ParseError
            | ErrorKind::IOError
            | ErrorKind::ReqwestError
            | ErrorKind::UnknownError => 50000,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::BadRequest | ErrorKind::BodyParsing | ErrorKind::PathParsing => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::UnAuthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            // a canceled request never reaches the wire; treat it as client closed
            ErrorKind::Canceled => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// reverse lookup used by the client wrapper when it rebuilds an error
    /// from an envelope it received
    pub fn from_code(code: i32) -> Self {
        match code {
            40000 => ErrorKind::BadRequest,
            40001 => ErrorKind::BodyParsing,
            40002 => ErrorKind::PathParsing,
            40100 => ErrorKind::UnAuthorized,
            40300 => ErrorKind::Forbidden,
            40400 => ErrorKind::NotFound,
            40900 => ErrorKind::Conflict,
            42900 => ErrorKind::TooManyRequests,
            49900 => ErrorKind::Canceled,
            50000 => ErrorKind::InternalServer,
            _ => ErrorKind::UnknownError,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Error {
    kind: ErrorKind,
    details: Option<String>,
    #[serde(skip)]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    #[inline]
    pub fn new(
        kind: ErrorKind,
        details: impl Into<String>,
        source: impl StdError + 'static + Send + Sync,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
            details: Some(details.into()),
        }
    }

    #[inline]
    pub fn with_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            source: None,
            details: None,
        }
    }

    #[inline]
    pub fn with_details(kind: ErrorKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            source: None,
            details: Some(details.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    #[inline]
    pub fn bad_request(details: impl Into<String>) -> Self {
        Self::with_details(ErrorKind::BadRequest, details)
    }

    #[inline]
    pub fn unauthorized(details: impl Into<String>) -> Self {
        Self::with_details(ErrorKind::UnAuthorized, details)
    }

    #[inline]
    pub fn forbidden(details: impl Into<String>) -> Self {
        Self::with_details(ErrorKind::Forbidden, details)
    }

    #[inline]
    pub fn not_found() -> Self {
        Self::with_kind(ErrorKind::NotFound)
    }

    #[inline]
    pub fn not_found_with_details(details: impl Into<String>) -> Self {
        Self::with_details(ErrorKind::NotFound, details)
    }

    #[inline]
    pub fn conflict(details: impl Into<String>) -> Self {
        Self::with_details(ErrorKind::Conflict, details)
    }

    #[inline]
    pub fn too_many_requests(details: impl Into<String>) -> Self {
        Self::with_details(ErrorKind::TooManyRequests, details)
    }

    #[inline]
    pub fn internal(error: impl StdError + 'static + Send + Sync) -> Self {
        Self {
            kind: ErrorKind::InternalServer,
            details: Some(error.to_string()),
            source: Some(Box::new(error)),
        }
    }

    #[inline]
    pub fn internal_with_details(details: impl Into<String>) -> Self {
        Self::with_details(ErrorKind::InternalServer, details)
    }

    #[inline]
    pub fn oss(details: impl Into<String>) -> Self {
        Self::with_details(ErrorKind::OSSError, details)
    }

    #[inline]
    pub fn db(details: impl Into<String>) -> Self {
        Self::with_details(ErrorKind::DbError, details)
    }

    #[inline]
    pub fn config_read() -> Self {
        Self::with_kind(ErrorKind::ConfigReadError)
    }

    #[inline]
    pub fn config_parse(details: impl Into<String>) -> Self {
        Self::with_details(ErrorKind::ConfigParseError, details)
    }

    #[inline]
    pub fn parse(details: impl Into<String>) -> Self {
        Self::with_details(ErrorKind::ParseError, details)
    }

    #[inline]
    pub fn body_parsing(details: impl Into<String>) -> Self {
        Self::with_details(ErrorKind::BodyParsing, details)
    }

    #[inline]
    pub fn path_parsing(err: impl StdError + 'static + Send + Sync) -> Self {
        Self::new(ErrorKind::PathParsing, err.to_string(), err)
    }

    #[inline]
    pub fn canceled() -> Self {
        Self::with_kind(ErrorKind::Canceled)
    }

    pub fn is_canceled(&self) -> bool {
        self.kind == ErrorKind::Canceled
    }

    /// last-resort classification of an error that escaped the typed
    /// constructors: inspect the message and bucket it by status.
    /// a heuristic, not a type-safe mapping.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let kind = if lower.contains("duplicate key") || lower.contains("e11000") {
            ErrorKind::Conflict
        } else if lower.contains("not found") {
            ErrorKind::NotFound
        } else if lower.contains("unauthorized") || lower.contains("invalid token") {
            ErrorKind::UnAuthorized
        } else if lower.contains("forbidden") {
            ErrorKind::Forbidden
        } else if lower.contains("too many requests") || lower.contains("rate limit") {
            ErrorKind::TooManyRequests
        } else if lower.contains("validation")
            || lower.contains("parse")
            || lower.contains("bad request")
        {
            ErrorKind::BadRequest
        } else {
            ErrorKind::InternalServer
        };
        Self::with_details(kind, message)
    }

    /// classify a foreign error by its message and keep it as the source
    pub fn classify_with_source(source: impl StdError + 'static + Send + Sync) -> Self {
        let mut error = Self::classify(source.to_string());
        error.source = Some(Box::new(source));
        error
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{:?}: {}", self.kind, details),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::new(ErrorKind::IOError, value.to_string(), value)
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Self::new(ErrorKind::ReqwestError, value.to_string(), value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::new(ErrorKind::ParseError, value.to_string(), value)
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(value: mongodb::error::Error) -> Self {
        // the driver reports duplicate keys and friends in prose only,
        // so bucket by message
        Self::classify_with_source(value)
    }
}

impl From<mongodb::bson::ser::Error> for Error {
    fn from(value: mongodb::bson::ser::Error) -> Self {
        Self::new(ErrorKind::ParseError, value.to_string(), value)
    }
}

impl From<mongodb::bson::de::Error> for Error {
    fn from(value: mongodb::bson::de::Error) -> Self {
        Self::new(ErrorKind::ParseError, value.to_string(), value)
    }
}

impl From<mongodb::bson::oid::Error> for Error {
    fn from(value: mongodb::bson::oid::Error) -> Self {
        Self::new(ErrorKind::BadRequest, value.to_string(), value)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        error!("http request api error: {}", self);
        let status = self.status();
        let message = self
            .details
            .unwrap_or_else(|| format!("{:?}", self.kind));
        let body = ApiResponse::<()>::err(self.kind.code(), message);
        (status, Json(body)).into_response()
    }
}
