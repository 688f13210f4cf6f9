use crate::response::Status;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Serialize, Deserialize, Clone)]
#[error("{status}: {msg}")]
pub struct ServiceError {
    pub msg: String,
    pub status: Status,
}

impl ServiceError {
    pub fn configuration<T: std::fmt::Display>(msg: T) -> ServiceError {
        ServiceError {
            msg: msg.to_string(),
            status: Status::ConfigurationError,
        }
    }

    pub fn not_found<T: std::fmt::Display>(msg: T) -> ServiceError {
        ServiceError {
            msg: msg.to_string(),
            status: Status::NotFound,
        }
    }

    pub fn parse<T: std::fmt::Display>(msg: T) -> ServiceError {
        ServiceError {
            msg: msg.to_string(),
            status: Status::ParseError,
        }
    }

    pub fn logic<T: std::fmt::Display>(msg: T) -> ServiceError {
        ServiceError {
            msg: msg.to_string(),
            status: Status::LogicError,
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                ServiceError::not_found(err)
            }
            _ => ServiceError::logic(err),
        }
    }
}

impl From<csv::Error> for ServiceError {
    fn from(err: csv::Error) -> Self {
        let missing = matches!(
            err.kind(),
            csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound
        );
        if missing {
            ServiceError::not_found(err)
        } else {
            ServiceError::parse(err)
        }
    }
}
