use serde::{de, Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    ParseError,
    NotFound,
    LogicError,
    ConfigurationError,
}

impl Status {
    /// Stable numeric code, also used as the process exit code (sysexits values).
    pub fn code(&self) -> u8 {
        match self {
            Status::Ok => 0,
            Status::ParseError => 65,
            Status::NotFound => 66,
            Status::LogicError => 70,
            Status::ConfigurationError => 78,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Status::Ok => "ok",
            Status::ParseError => "parse error",
            Status::NotFound => "not found",
            Status::LogicError => "logic error",
            Status::ConfigurationError => "configuration error",
        };
        f.write_str(name)
    }
}

impl Serialize for Status {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

struct StatusCodeVisitor;

impl<'de> de::Visitor<'de> for StatusCodeVisitor {
    type Value = Status;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("Status")
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match v {
            0 => Ok(Status::Ok),
            65 => Ok(Status::ParseError),
            66 => Ok(Status::NotFound),
            70 => Ok(Status::LogicError),
            78 => Ok(Status::ConfigurationError),
            value => Err(de::Error::custom(value.to_string())),
        }
    }
}

impl<'de> de::Deserialize<'de> for Status {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_u8(StatusCodeVisitor)
    }
}

/// Envelope printed by the service binaries after every run.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    pub status_code: Status,
    pub body: Value,
}

pub fn make_report_payload(result: Result<Value, ServiceError>) -> ReportPayload {
    match result {
        Err(err) => ReportPayload {
            status_code: err.status,
            body: Value::String(err.msg),
        },
        Ok(body) => ReportPayload {
            status_code: Status::Ok,
            body,
        },
    }
}
