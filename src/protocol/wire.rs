//! Wire types (spec §6 "Request protocol"): "Each request has `type_` and
//! `name_`... Responses are either a status string... or, for bulk
//! payloads, binary column frames."

use serde::{Deserialize, Serialize};

/// A request frame. `type_` names which manager handles it (`"project"`,
/// `"data_frame"`, `"pipeline"`); `name_` names the target entity (a
/// project/frame/pipeline name, or is empty for entity-less operations like
/// `list_projects`); `payload` carries the operation name plus its
/// arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "type_")]
    pub type_: String,
    #[serde(rename = "name_")]
    pub name_: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// A response frame. `Arrow` carries a raw Arrow IPC stream (spec §6
/// "Arrow frames"), embedded as a JSON byte array so the whole response
/// stays inside the same length-framed JSON envelope as a status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Response {
    Status { message: String },
    Error { message: String },
    Arrow { ipc_bytes: Vec<u8> },
}

impl Response {
    pub fn status(message: impl Into<String>) -> Self {
        Response::Status { message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error { message: message.into() }
    }
}
