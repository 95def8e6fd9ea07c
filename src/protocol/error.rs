//! Protocol-layer errors (spec §7 propagation policy: "the handler converts
//! [errors] to a response string").

use crate::protocol::wire::Response;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Any fit/transform/check/project-management failure, already
    /// classified into the §7 taxonomy.
    #[error(transparent)]
    Engine(#[from] crate::error::EngineError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed request: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request exceeds maximum frame size: {size} > {max}")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("connection closed before a complete frame was read")]
    ConnectionClosed,

    #[error("no handler for request type '{0}'")]
    UnknownType(String),

    #[error("no operation '{op}' on type '{type_}'")]
    UnknownOperation { type_: String, op: String },
}

impl ProtocolError {
    /// Converts to the wire response a caller actually receives; never
    /// panics, matching §7's "request fails; no state change" contract at
    /// the outermost boundary.
    pub fn to_response(&self) -> Response {
        Response::error(self.to_string())
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
