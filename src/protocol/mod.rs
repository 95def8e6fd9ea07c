//! Request protocol (spec §6): length-prefixed JSON frames over a
//! localhost TCP socket, routed to the project/data-frame/pipeline
//! managers.
//!
//! - [`wire`]: `Request`/`Response` frame types.
//! - [`dispatcher`]: routes a `Request` to a [`crate::project::Project`]
//!   operation.
//! - [`server`]: the listener loop, one OS thread per connection.
//! - [`error`]: protocol-layer error taxonomy (wraps [`crate::error::EngineError`]).

pub mod dispatcher;
pub mod error;
pub mod server;
pub mod wire;

pub use error::{ProtocolError, ProtocolResult};
pub use wire::{Request, Response};

/// Default bind port when none is configured.
pub const DEFAULT_PORT: u16 = 8080;

/// Maximum accepted request/response frame size (16 MB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Protocol version, bumped on any wire-incompatible change.
pub const PROTOCOL_VERSION: u32 = 1;
