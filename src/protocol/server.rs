//! TCP server (spec §6 "Transport: length-prefixed JSON frames over a
//! localhost TCP socket"; spec §5 "Parallel OS threads; no cooperative
//! scheduler" — one thread per connection, no async runtime).

use crate::protocol::dispatcher::dispatch;
use crate::protocol::error::{ProtocolError, ProtocolResult};
use crate::protocol::wire::{Request, Response};
use crate::protocol::MAX_MESSAGE_SIZE;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reads one length-prefixed frame: a 4-byte little-endian length followed
/// by that many bytes of JSON.
fn read_frame(stream: &mut TcpStream) -> ProtocolResult<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(ProtocolError::ConnectionClosed),
        Err(e) => return Err(ProtocolError::Io(e)),
    }
    let len = u32::from_le_bytes(len_buf);
    if len as usize > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::FrameTooLarge { size: len, max: MAX_MESSAGE_SIZE as u32 });
    }
    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload)?;
    Ok(payload)
}

fn write_frame(stream: &mut TcpStream, payload: &[u8]) -> ProtocolResult<()> {
    let len = payload.len() as u32;
    stream.write_all(&len.to_le_bytes())?;
    stream.write_all(payload)?;
    Ok(())
}

fn serve_connection(mut stream: TcpStream, projects_root: &Path) {
    let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_else(|_| "unknown".to_string());
    tracing::info!(peer = %peer, "connection opened");
    loop {
        let frame = match read_frame(&mut stream) {
            Ok(frame) => frame,
            Err(ProtocolError::ConnectionClosed) => {
                tracing::info!(peer = %peer, "connection closed");
                return;
            }
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "failed to read request frame");
                let _ = write_frame(&mut stream, &serde_json::to_vec(&e.to_response()).unwrap_or_default());
                return;
            }
        };

        let response = match serde_json::from_slice::<Request>(&frame) {
            Ok(req) => dispatch(projects_root, &req),
            Err(e) => ProtocolError::Json(e).to_response(),
        };

        let Ok(body) = serde_json::to_vec(&response) else {
            tracing::error!(peer = %peer, "failed to serialize response");
            return;
        };
        if let Err(e) = write_frame(&mut stream, &body) {
            tracing::warn!(peer = %peer, error = %e, "failed to write response frame");
            return;
        }
    }
}

/// Binds `bind_addr` and serves requests until the process is killed.
/// Accepts one connection at a time and spawns a dedicated OS thread per
/// connection; each thread owns its socket for the connection's lifetime.
pub fn serve(bind_addr: &str, projects_root: impl Into<PathBuf>) -> ProtocolResult<()> {
    let projects_root: Arc<PathBuf> = Arc::new(projects_root.into());
    let listener = TcpListener::bind(bind_addr)?;
    tracing::info!(bind_addr, "listening");

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "failed to accept connection");
                continue;
            }
        };
        let projects_root = projects_root.clone();
        std::thread::spawn(move || serve_connection(stream, &projects_root));
    }
    Ok(())
}
