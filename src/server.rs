//! Unix Domain Socket transport for the utility organ.
//!
//! Each request and response is a JSON body preceded by its length as a
//! 4-byte big-endian integer. A connection carries any number of
//! request/response pairs until the client closes it.

use crate::organ::{Organ, Response, Stimulus, UtilsOrgan};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error};

/// Largest frame body accepted from a peer
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Accept connections forever, one task per connection.
pub async fn serve(listener: UnixListener, organ: Arc<UtilsOrgan>) -> Result<()> {
    let start_time = Instant::now();

    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let organ = Arc::clone(&organ);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, organ, start_time).await {
                        error!("Connection error: {:#}", e);
                    }
                });
            }
            Err(e) => {
                error!("Accept error: {}", e);
            }
        }
    }
}

/// Handle a single UDS connection
pub async fn handle_connection(
    mut stream: UnixStream,
    organ: Arc<UtilsOrgan>,
    start_time: Instant,
) -> Result<()> {
    loop {
        let Some(stimulus) = read_frame::<Stimulus>(&mut stream).await? else {
            debug!("Client disconnected");
            return Ok(());
        };

        debug!("Received: op={}", stimulus.op);

        // Health check is answered here, not by the organ
        let response = if stimulus.op == "health" || stimulus.op == "health.check" {
            Response {
                ok: true,
                output: serde_json::json!({
                    "status": "healthy",
                    "organ": "rcp_utils",
                    "version": env!("CARGO_PKG_VERSION"),
                    "uptime_ms": start_time.elapsed().as_millis() as u64,
                }),
                latency_ms: 0,
                cost: None,
            }
        } else {
            match organ.stimulate(stimulus).await {
                Ok(resp) => resp,
                Err(e) => {
                    error!("Stimulate error: {:?}", e);
                    Response {
                        ok: false,
                        output: serde_json::json!({ "error": e.to_string() }),
                        latency_ms: 0,
                        cost: None,
                    }
                }
            }
        };

        write_frame(&mut stream, &response).await?;
        debug!("Sent: ok={}, latency={}ms", response.ok, response.latency_ms);
    }
}

/// Send one stimulus and wait for its response.
pub async fn request(stream: &mut UnixStream, stimulus: &Stimulus) -> Result<Response> {
    write_frame(stream, stimulus).await?;
    read_frame(stream)
        .await?
        .context("Connection closed before response")
}

/// Read one frame. `Ok(None)` on a clean EOF before the length prefix.
pub async fn read_frame<T: DeserializeOwned>(stream: &mut UnixStream) -> Result<Option<T>> {
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        anyhow::bail!("Frame of {} bytes exceeds limit of {}", len, MAX_FRAME_LEN);
    }

    let mut body = vec![0u8; len];
    stream
        .read_exact(&mut body)
        .await
        .context("Failed to read frame body")?;

    let value = serde_json::from_slice(&body).context("Failed to parse frame")?;
    Ok(Some(value))
}

/// Write one length-prefixed frame and flush.
pub async fn write_frame<T: Serialize>(stream: &mut UnixStream, value: &T) -> Result<()> {
    let body = serde_json::to_vec(value).context("Failed to serialize frame")?;
    if body.len() > MAX_FRAME_LEN {
        anyhow::bail!("Frame of {} bytes exceeds limit of {}", body.len(), MAX_FRAME_LEN);
    }
    let len_bytes = (body.len() as u32).to_be_bytes();

    stream.write_all(&len_bytes).await?;
    stream.write_all(&body).await?;
    stream.flush().await?;
    Ok(())
}
