//! Binary RPC façade.
//!
//! Frames are a `u32` big-endian length followed by a bincode-encoded
//! request or reply envelope. Each connection carries any number of
//! request/reply pairs in order. The façade translates wire envelopes to the
//! orchestrator's internal model and back; semantics are identical to the
//! HTTP surface.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::models::{
    GenerateCartImageResponse, GenerationRequest, GetStatusResponse, UploadBackgroundResponse,
};
use crate::orchestrator::{GenerateError, Orchestrator};

/// Upper bound on a single frame, sized for base64 image payloads.
pub const MAX_FRAME_LEN: u32 = 32 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
pub enum RpcRequest {
    GenerateCartImage(GenerationRequest),
    UploadBackground { image_data: String },
    GetImageGenerationStatus { generation_id: String },
}

/// Mirrors RPC status-code semantics: `Ok` for any reply the pipeline
/// produced (including failed jobs), `InvalidArgument` for rejected or
/// malformed requests, `Internal` for errors that escaped the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcCode {
    Ok,
    InvalidArgument,
    Internal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcReply {
    pub code: RpcCode,
    pub body: RpcBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum RpcBody {
    GenerateCartImage(GenerateCartImageResponse),
    UploadBackground(UploadBackgroundResponse),
    GetImageGenerationStatus(GetStatusResponse),
    Error { message: String },
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    Oversized(u32),
    #[error("codec error: {0}")]
    Codec(String),
}

/// Accept loop. Each connection gets its own task; the orchestrator is
/// shared across all of them.
pub async fn serve(listener: TcpListener, orchestrator: Arc<Orchestrator>) -> std::io::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            info!(%peer, "rpc connection opened");
            if let Err(err) = handle_connection(socket, orchestrator).await {
                warn!(%peer, error = %err, "rpc connection closed with error");
            }
        });
    }
}

async fn handle_connection<S>(mut stream: S, orchestrator: Arc<Orchestrator>) -> Result<(), RpcError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let frame = match read_frame(&mut stream).await? {
            Some(frame) => frame,
            None => return Ok(()), // clean EOF between frames
        };
        let reply = match bincode::deserialize::<RpcRequest>(&frame) {
            Ok(request) => dispatch(&orchestrator, request).await,
            Err(err) => RpcReply {
                code: RpcCode::InvalidArgument,
                body: RpcBody::Error { message: format!("malformed request: {err}") },
            },
        };
        write_frame(&mut stream, &reply).await?;
    }
}

async fn dispatch(orchestrator: &Orchestrator, request: RpcRequest) -> RpcReply {
    match request {
        RpcRequest::GenerateCartImage(req) => match orchestrator.generate(req).await {
            Ok(outcome) => RpcReply {
                code: RpcCode::Ok,
                body: RpcBody::GenerateCartImage(outcome.into()),
            },
            Err(err @ GenerateError::EmptyRequest) => RpcReply {
                code: RpcCode::InvalidArgument,
                body: RpcBody::Error { message: err.to_string() },
            },
            Err(GenerateError::Pipeline { message, .. }) => RpcReply {
                code: RpcCode::Internal,
                body: RpcBody::Error { message },
            },
        },
        RpcRequest::UploadBackground { image_data } => RpcReply {
            code: RpcCode::Ok,
            body: RpcBody::UploadBackground(
                orchestrator.upload_background(&image_data).await.into(),
            ),
        },
        RpcRequest::GetImageGenerationStatus { generation_id } => RpcReply {
            code: RpcCode::Ok,
            body: RpcBody::GetImageGenerationStatus(
                orchestrator.job_status(&generation_id).into(),
            ),
        },
    }
}

/// Read one length-prefixed frame. `None` means the peer closed the
/// connection at a frame boundary.
async fn read_frame<S: AsyncRead + Unpin>(stream: &mut S) -> Result<Option<Vec<u8>>, RpcError> {
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(RpcError::Oversized(len));
    }
    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

async fn write_frame<S: AsyncWrite + Unpin>(stream: &mut S, reply: &RpcReply) -> Result<(), RpcError> {
    let payload = bincode::serialize(reply).map_err(|e| RpcError::Codec(e.to_string()))?;
    stream.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    stream.write_all(&payload).await?;
    stream.flush().await?;
    Ok(())
}
