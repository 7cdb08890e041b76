//! Wire protocol between `lia` clients and the resident service.
//!
//! Each frame is a 4-byte big-endian length followed by that many bytes of
//! JSON. A connection carries any number of request/response pairs.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{LiaError, Result};
use crate::search::SearchHit;

/// Largest accepted frame body.
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Search,
    Stop,
    Ping,
    History,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub op: Op,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, rename = "topicFilter", skip_serializing_if = "Option::is_none")]
    pub topic_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Request {
    pub fn search(query: impl Into<String>, topic_filter: Option<String>) -> Self {
        Self {
            op: Op::Search,
            query: Some(query.into()),
            topic_filter,
            limit: None,
        }
    }

    pub fn history(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::bare(Op::History)
        }
    }

    pub fn stop() -> Self {
        Self::bare(Op::Stop)
    }

    pub fn ping() -> Self {
        Self::bare(Op::Ping)
    }

    fn bare(op: Op) -> Self {
        Self {
            op,
            query: None,
            topic_filter: None,
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub results: Vec<SearchHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn results(results: Vec<SearchHit>) -> Self {
        Self {
            results,
            ..Self::default()
        }
    }

    pub fn history(entries: Vec<String>) -> Self {
        Self {
            history: Some(entries),
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Read one frame. Returns `None` when the peer closed the connection
/// cleanly before a new frame started.
pub async fn read_frame<S, T>(stream: &mut S) -> Result<Option<T>>
where
    S: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(LiaError::Protocol(format!(
            "frame of {len} bytes exceeds limit of {MAX_FRAME_BYTES}"
        )));
    }

    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    let value = serde_json::from_slice(&body)
        .map_err(|e| LiaError::Protocol(format!("invalid frame: {e}")))?;
    Ok(Some(value))
}

pub async fn write_frame<S, T>(stream: &mut S, value: &T) -> Result<()>
where
    S: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(value)
        .map_err(|e| LiaError::Protocol(format!("cannot encode frame: {e}")))?;
    if body.len() > MAX_FRAME_BYTES {
        return Err(LiaError::Protocol(format!(
            "frame of {} bytes exceeds limit of {MAX_FRAME_BYTES}",
            body.len()
        )));
    }

    stream.write_all(&(body.len() as u32).to_be_bytes()).await?;
    stream.write_all(&body).await?;
    stream.flush().await?;
    Ok(())
}
