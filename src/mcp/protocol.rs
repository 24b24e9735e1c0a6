use super::types::*;
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};

/// Newline-delimited JSON-RPC over a byte stream, stdio by default
pub struct Protocol<R = tokio::io::Stdin, W = tokio::io::Stdout> {
    lines: Lines<BufReader<R>>,
    writer: W,
}

impl Protocol {
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> Protocol<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    /// Read next JSON-RPC request, `None` on EOF.
    ///
    /// Cancel safe: a partially read line is kept for the next call.
    pub async fn read_request(&mut self) -> Result<Option<JsonRpcRequest>> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(None), // EOF
                Err(e) => {
                    tracing::debug!("Input closed: {}", e);
                    return Ok(None);
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let request: JsonRpcRequest = serde_json::from_str(trimmed)?;
            return Ok(Some(request));
        }
    }

    pub async fn send_response(&mut self, response: JsonRpcResponse) -> Result<()> {
        self.write_line(&response).await
    }

    pub async fn send_notification<P: Serialize>(&mut self, method: &str, params: P) -> Result<()> {
        let notification = Notification {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params: serde_json::to_value(params)?,
        };
        self.write_line(&notification).await
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    async fn write_line<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let json = serde_json::to_string(message)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

pub fn success_response<T: Serialize>(id: Value, result: T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(result) => JsonRpcResponse {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        },
        Err(e) => error_response(id, JsonRpcError::invalid_params(e.to_string())),
    }
}

pub fn error_response(id: Value, error: JsonRpcError) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id,
        result: None,
        error: Some(error),
    }
}
