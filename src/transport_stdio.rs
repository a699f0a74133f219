//! Newline-delimited JSON-RPC over stdin/stdout.
//!
//! stdout carries protocol messages only; logging must go to stderr.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::server::Server;
use crate::types::{ERR_CODE_PARSE, JsonRpcRequest, McpError, new_error_response};

/// Serve `server` on the process's stdin/stdout until stdin closes.
pub async fn serve_stdio(server: &Server) -> Result<(), McpError> {
    serve_lines(server, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Read one request per line from `reader`, write one response per line to
/// `writer`. Notifications get no reply. Returns at end of input.
///
/// Lines are read as raw bytes, so a line that is not valid UTF-8 is
/// answered with a parse error like any other malformed request.
pub async fn serve_lines<R, W>(server: &Server, reader: R, mut writer: W) -> Result<(), McpError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = buf.trim_ascii();
        if line.is_empty() {
            continue;
        }

        let resp = match serde_json::from_slice::<JsonRpcRequest>(line) {
            Ok(req) => server.handle(req).await,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable request line");
                new_error_response(None, ERR_CODE_PARSE, format!("invalid JSON: {}", e))
            }
        };

        if resp.is_notification() {
            continue;
        }

        let mut out = serde_json::to_vec(&resp)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;
    }

    tracing::info!("stdin closed, stopping");
    Ok(())
}
