//! Transport and session configuration: [`DapConfig`] carries the knobs a
//! client picks at startup, [`DapMode`] selects stdio vs. socket framing, and
//! [`DapServer`] runs the Content-Length-framed message loop described in the
//! Debug Adapter Protocol over whichever of the two is chosen.
//!
//! CDP events are not read from the transport stream - they arrive on a
//! channel the embedder owns (see [`LaunchTarget`](crate::LaunchTarget) and
//! the module docs on [`DebugAdapter`](crate::DebugAdapter)). The server loop
//! interleaves draining that channel with reading client requests so a
//! `stopped` event can reach the client while a request is still in flight.

use crate::{DapError, DebugAdapter, LaunchTarget};
use js_dap_cdp::transform::{PathTransformer, SourceMapTransformer};
use js_dap_cdp::{CdpClient, CdpEvent};
use js_dap_protocol::Request;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};

/// Which framing the server listens for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DapMode {
    /// Content-Length frames over stdin/stdout. The default: every DAP
    /// client launches the adapter as a child process and talks over its
    /// inherited pipes.
    #[default]
    Stdio,
    /// Content-Length frames over a single accepted TCP connection, for
    /// clients that prefer to dial in rather than spawn a process.
    Socket,
}

/// Server-level configuration: logging, transport selection, and the
/// workspace root used to resolve relative paths in launch arguments.
#[derive(Debug, Clone)]
pub struct DapConfig {
    pub log_level: String,
    pub mode: DapMode,
    pub workspace_root: Option<PathBuf>,
}

impl Default for DapConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), mode: DapMode::default(), workspace_root: None }
    }
}

/// Owns the message loop. Generic over the same `CdpClient` / transformer
/// parameters as [`DebugAdapter`] since it just drives one.
pub struct DapServer<C, P, M> {
    pub config: DapConfig,
    adapter: Arc<Mutex<DebugAdapter<C, P, M>>>,
}

impl<C, P, M> DapServer<C, P, M>
where
    C: CdpClient + 'static,
    P: PathTransformer + 'static,
    M: SourceMapTransformer + 'static,
{
    pub fn new(config: DapConfig, adapter: DebugAdapter<C, P, M>) -> Self {
        Self { config, adapter: Arc::new(Mutex::new(adapter)) }
    }

    /// Serve one session over stdin/stdout.
    pub async fn run(
        &self,
        target: &(impl LaunchTarget + 'static),
        cdp_events: mpsc::Receiver<CdpEvent>,
    ) -> anyhow::Result<()> {
        self.run_with_io(tokio::io::stdin(), tokio::io::stdout(), target, cdp_events).await
    }

    /// Serve one session over a TCP socket, accepting exactly one client.
    pub async fn run_socket(
        &self,
        port: u16,
        target: &(impl LaunchTarget + 'static),
        cdp_events: mpsc::Receiver<CdpEvent>,
    ) -> anyhow::Result<()> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        tracing::info!(port, "DAP socket transport listening");
        let (stream, peer_addr) = listener.accept().await?;
        tracing::info!(%peer_addr, "DAP socket client connected");
        let (reader, writer) = stream.into_split();
        self.run_with_io(reader, writer, target, cdp_events).await
    }

    /// Reads requests on a dedicated task and feeds them back over a
    /// channel instead of racing `read_request` directly inside `select!`:
    /// `read_line` accumulates a header block across several awaits, and
    /// cancelling it mid-frame (because a CDP event happened to win the
    /// race) would desync the stream. An `mpsc` channel's `recv` has no such
    /// hazard.
    async fn run_with_io<R, W>(
        &self,
        input: R,
        output: W,
        target: &(impl LaunchTarget + 'static),
        mut cdp_events: mpsc::Receiver<CdpEvent>,
    ) -> anyhow::Result<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let writer = Arc::new(Mutex::new(output));
        let (request_tx, mut request_rx) = mpsc::channel::<Request>(32);

        tokio::spawn(async move {
            let mut reader = BufReader::new(input);
            loop {
                match read_request(&mut reader).await {
                    Ok(Some(request)) => {
                        if request_tx.send(request).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => return,
                    Err(err) => {
                        tracing::error!(%err, "DAP transport read failed");
                        return;
                    }
                }
            }
        });

        loop {
            tokio::select! {
                biased;

                event = cdp_events.recv() => {
                    let Some(cdp_event) = event else { continue };
                    let events = self.adapter.lock().await.on_cdp_event(cdp_event).await;
                    for event in events {
                        write_frame(&writer, &event).await?;
                    }
                }

                request = request_rx.recv() => {
                    let Some(request) = request else { return Ok(()) };
                    let command = request.command.clone();
                    let (response, pending_events) = {
                        let mut adapter = self.adapter.lock().await;
                        let response = crate::dispatch(&mut adapter, target, request).await;
                        let pending_events = adapter.take_pending_events();
                        (response, pending_events)
                    };
                    let initialize_succeeded = command == "initialize" && response.success;
                    write_frame(&writer, &response).await?;
                    for event in &pending_events {
                        write_frame(&writer, event).await?;
                    }
                    if initialize_succeeded {
                        self.adapter.lock().await.join_initial_sourcemap_work().await;
                        let seq = self.adapter.lock().await.next_seq();
                        let initialized = js_dap_protocol::Event::new(seq, "initialized", ());
                        write_frame(&writer, &initialized).await?;
                    }
                }
            }
        }
    }
}

async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
) -> Result<Option<Request>, DapError> {
    let mut content_length: Option<usize> = None;
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|err| DapError::EvaluateFailed(format!("transport read failed: {err}")))?;
        if read == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((key, value)) = trimmed.split_once(':') {
            if key.trim().eq_ignore_ascii_case("Content-Length") {
                content_length = value.trim().parse().ok();
            }
        }
    }

    let Some(length) = content_length else {
        return Err(DapError::EvaluateFailed("missing Content-Length header".to_string()));
    };
    let mut body = vec![0u8; length];
    tokio::io::AsyncReadExt::read_exact(reader, &mut body)
        .await
        .map_err(|err| DapError::EvaluateFailed(format!("transport read failed: {err}")))?;
    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|err| DapError::EvaluateFailed(format!("malformed request: {err}")))
}

async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &Arc<Mutex<W>>,
    message: &impl serde::Serialize,
) -> anyhow::Result<()> {
    let payload = serde_json::to_string(message)?;
    let frame = format!("Content-Length: {}\r\n\r\n{}", payload.len(), payload);
    let mut writer = writer.lock().await;
    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_stdio_and_info_logging() {
        let config = DapConfig::default();
        assert_eq!(config.mode, DapMode::Stdio);
        assert_eq!(config.log_level, "info");
    }
}
