//! Real-time push channel.
//!
//! Opens `ws(s)://{host}:{port}/api/stream/{token}` and turns every text
//! frame shaped like `{"data": {"id": ..., "components": [...]}}` into a
//! [`DeviceDelta`] handed to a [`DeltaSink`]. Malformed frames are logged
//! and skipped; the loop only ends on cancellation or a connection-level
//! failure.
//!
//! By default there is exactly one connection attempt. With
//! [`ReconnectConfig::enabled`] set, [`RealtimeChannel::run`] reconnects
//! with exponential backoff + jitter instead.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wibutler_api::{DeviceDelta, RealtimeChannel, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let channel = RealtimeChannel::new(Arc::clone(&session), ReconnectConfig::default());
//! let cancel = CancellationToken::new();
//! let sink = |delta: &DeviceDelta| println!("{} changed", delta.device_id);
//! channel.run(&sink, &cancel).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;

use crate::devices::Component;
use crate::error::Error;
use crate::session::HubSession;

// ── Deltas ───────────────────────────────────────────────────────────

/// A device-scoped state change pushed by the hub.
///
/// `components` may be a partial set; consumers update only what is
/// mentioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDelta {
    pub device_id: String,
    pub components: Vec<Component>,
}

/// Receiver of decoded deltas. Called synchronously on the stream task.
pub trait DeltaSink: Send + Sync {
    fn deliver(&self, delta: &DeviceDelta);
}

impl<F> DeltaSink for F
where
    F: Fn(&DeviceDelta) + Send + Sync,
{
    fn deliver(&self, delta: &DeviceDelta) {
        self(delta);
    }
}

// ── Stream state ─────────────────────────────────────────────────────

/// Lifecycle of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    /// Not started yet.
    #[default]
    Idle,
    Connecting,
    Streaming,
    /// Ended cleanly or by cancellation.
    Stopped,
    /// Ended on a connection-level error.
    Failed,
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Reconnection policy for the push channel.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Reconnect at all. Default: false (single connection).
    pub enabled: bool,

    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── RealtimeChannel ──────────────────────────────────────────────────

/// Push connection bound to a [`HubSession`]'s current token.
pub struct RealtimeChannel {
    session: Arc<HubSession>,
    reconnect: ReconnectConfig,
    state: watch::Sender<StreamState>,
}

impl RealtimeChannel {
    pub fn new(session: Arc<HubSession>, reconnect: ReconnectConfig) -> Self {
        let (state, _) = watch::channel(StreamState::Idle);
        Self {
            session,
            reconnect,
            state,
        }
    }

    /// Subscribe to lifecycle changes.
    pub fn state(&self) -> watch::Receiver<StreamState> {
        self.state.subscribe()
    }

    pub fn current_state(&self) -> StreamState {
        *self.state.borrow()
    }

    fn set_state(&self, state: StreamState) {
        self.state.send_replace(state);
    }

    /// Stream until cancelled, reconnecting when the policy allows it.
    pub async fn run(&self, sink: &dyn DeltaSink, cancel: &CancellationToken) -> Result<(), Error> {
        let mut attempt: u32 = 0;

        loop {
            let result = self.connect_and_stream(sink, cancel).await;

            if cancel.is_cancelled() {
                self.set_state(StreamState::Stopped);
                return Ok(());
            }
            if !self.reconnect.enabled {
                return result;
            }

            match result {
                // Clean close: reconnect immediately with a fresh counter.
                Ok(()) => {
                    tracing::info!("push channel closed by hub, reconnecting");
                    attempt = 0;
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "push channel error");

                    if let Some(max) = self.reconnect.max_retries {
                        if attempt >= max {
                            tracing::error!(
                                max_retries = max,
                                "push channel reconnection limit reached, giving up"
                            );
                            self.set_state(StreamState::Failed);
                            return Err(e);
                        }
                    }

                    let delay = calculate_backoff(attempt, &self.reconnect);
                    tracing::info!(
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        attempt,
                        "waiting before reconnect"
                    );

                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            self.set_state(StreamState::Stopped);
                            return Ok(());
                        }
                        () = tokio::time::sleep(delay) => {}
                    }

                    attempt += 1;
                }
            }

            if !self.session.has_token() && !self.session.authenticate().await {
                tracing::warn!("re-authentication before reconnect failed");
            }
        }
    }

    /// One connection: connect with the current token and deliver deltas
    /// until the hub closes, the connection breaks, or `cancel` fires.
    pub async fn connect_and_stream(
        &self,
        sink: &dyn DeltaSink,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let result = self.stream_once(sink, cancel).await;
        self.set_state(if result.is_ok() {
            StreamState::Stopped
        } else {
            StreamState::Failed
        });
        result
    }

    async fn stream_once(&self, sink: &dyn DeltaSink, cancel: &CancellationToken) -> Result<(), Error> {
        let Some(token) = self.session.token() else {
            tracing::error!("no session token, cannot open push channel");
            return Err(Error::MissingToken);
        };

        let endpoint = self.session.endpoint();
        let url = endpoint.stream_url(&token)?;
        tracing::info!(url = %endpoint.redacted_stream_url(), "connecting to push channel");
        self.set_state(StreamState::Connecting);

        let uri: tungstenite::http::Uri = url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;
        let request = ClientRequestBuilder::new(uri);
        let connector = if endpoint.use_tls() {
            self.session.transport().websocket_connector()?
        } else {
            None
        };

        let connect =
            tokio_tungstenite::connect_async_tls_with_config(request, None, false, connector);
        let (mut ws, _response) = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            result = connect => result.map_err(|e| self.handshake_error(e))?,
        };

        tracing::info!("push channel connected");
        self.set_state(StreamState::Streaming);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    let _ = ws.close(None).await;
                    return Ok(());
                }
                frame = ws.next() => {
                    match frame {
                        Some(Ok(tungstenite::Message::Text(text))) => {
                            handle_text(text.as_str(), sink);
                        }
                        Some(Ok(tungstenite::Message::Ping(_))) => {
                            // tungstenite answers pings itself
                            tracing::trace!("push channel ping");
                        }
                        Some(Ok(tungstenite::Message::Close(frame))) => {
                            if let Some(ref cf) = frame {
                                tracing::info!(
                                    code = %cf.code,
                                    reason = %cf.reason,
                                    "push channel close frame received"
                                );
                            } else {
                                tracing::info!("push channel close frame received (no payload)");
                            }
                            return Ok(());
                        }
                        Some(Err(e)) => {
                            return Err(Error::WebSocketConnect(e.to_string()));
                        }
                        None => {
                            tracing::info!("push channel stream ended");
                            return Ok(());
                        }
                        _ => {
                            // Binary, Pong, Frame
                        }
                    }
                }
            }
        }
    }

    /// A rejected handshake means the token in the URL is stale.
    fn handshake_error(&self, err: tungstenite::Error) -> Error {
        if let tungstenite::Error::Http(ref resp) = err {
            if resp.status() == tungstenite::http::StatusCode::UNAUTHORIZED {
                self.session.invalidate_token();
                return Error::SessionExpired;
            }
        }
        Error::WebSocketConnect(err.to_string())
    }
}

// ── Frame parsing ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(default)]
    data: Option<FrameData>,
}

#[derive(Debug, Deserialize)]
struct FrameData {
    #[serde(default, deserialize_with = "crate::devices::lenient_opt_string")]
    id: Option<String>,
    #[serde(default)]
    components: Option<Vec<Component>>,
}

/// Decode one text frame.
///
/// `Ok(None)` means the frame is well-formed but carries no device delta.
pub fn parse_frame(text: &str) -> Result<Option<DeviceDelta>, serde_json::Error> {
    let frame: Frame = serde_json::from_str(text)?;
    let Some(data) = frame.data else {
        return Ok(None);
    };
    let Some(components) = data.components else {
        return Ok(None);
    };
    let Some(device_id) = data.id else {
        tracing::debug!("push frame has components but no device id");
        return Ok(None);
    };
    Ok(Some(DeviceDelta {
        device_id,
        components,
    }))
}

fn handle_text(text: &str, sink: &dyn DeltaSink) {
    match parse_frame(text) {
        Ok(Some(delta)) => {
            tracing::debug!(
                device_id = %delta.device_id,
                components = delta.components.len(),
                "push delta"
            );
            sink.deliver(&delta);
        }
        Ok(None) => tracing::trace!("push frame without device delta"),
        Err(e) => tracing::error!(error = %e, frame = text, "malformed push frame"),
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 ± 0.25)`
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * ((f64::from(attempt) * 7.3).sin());
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
