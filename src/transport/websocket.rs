//! WebSocket push transport speaking the Pusher protocol.
//!
//! Runs one background task on the current tokio runtime: connect, rejoin
//! every channel once the broker handshake completes, pump frames in both
//! directions, and reconnect after a fixed delay until told to stop.

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::connector::{ConnectionState, ConnectorLink, FrameAction, PushTransport};
use super::frame;

/// Internal message type for the write channel.
enum Outgoing {
    Frame(String),
    Close,
}

pub struct WebSocketTransport {
    url: String,
    reconnect_delay: Duration,
    channels: Arc<Mutex<BTreeSet<String>>>,
    write_tx: Arc<Mutex<Option<mpsc::UnboundedSender<Outgoing>>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl WebSocketTransport {
    pub fn new(config: &SyncConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            url: config.broker_endpoint(),
            reconnect_delay: config.reconnect_delay,
            channels: Arc::new(Mutex::new(BTreeSet::new())),
            write_tx: Arc::new(Mutex::new(None)),
            shutdown_tx,
        }
    }

    fn send(&self, frame: String) {
        if let Some(tx) = self.write_tx.lock().as_ref() {
            if tx.send(Outgoing::Frame(frame)).is_err() {
                debug!("Write loop gone; frame will be replayed on reconnect");
            }
        }
    }
}

impl PushTransport for WebSocketTransport {
    fn connect(&self, link: ConnectorLink) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| SyncError::Transport("no tokio runtime".into()))?;

        let url = self.url.clone();
        let delay = self.reconnect_delay;
        let channels = self.channels.clone();
        let write_tx = self.write_tx.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        runtime.spawn(async move {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    info!("Shutdown signal received, stopping reconnection");
                    break;
                }

                link.report_state(ConnectionState::Connecting);
                info!(url = %url, "Connecting to push broker");

                match connect_async(url.as_str()).await {
                    Ok((ws_stream, _)) => {
                        let (mut ws_write, mut ws_read) = ws_stream.split();

                        let (tx, mut rx) = mpsc::unbounded_channel::<Outgoing>();
                        *write_tx.lock() = Some(tx);

                        let mut should_reconnect = true;
                        loop {
                            tokio::select! {
                                _ = shutdown_rx.recv() => {
                                    info!("Shutdown signal received, closing connection");
                                    if let Err(e) = ws_write.send(Message::Close(None)).await {
                                        warn!(error = %e, "Failed to send close frame");
                                    }
                                    should_reconnect = false;
                                    break;
                                }
                                Some(outgoing) = rx.recv() => {
                                    match outgoing {
                                        Outgoing::Frame(data) => {
                                            if ws_write.send(Message::Text(data.into())).await.is_err() {
                                                error!("Failed to send frame to broker");
                                                break;
                                            }
                                        }
                                        Outgoing::Close => {
                                            if let Err(e) = ws_write.send(Message::Close(None)).await {
                                                warn!(error = %e, "Failed to send close frame");
                                            }
                                            should_reconnect = false;
                                            break;
                                        }
                                    }
                                }
                                incoming = ws_read.next() => {
                                    match incoming {
                                        Some(Ok(Message::Text(text))) => {
                                            match link.deliver_frame(&text) {
                                                Ok(FrameAction::Established) => {
                                                    let joined: Vec<String> =
                                                        channels.lock().iter().cloned().collect();
                                                    debug!(count = joined.len(), "Rejoining channels");
                                                    for channel in joined {
                                                        let subscribe = frame::subscribe(&channel);
                                                        if ws_write.send(Message::Text(subscribe.into())).await.is_err() {
                                                            error!(%channel, "Failed to send subscribe");
                                                            break;
                                                        }
                                                    }
                                                }
                                                Ok(FrameAction::Reply(reply)) => {
                                                    if ws_write.send(Message::Text(reply.into())).await.is_err() {
                                                        break;
                                                    }
                                                }
                                                Ok(FrameAction::Fatal) => {
                                                    error!("Broker refused connection, giving up");
                                                    should_reconnect = false;
                                                    break;
                                                }
                                                Ok(FrameAction::None) => {}
                                                Err(e) => warn!(error = %e, "Ignoring bad frame"),
                                            }
                                        }
                                        Some(Ok(Message::Close(_))) | None => {
                                            info!("Broker closed connection");
                                            break;
                                        }
                                        Some(Err(e)) => {
                                            error!(error = %e, "WebSocket error");
                                            break;
                                        }
                                        _ => {}
                                    }
                                }
                            }
                        }

                        *write_tx.lock() = None;
                        link.report_state(ConnectionState::Disconnected);

                        if !should_reconnect {
                            break;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, url = %url, "Failed to connect to push broker");
                        link.report_state(ConnectionState::Error);
                    }
                }

                debug!(delay_ms = delay.as_millis() as u64, "Reconnecting");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Ok(())
    }

    fn subscribe(&self, channel: &str) -> Result<()> {
        let inserted = self.channels.lock().insert(channel.to_string());
        if inserted {
            // Sent right away when connected; otherwise replayed after the
            // next handshake.
            self.send(frame::subscribe(channel));
        }
        Ok(())
    }

    fn unsubscribe(&self, channel: &str) -> Result<()> {
        if self.channels.lock().remove(channel) {
            self.send(frame::unsubscribe(channel));
        }
        Ok(())
    }

    fn disconnect(&self) {
        info!("Initiating graceful disconnect");
        if self.shutdown_tx.send(()).is_err() {
            debug!("No connection task listening for shutdown");
        }
        if let Some(tx) = self.write_tx.lock().as_ref() {
            if tx.send(Outgoing::Close).is_err() {
                debug!("Write loop already gone");
            }
        }
    }
}
