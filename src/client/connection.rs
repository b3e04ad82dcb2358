/// Reconnecting realtime connection.
///
/// One client instance is shared across auction views for the lifetime of
/// a session, owned by the composition root rather than hidden in module
/// state. Room membership is not preserved server-side, so every
/// successful (re)connect re-joins all rooms the views still hold.
// region:    --- Imports
use crate::realtime::{AuctionUpdate, ClientFrame, ServerFrame};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Duration, Instant};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

// endregion: --- Imports

// region:    --- Types

/// Supplies the current auth token on every (re)connect. A change in the
/// supplied value tears the live connection down and dials again.
pub type TokenProvider = Arc<dyn Fn() -> Option<String> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveStatus {
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub url: String,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:3000/ws".to_string(),
            reconnect_base_delay_ms: 500,
            reconnect_max_delay_ms: 30_000,
        }
    }
}

enum Command {
    Join {
        auction_id: i64,
        tx: mpsc::UnboundedSender<AuctionUpdate>,
    },
    Leave {
        auction_id: i64,
    },
    Shutdown,
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type Rooms = HashMap<i64, Vec<mpsc::UnboundedSender<AuctionUpdate>>>;

// endregion: --- Types

// region:    --- Realtime Client

pub struct RealtimeClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    status_rx: watch::Receiver<LiveStatus>,
    driver: tokio::task::JoinHandle<()>,
}

impl RealtimeClient {
    /// Spawn the connection driver. Returns immediately; the status watch
    /// reports progress.
    pub fn connect(config: RealtimeConfig, token: TokenProvider) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(LiveStatus::Connecting);
        let driver = tokio::spawn(driver_loop(config, token, cmd_rx, status_tx));
        Self {
            cmd_tx,
            status_rx,
            driver,
        }
    }

    pub fn status(&self) -> LiveStatus {
        *self.status_rx.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<LiveStatus> {
        self.status_rx.clone()
    }

    /// Join an auction room and receive its updates. Safe to call while
    /// disconnected: the join is replayed once the connection is up.
    pub fn join(&self, auction_id: i64) -> mpsc::UnboundedReceiver<AuctionUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = self.cmd_tx.send(Command::Join { auction_id, tx });
        rx
    }

    /// Leave a room on view unmount. Drop the update receiver first: the
    /// room (and the server-side membership) is released only once no
    /// local subscriber remains, so one view unmounting cannot
    /// unsubscribe another. The connection itself stays up.
    pub fn leave(&self, auction_id: i64) {
        let _ = self.cmd_tx.send(Command::Leave { auction_id });
    }

    /// Close the connection and stop the driver.
    pub async fn disconnect(self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
        let _ = self.driver.await;
    }
}

// endregion: --- Realtime Client

// region:    --- Driver

async fn driver_loop(
    config: RealtimeConfig,
    token_provider: TokenProvider,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    status_tx: watch::Sender<LiveStatus>,
) {
    let mut rooms: Rooms = HashMap::new();
    let base_delay = Duration::from_millis(config.reconnect_base_delay_ms.max(1));
    let max_delay = Duration::from_millis(config.reconnect_max_delay_ms.max(1));
    let mut delay = base_delay;

    'outer: loop {
        let _ = status_tx.send(LiveStatus::Connecting);
        let token = token_provider();
        let url = match token.as_deref() {
            Some(t) if !t.is_empty() => format!("{}?token={}", config.url, t),
            _ => config.url.clone(),
        };

        match connect_async(&url).await {
            Ok((stream, _)) => {
                info!("{:<12} --> connected to {}", "RtClient", config.url);
                let _ = status_tx.send(LiveStatus::Connected);
                delay = base_delay;

                let (mut ws_tx, mut ws_rx) = stream.split();

                // Rejoin everything the views still hold.
                for auction_id in rooms.keys().copied().collect::<Vec<_>>() {
                    if send_frame(&mut ws_tx, &ClientFrame::Join { auction_id })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }

                loop {
                    tokio::select! {
                        cmd = cmd_rx.recv() => match cmd {
                            Some(Command::Join { auction_id, tx }) => {
                                rooms.entry(auction_id).or_default().push(tx);
                                // A token rotated since dialing invalidates
                                // this connection's credentials.
                                if token_provider() != token {
                                    info!("{:<12} --> auth token changed, redialing", "RtClient");
                                    let _ = ws_tx.send(Message::Close(None)).await;
                                    break;
                                }
                                let _ = send_frame(&mut ws_tx, &ClientFrame::Join { auction_id }).await;
                            }
                            Some(Command::Leave { auction_id }) => {
                                if release_room(&mut rooms, auction_id) {
                                    let _ = send_frame(&mut ws_tx, &ClientFrame::Leave { auction_id }).await;
                                }
                            }
                            Some(Command::Shutdown) | None => {
                                let _ = ws_tx.send(Message::Close(None)).await;
                                break 'outer;
                            }
                        },
                        msg = ws_rx.next() => match msg {
                            Some(Ok(Message::Text(text))) => dispatch(&text, &mut rooms),
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(err)) => {
                                debug!("{:<12} --> read error: {}", "RtClient", err);
                                break;
                            }
                        },
                    }
                }
                let _ = status_tx.send(LiveStatus::Disconnected);
                warn!("{:<12} --> disconnected, retrying in {:?}", "RtClient", delay);
            }
            Err(err) => {
                let _ = status_tx.send(LiveStatus::Disconnected);
                warn!(
                    "{:<12} --> connect failed ({}), retrying in {:?}",
                    "RtClient", err, delay
                );
            }
        }

        // Backoff, while still serving membership changes so views that
        // mount during an outage are joined on the next connect.
        let deadline = Instant::now() + delay;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            tokio::select! {
                _ = sleep(remaining) => break,
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Join { auction_id, tx }) => {
                        rooms.entry(auction_id).or_default().push(tx);
                    }
                    Some(Command::Leave { auction_id }) => {
                        release_room(&mut rooms, auction_id);
                    }
                    Some(Command::Shutdown) | None => break 'outer,
                },
            }
        }
        delay = (delay * 2).min(max_delay);
    }

    let _ = status_tx.send(LiveStatus::Disconnected);
}

/// Forward an update to the subscribers of its auction. Events are
/// re-merged by id downstream, so duplicates here are harmless.
fn dispatch(text: &str, rooms: &mut Rooms) {
    match serde_json::from_str::<ServerFrame>(text) {
        Ok(ServerFrame::Update(update)) => {
            if let Some(subs) = rooms.get_mut(&update.auction_id) {
                subs.retain(|tx| tx.send(update.clone()).is_ok());
            }
        }
        Ok(ServerFrame::Joined { auction_id }) => {
            debug!("{:<12} --> joined auction:{}", "RtClient", auction_id);
        }
        Err(err) => {
            debug!("{:<12} --> unparseable frame: {}", "RtClient", err);
        }
    }
}

/// Drop a room's closed subscriber channels. Returns true when no local
/// subscriber remains and the room entry is gone, i.e. the wire-level
/// leave may be sent.
fn release_room(rooms: &mut Rooms, auction_id: i64) -> bool {
    match rooms.get_mut(&auction_id) {
        Some(subs) => {
            subs.retain(|tx| !tx.is_closed());
            if subs.is_empty() {
                rooms.remove(&auction_id);
                true
            } else {
                false
            }
        }
        None => true,
    }
}

async fn send_frame(sink: &mut WsSink, frame: &ClientFrame) -> Result<(), WsError> {
    match serde_json::to_string(frame) {
        Ok(json) => sink.send(Message::Text(json)).await,
        Err(err) => {
            warn!("{:<12} --> frame serialization failed: {}", "RtClient", err);
            Ok(())
        }
    }
}

// endregion: --- Driver

// region:    --- Tests


// endregion: --- Tests
