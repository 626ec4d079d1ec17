//! Per-connection handler.
//!
//! Each handler is an independent task owning exactly one socket, moving
//! through `Idle → Dialing|Listening → Authenticating → Ready → Dead`.
//! Bidirectional handler *i* dials `peers[i-1]` first and degrades to
//! listening when the dial or handshake fails; inbound-only handlers go
//! straight to the shared listener.
//!
//! A ready handler answers `PING` with `PANG` and tracks its own RTT from
//! `PANG` replies; every other message is forwarded to the parent consumer
//! together with the handler's identity. Outbound sends arrive on the
//! handler's command channel; an encode failure is logged and never fatal.
//!
//! Reads are pulled one frame at a time: a dedicated reader task hands
//! frames over a capacity-1 channel, so the next frame is only taken off
//! the socket once the previous one is fully handled.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use ghost_core::traits::PeerStore;

use crate::auth::{self, Credentials, HandshakeStrategy};
use crate::cipher::SessionKey;
use crate::config::NetworkConfig;
use crate::frame::{read_frame, write_frame, Message};

/// Lifecycle states of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerState {
    #[default]
    Idle,
    Dialing,
    Listening,
    Authenticating,
    Ready,
    Dead,
}

/// What the rest of the fleet sees of a handler.
#[derive(Debug, Clone, Default)]
pub struct HandlerEntry {
    /// Where the handler is in its lifecycle.
    pub state: HandlerState,
    /// Peername (textual IP) once authenticated; the dedup key.
    pub connected: Option<String>,
    /// Last measured round-trip time.
    pub ping: Option<Duration>,
    /// Whether this session was dialed by us.
    pub outbound: bool,
}

/// Shared registry of live handlers, keyed by handler id.
pub type Registry = Arc<DashMap<usize, HandlerEntry>>;

/// A decoded peer message forwarded to the parent consumer.
#[derive(Debug)]
pub struct RouterEvent {
    /// Which handler received it (replies go to its command channel).
    pub handler_id: usize,
    /// The sending peer's textual IP.
    pub peername: String,
    pub message: Message,
}

/// Everything a handler incarnation needs from the supervisor.
pub struct HandlerContext {
    /// Handler slot number, starting at 1.
    pub id: usize,
    /// Dial-first slot or inbound-only.
    pub bidirectional: bool,
    /// The shared Ghost listener.
    pub listener: Arc<TcpListener>,
    pub registry: Registry,
    pub peer_store: Arc<dyn PeerStore>,
    /// Our identity toward remote peers.
    pub credentials: Credentials,
    pub router_tx: mpsc::UnboundedSender<RouterEvent>,
    pub config: NetworkConfig,
}

/// Record a state transition in the registry.
fn set_state(ctx: &HandlerContext, state: HandlerState) {
    ctx.registry.entry(ctx.id).or_default().state = state;
}

/// Run one handler incarnation until it is dead. The supervisor respawns.
pub async fn run_handler(ctx: HandlerContext, mut commands: mpsc::UnboundedReceiver<Message>) {
    // Idle: fixed startup delay before consulting role and peer list.
    set_state(&ctx, HandlerState::Idle);
    tokio::time::sleep(ctx.config.startup_delay).await;

    let outcome = establish(&ctx).await;

    let Some((stream, peername, session_key, outbound)) = outcome else {
        set_state(&ctx, HandlerState::Dead);
        return;
    };

    // Late dedup: another handler may have authenticated the same IP while
    // we were mid-handshake.
    if is_duplicate(&ctx, &peername) {
        debug!(id = ctx.id, peer = %peername, "duplicate session after handshake, closing");
        set_state(&ctx, HandlerState::Dead);
        return;
    }

    ctx.registry.insert(
        ctx.id,
        HandlerEntry {
            state: HandlerState::Ready,
            connected: Some(peername.clone()),
            ping: None,
            outbound,
        },
    );
    info!(id = ctx.id, peer = %peername, outbound, "session ready");

    ready_loop(&ctx, stream, &peername, session_key, &mut commands).await;

    ctx.registry.insert(
        ctx.id,
        HandlerEntry {
            state: HandlerState::Dead,
            ..HandlerEntry::default()
        },
    );
    debug!(id = ctx.id, peer = %peername, "handler dead");
}

/// Does another handler already own a session with this peername?
fn is_duplicate(ctx: &HandlerContext, peername: &str) -> bool {
    ctx.registry
        .iter()
        .any(|e| *e.key() != ctx.id && e.value().connected.as_deref() == Some(peername))
}

/// Drive `Dialing`/`Listening` and `Authenticating` to a ready session.
async fn establish(ctx: &HandlerContext) -> Option<(TcpStream, String, SessionKey, bool)> {
    if ctx.bidirectional {
        if let Some((stream, ip, key)) = try_dial(ctx).await {
            return Some((stream, ip, key, true));
        }
    }
    listen(ctx).await.map(|(s, ip, key)| (s, ip, key, false))
}

/// Bidirectional path: dial the peer assigned to this slot, authenticate
/// outbound. `None` sends the handler to the listen fallback (dial/handshake
/// failure) or to Dead (no peer assigned — handled by the caller's listen).
async fn try_dial(ctx: &HandlerContext) -> Option<(TcpStream, String, SessionKey)> {
    let mut peers = ctx.peer_store.known_peers().unwrap_or_default();
    if peers.is_empty() {
        peers = ctx.config.seed_peer_list();
    }
    let (ip, port) = ctx.id.checked_sub(1).and_then(|i| peers.get(i))?.clone();

    set_state(ctx, HandlerState::Dialing);
    debug!(id = ctx.id, peer = %ip, port, "dialing");
    let connect = TcpStream::connect((ip.as_str(), port));
    let mut stream = match tokio::time::timeout(ctx.config.dial_timeout, connect).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(err)) => {
            debug!(id = ctx.id, peer = %ip, error = %err, "dial failed, degrading to listen");
            return None;
        }
        Err(_) => {
            debug!(id = ctx.id, peer = %ip, "dial timed out, degrading to listen");
            return None;
        }
    };

    set_state(ctx, HandlerState::Authenticating);
    match auth::authenticate_outbound(
        &mut stream,
        &ctx.credentials,
        HandshakeStrategy::Register,
        ctx.config.protocol_version,
    )
    .await
    {
        Ok(outcome) => Some((stream, ip, outcome.session_key)),
        Err(err) => {
            warn!(id = ctx.id, peer = %ip, error = %err, "outbound handshake failed");
            None
        }
    }
}

/// Inbound path: accept on the shared listener, dedup, authenticate.
async fn listen(ctx: &HandlerContext) -> Option<(TcpStream, String, SessionKey)> {
    set_state(ctx, HandlerState::Listening);
    let (mut stream, addr) = match ctx.listener.accept().await {
        Ok(conn) => conn,
        Err(err) => {
            warn!(id = ctx.id, error = %err, "accept failed");
            return None;
        }
    };
    let peername = addr.ip().to_string();

    // Dedup before authenticating: one session per remote IP.
    if is_duplicate(ctx, &peername) {
        debug!(id = ctx.id, peer = %peername, "duplicate connection, closing");
        let _ = stream.shutdown().await;
        return None;
    }

    set_state(ctx, HandlerState::Authenticating);
    match auth::authenticate_inbound(&mut stream, ctx.peer_store.as_ref()).await {
        Ok(outcome) => {
            debug!(id = ctx.id, peer = %peername, identifier = %outcome.identifier, "inbound handshake complete");
            Some((stream, peername, outcome.session_key))
        }
        Err(err) => {
            warn!(id = ctx.id, peer = %peername, error = %err, "inbound handshake failed");
            None
        }
    }
}

/// The Ready state: pump frames, answer pings, forward the rest, and
/// service outbound send requests until the socket or the supervisor side
/// goes away.
async fn ready_loop<S>(
    ctx: &HandlerContext,
    stream: S,
    peername: &str,
    session_key: SessionKey,
    commands: &mut mpsc::UnboundedReceiver<Message>,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut rd, mut wr) = tokio::io::split(stream);

    // Single-delivery frame pull: capacity 1 means the reader blocks until
    // the previous frame is consumed, so backpressure reaches the socket.
    let (frame_tx, mut frame_rx) = mpsc::channel::<(String, Vec<u8>)>(1);
    let reader = tokio::spawn(async move {
        loop {
            match read_frame(&mut rd).await {
                Ok(frame) => {
                    if frame_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    debug!(error = %err, "read side closed");
                    break;
                }
            }
        }
    });

    let mut ping_timer = tokio::time::interval(ctx.config.ping_interval);
    ping_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last_ping_sent: Option<Instant> = None;

    loop {
        tokio::select! {
            frame = frame_rx.recv() => {
                let Some((mtype, body)) = frame else {
                    info!(id = ctx.id, peer = %peername, "connection closed by peer");
                    break;
                };
                let msg = match Message::decode(&mtype, &body, Some(&session_key)) {
                    Ok(msg) => msg,
                    Err(err) => {
                        warn!(id = ctx.id, peer = %peername, error = %err, "dropping undecodable frame");
                        continue;
                    }
                };
                match msg.mtype.as_str() {
                    "PING" => {
                        if !send(ctx, &mut wr, &Message::new("PANG"), &session_key).await {
                            break;
                        }
                    }
                    "PANG" => {
                        if let Some(sent) = last_ping_sent.take() {
                            let rtt = sent.elapsed();
                            if let Some(mut entry) = ctx.registry.get_mut(&ctx.id) {
                                entry.ping = Some(rtt);
                            }
                            debug!(id = ctx.id, peer = %peername, rtt_ms = rtt.as_millis() as u64, "pong");
                        }
                    }
                    _ => {
                        let _ = ctx.router_tx.send(RouterEvent {
                            handler_id: ctx.id,
                            peername: peername.to_string(),
                            message: msg,
                        });
                    }
                }
            }
            cmd = commands.recv() => {
                let Some(msg) = cmd else {
                    debug!(id = ctx.id, "command channel closed");
                    break;
                };
                if !send(ctx, &mut wr, &msg, &session_key).await {
                    break;
                }
            }
            _ = ping_timer.tick() => {
                last_ping_sent = Some(Instant::now());
                if !send(ctx, &mut wr, &Message::new("PING"), &session_key).await {
                    break;
                }
            }
        }
    }

    reader.abort();
}

/// Encode, encrypt, and write one message.
///
/// Encode failures are logged and swallowed (the session continues); a
/// write failure ends the session and returns `false`.
async fn send<W>(ctx: &HandlerContext, wr: &mut W, msg: &Message, key: &SessionKey) -> bool
where
    W: AsyncWrite + Unpin,
{
    let frame = match msg.encode_frame_encrypted(key) {
        Ok(frame) => frame,
        Err(err) => {
            warn!(id = ctx.id, mtype = %msg.mtype, error = %err, "failed to encode outbound message");
            return true;
        }
    };
    if let Err(err) = write_frame(wr, &frame).await {
        debug!(id = ctx.id, error = %err, "write failed");
        return false;
    }
    true
}
