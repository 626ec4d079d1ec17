//! The handler fleet.
//!
//! The supervisor owns the Ghost listen socket and spawns a fixed pool of
//! connection handlers: slots `1..=max_bidirectional` dial-first, the rest
//! are inbound-only. Each slot is supervised one-for-one — when its handler
//! dies the slot gets a fresh command channel and a new incarnation after a
//! short pause.
//!
//! The [`Fleet`] handle exposes the connected-peer registry, targeted
//! sends, and best-effort gossip fan-out. Inbound application messages
//! arrive on the router channel returned by [`Fleet::start`].

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::mpsc;
use tracing::{debug, info};

use ghost_core::traits::PeerStore;

use crate::auth::Credentials;
use crate::config::NetworkConfig;
use crate::frame::Message;
use crate::handler::{run_handler, HandlerContext, HandlerEntry, Registry};
use crate::health;

pub use crate::handler::RouterEvent;

/// Bind a passive, reuse-addr TCP listener.
fn bind_reuseaddr(addr: &str) -> io::Result<TcpListener> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("bad listen addr: {e}")))?;
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(128)
}

/// Handle to a running handler fleet.
pub struct Fleet {
    registry: Registry,
    senders: Arc<DashMap<usize, mpsc::UnboundedSender<Message>>>,
    local_addr: SocketAddr,
    health_addr: SocketAddr,
}

impl Fleet {
    /// Bind the Ghost and health listeners and spawn the handler pool.
    ///
    /// Returns the fleet handle and the channel on which handlers deliver
    /// application messages to the consumer.
    pub async fn start(
        config: NetworkConfig,
        peer_store: Arc<dyn PeerStore>,
        credentials: Credentials,
    ) -> io::Result<(Self, mpsc::UnboundedReceiver<RouterEvent>)> {
        let listener = bind_reuseaddr(&config.listen_addr())?;
        let local_addr = listener.local_addr()?;
        let listener = Arc::new(listener);

        let health_listener = TcpListener::bind(("0.0.0.0", config.health_port)).await?;
        let health_addr = health_listener.local_addr()?;
        tokio::spawn(health::serve(health_listener));

        let registry: Registry = Arc::new(DashMap::new());
        let senders: Arc<DashMap<usize, mpsc::UnboundedSender<Message>>> =
            Arc::new(DashMap::new());
        let (router_tx, router_rx) = mpsc::unbounded_channel();

        info!(
            addr = %local_addr,
            health = %health_addr,
            bidirectional = config.max_bidirectional,
            pool = config.max_inbound,
            "fleet listening"
        );

        for id in 1..=config.max_inbound {
            let bidirectional = id <= config.max_bidirectional;
            let listener = listener.clone();
            let registry = registry.clone();
            let senders = senders.clone();
            let peer_store = peer_store.clone();
            let credentials = credentials.clone();
            let router_tx = router_tx.clone();
            let config = config.clone();

            // One-for-one supervision: each incarnation gets a fresh
            // command channel so stale senders cannot reach a new session.
            tokio::spawn(async move {
                loop {
                    let (command_tx, command_rx) = mpsc::unbounded_channel();
                    senders.insert(id, command_tx);
                    let ctx = HandlerContext {
                        id,
                        bidirectional,
                        listener: listener.clone(),
                        registry: registry.clone(),
                        peer_store: peer_store.clone(),
                        credentials: credentials.clone(),
                        router_tx: router_tx.clone(),
                        config: config.clone(),
                    };
                    run_handler(ctx, command_rx).await;
                    tokio::time::sleep(config.restart_delay).await;
                }
            });
        }

        Ok((
            Self {
                registry,
                senders,
                local_addr,
                health_addr,
            },
            router_rx,
        ))
    }

    /// Address the Ghost listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Address the health responder is bound to.
    pub fn health_addr(&self) -> SocketAddr {
        self.health_addr
    }

    /// Every handler currently holding an authenticated session, as
    /// `(handler_id, peername)`.
    pub fn connected_handlers(&self) -> Vec<(usize, String)> {
        let mut connected: Vec<(usize, String)> = self
            .registry
            .iter()
            .filter_map(|e| e.value().connected.clone().map(|peer| (*e.key(), peer)))
            .collect();
        connected.sort_by_key(|(id, _)| *id);
        connected
    }

    /// Registry snapshot for one handler slot.
    pub fn handler_entry(&self, handler_id: usize) -> Option<HandlerEntry> {
        self.registry.get(&handler_id).map(|e| e.value().clone())
    }

    /// Send a typed message to one handler. `false` when the slot holds no
    /// live session.
    pub fn send_to(&self, handler_id: usize, message: Message) -> bool {
        let connected = self
            .registry
            .get(&handler_id)
            .map(|e| e.value().connected.is_some())
            .unwrap_or(false);
        if !connected {
            return false;
        }
        self.senders
            .get(&handler_id)
            .map(|tx| tx.send(message).is_ok())
            .unwrap_or(false)
    }

    /// Fire-and-forget fan-out to every connected handler.
    ///
    /// Returns how many handlers the message was queued to; there is no
    /// delivery guarantee beyond that.
    pub fn gossip(&self, message: Message) -> usize {
        let mut queued = 0;
        for (id, peer) in self.connected_handlers() {
            if self.send_to(id, message.clone()) {
                debug!(handler = id, peer = %peer, mtype = %message.mtype, "gossip queued");
                queued += 1;
            }
        }
        queued
    }
}
