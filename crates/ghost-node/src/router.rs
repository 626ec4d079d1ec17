//! The message router: block and transaction ingress from the fleet.
//!
//! Application payloads travel as base64-encoded JSON in a `DATA` string
//! parameter. Everything is sanitized through the strict deserializers
//! before it reaches the validator; invalid objects are logged and
//! dropped, never fatal. Accepted novelties are gossiped onward
//! best-effort.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use ghost_core::{Block, Transaction};
use ghost_network::{Fleet, Message, RouterEvent};

use crate::node::Chain;

/// Wire message type carrying a block.
pub const MSG_BLOCK: &str = "BLOCK";

/// Wire message type carrying a transaction.
pub const MSG_TRANSACTION: &str = "TRANSACTION";

/// Consumes peer messages from the fleet and drives the chain.
pub struct Router {
    pub chain: Arc<Chain>,
    pub fleet: Arc<Fleet>,
}

impl Router {
    /// Pump events until every handler sender is gone.
    pub async fn run(self, mut events: UnboundedReceiver<RouterEvent>) {
        while let Some(event) = events.recv().await {
            match event.message.mtype.as_str() {
                MSG_BLOCK => self.handle_block(&event),
                MSG_TRANSACTION => self.handle_transaction(&event),
                other => {
                    debug!(peer = %event.peername, mtype = other, "unhandled message type");
                }
            }
        }
        info!("router stopped: fleet channel closed");
    }

    /// Decode the base64 JSON payload of an application message.
    fn payload(message: &Message) -> Option<serde_json::Value> {
        let data = message.str("DATA")?;
        let bytes = B64.decode(data).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Build the `DATA` message for a serializable payload.
    pub fn wrap<T: serde::Serialize>(mtype: &str, payload: &T) -> Option<Message> {
        let json = serde_json::to_vec(payload).ok()?;
        Some(Message::new(mtype).with_str("DATA", B64.encode(json)))
    }

    fn handle_block(&self, event: &RouterEvent) {
        let Some(value) = Self::payload(&event.message) else {
            warn!(peer = %event.peername, "undecodable BLOCK payload");
            return;
        };
        let block = match Block::sanitize(value) {
            Ok(block) => block,
            Err(err) => {
                warn!(peer = %event.peername, error = %err, "malformed block");
                return;
            }
        };

        match self.chain.submit_block(&block) {
            Ok(()) => {
                if let Some(onward) = Self::wrap(MSG_BLOCK, &block) {
                    let fanout = self.fleet.gossip(onward);
                    debug!(height = block.index, fanout, "block gossiped");
                }
            }
            Err(err) => {
                warn!(peer = %event.peername, height = block.index, error = %err, "rejected block");
            }
        }
    }

    fn handle_transaction(&self, event: &RouterEvent) {
        let Some(value) = Self::payload(&event.message) else {
            warn!(peer = %event.peername, "undecodable TRANSACTION payload");
            return;
        };
        let tx = match Transaction::sanitize(value) {
            Ok(tx) => tx,
            Err(err) => {
                warn!(peer = %event.peername, error = %err, "malformed transaction");
                return;
            }
        };

        match self.chain.submit_transaction(&tx) {
            Ok(()) => {
                debug!(txid = %tx.id, "transaction accepted");
                if let Some(onward) = Self::wrap(MSG_TRANSACTION, &tx) {
                    self.fleet.gossip(onward);
                }
            }
            Err(err) => {
                warn!(peer = %event.peername, txid = %tx.id, error = %err, "rejected transaction");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_produces_a_decodable_payload() {
        let tx = Transaction::coinbase(5, "miner", 1_700_000_000);
        let msg = Router::wrap(MSG_TRANSACTION, &tx).unwrap();
        assert_eq!(msg.mtype, "TRANSACTION");

        let value = Router::payload(&msg).unwrap();
        let back = Transaction::sanitize(value).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn payload_rejects_bad_base64() {
        let msg = Message::new(MSG_BLOCK).with_str("DATA", "not-base64!!!");
        assert!(Router::payload(&msg).is_none());
    }

    #[test]
    fn payload_rejects_missing_data() {
        let msg = Message::new(MSG_BLOCK).with_int("HEIGHT", 2);
        assert!(Router::payload(&msg).is_none());
    }
}
