//! The Ghost peer-to-peer layer.
//!
//! Bytes flow `socket → frame codec → handler`, which decrypts with the
//! session key negotiated by the SRP-6a handshake and either answers
//! locally (PING/PANG) or forwards to the parent consumer. Outbound,
//! the consumer hands a typed [`frame::Message`] to a handler, which
//! encodes, encrypts, and writes it.
//!
//! The [`supervisor::Fleet`] owns the listen socket and a fixed pool of
//! connection handlers, restarting each independently.

pub mod auth;
pub mod cipher;
pub mod config;
pub mod discovery;
pub mod frame;
pub mod handler;
pub mod health;
pub mod srp;
pub mod supervisor;

pub use cipher::SessionKey;
pub use config::NetworkConfig;
pub use frame::{Message, ParamValue};
pub use supervisor::{Fleet, RouterEvent};
