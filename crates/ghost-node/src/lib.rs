//! Ghost full-node wiring.
//!
//! Connects the consensus core to the peer fleet: configuration loading,
//! in-memory reference implementations of the store interfaces, the
//! ed25519 key scheme, and the router task that feeds peer messages into
//! the validator. Durable storage engines live outside this workspace and
//! replace the reference stores through the same `ghost-core` traits.

pub mod config;
pub mod keys;
pub mod node;
pub mod router;
pub mod store;

pub use config::NodeConfig;
pub use node::Node;
pub use router::Router;
