//! One-byte liveness responder.
//!
//! Listens on its own port, outside the Ghost protocol: a probe sends
//! `0x00` and gets `0x01` back, then the connection is closed and the next
//! one accepted. Exactly one connection is served at a time; concurrent
//! probes queue in the kernel backlog (or are refused when it overflows).

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, warn};

/// Probe byte a client sends.
pub const HEALTH_PROBE: u8 = 0x00;

/// Reply byte for a healthy node.
pub const HEALTH_REPLY: u8 = 0x01;

/// Serve health probes forever on an already-bound listener.
pub async fn serve(listener: TcpListener) {
    loop {
        let (mut socket, addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(error = %err, "health accept failed");
                continue;
            }
        };

        let mut probe = [0u8; 1];
        match socket.read_exact(&mut probe).await {
            Ok(_) if probe[0] == HEALTH_PROBE => {
                if let Err(err) = socket.write_all(&[HEALTH_REPLY]).await {
                    debug!(peer = %addr, error = %err, "health reply failed");
                }
            }
            Ok(_) => debug!(peer = %addr, byte = probe[0], "unexpected health probe byte"),
            Err(err) => debug!(peer = %addr, error = %err, "health probe read failed"),
        }
        // socket drops here; the next probe is accepted on the next turn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn probe_gets_reply_and_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener));

        let mut probe = TcpStream::connect(addr).await.unwrap();
        probe.write_all(&[HEALTH_PROBE]).await.unwrap();
        let mut reply = [0u8; 1];
        probe.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[0], HEALTH_REPLY);

        // Peer closes after replying.
        let mut rest = Vec::new();
        probe.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn responder_survives_bad_probe_and_serves_the_next() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener));

        // Wrong byte: no reply, connection closed.
        let mut bad = TcpStream::connect(addr).await.unwrap();
        bad.write_all(&[0xFF]).await.unwrap();
        let mut rest = Vec::new();
        bad.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        // A subsequent good probe is still served.
        let mut good = TcpStream::connect(addr).await.unwrap();
        good.write_all(&[HEALTH_PROBE]).await.unwrap();
        let mut reply = [0u8; 1];
        good.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[0], HEALTH_REPLY);
    }
}
