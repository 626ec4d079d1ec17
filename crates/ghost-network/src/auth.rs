//! The Ghost handshake: SRP-6a over cleartext frames.
//!
//! Two inbound flows:
//!
//! - **Registration** — the first frame carries the full
//!   `{identifier, salt, prime, generator, verifier, public_value}` set. We
//!   answer `HANDSHAKE_AUTH` with our public value, derive the session key,
//!   and persist the peer record.
//! - **Challenge** — the first frame carries only `{identifier}`. We load
//!   the persisted record, answer `HANDSHAKE_CHALLENGE`, read the peer's
//!   public value from its `HANDSHAKE_AUTH`, and derive the key.
//!
//! Outbound is symmetric; the caller picks a [`HandshakeStrategy`]. Any
//! malformed or inconsistent handshake gets a best-effort `INVALID_AUTH`
//! before the connection is dropped.
//!
//! Binary material (salts, group magnitudes, public values) travels
//! base64-encoded in string parameters.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use ghost_core::error::AuthError;
use ghost_core::traits::{PeerRecord, PeerStore};

use crate::cipher::SessionKey;
use crate::frame::{read_frame, write_frame, Message};
use crate::srp::{derive_verifier, generate_salt, SrpClient, SrpGroup, SrpServer};

/// Our identity toward remote peers.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub identifier: String,
    pub password: String,
}

impl Credentials {
    /// Fresh credentials with a random password, for nodes without a
    /// configured identity.
    pub fn generate(identifier: impl Into<String>) -> Self {
        use rand::RngCore;
        let mut secret = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut secret);
        Self {
            identifier: identifier.into(),
            password: hex::encode(secret),
        }
    }
}

/// How the outbound side opens the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStrategy {
    /// Send the full registration set (first contact, or verifier refresh).
    Register,
    /// Send only the identifier and expect a challenge.
    Identify,
}

/// A completed handshake.
pub struct AuthOutcome {
    /// 32-byte AES-256 key both sides derived.
    pub session_key: SessionKey,
    /// The peer identifier that authenticated.
    pub identifier: String,
}

fn b64_param(msg: &Message, name: &str) -> Result<Vec<u8>, AuthError> {
    let value = msg
        .str(name)
        .ok_or_else(|| AuthError::MalformedHandshake(format!("missing {name}")))?;
    B64.decode(value)
        .map_err(|_| AuthError::MalformedHandshake(format!("{name} is not base64")))
}

async fn send_cleartext<S>(stream: &mut S, msg: &Message) -> Result<(), AuthError>
where
    S: AsyncWrite + Unpin,
{
    let frame = msg.encode_frame()?;
    write_frame(stream, &frame).await?;
    Ok(())
}

async fn read_cleartext<S>(stream: &mut S) -> Result<Message, AuthError>
where
    S: AsyncRead + Unpin,
{
    let (mtype, body) = read_frame(stream).await?;
    let msg = Message::decode_body(&mtype, &body)?;
    if msg.mtype == "INVALID_AUTH" {
        return Err(AuthError::Rejected);
    }
    Ok(msg)
}

/// Run the server side of the handshake on a fresh inbound socket.
///
/// On failure a best-effort `INVALID_AUTH` is written before the error is
/// returned; the caller closes the connection either way.
pub async fn authenticate_inbound<S>(
    stream: &mut S,
    peer_store: &dyn PeerStore,
) -> Result<AuthOutcome, AuthError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match inbound_flow(stream, peer_store).await {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            if !matches!(err, AuthError::Rejected) {
                let _ = send_cleartext(stream, &Message::new("INVALID_AUTH")).await;
                let _ = stream.shutdown().await;
            }
            Err(err)
        }
    }
}

async fn inbound_flow<S>(
    stream: &mut S,
    peer_store: &dyn PeerStore,
) -> Result<AuthOutcome, AuthError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let opening = read_cleartext(stream).await?;
    if opening.mtype != "HANDSHAKE" {
        return Err(AuthError::MalformedHandshake(format!(
            "expected HANDSHAKE, got {}",
            opening.mtype
        )));
    }
    let identifier = opening
        .str("IDENTIFIER")
        .ok_or_else(|| AuthError::MalformedHandshake("missing IDENTIFIER".into()))?
        .to_string();
    // The version tag is informational until a breaking protocol revision.
    tracing::debug!(
        identifier = %identifier,
        version = opening.int("VERSION").unwrap_or(0) as u64,
        "handshake opened"
    );

    if opening.str("VERIFIER").is_some() {
        // Registration: the peer supplies its own SRP material.
        let salt = b64_param(&opening, "SALT")?;
        let prime = b64_param(&opening, "PRIME")?;
        let generator = b64_param(&opening, "GENERATOR")?;
        let verifier = b64_param(&opening, "VERIFIER")?;
        let a_pub = b64_param(&opening, "PUBLIC_VALUE")?;

        let group = SrpGroup::new(&prime, &generator)?;
        let server = SrpServer::new(group, &verifier);

        send_cleartext(
            stream,
            &Message::new("HANDSHAKE_AUTH")
                .with_str("PUBLIC_VALUE", B64.encode(server.public_value())),
        )
        .await?;

        let session_key = server.session_key(&a_pub)?;

        peer_store.save(PeerRecord {
            identifier: identifier.clone(),
            salt,
            prime,
            generator,
            verifier,
        })?;

        Ok(AuthOutcome {
            session_key,
            identifier,
        })
    } else {
        // Challenge: the peer registered earlier; we hold its record.
        let record = peer_store
            .load(&identifier)?
            .ok_or_else(|| AuthError::UnknownPeer(identifier.clone()))?;

        let group = SrpGroup::new(&record.prime, &record.generator)?;
        let server = SrpServer::new(group, &record.verifier);

        send_cleartext(
            stream,
            &Message::new("HANDSHAKE_CHALLENGE")
                .with_str("SALT", B64.encode(&record.salt))
                .with_str("PRIME", B64.encode(&record.prime))
                .with_str("GENERATOR", B64.encode(&record.generator))
                .with_str("PUBLIC_VALUE", B64.encode(server.public_value())),
        )
        .await?;

        let reply = read_cleartext(stream).await?;
        if reply.mtype != "HANDSHAKE_AUTH" {
            return Err(AuthError::MalformedHandshake(format!(
                "expected HANDSHAKE_AUTH, got {}",
                reply.mtype
            )));
        }
        let a_pub = b64_param(&reply, "PUBLIC_VALUE")?;
        let session_key = server.session_key(&a_pub)?;

        Ok(AuthOutcome {
            session_key,
            identifier,
        })
    }
}

/// Run the client side of the handshake on a freshly dialed socket.
///
/// `protocol_version` is announced in the opening frame.
pub async fn authenticate_outbound<S>(
    stream: &mut S,
    credentials: &Credentials,
    strategy: HandshakeStrategy,
    protocol_version: u64,
) -> Result<AuthOutcome, AuthError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match strategy {
        HandshakeStrategy::Register => register_flow(stream, credentials, protocol_version).await,
        HandshakeStrategy::Identify => identify_flow(stream, credentials, protocol_version).await,
    }
}

async fn register_flow<S>(
    stream: &mut S,
    credentials: &Credentials,
    protocol_version: u64,
) -> Result<AuthOutcome, AuthError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let group = SrpGroup::rfc5054_2048();
    let salt = generate_salt();
    let verifier = derive_verifier(&group, &salt, &credentials.identifier, &credentials.password);
    let client = SrpClient::new(group.clone());

    send_cleartext(
        stream,
        &Message::new("HANDSHAKE")
            .with_str("IDENTIFIER", credentials.identifier.clone())
            .with_int("VERSION", protocol_version as i128)
            .with_str("SALT", B64.encode(&salt))
            .with_str("PRIME", B64.encode(group.prime_bytes()))
            .with_str("GENERATOR", B64.encode(group.generator_bytes()))
            .with_str("VERIFIER", B64.encode(&verifier))
            .with_str("PUBLIC_VALUE", B64.encode(client.public_value())),
    )
    .await?;

    let reply = read_cleartext(stream).await?;
    if reply.mtype != "HANDSHAKE_AUTH" {
        return Err(AuthError::MalformedHandshake(format!(
            "expected HANDSHAKE_AUTH, got {}",
            reply.mtype
        )));
    }
    let b_pub = b64_param(&reply, "PUBLIC_VALUE")?;
    let session_key = client.session_key(
        &salt,
        &credentials.identifier,
        &credentials.password,
        &b_pub,
    )?;

    Ok(AuthOutcome {
        session_key,
        identifier: credentials.identifier.clone(),
    })
}

async fn identify_flow<S>(
    stream: &mut S,
    credentials: &Credentials,
    protocol_version: u64,
) -> Result<AuthOutcome, AuthError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    send_cleartext(
        stream,
        &Message::new("HANDSHAKE")
            .with_str("IDENTIFIER", credentials.identifier.clone())
            .with_int("VERSION", protocol_version as i128),
    )
    .await?;

    let challenge = read_cleartext(stream).await?;
    if challenge.mtype != "HANDSHAKE_CHALLENGE" {
        return Err(AuthError::MalformedHandshake(format!(
            "expected HANDSHAKE_CHALLENGE, got {}",
            challenge.mtype
        )));
    }
    let salt = b64_param(&challenge, "SALT")?;
    let prime = b64_param(&challenge, "PRIME")?;
    let generator = b64_param(&challenge, "GENERATOR")?;
    let b_pub = b64_param(&challenge, "PUBLIC_VALUE")?;

    let group = SrpGroup::new(&prime, &generator)?;
    let client = SrpClient::new(group);

    send_cleartext(
        stream,
        &Message::new("HANDSHAKE_AUTH").with_str("PUBLIC_VALUE", B64.encode(client.public_value())),
    )
    .await?;

    let session_key = client.session_key(
        &salt,
        &credentials.identifier,
        &credentials.password,
        &b_pub,
    )?;

    Ok(AuthOutcome {
        session_key,
        identifier: credentials.identifier.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghost_core::error::StoreError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Minimal in-memory peer store for handshake tests.
    #[derive(Default)]
    struct TestPeerStore {
        records: Mutex<HashMap<String, PeerRecord>>,
    }

    impl PeerStore for TestPeerStore {
        fn load(&self, identifier: &str) -> Result<Option<PeerRecord>, StoreError> {
            Ok(self.records.lock().unwrap().get(identifier).cloned())
        }

        fn save(&self, record: PeerRecord) -> Result<(), StoreError> {
            self.records
                .lock()
                .unwrap()
                .insert(record.identifier.clone(), record);
            Ok(())
        }

        fn known_peers(&self) -> Result<Vec<(String, u16)>, StoreError> {
            Ok(Vec::new())
        }

        fn add_known_peer(&self, _ip: String, _port: u16) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn keys_agree(a: &SessionKey, b: &SessionKey) -> bool {
        let sealed = a.seal(b"probe").unwrap();
        b.open(&sealed).as_deref() == Ok(b"probe".as_slice())
    }

    #[tokio::test]
    async fn registration_handshake_derives_matching_keys() {
        let (mut client_io, mut server_io) = tokio::io::duplex(16 * 1024);
        let store = TestPeerStore::default();
        let creds = Credentials::generate("peer-1");

        let server = tokio::spawn(async move {
            let outcome = authenticate_inbound(&mut server_io, &store).await.unwrap();
            let registered = store.load("peer-1").unwrap().is_some();
            (outcome, registered)
        });

        let client =
            authenticate_outbound(&mut client_io, &creds, HandshakeStrategy::Register, 1)
                .await
                .unwrap();
        let (server, registered) = server.await.unwrap();

        assert!(registered, "peer store must hold the verifier");
        assert_eq!(server.identifier, "peer-1");
        assert!(keys_agree(&client.session_key, &server.session_key));
    }

    #[tokio::test]
    async fn challenge_handshake_after_registration() {
        let store = std::sync::Arc::new(TestPeerStore::default());
        let creds = Credentials::generate("peer-2");

        // First contact: register.
        let (mut client_io, mut server_io) = tokio::io::duplex(16 * 1024);
        let store2 = store.clone();
        let server =
            tokio::spawn(async move { authenticate_inbound(&mut server_io, &*store2).await });
        authenticate_outbound(&mut client_io, &creds, HandshakeStrategy::Register, 1)
            .await
            .unwrap();
        server.await.unwrap().unwrap();

        // Second contact: identifier-only challenge flow.
        let (mut client_io, mut server_io) = tokio::io::duplex(16 * 1024);
        let store2 = store.clone();
        let server =
            tokio::spawn(async move { authenticate_inbound(&mut server_io, &*store2).await });
        let client =
            authenticate_outbound(&mut client_io, &creds, HandshakeStrategy::Identify, 1)
                .await
                .unwrap();
        let server = server.await.unwrap().unwrap();

        assert!(keys_agree(&client.session_key, &server.session_key));
    }

    #[tokio::test]
    async fn unknown_identifier_is_rejected_with_invalid_auth() {
        let (mut client_io, mut server_io) = tokio::io::duplex(16 * 1024);
        let store = TestPeerStore::default();
        let creds = Credentials::generate("nobody");

        let server =
            tokio::spawn(async move { authenticate_inbound(&mut server_io, &store).await });
        let client =
            authenticate_outbound(&mut client_io, &creds, HandshakeStrategy::Identify, 1).await;

        assert!(matches!(client, Err(AuthError::Rejected)));
        assert!(matches!(
            server.await.unwrap(),
            Err(AuthError::UnknownPeer(_))
        ));
    }

    #[tokio::test]
    async fn non_handshake_opening_is_rejected() {
        let (mut client_io, mut server_io) = tokio::io::duplex(16 * 1024);
        let store = TestPeerStore::default();

        let server =
            tokio::spawn(async move { authenticate_inbound(&mut server_io, &store).await });

        let frame = Message::new("PING").encode_frame().unwrap();
        write_frame(&mut client_io, &frame).await.unwrap();
        let reply = read_cleartext(&mut client_io).await;

        assert!(matches!(reply, Err(AuthError::Rejected)));
        assert!(matches!(
            server.await.unwrap(),
            Err(AuthError::MalformedHandshake(_))
        ));
    }

    #[tokio::test]
    async fn garbage_group_material_is_rejected() {
        let (mut client_io, mut server_io) = tokio::io::duplex(16 * 1024);
        let store = std::sync::Arc::new(TestPeerStore::default());
        let store2 = store.clone();

        let server =
            tokio::spawn(async move { authenticate_inbound(&mut server_io, &*store2).await });

        // A "registration" whose prime is eight bytes wide.
        let frame = Message::new("HANDSHAKE")
            .with_str("IDENTIFIER", "peer-x")
            .with_str("SALT", B64.encode([1u8; 32]))
            .with_str("PRIME", B64.encode([0xFFu8; 8]))
            .with_str("GENERATOR", B64.encode([2u8]))
            .with_str("VERIFIER", B64.encode([5u8; 8]))
            .with_str("PUBLIC_VALUE", B64.encode([6u8; 8]))
            .encode_frame()
            .unwrap();
        write_frame(&mut client_io, &frame).await.unwrap();

        assert!(matches!(
            server.await.unwrap(),
            Err(AuthError::MalformedHandshake(_))
        ));
        assert!(store.load("peer-x").unwrap().is_none());
    }
}
