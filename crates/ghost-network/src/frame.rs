//! The Ghost frame codec.
//!
//! A frame is a pipe-delimited ASCII header followed by a binary body:
//!
//! ```text
//! Ghost|<payload_length>|<TYPE>|<body>
//! ```
//!
//! A plaintext body is a pipe-separated list of `NAME:<tag><value>` pairs,
//! where the tag is `+` for decimal integers and `^` for strings. Unknown
//! tags are rejected; there is no list tag, so list-valued parameters are
//! rejected outright. Binary values travel base64-encoded in string
//! parameters.
//!
//! Encrypted frames carry `nonce ‖ ciphertext` of the plaintext body in
//! place of it; only the handshake types travel in cleartext, because the
//! session key does not exist yet.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use ghost_core::error::WireError;

use crate::cipher::SessionKey;

/// Leading magic of every frame.
pub const MAGIC: &str = "Ghost";

/// Hard cap on a frame body: the block size limit plus framing headroom.
pub const MAX_FRAME_PAYLOAD: usize = 8 * 1024 * 1024 + 64 * 1024;

/// Cap on the ASCII header (`Ghost|len|TYPE|`).
const MAX_HEADER_LEN: usize = 128;

/// Message types exchanged before a session key exists.
pub const HANDSHAKE_TYPES: [&str; 4] = [
    "HANDSHAKE",
    "HANDSHAKE_CHALLENGE",
    "HANDSHAKE_AUTH",
    "INVALID_AUTH",
];

/// A typed Ghost parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// `+` tag: decimal integer.
    Int(i128),
    /// `^` tag: UTF-8 string without `|`.
    Str(String),
}

impl ParamValue {
    /// Build a parameter value from a JSON scalar.
    ///
    /// Arrays are rejected: the wire has no list encoding.
    pub fn try_from_json(value: &serde_json::Value) -> Result<Self, WireError> {
        match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(|v| ParamValue::Int(v as i128))
                .ok_or_else(|| WireError::MalformedParam(format!("non-integer number {n}"))),
            serde_json::Value::String(s) => Ok(ParamValue::Str(s.clone())),
            serde_json::Value::Array(_) => Err(WireError::ListParamUnsupported),
            other => Err(WireError::MalformedParam(format!(
                "unsupported value {other}"
            ))),
        }
    }
}

/// A decoded Ghost message: a type plus ordered named parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Upper-case message type, e.g. `PING`.
    pub mtype: String,
    /// Ordered `(NAME, value)` pairs.
    pub params: Vec<(String, ParamValue)>,
}

impl Message {
    /// A message with no parameters. The type is upper-cased.
    pub fn new(mtype: impl Into<String>) -> Self {
        Self {
            mtype: mtype.into().to_ascii_uppercase(),
            params: Vec::new(),
        }
    }

    /// Append an integer parameter. Names are upper-cased.
    pub fn with_int(mut self, name: &str, value: i128) -> Self {
        self.params
            .push((name.to_ascii_uppercase(), ParamValue::Int(value)));
        self
    }

    /// Append a string parameter. Names are upper-cased.
    pub fn with_str(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params
            .push((name.to_ascii_uppercase(), ParamValue::Str(value.into())));
        self
    }

    /// Look up an integer parameter by name.
    pub fn int(&self, name: &str) -> Option<i128> {
        self.params.iter().find_map(|(n, v)| match v {
            ParamValue::Int(i) if n == name => Some(*i),
            _ => None,
        })
    }

    /// Look up a string parameter by name.
    pub fn str(&self, name: &str) -> Option<&str> {
        self.params.iter().find_map(|(n, v)| match v {
            ParamValue::Str(s) if n == name => Some(s.as_str()),
            _ => None,
        })
    }

    /// Whether this type travels in cleartext (pre-session handshake).
    pub fn is_handshake(&self) -> bool {
        HANDSHAKE_TYPES.contains(&self.mtype.as_str())
    }

    /// Encode the plaintext body: `NAME:+int` / `NAME:^str` joined by `|`.
    pub fn encode_body(&self) -> Result<Vec<u8>, WireError> {
        let mut parts = Vec::with_capacity(self.params.len());
        for (name, value) in &self.params {
            if name.is_empty() || name.contains(['|', ':']) {
                return Err(WireError::MalformedParam(format!("bad name {name:?}")));
            }
            match value {
                ParamValue::Int(i) => parts.push(format!("{name}:+{i}")),
                ParamValue::Str(s) => {
                    if s.contains('|') {
                        return Err(WireError::MalformedParam(format!(
                            "string value for {name} contains '|'"
                        )));
                    }
                    parts.push(format!("{name}:^{s}"));
                }
            }
        }
        Ok(parts.join("|").into_bytes())
    }

    /// Parse a plaintext body against a frame type.
    pub fn decode_body(mtype: &str, body: &[u8]) -> Result<Self, WireError> {
        let text = std::str::from_utf8(body)
            .map_err(|_| WireError::MalformedParam("body is not UTF-8".into()))?;

        let mut params = Vec::new();
        if !text.is_empty() {
            for part in text.split('|') {
                let (name, rest) = part
                    .split_once(':')
                    .ok_or_else(|| WireError::MalformedParam(format!("missing ':' in {part:?}")))?;
                if name.is_empty() {
                    return Err(WireError::MalformedParam("empty parameter name".into()));
                }
                let mut chars = rest.chars();
                let tag = chars
                    .next()
                    .ok_or_else(|| WireError::MalformedParam(format!("missing tag in {part:?}")))?;
                let value = chars.as_str();
                match tag {
                    '+' => {
                        let i = value.parse::<i128>().map_err(|_| {
                            WireError::MalformedParam(format!("bad integer {value:?}"))
                        })?;
                        params.push((name.to_string(), ParamValue::Int(i)));
                    }
                    '^' => params.push((name.to_string(), ParamValue::Str(value.to_string()))),
                    other => return Err(WireError::UnknownTypeTag(other)),
                }
            }
        }

        Ok(Self {
            mtype: mtype.to_string(),
            params,
        })
    }

    /// Encode a complete cleartext frame.
    pub fn encode_frame(&self) -> Result<Vec<u8>, WireError> {
        let body = self.encode_body()?;
        Ok(frame_with_body(&self.mtype, &body))
    }

    /// Encode a complete frame with the body sealed under `key`.
    pub fn encode_frame_encrypted(&self, key: &SessionKey) -> Result<Vec<u8>, WireError> {
        let body = key.seal(&self.encode_body()?)?;
        Ok(frame_with_body(&self.mtype, &body))
    }

    /// Decode a received `(type, body)` pair, decrypting when a session key
    /// is supplied and the type is not a handshake type.
    pub fn decode(mtype: &str, body: &[u8], key: Option<&SessionKey>) -> Result<Self, WireError> {
        match key {
            Some(key) if !HANDSHAKE_TYPES.contains(&mtype) => {
                let plain = key.open(body)?;
                Self::decode_body(mtype, &plain)
            }
            _ => Self::decode_body(mtype, body),
        }
    }
}

fn frame_with_body(mtype: &str, body: &[u8]) -> Vec<u8> {
    let header = format!("{MAGIC}|{}|{}|", body.len(), mtype);
    let mut frame = Vec::with_capacity(header.len() + body.len());
    frame.extend_from_slice(header.as_bytes());
    frame.extend_from_slice(body);
    frame
}

/// Read one frame from `reader`, returning `(type, raw body)`.
///
/// The header is consumed byte-by-byte up to the third pipe, then exactly
/// `payload_length` body bytes are read. The body is returned undecrypted;
/// callers decide per type whether a session key applies.
pub async fn read_frame<R>(reader: &mut R) -> Result<(String, Vec<u8>), WireError>
where
    R: AsyncRead + Unpin,
{
    let mut header = Vec::with_capacity(32);
    let mut pipes = 0usize;
    while pipes < 3 {
        let byte = reader
            .read_u8()
            .await
            .map_err(|e| WireError::Io(e.to_string()))?;
        if byte == b'|' {
            pipes += 1;
        }
        header.push(byte);
        if header.len() > MAX_HEADER_LEN {
            return Err(WireError::MalformedHeader("header too long".into()));
        }
    }

    let header = std::str::from_utf8(&header)
        .map_err(|_| WireError::MalformedHeader("header is not ASCII".into()))?;
    let mut fields = header.trim_end_matches('|').splitn(3, '|');
    let magic = fields.next().unwrap_or_default();
    if magic != MAGIC {
        return Err(WireError::BadMagic);
    }
    let len: usize = fields
        .next()
        .unwrap_or_default()
        .parse()
        .map_err(|_| WireError::MalformedHeader("bad payload length".into()))?;
    let mtype = fields.next().unwrap_or_default().to_string();
    if mtype.is_empty() {
        return Err(WireError::MalformedHeader("empty message type".into()));
    }
    if len > MAX_FRAME_PAYLOAD {
        return Err(WireError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_PAYLOAD,
        });
    }

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| WireError::Io(e.to_string()))?;
    Ok((mtype, body))
}

/// Write pre-encoded frame bytes to `writer`.
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(frame)
        .await
        .map_err(|e| WireError::Io(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| WireError::Io(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ping() -> Message {
        Message::new("PING").with_int("NONCE", 7)
    }

    #[test]
    fn body_encodes_typed_params() {
        let msg = Message::new("BLOCK")
            .with_int("INDEX", 42)
            .with_str("HASH", "abcd");
        assert_eq!(msg.encode_body().unwrap(), b"INDEX:+42|HASH:^abcd");
    }

    #[test]
    fn empty_message_has_empty_body() {
        assert_eq!(Message::new("PING").encode_body().unwrap(), b"");
    }

    #[test]
    fn names_and_types_are_upper_cased() {
        let msg = Message::new("ping").with_str("hash", "x");
        assert_eq!(msg.mtype, "PING");
        assert_eq!(msg.params[0].0, "HASH");
    }

    #[test]
    fn negative_integers_round_trip() {
        let msg = Message::new("T").with_int("DELTA", -12);
        let decoded = Message::decode_body("T", &msg.encode_body().unwrap()).unwrap();
        assert_eq!(decoded.int("DELTA"), Some(-12));
    }

    #[test]
    fn string_with_pipe_is_rejected_on_encode() {
        let msg = Message::new("T").with_str("DATA", "a|b");
        assert!(matches!(
            msg.encode_body(),
            Err(WireError::MalformedParam(_))
        ));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert_eq!(
            Message::decode_body("T", b"DATA:*xyz"),
            Err(WireError::UnknownTypeTag('*'))
        );
    }

    #[test]
    fn missing_colon_is_rejected() {
        assert!(matches!(
            Message::decode_body("T", b"DATA^xyz"),
            Err(WireError::MalformedParam(_))
        ));
    }

    #[test]
    fn value_containing_colon_parses() {
        let msg = Message::new("T").with_str("PEER", "10.0.0.1:31013");
        let decoded = Message::decode_body("T", &msg.encode_body().unwrap()).unwrap();
        assert_eq!(decoded.str("PEER"), Some("10.0.0.1:31013"));
    }

    #[test]
    fn json_scalars_convert() {
        assert_eq!(
            ParamValue::try_from_json(&serde_json::json!(5)).unwrap(),
            ParamValue::Int(5)
        );
        assert_eq!(
            ParamValue::try_from_json(&serde_json::json!("s")).unwrap(),
            ParamValue::Str("s".into())
        );
    }

    #[test]
    fn json_lists_are_rejected() {
        assert_eq!(
            ParamValue::try_from_json(&serde_json::json!([1, 2])),
            Err(WireError::ListParamUnsupported)
        );
    }

    #[test]
    fn frame_layout() {
        let frame = ping().encode_frame().unwrap();
        assert!(frame.starts_with(b"Ghost|8|PING|"));
    }

    #[tokio::test]
    async fn frame_round_trip_cleartext() {
        let msg = Message::new("PEERS").with_str("ADDR", "1.2.3.4").with_int("PORT", 31013);
        let frame = msg.encode_frame().unwrap();
        let (mtype, body) = read_frame(&mut frame.as_slice()).await.unwrap();
        assert_eq!(Message::decode(&mtype, &body, None).unwrap(), msg);
    }

    #[tokio::test]
    async fn frame_round_trip_encrypted() {
        let key = SessionKey::from_bytes([7u8; 32]);
        let msg = Message::new("BLOCK").with_str("DATA", "eyJ9");
        let frame = msg.encode_frame_encrypted(&key).unwrap();
        let (mtype, body) = read_frame(&mut frame.as_slice()).await.unwrap();
        // Ciphertext differs from the plaintext body
        assert_ne!(body, msg.encode_body().unwrap());
        assert_eq!(Message::decode(&mtype, &body, Some(&key)).unwrap(), msg);
    }

    #[tokio::test]
    async fn handshake_frames_bypass_the_session_key() {
        let key = SessionKey::from_bytes([9u8; 32]);
        let msg = Message::new("HANDSHAKE").with_str("IDENTIFIER", "peer-1");
        let frame = msg.encode_frame().unwrap();
        let (mtype, body) = read_frame(&mut frame.as_slice()).await.unwrap();
        assert_eq!(Message::decode(&mtype, &body, Some(&key)).unwrap(), msg);
    }

    #[tokio::test]
    async fn wrong_key_fails_decryption() {
        let key = SessionKey::from_bytes([1u8; 32]);
        let other = SessionKey::from_bytes([2u8; 32]);
        let frame = ping().encode_frame_encrypted(&key).unwrap();
        let (mtype, body) = read_frame(&mut frame.as_slice()).await.unwrap();
        assert_eq!(
            Message::decode(&mtype, &body, Some(&other)),
            Err(WireError::DecryptFailed)
        );
    }

    #[tokio::test]
    async fn bad_magic_is_rejected() {
        let mut data = b"Gh0st|0|PING|".as_slice();
        assert_eq!(read_frame(&mut data).await, Err(WireError::BadMagic));
    }

    #[tokio::test]
    async fn oversized_payload_is_rejected() {
        let header = format!("Ghost|{}|PING|", MAX_FRAME_PAYLOAD + 1);
        let mut data = header.as_bytes();
        assert!(matches!(
            read_frame(&mut data).await,
            Err(WireError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn truncated_body_is_an_io_error() {
        let mut data = b"Ghost|10|PING|short".as_slice();
        assert!(matches!(read_frame(&mut data).await, Err(WireError::Io(_))));
    }

    #[tokio::test]
    async fn runaway_header_is_rejected() {
        let long = vec![b'G'; MAX_HEADER_LEN + 2];
        let mut data = long.as_slice();
        assert!(matches!(
            read_frame(&mut data).await,
            Err(WireError::MalformedHeader(_))
        ));
    }

    proptest! {
        #[test]
        fn arbitrary_messages_round_trip(
            mtype in "[A-Z_]{1,16}",
            ints in proptest::collection::vec((0usize..8, any::<i128>()), 0..6),
            strs in proptest::collection::vec("[a-zA-Z0-9+/=:. ]{0,32}", 0..6),
        ) {
            let mut msg = Message::new(mtype);
            for (i, v) in &ints {
                msg = msg.with_int(&format!("I{i}"), *v);
            }
            for (i, s) in strs.iter().enumerate() {
                msg = msg.with_str(&format!("S{i}"), s.clone());
            }
            let body = msg.encode_body().unwrap();
            let decoded = Message::decode_body(&msg.mtype, &body).unwrap();
            prop_assert_eq!(decoded, msg);
        }
    }
}
