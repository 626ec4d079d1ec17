//! SRP-6a key agreement.
//!
//! RFC-5054-style SRP-6a over a per-peer `(prime, generator)` group:
//!
//! ```text
//! k = H(N ‖ PAD(g))            x = H(salt ‖ H(identifier ‖ ":" ‖ password))
//! v = g^x                      u = H(PAD(A) ‖ PAD(B))
//! A = g^a                      B = k·v + g^b
//! client: S = (B − k·g^x)^(a + u·x)
//! server: S = (A · v^u)^b
//! ```
//!
//! `H` is SHA-256 over big-endian magnitudes; `PAD` left-pads to the prime
//! width. The shared master key is SHA-512 of `S`; the session key is its
//! first 32 bytes. A public value congruent to zero mod N is illegal and
//! aborts the handshake.

use num_bigint::BigUint;
use num_traits::Zero;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};

use ghost_core::error::AuthError;

use crate::cipher::SessionKey;

/// RFC 5054 Appendix A, 2048-bit group prime.
const RFC5054_2048_PRIME: &str = "\
AC6BDB41324A9A9BF166DE5E1389582FAF72B6651987EE07FC3192943DB56050\
A37329CBB4A099ED8193E0757767A13DD52312AB4B03310DCD7F48A9DA04FD50\
E8083969EDB767B0CF6095179A163AB3661A05FBD5FAAAE82918A9962F0B93B8\
55F97993EC975EEAA80D740ADBF4FF747359D041D5C33EA71D281E446B14773B\
CA97B43A23FB801676BD207A436C6481F1D2B9078717461A5B9D32E688F87748\
544523B524B0D57D5EA77A2775D2ECFA032CFBDBF52FB3786160279004E57AE6\
AF874E7303CE53299CCC041C7BC308D82A5698F3A8D0C38271AE35F8E9DBFBB6\
94B5C803D89F7AE435DE236D525F54759B65E372FCD68EF20FA7111F9E4AFF73";

/// Number of random bytes behind each ephemeral secret.
const EPHEMERAL_LEN: usize = 32;

/// The `(prime, generator)` pair a peer pair agrees on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrpGroup {
    prime: BigUint,
    generator: BigUint,
}

impl SrpGroup {
    /// Build a group from big-endian magnitudes.
    ///
    /// Rejects primes narrower than 256 bits and generators below 2.
    pub fn new(prime: &[u8], generator: &[u8]) -> Result<Self, AuthError> {
        let prime = BigUint::from_bytes_be(prime);
        let generator = BigUint::from_bytes_be(generator);
        if prime.bits() < 256 {
            return Err(AuthError::MalformedHandshake("prime too small".into()));
        }
        if generator < BigUint::from(2u32) {
            return Err(AuthError::MalformedHandshake("bad generator".into()));
        }
        Ok(Self { prime, generator })
    }

    /// The standard 2048-bit group with generator 2.
    pub fn rfc5054_2048() -> Self {
        let prime = BigUint::parse_bytes(RFC5054_2048_PRIME.as_bytes(), 16)
            .expect("group constant is valid hex");
        Self {
            prime,
            generator: BigUint::from(2u32),
        }
    }

    /// The prime as a big-endian magnitude.
    pub fn prime_bytes(&self) -> Vec<u8> {
        self.prime.to_bytes_be()
    }

    /// The generator as a big-endian magnitude.
    pub fn generator_bytes(&self) -> Vec<u8> {
        self.generator.to_bytes_be()
    }

    /// Left-pad a magnitude to the prime's byte width.
    fn pad(&self, value: &BigUint) -> Vec<u8> {
        let width = self.prime.to_bytes_be().len();
        let bytes = value.to_bytes_be();
        let mut out = vec![0u8; width.saturating_sub(bytes.len())];
        out.extend_from_slice(&bytes);
        out
    }

    /// The SRP-6a multiplier `k = H(N ‖ PAD(g))`.
    fn multiplier(&self) -> BigUint {
        let mut hasher = Sha256::new();
        hasher.update(self.prime.to_bytes_be());
        hasher.update(self.pad(&self.generator));
        BigUint::from_bytes_be(&hasher.finalize())
    }

    /// The scrambling parameter `u = H(PAD(A) ‖ PAD(B))`.
    fn scrambler(&self, a_pub: &BigUint, b_pub: &BigUint) -> BigUint {
        let mut hasher = Sha256::new();
        hasher.update(self.pad(a_pub));
        hasher.update(self.pad(b_pub));
        BigUint::from_bytes_be(&hasher.finalize())
    }
}

/// The private key `x = H(salt ‖ H(identifier ‖ ":" ‖ password))`.
fn private_key(salt: &[u8], identifier: &str, password: &str) -> BigUint {
    let inner = Sha256::digest(format!("{identifier}:{password}"));
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(inner);
    BigUint::from_bytes_be(&hasher.finalize())
}

/// The verifier `v = g^x mod N` as a big-endian magnitude.
pub fn derive_verifier(group: &SrpGroup, salt: &[u8], identifier: &str, password: &str) -> Vec<u8> {
    let x = private_key(salt, identifier, password);
    group.generator.modpow(&x, &group.prime).to_bytes_be()
}

/// A fresh random salt.
pub fn generate_salt() -> Vec<u8> {
    let mut salt = vec![0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

fn random_ephemeral() -> BigUint {
    let mut bytes = [0u8; EPHEMERAL_LEN];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    BigUint::from_bytes_be(&bytes)
}

/// Hash the premaster secret into the session key (SHA-512, truncated to
/// the AES-256 key size).
fn session_key_from_premaster(group: &SrpGroup, premaster: &BigUint) -> SessionKey {
    let master = Sha512::digest(group.pad(premaster));
    SessionKey::from_master(&master).expect("SHA-512 output is 64 bytes")
}

/// Server side of the exchange, holding the verifier and ephemeral `b`.
pub struct SrpServer {
    group: SrpGroup,
    verifier: BigUint,
    b: BigUint,
    b_pub: BigUint,
}

impl SrpServer {
    /// Instantiate with the peer's verifier; generates the ephemeral and
    /// the public value `B = k·v + g^b mod N`.
    pub fn new(group: SrpGroup, verifier: &[u8]) -> Self {
        let verifier = BigUint::from_bytes_be(verifier);
        let b = random_ephemeral();
        let k = group.multiplier();
        let g_b = group.generator.modpow(&b, &group.prime);
        let b_pub = (k * &verifier + g_b) % &group.prime;
        Self {
            group,
            verifier,
            b,
            b_pub,
        }
    }

    /// Our public value `B` as a big-endian magnitude.
    pub fn public_value(&self) -> Vec<u8> {
        self.b_pub.to_bytes_be()
    }

    /// Derive the session key from the peer's public value `A`.
    ///
    /// `A ≡ 0 mod N` is illegal (it would fix the premaster at zero).
    pub fn session_key(&self, a_pub: &[u8]) -> Result<SessionKey, AuthError> {
        let a_pub = BigUint::from_bytes_be(a_pub);
        if (&a_pub % &self.group.prime).is_zero() {
            return Err(AuthError::IllegalPublicValue);
        }
        let u = self.group.scrambler(&a_pub, &self.b_pub);
        let v_u = self.verifier.modpow(&u, &self.group.prime);
        let premaster = ((a_pub * v_u) % &self.group.prime).modpow(&self.b, &self.group.prime);
        Ok(session_key_from_premaster(&self.group, &premaster))
    }
}

/// Client side of the exchange, holding the ephemeral `a`.
pub struct SrpClient {
    group: SrpGroup,
    a: BigUint,
    a_pub: BigUint,
}

impl SrpClient {
    /// Instantiate with a fresh ephemeral; `A = g^a mod N`.
    pub fn new(group: SrpGroup) -> Self {
        let a = random_ephemeral();
        let a_pub = group.generator.modpow(&a, &group.prime);
        Self { group, a, a_pub }
    }

    /// Our public value `A` as a big-endian magnitude.
    pub fn public_value(&self) -> Vec<u8> {
        self.a_pub.to_bytes_be()
    }

    /// Derive the session key from the salt, our credentials, and the
    /// server's public value `B`.
    pub fn session_key(
        &self,
        salt: &[u8],
        identifier: &str,
        password: &str,
        b_pub: &[u8],
    ) -> Result<SessionKey, AuthError> {
        let b_pub = BigUint::from_bytes_be(b_pub);
        if (&b_pub % &self.group.prime).is_zero() {
            return Err(AuthError::IllegalPublicValue);
        }

        let n = &self.group.prime;
        let x = private_key(salt, identifier, password);
        let u = self.group.scrambler(&self.a_pub, &b_pub);
        let k = self.group.multiplier();

        // base = B − k·g^x mod N, kept non-negative by adding N first
        let k_g_x = (k * self.group.generator.modpow(&x, n)) % n;
        let base = ((b_pub % n) + n - k_g_x) % n;
        let exponent = &self.a + u * x;
        let premaster = base.modpow(&exponent, n);
        Ok(session_key_from_premaster(&self.group, &premaster))
    }
}
