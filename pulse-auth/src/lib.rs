//! Authentication for Pulse.
//!
//! Pulse authenticates traffic with shared secrets. A [`Token`] is the HMAC-SHA256 of the
//! canonical JSON encoding of a payload, so two parties holding the same [`SharedSecret`] compute
//! identical tokens for logically identical documents regardless of key order or whitespace.
//!
//! Secrets are scoped to a [`TrustDomain`]. Requests from clients to Pulse are signed with an
//! [`InboundSecret`], and Pulse's own calls to the discovery registry with a [`DiscoverySecret`].
//! The two types cannot be used interchangeably.
//!
//! # Signing and Verifying
//!
//! ```
//! use pulse_auth::InboundSecret;
//! use serde_json::json;
//!
//! let secret: InboundSecret = "s3cr3t".parse().unwrap();
//! let payload = json!({"service_name": "intent-service", "latency": 12});
//!
//! let token = pulse_auth::sign(&secret, &payload);
//! assert!(pulse_auth::verify(&secret, &payload, token.as_str()));
//! ```

#![warn(missing_docs)]

use std::borrow::Cow;
use std::fmt;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::str::FromStr;

use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use sha2::Sha256;

mod gate;
pub use gate::*;

type HmacSha256 = Hmac<Sha256>;

/// The trust relationship a [`SharedSecret`] belongs to.
pub trait TrustDomain {
    /// Human readable name of the domain, used in diagnostics.
    const NAME: &'static str;
}

/// Trust domain between clients and this service.
#[derive(Debug)]
pub enum Inbound {}

impl TrustDomain for Inbound {
    const NAME: &'static str = "inbound";
}

/// Trust domain between this service and the discovery registry.
#[derive(Debug)]
pub enum Discovery {}

impl TrustDomain for Discovery {
    const NAME: &'static str = "discovery";
}

/// Raised if a secret could not be constructed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, thiserror::Error)]
pub enum SecretError {
    /// The secret contains no bytes.
    #[error("secret must not be empty")]
    Empty,
}

/// A symmetric key for one [`TrustDomain`].
///
/// The key is immutable after construction. Its `Debug` output never contains key material.
pub struct SharedSecret<D> {
    key: Box<[u8]>,
    domain: PhantomData<fn() -> D>,
}

/// Secret used to authenticate requests from clients.
pub type InboundSecret = SharedSecret<Inbound>;

/// Secret used to authenticate calls to the discovery registry.
pub type DiscoverySecret = SharedSecret<Discovery>;

impl<D: TrustDomain> SharedSecret<D> {
    /// Creates a secret from raw key bytes.
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self, SecretError> {
        let key = key.into();
        if key.is_empty() {
            return Err(SecretError::Empty);
        }

        Ok(Self {
            key: key.into_boxed_slice(),
            domain: PhantomData,
        })
    }

    /// Returns the name of the trust domain of this secret.
    pub fn domain(&self) -> &'static str {
        D::NAME
    }

    /// Returns `true` if both secrets use the same key material, regardless of their domain.
    pub fn shares_key_with<E>(&self, other: &SharedSecret<E>) -> bool {
        self.key == other.key
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key).expect("HMAC takes variable keys")
    }
}

impl<D> Clone for SharedSecret<D> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            domain: PhantomData,
        }
    }
}

impl<D: TrustDomain> fmt::Debug for SharedSecret<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedSecret({}, <redacted>)", D::NAME)
    }
}

impl<D: TrustDomain> FromStr for SharedSecret<D> {
    type Err = SecretError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.as_bytes())
    }
}

impl<D: TrustDomain> Serialize for SharedSecret<D> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(&self.key))
    }
}

impl<'de, D: TrustDomain> Deserialize<'de> for SharedSecret<D> {
    fn deserialize<De: Deserializer<'de>>(deserializer: De) -> Result<Self, De::Error> {
        let value = Cow::<str>::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// The hex-encoded message authentication code of a payload.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Token(String);

impl Token {
    /// Returns the token as it is sent in the `Token` header.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Raised if a payload cannot be converted into its canonical form.
#[derive(Debug, thiserror::Error)]
#[error("payload cannot be encoded as canonical JSON")]
pub struct CanonicalError(#[from] serde_json::Error);

/// Encodes a JSON value into its canonical byte form.
///
/// Object keys are sorted by their bytes at every level, arrays keep their order, and no
/// insignificant whitespace is emitted. Integers are written without a fraction while floats
/// always carry one (or an exponent), so `1` and `1.0` encode differently.
pub fn canonicalize(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    // Writing into a `Vec` never fails.
    write_canonical(&mut out, value).ok();
    out
}

/// Serializes a value and encodes it into its canonical byte form.
pub fn to_canonical_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    let value = serde_json::to_value(value)?;
    Ok(canonicalize(&value))
}

fn write_canonical<W: Write>(out: &mut W, value: &Value) -> io::Result<()> {
    match value {
        Value::Null => out.write_all(b"null"),
        Value::Bool(b) => out.write_all(if *b { b"true" } else { b"false" }),
        Value::Number(n) => write!(out, "{n}"),
        Value::String(s) => serde_json::to_writer(&mut *out, s).map_err(io::Error::from),
        Value::Array(items) => {
            out.write_all(b"[")?;
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.write_all(b",")?;
                }
                write_canonical(out, item)?;
            }
            out.write_all(b"]")
        }
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.write_all(b"{")?;
            for (index, (key, item)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.write_all(b",")?;
                }
                serde_json::to_writer(&mut *out, key).map_err(io::Error::from)?;
                out.write_all(b":")?;
                write_canonical(out, item)?;
            }
            out.write_all(b"}")
        }
    }
}

/// Computes the token of an already canonical payload.
pub fn sign_bytes<D: TrustDomain>(secret: &SharedSecret<D>, canonical: &[u8]) -> Token {
    let mut mac = secret.mac();
    mac.update(canonical);
    Token(HEXLOWER.encode(&mac.finalize().into_bytes()))
}

/// Computes the token of a structured payload.
pub fn sign<D: TrustDomain>(secret: &SharedSecret<D>, payload: &Value) -> Token {
    sign_bytes(secret, &canonicalize(payload))
}

/// Verifies a presented token against an already canonical payload.
///
/// The comparison runs in constant time. Tokens that are not valid hex never verify.
pub fn verify_bytes<D: TrustDomain>(secret: &SharedSecret<D>, canonical: &[u8], token: &str) -> bool {
    let Ok(code) = HEXLOWER_PERMISSIVE.decode(token.as_bytes()) else {
        return false;
    };

    let mut mac = secret.mac();
    mac.update(canonical);
    mac.verify_slice(&code).is_ok()
}

/// Verifies a presented token against a structured payload.
pub fn verify<D: TrustDomain>(secret: &SharedSecret<D>, payload: &Value, token: &str) -> bool {
    verify_bytes(secret, &canonicalize(payload), token)
}

/// A canonical payload together with its token.
///
/// The payload bytes are exactly the bytes that were signed and must be transmitted unchanged.
#[derive(Clone, Debug)]
pub struct SignedEnvelope {
    payload: Vec<u8>,
    token: Token,
}

impl SignedEnvelope {
    /// Encodes `value` canonically and signs it.
    pub fn seal<D, T>(secret: &SharedSecret<D>, value: &T) -> Result<Self, CanonicalError>
    where
        D: TrustDomain,
        T: Serialize + ?Sized,
    {
        let payload = to_canonical_vec(value)?;
        let token = sign_bytes(secret, &payload);
        Ok(Self { payload, token })
    }

    /// Returns the canonical payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the token of the payload.
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Checks that the token matches the payload under `secret`.
    pub fn verify<D: TrustDomain>(&self, secret: &SharedSecret<D>) -> bool {
        verify_bytes(secret, &self.payload, self.token.as_str())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn inbound() -> InboundSecret {
        "inbound-secret".parse().unwrap()
    }

    fn discovery() -> DiscoverySecret {
        "discovery-secret".parse().unwrap()
    }

    #[test]
    fn test_canonical_sorts_keys() {
        let value = json!({"b": 1, "a": {"d": [1, 2.5, "x"], "c": null}});
        let canonical = String::from_utf8(canonicalize(&value)).unwrap();
        insta::assert_snapshot!(canonical, @r#"{"a":{"c":null,"d":[1,2.5,"x"]},"b":1}"#);
    }

    #[test]
    fn test_canonical_escapes_strings() {
        let value = json!({"text": "line\n\"quoted\""});
        let canonical = String::from_utf8(canonicalize(&value)).unwrap();
        assert_eq!(canonical, r#"{"text":"line\n\"quoted\""}"#);
    }

    #[test]
    fn test_canonical_distinguishes_floats() {
        assert_eq!(canonicalize(&json!(1)), b"1");
        assert_eq!(canonicalize(&json!(1.0)), b"1.0");
        assert_eq!(canonicalize(&json!(-3)), b"-3");
    }

    #[test]
    fn test_sign_deterministic() {
        let payload = json!({"correlation_id": "abc", "latency": {"lock_time": 0.25}});
        assert_eq!(sign(&inbound(), &payload), sign(&inbound(), &payload));
    }

    #[test]
    fn test_sign_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"user_id": "u1", "chat_id": 7}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{ "chat_id" : 7, "user_id" : "u1" }"#).unwrap();
        assert_eq!(sign(&inbound(), &a), sign(&inbound(), &b));
    }

    #[test]
    fn test_sign_known_vector() {
        // HMAC-SHA256 of `{"status_code":200}` under the key `key`.
        let secret: DiscoverySecret = "key".parse().unwrap();
        let token = sign(&secret, &json!({"status_code": 200}));
        assert_eq!(
            token.as_str(),
            "b70664b34621c6ca8c20f1d3e1b555afb0fc49aebb108431aa176f40ae84ab3d"
        );
        assert!(verify_bytes(&secret, br#"{"status_code":200}"#, token.as_str()));
    }

    #[test]
    fn test_integer_and_float_sign_differently() {
        let int = sign(&inbound(), &json!({"sentiment": 1}));
        let float = sign(&inbound(), &json!({"sentiment": 1.0}));
        assert_ne!(int, float);
    }

    #[test]
    fn test_tampered_payload_fails() {
        let payload = json!({"service_name": "intent-service", "latency": 12});
        let token = sign(&inbound(), &payload);

        let tampered = json!({"service_name": "intent-service", "latency": 13});
        assert_ne!(sign(&inbound(), &tampered), token);
        assert!(!verify(&inbound(), &tampered, token.as_str()));
    }

    #[test]
    fn test_domain_separation() {
        let payload = json!({"status_code": 200});

        let discovery_token = sign(&discovery(), &payload);
        assert!(!verify(&inbound(), &payload, discovery_token.as_str()));

        let inbound_token = sign(&inbound(), &payload);
        assert!(!verify(&discovery(), &payload, inbound_token.as_str()));
    }

    #[test]
    fn test_verify_accepts_uppercase_hex() {
        let payload = json!({"a": true});
        let token = sign(&inbound(), &payload);
        assert!(verify(&inbound(), &payload, &token.as_str().to_uppercase()));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let payload = json!({"a": true});
        assert!(!verify(&inbound(), &payload, ""));
        assert!(!verify(&inbound(), &payload, "not hex at all"));
        assert!(!verify(&inbound(), &payload, "abcd"));
    }

    #[test]
    fn test_empty_secret() {
        assert_eq!("".parse::<InboundSecret>().unwrap_err(), SecretError::Empty);
    }

    #[test]
    fn test_secret_debug_redacted() {
        let debug = format!("{:?}", discovery());
        assert_eq!(debug, "SharedSecret(discovery, <redacted>)");
    }

    #[test]
    fn test_shares_key_with() {
        let inbound: InboundSecret = "same".parse().unwrap();
        let discovery: DiscoverySecret = "same".parse().unwrap();
        assert!(inbound.shares_key_with(&discovery));
        assert!(!inbound.shares_key_with(&self::discovery()));
    }

    #[test]
    fn test_envelope_roundtrip() {
        let envelope = SignedEnvelope::seal(&discovery(), &json!({"port": 3000, "name": "svc"}))
            .unwrap();
        assert_eq!(envelope.payload(), br#"{"name":"svc","port":3000}"#);
        assert!(envelope.verify(&discovery()));
        assert!(!envelope.verify(&inbound()));
    }
}
