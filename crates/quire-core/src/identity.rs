//! Author identity and the signing seam
//!
//! Quire never implements signature primitives. It consumes a
//! [`SigningOracle`] supplied by the caller, and keeps the private key
//! wrapped in [`SecretKey`], which refuses to print itself.

use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SigningError;

/// 32-byte author public key, hex encoded on the wire
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, SigningError> {
        let bytes = hex::decode(s).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            SigningError::InvalidKey(format!("expected 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short display form for logs
    pub fn short_id(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.short_id())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Signature bytes produced by the signing oracle
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Signature({}..)", &hex[..hex.len().min(16)])
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s)
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

/// Private signing key
///
/// Deliberately not `Serialize`, and `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, SigningError> {
        hex::decode(s.trim())
            .map(Self)
            .map_err(|_| SigningError::InvalidKey("secret key is not valid hex".to_string()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey(<redacted>)")
    }
}

/// External signing collaborator
pub trait SigningOracle: Send + Sync {
    /// Derive the public key that identifies the author
    fn derive_public_key(&self, key: &SecretKey) -> Result<PublicKey, SigningError>;

    /// Sign a preimage (the 32-byte event id)
    fn sign(&self, preimage: &[u8], key: &SecretKey) -> Result<Signature, SigningError>;
}

/// A signing oracle bound to one key
#[derive(Clone)]
pub struct Signer {
    oracle: Arc<dyn SigningOracle>,
    key: SecretKey,
    public_key: PublicKey,
}

impl Signer {
    /// Bind a key to an oracle, deriving the public key once
    pub fn new(oracle: Arc<dyn SigningOracle>, key: SecretKey) -> Result<Self, SigningError> {
        let public_key = oracle.derive_public_key(&key)?;
        Ok(Self {
            oracle,
            key,
            public_key,
        })
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    pub fn sign(&self, preimage: &[u8]) -> Result<Signature, SigningError> {
        self.oracle.sign(preimage, &self.key)
    }
}

impl Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("public_key", &self.public_key)
            .field("key", &self.key)
            .finish()
    }
}

/// Deterministic signing oracle for tests
pub mod testing {
    use sha2::{Digest, Sha256};

    use super::*;

    /// Derives keys and signatures by hashing. Not a real signature scheme.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct TestSigner;

    impl TestSigner {
        /// A [`Signer`] for a key made from a single repeated byte
        pub fn signer(seed: u8) -> Signer {
            Signer::new(Arc::new(TestSigner), SecretKey::from_bytes(vec![seed; 32]))
                .expect("test keys are always valid")
        }
    }

    impl SigningOracle for TestSigner {
        fn derive_public_key(&self, key: &SecretKey) -> Result<PublicKey, SigningError> {
            if key.as_bytes().len() != 32 {
                return Err(SigningError::InvalidKey(format!(
                    "expected 32 bytes, got {}",
                    key.as_bytes().len()
                )));
            }
            let digest = Sha256::new()
                .chain_update(b"quire-test-pubkey")
                .chain_update(key.as_bytes())
                .finalize();
            Ok(PublicKey::from_bytes(digest.into()))
        }

        fn sign(&self, preimage: &[u8], key: &SecretKey) -> Result<Signature, SigningError> {
            let first = Sha256::new()
                .chain_update(key.as_bytes())
                .chain_update(preimage)
                .finalize();
            let second = Sha256::new().chain_update(first).finalize();
            let mut sig = first.to_vec();
            sig.extend_from_slice(&second);
            Ok(Signature::from_bytes(sig))
        }
    }
}
