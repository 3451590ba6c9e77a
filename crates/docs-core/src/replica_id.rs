//! Identifiers for replicas (tabs), users (devices), and authors.
//!
//! A `ReplicaId` wraps a u64 internally (it doubles as the Loro peer ID) but
//! displays as a 16-character hex string. A `UserId` is shared by every tab on
//! the device and lives in local storage.

use crate::storage::{KeyValueStore, StorageError};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplicaIdError {
    #[error("Invalid replica ID format: expected 16 hex chars")]
    InvalidFormat,
    #[error("Invalid hex: {0}")]
    InvalidHex(#[from] std::num::ParseIntError),
}

/// A unique identifier for one replica of the document collection.
///
/// # Examples
/// ```
/// use docs_core::ReplicaId;
///
/// let parsed: ReplicaId = "a1b2c3d4e5f67890".parse().unwrap();
/// assert_eq!(parsed.as_u64(), 0xa1b2c3d4e5f67890);
/// assert_eq!(parsed.to_string(), "a1b2c3d4e5f67890");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplicaId(u64);

impl ReplicaId {
    /// Generate a new random replica ID. Never returns zero.
    pub fn generate() -> Self {
        use rand::Rng;
        loop {
            let id: u64 = rand::rng().random();
            if id != 0 {
                return Self(id);
            }
        }
    }

    /// Get the underlying u64 value (for Loro API).
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for ReplicaId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for ReplicaId {
    type Err = ReplicaIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 16 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ReplicaIdError::InvalidFormat);
        }
        let id = u64::from_str_radix(&s.to_ascii_lowercase(), 16)?;
        Ok(Self(id))
    }
}

impl From<u64> for ReplicaId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ReplicaId> for u64 {
    fn from(replica: ReplicaId) -> u64 {
        replica.0
    }
}

impl Serialize for ReplicaId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ReplicaId {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Device-wide user identifier, e.g. `user_48213`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Generate a fresh `user_<n>` identifier with `n < 1_000_000`.
    pub fn generate() -> Self {
        use rand::Rng;
        let n: u32 = rand::rng().random_range(0..1_000_000);
        Self(format!("user_{}", n))
    }

    /// Read the user ID stored under `key`, creating and storing one if absent.
    pub async fn load_or_create<S: KeyValueStore>(
        storage: &S,
        key: &str,
    ) -> Result<Self, StorageError> {
        if let Some(bytes) = storage.get(key).await? {
            let stored = String::from_utf8_lossy(&bytes).trim().to_string();
            if !stored.is_empty() {
                return Ok(Self(stored));
            }
        }

        let user = Self::generate();
        storage.set(key, user.0.as_bytes()).await?;
        tracing::info!("Created user id {}", user);
        Ok(user)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Author of a change: the device user plus the tab that made it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthorId {
    pub user: UserId,
    pub replica: ReplicaId,
}

impl AuthorId {
    pub fn new(user: UserId, replica: ReplicaId) -> Self {
        Self { user, replica }
    }
}

impl Display for AuthorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.user, self.replica)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    #[test]
    fn test_display_zero_padded() {
        let replica = ReplicaId(0xff);
        assert_eq!(replica.to_string(), "00000000000000ff");
    }

    #[test]
    fn test_parse_uppercase_hex() {
        let replica: ReplicaId = "A1B2C3D4E5F67890".parse().unwrap();
        assert_eq!(replica.as_u64(), 0xa1b2c3d4e5f67890);
    }

    #[test]
    fn test_reject_wrong_length() {
        assert!("a1b2c3d4e5f6789".parse::<ReplicaId>().is_err());
        assert!("a1b2c3d4e5f678901".parse::<ReplicaId>().is_err());
        assert!("".parse::<ReplicaId>().is_err());
        assert!("ghijklmnopqrstuv".parse::<ReplicaId>().is_err());
    }

    #[test]
    fn test_generate_not_zero() {
        for _ in 0..1000 {
            assert_ne!(ReplicaId::generate().as_u64(), 0);
        }
    }

    #[test]
    fn test_serde_as_hex_string() {
        let replica = ReplicaId(0xa1b2c3d4e5f67890);
        let json = serde_json::to_string(&replica).unwrap();
        assert_eq!(json, "\"a1b2c3d4e5f67890\"");
        let parsed: ReplicaId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, replica);
    }

    #[test]
    fn test_user_id_format() {
        let user = UserId::generate();
        let n = user.as_str().strip_prefix("user_").unwrap();
        assert!(n.parse::<u32>().unwrap() < 1_000_000);
    }

    #[test]
    fn test_author_display() {
        let author = AuthorId::new(UserId::from("user_7"), ReplicaId(1));
        assert_eq!(author.to_string(), "user_7_0000000000000001");
    }

    #[tokio::test]
    async fn test_user_id_is_stable_across_loads() {
        let storage = InMemoryStore::new();

        let first = UserId::load_or_create(&storage, "userId").await.unwrap();
        let second = UserId::load_or_create(&storage, "userId").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            storage.get("userId").await.unwrap().unwrap(),
            first.as_str().as_bytes()
        );
    }
}
