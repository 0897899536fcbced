//! Type-safe identifiers and request id generation.
//!
//! Newtype wrappers keep correlation ids and connection ids from being
//! mixed up, and [`IdGenerator`] is the seam through which the bridge
//! allocates ids for outbound calls.
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`RequestId`] | Correlation token carried by request/response frames |
//! | [`ConnectionId`] | Process-unique id of an accepted peer connection |
//! | [`SequentialIdGenerator`] | `{prefix}-{counter}` ids (default) |
//! | [`UuidIdGenerator`] | v4 UUID ids |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// RequestId
// ============================================================================

/// Opaque correlation token linking a request frame to its response frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Wraps an existing token.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the token as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ============================================================================
// ConnectionId
// ============================================================================

/// Global counter for connection ids.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one accepted peer connection.
///
/// Lets the connection manager tell events of the active connection apart
/// from late events of a superseded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates the next process-unique connection id.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ============================================================================
// IdGenerator
// ============================================================================

/// Source of correlation ids for outbound calls.
///
/// Ids must be unique among the calls outstanding at any one time.
pub trait IdGenerator: Send + Sync {
    /// Returns a fresh id.
    fn next_id(&self) -> RequestId;
}

// ============================================================================
// SequentialIdGenerator
// ============================================================================

/// Generates `{prefix}-{n}` with a monotonically increasing `n`.
///
/// The default prefix is drawn from a random UUID once per generator, so ids
/// from different processes or bridge instances do not collide either.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    /// Creates a generator with a random 8-character hex prefix.
    #[must_use]
    pub fn new() -> Self {
        let mut prefix = Uuid::new_v4().simple().to_string();
        prefix.truncate(8);
        Self::with_prefix(prefix)
    }

    /// Creates a generator with a fixed prefix; the first id is `{prefix}-1`.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(1),
        }
    }

    /// Returns the prefix.
    #[inline]
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> RequestId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        RequestId(format!("{}-{}", self.prefix, n))
    }
}

// ============================================================================
// UuidIdGenerator
// ============================================================================

/// Generates random v4 UUID ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self) -> RequestId {
        RequestId(Uuid::new_v4().to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn test_sequential_with_prefix() {
        let ids = SequentialIdGenerator::with_prefix("id");
        assert_eq!(ids.next_id().as_str(), "id-1");
        assert_eq!(ids.next_id().as_str(), "id-2");
        assert_eq!(ids.next_id().as_str(), "id-3");
    }

    #[test]
    fn test_sequential_random_prefix() {
        let a = SequentialIdGenerator::new();
        let b = SequentialIdGenerator::new();
        assert_eq!(a.prefix().len(), 8);
        assert_ne!(a.prefix(), b.prefix());
    }

    #[test]
    fn test_uuid_generator_format() {
        let id = UuidIdGenerator.next_id();
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }

    #[test]
    fn test_connection_id_increases() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert!(b > a);
        assert!(a.to_string().starts_with("conn-"));
    }

    #[test]
    fn test_request_id_serde_transparent() {
        let id = RequestId::new("abc");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, r#""abc""#);

        let back: RequestId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn test_sequential_unique_across_threads() {
        let ids = std::sync::Arc::new(SequentialIdGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = std::sync::Arc::clone(&ids);
                std::thread::spawn(move || (0..500).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = FxHashSet::default();
        for handle in handles {
            for id in handle.join().expect("thread") {
                assert!(seen.insert(id), "duplicate id generated");
            }
        }
        assert_eq!(seen.len(), 4000);
    }

    proptest! {
        #[test]
        fn prop_sequential_ids_never_repeat(prefix in "[a-z]{1,6}", count in 1usize..200) {
            let ids = SequentialIdGenerator::with_prefix(prefix);
            let mut seen = FxHashSet::default();
            for _ in 0..count {
                prop_assert!(seen.insert(ids.next_id()));
            }
        }
    }
}
