//! Identity assertion cache
//!
//! After an SSO login the IdP-issued assertion (ID token or SAML assertion) is
//! stored under `(subject, client_id)` so a later token exchange can present it
//! to the partner authorization server. One slot per key; a new login replaces
//! the previous assertion.
//!
//! Entries never expire. Keying by subject lets any later session of the same
//! user pick up the assertion; deployments that need replay protection should
//! key a networked [`AssertionStore`] by the one-time authorization code.

use std::fmt;

use async_trait::async_trait;
use dashmap::DashMap;
use idjag_client::SubjectTokenType;
use tracing::debug;

/// A cached identity assertion
#[derive(Clone, PartialEq, Eq)]
pub struct CachedAssertion {
    /// Raw assertion value
    pub token: String,
    /// OIDC ID token or SAML assertion
    pub kind: SubjectTokenType,
}

impl CachedAssertion {
    /// Create a cache entry
    pub fn new(token: impl Into<String>, kind: SubjectTokenType) -> Self {
        Self {
            token: token.into(),
            kind,
        }
    }
}

impl fmt::Debug for CachedAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedAssertion")
            .field("token", &"[REDACTED]")
            .field("kind", &self.kind)
            .finish()
    }
}

/// Storage for identity assertions keyed by `(subject, client_id)`
///
/// `put` must be atomic per key and `get` must observe the latest `put`.
#[async_trait]
pub trait AssertionStore: Send + Sync + fmt::Debug {
    /// Store an assertion, replacing any previous one for the same key
    async fn put(&self, subject: &str, client_id: &str, assertion: CachedAssertion);

    /// The most recently stored assertion, if any
    async fn get(&self, subject: &str, client_id: &str) -> Option<CachedAssertion>;
}

/// Process-local [`AssertionStore`]
///
/// # Example
///
/// ```rust
/// use idjag_client::SubjectTokenType;
/// use idjag_server::{AssertionStore, CachedAssertion, InMemoryAssertionStore};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryAssertionStore::new();
/// store
///     .put("customer1:00u1abcd", "wiki-at-customer1", CachedAssertion::new("eyJ...", SubjectTokenType::Oidc))
///     .await;
///
/// let cached = store.get("customer1:00u1abcd", "wiki-at-customer1").await;
/// assert_eq!(cached.map(|a| a.kind), Some(SubjectTokenType::Oidc));
/// # });
/// ```
#[derive(Default)]
pub struct InMemoryAssertionStore {
    entries: DashMap<(String, String), CachedAssertion>,
}

impl InMemoryAssertionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached assertions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for InMemoryAssertionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryAssertionStore")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[async_trait]
impl AssertionStore for InMemoryAssertionStore {
    async fn put(&self, subject: &str, client_id: &str, assertion: CachedAssertion) {
        let replaced = self
            .entries
            .insert((subject.to_string(), client_id.to_string()), assertion)
            .is_some();
        debug!(subject, client_id, replaced, "Cached identity assertion");
    }

    async fn get(&self, subject: &str, client_id: &str) -> Option<CachedAssertion> {
        self.entries
            .get(&(subject.to_string(), client_id.to_string()))
            .map(|entry| entry.value().clone())
    }
}
