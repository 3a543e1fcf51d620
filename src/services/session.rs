//! Auth session manager - process-wide token cache for the flow provider
//!
//! The token is the only state that outlives a single batch call. Refresh
//! is a mutually exclusive critical section: concurrent resolvers awaiting
//! a refresh share one in-flight exchange instead of issuing N redundant
//! ones.

use crate::io::provider::FlowProvider;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Credential exchange failed.
#[derive(Debug, Clone)]
pub struct AuthError(pub String);

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "auth failed: {}", self.0)
    }
}

impl std::error::Error for AuthError {}

struct Session {
    token: String,
    expires_at: Instant,
}

/// Lazily exchanges credentials and caches the bearer token until the
/// recorded expiry, which is half the provider-declared TTL so a token
/// never expires mid-request.
pub struct SessionManager<P: FlowProvider> {
    provider: Arc<P>,
    state: Mutex<Option<Session>>,
}

impl<P: FlowProvider> SessionManager<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider, state: Mutex::new(None) }
    }

    /// Current token, exchanging credentials first if the cache is empty
    /// or expired. Callers arriving during a refresh await the same
    /// exchange.
    pub async fn get_token(&self) -> Result<String, AuthError> {
        let mut state = self.state.lock().await;

        if let Some(session) = state.as_ref() {
            if Instant::now() < session.expires_at {
                return Ok(session.token.clone());
            }
            debug!("session_expired");
        }

        let grant = self.provider.authenticate().await.map_err(|e| AuthError(e.to_string()))?;

        let margin_secs = grant.ttl_seconds / 2;
        let expires_at = Instant::now() + Duration::from_secs(margin_secs);
        info!(ttl_seconds = grant.ttl_seconds, margin_secs = margin_secs, "session_established");

        let token = grant.token.clone();
        *state = Some(Session { token: grant.token, expires_at });
        Ok(token)
    }

    /// Drop the cached token immediately. The next `get_token` call
    /// performs a fresh exchange.
    pub async fn invalidate(&self) {
        *self.state.lock().await = None;
        debug!("session_invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geo::Coordinate;
    use crate::io::provider::{LookupOutcome, ProviderError, SessionGrant};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    struct CountingProvider {
        exchanges: AtomicU64,
        ttl_seconds: u64,
        fail: AtomicBool,
    }

    impl CountingProvider {
        fn new(ttl_seconds: u64) -> Self {
            Self { exchanges: AtomicU64::new(0), ttl_seconds, fail: AtomicBool::new(false) }
        }
    }

    #[async_trait]
    impl FlowProvider for CountingProvider {
        async fn authenticate(&self) -> Result<SessionGrant, ProviderError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ProviderError::Status(503));
            }
            let n = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(SessionGrant { token: format!("tok-{}", n), ttl_seconds: self.ttl_seconds })
        }

        async fn reverse_lookup(
            &self,
            _coord: &Coordinate,
            _token: &str,
        ) -> Result<LookupOutcome, ProviderError> {
            Ok(LookupOutcome::NoData)
        }
    }

    #[tokio::test]
    async fn test_lazy_exchange_and_cache() {
        let provider = Arc::new(CountingProvider::new(3600));
        let manager = SessionManager::new(provider.clone());

        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 0);
        let t1 = manager.get_token().await.unwrap();
        let t2 = manager.get_token().await.unwrap();
        assert_eq!(t1, "tok-1");
        assert_eq!(t2, "tok-1");
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_ttl_expiry_margin() {
        let provider = Arc::new(CountingProvider::new(100));
        let manager = SessionManager::new(provider.clone());

        let t1 = manager.get_token().await.unwrap();

        // Within the 50 s margin: still cached
        tokio::time::advance(Duration::from_secs(49)).await;
        assert_eq!(manager.get_token().await.unwrap(), t1);
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 1);

        // Past the margin: fresh exchange even though the declared TTL
        // has not elapsed
        tokio::time::advance(Duration::from_secs(2)).await;
        let t2 = manager.get_token().await.unwrap();
        assert_eq!(t2, "tok-2");
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let provider = Arc::new(CountingProvider::new(3600));
        let manager = SessionManager::new(provider.clone());

        let t1 = manager.get_token().await.unwrap();
        manager.invalidate().await;
        let t2 = manager.get_token().await.unwrap();

        assert_ne!(t1, t2);
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_exchange() {
        let provider = Arc::new(CountingProvider::new(3600));
        let manager = Arc::new(SessionManager::new(provider.clone()));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let m = manager.clone();
            handles.push(tokio::spawn(async move { m.get_token().await.unwrap() }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), "tok-1");
        }
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exchange_failure_is_auth_error() {
        let provider = Arc::new(CountingProvider::new(3600));
        provider.fail.store(true, Ordering::SeqCst);
        let manager = SessionManager::new(provider.clone());

        let err = manager.get_token().await.unwrap_err();
        assert!(err.to_string().contains("503"));

        // Recovery after the provider comes back
        provider.fail.store(false, Ordering::SeqCst);
        assert_eq!(manager.get_token().await.unwrap(), "tok-1");
    }
}
