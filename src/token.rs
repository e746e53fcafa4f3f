use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::store::{self, Store};
use crate::types::LoginResponse;
use crate::{Error, Result};

/// Tokens are renewed this long before the vendor says they expire.
pub const RENEWAL_MARGIN_SECS: i64 = 3600;

const TOKEN_KEY: &str = "token";
const MOCK_USERNAME: &str = "test";
const MOCK_PASSWORD: &str = "test";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The `test`/`test` account is served from memory and never touches the network.
    pub fn is_mock(&self) -> bool {
        self.username == MOCK_USERNAME && self.password == MOCK_PASSWORD
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
    pub issued_at: DateTime<Utc>,
    pub expire_in_seconds: i64,
}

impl AuthToken {
    pub fn new(access_token: impl Into<String>, issued_at: DateTime<Utc>, expire_in_seconds: i64) -> Self {
        Self {
            access_token: access_token.into(),
            issued_at,
            expire_in_seconds,
        }
    }

    /// Instant from which the token is treated as expired.
    pub fn renew_at(&self) -> DateTime<Utc> {
        self.issued_at + Duration::seconds(self.expire_in_seconds - RENEWAL_MARGIN_SECS)
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.renew_at()
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("access_token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expire_in_seconds", &self.expire_in_seconds)
            .finish()
    }
}

/// Performs the vendor login call.
pub trait Authenticator: Sync {
    fn authenticate(&self, credentials: &Credentials) -> impl Future<Output = Result<LoginResponse>> + Send;
}

#[derive(Serialize, Deserialize)]
struct PersistedToken {
    username: String,
    token: AuthToken,
}

/// Owns the bearer token for one account. Shared between all devices of
/// that account through an `Arc`.
pub struct TokenManager {
    credentials: Credentials,
    store: Option<Arc<dyn Store>>,
    token: RwLock<Option<AuthToken>>,
}

impl TokenManager {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            store: None,
            token: RwLock::new(None),
        }
    }

    /// Restores a token persisted for the same username, if any.
    pub fn with_store(credentials: Credentials, store: Arc<dyn Store>) -> Result<Self> {
        let persisted = store::load::<PersistedToken>(store.as_ref(), TOKEN_KEY)?
            .filter(|p| p.username == credentials.username)
            .map(|p| p.token);
        if persisted.is_some() {
            debug!("restored persisted token");
        }
        Ok(Self {
            credentials,
            store: Some(store),
            token: RwLock::new(persisted),
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub async fn cached(&self) -> Option<AuthToken> {
        self.token.read().await.clone()
    }

    pub async fn valid_token<A: Authenticator>(&self, auth: &A) -> Result<AuthToken> {
        self.valid_token_at(auth, Utc::now()).await
    }

    pub async fn valid_token_at<A: Authenticator>(&self, auth: &A, now: DateTime<Utc>) -> Result<AuthToken> {
        if let Some(token) = self.token.read().await.as_ref()
            && token.is_valid_at(now)
        {
            return Ok(token.clone());
        }

        let mut slot = self.token.write().await;
        // Another task may have renewed while we waited for the lock.
        if let Some(token) = slot.as_ref()
            && token.is_valid_at(now)
        {
            return Ok(token.clone());
        }
        info!("authorization token missing or expiring, logging in");
        let token = self.login(auth, now).await?;
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Forced renewal after the server rejected `rejected`. If the cached
    /// token has already moved on, that newer token is returned instead.
    pub async fn renew<A: Authenticator>(&self, auth: &A, rejected: &AuthToken) -> Result<AuthToken> {
        let now = Utc::now();
        let mut slot = self.token.write().await;
        if let Some(token) = slot.as_ref()
            && token.access_token != rejected.access_token
            && token.is_valid_at(now)
        {
            return Ok(token.clone());
        }
        info!("token rejected by server, logging in again");
        let token = self.login(auth, now).await?;
        *slot = Some(token.clone());
        Ok(token)
    }

    pub async fn invalidate(&self) {
        *self.token.write().await = None;
        if let Some(store) = &self.store
            && let Err(e) = store.remove(TOKEN_KEY)
        {
            warn!("failed to remove persisted token: {e}");
        }
    }

    async fn login<A: Authenticator>(&self, auth: &A, now: DateTime<Utc>) -> Result<AuthToken> {
        let response = auth.authenticate(&self.credentials).await?;
        if response.requires_two_factor_verification {
            return Err(Error::TwoFactorRequired);
        }
        let token = AuthToken::new(response.access_token, now, response.expire_in_seconds);
        self.persist(&token);
        Ok(token)
    }

    fn persist(&self, token: &AuthToken) {
        let Some(store) = &self.store else { return };
        let record = PersistedToken {
            username: self.credentials.username.clone(),
            token: token.clone(),
        };
        if let Err(e) = store::save(store.as_ref(), TOKEN_KEY, &record) {
            warn!("failed to persist token: {e}");
        }
    }
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAuth {
        calls: AtomicUsize,
        expire_in_seconds: i64,
        two_factor: bool,
    }

    impl CountingAuth {
        fn new(expire_in_seconds: i64) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                expire_in_seconds,
                two_factor: false,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Authenticator for CountingAuth {
        async fn authenticate(&self, _credentials: &Credentials) -> Result<LoginResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(LoginResponse {
                access_token: format!("token-{n}"),
                expire_in_seconds: self.expire_in_seconds,
                requires_two_factor_verification: self.two_factor,
            })
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn token_valid_until_one_hour_before_expiry() {
        let token = AuthToken::new("abc", t0(), 7200);
        assert!(token.is_valid_at(t0() + Duration::seconds(3599)));
        assert!(!token.is_valid_at(t0() + Duration::seconds(3600)));
    }

    #[test]
    fn short_lived_token_is_immediately_stale() {
        let token = AuthToken::new("abc", t0(), 3600);
        assert!(!token.is_valid_at(t0()));
    }

    #[tokio::test]
    async fn renews_at_margin_not_before() {
        let auth = CountingAuth::new(7200);
        let manager = TokenManager::new(Credentials::new("u", "p"));

        let first = manager.valid_token_at(&auth, t0()).await.unwrap();
        assert_eq!(first.access_token, "token-1");

        let same = manager
            .valid_token_at(&auth, t0() + Duration::seconds(3599))
            .await
            .unwrap();
        assert_eq!(same.access_token, "token-1");
        assert_eq!(auth.calls(), 1);

        let renewed = manager
            .valid_token_at(&auth, t0() + Duration::seconds(3600))
            .await
            .unwrap();
        assert_eq!(renewed.access_token, "token-2");
        assert_eq!(auth.calls(), 2);
    }

    #[tokio::test]
    async fn two_factor_accounts_are_rejected() {
        let mut auth = CountingAuth::new(7200);
        auth.two_factor = true;
        let manager = TokenManager::new(Credentials::new("u", "p"));
        let err = manager.valid_token_at(&auth, t0()).await.unwrap_err();
        assert!(matches!(err, Error::TwoFactorRequired));
        assert!(manager.cached().await.is_none());
    }

    #[tokio::test]
    async fn renew_skips_login_when_token_already_rotated() {
        let auth = CountingAuth::new(100_000);
        let manager = TokenManager::new(Credentials::new("u", "p"));
        let current = manager.valid_token(&auth).await.unwrap();
        let stale = AuthToken::new("old", t0(), 7200);

        let got = manager.renew(&auth, &stale).await.unwrap();
        assert_eq!(got, current);
        assert_eq!(auth.calls(), 1);

        let fresh = manager.renew(&auth, &current).await.unwrap();
        assert_eq!(fresh.access_token, "token-2");
    }

    #[tokio::test]
    async fn token_is_persisted_and_restored_per_username() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let auth = CountingAuth::new(100_000);
        let manager = TokenManager::with_store(Credentials::new("u", "p"), store.clone()).unwrap();
        manager.valid_token(&auth).await.unwrap();

        let restored = TokenManager::with_store(Credentials::new("u", "p"), store.clone()).unwrap();
        assert_eq!(restored.cached().await.unwrap().access_token, "token-1");

        let other = TokenManager::with_store(Credentials::new("someone-else", "p"), store).unwrap();
        assert!(other.cached().await.is_none());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let creds = Credentials::new("me", "hunter2");
        let token = AuthToken::new("secret-token", t0(), 10);
        assert!(!format!("{creds:?}").contains("hunter2"));
        assert!(!format!("{token:?}").contains("secret-token"));
    }
}
