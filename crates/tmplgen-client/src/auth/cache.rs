//! Expiry-aware token cache shared by the minting token sources

use std::future::Future;
use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;

use crate::error::AuthError;

/// Tokens are refreshed this long before they actually expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

struct Cached {
    token: SecretString,
    refresh_at: Instant,
}

/// Holds the most recently minted token until it is close to expiry
///
/// Concurrent callers wait on the same refresh instead of minting twice.
#[derive(Default)]
pub struct TokenCache {
    slot: Mutex<Option<Cached>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached token, or mint one with `fetch`
    ///
    /// `fetch` yields the token together with its lifetime.
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<SecretString, AuthError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(SecretString, Duration), AuthError>>,
    {
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.as_ref()
            && Instant::now() < cached.refresh_at
        {
            return Ok(clone_secret(&cached.token));
        }

        let (token, lifetime) = fetch().await?;
        let refresh_at = Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN);
        let result = clone_secret(&token);
        *slot = Some(Cached { token, refresh_at });
        Ok(result)
    }
}

fn clone_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}
