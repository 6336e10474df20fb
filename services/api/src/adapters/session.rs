//! services/api/src/adapters/session.rs
//!
//! The `SessionProvider` used by a single WebSocket connection. It signs in with the
//! connection's token when one is presented and still valid, and otherwise signs in
//! anonymously, issuing a fresh token the client can reuse on its next visit.

use async_trait::async_trait;
use greenlog_core::domain::Identity;
use greenlog_core::ports::{CredentialStore, IdentityStream, PortError, PortResult, SessionProvider};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{info, warn};

pub struct TokenSessionProvider {
    credentials: Arc<dyn CredentialStore>,
    token: Mutex<Option<String>>,
    identity_tx: watch::Sender<Option<Identity>>,
}

impl TokenSessionProvider {
    pub fn new(credentials: Arc<dyn CredentialStore>, token: Option<String>) -> Self {
        let (identity_tx, _) = watch::channel(None);
        Self {
            credentials,
            token: Mutex::new(token),
            identity_tx,
        }
    }

    /// The token backing the current sign-in, if any.
    pub fn token(&self) -> Option<String> {
        self.token.lock().ok().and_then(|token| token.clone())
    }

    fn set_token(&self, token: Option<String>) {
        if let Ok(mut current) = self.token.lock() {
            *current = token;
        }
    }

    async fn sign_in_anonymously(&self) -> PortResult<Identity> {
        let (identity, token) = self.credentials.issue_anonymous().await?;
        self.set_token(Some(token));
        Ok(identity)
    }
}

#[async_trait]
impl SessionProvider for TokenSessionProvider {
    async fn authenticate(&self) -> PortResult<Identity> {
        let identity = match self.token() {
            Some(token) => match self.credentials.resolve_token(&token).await {
                Ok(identity) => identity,
                Err(PortError::Unauthorized) => {
                    warn!("Presented token is unknown or expired; signing in anonymously.");
                    self.sign_in_anonymously().await?
                }
                Err(e) => return Err(e),
            },
            None => self.sign_in_anonymously().await?,
        };

        info!(user_id = %identity.user_id, "Session authenticated.");
        self.identity_tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    fn identity_changes(&self) -> IdentityStream {
        let mut rx = self.identity_tx.subscribe();
        Box::pin(async_stream::stream! {
            while rx.changed().await.is_ok() {
                let identity = rx.borrow_and_update().clone();
                yield identity;
            }
        })
    }

    async fn sign_out(&self) -> PortResult<()> {
        let token = self.token.lock().ok().and_then(|mut token| token.take());
        if let Some(token) = token {
            self.credentials.revoke_token(&token).await?;
        }
        self.identity_tx.send_replace(None);
        Ok(())
    }
}
