//! Session tokens: issuing, resolving and revoking them.

use std::sync::Arc;

use tracing::{debug, info};

use crate::adapter::outbound::sqlite::SqliteStore;
use crate::adapter::outbound::random::AlphanumericTokens;
use crate::domain::{AccountId, SessionToken, User};
use crate::error::Result;
use crate::port::TokenGenerator;

/// Issues bearer tokens and maps them back to users.
///
/// Each account holds at most one token; issuing a new one revokes the old.
/// Tokens do not expire.
#[derive(Clone)]
pub struct Authenticator {
    store: SqliteStore,
    tokens: Arc<dyn TokenGenerator>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    /// Authenticator using 16-character alphanumeric tokens.
    #[must_use]
    pub fn new(store: SqliteStore) -> Self {
        Self::with_generator(store, Arc::new(AlphanumericTokens::default()))
    }

    /// Authenticator issuing alphanumeric tokens of `length` characters.
    #[must_use]
    pub fn with_token_length(store: SqliteStore, length: usize) -> Self {
        Self::with_generator(store, Arc::new(AlphanumericTokens::new(length)))
    }

    #[must_use]
    pub fn with_generator(store: SqliteStore, tokens: Arc<dyn TokenGenerator>) -> Self {
        Self { store, tokens }
    }

    /// Issue a fresh token for `account`, replacing any previous one.
    ///
    /// # Errors
    /// `UserNotFound` if the account does not exist.
    pub fn login(&self, account: AccountId) -> Result<SessionToken> {
        let token = self.tokens.generate();
        self.store.add_token(account, &token)?;
        debug!(account = %account, "Issued session token");
        Ok(token)
    }

    /// Create an account and log it in, atomically.
    ///
    /// # Errors
    /// `AccountAlreadyExists` if `username` is taken.
    pub fn register(
        &self,
        username: &str,
        password: &str,
        display_name: &str,
    ) -> Result<SessionToken> {
        let token = self.tokens.generate();
        let account = self.store.transaction(|l| {
            let account = l.register_account(username, password, display_name)?;
            l.set_token(account, &token)?;
            Ok(account)
        })?;
        info!(account = %account, username, "Registered account");
        Ok(token)
    }

    /// Check credentials and issue a token.
    ///
    /// # Errors
    /// `IncorrectPassword` for an unknown user or a wrong password.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<SessionToken> {
        let token = self.tokens.generate();
        let account = self.store.transaction(|l| {
            let account = l.verify_credentials(username, password)?;
            l.set_token(account, &token)?;
            Ok(account)
        })?;
        debug!(account = %account, "Authenticated");
        Ok(token)
    }

    /// Revoke `token`.
    ///
    /// # Errors
    /// `InvalidToken` if the token is not currently valid.
    pub fn logout(&self, token: &SessionToken) -> Result<()> {
        self.store.remove_token(token)
    }

    /// # Errors
    /// `InvalidToken` if the token is not currently valid.
    pub fn resolve(&self, token: &SessionToken) -> Result<User> {
        self.store.resolve_token(token)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::adapter::outbound::sqlite::StoreOptions;
    use crate::error::{ErrorKind, ExchangeError};

    /// Counts up: `tok-0`, `tok-1`, ...
    struct Sequential(AtomicUsize);

    impl TokenGenerator for Sequential {
        fn generate(&self) -> SessionToken {
            SessionToken::new(format!("tok-{}", self.0.fetch_add(1, Ordering::SeqCst)))
        }
    }

    fn auth() -> Authenticator {
        let store = SqliteStore::in_memory(StoreOptions::default()).unwrap();
        Authenticator::with_generator(store, Arc::new(Sequential(AtomicUsize::new(0))))
    }

    #[test]
    fn register_returns_a_resolving_token() {
        let auth = auth();
        let token = auth.register("admin", "pw", "Admin").unwrap();

        let user = auth.resolve(&token).unwrap();
        assert_eq!(user.name, "Admin");
        assert_eq!(user.balance, 1000);
    }

    #[test]
    fn duplicate_registration_leaves_no_token_behind() {
        let auth = auth();
        auth.register("admin", "pw", "Admin").unwrap();

        let err = auth.register("admin", "other", "Imposter").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccountAlreadyExists);
        // tok-1 was generated for the failed attempt and must not resolve
        assert_eq!(
            auth.resolve(&SessionToken::new("tok-1")).unwrap_err().kind(),
            ErrorKind::InvalidToken
        );
    }

    #[test]
    fn login_replaces_the_previous_token() {
        let auth = auth();
        let first = auth.register("admin", "pw", "Admin").unwrap();
        let second = auth.authenticate("admin", "pw").unwrap();

        assert_ne!(first, second);
        assert_eq!(auth.resolve(&first).unwrap_err().kind(), ErrorKind::InvalidToken);
        assert_eq!(auth.resolve(&second).unwrap().name, "Admin");
    }

    #[test]
    fn authenticate_rejects_bad_credentials_uniformly() {
        let auth = auth();
        auth.register("admin", "pw", "Admin").unwrap();

        let wrong = auth.authenticate("admin", "nope").unwrap_err();
        let unknown = auth.authenticate("ghost", "pw").unwrap_err();
        assert_eq!(wrong.as_exchange(), Some(&ExchangeError::IncorrectPassword));
        assert_eq!(unknown.as_exchange(), Some(&ExchangeError::IncorrectPassword));
    }

    #[test]
    fn logout_revokes_and_is_not_repeatable() {
        let auth = auth();
        let token = auth.register("admin", "pw", "Admin").unwrap();

        auth.logout(&token).unwrap();
        assert_eq!(auth.resolve(&token).unwrap_err().kind(), ErrorKind::InvalidToken);
        assert_eq!(auth.logout(&token).unwrap_err().kind(), ErrorKind::InvalidToken);
    }

    #[test]
    fn token_length_is_configurable() {
        let store = SqliteStore::in_memory(StoreOptions::default()).unwrap();
        let auth = Authenticator::with_token_length(store, 32);

        let token = auth.register("admin", "pw", "Admin").unwrap();
        assert_eq!(token.as_str().len(), 32);
        assert_eq!(auth.resolve(&token).unwrap().name, "Admin");
    }

    #[test]
    fn login_for_unknown_account_fails() {
        let auth = auth();
        let err = auth.login(AccountId::new(99)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UserNotFound);
    }
}
