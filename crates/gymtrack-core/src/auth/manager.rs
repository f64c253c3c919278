//! Session lifecycle management.
//!
//! `SessionManager` is the single owner of the in-memory session. It keeps
//! three things in step: the session published to consumers, the two
//! credential slots in storage, and the API client's `Authorization` header.
//!
//! Mutating operations run one at a time. A sign-out issued while a sign-in
//! is in flight waits for the sign-in to settle instead of interleaving with
//! its storage writes.

use std::sync::{Mutex as StdMutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use super::session::LoadingGuard;
use super::{SessionError, SessionSnapshot};
use crate::api::AuthApi;
use crate::models::User;
use crate::storage::{CredentialStore, KeyValueStore};

/// What to do when a sign-in response lacks the user or the token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignInPolicy {
    /// Fail with `SessionError::MalformedResponse`
    #[default]
    Strict,
    /// Succeed without touching the session
    Lenient,
}

pub struct SessionManager<S, A> {
    store: CredentialStore<S>,
    api: A,
    state: watch::Sender<SessionSnapshot>,
    // Kept apart from the snapshot so consumers never see it
    token: StdMutex<Option<String>>,
    // Single-flight guard for mutating operations
    op_lock: Mutex<()>,
    policy: SignInPolicy,
}

impl<S: KeyValueStore, A: AuthApi> SessionManager<S, A> {
    /// Create a manager in the loading state. Call `restore` (or use
    /// `start`) before relying on the session.
    pub fn new(store: S, api: A) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::initial());
        Self {
            store: CredentialStore::new(store),
            api,
            state,
            token: StdMutex::new(None),
            op_lock: Mutex::new(()),
            policy: SignInPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SignInPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Create the manager and restore any stored session.
    ///
    /// The manager is returned even when restore fails; it is then signed out
    /// and no longer loading.
    pub async fn start(store: S, api: A, policy: SignInPolicy) -> (Self, Result<(), SessionError>) {
        let manager = Self::new(store, api).with_policy(policy);
        let result = manager.restore().await;
        (manager, result)
    }

    // ===== Read side =====

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver that observes every session change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading_user_storage_data
    }

    pub fn is_signed_in(&self) -> bool {
        self.token_slot().is_some()
    }

    /// Wait until no storage-affecting operation is in flight.
    pub async fn wait_until_ready(&self) -> SessionSnapshot {
        let mut rx = self.state.subscribe();
        let snapshot = match rx.wait_for(|s| !s.is_loading_user_storage_data).await {
            Ok(snapshot) => snapshot.clone(),
            // Sender lives in self, so the channel cannot close while we hold &self
            Err(_) => self.snapshot(),
        };
        snapshot
    }

    pub fn credentials(&self) -> &CredentialStore<S> {
        &self.store
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub(crate) fn token(&self) -> Option<String> {
        self.token_slot().clone()
    }

    fn token_slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ===== Operations =====

    /// Rebuild the session from storage. Only the first call does any work.
    pub async fn restore(&self) -> Result<(), SessionError> {
        let _flight = self.op_lock.lock().await;
        let restored = self.state.borrow().restored;
        if restored {
            debug!("Session already restored");
            return Ok(());
        }

        let _loading = LoadingGuard::begin(&self.state);
        let result = self.load_stored_session().await;
        self.state.send_modify(|s| s.restored = true);
        if let Err(ref e) = result {
            warn!(error = %e, "Failed to restore session");
        }
        result
    }

    async fn load_stored_session(&self) -> Result<(), SessionError> {
        let user = self.store.get_user().await?;
        let token = self.store.get_token().await?.filter(|t| !t.is_empty());

        match token {
            Some(token) if !user.is_empty() => {
                self.api.set_bearer_token(&token)?;
                self.install(user, token);
                info!("Restored session from storage");
            }
            token => {
                debug!(
                    has_user = !user.is_empty(),
                    has_token = token.is_some(),
                    "No stored session"
                );
            }
        }
        Ok(())
    }

    /// Authenticate and persist the new session before exposing it.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), SessionError> {
        let _flight = self.op_lock.lock().await;
        let _loading = LoadingGuard::begin(&self.state);

        let response = self.api.authenticate(email, password).await?;
        let (user, token) = match (response.user, response.token.filter(|t| !t.is_empty())) {
            (Some(user), Some(token)) => (user, token),
            (user, _) => {
                let missing = if user.is_none() { "user" } else { "token" };
                warn!(missing, policy = ?self.policy, "Incomplete sign-in response");
                return match self.policy {
                    SignInPolicy::Strict => Err(SessionError::MalformedResponse { missing }),
                    SignInPolicy::Lenient => Ok(()),
                };
            }
        };

        self.persist(&user, &token).await?;
        if let Err(e) = self.api.set_bearer_token(&token) {
            self.discard_persisted().await;
            return Err(e.into());
        }
        self.install(user, token);
        info!("Signed in");
        Ok(())
    }

    /// End the session in memory first, then drop both stored keys.
    ///
    /// If storage removal fails the in-memory session stays cleared.
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        let _flight = self.op_lock.lock().await;
        let _loading = LoadingGuard::begin(&self.state);

        self.token_slot().take();
        self.api.clear_bearer_token();
        self.state.send_modify(|s| s.user = None);

        let (user_removed, token_removed) =
            futures::future::join(self.store.remove_user(), self.store.remove_token()).await;
        user_removed?;
        token_removed?;
        info!("Signed out");
        Ok(())
    }

    /// Replace the signed-in user's profile. The token is left alone and the
    /// loading flag is not raised.
    pub async fn update_user_profile(&self, updated: User) -> Result<(), SessionError> {
        let _flight = self.op_lock.lock().await;
        if self.token_slot().is_none() {
            return Err(SessionError::NotSignedIn);
        }

        self.state.send_modify(|s| s.user = Some(updated.clone()));
        self.store.save_user(&updated).await?;
        debug!("Updated user profile");
        Ok(())
    }

    // ===== Helpers =====

    /// Write user then token. A failed token write takes the user back out so
    /// the two keys never diverge.
    async fn persist(&self, user: &User, token: &str) -> Result<(), SessionError> {
        self.store.save_user(user).await?;
        if let Err(e) = self.store.save_token(token).await {
            warn!(error = %e, "Failed to store token, discarding stored user");
            if let Err(cleanup) = self.store.remove_user().await {
                warn!(error = %cleanup, "Failed to discard stored user");
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn discard_persisted(&self) {
        let (user_removed, token_removed) =
            futures::future::join(self.store.remove_user(), self.store.remove_token()).await;
        for err in [user_removed.err(), token_removed.err()].into_iter().flatten() {
            warn!(error = %err, "Failed to discard stored credentials");
        }
    }

    fn install(&self, user: User, token: String) {
        *self.token_slot() = Some(token);
        self.state.send_modify(|s| s.user = Some(user));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::api::{ApiError, SignInResponse};
    use crate::auth::SessionStatus;
    use crate::storage::{MemoryStore, StorageError, AUTH_TOKEN_STORAGE, USER_STORAGE};

    type Journal = Arc<StdMutex<Vec<String>>>;

    fn record(journal: &Journal, entry: impl Into<String>) {
        journal.lock().unwrap().push(entry.into());
    }

    /// Records every store call and the loading flag seen at that moment.
    #[derive(Default)]
    struct JournalStore {
        inner: MemoryStore,
        journal: Journal,
        observer: StdMutex<Option<watch::Receiver<SessionSnapshot>>>,
        loading_seen: StdMutex<Vec<bool>>,
        fail_on: StdMutex<Option<(&'static str, &'static str)>>,
    }

    impl JournalStore {
        fn with_entries(entries: &[(&str, &str)], journal: Journal) -> Self {
            Self {
                inner: MemoryStore::with_entries(entries.iter().copied()),
                journal,
                ..Self::default()
            }
        }

        fn fail_on(&self, op: &'static str, key: &'static str) {
            *self.fail_on.lock().unwrap() = Some((op, key));
        }

        fn observe(&self, rx: watch::Receiver<SessionSnapshot>) {
            *self.observer.lock().unwrap() = Some(rx);
        }

        fn check(&self, op: &'static str, key: &str) -> Result<(), StorageError> {
            record(&self.journal, format!("{} {}", op, key));
            if let Some(rx) = self.observer.lock().unwrap().as_ref() {
                self.loading_seen
                    .lock()
                    .unwrap()
                    .push(rx.borrow().is_loading_user_storage_data);
            }
            if *self.fail_on.lock().unwrap() == Some((op, key_name(key))) {
                return Err(StorageError::io(
                    "/dev/full",
                    std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                ));
            }
            Ok(())
        }
    }

    fn key_name(key: &str) -> &'static str {
        if key == USER_STORAGE {
            "user"
        } else {
            "token"
        }
    }

    #[async_trait]
    impl KeyValueStore for JournalStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.check("get", key)?;
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.check("set", key)?;
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.check("remove", key)?;
            self.inner.remove(key).await
        }
    }

    #[derive(Default)]
    struct FakeApi {
        response: StdMutex<Option<Result<SignInResponse, ApiError>>>,
        header: StdMutex<Option<String>>,
        journal: Journal,
        observer: StdMutex<Option<watch::Receiver<SessionSnapshot>>>,
        loading_seen: StdMutex<Vec<bool>>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeApi {
        fn replying(response: Result<SignInResponse, ApiError>, journal: Journal) -> Self {
            Self {
                response: StdMutex::new(Some(response)),
                journal,
                ..Self::default()
            }
        }

        fn header(&self) -> Option<String> {
            self.header.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AuthApi for FakeApi {
        async fn authenticate(&self, email: &str, _password: &str) -> Result<SignInResponse, ApiError> {
            record(&self.journal, format!("authenticate {}", email));
            let loading = self
                .observer
                .lock()
                .unwrap()
                .as_ref()
                .map(|rx| rx.borrow().is_loading_user_storage_data);
            self.loading_seen.lock().unwrap().extend(loading);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.response
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(SignInResponse::default()))
        }

        fn set_bearer_token(&self, token: &str) -> Result<(), ApiError> {
            record(&self.journal, "set header");
            *self.header.lock().unwrap() = Some(format!("Bearer {}", token));
            Ok(())
        }

        fn clear_bearer_token(&self) {
            record(&self.journal, "clear header");
            *self.header.lock().unwrap() = None;
        }
    }

    fn ok_response(user: User, token: &str) -> Result<SignInResponse, ApiError> {
        Ok(SignInResponse {
            user: Some(user),
            token: Some(token.to_string()),
        })
    }

    fn ana_entries() -> Vec<(&'static str, &'static str)> {
        vec![
            (USER_STORAGE, r#"{"name":"Ana","email":"ana@x.com"}"#),
            (AUTH_TOKEN_STORAGE, "tok123"),
        ]
    }

    async fn stored(manager: &SessionManager<JournalStore, FakeApi>, key: &str) -> Option<String> {
        manager.credentials().backend().inner.get(key).await.unwrap()
    }

    async fn signed_in_manager(journal: Journal) -> SessionManager<JournalStore, FakeApi> {
        let store = JournalStore::with_entries(&ana_entries(), journal.clone());
        let (manager, result) =
            SessionManager::start(store, FakeApi { journal, ..FakeApi::default() }, SignInPolicy::Strict)
                .await;
        result.unwrap();
        assert!(manager.is_signed_in());
        manager
    }

    // ===== restore =====

    #[tokio::test]
    async fn test_restore_with_both_keys_signs_in() {
        let journal = Journal::default();
        let store = JournalStore::with_entries(&ana_entries(), journal.clone());
        let api = FakeApi { journal: journal.clone(), ..FakeApi::default() };
        let manager = SessionManager::new(store, api);
        assert_eq!(manager.snapshot().status(), SessionStatus::Loading);

        manager.credentials().backend().observe(manager.subscribe());
        manager.restore().await.unwrap();

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.status(), SessionStatus::SignedIn);
        assert_eq!(snapshot.user.as_ref().map(|u| u.name.as_str()), Some("Ana"));
        assert!(!snapshot.is_loading_user_storage_data);
        assert_eq!(manager.token().as_deref(), Some("tok123"));
        assert_eq!(manager.api().header().as_deref(), Some("Bearer tok123"));
        assert!(manager.credentials().backend().loading_seen.lock().unwrap().iter().all(|l| *l));
    }

    #[tokio::test]
    async fn test_restore_with_missing_token_stays_signed_out() {
        let journal = Journal::default();
        let store = JournalStore::with_entries(
            &[(USER_STORAGE, r#"{"name":"Ana"}"#)],
            journal.clone(),
        );
        let api = FakeApi { journal: journal.clone(), ..FakeApi::default() };
        let (manager, result) = SessionManager::start(store, api, SignInPolicy::Strict).await;
        result.unwrap();

        assert_eq!(manager.snapshot().status(), SessionStatus::SignedOut);
        assert_eq!(manager.user(), None);
        assert_eq!(manager.api().header(), None);
        assert!(!journal.lock().unwrap().iter().any(|e| e == "set header"));
    }

    #[tokio::test]
    async fn test_restore_with_missing_user_stays_signed_out() {
        let store = JournalStore::with_entries(&[(AUTH_TOKEN_STORAGE, "tok123")], Journal::default());
        let (manager, result) =
            SessionManager::start(store, FakeApi::default(), SignInPolicy::Strict).await;
        result.unwrap();

        assert!(!manager.is_signed_in());
        assert_eq!(manager.api().header(), None);
        // Orphaned key is left as found
        assert_eq!(stored(&manager, AUTH_TOKEN_STORAGE).await.as_deref(), Some("tok123"));
    }

    #[tokio::test]
    async fn test_restore_with_empty_token_stays_signed_out() {
        let store = JournalStore::with_entries(
            &[(USER_STORAGE, r#"{"name":"Ana"}"#), (AUTH_TOKEN_STORAGE, "")],
            Journal::default(),
        );
        let (manager, result) =
            SessionManager::start(store, FakeApi::default(), SignInPolicy::Strict).await;
        result.unwrap();
        assert_eq!(manager.snapshot().status(), SessionStatus::SignedOut);
    }

    #[tokio::test]
    async fn test_restore_failure_still_clears_loading() {
        let store = JournalStore::with_entries(&ana_entries(), Journal::default());
        store.fail_on("get", "token");
        let (manager, result) =
            SessionManager::start(store, FakeApi::default(), SignInPolicy::Strict).await;

        assert!(matches!(result, Err(SessionError::Storage(_))));
        assert!(!manager.is_loading());
        assert_eq!(manager.snapshot().status(), SessionStatus::SignedOut);
        assert_eq!(manager.api().header(), None);
    }

    #[tokio::test]
    async fn test_restore_corrupt_user_propagates() {
        let store = JournalStore::with_entries(
            &[(USER_STORAGE, "{not json"), (AUTH_TOKEN_STORAGE, "tok123")],
            Journal::default(),
        );
        let (manager, result) =
            SessionManager::start(store, FakeApi::default(), SignInPolicy::Strict).await;

        assert!(matches!(
            result,
            Err(SessionError::Storage(StorageError::Corrupt { .. }))
        ));
        assert!(!manager.is_loading());
    }

    #[tokio::test]
    async fn test_restore_runs_once() {
        let journal = Journal::default();
        let manager = signed_in_manager(journal.clone()).await;
        let reads = journal.lock().unwrap().len();

        manager.restore().await.unwrap();
        assert_eq!(journal.lock().unwrap().len(), reads);
    }

    // ===== sign_in =====

    #[tokio::test]
    async fn test_sign_in_persists_before_exposing_session() {
        let journal = Journal::default();
        let store = JournalStore::with_entries(&[], journal.clone());
        let user = User::new("X", "x@y.com");
        let api = FakeApi::replying(ok_response(user.clone(), "tkn"), journal.clone());
        let (manager, result) = SessionManager::start(store, api, SignInPolicy::Strict).await;
        result.unwrap();

        let mut rx = manager.subscribe();
        *manager.api().observer.lock().unwrap() = Some(manager.subscribe());
        journal.lock().unwrap().clear();

        manager.sign_in("x@y.com", "pw123456").await.unwrap();

        assert_eq!(
            *journal.lock().unwrap(),
            vec![
                "authenticate x@y.com",
                "set @gymtrack:user",
                "set @gymtrack:token",
                "set header",
            ]
        );
        assert_eq!(*manager.api().loading_seen.lock().unwrap(), vec![true]);

        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.user, Some(user.clone()));
        assert!(!snapshot.is_loading_user_storage_data);

        assert_eq!(
            stored(&manager, USER_STORAGE).await,
            Some(serde_json::to_string(&user).unwrap())
        );
        assert_eq!(stored(&manager, AUTH_TOKEN_STORAGE).await.as_deref(), Some("tkn"));
        assert_eq!(manager.api().header().as_deref(), Some("Bearer tkn"));
    }

    #[tokio::test]
    async fn test_sign_in_without_token_is_rejected_and_changes_nothing() {
        let journal = Journal::default();
        let store = JournalStore::with_entries(&[], journal.clone());
        let api = FakeApi::replying(
            Ok(SignInResponse {
                user: Some(User::new("X", "x@y.com")),
                token: None,
            }),
            journal.clone(),
        );
        let (manager, _) = SessionManager::start(store, api, SignInPolicy::Strict).await;

        let err = manager.sign_in("x@y.com", "pw123456").await.unwrap_err();
        assert!(matches!(err, SessionError::MalformedResponse { missing: "token" }));

        assert_eq!(manager.snapshot().status(), SessionStatus::SignedOut);
        assert_eq!(stored(&manager, USER_STORAGE).await, None);
        assert_eq!(stored(&manager, AUTH_TOKEN_STORAGE).await, None);
        assert_eq!(manager.api().header(), None);
        assert!(!journal.lock().unwrap().iter().any(|e| e.starts_with("set")));
    }

    #[tokio::test]
    async fn test_sign_in_without_user_is_rejected_and_changes_nothing() {
        let journal = Journal::default();
        let store = JournalStore::with_entries(&[], journal.clone());
        let api = FakeApi::replying(
            Ok(SignInResponse {
                user: None,
                token: Some("tkn".to_string()),
            }),
            journal.clone(),
        );
        let (manager, _) = SessionManager::start(store, api, SignInPolicy::Strict).await;

        let err = manager.sign_in("x@y.com", "pw123456").await.unwrap_err();
        assert!(matches!(err, SessionError::MalformedResponse { missing: "user" }));

        assert!(!manager.is_signed_in());
        assert!(!manager.is_loading());
        assert_eq!(stored(&manager, USER_STORAGE).await, None);
        assert_eq!(stored(&manager, AUTH_TOKEN_STORAGE).await, None);
        assert_eq!(manager.api().header(), None);
        assert!(!journal.lock().unwrap().iter().any(|e| e.starts_with("set")));
    }

    #[tokio::test]
    async fn test_lenient_policy_ignores_incomplete_response() {
        let store = JournalStore::with_entries(&[], Journal::default());
        let api = FakeApi::replying(
            Ok(SignInResponse {
                user: None,
                token: Some("tkn".to_string()),
            }),
            Journal::default(),
        );
        let (manager, _) = SessionManager::start(store, api, SignInPolicy::Lenient).await;

        manager.sign_in("x@y.com", "pw123456").await.unwrap();
        assert!(!manager.is_signed_in());
        assert!(!manager.is_loading());
        assert_eq!(manager.api().header(), None);
    }

    #[tokio::test]
    async fn test_sign_in_api_error_propagates_and_clears_loading() {
        let store = JournalStore::with_entries(&[], Journal::default());
        let api = FakeApi::replying(
            Err(ApiError::App {
                status: 401,
                message: "E-mail e/ou senha incorreta.".to_string(),
            }),
            Journal::default(),
        );
        let (manager, _) = SessionManager::start(store, api, SignInPolicy::Strict).await;

        let err = manager.sign_in("x@y.com", "wrong-pw").await.unwrap_err();
        assert_eq!(err.user_message(), "E-mail e/ou senha incorreta.");
        assert!(!manager.is_loading());
        assert_eq!(manager.snapshot().status(), SessionStatus::SignedOut);
    }

    #[tokio::test]
    async fn test_sign_in_token_write_failure_discards_user() {
        let journal = Journal::default();
        let store = JournalStore::with_entries(&[], journal.clone());
        store.fail_on("set", "token");
        let api = FakeApi::replying(ok_response(User::new("X", "x@y.com"), "tkn"), journal);
        let (manager, _) = SessionManager::start(store, api, SignInPolicy::Strict).await;

        let err = manager.sign_in("x@y.com", "pw123456").await.unwrap_err();
        assert!(matches!(err, SessionError::Storage(_)));
        assert_eq!(stored(&manager, USER_STORAGE).await, None);
        assert_eq!(stored(&manager, AUTH_TOKEN_STORAGE).await, None);
        assert!(!manager.is_signed_in());
        assert_eq!(manager.api().header(), None);
        assert!(!manager.is_loading());
    }

    // ===== sign_out =====

    #[tokio::test]
    async fn test_sign_out_clears_memory_storage_and_header() {
        let journal = Journal::default();
        let manager = signed_in_manager(journal.clone()).await;
        manager.credentials().backend().observe(manager.subscribe());
        journal.lock().unwrap().clear();

        manager.sign_out().await.unwrap();

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.status(), SessionStatus::SignedOut);
        assert_eq!(snapshot.user, None);
        assert_eq!(manager.token(), None);
        assert_eq!(manager.api().header(), None);
        assert_eq!(stored(&manager, USER_STORAGE).await, None);
        assert_eq!(stored(&manager, AUTH_TOKEN_STORAGE).await, None);
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["clear header", "remove @gymtrack:user", "remove @gymtrack:token"]
        );
        assert_eq!(
            *manager.credentials().backend().loading_seen.lock().unwrap(),
            vec![true, true]
        );
    }

    #[tokio::test]
    async fn test_sign_out_storage_failure_still_ends_session() {
        let manager = signed_in_manager(Journal::default()).await;
        manager.credentials().backend().fail_on("remove", "user");

        let err = manager.sign_out().await.unwrap_err();
        assert!(matches!(err, SessionError::Storage(_)));
        assert!(!manager.is_signed_in());
        assert_eq!(manager.user(), None);
        assert!(!manager.is_loading());
        // The other key is still removed
        assert_eq!(stored(&manager, AUTH_TOKEN_STORAGE).await, None);
    }

    // ===== update_user_profile =====

    #[tokio::test]
    async fn test_update_profile_keeps_token() {
        let manager = signed_in_manager(Journal::default()).await;
        manager.credentials().backend().observe(manager.subscribe());

        let mut updated = manager.user().unwrap();
        updated.name = "Ana Maria".to_string();
        updated.avatar = Some("ana.png".to_string());
        manager.update_user_profile(updated.clone()).await.unwrap();

        assert_eq!(manager.user(), Some(updated.clone()));
        assert_eq!(manager.token().as_deref(), Some("tok123"));
        assert_eq!(stored(&manager, AUTH_TOKEN_STORAGE).await.as_deref(), Some("tok123"));
        assert_eq!(
            stored(&manager, USER_STORAGE).await,
            Some(serde_json::to_string(&updated).unwrap())
        );
        assert_eq!(
            *manager.credentials().backend().loading_seen.lock().unwrap(),
            vec![false]
        );
    }

    #[tokio::test]
    async fn test_update_profile_when_signed_out_is_rejected() {
        let store = JournalStore::with_entries(&[], Journal::default());
        let (manager, _) = SessionManager::start(store, FakeApi::default(), SignInPolicy::Strict).await;

        let err = manager
            .update_user_profile(User::new("Ghost", "g@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotSignedIn));
        assert_eq!(manager.user(), None);
        assert_eq!(stored(&manager, USER_STORAGE).await, None);
    }

    #[tokio::test]
    async fn test_update_profile_write_failure_propagates() {
        let manager = signed_in_manager(Journal::default()).await;
        manager.credentials().backend().fail_on("set", "user");

        let err = manager
            .update_user_profile(User::new("Ana Maria", "ana@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Storage(_)));
        assert!(manager.is_signed_in());
    }

    // ===== single-flight =====

    #[tokio::test]
    async fn test_sign_out_waits_for_in_flight_sign_in() {
        let journal = Journal::default();
        let gate = Arc::new(Notify::new());
        let store = JournalStore::with_entries(&[], journal.clone());
        let api = FakeApi {
            gate: Some(gate.clone()),
            ..FakeApi::replying(ok_response(User::new("X", "x@y.com"), "tkn"), journal.clone())
        };
        let (manager, _) = SessionManager::start(store, api, SignInPolicy::Strict).await;
        journal.lock().unwrap().clear();

        let (signed_in, signed_out, _) = tokio::join!(
            manager.sign_in("x@y.com", "pw123456"),
            async {
                tokio::task::yield_now().await;
                manager.sign_out().await
            },
            async {
                tokio::task::yield_now().await;
                tokio::task::yield_now().await;
                gate.notify_one();
            },
        );
        signed_in.unwrap();
        signed_out.unwrap();

        assert_eq!(
            *journal.lock().unwrap(),
            vec![
                "authenticate x@y.com",
                "set @gymtrack:user",
                "set @gymtrack:token",
                "set header",
                "clear header",
                "remove @gymtrack:user",
                "remove @gymtrack:token",
            ]
        );
        assert_eq!(manager.snapshot().status(), SessionStatus::SignedOut);
        assert_eq!(manager.api().header(), None);
    }

    #[tokio::test]
    async fn test_wait_until_ready_after_restore() {
        let manager = signed_in_manager(Journal::default()).await;
        let snapshot = manager.wait_until_ready().await;
        assert!(!snapshot.is_loading_user_storage_data);
        assert!(snapshot.is_signed_in());
    }

    #[tokio::test]
    async fn test_wait_until_ready_waits_for_in_flight_sign_in() {
        let journal = Journal::default();
        let gate = Arc::new(Notify::new());
        let store = JournalStore::with_entries(&[], journal.clone());
        let api = FakeApi {
            gate: Some(gate.clone()),
            ..FakeApi::replying(ok_response(User::new("X", "x@y.com"), "tkn"), journal)
        };
        let (manager, _) = SessionManager::start(store, api, SignInPolicy::Strict).await;

        let (signed_in, snapshot, _) = tokio::join!(
            manager.sign_in("x@y.com", "pw123456"),
            async {
                tokio::task::yield_now().await;
                assert!(manager.is_loading());
                manager.wait_until_ready().await
            },
            async {
                tokio::task::yield_now().await;
                tokio::task::yield_now().await;
                gate.notify_one();
            },
        );
        signed_in.unwrap();
        assert!(!snapshot.is_loading_user_storage_data);
        assert_eq!(snapshot.status(), SessionStatus::SignedIn);
    }
}
