use serde::Serialize;
use tokio::sync::watch;

use crate::models::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Restore has not run yet
    Uninitialized,
    /// Restore, sign-in or sign-out in flight
    Loading,
    SignedOut,
    SignedIn,
}

/// What UI consumers see of the session. Never carries the token.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub is_loading_user_storage_data: bool,
    #[serde(skip)]
    pub(crate) restored: bool,
}

impl SessionSnapshot {
    pub(crate) fn initial() -> Self {
        Self {
            user: None,
            is_loading_user_storage_data: true,
            restored: false,
        }
    }

    pub fn status(&self) -> SessionStatus {
        if self.is_loading_user_storage_data {
            SessionStatus::Loading
        } else if !self.restored {
            SessionStatus::Uninitialized
        } else if self.user.is_some() {
            SessionStatus::SignedIn
        } else {
            SessionStatus::SignedOut
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_restored(&self) -> bool {
        self.restored
    }
}

/// Raises the loading flag for as long as it is alive.
///
/// Dropping the guard clears the flag on every exit path, including `?`
/// returns and panics inside the operation.
pub(crate) struct LoadingGuard<'a> {
    state: &'a watch::Sender<SessionSnapshot>,
}

impl<'a> LoadingGuard<'a> {
    pub(crate) fn begin(state: &'a watch::Sender<SessionSnapshot>) -> Self {
        state.send_modify(|s| s.is_loading_user_storage_data = true);
        Self { state }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state
            .send_modify(|s| s.is_loading_user_storage_data = false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        let mut snapshot = SessionSnapshot::initial();
        assert_eq!(snapshot.status(), SessionStatus::Loading);

        snapshot.is_loading_user_storage_data = false;
        assert_eq!(snapshot.status(), SessionStatus::Uninitialized);

        snapshot.restored = true;
        assert_eq!(snapshot.status(), SessionStatus::SignedOut);

        snapshot.user = Some(User::new("Ana", "ana@x.com"));
        assert_eq!(snapshot.status(), SessionStatus::SignedIn);
        assert!(snapshot.is_signed_in());
    }

    #[test]
    fn test_loading_guard_clears_on_drop() {
        let (tx, rx) = watch::channel(SessionSnapshot::default());
        {
            let _guard = LoadingGuard::begin(&tx);
            assert!(rx.borrow().is_loading_user_storage_data);
        }
        assert!(!rx.borrow().is_loading_user_storage_data);
    }

    #[test]
    fn test_snapshot_serializes_for_consumers() {
        let snapshot = SessionSnapshot {
            user: Some(User::new("Ana", "ana@x.com")),
            is_loading_user_storage_data: false,
            restored: true,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["isLoadingUserStorageData"], false);
        assert_eq!(json["user"]["name"], "Ana");
        assert!(json.get("restored").is_none());
    }
}
