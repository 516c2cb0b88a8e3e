//! Login session.
//!
//! A session begins on login with the token and user profile returned by the
//! remote API, ends on logout, and can be restored at startup from the
//! persisted `authToken` / `userData` keys once the token is revalidated.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{Database, DbError, AUTH_TOKEN_KEY, USER_DATA_KEY};
use crate::remote::RemoteFailure;

/// Session errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Empty authentication token")]
    MissingToken,

    #[error("Invalid stored user data: {0}")]
    InvalidUserData(#[from] serde_json::Error),

    #[error(transparent)]
    Remote(#[from] RemoteFailure),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Logged-in user as returned by the login endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

/// An active session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Local identifier used to correlate log lines
    pub session_id: Uuid,
    pub token: String,
    pub user: UserProfile,
    pub started_at: String,
}

/// Checks a bearer token against the remote API.
pub trait TokenValidator {
    /// `Ok(false)` means the token was rejected.
    fn validate(&self, token: &str) -> Result<bool, RemoteFailure>;
}

/// Owns the current session and its persisted copy.
#[derive(Debug, Default)]
pub struct SessionManager {
    current: Option<Session>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.is_some()
    }

    /// Value for the `Authorization` header.
    pub fn bearer_header(&self) -> Option<String> {
        self.current
            .as_ref()
            .map(|session| format!("Bearer {}", session.token))
    }

    /// Start a session after a successful login and persist it.
    pub fn begin(
        &mut self,
        db: &Database,
        token: &str,
        user: UserProfile,
    ) -> SessionResult<&Session> {
        let token = token.trim();
        if token.is_empty() {
            return Err(SessionError::MissingToken);
        }

        db.set_session_value(AUTH_TOKEN_KEY, token)?;
        db.set_session_value(USER_DATA_KEY, &serde_json::to_string(&user)?)?;

        let session = Session {
            session_id: Uuid::new_v4(),
            token: token.to_string(),
            user,
            started_at: chrono::Utc::now().to_rfc3339(),
        };
        info!(session_id = %session.session_id, user_id = session.user.id, "Session started");
        Ok(&*self.current.insert(session))
    }

    /// End the session and forget the persisted keys.
    pub fn end(&mut self, db: &Database) -> SessionResult<()> {
        db.delete_session_value(AUTH_TOKEN_KEY)?;
        db.delete_session_value(USER_DATA_KEY)?;
        if let Some(session) = self.current.take() {
            info!(session_id = %session.session_id, "Session ended");
        }
        Ok(())
    }

    /// Restore the persisted session if its token is still valid.
    ///
    /// Any failure (rejected token, unreachable API, corrupt user data) tears
    /// the session down. A remote failure is returned after the teardown.
    pub fn restore(
        &mut self,
        db: &Database,
        validator: &dyn TokenValidator,
    ) -> SessionResult<Option<&Session>> {
        let token = db.get_session_value(AUTH_TOKEN_KEY)?;
        let user_data = db.get_session_value(USER_DATA_KEY)?;
        let (Some(token), Some(user_data)) = (token, user_data) else {
            self.end(db)?;
            return Ok(None);
        };

        let user: UserProfile = match serde_json::from_str(&user_data) {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Stored user data unreadable");
                self.end(db)?;
                return Ok(None);
            }
        };

        match validator.validate(&token) {
            Ok(true) => {
                let session = Session {
                    session_id: Uuid::new_v4(),
                    token,
                    user,
                    started_at: chrono::Utc::now().to_rfc3339(),
                };
                info!(session_id = %session.session_id, "Session restored");
                Ok(Some(&*self.current.insert(session)))
            }
            Ok(false) => {
                warn!("Stored token rejected");
                self.end(db)?;
                Ok(None)
            }
            Err(failure) => {
                warn!(error = %failure, "Token validation failed");
                self.end(db)?;
                Err(failure.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedValidator(Result<bool, RemoteFailure>);

    impl TokenValidator for FixedValidator {
        fn validate(&self, _token: &str) -> Result<bool, RemoteFailure> {
            self.0.clone()
        }
    }

    fn user() -> UserProfile {
        UserProfile {
            id: 3,
            name: "Dra. Lima".into(),
            email: Some("lima@clinica.org".into()),
            role: Some("dentista".into()),
        }
    }

    #[test]
    fn test_begin_and_bearer() {
        let db = Database::open_in_memory().unwrap();
        let mut sessions = SessionManager::new();

        assert!(matches!(
            sessions.begin(&db, "  ", user()),
            Err(SessionError::MissingToken)
        ));

        sessions.begin(&db, "tok123", user()).unwrap();
        assert_eq!(sessions.bearer_header().as_deref(), Some("Bearer tok123"));
        assert_eq!(
            db.get_session_value(AUTH_TOKEN_KEY).unwrap().as_deref(),
            Some("tok123")
        );
    }

    #[test]
    fn test_end_clears_storage() {
        let db = Database::open_in_memory().unwrap();
        let mut sessions = SessionManager::new();
        sessions.begin(&db, "tok123", user()).unwrap();

        sessions.end(&db).unwrap();
        assert!(!sessions.is_authenticated());
        assert!(db.get_session_value(USER_DATA_KEY).unwrap().is_none());
    }

    #[test]
    fn test_restore_valid_token() {
        let db = Database::open_in_memory().unwrap();
        SessionManager::new().begin(&db, "tok123", user()).unwrap();

        let mut sessions = SessionManager::new();
        let restored = sessions
            .restore(&db, &FixedValidator(Ok(true)))
            .unwrap()
            .unwrap();
        assert_eq!(restored.user, user());
    }

    #[test]
    fn test_restore_rejected_token_tears_down() {
        let db = Database::open_in_memory().unwrap();
        SessionManager::new().begin(&db, "tok123", user()).unwrap();

        let mut sessions = SessionManager::new();
        assert!(sessions
            .restore(&db, &FixedValidator(Ok(false)))
            .unwrap()
            .is_none());
        assert!(db.get_session_value(AUTH_TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn test_restore_remote_failure_tears_down() {
        let db = Database::open_in_memory().unwrap();
        SessionManager::new().begin(&db, "tok123", user()).unwrap();

        let mut sessions = SessionManager::new();
        let failure = RemoteFailure::new(503, "validar token", "indisponível");
        let err = sessions
            .restore(&db, &FixedValidator(Err(failure)))
            .unwrap_err();
        assert_eq!(err.to_string(), "Erro 503 ao validar token: indisponível");
        assert!(!sessions.is_authenticated());
        assert!(db.get_session_value(AUTH_TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn test_restore_without_stored_session() {
        let db = Database::open_in_memory().unwrap();
        let mut sessions = SessionManager::new();
        assert!(sessions
            .restore(&db, &FixedValidator(Ok(true)))
            .unwrap()
            .is_none());
    }
}
