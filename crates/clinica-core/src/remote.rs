//! Failures reported by the remote clinic API.

use thiserror::Error;

/// A non-success response from the remote API.
///
/// Displayed as `Erro {status} ao {action}: {body}`, the message shown to users.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Erro {status} ao {action}: {body}")]
pub struct RemoteFailure {
    /// HTTP status code
    pub status: u16,
    /// What was being attempted, e.g. "buscar pacientes"
    pub action: String,
    /// Response body as received
    pub body: String,
}

impl RemoteFailure {
    pub fn new(status: u16, action: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            action: action.into(),
            body: body.into(),
        }
    }

    /// The token was rejected.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status, 401 | 403)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_format() {
        let failure = RemoteFailure::new(500, "salvar triagem", "internal error");
        assert_eq!(failure.to_string(), "Erro 500 ao salvar triagem: internal error");
        assert!(!failure.is_unauthorized());
        assert!(RemoteFailure::new(401, "validar token", "").is_unauthorized());
    }
}
