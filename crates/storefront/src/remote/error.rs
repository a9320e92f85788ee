//! Remote error taxonomy and the classifier that produces it.

use thiserror::Error;

/// Classified remote store failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The database (or the collection's parent database) does not exist.
    #[error("database does not exist: {0}")]
    DatabaseMissing(String),

    /// Security rules or a disabled API rejected the request.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Network failure, timeout, or an unavailable backend.
    #[error("connection lost: {0}")]
    ConnectivityLoss(String),

    /// A specific document was not found.
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("remote error: {0}")]
    Unknown(String),
}

impl RemoteError {
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::DatabaseMissing(m)
            | Self::PermissionDenied(m)
            | Self::ConnectivityLoss(m)
            | Self::NotFound(m)
            | Self::Unknown(m) => m,
        }
    }
}

const CONNECTIVITY_CODES: &[&str] = &[
    "unavailable",
    "deadline-exceeded",
    "cancelled",
    "aborted",
    "resource-exhausted",
    "internal",
];

const CONNECTIVITY_HINTS: &[&str] = &[
    "network",
    "offline",
    "timed out",
    "timeout",
    "connection",
    "unreachable",
];

/// Classify a raw error code and message from a remote client.
///
/// Codes are compared after normalisation, so `NOT_FOUND`, `not-found` and
/// `not_found` are equivalent. Rules apply in order, first match wins:
///
/// 1. database missing: the message says the database does not exist, or a
///    not-found code that does not name a specific document
/// 2. permission denied: `permission-denied`, or the Firestore API is disabled
/// 3. not found: a not-found code naming a document
/// 4. connectivity: transport-level codes or messages
/// 5. anything else is unknown
#[must_use]
pub fn classify(code: Option<&str>, message: &str) -> RemoteError {
    let code = code.map(normalize_code).unwrap_or_default();
    let lower = message.to_lowercase();
    let owned = message.to_string();

    let not_found = code == "not-found";
    let names_document = lower.contains("no document") || lower.contains("/documents/");

    if lower.contains("database (default) does not exist")
        || (lower.contains("database") && lower.contains("does not exist"))
        || (not_found && !names_document)
    {
        return RemoteError::DatabaseMissing(owned);
    }

    if code == "permission-denied"
        || code == "unauthenticated"
        || lower.contains("cloud firestore api")
        || lower.contains("missing or insufficient permissions")
    {
        return RemoteError::PermissionDenied(owned);
    }

    if not_found {
        return RemoteError::NotFound(owned);
    }

    if CONNECTIVITY_CODES.contains(&code.as_str())
        || CONNECTIVITY_HINTS.iter().any(|hint| lower.contains(hint))
    {
        return RemoteError::ConnectivityLoss(owned);
    }

    RemoteError::Unknown(owned)
}

fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase().replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_database_by_message() {
        let err = classify(
            Some("failed-precondition"),
            "The database (default) does not exist for project web-ban-hang-ai",
        );
        assert!(matches!(err, RemoteError::DatabaseMissing(_)));
    }

    #[test]
    fn test_bare_not_found_is_missing_database() {
        let err = classify(Some("NOT_FOUND"), "Requested entity was not found.");
        assert!(matches!(err, RemoteError::DatabaseMissing(_)));
    }

    #[test]
    fn test_document_not_found() {
        let err = classify(
            Some("not-found"),
            "No document to update: projects/p/databases/(default)/documents/products/42",
        );
        assert!(matches!(err, RemoteError::NotFound(_)));
    }

    #[test]
    fn test_permission_denied() {
        let err = classify(
            Some("PERMISSION_DENIED"),
            "Missing or insufficient permissions.",
        );
        assert!(matches!(err, RemoteError::PermissionDenied(_)));

        let err = classify(
            None,
            "Cloud Firestore API has not been used in project 123 before or it is disabled.",
        );
        assert!(matches!(err, RemoteError::PermissionDenied(_)));
    }

    #[test]
    fn test_database_rule_wins_over_permission() {
        let err = classify(
            Some("permission-denied"),
            "The database (default) does not exist for project p",
        );
        assert!(matches!(err, RemoteError::DatabaseMissing(_)));
    }

    #[test]
    fn test_connectivity() {
        assert!(matches!(
            classify(Some("UNAVAILABLE"), "The service is currently unavailable."),
            RemoteError::ConnectivityLoss(_)
        ));
        assert!(matches!(
            classify(None, "error sending request: connection refused"),
            RemoteError::ConnectivityLoss(_)
        ));
    }

    #[test]
    fn test_unknown() {
        let err = classify(Some("already-exists"), "Document already exists");
        assert_eq!(err, RemoteError::Unknown("Document already exists".to_string()));
        assert_eq!(err.message(), "Document already exists");
    }
}
