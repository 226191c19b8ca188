use thiserror::Error;

/// Errors from the hosted auth service, or from client-side validation
/// before a request is made. Service messages are surfaced verbatim.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Network error: {0}")]
    Network(String),

    /// Rejection reported by the auth service, shown as-is in the form.
    #[error("{0}")]
    Rejected(String),

    #[error("Malformed auth response: {0}")]
    Parse(String),

    /// Client-side validation failure; no request was sent.
    #[error("{0}")]
    Invalid(String),
}

/// Errors from the data gateway (GraphQL over HTTP or WebSocket).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error: HTTP {0}")]
    Status(u16),

    /// One or more GraphQL-level errors, messages joined.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Malformed response: {0}")]
    Parse(String),

    /// No access token could be obtained for the current session.
    #[error("Not signed in")]
    NoSession,
}
