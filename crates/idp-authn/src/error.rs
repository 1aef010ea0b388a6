//! Error types for authentication orchestration
//!
//! This module defines the terminal outcomes the flow selector and the result
//! finalizer report to the flow-execution engine.

use thiserror::Error;

/// Authentication orchestration error types.
///
/// None of these are recovered from here. Recovery happens by re-entering the
/// flow selector, which excludes every flow already tried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthnError {
    /// Passive authentication was requested and nothing can satisfy it
    #[error("No flow or active result can satisfy a passive request")]
    NoPassive,

    /// No flow or active result remains to satisfy the request
    #[error("No potential flow remains")]
    NoPotentialFlow,

    /// Requested principal criteria cannot be satisfied
    #[error("Request unsupported: {0}")]
    RequestUnsupported(String),

    /// Canonical principal name conflicts with the one already bound
    #[error("Subject context mismatch: established {established}, existing {existing}")]
    InvalidSubjectContext { established: String, existing: String },
}

/// Result type for authentication orchestration.
pub type AuthnResult<T> = Result<T, AuthnError>;

impl AuthnError {
    /// Build the "nothing left" error for a request.
    ///
    /// # Arguments
    ///
    /// * `passive` - Whether the request demanded passive authentication
    pub fn no_flow(passive: bool) -> Self {
        if passive {
            AuthnError::NoPassive
        } else {
            AuthnError::NoPotentialFlow
        }
    }

    /// Check if this error is an internal consistency fault.
    ///
    /// Faults are logged at error level; the rest are ordinary rejections.
    pub fn is_internal_fault(&self) -> bool {
        matches!(self, AuthnError::InvalidSubjectContext { .. })
    }

    /// Get the event id the flow-execution engine dispatches on.
    pub fn event_id(&self) -> &'static str {
        match self {
            AuthnError::NoPassive => "NoPassive",
            AuthnError::NoPotentialFlow => "NoPotentialFlow",
            AuthnError::RequestUnsupported(_) => "RequestUnsupported",
            AuthnError::InvalidSubjectContext { .. } => "InvalidSubjectCtx",
        }
    }
}
