//! Authentication results
//!
//! A result is what a login flow produces: the subject it authenticated,
//! when that happened, and when the result was last used.

use chrono::{DateTime, Utc};
use idp_principal::{Principal, PrincipalKind, PrincipalSupporting};
use serde::{Deserialize, Serialize};

use crate::subject::Subject;

/// The outcome of a successful login flow.
///
/// Two results are equal when they come from the same flow at the same
/// instant; activity updates and subject contents do not affect equality.
///
/// # Example
///
/// ```
/// use idp_authn::AuthenticationResult;
/// use idp_principal::{Principal, PrincipalKind, PrincipalSupporting};
///
/// let result = AuthenticationResult::for_principals(
///     "authn/Password",
///     vec![
///         Principal::username("jdoe"),
///         Principal::authn_context_class_ref("urn:password"),
///     ],
/// );
/// assert_eq!(result.subject_name(), Some("jdoe"));
/// assert_eq!(result.supported_principals(PrincipalKind::AuthnContextClassRef).len(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationResult {
    /// Id of the flow that produced this result
    pub flow_id: String,

    /// When the authentication happened
    pub authentication_instant: DateTime<Utc>,

    /// When the result was last used
    pub last_activity_instant: DateTime<Utc>,

    /// The authenticated subject
    pub subject: Subject,
}

impl AuthenticationResult {
    /// Create a result authenticated now.
    ///
    /// # Arguments
    ///
    /// * `flow_id` - Id of the producing flow
    /// * `subject` - The authenticated subject
    pub fn new(flow_id: impl Into<String>, subject: Subject) -> Self {
        let now = Utc::now();
        Self {
            flow_id: flow_id.into(),
            authentication_instant: now,
            last_activity_instant: now,
            subject,
        }
    }

    /// Create a result whose subject carries the given principals.
    pub fn for_principals<I>(flow_id: impl Into<String>, principals: I) -> Self
    where
        I: IntoIterator<Item = Principal>,
    {
        Self::new(flow_id, Subject::with_principals(principals))
    }

    /// Create a result with a single principal.
    pub fn for_principal(flow_id: impl Into<String>, principal: Principal) -> Self {
        Self::for_principals(flow_id, std::iter::once(principal))
    }

    /// Set the authentication instant; last activity moves with it.
    pub fn with_authentication_instant(mut self, instant: DateTime<Utc>) -> Self {
        self.authentication_instant = instant;
        self.last_activity_instant = instant;
        self
    }

    /// Set the last activity instant.
    pub fn with_last_activity_instant(mut self, instant: DateTime<Utc>) -> Self {
        self.last_activity_instant = instant;
        self
    }

    /// Record activity now.
    pub fn touch(&mut self) {
        self.last_activity_instant = Utc::now();
    }

    /// Get a display name for the subject, for logging.
    ///
    /// Prefers the first username principal, then the first principal of any kind.
    pub fn subject_name(&self) -> Option<&str> {
        self.subject
            .supported_principals(PrincipalKind::Username)
            .first()
            .map(|p| p.name())
            .or_else(|| self.subject.principals().first().map(|p| p.name()))
    }
}

impl PartialEq for AuthenticationResult {
    fn eq(&self, other: &Self) -> bool {
        self.flow_id == other.flow_id && self.authentication_instant == other.authentication_instant
    }
}

impl Eq for AuthenticationResult {}

impl PrincipalSupporting for AuthenticationResult {
    fn supported_principals(&self, kind: PrincipalKind) -> Vec<&Principal> {
        self.subject.supported_principals(kind)
    }
}
