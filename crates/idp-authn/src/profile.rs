//! Profile request records
//!
//! The request-level state surrounding the authentication context: the
//! canonicalization output, the existing session, and the downstream subject
//! record finalization publishes into. Each is a typed field rather than a
//! lookup by type.

use serde::{Deserialize, Serialize};

use crate::context::AuthenticationContext;
use crate::result::AuthenticationResult;

/// Output of subject canonicalization for the current request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubjectCanonicalizationContext {
    /// Canonical principal name
    pub principal_name: String,
}

impl SubjectCanonicalizationContext {
    /// Create a canonicalization record.
    pub fn new(principal_name: impl Into<String>) -> Self {
        Self {
            principal_name: principal_name.into(),
        }
    }
}

/// An existing IdP session, as loaded by the session store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    /// Session id
    pub id: String,

    /// Canonical principal name bound to the session
    pub principal_name: String,

    /// Results established in this session, in creation order
    #[serde(default)]
    pub authentication_results: Vec<AuthenticationResult>,
}

impl SessionRecord {
    /// Create a session with no results.
    pub fn new(id: impl Into<String>, principal_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            principal_name: principal_name.into(),
            authentication_results: Vec::new(),
        }
    }

    /// Add a result.
    pub fn with_result(mut self, result: AuthenticationResult) -> Self {
        self.authentication_results.push(result);
        self
    }
}

/// Downstream subject record consumed by protocol processing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubjectContext {
    /// Canonical principal name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_name: Option<String>,

    /// Results keyed by flow id, in insertion order
    #[serde(default)]
    authentication_results: Vec<AuthenticationResult>,
}

impl SubjectContext {
    /// Create an empty subject record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the merged results.
    pub fn authentication_results(&self) -> &[AuthenticationResult] {
        &self.authentication_results
    }

    /// Get the result for a flow.
    pub fn authentication_result(&self, flow_id: &str) -> Option<&AuthenticationResult> {
        self.authentication_results.iter().find(|r| r.flow_id == flow_id)
    }

    /// Merge a result; a result for the same flow is replaced in place.
    pub fn merge_result(&mut self, result: AuthenticationResult) {
        match self
            .authentication_results
            .iter()
            .position(|r| r.flow_id == result.flow_id)
        {
            Some(idx) => self.authentication_results[idx] = result,
            None => self.authentication_results.push(result),
        }
    }

    /// Add a result unless one for the same flow is already held.
    ///
    /// # Returns
    ///
    /// `true` if the result was added
    pub fn add_result_if_absent(&mut self, result: AuthenticationResult) -> bool {
        if self.authentication_result(&result.flow_id).is_some() {
            return false;
        }
        self.authentication_results.push(result);
        true
    }
}

/// Everything known about one profile request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRequestContext {
    /// Authentication decision context
    pub authentication: AuthenticationContext,

    /// Canonicalization output, consumed by finalization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonicalization: Option<SubjectCanonicalizationContext>,

    /// Existing session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionRecord>,

    /// Downstream subject record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<SubjectContext>,
}

impl ProfileRequestContext {
    /// Wrap an authentication context.
    pub fn new(authentication: AuthenticationContext) -> Self {
        Self {
            authentication,
            canonicalization: None,
            session: None,
            subject: None,
        }
    }

    /// Set the canonicalization output.
    pub fn with_canonical_name(mut self, principal_name: impl Into<String>) -> Self {
        self.canonicalization = Some(SubjectCanonicalizationContext::new(principal_name));
        self
    }

    /// Set the session.
    pub fn with_session(mut self, session: SessionRecord) -> Self {
        self.session = Some(session);
        self
    }

    /// Set the subject record.
    pub fn with_subject(mut self, subject: SubjectContext) -> Self {
        self.subject = Some(subject);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use idp_principal::Principal;

    #[test]
    fn test_merge_result_is_idempotent_per_flow() {
        let first = AuthenticationResult::for_principal("authn/Password", Principal::username("jdoe"))
            .with_authentication_instant(Utc::now() - Duration::hours(1));
        let second = AuthenticationResult::for_principal("authn/Password", Principal::username("jdoe"));
        let other = AuthenticationResult::for_principal("authn/MFA", Principal::username("jdoe"));

        let mut subject = SubjectContext::new();
        subject.merge_result(first.clone());
        subject.merge_result(other.clone());
        subject.merge_result(first.clone());
        assert_eq!(subject.authentication_results().len(), 2);

        subject.merge_result(second.clone());
        assert_eq!(subject.authentication_results().len(), 2);
        assert_eq!(subject.authentication_result("authn/Password"), Some(&second));
        assert_eq!(subject.authentication_results()[1], other);
    }

    #[test]
    fn test_add_result_if_absent_keeps_existing() {
        let existing = AuthenticationResult::for_principal("authn/Password", Principal::username("jdoe"))
            .with_authentication_instant(Utc::now() - Duration::hours(1));
        let newer = AuthenticationResult::for_principal("authn/Password", Principal::username("jdoe"));
        let other = AuthenticationResult::for_principal("authn/MFA", Principal::username("jdoe"));

        let mut subject = SubjectContext::new();
        assert!(subject.add_result_if_absent(existing.clone()));
        assert!(!subject.add_result_if_absent(newer));
        assert!(subject.add_result_if_absent(other.clone()));

        assert_eq!(subject.authentication_result("authn/Password"), Some(&existing));
        assert_eq!(subject.authentication_results(), &[existing, other]);
    }

    #[test]
    fn test_builders() {
        let prc = ProfileRequestContext::new(AuthenticationContext::new())
            .with_canonical_name("jdoe")
            .with_session(SessionRecord::new("s1", "jdoe"))
            .with_subject(SubjectContext::new());
        assert_eq!(prc.canonicalization.unwrap().principal_name, "jdoe");
        assert_eq!(prc.session.unwrap().id, "s1");
        assert!(prc.subject.unwrap().principal_name.is_none());
    }
}
