//! Authenticated subject
//!
//! The principals and credentials a login flow established.

use idp_principal::{Principal, PrincipalKind, PrincipalSupporting};
use serde::{Deserialize, Serialize};

/// An authenticated subject.
///
/// Principals behave as an insertion-ordered set: adding a principal that is
/// already present is a no-op. Private credentials are never serialized and
/// never printed.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Subject {
    /// Principals, in insertion order
    #[serde(default)]
    principals: Vec<Principal>,

    /// Public credentials (e.g. certificates)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub public_credentials: Vec<serde_json::Value>,

    /// Private credentials (e.g. a delegated password)
    #[serde(skip)]
    pub private_credentials: Vec<serde_json::Value>,
}

impl std::fmt::Debug for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subject")
            .field("principals", &self.principals)
            .field("public_credentials", &self.public_credentials)
            .field(
                "private_credentials",
                &format_args!("[REDACTED; {}]", self.private_credentials.len()),
            )
            .finish()
    }
}

impl Subject {
    /// Create an empty subject.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a subject from principals, dropping duplicates.
    pub fn with_principals<I>(principals: I) -> Self
    where
        I: IntoIterator<Item = Principal>,
    {
        let mut subject = Self::new();
        for principal in principals {
            subject.add_principal(principal);
        }
        subject
    }

    /// Add a principal.
    ///
    /// # Returns
    ///
    /// `true` if the principal was not already present
    pub fn add_principal(&mut self, principal: Principal) -> bool {
        if self.principals.contains(&principal) {
            return false;
        }
        self.principals.push(principal);
        true
    }

    /// Remove a principal.
    pub fn remove_principal(&mut self, principal: &Principal) -> bool {
        let before = self.principals.len();
        self.principals.retain(|p| p != principal);
        self.principals.len() != before
    }

    /// Get all principals.
    pub fn principals(&self) -> &[Principal] {
        &self.principals
    }

    /// Check if the subject carries a principal.
    pub fn has_principal(&self, principal: &Principal) -> bool {
        self.principals.contains(principal)
    }

    /// Add a public credential.
    pub fn add_public_credential(&mut self, credential: serde_json::Value) {
        self.public_credentials.push(credential);
    }

    /// Add a private credential.
    pub fn add_private_credential(&mut self, credential: serde_json::Value) {
        self.private_credentials.push(credential);
    }
}

impl PrincipalSupporting for Subject {
    fn supported_principals(&self, kind: PrincipalKind) -> Vec<&Principal> {
        self.principals.as_slice().supported_principals(kind)
    }
}
