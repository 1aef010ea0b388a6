//! # Principals
//!
//! Defines the closed set of principal variants an authenticated subject can
//! carry, and the kinds used to select principals out of a subject or a flow.
//!
//! Identity principals (username, LDAP, X.500, Kerberos) say *who* authenticated.
//! Custom principals (authentication context class/declaration references,
//! authentication methods) say *how*, and are what relying parties request.

use serde::{Deserialize, Serialize};

/// The kind of a principal, without its value.
///
/// Kinds are the first half of the key used by the principal evaluation
/// registry; the operator is the second.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    /// Plain username.
    Username,
    /// SAML 2 authentication context class reference.
    AuthnContextClassRef,
    /// SAML 2 authentication context declaration reference.
    AuthnContextDeclRef,
    /// SAML 1 authentication method.
    AuthenticationMethod,
    /// Identity established by an LDAP bind.
    Ldap,
    /// X.500 distinguished name, typically from a client certificate.
    X500,
    /// Kerberos principal name.
    Kerberos,
}

impl PrincipalKind {
    /// Get the string representation of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::Username => "username",
            PrincipalKind::AuthnContextClassRef => "authn_context_class_ref",
            PrincipalKind::AuthnContextDeclRef => "authn_context_decl_ref",
            PrincipalKind::AuthenticationMethod => "authentication_method",
            PrincipalKind::Ldap => "ldap",
            PrincipalKind::X500 => "x500",
            PrincipalKind::Kerberos => "kerberos",
        }
    }

    /// Parse a kind from its string representation.
    ///
    /// # Example
    ///
    /// ```
    /// use idp_principal::PrincipalKind;
    ///
    /// assert_eq!(PrincipalKind::parse("x500"), Some(PrincipalKind::X500));
    /// assert_eq!(PrincipalKind::parse("AuthnContextClassRef"), Some(PrincipalKind::AuthnContextClassRef));
    /// assert_eq!(PrincipalKind::parse("password"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "username" | "user" => Some(PrincipalKind::Username),
            "authn_context_class_ref" | "authncontextclassref" | "classref" => {
                Some(PrincipalKind::AuthnContextClassRef)
            }
            "authn_context_decl_ref" | "authncontextdeclref" | "declref" => {
                Some(PrincipalKind::AuthnContextDeclRef)
            }
            "authentication_method" | "authenticationmethod" | "method" => {
                Some(PrincipalKind::AuthenticationMethod)
            }
            "ldap" => Some(PrincipalKind::Ldap),
            "x500" => Some(PrincipalKind::X500),
            "kerberos" | "krb5" => Some(PrincipalKind::Kerberos),
            _ => None,
        }
    }

    /// Get all principal kinds.
    pub fn all() -> Vec<Self> {
        vec![
            PrincipalKind::Username,
            PrincipalKind::AuthnContextClassRef,
            PrincipalKind::AuthnContextDeclRef,
            PrincipalKind::AuthenticationMethod,
            PrincipalKind::Ldap,
            PrincipalKind::X500,
            PrincipalKind::Kerberos,
        ]
    }
}

impl std::fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A principal attached to an authenticated subject or advertised by a flow.
///
/// Two principals are equal only when both kind and value are equal.
///
/// # Example
///
/// ```
/// use idp_principal::{Principal, PrincipalKind};
///
/// let p = Principal::authn_context_class_ref("urn:oasis:names:tc:SAML:2.0:ac:classes:Password");
/// assert_eq!(p.kind(), PrincipalKind::AuthnContextClassRef);
/// assert_eq!(p.name(), "urn:oasis:names:tc:SAML:2.0:ac:classes:Password");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Principal {
    /// Plain username.
    Username(String),
    /// SAML 2 authentication context class reference.
    AuthnContextClassRef(String),
    /// SAML 2 authentication context declaration reference.
    AuthnContextDeclRef(String),
    /// SAML 1 authentication method URI.
    AuthenticationMethod(String),
    /// Identity established by an LDAP bind.
    Ldap {
        /// Username that was bound.
        username: String,
        /// Distinguished name of the resolved entry.
        dn: String,
    },
    /// X.500 distinguished name.
    X500(String),
    /// Kerberos principal name (`user@REALM`).
    Kerberos(String),
}

impl Principal {
    /// Create a username principal.
    pub fn username(name: impl Into<String>) -> Self {
        Principal::Username(name.into())
    }

    /// Create an authentication context class reference principal.
    pub fn authn_context_class_ref(uri: impl Into<String>) -> Self {
        Principal::AuthnContextClassRef(uri.into())
    }

    /// Create an authentication context declaration reference principal.
    pub fn authn_context_decl_ref(uri: impl Into<String>) -> Self {
        Principal::AuthnContextDeclRef(uri.into())
    }

    /// Create an authentication method principal.
    pub fn authentication_method(uri: impl Into<String>) -> Self {
        Principal::AuthenticationMethod(uri.into())
    }

    /// Create an LDAP principal.
    pub fn ldap(username: impl Into<String>, dn: impl Into<String>) -> Self {
        Principal::Ldap {
            username: username.into(),
            dn: dn.into(),
        }
    }

    /// Create an X.500 principal.
    pub fn x500(dn: impl Into<String>) -> Self {
        Principal::X500(dn.into())
    }

    /// Create a Kerberos principal.
    pub fn kerberos(name: impl Into<String>) -> Self {
        Principal::Kerberos(name.into())
    }

    /// Get the kind of this principal.
    pub fn kind(&self) -> PrincipalKind {
        match self {
            Principal::Username(_) => PrincipalKind::Username,
            Principal::AuthnContextClassRef(_) => PrincipalKind::AuthnContextClassRef,
            Principal::AuthnContextDeclRef(_) => PrincipalKind::AuthnContextDeclRef,
            Principal::AuthenticationMethod(_) => PrincipalKind::AuthenticationMethod,
            Principal::Ldap { .. } => PrincipalKind::Ldap,
            Principal::X500(_) => PrincipalKind::X500,
            Principal::Kerberos(_) => PrincipalKind::Kerberos,
        }
    }

    /// Get the principal's name.
    ///
    /// LDAP principals are named by the bound username.
    pub fn name(&self) -> &str {
        match self {
            Principal::Username(name)
            | Principal::AuthnContextClassRef(name)
            | Principal::AuthnContextDeclRef(name)
            | Principal::AuthenticationMethod(name)
            | Principal::X500(name)
            | Principal::Kerberos(name) => name,
            Principal::Ldap { username, .. } => username,
        }
    }

    /// Check if this principal is of the given kind.
    pub fn is_kind(&self, kind: PrincipalKind) -> bool {
        self.kind() == kind
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind().as_str(), self.name())
    }
}

/// Something that carries or advertises principals.
///
/// Flow descriptors advertise the custom principals they can produce;
/// authentication results carry the principals actually established.
/// A single [`Principal`] supports only itself, which is how one principal
/// at a time is evaluated against a requested criterion.
pub trait PrincipalSupporting {
    /// Get the supported principals of the given kind, in insertion order.
    fn supported_principals(&self, kind: PrincipalKind) -> Vec<&Principal>;
}

impl PrincipalSupporting for Principal {
    fn supported_principals(&self, kind: PrincipalKind) -> Vec<&Principal> {
        if self.is_kind(kind) {
            vec![self]
        } else {
            Vec::new()
        }
    }
}

impl PrincipalSupporting for [Principal] {
    fn supported_principals(&self, kind: PrincipalKind) -> Vec<&Principal> {
        self.iter().filter(|p| p.is_kind(kind)).collect()
    }
}
