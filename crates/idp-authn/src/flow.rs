//! Authentication flow descriptors
//!
//! Static configuration for one available login method: which custom
//! principals it can produce, whether it can honor forced or passive
//! requests, how long its results stay usable for SSO, and an optional
//! activation condition over the request.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use idp_principal::{Principal, PrincipalKind, PrincipalSupporting};
use serde::{Deserialize, Serialize};

use crate::profile::ProfileRequestContext;
use crate::result::AuthenticationResult;

/// Predicate deciding whether a flow applies to a request.
#[derive(Clone)]
pub struct ActivationCondition(Arc<dyn Fn(&ProfileRequestContext) -> bool + Send + Sync>);

impl ActivationCondition {
    /// Wrap a closure as an activation condition.
    pub fn new<F>(condition: F) -> Self
    where
        F: Fn(&ProfileRequestContext) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(condition))
    }

    /// Evaluate the condition.
    pub fn evaluate(&self, prc: &ProfileRequestContext) -> bool {
        (self.0)(prc)
    }
}

impl std::fmt::Debug for ActivationCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ActivationCondition(..)")
    }
}

/// Descriptor of one login flow.
///
/// # Example
///
/// ```
/// use idp_authn::FlowDescriptor;
/// use idp_principal::Principal;
///
/// let flow = FlowDescriptor::new("authn/Password")
///     .with_principal(Principal::authn_context_class_ref("urn:password"))
///     .with_forced_authentication(true)
///     .with_lifetime_secs(8 * 3600);
///
/// assert_eq!(flow.short_id(), "Password");
/// assert!(flow.forced_authentication_supported);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDescriptor {
    /// Flow id, conventionally `authn/<Name>`
    pub id: String,

    /// Custom principals this flow can produce
    #[serde(default)]
    pub supported_principals: Vec<Principal>,

    /// Whether the flow performs a fresh login when forced
    #[serde(default)]
    pub forced_authentication_supported: bool,

    /// Whether the flow can run without user interaction
    #[serde(default)]
    pub passive_authentication_supported: bool,

    /// Seconds after authentication a result stays usable; `None` is unlimited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifetime_secs: Option<u64>,

    /// Seconds of inactivity after which a result expires; `None` is unlimited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inactivity_timeout_secs: Option<u64>,

    /// Condition for offering this flow on a request; always active when absent
    #[serde(skip)]
    pub activation: Option<ActivationCondition>,
}

impl FlowDescriptor {
    /// Create a descriptor with no principals and no capabilities.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            supported_principals: Vec::new(),
            forced_authentication_supported: false,
            passive_authentication_supported: false,
            lifetime_secs: None,
            inactivity_timeout_secs: None,
            activation: None,
        }
    }

    /// Add a supported principal; duplicates are ignored.
    pub fn with_principal(mut self, principal: Principal) -> Self {
        if !self.supported_principals.contains(&principal) {
            self.supported_principals.push(principal);
        }
        self
    }

    /// Add several supported principals.
    pub fn with_principals<I>(self, principals: I) -> Self
    where
        I: IntoIterator<Item = Principal>,
    {
        principals.into_iter().fold(self, |flow, p| flow.with_principal(p))
    }

    /// Set forced authentication support.
    pub fn with_forced_authentication(mut self, supported: bool) -> Self {
        self.forced_authentication_supported = supported;
        self
    }

    /// Set passive authentication support.
    pub fn with_passive_authentication(mut self, supported: bool) -> Self {
        self.passive_authentication_supported = supported;
        self
    }

    /// Set the result lifetime.
    pub fn with_lifetime_secs(mut self, secs: u64) -> Self {
        self.lifetime_secs = Some(secs);
        self
    }

    /// Set the result inactivity timeout.
    pub fn with_inactivity_timeout_secs(mut self, secs: u64) -> Self {
        self.inactivity_timeout_secs = Some(secs);
        self
    }

    /// Set the activation condition.
    pub fn with_activation<F>(mut self, condition: F) -> Self
    where
        F: Fn(&ProfileRequestContext) -> bool + Send + Sync + 'static,
    {
        self.activation = Some(ActivationCondition::new(condition));
        self
    }

    /// Get the id without its leading `authn/`-style prefix.
    ///
    /// Everything after the first `/`, or the whole id when there is none.
    pub fn short_id(&self) -> &str {
        self.id.split_once('/').map_or(self.id.as_str(), |(_, rest)| rest)
    }

    /// Check whether the flow applies to the request.
    pub fn is_active(&self, prc: &ProfileRequestContext) -> bool {
        self.activation.as_ref().map_or(true, |c| c.evaluate(prc))
    }

    /// Check whether a result produced by this flow is still usable at `now`.
    ///
    /// The lifetime runs from the authentication instant; the inactivity
    /// timeout runs from the last activity instant. A period too large to
    /// represent never expires.
    pub fn is_result_active(&self, result: &AuthenticationResult, now: DateTime<Utc>) -> bool {
        let expired = |start: DateTime<Utc>, secs: Option<u64>| {
            secs.and_then(|secs| deadline(start, secs))
                .is_some_and(|deadline| deadline <= now)
        };
        !expired(result.authentication_instant, self.lifetime_secs)
            && !expired(result.last_activity_instant, self.inactivity_timeout_secs)
    }
}

/// `start + secs`, or `None` on overflow.
fn deadline(start: DateTime<Utc>, secs: u64) -> Option<DateTime<Utc>> {
    let period = Duration::try_seconds(i64::try_from(secs).ok()?)?;
    start.checked_add_signed(period)
}

impl PartialEq for FlowDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.supported_principals == other.supported_principals
            && self.forced_authentication_supported == other.forced_authentication_supported
            && self.passive_authentication_supported == other.passive_authentication_supported
            && self.lifetime_secs == other.lifetime_secs
            && self.inactivity_timeout_secs == other.inactivity_timeout_secs
    }
}

impl PrincipalSupporting for FlowDescriptor {
    fn supported_principals(&self, kind: PrincipalKind) -> Vec<&Principal> {
        self.supported_principals.as_slice().supported_principals(kind)
    }
}
