//! Result finalization
//!
//! Runs once per request after a result exists. Re-validates the result
//! against the requested principals (a flow may produce less than it
//! advertises), records the principal that satisfied the request, and
//! publishes the canonical name and results into the subject record.

use std::collections::HashMap;

use chrono::Utc;
use idp_principal::{Principal, PrincipalSupporting};
use tracing::{debug, error, warn};

use crate::config::AuthnConfig;
use crate::context::{AuthenticationContext, RequestedPrincipalContext};
use crate::error::{AuthnError, AuthnResult};
use crate::profile::{ProfileRequestContext, SubjectContext};
use crate::result::AuthenticationResult;

/// Result finalizer.
///
/// # Example
///
/// ```
/// use idp_authn::{
///     AuthenticationContext, AuthenticationResult, ProfileRequestContext, ResultFinalizer,
/// };
/// use idp_principal::Principal;
///
/// let mut ctx = AuthenticationContext::new();
/// ctx.authentication_result = Some(AuthenticationResult::for_principal(
///     "authn/Password",
///     Principal::username("jdoe"),
/// ));
///
/// let mut prc = ProfileRequestContext::new(ctx).with_canonical_name("jdoe");
/// ResultFinalizer::new().finalize(&mut prc).unwrap();
///
/// let subject = prc.subject.as_ref().unwrap();
/// assert_eq!(subject.principal_name.as_deref(), Some("jdoe"));
/// assert!(prc.canonicalization.is_none());
/// assert!(prc.authentication.completion_instant.is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResultFinalizer {
    weight_map: HashMap<Principal, i32>,
}

impl ResultFinalizer {
    /// Create a finalizer with no principal weights.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a finalizer from configuration.
    pub fn from_config(config: &AuthnConfig) -> Self {
        Self::new().with_weight_map(config.weight_map())
    }

    /// Set the principal weights.
    pub fn with_weight_map(mut self, weight_map: HashMap<Principal, i32>) -> Self {
        self.weight_map = weight_map;
        self
    }

    /// Get the principal weights.
    pub fn weight_map(&self) -> &HashMap<Principal, i32> {
        &self.weight_map
    }

    /// Validate and publish the request's authentication result.
    ///
    /// The canonicalization record, if any, is consumed. The completion
    /// instant is set whenever validation and subject binding succeed.
    ///
    /// # Errors
    ///
    /// * `RequestUnsupported` - the result does not satisfy the requested principals
    /// * `InvalidSubjectContext` - the subject record is bound to another name
    pub fn finalize(&self, prc: &mut ProfileRequestContext) -> AuthnResult<()> {
        let request_id = prc.authentication.id;

        let canonical_name = match prc.canonicalization.take() {
            Some(c14n) => {
                debug!(
                    request_id = %request_id,
                    principal = %c14n.principal_name,
                    "Canonical principal name was established"
                );
                Some(c14n.principal_name)
            }
            None => prc.session.as_ref().map(|session| {
                debug!(
                    request_id = %request_id,
                    principal = %session.principal_name,
                    "Canonical principal name established from session"
                );
                session.principal_name.clone()
            }),
        };

        self.validate_result(&mut prc.authentication)?;

        if let Some(name) = canonical_name {
            let subject = prc.subject.get_or_insert_with(SubjectContext::new);
            bind_subject(subject, &prc.authentication, name)?;
        }

        prc.authentication.completion_instant = Some(Utc::now());
        Ok(())
    }

    fn validate_result(&self, ctx: &mut AuthenticationContext) -> AuthnResult<()> {
        let request_id = ctx.id;

        if ctx.requested_principals().is_none() {
            debug!(
                request_id = %request_id,
                "Request did not have explicit authentication requirements, result is accepted"
            );
            return Ok(());
        }

        let Some(latest) = ctx.authentication_result.as_ref() else {
            warn!(request_id = %request_id, "Authentication result missing from context");
            return Err(AuthnError::RequestUnsupported(
                "authentication result missing".to_string(),
            ));
        };

        let Some(rpc) = ctx.requested_principal_context.as_ref() else {
            return Ok(());
        };

        let cached = rpc
            .matching_principal
            .as_ref()
            .filter(|m| latest.supported_principals(m.kind()).contains(m))
            .cloned();

        if cached.is_none() {
            if let Some(stale) = rpc.matching_principal.as_ref() {
                debug!(
                    request_id = %request_id,
                    principal = %stale.name(),
                    "Authentication result lacks projected matching principal, reevaluating"
                );
            }
        }

        let matching = match cached {
            Some(principal) => Some(principal),
            None => self.find_matching_principal(ctx, rpc, latest),
        };

        let Some(matching) = matching else {
            warn!(
                request_id = %request_id,
                flow_id = %latest.flow_id,
                "Authentication result did not satisfy the request"
            );
            let message = format!(
                "result of flow {} does not satisfy the requested principals",
                latest.flow_id
            );
            if let Some(rpc) = ctx.requested_principal_context.as_mut() {
                rpc.matching_principal = None;
            }
            return Err(AuthnError::RequestUnsupported(message));
        };

        if let Some(rpc) = ctx.requested_principal_context.as_mut() {
            rpc.matching_principal = Some(matching);
        }
        Ok(())
    }

    /// Find the principal of the result that satisfies the request.
    ///
    /// Each principal is tested on its own so weights can choose among
    /// several matches for the same requested principal. The first requested
    /// principal with any match decides.
    fn find_matching_principal(
        &self,
        ctx: &AuthenticationContext,
        rpc: &RequestedPrincipalContext,
        result: &AuthenticationResult,
    ) -> Option<Principal> {
        let request_id = ctx.id.to_string();
        let request_id = request_id.as_str();
        for predicate in ctx.requested_predicates() {
            let requested = predicate.requested();
            debug!(
                request_id = request_id,
                operator = %rpc.operator,
                principal = %requested.name(),
                "Checking result for compatibility with requested principal"
            );

            let matches: Vec<&Principal> = result
                .supported_principals(requested.kind())
                .into_iter()
                .filter(|candidate| predicate.satisfied_by(candidate))
                .inspect(|candidate| {
                    debug!(
                        request_id = request_id,
                        principal = %candidate.name(),
                        requested = %requested.name(),
                        "Principal in authentication result satisfies request"
                    );
                })
                .collect();

            if !matches.is_empty() {
                return self.heaviest(&matches).cloned();
            }
        }
        None
    }

    /// Pick the highest-weighted principal; the last one wins a tie.
    fn heaviest<'a>(&self, matches: &[&'a Principal]) -> Option<&'a Principal> {
        let weight = |p: &Principal| self.weight_map.get(p).copied().unwrap_or(0);
        let mut best: Option<&'a Principal> = None;
        for &candidate in matches {
            match best {
                Some(current) if weight(candidate) < weight(current) => {}
                _ => best = Some(candidate),
            }
        }
        best
    }
}

fn bind_subject(subject: &mut SubjectContext, ctx: &AuthenticationContext, name: String) -> AuthnResult<()> {
    if let Some(existing) = subject.principal_name.as_deref() {
        if existing != name {
            error!(
                request_id = %ctx.id,
                established = %name,
                existing = %existing,
                "Result of authentication does not match existing subject in context"
            );
            return Err(AuthnError::InvalidSubjectContext {
                established: name,
                existing: existing.to_string(),
            });
        }
    }

    subject.principal_name = Some(name);
    for result in ctx.active_results() {
        subject.merge_result(result.clone());
    }
    if let Some(latest) = ctx.authentication_result.as_ref() {
        if !subject.add_result_if_absent(latest.clone()) {
            debug!(
                request_id = %ctx.id,
                flow_id = %latest.flow_id,
                "Subject already holds a result for this flow, keeping it"
            );
        }
    }
    Ok(())
}
