//! Flow selection
//!
//! Decides, each time it is entered, whether the request can be satisfied by
//! reusing an existing result (SSO) or which unattempted flow to run next.
//!
//! ## Priority
//!
//! ```text
//! 1. attempted flow from a previous entry -> intermediate flows
//! 2. signaled flow                        -> honor it or fail
//! 3. no requested principals              -> initial result, forced pick, SSO, pick
//! 4. requested principals                 -> initial result, forced pick, SSO policy
//! ```
//!
//! The SSO policy under requested principals depends on `favor_sso`. When set,
//! any active result matching a requested principal wins. When clear, the
//! first flow matching a requested principal wins, and its own active result
//! is reused only if that result also matches.

use idp_principal::PrincipalEvalPredicate;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::AuthnConfig;
use crate::context::AuthenticationContext;
use crate::error::{AuthnError, AuthnResult};
use crate::flow::FlowDescriptor;
use crate::result::AuthenticationResult;

/// What the selector decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FlowSelection {
    /// An existing result was reused and stored as the context's result.
    Reuse { flow_id: String },
    /// The flow was stored as the attempted flow and should be run.
    Dispatch { flow_id: String },
}

impl FlowSelection {
    /// Get the flow id of the reused result or dispatched flow.
    pub fn flow_id(&self) -> &str {
        match self {
            FlowSelection::Reuse { flow_id } | FlowSelection::Dispatch { flow_id } => flow_id,
        }
    }

    /// Check if a result was reused.
    pub fn is_reuse(&self) -> bool {
        matches!(self, FlowSelection::Reuse { .. })
    }
}

/// Where a reusable result lives in the context.
#[derive(Debug)]
enum ResultSource {
    Active(String),
    Initial,
}

#[derive(Debug)]
enum Decision {
    Reuse {
        source: ResultSource,
        result: AuthenticationResult,
    },
    Dispatch(FlowDescriptor),
    Fail(AuthnError),
}

impl Decision {
    fn reuse(source: ResultSource, result: &AuthenticationResult) -> Self {
        Decision::Reuse {
            source,
            result: result.clone(),
        }
    }
}

/// Normalized requested principals, with predicates built once per entry.
struct Criteria {
    operator: String,
    predicates: Vec<PrincipalEvalPredicate>,
}

impl Criteria {
    fn from_context(ctx: &AuthenticationContext) -> Option<Self> {
        ctx.requested_principals().map(|rpc| Criteria {
            operator: rpc.operator.clone(),
            predicates: ctx.requested_predicates(),
        })
    }
}

/// Active results that may be reused, paired with where they live.
type ResultPool<'a> = Vec<(ResultSource, &'a AuthenticationResult)>;

/// Flow selector.
///
/// # Example
///
/// ```
/// use idp_authn::{AuthenticationContext, AuthenticationResult, FlowDescriptor, FlowSelection, FlowSelector};
/// use idp_principal::Principal;
///
/// let mut ctx = AuthenticationContext::new()
///     .with_potential_flows(vec![FlowDescriptor::new("authn/Password")])
///     .with_active_results(vec![AuthenticationResult::for_principal(
///         "authn/Password",
///         Principal::username("jdoe"),
///     )]);
///
/// let selection = FlowSelector::new().select(&mut ctx).unwrap();
/// assert_eq!(selection, FlowSelection::Reuse { flow_id: "authn/Password".into() });
/// assert!(ctx.authentication_result.is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct FlowSelector {
    favor_sso: bool,
}

impl FlowSelector {
    /// Create a selector with strict requested-principal precedence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a selector from configuration.
    pub fn from_config(config: &AuthnConfig) -> Self {
        Self::new().with_favor_sso(config.favor_sso)
    }

    /// Set whether matching active results take priority over flow order.
    pub fn with_favor_sso(mut self, favor_sso: bool) -> Self {
        self.favor_sso = favor_sso;
        self
    }

    /// Check whether active results take priority.
    pub fn favor_sso(&self) -> bool {
        self.favor_sso
    }

    /// Run one selection step.
    ///
    /// On success exactly one of `authentication_result` (reuse) or
    /// `attempted_flow` (dispatch) is set on the context. The signaled flow id
    /// is always cleared.
    ///
    /// # Errors
    ///
    /// * `NoPassive` / `NoPotentialFlow` - nothing usable remains
    /// * `RequestUnsupported` - requested principals cannot be satisfied
    pub fn select(&self, ctx: &mut AuthenticationContext) -> AuthnResult<FlowSelection> {
        if let Some(flow) = ctx.attempted_flow.take() {
            info!(request_id = %ctx.id, flow_id = %flow.id, "Moving incomplete flow to intermediate set");
            ctx.add_intermediate_flow(flow);
        }

        let criteria = Criteria::from_context(ctx);
        let decision = match ctx.take_signaled_flow_id() {
            Some(flow_id) => self.select_signaled_flow(ctx, &flow_id, criteria.as_ref()),
            None => match criteria {
                None => self.select_without_criteria(ctx),
                Some(ref criteria) => self.select_with_criteria(ctx, criteria),
            },
        };

        self.apply(ctx, decision)
    }

    fn select_signaled_flow(
        &self,
        ctx: &AuthenticationContext,
        flow_id: &str,
        criteria: Option<&Criteria>,
    ) -> Decision {
        let Some(flow) = ctx.potential_flow(flow_id) else {
            error!(request_id = %ctx.id, flow_id = flow_id, "Signaled flow is not available");
            return Decision::Fail(AuthnError::no_flow(ctx.is_passive));
        };

        debug!(request_id = %ctx.id, flow_id = %flow.id, "Attempting to honor signaled flow");

        // Under forced authentication only a result from this same request counts.
        let candidate = if !ctx.force_authn {
            ctx.active_result(&flow.id)
                .map(|r| (ResultSource::Active(flow.id.clone()), r))
        } else {
            ctx.initial_authentication_result
                .as_ref()
                .filter(|r| r.flow_id == flow.id)
                .map(|r| (ResultSource::Initial, r))
        };

        if let Some((source, result)) = candidate {
            match criteria {
                None => return Decision::reuse(source, result),
                Some(criteria) => {
                    if criteria.predicates.iter().any(|p| p.test(result)) {
                        return Decision::reuse(source, result);
                    }
                }
            }
        }

        match criteria {
            None => return Decision::Dispatch(flow.clone()),
            Some(criteria) => {
                if criteria.predicates.iter().any(|p| p.test(flow)) {
                    return Decision::Dispatch(flow.clone());
                }
            }
        }

        error!(
            request_id = %ctx.id,
            flow_id = %flow.id,
            "Signaled flow was unusable based on requester's requirements"
        );
        Decision::Fail(AuthnError::no_flow(ctx.is_passive))
    }

    fn select_without_criteria(&self, ctx: &AuthenticationContext) -> Decision {
        debug!(request_id = %ctx.id, "No specific principals requested");

        // An initial result holds even under forced authentication.
        if let Some(initial) = self.usable_initial_result(ctx) {
            return Decision::reuse(ResultSource::Initial, initial);
        }

        if ctx.force_authn {
            debug!(request_id = %ctx.id, "Forced authentication requested, selecting an inactive flow");
            return self.select_unattempted_flow(ctx);
        }

        if let Some(result) = ctx
            .active_results()
            .iter()
            .find(|r| ctx.is_potential(&r.flow_id))
        {
            return Decision::reuse(ResultSource::Active(result.flow_id.clone()), result);
        }

        debug!(request_id = %ctx.id, "No usable active results available, selecting an inactive flow");
        self.select_unattempted_flow(ctx)
    }

    fn select_unattempted_flow(&self, ctx: &AuthenticationContext) -> Decision {
        match ctx.selectable_flows().next() {
            Some(flow) => Decision::Dispatch(flow.clone()),
            None => {
                error!(request_id = %ctx.id, "No potential flows left to choose from, authentication will fail");
                Decision::Fail(AuthnError::no_flow(ctx.is_passive))
            }
        }
    }

    fn select_with_criteria(&self, ctx: &AuthenticationContext, criteria: &Criteria) -> Decision {
        debug!(
            request_id = %ctx.id,
            operator = %criteria.operator,
            requested = criteria.predicates.len(),
            "Specific principals requested"
        );

        if let Some(initial) = self.usable_initial_result(ctx) {
            let pool: ResultPool<'_> = vec![(ResultSource::Initial, initial)];
            return self.select_requested_flow(ctx, criteria, pool);
        }

        if ctx.force_authn {
            debug!(request_id = %ctx.id, "Forced authentication requested, selecting an inactive flow");
            return self.select_requested_inactive_flow(ctx, criteria);
        }

        if ctx.active_results().is_empty() {
            debug!(request_id = %ctx.id, "No active results available, selecting an inactive flow");
            return self.select_requested_inactive_flow(ctx, criteria);
        }

        let pool: ResultPool<'_> = ctx
            .active_results()
            .iter()
            .map(|r| (ResultSource::Active(r.flow_id.clone()), r))
            .collect();
        self.select_requested_flow(ctx, criteria, pool)
    }

    fn select_requested_inactive_flow(&self, ctx: &AuthenticationContext, criteria: &Criteria) -> Decision {
        for predicate in &criteria.predicates {
            debug!(
                request_id = %ctx.id,
                operator = %criteria.operator,
                principal = %predicate.requested().name(),
                "Checking for an inactive flow compatible with requested principal"
            );
            if let Some(flow) = ctx.selectable_flows().find(|f| predicate.test(*f)) {
                return Decision::Dispatch(flow.clone());
            }
        }

        self.request_unsupported(ctx, criteria)
    }

    fn select_requested_flow(
        &self,
        ctx: &AuthenticationContext,
        criteria: &Criteria,
        pool: ResultPool<'_>,
    ) -> Decision {
        if self.favor_sso {
            debug!(request_id = %ctx.id, "Giving priority to active results that meet request requirements");
            for predicate in &criteria.predicates {
                debug!(
                    request_id = %ctx.id,
                    operator = %criteria.operator,
                    principal = %predicate.requested().name(),
                    "Checking for an active result compatible with requested principal"
                );
                if let Some((source, result)) = pool.iter().find(|(_, r)| predicate.test(*r)) {
                    return Decision::reuse(clone_source(source), result);
                }
            }
            return self.select_requested_inactive_flow(ctx, criteria);
        }

        for predicate in &criteria.predicates {
            debug!(
                request_id = %ctx.id,
                operator = %criteria.operator,
                principal = %predicate.requested().name(),
                "Checking for an inactive flow or active result compatible with requested principal"
            );
            let Some(flow) = ctx.selectable_flows().find(|f| predicate.test(*f)) else {
                continue;
            };

            // A matching flow does not imply every result it produced matches.
            return match pool.iter().find(|(_, r)| r.flow_id == flow.id) {
                Some((source, result)) if predicate.test(*result) => {
                    Decision::reuse(clone_source(source), result)
                }
                _ => Decision::Dispatch(flow.clone()),
            };
        }

        self.request_unsupported(ctx, criteria)
    }

    fn usable_initial_result<'a>(&self, ctx: &'a AuthenticationContext) -> Option<&'a AuthenticationResult> {
        ctx.initial_authentication_result
            .as_ref()
            .filter(|r| ctx.is_potential(&r.flow_id))
    }

    fn request_unsupported(&self, ctx: &AuthenticationContext, criteria: &Criteria) -> Decision {
        info!(
            request_id = %ctx.id,
            operator = %criteria.operator,
            "None of the potential authentication flows can satisfy the request"
        );
        Decision::Fail(AuthnError::RequestUnsupported(format!(
            "no potential flow satisfies the requested principals under operator '{}'",
            criteria.operator
        )))
    }

    fn apply(&self, ctx: &mut AuthenticationContext, decision: Decision) -> AuthnResult<FlowSelection> {
        match decision {
            Decision::Reuse { source, mut result } => {
                debug!(request_id = %ctx.id, flow_id = %result.flow_id, "Reusing active result");
                result.touch();
                let stored = match source {
                    ResultSource::Active(flow_id) => ctx.active_result_mut(&flow_id),
                    ResultSource::Initial => ctx.initial_authentication_result.as_mut(),
                };
                if let Some(stored) = stored {
                    stored.last_activity_instant = result.last_activity_instant;
                }
                let flow_id = result.flow_id.clone();
                ctx.attempted_flow = None;
                ctx.authentication_result = Some(result);
                Ok(FlowSelection::Reuse { flow_id })
            }
            Decision::Dispatch(flow) => {
                debug!(request_id = %ctx.id, flow_id = %flow.id, "Selecting inactive authentication flow");
                let flow_id = flow.id.clone();
                ctx.authentication_result = None;
                ctx.attempted_flow = Some(flow);
                Ok(FlowSelection::Dispatch { flow_id })
            }
            Decision::Fail(err) => Err(err),
        }
    }
}

fn clone_source(source: &ResultSource) -> ResultSource {
    match source {
        ResultSource::Active(flow_id) => ResultSource::Active(flow_id.clone()),
        ResultSource::Initial => ResultSource::Initial,
    }
}
