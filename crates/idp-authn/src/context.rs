//! Authentication decision context
//!
//! The per-request record threaded through population, filtering, flow
//! selection and result finalization. It is owned by exactly one request at
//! a time and is serializable so a conversation store can hold it while the
//! user is away at a login page.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use idp_principal::{Operator, Principal, PrincipalEvalPredicate, PrincipalEvalRegistry, PrincipalSupporting};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::flow::FlowDescriptor;
use crate::result::AuthenticationResult;

/// Principals a relying party requires, with the operator comparing them.
///
/// Requested principals are in precedence order, most preferred first.
///
/// # Example
///
/// ```
/// use idp_authn::RequestedPrincipalContext;
/// use idp_principal::Principal;
///
/// let rpc = RequestedPrincipalContext::exact(vec![
///     Principal::authn_context_class_ref("urn:mfa"),
///     Principal::authn_context_class_ref("urn:password"),
/// ])
/// .unwrap();
/// assert!(rpc.is_usable());
///
/// assert!(RequestedPrincipalContext::exact(vec![]).is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestedPrincipalContext {
    /// Comparison operator, as the relying party supplied it
    pub operator: String,

    /// Requested principals in precedence order
    pub requested_principals: Vec<Principal>,

    /// Principal of the final result that satisfied the request, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_principal: Option<Principal>,
}

impl RequestedPrincipalContext {
    /// Create a requested principal context.
    pub fn new(operator: impl Into<String>, requested_principals: Vec<Principal>) -> Self {
        Self {
            operator: operator.into(),
            requested_principals,
            matching_principal: None,
        }
    }

    /// Create an `exact` context, or `None` when no principals are given.
    pub fn exact(requested_principals: Vec<Principal>) -> Option<Self> {
        if requested_principals.is_empty() {
            return None;
        }
        Some(Self::new("exact", requested_principals))
    }

    /// Check if the context has both an operator and at least one principal.
    pub fn is_usable(&self) -> bool {
        !self.operator.trim().is_empty() && !self.requested_principals.is_empty()
    }

    /// Build one predicate per requested principal, in precedence order.
    ///
    /// Principals with no factory for this operator are skipped with a warning.
    pub fn predicates(&self, registry: &PrincipalEvalRegistry) -> Vec<PrincipalEvalPredicate> {
        self.requested_principals
            .iter()
            .filter_map(|p| match registry.lookup(p.kind(), &self.operator) {
                Some(factory) => Some(factory.build(p.clone())),
                None => {
                    warn!(
                        operator = %self.operator,
                        kind = %p.kind(),
                        principal = %p.name(),
                        "Configuration does not support requested principal evaluation"
                    );
                    None
                }
            })
            .collect()
    }
}

/// Decision context for one authentication request.
///
/// Potential flows, intermediate flows and active results are insertion-ordered
/// and keyed by flow id. Inserting an existing id replaces the entry in place.
///
/// The principal evaluation registry is not serialized. A deserialized
/// context evaluates with the standard (exact-only) registry until
/// [`set_registry`](Self::set_registry) reinstalls the request's registry,
/// so callers resuming a suspended request must reinstall it before
/// selection or finalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationContext {
    /// Context id, used to correlate log lines
    pub id: Uuid,

    /// When the request arrived
    pub initiation_instant: DateTime<Utc>,

    /// When finalization completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_instant: Option<DateTime<Utc>>,

    /// Candidate flows still eligible for this request
    #[serde(default)]
    potential_flows: Vec<FlowDescriptor>,

    /// Flows already dispatched and returned without a result
    #[serde(default)]
    intermediate_flows: Vec<FlowDescriptor>,

    /// Still-valid results from earlier authentications, usable for SSO
    #[serde(default)]
    active_results: Vec<AuthenticationResult>,

    /// Flow currently dispatched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempted_flow: Option<FlowDescriptor>,

    /// Explicit request to use a specific flow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signaled_flow_id: Option<String>,

    /// Result established earlier in this same request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_authentication_result: Option<AuthenticationResult>,

    /// Request forbids user interaction
    #[serde(default)]
    pub is_passive: bool,

    /// Request demands a fresh login
    #[serde(default)]
    pub force_authn: bool,

    /// Username hint supplied by the relying party
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hinted_name: Option<String>,

    /// Relying party acceptance criteria
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_principal_context: Option<RequestedPrincipalContext>,

    /// Result selected or produced for this request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_result: Option<AuthenticationResult>,

    /// Whether the final result may be cached for SSO
    #[serde(default = "default_cacheable")]
    pub result_cacheable: bool,

    /// String values of subject attributes resolved for this request, by attribute id
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    attributes: HashMap<String, Vec<String>>,

    #[serde(skip)]
    registry: Arc<PrincipalEvalRegistry>,

    #[serde(skip)]
    registry_installed: bool,
}

fn default_cacheable() -> bool {
    true
}

impl Default for AuthenticationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthenticationContext {
    /// Create an empty context using the standard registry.
    pub fn new() -> Self {
        Self {
            id: Uuid::now_v7(),
            initiation_instant: Utc::now(),
            completion_instant: None,
            potential_flows: Vec::new(),
            intermediate_flows: Vec::new(),
            active_results: Vec::new(),
            attempted_flow: None,
            signaled_flow_id: None,
            initial_authentication_result: None,
            is_passive: false,
            force_authn: false,
            hinted_name: None,
            requested_principal_context: None,
            authentication_result: None,
            result_cacheable: true,
            attributes: HashMap::new(),
            registry: Arc::new(PrincipalEvalRegistry::standard()),
            registry_installed: false,
        }
    }

    /// Set the passive flag.
    pub fn with_passive(mut self, passive: bool) -> Self {
        self.is_passive = passive;
        self
    }

    /// Set the forced authentication flag.
    pub fn with_force_authn(mut self, force: bool) -> Self {
        self.force_authn = force;
        self
    }

    /// Add potential flows.
    pub fn with_potential_flows<I>(mut self, flows: I) -> Self
    where
        I: IntoIterator<Item = FlowDescriptor>,
    {
        for flow in flows {
            self.add_potential_flow(flow);
        }
        self
    }

    /// Add active results.
    pub fn with_active_results<I>(mut self, results: I) -> Self
    where
        I: IntoIterator<Item = AuthenticationResult>,
    {
        for result in results {
            self.add_active_result(result);
        }
        self
    }

    /// Set the requested principal context.
    pub fn with_requested_principals(mut self, rpc: RequestedPrincipalContext) -> Self {
        self.requested_principal_context = Some(rpc);
        self
    }

    /// Set the initial authentication result.
    pub fn with_initial_result(mut self, result: AuthenticationResult) -> Self {
        self.initial_authentication_result = Some(result);
        self
    }

    /// Set the signaled flow id.
    pub fn with_signaled_flow_id(mut self, flow_id: impl AsRef<str>) -> Self {
        self.set_signaled_flow_id(Some(flow_id.as_ref()));
        self
    }

    /// Install a principal evaluation registry.
    pub fn with_registry(mut self, registry: Arc<PrincipalEvalRegistry>) -> Self {
        self.set_registry(registry);
        self
    }

    /// Set the values of a subject attribute.
    pub fn with_attribute<I, V>(mut self, attribute_id: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.set_attribute(attribute_id, values);
        self
    }

    /// Get the principal evaluation registry in effect.
    pub fn registry(&self) -> &PrincipalEvalRegistry {
        &self.registry
    }

    /// Replace the principal evaluation registry.
    pub fn set_registry(&mut self, registry: Arc<PrincipalEvalRegistry>) {
        self.registry = registry;
        self.registry_installed = true;
    }

    /// Check if a registry was installed since creation or deserialization.
    pub fn has_installed_registry(&self) -> bool {
        self.registry_installed
    }

    // Attributes

    /// Set the values of a subject attribute, replacing any earlier values.
    pub fn set_attribute<I, V>(&mut self, attribute_id: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.attributes
            .insert(attribute_id.into(), values.into_iter().map(Into::into).collect());
    }

    /// Get the values of a subject attribute; empty when it is unknown.
    pub fn attribute_values(&self, attribute_id: &str) -> &[String] {
        self.attributes
            .get(attribute_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    // Potential flows

    /// Get the potential flows in order.
    pub fn potential_flows(&self) -> &[FlowDescriptor] {
        &self.potential_flows
    }

    /// Get a potential flow by id.
    pub fn potential_flow(&self, flow_id: &str) -> Option<&FlowDescriptor> {
        self.potential_flows.iter().find(|f| f.id == flow_id)
    }

    /// Check if a flow is potential.
    pub fn is_potential(&self, flow_id: &str) -> bool {
        self.potential_flow(flow_id).is_some()
    }

    /// Add a potential flow, replacing one with the same id in place.
    pub fn add_potential_flow(&mut self, flow: FlowDescriptor) {
        upsert(&mut self.potential_flows, flow, |f| f.id.as_str());
    }

    /// Remove a potential flow.
    pub fn remove_potential_flow(&mut self, flow_id: &str) -> Option<FlowDescriptor> {
        let idx = self.potential_flows.iter().position(|f| f.id == flow_id)?;
        Some(self.potential_flows.remove(idx))
    }

    /// Keep only the potential flows matching `keep`.
    ///
    /// # Returns
    ///
    /// The number of flows removed
    pub fn retain_potential_flows<F>(&mut self, keep: F) -> usize
    where
        F: FnMut(&FlowDescriptor) -> bool,
    {
        let before = self.potential_flows.len();
        self.potential_flows.retain(keep);
        before - self.potential_flows.len()
    }

    /// Iterate potential flows that have not been attempted yet.
    pub fn selectable_flows(&self) -> impl Iterator<Item = &FlowDescriptor> + '_ {
        self.potential_flows
            .iter()
            .filter(move |f| !self.is_intermediate(&f.id))
    }

    // Intermediate flows

    /// Get the intermediate flows in order.
    pub fn intermediate_flows(&self) -> &[FlowDescriptor] {
        &self.intermediate_flows
    }

    /// Check if a flow has already been attempted.
    pub fn is_intermediate(&self, flow_id: &str) -> bool {
        self.intermediate_flows.iter().any(|f| f.id == flow_id)
    }

    /// Record a flow as attempted.
    ///
    /// # Returns
    ///
    /// `false` if it was already recorded
    pub fn add_intermediate_flow(&mut self, flow: FlowDescriptor) -> bool {
        if self.is_intermediate(&flow.id) {
            return false;
        }
        self.intermediate_flows.push(flow);
        true
    }

    // Active results

    /// Get the active results in order.
    pub fn active_results(&self) -> &[AuthenticationResult] {
        &self.active_results
    }

    /// Get the active result for a flow.
    pub fn active_result(&self, flow_id: &str) -> Option<&AuthenticationResult> {
        self.active_results.iter().find(|r| r.flow_id == flow_id)
    }

    /// Get the active result for a flow, mutably.
    pub fn active_result_mut(&mut self, flow_id: &str) -> Option<&mut AuthenticationResult> {
        self.active_results.iter_mut().find(|r| r.flow_id == flow_id)
    }

    /// Add an active result, replacing one for the same flow in place.
    pub fn add_active_result(&mut self, result: AuthenticationResult) {
        upsert(&mut self.active_results, result, |r| r.flow_id.as_str());
    }

    /// Keep only the active results matching `keep`.
    ///
    /// # Returns
    ///
    /// The number of results removed
    pub fn retain_active_results<F>(&mut self, keep: F) -> usize
    where
        F: FnMut(&AuthenticationResult) -> bool,
    {
        let before = self.active_results.len();
        self.active_results.retain(keep);
        before - self.active_results.len()
    }

    /// Replace all active results.
    pub fn set_active_results<I>(&mut self, results: I)
    where
        I: IntoIterator<Item = AuthenticationResult>,
    {
        self.active_results.clear();
        for result in results {
            self.add_active_result(result);
        }
    }

    // Signals and hints

    /// Get the signaled flow id.
    pub fn signaled_flow_id(&self) -> Option<&str> {
        self.signaled_flow_id.as_deref()
    }

    /// Set the signaled flow id; blank ids clear it.
    pub fn set_signaled_flow_id(&mut self, flow_id: Option<&str>) {
        self.signaled_flow_id = trimmed(flow_id);
    }

    /// Take the signaled flow id, clearing it.
    pub fn take_signaled_flow_id(&mut self) -> Option<String> {
        self.signaled_flow_id.take()
    }

    /// Get the username hint.
    pub fn hinted_name(&self) -> Option<&str> {
        self.hinted_name.as_deref()
    }

    /// Set the username hint; blank hints clear it.
    pub fn set_hinted_name(&mut self, name: Option<&str>) {
        self.hinted_name = trimmed(name);
    }

    // Requested principals

    /// Get the requested principal context, if it is usable.
    pub fn requested_principals(&self) -> Option<&RequestedPrincipalContext> {
        self.requested_principal_context
            .as_ref()
            .filter(|rpc| rpc.is_usable())
    }

    /// Build predicates for the requested principals against the registry in effect.
    ///
    /// Empty when no usable criteria exist.
    pub fn requested_predicates(&self) -> Vec<PrincipalEvalPredicate> {
        let Some(rpc) = self.requested_principals() else {
            return Vec::new();
        };

        let ranked = Operator::parse(&rpc.operator).is_some_and(|op| op.is_ranked());
        if ranked && !self.registry_installed {
            warn!(
                request_id = %self.id,
                operator = %rpc.operator,
                "Ranked operator evaluated with the standard registry, reinstall the registry after resuming a request"
            );
        }
        rpc.predicates(&self.registry)
    }

    /// Check whether a candidate is acceptable under the requested principals.
    ///
    /// Always true when no usable criteria exist.
    pub fn is_acceptable<C>(&self, candidate: &C) -> bool
    where
        C: PrincipalSupporting + ?Sized,
    {
        if self.requested_principals().is_none() {
            return true;
        }
        self.requested_predicates()
            .iter()
            .any(|predicate| predicate.test(candidate))
    }
}

fn upsert<T, F>(items: &mut Vec<T>, item: T, key: F)
where
    F: Fn(&T) -> &str,
{
    match items.iter().position(|existing| key(existing) == key(&item)) {
        Some(idx) => items[idx] = item,
        None => items.push(item),
    }
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use idp_principal::PrincipalKind;

    fn flow(id: &str) -> FlowDescriptor {
        FlowDescriptor::new(id)
    }

    #[test]
    fn test_new_context_defaults() {
        let ctx = AuthenticationContext::new();
        assert!(ctx.potential_flows().is_empty());
        assert!(ctx.attempted_flow.is_none());
        assert!(ctx.result_cacheable);
        assert!(!ctx.registry().is_empty());
        assert!(ctx.requested_principals().is_none());
    }

    #[test]
    fn test_potential_flows_keep_order_and_replace_in_place() {
        let mut ctx = AuthenticationContext::new().with_potential_flows(vec![flow("a"), flow("b")]);
        ctx.add_potential_flow(flow("a").with_forced_authentication(true));
        let ids: Vec<_> = ctx.potential_flows().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(ctx.potential_flow("a").unwrap().forced_authentication_supported);

        assert!(ctx.remove_potential_flow("a").is_some());
        assert!(!ctx.is_potential("a"));
        assert!(ctx.remove_potential_flow("a").is_none());
    }

    #[test]
    fn test_retain_reports_removed() {
        let mut ctx = AuthenticationContext::new().with_potential_flows(vec![flow("a"), flow("b"), flow("c")]);
        assert_eq!(ctx.retain_potential_flows(|f| f.id != "b"), 1);
        assert_eq!(ctx.potential_flows().len(), 2);
    }

    #[test]
    fn test_selectable_excludes_intermediate() {
        let mut ctx = AuthenticationContext::new().with_potential_flows(vec![flow("a"), flow("b")]);
        assert!(ctx.add_intermediate_flow(flow("a")));
        assert!(!ctx.add_intermediate_flow(flow("a")));
        let ids: Vec<_> = ctx.selectable_flows().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
        assert_eq!(ctx.intermediate_flows().len(), 1);
    }

    #[test]
    fn test_active_results_keyed_by_flow() {
        let mut ctx = AuthenticationContext::new();
        ctx.add_active_result(AuthenticationResult::for_principal("a", Principal::username("one")));
        ctx.add_active_result(AuthenticationResult::for_principal("a", Principal::username("two")));
        assert_eq!(ctx.active_results().len(), 1);
        assert_eq!(ctx.active_result("a").unwrap().subject_name(), Some("two"));

        ctx.set_active_results(vec![AuthenticationResult::for_principal("b", Principal::username("x"))]);
        assert!(ctx.active_result("a").is_none());
        assert!(ctx.active_result_mut("b").is_some());
    }

    #[test]
    fn test_signaled_flow_id_is_trimmed() {
        let mut ctx = AuthenticationContext::new().with_signaled_flow_id("  authn/Password ");
        assert_eq!(ctx.signaled_flow_id(), Some("authn/Password"));
        ctx.set_signaled_flow_id(Some("   "));
        assert!(ctx.signaled_flow_id().is_none());

        ctx.set_signaled_flow_id(Some("x"));
        assert_eq!(ctx.take_signaled_flow_id().as_deref(), Some("x"));
        assert!(ctx.signaled_flow_id().is_none());
    }

    #[test]
    fn test_hinted_name_is_trimmed() {
        let mut ctx = AuthenticationContext::new();
        ctx.set_hinted_name(Some(" jdoe "));
        assert_eq!(ctx.hinted_name(), Some("jdoe"));
        ctx.set_hinted_name(Some(""));
        assert!(ctx.hinted_name().is_none());
    }

    #[test]
    fn test_unusable_requested_principals_are_absent() {
        let ctx = AuthenticationContext::new()
            .with_requested_principals(RequestedPrincipalContext::new("exact", vec![]));
        assert!(ctx.requested_principals().is_none());

        let ctx = AuthenticationContext::new().with_requested_principals(RequestedPrincipalContext::new(
            " ",
            vec![Principal::authn_context_class_ref("urn:a")],
        ));
        assert!(ctx.requested_principals().is_none());
    }

    #[test]
    fn test_predicates_skip_unsupported_operator() {
        let rpc = RequestedPrincipalContext::new(
            "minimum",
            vec![Principal::authn_context_class_ref("urn:a")],
        );
        assert!(rpc.predicates(&PrincipalEvalRegistry::standard()).is_empty());

        let rpc = RequestedPrincipalContext::exact(vec![
            Principal::authn_context_class_ref("urn:a"),
            Principal::authn_context_decl_ref("urn:b"),
        ])
        .unwrap();
        let predicates = rpc.predicates(&PrincipalEvalRegistry::standard());
        assert_eq!(predicates.len(), 2);
        assert_eq!(predicates[0].operator(), Operator::Exact);
        assert_eq!(predicates[1].requested(), &Principal::authn_context_decl_ref("urn:b"));
    }

    #[test]
    fn test_is_acceptable() {
        let ctx = AuthenticationContext::new();
        assert!(ctx.is_acceptable(&flow("a")));

        let ctx = ctx.with_requested_principals(
            RequestedPrincipalContext::exact(vec![Principal::authn_context_class_ref("urn:a")]).unwrap(),
        );
        assert!(!ctx.is_acceptable(&flow("a")));
        assert!(ctx.is_acceptable(&flow("a").with_principal(Principal::authn_context_class_ref("urn:a"))));
    }

    #[test]
    fn test_serde_round_trip_resets_registry() {
        let empty = Arc::new(PrincipalEvalRegistry::new());
        let ctx = AuthenticationContext::new()
            .with_potential_flows(vec![flow("a")])
            .with_force_authn(true)
            .with_signaled_flow_id("a")
            .with_registry(empty);
        assert!(ctx.registry().is_empty());

        let json = serde_json::to_string(&ctx).unwrap();
        let restored: AuthenticationContext = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id, ctx.id);
        assert!(restored.force_authn);
        assert_eq!(restored.signaled_flow_id(), Some("a"));
        assert_eq!(restored.potential_flows(), ctx.potential_flows());
        assert!(!restored.registry().is_empty());
        assert!(restored.result_cacheable);
        assert!(ctx.has_installed_registry());
        assert!(!restored.has_installed_registry());
    }

    #[test]
    fn test_ranked_criteria_need_reinstalled_registry_after_resume() {
        let weak = Principal::authn_context_class_ref("urn:password");
        let strong = Principal::authn_context_class_ref("urn:mfa");
        let mut registry = PrincipalEvalRegistry::standard();
        registry
            .register_ranking(PrincipalKind::AuthnContextClassRef, vec![weak.clone(), strong.clone()])
            .unwrap();
        let registry = Arc::new(registry);

        let ctx = AuthenticationContext::new()
            .with_registry(Arc::clone(&registry))
            .with_requested_principals(RequestedPrincipalContext::new("minimum", vec![weak]));
        let candidate = flow("a").with_principal(strong);
        assert_eq!(ctx.requested_predicates().len(), 1);
        assert!(ctx.is_acceptable(&candidate));

        let json = serde_json::to_string(&ctx).unwrap();
        let mut restored: AuthenticationContext = serde_json::from_str(&json).unwrap();
        assert!(restored.requested_predicates().is_empty());
        assert!(!restored.is_acceptable(&candidate));

        restored.set_registry(registry);
        assert!(restored.has_installed_registry());
        assert!(restored.is_acceptable(&candidate));
    }

    #[test]
    fn test_attribute_values() {
        let mut ctx = AuthenticationContext::new().with_attribute("acr", ["urn:a", "urn:b"]);
        assert_eq!(ctx.attribute_values("acr"), &["urn:a".to_string(), "urn:b".to_string()]);
        assert!(ctx.attribute_values("missing").is_empty());

        ctx.set_attribute("acr", vec!["urn:c".to_string()]);
        assert_eq!(ctx.attribute_values("acr"), &["urn:c".to_string()]);

        let json = serde_json::to_string(&ctx).unwrap();
        let restored: AuthenticationContext = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.attribute_values("acr"), ctx.attribute_values("acr"));
    }

    #[test]
    fn test_retain_active_results() {
        let mut ctx = AuthenticationContext::new().with_active_results(vec![
            AuthenticationResult::for_principal("a", Principal::username("jdoe")),
            AuthenticationResult::for_principal("b", Principal::username("jdoe")),
        ]);
        assert_eq!(ctx.retain_active_results(|r| r.flow_id == "b"), 1);
        assert!(ctx.active_result("a").is_none());
        assert!(ctx.active_result("b").is_some());
    }
}
