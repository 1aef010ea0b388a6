//! Potential flow filters
//!
//! Prune flows that cannot honor the request before selection runs. Filters
//! only ever remove potential flows.

use idp_principal::Principal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::AuthenticationContext;

/// A filter over the potential flows of a context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FlowFilter {
    /// Under forced authentication, drop flows that cannot force a fresh login.
    ForcedAuthn,

    /// Under passive authentication, drop flows that need user interaction.
    Passive,

    /// Drop flows that cannot satisfy the requested principals.
    RequestedPrincipals,

    /// Keep only flows with a custom principal named by a value of a subject
    /// attribute. Does nothing when the attribute id is blank or the
    /// attribute has no values.
    ByAttribute {
        /// Attribute whose values name the acceptable principals
        attribute_id: String,

        /// Prune active results the same way, limiting SSO
        #[serde(default = "default_filter_active_results")]
        filter_active_results: bool,
    },
}

fn default_filter_active_results() -> bool {
    true
}

impl FlowFilter {
    /// Get the string representation of the filter.
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowFilter::ForcedAuthn => "forced_authn",
            FlowFilter::Passive => "passive",
            FlowFilter::RequestedPrincipals => "requested_principals",
            FlowFilter::ByAttribute { .. } => "by_attribute",
        }
    }

    /// Create an attribute filter that also prunes active results.
    ///
    /// # Example
    ///
    /// ```
    /// use idp_authn::{AuthenticationContext, FlowDescriptor, FlowFilter};
    /// use idp_principal::Principal;
    ///
    /// let mut ctx = AuthenticationContext::new()
    ///     .with_attribute("allowedMethods", ["urn:mfa"])
    ///     .with_potential_flows(vec![
    ///         FlowDescriptor::new("authn/Password")
    ///             .with_principal(Principal::authn_context_class_ref("urn:password")),
    ///         FlowDescriptor::new("authn/MFA").with_principal(Principal::authn_context_class_ref("urn:mfa")),
    ///     ]);
    ///
    /// assert_eq!(FlowFilter::by_attribute("allowedMethods").apply(&mut ctx), 1);
    /// assert!(ctx.is_potential("authn/MFA"));
    /// ```
    pub fn by_attribute(attribute_id: impl Into<String>) -> Self {
        FlowFilter::ByAttribute {
            attribute_id: attribute_id.into().trim().to_string(),
            filter_active_results: true,
        }
    }

    /// Get the filters driven by request flags and criteria, in the order
    /// they are usually applied.
    pub fn all() -> Vec<Self> {
        vec![FlowFilter::ForcedAuthn, FlowFilter::Passive, FlowFilter::RequestedPrincipals]
    }

    /// Apply the filter.
    ///
    /// # Returns
    ///
    /// The number of potential flows removed
    pub fn apply(&self, ctx: &mut AuthenticationContext) -> usize {
        let removed = match self {
            FlowFilter::ForcedAuthn if ctx.force_authn => {
                ctx.retain_potential_flows(|flow| flow.forced_authentication_supported)
            }
            FlowFilter::Passive if ctx.is_passive => {
                ctx.retain_potential_flows(|flow| flow.passive_authentication_supported)
            }
            FlowFilter::RequestedPrincipals if ctx.requested_principals().is_some() => {
                let keep: Vec<String> = ctx
                    .potential_flows()
                    .iter()
                    .filter(|flow| ctx.is_acceptable(*flow))
                    .map(|flow| flow.id.clone())
                    .collect();
                ctx.retain_potential_flows(|flow| keep.contains(&flow.id))
            }
            FlowFilter::ByAttribute {
                attribute_id,
                filter_active_results,
            } => filter_by_attribute(ctx, attribute_id, *filter_active_results),
            _ => 0,
        };

        if removed > 0 {
            debug!(
                request_id = %ctx.id,
                filter = self.as_str(),
                removed = removed,
                remaining = ctx.potential_flows().len(),
                "Filtered potential authentication flows"
            );
        }
        removed
    }

    /// Apply several filters in order.
    ///
    /// # Returns
    ///
    /// The total number of potential flows removed
    pub fn apply_all(filters: &[FlowFilter], ctx: &mut AuthenticationContext) -> usize {
        filters.iter().map(|f| f.apply(ctx)).sum()
    }
}

fn filter_by_attribute(ctx: &mut AuthenticationContext, attribute_id: &str, filter_active_results: bool) -> usize {
    let request_id = ctx.id;
    let attribute_id = attribute_id.trim();
    if attribute_id.is_empty() {
        return 0;
    }

    let values = ctx.attribute_values(attribute_id).to_vec();
    if values.is_empty() {
        debug!(
            request_id = %request_id,
            attribute_id = attribute_id,
            "Attribute has no values, nothing to do"
        );
        return 0;
    }

    let removed = ctx.retain_potential_flows(|flow| match matching_name(&flow.supported_principals, &values) {
        Some(name) => {
            debug!(
                request_id = %request_id,
                flow_id = %flow.id,
                principal = name,
                "Retaining flow, matched custom principal"
            );
            true
        }
        None => {
            debug!(
                request_id = %request_id,
                flow_id = %flow.id,
                attribute_id = attribute_id,
                "Removing flow, principals did not match any attribute values"
            );
            false
        }
    });
    if ctx.potential_flows().is_empty() {
        info!(request_id = %request_id, "No potential authentication flows remain after filtering");
    }

    if filter_active_results {
        let dropped = ctx.retain_active_results(|result| {
            let keep = matching_name(result.subject.principals(), &values).is_some();
            if !keep {
                debug!(
                    request_id = %request_id,
                    flow_id = %result.flow_id,
                    attribute_id = attribute_id,
                    "Removing active result, principals did not match any attribute values"
                );
            }
            keep
        });
        if dropped > 0 && ctx.active_results().is_empty() {
            info!(request_id = %request_id, "No active authentication results remain after filtering");
        }
    }

    removed
}

/// Name of the first principal equal to one of the attribute values.
fn matching_name<'a>(principals: &'a [Principal], values: &[String]) -> Option<&'a str> {
    principals
        .iter()
        .map(Principal::name)
        .find(|name| values.iter().any(|value| value == name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestedPrincipalContext;
    use crate::flow::FlowDescriptor;
    use crate::result::AuthenticationResult;

    fn flows() -> Vec<FlowDescriptor> {
        vec![
            FlowDescriptor::new("authn/Password").with_forced_authentication(true),
            FlowDescriptor::new("authn/IPAddress")
                .with_passive_authentication(true)
                .with_principal(Principal::authn_context_class_ref("urn:ip")),
            FlowDescriptor::new("authn/MFA")
                .with_forced_authentication(true)
                .with_principal(Principal::authn_context_class_ref("urn:mfa")),
        ]
    }

    #[test]
    fn test_filters_are_noops_without_flags() {
        let mut ctx = AuthenticationContext::new().with_potential_flows(flows());
        assert_eq!(FlowFilter::apply_all(&FlowFilter::all(), &mut ctx), 0);
        assert_eq!(ctx.potential_flows().len(), 3);
    }

    #[test]
    fn test_forced_authn_filter() {
        let mut ctx = AuthenticationContext::new()
            .with_potential_flows(flows())
            .with_force_authn(true);
        assert_eq!(FlowFilter::ForcedAuthn.apply(&mut ctx), 1);
        assert!(!ctx.is_potential("authn/IPAddress"));
    }

    #[test]
    fn test_passive_filter() {
        let mut ctx = AuthenticationContext::new()
            .with_potential_flows(flows())
            .with_passive(true);
        assert_eq!(FlowFilter::Passive.apply(&mut ctx), 2);
        assert!(ctx.is_potential("authn/IPAddress"));
    }

    #[test]
    fn test_requested_principals_filter() {
        let mut ctx = AuthenticationContext::new()
            .with_potential_flows(flows())
            .with_requested_principals(
                RequestedPrincipalContext::exact(vec![
                    Principal::authn_context_class_ref("urn:mfa"),
                    Principal::authn_context_class_ref("urn:ip"),
                ])
                .unwrap(),
            );
        assert_eq!(FlowFilter::RequestedPrincipals.apply(&mut ctx), 1);
        let ids: Vec<_> = ctx.potential_flows().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["authn/IPAddress", "authn/MFA"]);
    }

    #[test]
    fn test_as_str() {
        assert_eq!(FlowFilter::RequestedPrincipals.as_str(), "requested_principals");
        assert_eq!(FlowFilter::by_attribute("acr").as_str(), "by_attribute");
    }

    fn result_with(flow_id: &str, uri: &str) -> AuthenticationResult {
        AuthenticationResult::for_principals(
            flow_id,
            vec![Principal::username("jdoe"), Principal::authn_context_class_ref(uri)],
        )
    }

    #[test]
    fn test_attribute_filter_prunes_flows_and_results() {
        let mut ctx = AuthenticationContext::new()
            .with_potential_flows(flows())
            .with_active_results(vec![result_with("authn/IPAddress", "urn:ip"), result_with("authn/MFA", "urn:mfa")])
            .with_attribute("allowedContexts", ["urn:mfa", "urn:other"]);

        assert_eq!(FlowFilter::by_attribute("allowedContexts").apply(&mut ctx), 2);
        let ids: Vec<_> = ctx.potential_flows().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["authn/MFA"]);
        let results: Vec<_> = ctx.active_results().iter().map(|r| r.flow_id.as_str()).collect();
        assert_eq!(results, vec!["authn/MFA"]);
    }

    #[test]
    fn test_attribute_filter_can_leave_active_results() {
        let mut ctx = AuthenticationContext::new()
            .with_potential_flows(flows())
            .with_active_results(vec![result_with("authn/IPAddress", "urn:ip")])
            .with_attribute("allowedContexts", ["urn:mfa"]);
        let filter = FlowFilter::ByAttribute {
            attribute_id: "allowedContexts".into(),
            filter_active_results: false,
        };

        assert_eq!(filter.apply(&mut ctx), 2);
        assert_eq!(ctx.active_results().len(), 1);
    }

    #[test]
    fn test_attribute_filter_without_values_is_noop() {
        let mut ctx = AuthenticationContext::new()
            .with_potential_flows(flows())
            .with_active_results(vec![result_with("authn/IPAddress", "urn:ip")])
            .with_attribute("empty", Vec::<String>::new());

        assert_eq!(FlowFilter::by_attribute("missing").apply(&mut ctx), 0);
        assert_eq!(FlowFilter::by_attribute("empty").apply(&mut ctx), 0);
        assert_eq!(FlowFilter::by_attribute("  ").apply(&mut ctx), 0);
        assert_eq!(ctx.potential_flows().len(), 3);
        assert_eq!(ctx.active_results().len(), 1);
    }

    #[test]
    fn test_attribute_filter_can_empty_potential_flows() {
        let mut ctx = AuthenticationContext::new()
            .with_potential_flows(flows())
            .with_attribute("allowedContexts", ["urn:none"]);
        assert_eq!(FlowFilter::by_attribute("allowedContexts").apply(&mut ctx), 3);
        assert!(ctx.potential_flows().is_empty());
    }

    #[test]
    fn test_attribute_filter_serde_defaults() {
        let filter: FlowFilter =
            serde_json::from_str(r#"{"by_attribute":{"attribute_id":"allowedContexts"}}"#).unwrap();
        assert_eq!(filter, FlowFilter::by_attribute("allowedContexts"));
    }
}
