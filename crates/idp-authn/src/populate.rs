//! Context population
//!
//! Fills a fresh decision context with the flows configured for the request
//! and with the session's results that are still usable for SSO.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use idp_principal::PrincipalEvalRegistry;
use tracing::{debug, warn};

use crate::flow::FlowDescriptor;
use crate::profile::ProfileRequestContext;
use crate::result::AuthenticationResult;

/// Populates the decision context before filtering and selection.
///
/// # Example
///
/// ```
/// use idp_authn::{AuthenticationContext, ContextPopulator, FlowDescriptor, ProfileRequestContext};
///
/// let populator = ContextPopulator::new(vec![
///     FlowDescriptor::new("authn/Password"),
///     FlowDescriptor::new("authn/X509"),
/// ])
/// .with_active_flow_ids(vec!["Password".to_string()]);
///
/// let mut prc = ProfileRequestContext::new(AuthenticationContext::new());
/// assert_eq!(populator.populate(&mut prc), 1);
/// assert!(prc.authentication.is_potential("authn/Password"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContextPopulator {
    available_flows: Vec<FlowDescriptor>,
    active_flow_ids: Vec<String>,
    registry: Option<Arc<PrincipalEvalRegistry>>,
}

impl ContextPopulator {
    /// Create a populator offering the given flows.
    pub fn new(available_flows: Vec<FlowDescriptor>) -> Self {
        Self {
            available_flows,
            active_flow_ids: Vec::new(),
            registry: None,
        }
    }

    /// Restrict flows to these short ids; empty allows every flow.
    pub fn with_active_flow_ids(mut self, ids: Vec<String>) -> Self {
        self.active_flow_ids = ids;
        self
    }

    /// Install this registry into every populated context.
    pub fn with_registry(mut self, registry: Arc<PrincipalEvalRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Populate potential flows and active results.
    ///
    /// # Returns
    ///
    /// The number of potential flows installed
    pub fn populate(&self, prc: &mut ProfileRequestContext) -> usize {
        self.populate_at(prc, Utc::now())
    }

    /// Populate, judging result expiry at `now`.
    pub fn populate_at(&self, prc: &mut ProfileRequestContext, now: DateTime<Utc>) -> usize {
        let request_id = prc.authentication.id;

        if let Some(registry) = &self.registry {
            debug!(request_id = %request_id, "Installing custom principal evaluation registry");
            prc.authentication.set_registry(Arc::clone(registry));
        }

        if self.available_flows.is_empty() {
            warn!(request_id = %request_id, "No authentication flows are available for this request");
            return 0;
        }

        let view: &ProfileRequestContext = prc;
        let selected: Vec<FlowDescriptor> = self
            .available_flows
            .iter()
            .filter(|flow| {
                if !self.is_enabled(flow) {
                    debug!(
                        request_id = %request_id,
                        flow_id = %flow.id,
                        "Filtered out authentication flow due to profile configuration"
                    );
                    return false;
                }
                if !flow.is_active(view) {
                    debug!(
                        request_id = %request_id,
                        flow_id = %flow.id,
                        "Filtered out authentication flow due to attached condition"
                    );
                    return false;
                }
                true
            })
            .cloned()
            .collect();

        for flow in selected {
            prc.authentication.add_potential_flow(flow);
        }

        let installed = prc.authentication.potential_flows().len();
        if installed == 0 {
            warn!(request_id = %request_id, "No authentication flows are active for this request");
        } else {
            debug!(request_id = %request_id, flows = installed, "Installed authentication flows");
        }

        let active = self.active_session_results(prc, now);
        prc.authentication.set_active_results(active);

        installed
    }

    fn is_enabled(&self, flow: &FlowDescriptor) -> bool {
        self.active_flow_ids.is_empty() || self.active_flow_ids.iter().any(|id| id == flow.short_id())
    }

    fn active_session_results(&self, prc: &ProfileRequestContext, now: DateTime<Utc>) -> Vec<AuthenticationResult> {
        let Some(session) = prc.session.as_ref() else {
            return Vec::new();
        };

        session
            .authentication_results
            .iter()
            .filter(|result| match prc.authentication.potential_flow(&result.flow_id) {
                None => false,
                Some(flow) if flow.is_result_active(result, now) => true,
                Some(_) => {
                    debug!(
                        request_id = %prc.authentication.id,
                        flow_id = %result.flow_id,
                        session_id = %session.id,
                        "Authentication result is no longer active"
                    );
                    false
                }
            })
            .cloned()
            .collect()
    }
}
