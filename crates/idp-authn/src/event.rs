//! Outcome events
//!
//! The closed set of signals a flow-execution engine receives from the flow
//! selector and the result finalizer.

use serde::{Deserialize, Serialize};

use crate::error::{AuthnError, AuthnResult};
use crate::select::FlowSelection;

/// Event id for a successful step.
pub const PROCEED_EVENT_ID: &str = "proceed";

/// Signal emitted at the end of a selection or finalization step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "event", content = "flow_id", rename_all = "snake_case")]
pub enum AuthnEvent {
    /// Continue: a result was reused or finalization succeeded
    Proceed,
    /// Invoke the flow with this id
    Flow(String),
    /// Passive request cannot be satisfied
    NoPassive,
    /// No flow remains
    NoPotentialFlow,
    /// Requested principals cannot be satisfied
    RequestUnsupported,
    /// Identity conflicts with the bound subject
    InvalidSubjectCtx,
}

impl AuthnEvent {
    /// Get the id the engine dispatches on.
    pub fn id(&self) -> &str {
        match self {
            AuthnEvent::Proceed => PROCEED_EVENT_ID,
            AuthnEvent::Flow(flow_id) => flow_id,
            AuthnEvent::NoPassive => "NoPassive",
            AuthnEvent::NoPotentialFlow => "NoPotentialFlow",
            AuthnEvent::RequestUnsupported => "RequestUnsupported",
            AuthnEvent::InvalidSubjectCtx => "InvalidSubjectCtx",
        }
    }

    /// Check if this event ends the request with a failure.
    pub fn is_error(&self) -> bool {
        !matches!(self, AuthnEvent::Proceed | AuthnEvent::Flow(_))
    }

    /// Build the event for a selection outcome.
    pub fn from_selection(outcome: &AuthnResult<FlowSelection>) -> Self {
        match outcome {
            Ok(FlowSelection::Reuse { .. }) => AuthnEvent::Proceed,
            Ok(FlowSelection::Dispatch { flow_id }) => AuthnEvent::Flow(flow_id.clone()),
            Err(err) => err.into(),
        }
    }

    /// Build the event for a finalization outcome.
    pub fn from_finalize(outcome: &AuthnResult<()>) -> Self {
        match outcome {
            Ok(()) => AuthnEvent::Proceed,
            Err(err) => err.into(),
        }
    }
}

impl From<&AuthnError> for AuthnEvent {
    fn from(err: &AuthnError) -> Self {
        match err {
            AuthnError::NoPassive => AuthnEvent::NoPassive,
            AuthnError::NoPotentialFlow => AuthnEvent::NoPotentialFlow,
            AuthnError::RequestUnsupported(_) => AuthnEvent::RequestUnsupported,
            AuthnError::InvalidSubjectContext { .. } => AuthnEvent::InvalidSubjectCtx,
        }
    }
}

impl std::fmt::Display for AuthnEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_ids_match_error_ids() {
        let errors = vec![
            AuthnError::NoPassive,
            AuthnError::NoPotentialFlow,
            AuthnError::RequestUnsupported("x".into()),
            AuthnError::InvalidSubjectContext {
                established: "a".into(),
                existing: "b".into(),
            },
        ];
        for err in errors {
            let event = AuthnEvent::from(&err);
            assert_eq!(event.id(), err.event_id());
            assert!(event.is_error());
        }
    }

    #[test]
    fn test_from_selection() {
        let reuse = Ok(FlowSelection::Reuse {
            flow_id: "authn/Password".into(),
        });
        assert_eq!(AuthnEvent::from_selection(&reuse), AuthnEvent::Proceed);

        let dispatch = Ok(FlowSelection::Dispatch {
            flow_id: "authn/Password".into(),
        });
        let event = AuthnEvent::from_selection(&dispatch);
        assert_eq!(event.id(), "authn/Password");
        assert!(!event.is_error());

        assert_eq!(
            AuthnEvent::from_selection(&Err(AuthnError::NoPassive)),
            AuthnEvent::NoPassive
        );
    }

    #[test]
    fn test_from_finalize() {
        assert_eq!(AuthnEvent::from_finalize(&Ok(())).id(), "proceed");
        assert_eq!(
            AuthnEvent::from_finalize(&Err(AuthnError::RequestUnsupported("x".into()))),
            AuthnEvent::RequestUnsupported
        );
    }
}
