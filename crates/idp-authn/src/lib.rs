//! # IdP Authentication Orchestration
//!
//! This crate decides how an identity provider satisfies a login request:
//! reuse an existing authentication (SSO), run a specific login flow, or fail.
//! Once a result exists it validates that result against the relying party's
//! requirements and publishes the canonical subject.
//!
//! ## Overview
//!
//! The idp-authn crate handles:
//! - **Decision context**: Per-request record of potential flows, attempted
//!   flows, active SSO results and requested principals
//! - **Population**: Installing configured flows and still-active session results
//! - **Filtering**: Pruning flows that cannot honor forced, passive or
//!   requested-principal constraints, or whose principals are not named by a
//!   subject attribute
//! - **Selection**: The reuse-or-dispatch state machine
//! - **Finalization**: Re-validating the result and binding the subject
//!
//! Login methods themselves, canonicalization, session storage and transport
//! are collaborators outside this crate.
//!
//! ## Request Lifecycle
//!
//! ```text
//! populate -> filter -> select --Dispatch(flow)--> run flow --no result--> select ...
//!                          |                          |
//!                          +--Reuse--+    result set -+
//!                                    v
//!                                 finalize -> Proceed
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use idp_authn::{
//!     AuthenticationContext, AuthnEvent, ContextPopulator, FlowDescriptor, FlowFilter,
//!     FlowSelector, ProfileRequestContext, ResultFinalizer, AuthenticationResult,
//! };
//! use idp_principal::Principal;
//!
//! let populator = ContextPopulator::new(vec![
//!     FlowDescriptor::new("authn/Password").with_forced_authentication(true),
//! ]);
//! let mut prc = ProfileRequestContext::new(AuthenticationContext::new());
//! populator.populate(&mut prc);
//! FlowFilter::apply_all(&FlowFilter::all(), &mut prc.authentication);
//!
//! // Nothing to reuse: the password flow is dispatched
//! let outcome = FlowSelector::new().select(&mut prc.authentication);
//! assert_eq!(AuthnEvent::from_selection(&outcome), AuthnEvent::Flow("authn/Password".into()));
//!
//! // The flow ran and produced a result
//! prc.authentication.authentication_result = Some(AuthenticationResult::for_principal(
//!     "authn/Password",
//!     Principal::username("jdoe"),
//! ));
//! prc = prc.with_canonical_name("jdoe");
//!
//! let outcome = ResultFinalizer::new().finalize(&mut prc);
//! assert_eq!(AuthnEvent::from_finalize(&outcome), AuthnEvent::Proceed);
//! ```
//!
//! ## Configuration
//!
//! [`AuthnConfig`] carries the selector's `favor_sso` flag and the finalizer's
//! principal weights, loadable from environment variables or JSON.
//!
//! ## Logging
//!
//! Decisions are logged through `tracing` with a `request_id` field set to
//! the context id. The crate installs no subscriber.

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod filter;
pub mod finalize;
pub mod flow;
pub mod populate;
pub mod profile;
pub mod result;
pub mod select;
pub mod subject;

// Re-export main types for convenience
pub use config::{AuthnConfig, ConfigError, PrincipalWeight};
pub use context::{AuthenticationContext, RequestedPrincipalContext};
pub use error::{AuthnError, AuthnResult};
pub use event::AuthnEvent;
pub use filter::FlowFilter;
pub use finalize::ResultFinalizer;
pub use flow::{ActivationCondition, FlowDescriptor};
pub use populate::ContextPopulator;
pub use profile::{ProfileRequestContext, SessionRecord, SubjectCanonicalizationContext, SubjectContext};
pub use result::AuthenticationResult;
pub use select::{FlowSelection, FlowSelector};
pub use subject::Subject;
