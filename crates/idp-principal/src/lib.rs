//! # IdP Principal Model
//!
//! This crate provides the principal model shared by the identity provider's
//! authentication crates.
//!
//! ## Overview
//!
//! The idp-principal crate handles:
//! - **Principals**: Closed set of identity and custom principal variants
//! - **Operators**: Comparison a relying party attaches to requested principals
//! - **Registry**: `(kind, operator)` table of predicate factories used to
//!   decide whether a flow or a result satisfies a requested principal
//!
//! ## Architecture
//!
//! ```text
//! Requested criterion = Operator + ordered [Principal]
//!
//! Examples:
//!   exact   [authn_context_class_ref:urn:...:PasswordProtectedTransport]
//!   minimum [authn_context_class_ref:urn:...:Password]   (needs a ranking)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use idp_principal::{Principal, PrincipalEvalRegistry, PrincipalKind};
//!
//! let registry = PrincipalEvalRegistry::standard();
//! let requested = Principal::authn_context_class_ref("urn:mfa");
//!
//! let predicate = registry
//!     .lookup(PrincipalKind::AuthnContextClassRef, "exact")
//!     .expect("standard registry handles exact")
//!     .build(requested.clone());
//!
//! // Candidates are anything carrying principals: here, a plain list
//! let flow_principals = vec![requested];
//! assert!(predicate.test(flow_principals.as_slice()));
//! ```
//!
//! ## Rankings
//!
//! `minimum`, `maximum` and `better` compare positions in a per-kind ranking
//! registered with [`PrincipalEvalRegistry::register_ranking`]. Without a
//! ranking, lookups for those operators return `None` and callers skip the
//! criterion.

pub mod operator;
pub mod principal;
pub mod registry;

// Re-export main types for convenience
pub use operator::Operator;
pub use principal::{Principal, PrincipalKind, PrincipalSupporting};
pub use registry::{
    PredicateFactory, PrincipalEvalPredicate, PrincipalEvalRegistry, RegistryError, RegistryResult,
};
