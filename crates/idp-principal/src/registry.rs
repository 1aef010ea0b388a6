//! # Principal Evaluation Registry
//!
//! Maps a `(PrincipalKind, Operator)` pair to a predicate factory. A factory
//! builds a predicate from one requested principal; the predicate then tells
//! whether a candidate (a flow descriptor, an authentication result, or a
//! single principal) satisfies that request.
//!
//! ## Architecture
//!
//! ```text
//! lookup(kind, "minimum") -> PredicateFactory
//!     .build(requested)   -> PrincipalEvalPredicate
//!         .test(candidate)        any supported principal of the kind satisfies
//!         .satisfied_by(principal) pure per-principal comparison
//! ```
//!
//! Every comparison is a closed description rather than a callback, so the
//! table can be listed, cloned and tested exhaustively.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::operator::Operator;
use crate::principal::{Principal, PrincipalKind, PrincipalSupporting};

/// Errors raised while configuring a registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A ranking was registered with no principals.
    #[error("ranking for {0} is empty")]
    EmptyRanking(PrincipalKind),

    /// A ranking contained a principal of a different kind.
    #[error("ranking for {expected} contains a {found} principal")]
    MixedKindRanking {
        expected: PrincipalKind,
        found: PrincipalKind,
    },

    /// The same principal appears twice in a ranking.
    #[error("ranking for {kind} lists {principal} more than once")]
    DuplicateRankEntry { kind: PrincipalKind, principal: String },
}

/// Result type for registry configuration.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Describes how a predicate compares a candidate to the requested principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateFactory {
    /// Candidate must equal the requested principal.
    Exact,

    /// Candidate is compared by position in a strength ranking.
    ///
    /// `ranking` lists principals of one kind from weakest to strongest.
    Ranked {
        operator: Operator,
        ranking: Arc<[Principal]>,
    },
}

impl PredicateFactory {
    /// Create a ranked factory for the given operator.
    pub fn ranked(operator: Operator, ranking: impl Into<Arc<[Principal]>>) -> Self {
        PredicateFactory::Ranked {
            operator,
            ranking: ranking.into(),
        }
    }

    /// Get the operator this factory evaluates.
    pub fn operator(&self) -> Operator {
        match self {
            PredicateFactory::Exact => Operator::Exact,
            PredicateFactory::Ranked { operator, .. } => *operator,
        }
    }

    /// Build a predicate for one requested principal.
    ///
    /// # Arguments
    ///
    /// * `requested` - The principal the relying party asked for
    ///
    /// # Returns
    ///
    /// A predicate testing candidates against `requested`
    pub fn build(&self, requested: Principal) -> PrincipalEvalPredicate {
        PrincipalEvalPredicate {
            requested,
            factory: self.clone(),
        }
    }
}

/// A predicate built from one requested principal.
///
/// # Example
///
/// ```
/// use idp_principal::{Principal, PrincipalEvalRegistry, PrincipalKind};
///
/// let registry = PrincipalEvalRegistry::standard();
/// let requested = Principal::authn_context_class_ref("urn:mfa");
/// let predicate = registry
///     .lookup(PrincipalKind::AuthnContextClassRef, "exact")
///     .unwrap()
///     .build(requested.clone());
///
/// let produced = vec![Principal::username("jdoe"), requested];
/// assert!(predicate.test(produced.as_slice()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalEvalPredicate {
    requested: Principal,
    factory: PredicateFactory,
}

impl PrincipalEvalPredicate {
    /// Get the requested principal this predicate was built from.
    pub fn requested(&self) -> &Principal {
        &self.requested
    }

    /// Get the operator this predicate evaluates.
    pub fn operator(&self) -> Operator {
        self.factory.operator()
    }

    /// Check whether a single principal satisfies the requested principal.
    ///
    /// Principals of a different kind never satisfy.
    pub fn satisfied_by(&self, candidate: &Principal) -> bool {
        if candidate.kind() != self.requested.kind() {
            return false;
        }

        match &self.factory {
            PredicateFactory::Exact => candidate == &self.requested,
            PredicateFactory::Ranked { operator, ranking } => {
                let rank = |p: &Principal| ranking.iter().position(|r| r == p);
                let (Some(have), Some(want)) = (rank(candidate), rank(&self.requested)) else {
                    return false;
                };
                match operator {
                    Operator::Exact => have == want,
                    Operator::Minimum => have >= want,
                    Operator::Maximum => have <= want,
                    Operator::Better => have > want,
                }
            }
        }
    }

    /// Check whether any principal of the requested kind carried by the
    /// candidate satisfies the requested principal.
    pub fn test<C>(&self, candidate: &C) -> bool
    where
        C: PrincipalSupporting + ?Sized,
    {
        candidate
            .supported_principals(self.requested.kind())
            .into_iter()
            .any(|p| self.satisfied_by(p))
    }
}

/// Table of predicate factories keyed by principal kind and operator.
///
/// # Example
///
/// ```
/// use idp_principal::{Operator, Principal, PrincipalEvalRegistry, PrincipalKind};
///
/// let mut registry = PrincipalEvalRegistry::standard();
/// registry
///     .register_ranking(
///         PrincipalKind::AuthnContextClassRef,
///         vec![
///             Principal::authn_context_class_ref("urn:password"),
///             Principal::authn_context_class_ref("urn:mfa"),
///         ],
///     )
///     .unwrap();
///
/// let predicate = registry
///     .lookup_operator(PrincipalKind::AuthnContextClassRef, Operator::Minimum)
///     .unwrap()
///     .build(Principal::authn_context_class_ref("urn:password"));
/// assert!(predicate.satisfied_by(&Principal::authn_context_class_ref("urn:mfa")));
/// ```
#[derive(Debug, Clone)]
pub struct PrincipalEvalRegistry {
    factories: HashMap<(PrincipalKind, Operator), PredicateFactory>,
}

impl Default for PrincipalEvalRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl PrincipalEvalRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with an exact-match factory for every principal kind.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for kind in PrincipalKind::all() {
            registry.register(kind, Operator::Exact, PredicateFactory::Exact);
        }
        registry
    }

    /// Register a factory, replacing any existing one for the same key.
    ///
    /// # Returns
    ///
    /// The factory previously registered for the key, if any
    pub fn register(
        &mut self,
        kind: PrincipalKind,
        operator: Operator,
        factory: PredicateFactory,
    ) -> Option<PredicateFactory> {
        self.factories.insert((kind, operator), factory)
    }

    /// Remove the factory registered for a key.
    pub fn deregister(&mut self, kind: PrincipalKind, operator: Operator) -> Option<PredicateFactory> {
        self.factories.remove(&(kind, operator))
    }

    /// Register `minimum`, `maximum` and `better` factories for a kind.
    ///
    /// # Arguments
    ///
    /// * `kind` - The principal kind the ranking applies to
    /// * `ranking` - Principals of that kind, weakest first
    ///
    /// # Errors
    ///
    /// Rejects an empty ranking, a ranking holding principals of another
    /// kind, and a ranking listing the same principal twice.
    pub fn register_ranking(&mut self, kind: PrincipalKind, ranking: Vec<Principal>) -> RegistryResult<()> {
        if ranking.is_empty() {
            return Err(RegistryError::EmptyRanking(kind));
        }

        for (idx, principal) in ranking.iter().enumerate() {
            if principal.kind() != kind {
                return Err(RegistryError::MixedKindRanking {
                    expected: kind,
                    found: principal.kind(),
                });
            }
            if ranking[..idx].contains(principal) {
                return Err(RegistryError::DuplicateRankEntry {
                    kind,
                    principal: principal.name().to_string(),
                });
            }
        }

        let ranking: Arc<[Principal]> = ranking.into();
        for operator in [Operator::Minimum, Operator::Maximum, Operator::Better] {
            self.register(kind, operator, PredicateFactory::ranked(operator, Arc::clone(&ranking)));
        }
        debug!(kind = %kind, entries = ranking.len(), "Registered principal ranking");
        Ok(())
    }

    /// Look up a factory by kind and operator string.
    ///
    /// The operator is trimmed and matched case-insensitively. An unknown
    /// operator behaves like a missing factory.
    pub fn lookup(&self, kind: PrincipalKind, operator: &str) -> Option<&PredicateFactory> {
        match Operator::parse(operator) {
            Some(op) => self.lookup_operator(kind, op),
            None => {
                debug!(kind = %kind, operator = operator, "Unrecognized principal comparison operator");
                None
            }
        }
    }

    /// Look up a factory by kind and operator.
    pub fn lookup_operator(&self, kind: PrincipalKind, operator: Operator) -> Option<&PredicateFactory> {
        let factory = self.factories.get(&(kind, operator));
        debug!(
            kind = %kind,
            operator = %operator,
            found = factory.is_some(),
            "Principal predicate factory lookup"
        );
        factory
    }

    /// Check if a factory is registered for the key.
    pub fn contains(&self, kind: PrincipalKind, operator: Operator) -> bool {
        self.factories.contains_key(&(kind, operator))
    }

    /// Get the number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
