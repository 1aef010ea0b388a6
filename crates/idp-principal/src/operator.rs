//! # Operators
//!
//! Comparison operators a relying party attaches to its requested principals.

use serde::{Deserialize, Serialize};

/// Comparison applied between a requested principal and a candidate.
///
/// The vocabulary is the SAML requested-authentication-context comparison:
/// - **Exact**: candidate equals the requested principal
/// - **Minimum**: candidate is at least as strong
/// - **Maximum**: candidate is no stronger
/// - **Better**: candidate is strictly stronger
///
/// Strength is only defined for kinds that have a ranking registered; see
/// [`PrincipalEvalRegistry::register_ranking`](crate::PrincipalEvalRegistry::register_ranking).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Candidate equals the requested principal.
    Exact,

    /// Candidate ranks at or above the requested principal.
    Minimum,

    /// Candidate ranks at or below the requested principal.
    Maximum,

    /// Candidate ranks strictly above the requested principal.
    Better,
}

impl Operator {
    /// Get the string representation of the operator.
    ///
    /// # Returns
    ///
    /// The lowercase operator name as a relying party would send it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Exact => "exact",
            Operator::Minimum => "minimum",
            Operator::Maximum => "maximum",
            Operator::Better => "better",
        }
    }

    /// Parse an operator from its string representation.
    ///
    /// # Arguments
    ///
    /// * `s` - String to parse (trimmed, case-insensitive)
    ///
    /// # Returns
    ///
    /// `Some(Operator)` if valid, `None` otherwise
    ///
    /// # Example
    ///
    /// ```
    /// use idp_principal::Operator;
    ///
    /// assert_eq!(Operator::parse("exact"), Some(Operator::Exact));
    /// assert_eq!(Operator::parse(" Minimum "), Some(Operator::Minimum));
    /// assert_eq!(Operator::parse("fuzzy"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Some(Operator::Exact),
            "minimum" => Some(Operator::Minimum),
            "maximum" => Some(Operator::Maximum),
            "better" => Some(Operator::Better),
            _ => None,
        }
    }

    /// Get all operators.
    pub fn all() -> Vec<Self> {
        vec![
            Operator::Exact,
            Operator::Minimum,
            Operator::Maximum,
            Operator::Better,
        ]
    }

    /// Check if this operator needs a strength ranking to evaluate.
    pub fn is_ranked(&self) -> bool {
        !matches!(self, Operator::Exact)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_as_str() {
        assert_eq!(Operator::Exact.as_str(), "exact");
        assert_eq!(Operator::Better.as_str(), "better");
    }

    #[test]
    fn test_operator_parse() {
        for op in Operator::all() {
            assert_eq!(Operator::parse(op.as_str()), Some(op));
        }
        assert_eq!(Operator::parse("EXACT"), Some(Operator::Exact));
        assert_eq!(Operator::parse("  maximum\t"), Some(Operator::Maximum));
        assert_eq!(Operator::parse(""), None);
        assert_eq!(Operator::parse("at-least"), None);
    }

    #[test]
    fn test_operator_is_ranked() {
        assert!(!Operator::Exact.is_ranked());
        assert!(Operator::Minimum.is_ranked());
        assert!(Operator::Maximum.is_ranked());
        assert!(Operator::Better.is_ranked());
    }

    #[test]
    fn test_operator_serde() {
        let json = serde_json::to_string(&Operator::Minimum).unwrap();
        assert_eq!(json, "\"minimum\"");
        let op: Operator = serde_json::from_str("\"better\"").unwrap();
        assert_eq!(op, Operator::Better);
    }
}
