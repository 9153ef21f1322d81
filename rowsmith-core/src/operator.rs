//! SQL comparison operators

use std::borrow::Cow;
use std::fmt::{self, Display};

/// A comparison operator used in WHERE and HAVING conditions.
///
/// Operator text is normalized on construction: surrounding whitespace is
/// trimmed and letters are lowercased, so `" NOT IN "` and `"not in"` are the
/// same operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator(Cow<'static, str>);

impl Operator {
    pub const GT: Self = Operator(Cow::Borrowed(">"));
    pub const LT: Self = Operator(Cow::Borrowed("<"));
    pub const EQ: Self = Operator(Cow::Borrowed("="));
    pub const NEQ: Self = Operator(Cow::Borrowed("!="));
    pub const GTE: Self = Operator(Cow::Borrowed(">="));
    pub const LTE: Self = Operator(Cow::Borrowed("<="));
    pub const LIKE: Self = Operator(Cow::Borrowed("like"));
    pub const NOT_LIKE: Self = Operator(Cow::Borrowed("not like"));
    pub const IN: Self = Operator(Cow::Borrowed("in"));
    pub const NOT_IN: Self = Operator(Cow::Borrowed("not in"));

    /// Create an operator from arbitrary text, normalizing it.
    ///
    /// Operators outside the predefined set are passed through to the
    /// statement verbatim (after normalization) and bind one placeholder.
    pub fn custom(op: &str) -> Self {
        let normalized = op.trim().to_lowercase();
        match normalized.as_str() {
            ">" => Operator::GT,
            "<" => Operator::LT,
            "=" => Operator::EQ,
            "!=" => Operator::NEQ,
            ">=" => Operator::GTE,
            "<=" => Operator::LTE,
            "like" => Operator::LIKE,
            "not like" => Operator::NOT_LIKE,
            "in" => Operator::IN,
            "not in" => Operator::NOT_IN,
            _ => Operator(Cow::Owned(normalized)),
        }
    }

    /// Get the string representation of the operator
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `in` and `not in` take a parenthesized placeholder group
    pub fn is_set_membership(&self) -> bool {
        *self == Operator::IN || *self == Operator::NOT_IN
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trait for types that can be converted to SQL operators
pub trait IntoOperator {
    fn into_operator(self) -> Operator;
}

impl IntoOperator for Operator {
    fn into_operator(self) -> Operator {
        self
    }
}

impl IntoOperator for &str {
    fn into_operator(self) -> Operator {
        Operator::custom(self)
    }
}

impl IntoOperator for String {
    fn into_operator(self) -> Operator {
        Operator::custom(&self)
    }
}

/// Convenience module for operator constants
pub mod op {
    use super::Operator;

    pub const GT: Operator = Operator::GT;
    pub const LT: Operator = Operator::LT;
    pub const EQ: Operator = Operator::EQ;
    pub const NEQ: Operator = Operator::NEQ;
    pub const GTE: Operator = Operator::GTE;
    pub const LTE: Operator = Operator::LTE;
    pub const LIKE: Operator = Operator::LIKE;
    pub const NOT_LIKE: Operator = Operator::NOT_LIKE;
    pub const IN: Operator = Operator::IN;
    pub const NOT_IN: Operator = Operator::NOT_IN;
}
