use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The closed set of range comparison operators.
///
/// Each operator has a wire symbol (used in verifier specs and range proof
/// records) and an engine tag (used by the crypto engine). Lookups return
/// `None` for unknown input so callers can report an unsupported operator
/// separately from a malformed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RangeOperator {
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
}

impl RangeOperator {
    pub const ALL: [RangeOperator; 4] = [
        Self::LessThan,
        Self::LessThanOrEqualTo,
        Self::GreaterThan,
        Self::GreaterThanOrEqualTo,
    ];

    /// Wire symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::LessThan => "<",
            Self::LessThanOrEqualTo => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqualTo => ">=",
        }
    }

    /// Engine-level proof-type tag.
    pub fn engine_tag(&self) -> &'static str {
        match self {
            Self::LessThan => "LESS_THAN",
            Self::LessThanOrEqualTo => "LESS_THAN_OR_EQUAL_TO",
            Self::GreaterThan => "GREATER_THAN",
            Self::GreaterThanOrEqualTo => "GREATER_THAN_OR_EQUAL_TO",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "<" => Some(Self::LessThan),
            "<=" => Some(Self::LessThanOrEqualTo),
            ">" => Some(Self::GreaterThan),
            ">=" => Some(Self::GreaterThanOrEqualTo),
            _ => None,
        }
    }

    pub fn from_engine_tag(tag: &str) -> Option<Self> {
        match tag {
            "LESS_THAN" => Some(Self::LessThan),
            "LESS_THAN_OR_EQUAL_TO" => Some(Self::LessThanOrEqualTo),
            "GREATER_THAN" => Some(Self::GreaterThan),
            "GREATER_THAN_OR_EQUAL_TO" => Some(Self::GreaterThanOrEqualTo),
            _ => None,
        }
    }

    /// Whether `lhs OP rhs` holds.
    pub fn holds<T: Ord>(&self, lhs: T, rhs: T) -> bool {
        let ord = lhs.cmp(&rhs);
        match self {
            Self::LessThan => ord == Ordering::Less,
            Self::LessThanOrEqualTo => ord != Ordering::Greater,
            Self::GreaterThan => ord == Ordering::Greater,
            Self::GreaterThanOrEqualTo => ord != Ordering::Less,
        }
    }
}

impl fmt::Display for RangeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}
