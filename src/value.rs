//! Values that facts can assign to terminology objects.
//!
//! A missing fact ("undefined") is modelled as `Option::None` by every lookup
//! in this crate; `Value::Unknown` is a concrete answer ("the user does not
//! know") and must never be confused with it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Possible values a fact can hold.
///
/// # Examples
///
/// ```
/// use diagplan::Value;
///
/// let ok = Value::choice("ok");
/// let pressure = Value::Number(2.5);
///
/// assert_eq!(ok.as_choice(), Some("ok"));
/// assert_eq!(pressure.as_number(), Some(2.5));
/// assert!(!Value::Unknown.is_indication());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Selected alternative of a choice question.
    Choice(String),
    /// Numeric answer.
    Number(f64),
    /// Free-text answer.
    Text(String),
    /// Yes/no answer.
    Bool(bool),
    /// The user answered "unknown".
    Unknown,
    /// Interview indication of an action container.
    Indication(Indication),
}

impl Value {
    /// Creates a choice value.
    #[must_use]
    pub fn choice(name: impl Into<String>) -> Self {
        Self::Choice(name.into())
    }

    /// Choice name, if this is a choice value.
    pub fn as_choice(&self) -> Option<&str> {
        match self {
            Self::Choice(v) => Some(v),
            _ => None,
        }
    }

    /// Number, if this is a numeric value.
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Indication, if this is an indication value.
    pub const fn as_indication(&self) -> Option<Indication> {
        match self {
            Self::Indication(v) => Some(*v),
            _ => None,
        }
    }

    /// True for the explicit "unknown" answer.
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// True for indication values.
    pub const fn is_indication(&self) -> bool {
        matches!(self, Self::Indication(_))
    }

    /// Feeds a stable byte encoding of this value into `hasher`.
    pub(crate) fn hash_into(&self, hasher: &mut blake3::Hasher) {
        match self {
            Self::Choice(v) => {
                hasher.update(&[0]);
                hasher.update(v.as_bytes());
            }
            Self::Number(v) => {
                hasher.update(&[1]);
                hasher.update(&v.to_bits().to_le_bytes());
            }
            Self::Text(v) => {
                hasher.update(&[2]);
                hasher.update(v.as_bytes());
            }
            Self::Bool(v) => {
                hasher.update(&[3, u8::from(*v)]);
            }
            Self::Unknown => {
                hasher.update(&[4]);
            }
            Self::Indication(i) => {
                hasher.update(&[5, u8::from(i.state)]);
                hasher.update(&u64::try_from(i.order).unwrap_or(u64::MAX).to_le_bytes());
            }
        }
        // Separator so that adjacent values cannot alias.
        hasher.update(&[0xff]);
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Choice(v) | Self::Text(v) => write!(f, "{v}"),
            Self::Number(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Unknown => write!(f, "unknown"),
            Self::Indication(i) => write!(f, "{i}"),
        }
    }
}

/// Indication state of an action container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicationState {
    /// Neither indicated nor contra-indicated.
    Neutral,
    /// Scheduled for the interview.
    Indicated,
    /// Must not be carried out.
    ContraIndicated,
}

impl From<IndicationState> for u8 {
    fn from(state: IndicationState) -> Self {
        match state {
            IndicationState::Neutral => 0,
            IndicationState::Indicated => 1,
            IndicationState::ContraIndicated => 2,
        }
    }
}

/// Interview indication of an action container.
///
/// `order` carries the position within a committed plan so that the agenda
/// presents indicated actions in sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Indication {
    /// Indication state.
    pub state: IndicationState,
    /// Position on the agenda; zero unless indicated by a plan.
    pub order: usize,
}

impl Indication {
    /// Indicated at agenda position `order`.
    #[must_use]
    pub const fn indicated(order: usize) -> Self {
        Self {
            state: IndicationState::Indicated,
            order,
        }
    }

    /// Contra-indication.
    #[must_use]
    pub const fn contra() -> Self {
        Self {
            state: IndicationState::ContraIndicated,
            order: 0,
        }
    }

    /// True if the action must not be carried out.
    pub const fn is_contra_indicated(&self) -> bool {
        matches!(self.state, IndicationState::ContraIndicated)
    }

    /// True if the action is on the agenda.
    pub const fn is_indicated(&self) -> bool {
        matches!(self.state, IndicationState::Indicated)
    }
}

impl fmt::Display for Indication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            IndicationState::Neutral => write!(f, "neutral"),
            IndicationState::Indicated => write!(f, "indicated#{}", self.order),
            IndicationState::ContraIndicated => write!(f, "contra_indicated"),
        }
    }
}
