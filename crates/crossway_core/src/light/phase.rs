//! Light phase values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Phase of a traffic light.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Stop.
    #[default]
    Red,
    /// Go.
    Green,
}

impl Phase {
    /// The phase that follows this one.
    #[inline]
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Red => Self::Green,
            Self::Green => Self::Red,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Red => f.write_str("red"),
            Self::Green => f.write_str("green"),
        }
    }
}

/// Returns true if `phase` allows traffic through.
#[inline]
#[must_use]
pub const fn is_green(phase: Phase) -> bool {
    matches!(phase, Phase::Green)
}
