//! Opaque tokens carried by inline buttons.
//!
//! Wire forms: `done:<id>`, `add`, `list`.

use std::{fmt, str::FromStr};

use crate::ItemId;

const DONE_PREFIX: &str = "done:";

/// What an inline button asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionToken {
    /// Mark this item done
    Done(ItemId),
    /// Start the add flow
    Add,
    /// Re-render the list in place
    Refresh,
}

impl fmt::Display for ActionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done(id) => write!(f, "{DONE_PREFIX}{id}"),
            Self::Add => f.write_str("add"),
            Self::Refresh => f.write_str("list"),
        }
    }
}

/// Token text that is not one of the known forms
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized action token {0:?}")]
pub struct UnknownToken(pub String);

impl FromStr for ActionToken {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "list" => Ok(Self::Refresh),
            other => other
                .strip_prefix(DONE_PREFIX)
                .and_then(|id| id.parse::<ItemId>().ok())
                .map(Self::Done)
                .ok_or_else(|| UnknownToken(other.to_string())),
        }
    }
}
