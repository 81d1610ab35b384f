//! Item records kept in the ledger

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Unique item identifier.
///
/// Ids are issued by an [`crate::IdGenerator`] and increase with creation
/// order; they are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(i64);

impl ItemId {
    /// Wrap a raw id
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw id
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ItemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Chat-platform user identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(i64);

impl UserId {
    /// Wrap a raw user id
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw user id
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// One shopping-list entry, i.e. one data row of the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier
    pub id: ItemId,
    /// Free-form name, never blank
    pub name: String,
    /// Bought or not. Only ever goes from false to true
    pub done: bool,
    /// Who added it
    pub added_by: UserId,
    /// When it was added
    pub added_at: NaiveDateTime,
    /// Who marked it done
    pub done_by: Option<UserId>,
    /// When it was marked done
    pub done_at: Option<NaiveDateTime>,
}

impl Item {
    /// Create a new pending item
    #[must_use]
    pub fn new(id: ItemId, name: impl Into<String>, added_by: UserId, added_at: NaiveDateTime) -> Self {
        Self {
            id,
            name: name.into(),
            done: false,
            added_by,
            added_at,
            done_by: None,
            done_at: None,
        }
    }

    /// Check if the item still has to be bought
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        !self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_parse_trims_whitespace() {
        assert_eq!(" 17 ".parse::<ItemId>(), Ok(ItemId::new(17)));
        assert!("abc".parse::<ItemId>().is_err());
    }

    #[test]
    fn test_new_item_is_pending() {
        let at = chrono::NaiveDate::from_ymd_opt(2026, 10, 18)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .unwrap_or_default();
        let item = Item::new(ItemId::new(1), "milk", UserId::new(42), at);
        assert!(item.is_pending());
        assert_eq!(item.done_by, None);
        assert_eq!(item.done_at, None);
    }
}
