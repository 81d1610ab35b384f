//! Typed row codec for the ledger table.
//!
//! Every data row is validated as a whole, once per read. A row that fails
//! any column check is reported as a [`RowError`] and skipped by the ledger;
//! no field is coerced on its own.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::{backend::Column, Item, ItemId, UserId};

/// Canonical header row
pub const HEADER: [&str; 7] = [
    "id", "item", "done", "added_by", "added_at", "done_by", "done_at",
];

/// Timestamp layout used when none is configured (`18/10/2026 14:03`)
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";

const TRUE: &str = "TRUE";
const FALSE: &str = "FALSE";

/// Why a data row could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    /// `id` is not an integer
    #[error("invalid id {0:?}")]
    InvalidId(String),

    /// `item` is blank
    #[error("item name is empty")]
    EmptyName,

    /// `done` is neither TRUE nor FALSE
    #[error("invalid done flag {0:?}")]
    InvalidDone(String),

    /// A user column does not hold a user id
    #[error("invalid user id {value:?} in column {column}")]
    InvalidUser {
        /// Header label of the offending column
        column: &'static str,
        /// Raw cell value
        value: String,
    },

    /// A timestamp column does not match the configured format
    #[error("invalid timestamp {value:?} in column {column}")]
    InvalidTimestamp {
        /// Header label of the offending column
        column: &'static str,
        /// Raw cell value
        value: String,
    },
}

/// Encodes items into rows and decodes rows back into items
#[derive(Debug, Clone)]
pub struct RowCodec {
    timestamp_format: String,
}

impl Default for RowCodec {
    fn default() -> Self {
        Self::new(DEFAULT_TIMESTAMP_FORMAT)
    }
}

impl RowCodec {
    /// Create a codec writing timestamps with `timestamp_format` (chrono syntax)
    #[must_use]
    pub fn new(timestamp_format: impl Into<String>) -> Self {
        Self {
            timestamp_format: timestamp_format.into(),
        }
    }

    /// The canonical header as owned cells
    #[must_use]
    pub fn header_row() -> Vec<String> {
        HEADER.iter().map(ToString::to_string).collect()
    }

    /// Whether `cell` is the sentinel that opens a well-formed header
    #[must_use]
    pub fn is_header_sentinel(cell: &str) -> bool {
        cell.trim().eq_ignore_ascii_case(HEADER[0])
    }

    /// Format a timestamp the way it is stored
    #[must_use]
    pub fn format_timestamp(&self, at: NaiveDateTime) -> String {
        at.format(&self.timestamp_format).to_string()
    }

    /// Stored form of the done flag
    #[must_use]
    pub const fn format_done(done: bool) -> &'static str {
        if done {
            TRUE
        } else {
            FALSE
        }
    }

    /// Encode an item as a full row
    #[must_use]
    pub fn encode(&self, item: &Item) -> Vec<String> {
        vec![
            item.id.to_string(),
            item.name.clone(),
            Self::format_done(item.done).to_string(),
            item.added_by.to_string(),
            self.format_timestamp(item.added_at),
            item.done_by.map(|u| u.to_string()).unwrap_or_default(),
            item.done_at
                .map(|at| self.format_timestamp(at))
                .unwrap_or_default(),
        ]
    }

    /// Decode one data row.
    ///
    /// Missing trailing cells read as blank. A row whose cells are all blank
    /// decodes to `Ok(None)`.
    pub fn decode(&self, cells: &[String]) -> Result<Option<Item>, RowError> {
        if cells.iter().all(|c| c.trim().is_empty()) {
            return Ok(None);
        }
        let cell = |column: Column| cells.get(column.index()).map_or("", |c| c.trim());

        let id = cell(Column::Id)
            .parse::<ItemId>()
            .map_err(|_| RowError::InvalidId(cell(Column::Id).to_string()))?;

        let name = cell(Column::Name);
        if name.is_empty() {
            return Err(RowError::EmptyName);
        }

        let done = Self::parse_done(cell(Column::Done))?;
        let added_by = Self::parse_user(Column::AddedBy, cell(Column::AddedBy))?;
        let added_at = self.parse_timestamp(Column::AddedAt, cell(Column::AddedAt))?;
        let done_by = Self::optional(cell(Column::DoneBy))
            .map(|v| Self::parse_user(Column::DoneBy, v))
            .transpose()?;
        let done_at = Self::optional(cell(Column::DoneAt))
            .map(|v| self.parse_timestamp(Column::DoneAt, v))
            .transpose()?;

        Ok(Some(Item {
            id,
            name: name.to_string(),
            done,
            added_by,
            added_at,
            done_by,
            done_at,
        }))
    }

    fn optional(value: &str) -> Option<&str> {
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    fn parse_done(value: &str) -> Result<bool, RowError> {
        if value.eq_ignore_ascii_case(TRUE) {
            Ok(true)
        } else if value.eq_ignore_ascii_case(FALSE) || value.is_empty() {
            Ok(false)
        } else {
            Err(RowError::InvalidDone(value.to_string()))
        }
    }

    fn parse_user(column: Column, value: &str) -> Result<UserId, RowError> {
        value.parse().map_err(|_| RowError::InvalidUser {
            column: column.header(),
            value: value.to_string(),
        })
    }

    fn parse_timestamp(&self, column: Column, value: &str) -> Result<NaiveDateTime, RowError> {
        NaiveDateTime::parse_from_str(value, &self.timestamp_format).map_err(|_| {
            RowError::InvalidTimestamp {
                column: column.header(),
                value: value.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use proptest::prelude::*;

    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 18)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .unwrap_or_default()
    }

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_encode_pending_item_leaves_completion_blank() {
        let codec = RowCodec::default();
        let item = Item::new(ItemId::new(9), "milk", UserId::new(42), at(14, 3));
        assert_eq!(
            codec.encode(&item),
            cells(&["9", "milk", "FALSE", "42", "18/10/2026 14:03", "", ""])
        );
    }

    #[test]
    fn test_decode_pads_short_rows() -> Result<(), RowError> {
        let codec = RowCodec::default();
        let item = codec.decode(&cells(&["9", "milk", "FALSE", "42", "18/10/2026 14:03"]))?;
        assert_eq!(
            item,
            Some(Item::new(ItemId::new(9), "milk", UserId::new(42), at(14, 3)))
        );
        Ok(())
    }

    #[test]
    fn test_decode_done_flag_is_case_insensitive() -> Result<(), RowError> {
        let codec = RowCodec::default();
        let row = cells(&["9", "milk", "true", "42", "18/10/2026 14:03", "7", "18/10/2026 15:00"]);
        let item = codec.decode(&row)?;
        assert!(item.as_ref().is_some_and(|i| i.done));
        assert_eq!(item.and_then(|i| i.done_by), Some(UserId::new(7)));
        Ok(())
    }

    #[test]
    fn test_decode_blank_row_is_skipped_silently() {
        let codec = RowCodec::default();
        assert_eq!(codec.decode(&cells(&["", " ", ""])), Ok(None));
        assert_eq!(codec.decode(&[]), Ok(None));
    }

    #[test]
    fn test_decode_rejects_whole_row_on_any_bad_column() {
        let codec = RowCodec::default();
        let cases = [
            (
                cells(&["x", "milk", "FALSE", "42", "18/10/2026 14:03"]),
                RowError::InvalidId("x".into()),
            ),
            (
                cells(&["1", "  ", "FALSE", "42", "18/10/2026 14:03"]),
                RowError::EmptyName,
            ),
            (
                cells(&["1", "milk", "maybe", "42", "18/10/2026 14:03"]),
                RowError::InvalidDone("maybe".into()),
            ),
            (
                cells(&["1", "milk", "FALSE", "bob", "18/10/2026 14:03"]),
                RowError::InvalidUser {
                    column: "added_by",
                    value: "bob".into(),
                },
            ),
            (
                cells(&["1", "milk", "FALSE", "42", "yesterday"]),
                RowError::InvalidTimestamp {
                    column: "added_at",
                    value: "yesterday".into(),
                },
            ),
        ];
        for (row, expected) in cases {
            assert_eq!(codec.decode(&row), Err(expected));
        }
    }

    #[test]
    fn test_header_sentinel() {
        assert!(RowCodec::is_header_sentinel("id"));
        assert!(RowCodec::is_header_sentinel(" ID "));
        assert!(!RowCodec::is_header_sentinel("item"));
        assert!(!RowCodec::is_header_sentinel(""));
    }

    proptest! {
        #[test]
        fn prop_encoded_items_decode_back(
            id in 1i64..i64::MAX,
            name in "[a-zA-Z][a-zA-Z0-9 ]{0,40}",
            user in 1i64..10_000_000_000,
            minute in 0u32..60,
        ) {
            let codec = RowCodec::default();
            let item = Item::new(ItemId::new(id), name.trim(), UserId::new(user), at(10, minute));
            prop_assert_eq!(codec.decode(&codec.encode(&item)), Ok(Some(item)));
        }
    }
}
