//! List Projection - the pending-items view of a ledger snapshot.
//!
//! Pure: the same ordered items always render the same view.
//!
//! Long lists are capped: at most `max_entries` items are shown, and the text
//! never exceeds [`MAX_TEXT_UNITS`] UTF-16 code units (the chat message
//! limit). Whatever is cut is summarized in one trailing line.

use crate::{ledger::LedgerSnapshot, Item, ItemId};

/// Rendered when the ledger has no data rows
pub const EMPTY_TEXT: &str = "🗒 The list is empty.";

/// Rendered when every item is done
pub const NOTHING_PENDING_TEXT: &str = "✅ Nothing pending.";

/// First line of a non-empty pending list
pub const PENDING_HEADING: &str = "🛒 Still to buy:";

/// Upper bound on the rendered text, in UTF-16 code units
pub const MAX_TEXT_UNITS: usize = 4096;

const ELLIPSIS: char = '…';

// Room kept for the "… and N more" line
const OVERFLOW_RESERVE: usize = 32;

/// Rendering knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionOptions {
    /// Names longer than this many characters are cut and end with `…`
    pub max_label_chars: usize,
    /// Pending items shown (and given a control) before the rest is summarized
    pub max_entries: usize,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            max_label_chars: 30,
            max_entries: 50,
        }
    }
}

/// Which of the three views was rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListState {
    /// No items at all
    Empty,
    /// Items exist, none pending
    NothingPending,
    /// This many pending items, shown or not
    Pending(usize),
}

/// A pending item that can be marked done from the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionableEntry {
    /// Item the control acts on
    pub id: ItemId,
    /// Display label (possibly truncated name)
    pub label: String,
}

/// Rendered list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListView {
    /// Message text
    pub text: String,
    /// One entry per shown pending item, in ledger order
    pub entries: Vec<ActionableEntry>,
    /// Which view this is
    pub state: ListState,
}

/// Project the ledger's items into the pending view.
///
/// With no items at all this is the empty view; use [`project_snapshot`] when
/// the table may hold rows that did not decode.
#[must_use]
pub fn project(items: &[Item], options: &ProjectionOptions) -> ListView {
    render(items, !items.is_empty(), options)
}

/// Project a ledger read.
///
/// A table with data rows that all failed to decode is not empty: it renders
/// as nothing pending.
#[must_use]
pub fn project_snapshot(snapshot: &LedgerSnapshot, options: &ProjectionOptions) -> ListView {
    render(
        &snapshot.items,
        snapshot.data_rows > 0 || !snapshot.items.is_empty(),
        options,
    )
}

fn render(items: &[Item], has_rows: bool, options: &ProjectionOptions) -> ListView {
    if !has_rows {
        return ListView {
            text: EMPTY_TEXT.to_string(),
            entries: Vec::new(),
            state: ListState::Empty,
        };
    }

    let pending: Vec<&Item> = items.iter().filter(|item| item.is_pending()).collect();
    if pending.is_empty() {
        return ListView {
            text: NOTHING_PENDING_TEXT.to_string(),
            entries: Vec::new(),
            state: ListState::NothingPending,
        };
    }

    let budget = MAX_TEXT_UNITS - OVERFLOW_RESERVE;
    let mut text = PENDING_HEADING.to_string();
    let mut used = utf16_len(&text);
    let mut entries = Vec::new();
    for item in pending.iter().take(options.max_entries) {
        let label = truncate(&item.name, options.max_label_chars);
        let line = format!("\n- {label}");
        let cost = utf16_len(&line);
        if used + cost > budget {
            break;
        }
        used += cost;
        text.push_str(&line);
        entries.push(ActionableEntry { id: item.id, label });
    }

    let hidden = pending.len() - entries.len();
    if hidden > 0 {
        text.push_str(&format!("\n{ELLIPSIS} and {hidden} more"));
    }

    ListView {
        text,
        entries,
        state: ListState::Pending(pending.len()),
    }
}

fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Cut `s` to at most `max_chars` characters, ending in `…` when cut
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let mut cut: String = s.chars().take(max_chars.saturating_sub(1)).collect();
        cut.push(ELLIPSIS);
        cut
    } else {
        s.to_string()
    }
}
