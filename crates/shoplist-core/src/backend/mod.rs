//! Ledger Backend - Abstraction boundary for the remote table.
//!
//! The backend is a dumb grid of text cells: no transactions, no locks, no
//! schema. Everything the ledger knows about rows and headers lives in
//! [`crate::ledger`] and [`crate::row`]; implementations only move cells.
//!
//! Implementations:
//! - [`MemoryBackend`]: in-process grid for tests and dry runs
//! - `SheetsBackend` (binary crate): Google Sheets API v4

mod memory;

pub use memory::MemoryBackend;

use crate::Result;

/// Ledger column, in canonical header order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
pub enum Column {
    /// `id`
    Id,
    /// `item`
    Name,
    /// `done`
    Done,
    /// `added_by`
    AddedBy,
    /// `added_at`
    AddedAt,
    /// `done_by`
    DoneBy,
    /// `done_at`
    DoneAt,
}

impl Column {
    /// Zero-based position in a row
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Id => 0,
            Self::Name => 1,
            Self::Done => 2,
            Self::AddedBy => 3,
            Self::AddedAt => 4,
            Self::DoneBy => 5,
            Self::DoneAt => 6,
        }
    }

    /// Spreadsheet column letter
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Id => 'A',
            Self::Name => 'B',
            Self::Done => 'C',
            Self::AddedBy => 'D',
            Self::AddedAt => 'E',
            Self::DoneBy => 'F',
            Self::DoneAt => 'G',
        }
    }

    /// Header label for this column
    #[must_use]
    pub const fn header(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "item",
            Self::Done => "done",
            Self::AddedBy => "added_by",
            Self::AddedAt => "added_at",
            Self::DoneBy => "done_by",
            Self::DoneAt => "done_at",
        }
    }
}

/// One cell, addressed by 1-based sheet row and column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    /// 1-based row number; row 1 is the header
    pub row: u32,
    /// Column
    pub column: Column,
}

impl CellAddress {
    /// Address a cell
    #[must_use]
    pub const fn new(row: u32, column: Column) -> Self {
        Self { row, column }
    }

    /// The first header cell, `A1`
    #[must_use]
    pub const fn origin() -> Self {
        Self::new(1, Column::Id)
    }
}

impl std::fmt::Display for CellAddress {
    /// A1 notation, e.g. `C5`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.column.letter(), self.row)
    }
}

/// Trait defining the persistence boundary for the ledger table.
///
/// # Consistency
///
/// Nothing here is transactional. Callers re-read before every mutation and
/// keep read-to-write windows short; retries on transient failure are the
/// caller's choice and are not performed by implementations.
#[async_trait::async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Read every row of the table, header included, in sheet order.
    ///
    /// Trailing blank cells may be omitted from a row.
    async fn read_all_rows(&self) -> Result<Vec<Vec<String>>>;

    /// Append a row after the last non-empty row.
    async fn append_row(&self, row: Vec<String>) -> Result<()>;

    /// Write several cells in one remote call.
    async fn batch_update_cells(&self, cells: &[(CellAddress, String)]) -> Result<()>;

    /// Read a single cell; blank cells read as the empty string.
    async fn read_cell(&self, address: CellAddress) -> Result<String>;

    /// Remove every row, header included.
    async fn clear_table(&self) -> Result<()>;
}
