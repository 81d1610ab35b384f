//! In-memory ledger backend.
//!
//! Behaves like the spreadsheet as seen through its API: trailing blank cells
//! are dropped on read and appends land after the last non-empty row. It can
//! also be told to fail or to stall so callers' error paths can be exercised.

use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use tokio::sync::RwLock;

use super::{CellAddress, LedgerBackend};
use crate::{Error, Result};

/// In-memory grid of text cells
#[derive(Debug, Default)]
pub struct MemoryBackend {
    rows: RwLock<Vec<Vec<String>>>,
    unavailable: AtomicBool,
    latency: RwLock<Option<Duration>>,
    batch_updates: AtomicUsize,
}

impl MemoryBackend {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table pre-filled with `rows`
    #[must_use]
    pub fn with_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows: RwLock::new(rows),
            ..Self::default()
        }
    }

    /// Make every following call fail (or succeed again)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every following call by `latency`
    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write().await = latency;
    }

    /// Raw copy of the table, without trimming
    pub async fn snapshot(&self) -> Vec<Vec<String>> {
        self.rows.read().await.clone()
    }

    /// Number of `batch_update_cells` calls served so far
    pub fn batch_update_calls(&self) -> usize {
        self.batch_updates.load(Ordering::SeqCst)
    }

    async fn gate(&self) -> Result<()> {
        let latency = *self.latency.read().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::backend("memory backend marked unavailable"));
        }
        Ok(())
    }
}

fn trim_trailing_blanks(row: &[String]) -> Vec<String> {
    let len = row
        .iter()
        .rposition(|cell| !cell.is_empty())
        .map_or(0, |last| last + 1);
    row[..len].to_vec()
}

#[async_trait::async_trait]
impl LedgerBackend for MemoryBackend {
    async fn read_all_rows(&self) -> Result<Vec<Vec<String>>> {
        self.gate().await?;
        let rows = self.rows.read().await;
        let mut trimmed: Vec<Vec<String>> = rows.iter().map(|r| trim_trailing_blanks(r)).collect();
        while trimmed.last().is_some_and(Vec::is_empty) {
            trimmed.pop();
        }
        Ok(trimmed)
    }

    async fn append_row(&self, row: Vec<String>) -> Result<()> {
        self.gate().await?;
        let mut rows = self.rows.write().await;
        while rows.last().is_some_and(|r| r.iter().all(String::is_empty)) {
            rows.pop();
        }
        rows.push(row);
        Ok(())
    }

    async fn batch_update_cells(&self, cells: &[(CellAddress, String)]) -> Result<()> {
        self.gate().await?;
        let mut rows = self.rows.write().await;
        for (address, value) in cells {
            let row_index = usize::try_from(address.row.saturating_sub(1))
                .map_err(|e| Error::backend(format!("row {} out of range: {e}", address.row)))?;
            if rows.len() <= row_index {
                rows.resize_with(row_index + 1, Vec::new);
            }
            let row = &mut rows[row_index];
            let col = address.column.index();
            if row.len() <= col {
                row.resize(col + 1, String::new());
            }
            row[col].clone_from(value);
        }
        drop(rows);
        self.batch_updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read_cell(&self, address: CellAddress) -> Result<String> {
        self.gate().await?;
        let rows = self.rows.read().await;
        let value = usize::try_from(address.row.saturating_sub(1))
            .ok()
            .and_then(|r| rows.get(r))
            .and_then(|row| row.get(address.column.index()))
            .cloned()
            .unwrap_or_default();
        Ok(value)
    }

    async fn clear_table(&self) -> Result<()> {
        self.gate().await?;
        self.rows.write().await.clear();
        Ok(())
    }
}
