//! Ledger Store - the shopping list as rows of a remote table.
//!
//! Owns the row layout, the header invariant, id issuing and the two
//! mutations (append, mark done). Holds no copy of the table between calls:
//! every operation starts from a fresh read.

use std::{future::Future, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    backend::{CellAddress, Column, LedgerBackend},
    clock::Clock,
    ids::IdGenerator,
    row::RowCodec,
    Error, Item, ItemId, Result, UserId,
};

/// What to do when the first header cell is not `id` and the table has rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaDriftPolicy {
    /// Fail with [`Error::SchemaDrift`] and leave the table untouched
    #[default]
    Refuse,
    /// Wipe every row and rewrite the header. Destroys data
    Reset,
}

/// Outcome of [`LedgerStore::ensure_schema`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    /// Header already in place
    Intact,
    /// Table was empty; header written
    Initialized,
    /// Table was wiped under [`SchemaDriftPolicy::Reset`]
    Reset {
        /// Rows that were discarded, old header included
        discarded_rows: usize,
    },
}

/// Outcome of [`LedgerStore::mark_done`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The row was pending and is now done
    Marked,
    /// No pending row carries that id: already done, or never existed
    NotFound,
}

/// An item together with the sheet row it was read from
#[derive(Debug, Clone)]
struct LocatedItem {
    row: u32,
    item: Item,
}

/// One read of the ledger
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    /// Decoded items in row order
    pub items: Vec<Item>,
    /// Non-blank rows below the header, malformed ones included
    pub data_rows: usize,
}

/// The item ledger over a [`LedgerBackend`]
pub struct LedgerStore {
    backend: Arc<dyn LedgerBackend>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    codec: RowCodec,
    drift_policy: SchemaDriftPolicy,
    call_timeout: Option<Duration>,
}

impl LedgerStore {
    /// Create a ledger store
    pub fn new(
        backend: Arc<dyn LedgerBackend>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        codec: RowCodec,
    ) -> Self {
        Self {
            backend,
            ids,
            clock,
            codec,
            drift_policy: SchemaDriftPolicy::default(),
            call_timeout: None,
        }
    }

    /// Bound every single backend call by `limit`.
    ///
    /// The deadline applies per call, never to a whole operation, so a write
    /// that returned is never turned into a failure by a slow read after it.
    #[must_use]
    pub const fn with_call_timeout(mut self, limit: Duration) -> Self {
        self.call_timeout = Some(limit);
        self
    }

    /// Set the schema drift policy
    #[must_use]
    pub const fn with_drift_policy(mut self, policy: SchemaDriftPolicy) -> Self {
        self.drift_policy = policy;
        self
    }

    /// Make sure the table starts with the canonical header.
    ///
    /// An empty table gets the header written. A table whose first cell is
    /// not `id` (case-insensitive) is either refused or wiped depending on the
    /// [`SchemaDriftPolicy`]. Backend failures propagate unchanged.
    #[instrument(skip(self), fields(policy = ?self.drift_policy))]
    pub async fn ensure_schema(&self) -> Result<SchemaStatus> {
        let first = self.bounded(self.backend.read_cell(CellAddress::origin())).await?;
        if RowCodec::is_header_sentinel(&first) {
            debug!("ledger header intact");
            return Ok(SchemaStatus::Intact);
        }

        let rows = self.bounded(self.backend.read_all_rows()).await?;
        let populated = rows
            .iter()
            .filter(|r| r.iter().any(|c| !c.trim().is_empty()))
            .count();

        if populated == 0 {
            self.bounded(self.backend.clear_table()).await?;
            self.bounded(self.backend.append_row(RowCodec::header_row())).await?;
            info!("initialized empty ledger with header row");
            return Ok(SchemaStatus::Initialized);
        }

        match self.drift_policy {
            SchemaDriftPolicy::Refuse => Err(Error::SchemaDrift {
                found: first,
                rows: populated,
            }),
            SchemaDriftPolicy::Reset => {
                warn!(
                    found = %first,
                    discarded_rows = populated,
                    "ledger header malformed; WIPING ALL ROWS and rewriting header"
                );
                self.bounded(self.backend.clear_table()).await?;
                self.bounded(self.backend.append_row(RowCodec::header_row())).await?;
                Ok(SchemaStatus::Reset {
                    discarded_rows: populated,
                })
            }
        }
    }

    /// Append a new pending item and return its id.
    ///
    /// The name is trimmed; a blank name is rejected. Duplicate names are
    /// allowed.
    #[instrument(skip(self))]
    pub async fn append_item(&self, name: &str, user: UserId) -> Result<ItemId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidItem("item name cannot be empty".into()));
        }

        let item = Item::new(self.ids.next_id(), name, user, self.clock.now());
        self.bounded(self.backend.append_row(self.codec.encode(&item))).await?;
        info!(id = %item.id, name = %item.name, "item appended");
        Ok(item.id)
    }

    /// Read every item in ledger row order.
    ///
    /// Malformed rows are skipped with a warning.
    pub async fn fetch_all(&self) -> Result<Vec<Item>> {
        Ok(self.snapshot().await?.items)
    }

    /// Read every item along with the number of data rows they came from.
    ///
    /// `data_rows` counts malformed rows too, so a table holding only rows
    /// that fail to decode is told apart from an empty one.
    pub async fn snapshot(&self) -> Result<LedgerSnapshot> {
        let (located, data_rows) = self.fetch_located().await?;
        Ok(LedgerSnapshot {
            items: located.into_iter().map(|located| located.item).collect(),
            data_rows,
        })
    }

    /// Mark a pending item as done by `user`.
    ///
    /// Locates the row from a fresh read. If no pending row carries `id`, the
    /// table is left untouched and [`MarkOutcome::NotFound`] is returned.
    /// Otherwise `done`, `done_by` and `done_at` are written together in one
    /// batched call.
    #[instrument(skip(self))]
    pub async fn mark_done(&self, id: ItemId, user: UserId) -> Result<MarkOutcome> {
        let (located, _) = self.fetch_located().await?;
        let target = located
            .into_iter()
            .find(|located| located.item.id == id && located.item.is_pending());

        let Some(LocatedItem { row, .. }) = target else {
            debug!("no pending row for id");
            return Ok(MarkOutcome::NotFound);
        };

        let now = self.codec.format_timestamp(self.clock.now());
        let updates = [
            (
                CellAddress::new(row, Column::Done),
                RowCodec::format_done(true).to_string(),
            ),
            (CellAddress::new(row, Column::DoneBy), user.to_string()),
            (CellAddress::new(row, Column::DoneAt), now),
        ];
        self.bounded(self.backend.batch_update_cells(&updates))
            .await?;
        info!(row, "item marked done");
        Ok(MarkOutcome::Marked)
    }

    async fn fetch_located(&self) -> Result<(Vec<LocatedItem>, usize)> {
        let rows = self.bounded(self.backend.read_all_rows()).await?;
        let data_rows = rows
            .iter()
            .skip(1)
            .filter(|cells| cells.iter().any(|c| !c.trim().is_empty()))
            .count();
        let located = rows
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(index, cells)| {
                let row = u32::try_from(index + 1).ok()?;
                match self.codec.decode(cells) {
                    Ok(item) => item.map(|item| LocatedItem { row, item }),
                    Err(reason) => {
                        warn!(row, %reason, "skipping malformed ledger row");
                        None
                    }
                }
            })
            .collect();
        Ok((located, data_rows))
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => call.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;
    use crate::{backend::MemoryBackend, clock::FixedClock, ids::ClockIdGenerator};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 18)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .unwrap_or_default()
    }

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    fn store(backend: &Arc<MemoryBackend>, clock: &Arc<FixedClock>) -> LedgerStore {
        LedgerStore::new(
            backend.clone(),
            Arc::new(ClockIdGenerator::new()),
            clock.clone(),
            RowCodec::default(),
        )
    }

    #[tokio::test]
    async fn test_ensure_schema_on_empty_table_writes_single_header() -> Result<()> {
        let backend = Arc::new(MemoryBackend::new());
        let ledger = store(&backend, &Arc::new(FixedClock::new(at(9, 0))));

        assert_eq!(ledger.ensure_schema().await?, SchemaStatus::Initialized);
        assert_eq!(backend.snapshot().await, vec![RowCodec::header_row()]);
        assert!(ledger.fetch_all().await?.is_empty());

        assert_eq!(ledger.ensure_schema().await?, SchemaStatus::Intact);
        assert_eq!(backend.snapshot().await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_schema_refuses_drift_by_default() {
        let backend = Arc::new(MemoryBackend::with_rows(vec![
            cells(&["nome", "qtd"]),
            cells(&["leite", "2"]),
        ]));
        let ledger = store(&backend, &Arc::new(FixedClock::new(at(9, 0))));

        let result = ledger.ensure_schema().await;
        assert!(matches!(result, Err(Error::SchemaDrift { rows: 2, .. })));
        assert_eq!(backend.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_ensure_schema_reset_wipes_rows() -> Result<()> {
        let backend = Arc::new(MemoryBackend::with_rows(vec![
            cells(&["nome", "qtd"]),
            cells(&["leite", "2"]),
        ]));
        let ledger = store(&backend, &Arc::new(FixedClock::new(at(9, 0))))
            .with_drift_policy(SchemaDriftPolicy::Reset);

        assert_eq!(
            ledger.ensure_schema().await?,
            SchemaStatus::Reset { discarded_rows: 2 }
        );
        assert_eq!(backend.snapshot().await, vec![RowCodec::header_row()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_append_rejects_blank_name() -> Result<()> {
        let backend = Arc::new(MemoryBackend::new());
        let ledger = store(&backend, &Arc::new(FixedClock::new(at(9, 0))));
        ledger.ensure_schema().await?;

        let result = ledger.append_item("   ", UserId::new(1)).await;
        assert!(matches!(result, Err(Error::InvalidItem(_))));
        assert_eq!(backend.snapshot().await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_append_allows_duplicate_names() -> Result<()> {
        let backend = Arc::new(MemoryBackend::new());
        let ledger = store(&backend, &Arc::new(FixedClock::new(at(9, 0))));
        ledger.ensure_schema().await?;

        let a = ledger.append_item("bread", UserId::new(1)).await?;
        let b = ledger.append_item(" bread ", UserId::new(2)).await?;
        assert!(b > a);

        let items = ledger.fetch_all().await?;
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.name == "bread"));
        Ok(())
    }

    #[tokio::test]
    async fn test_mark_done_writes_three_cells_in_one_call() -> Result<()> {
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(FixedClock::new(at(9, 0)));
        let ledger = store(&backend, &clock);
        ledger.ensure_schema().await?;
        let id = ledger.append_item("milk", UserId::new(42)).await?;

        clock.set(at(18, 30));
        assert_eq!(ledger.mark_done(id, UserId::new(7)).await?, MarkOutcome::Marked);
        assert_eq!(backend.batch_update_calls(), 1);

        let items = ledger.fetch_all().await?;
        let item = items.first().cloned();
        assert_eq!(
            item,
            Some(Item {
                id,
                name: "milk".into(),
                done: true,
                added_by: UserId::new(42),
                added_at: at(9, 0),
                done_by: Some(UserId::new(7)),
                done_at: Some(at(18, 30)),
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_mark_done_twice_never_rewrites_completion() -> Result<()> {
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(FixedClock::new(at(9, 0)));
        let ledger = store(&backend, &clock);
        ledger.ensure_schema().await?;
        let id = ledger.append_item("milk", UserId::new(42)).await?;

        ledger.mark_done(id, UserId::new(7)).await?;
        let before = backend.snapshot().await;

        clock.set(at(20, 0));
        assert_eq!(
            ledger.mark_done(id, UserId::new(8)).await?,
            MarkOutcome::NotFound
        );
        assert_eq!(backend.snapshot().await, before);
        assert_eq!(backend.batch_update_calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_mark_done_unknown_id_is_not_found() -> Result<()> {
        let backend = Arc::new(MemoryBackend::new());
        let ledger = store(&backend, &Arc::new(FixedClock::new(at(9, 0))));
        ledger.ensure_schema().await?;

        assert_eq!(
            ledger.mark_done(ItemId::new(404), UserId::new(1)).await?,
            MarkOutcome::NotFound
        );
        assert_eq!(backend.batch_update_calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_rows_are_skipped_but_keep_row_numbers() -> Result<()> {
        let backend = Arc::new(MemoryBackend::with_rows(vec![
            RowCodec::header_row(),
            cells(&["oops", "milk", "FALSE", "42", "18/10/2026 09:00"]),
            cells(&[]),
            cells(&["5", "eggs", "FALSE", "42", "18/10/2026 09:00"]),
        ]));
        let clock = Arc::new(FixedClock::new(at(10, 0)));
        let ledger = store(&backend, &clock);

        let items = ledger.fetch_all().await?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "eggs");

        ledger.mark_done(ItemId::new(5), UserId::new(7)).await?;
        let rows = backend.snapshot().await;
        assert_eq!(rows[3][Column::Done.index()], "TRUE");
        assert_eq!(rows[1][Column::Done.index()], "FALSE");
        Ok(())
    }

    #[tokio::test]
    async fn test_snapshot_counts_malformed_rows() -> Result<()> {
        let backend = Arc::new(MemoryBackend::with_rows(vec![
            RowCodec::header_row(),
            cells(&["x", "milk", "FALSE"]),
            cells(&["", " "]),
        ]));
        let ledger = store(&backend, &Arc::new(FixedClock::new(at(9, 0))));

        let snapshot = ledger.snapshot().await?;
        assert!(snapshot.items.is_empty());
        assert_eq!(snapshot.data_rows, 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout_bounds_each_call_not_the_operation() -> Result<()> {
        let backend = Arc::new(MemoryBackend::new());
        let ledger = store(&backend, &Arc::new(FixedClock::new(at(9, 0))))
            .with_call_timeout(Duration::from_millis(100));
        ledger.ensure_schema().await?;
        let id = ledger.append_item("milk", UserId::new(42)).await?;

        // read + batch update: 120ms in total, 60ms per call
        backend.set_latency(Some(Duration::from_millis(60))).await;
        assert_eq!(ledger.mark_done(id, UserId::new(7)).await?, MarkOutcome::Marked);

        backend.set_latency(Some(Duration::from_millis(150))).await;
        assert!(matches!(
            ledger.fetch_all().await,
            Err(Error::Timeout(limit)) if limit == Duration::from_millis(100)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let backend = Arc::new(MemoryBackend::new());
        let ledger = store(&backend, &Arc::new(FixedClock::new(at(9, 0))));
        backend.set_unavailable(true);

        assert!(matches!(ledger.ensure_schema().await, Err(Error::Backend(_))));
        assert!(matches!(
            ledger.append_item("milk", UserId::new(1)).await,
            Err(Error::Backend(_))
        ));
    }
}
