//! Completion Protocol - "mark done" from an inline button.
//!
//! 1. Fresh read of the ledger.
//! 2. No pending item with that id: report not found, mutate nothing.
//! 3. Otherwise mark it done (one batched write).
//! 4. Fresh read again and project the view shown to the user. If that read
//!    fails the write still stands: the view is built from the step 1 read
//!    with the item taken off.
//!
//! A repeated press on the same button lands in step 2, so an item can never
//! be completed twice. "Already done" and "never existed" look the same.

use tracing::{debug, info, warn};

use crate::{
    ledger::{LedgerSnapshot, LedgerStore, MarkOutcome},
    projection::{project_snapshot, ListView, ProjectionOptions},
    Item, ItemId, Result, UserId,
};

/// Result of a completion attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The item was pending and is now done
    Completed {
        /// The item as it was before completion
        item: Item,
        /// View re-projected after the write
        view: ListView,
    },
    /// No pending item with that id
    NotFound {
        /// View projected from the read that found nothing
        view: ListView,
    },
}

impl CompletionOutcome {
    /// View to show after this outcome
    #[must_use]
    pub const fn view(&self) -> &ListView {
        match self {
            Self::Completed { view, .. } | Self::NotFound { view } => view,
        }
    }
}

/// Run the completion protocol for `id` on behalf of `user`.
///
/// Fails only when nothing was written.
pub async fn complete(
    ledger: &LedgerStore,
    id: ItemId,
    user: UserId,
    options: &ProjectionOptions,
) -> Result<CompletionOutcome> {
    let before = ledger.snapshot().await?;
    let Some(item) = before
        .items
        .iter()
        .find(|i| i.id == id && i.is_pending())
        .cloned()
    else {
        debug!(%id, "completion target not pending");
        return Ok(CompletionOutcome::NotFound {
            view: project_snapshot(&before, options),
        });
    };

    match ledger.mark_done(id, user).await? {
        MarkOutcome::Marked => {
            info!(%id, %user, name = %item.name, "item completed");
            let view = match ledger.snapshot().await {
                Ok(after) => project_snapshot(&after, options),
                Err(error) => {
                    warn!(%id, %error, "re-read after completion failed; using prior read");
                    project_snapshot(&settled(before, id, user), options)
                }
            };
            Ok(CompletionOutcome::Completed { item, view })
        }
        MarkOutcome::NotFound => {
            debug!(%id, "completion lost a race with a concurrent writer");
            let view = match ledger.snapshot().await {
                Ok(after) => project_snapshot(&after, options),
                Err(_) => project_snapshot(&before, options),
            };
            Ok(CompletionOutcome::NotFound { view })
        }
    }
}

/// `snapshot` with `id` marked done locally
fn settled(mut snapshot: LedgerSnapshot, id: ItemId, user: UserId) -> LedgerSnapshot {
    for item in snapshot.items.iter_mut().filter(|i| i.id == id) {
        item.done = true;
        item.done_by = Some(user);
    }
    snapshot
}
