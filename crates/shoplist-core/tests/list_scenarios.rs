// Integration tests have relaxed clippy settings.
// Production code (src/) must use strict zero-unwrap/panic patterns.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::too_many_lines,
    clippy::doc_markdown
)]
//! End-to-end flows through the dispatcher against an in-memory ledger.

mod common;

use common::{
    command, harness, list_message, press, text, user_message, Outbound, ALICE, BOB, GROUP,
};
use shoplist_core::{
    dispatch::{CANCELLED_TEXT, NOT_FOUND_TEXT, PROMPT_TEXT, REPROMPT_TEXT},
    projection::{EMPTY_TEXT, NOTHING_PENDING_TEXT, PENDING_HEADING},
    session::MENU_ADD,
    LedgerBackend, Markup, Result, SessionState, HEADER,
};

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn empty_ledger_lists_as_empty_without_controls() -> Result<()> {
    let h = harness().await?;
    h.dispatcher.handle(command("list", "", ALICE)).await?;

    assert_eq!(
        h.gateway.calls().await,
        vec![Outbound::Sent {
            chat: GROUP,
            text: EMPTY_TEXT.to_string(),
            markup: Markup::None,
        }]
    );
    assert_eq!(h.backend.snapshot().await, vec![row(&HEADER)]);
    Ok(())
}

#[tokio::test]
async fn inline_add_appends_one_pending_row() -> Result<()> {
    let h = harness().await?;
    h.dispatcher.handle(command("add", "  milk ", ALICE)).await?;

    let rows = h.backend.snapshot().await;
    assert_eq!(rows.len(), 2);
    let id = rows[1][0].clone();
    assert_eq!(
        rows[1],
        row(&[&id, "milk", "FALSE", "42", "01/03/2026 09:30", "", ""])
    );
    assert_eq!(h.gateway.last_text().await.as_deref(), Some("✅ Added: milk"));

    h.gateway.take().await;
    h.dispatcher.handle(command("list", "", BOB)).await?;
    let calls = h.gateway.calls().await;
    let Outbound::Sent { text, markup, .. } = &calls[0] else {
        panic!("expected a sent list, got {calls:?}");
    };
    assert_eq!(text, &format!("{PENDING_HEADING}\n- milk"));
    let Markup::Inline(rows) = markup else {
        panic!("expected inline controls, got {markup:?}");
    };
    assert_eq!(rows[0][0].token, format!("done:{id}"));
    Ok(())
}

#[tokio::test]
async fn done_press_completes_then_second_press_is_not_found() -> Result<()> {
    let h = harness().await?;
    let id = h.ledger.append_item("milk", ALICE).await?;
    let token = format!("done:{id}");

    h.clock
        .set(common::start_time() + chrono::Duration::minutes(45));
    h.dispatcher.handle(press("p1", &token, BOB)).await?;

    let rows = h.backend.snapshot().await;
    assert_eq!(
        rows[1],
        row(&[
            &id.to_string(),
            "milk",
            "TRUE",
            "42",
            "01/03/2026 09:30",
            "7",
            "01/03/2026 10:15"
        ])
    );
    assert_eq!(
        h.gateway.take().await,
        vec![
            Outbound::Acked {
                press_id: "p1".into(),
                notice: None,
            },
            Outbound::Edited {
                message: list_message(),
                text: NOTHING_PENDING_TEXT.into(),
                markup: Markup::None,
            },
        ]
    );

    let before = h.backend.snapshot().await;
    h.dispatcher.handle(press("p2", &token, ALICE)).await?;
    assert_eq!(h.backend.snapshot().await, before);
    assert_eq!(h.backend.batch_update_calls(), 1);

    assert_eq!(
        h.gateway.calls().await,
        vec![
            Outbound::Acked {
                press_id: "p2".into(),
                notice: None,
            },
            Outbound::Edited {
                message: list_message(),
                text: format!("{NOT_FOUND_TEXT}\n\n{NOTHING_PENDING_TEXT}"),
                markup: Markup::None,
            },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn add_flow_waits_for_text_then_appends() -> Result<()> {
    let h = harness().await?;
    h.dispatcher.handle(command("add", "", ALICE)).await?;
    assert_eq!(h.sessions.state(ALICE).await, SessionState::AwaitingItemText);
    assert_eq!(h.gateway.last_text().await.as_deref(), Some(PROMPT_TEXT));

    // Another member chatting does not feed Alice's flow.
    h.dispatcher.handle(text("see you later", BOB)).await?;
    assert_eq!(h.backend.snapshot().await.len(), 1);

    h.dispatcher.handle(text("eggs", ALICE)).await?;
    assert_eq!(h.sessions.state(ALICE).await, SessionState::Idle);
    let rows = h.backend.snapshot().await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][1], "eggs");
    Ok(())
}

#[tokio::test]
async fn prompts_are_forced_replies_to_the_sender() -> Result<()> {
    let h = harness().await?;
    h.dispatcher.handle(command("add", "", ALICE)).await?;
    h.dispatcher.handle(text("  ", ALICE)).await?;

    let forced = Markup::ForceReply {
        reply_to: Some(user_message()),
    };
    assert_eq!(
        h.gateway.take().await,
        vec![
            Outbound::Sent {
                chat: GROUP,
                text: PROMPT_TEXT.into(),
                markup: forced.clone(),
            },
            Outbound::Sent {
                chat: GROUP,
                text: REPROMPT_TEXT.into(),
                markup: forced,
            },
        ]
    );

    h.dispatcher.handle(command("cancel", "", ALICE)).await?;
    h.gateway.take().await;
    h.dispatcher.handle(press("p1", "add", BOB)).await?;
    assert_eq!(
        h.gateway.calls().await[1],
        Outbound::Sent {
            chat: GROUP,
            text: PROMPT_TEXT.into(),
            markup: Markup::ForceReply { reply_to: None },
        }
    );
    Ok(())
}

#[tokio::test]
async fn ledger_of_only_malformed_rows_is_not_empty() -> Result<()> {
    let h = harness().await?;
    h.backend.append_row(row(&["x", "milk", "FALSE"])).await?;

    h.dispatcher.handle(command("list", "", ALICE)).await?;
    assert_eq!(
        h.gateway.calls().await,
        vec![Outbound::Sent {
            chat: GROUP,
            text: NOTHING_PENDING_TEXT.to_string(),
            markup: Markup::None,
        }]
    );
    Ok(())
}

#[tokio::test]
async fn add_flow_cancel_appends_nothing() -> Result<()> {
    let h = harness().await?;
    h.dispatcher.handle(press("p1", "add", ALICE)).await?;
    assert_eq!(h.sessions.state(ALICE).await, SessionState::AwaitingItemText);

    h.dispatcher.handle(command("cancel", "", ALICE)).await?;
    assert_eq!(h.sessions.state(ALICE).await, SessionState::Idle);
    assert_eq!(h.gateway.last_text().await.as_deref(), Some(CANCELLED_TEXT));
    assert_eq!(h.backend.snapshot().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn menu_label_is_not_accepted_as_item_name() -> Result<()> {
    let h = harness().await?;
    h.dispatcher.handle(text(MENU_ADD, ALICE)).await?;
    assert_eq!(h.sessions.state(ALICE).await, SessionState::AwaitingItemText);

    h.dispatcher.handle(text(MENU_ADD, ALICE)).await?;
    h.dispatcher.handle(text("   ", ALICE)).await?;
    assert_eq!(h.gateway.last_text().await.as_deref(), Some(REPROMPT_TEXT));
    assert_eq!(h.sessions.state(ALICE).await, SessionState::AwaitingItemText);
    assert_eq!(h.backend.snapshot().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn refresh_press_edits_the_list_in_place() -> Result<()> {
    let h = harness().await?;
    h.ledger.append_item("bread", ALICE).await?;
    h.dispatcher.handle(press("p9", "list", BOB)).await?;

    let calls = h.gateway.calls().await;
    assert_eq!(calls.len(), 2);
    assert!(matches!(&calls[0], Outbound::Acked { notice: None, .. }));
    let Outbound::Edited { message, text, .. } = &calls[1] else {
        panic!("expected an edit, got {calls:?}");
    };
    assert_eq!(*message, list_message());
    assert!(text.ends_with("- bread"));
    Ok(())
}

#[tokio::test]
async fn unknown_tokens_are_only_acknowledged() -> Result<()> {
    let h = harness().await?;
    tokio_test::assert_ok!(h.dispatcher.handle(press("p3", "done:abc", ALICE)).await);
    assert_eq!(
        h.gateway.calls().await,
        vec![Outbound::Acked {
            press_id: "p3".into(),
            notice: None,
        }]
    );
    Ok(())
}
