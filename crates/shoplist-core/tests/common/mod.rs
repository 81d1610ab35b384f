//! Shared fixtures for dispatcher-level tests.

#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use chrono::NaiveDateTime;
use shoplist_core::{
    AccessPolicy, ChatGateway, ChatId, ClockIdGenerator, Dispatcher, DispatcherOptions, FixedClock,
    InboundEvent, LedgerStore, Markup, MemoryBackend, MessageRef, Notice, Result, RowCodec,
    SessionStore, UserId,
};
use tokio::sync::Mutex;

pub const GROUP: ChatId = ChatId(-100_123);
pub const ALICE: UserId = UserId::new(42);
pub const BOB: UserId = UserId::new(7);

/// One outbound gateway call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Sent {
        chat: ChatId,
        text: String,
        markup: Markup,
    },
    Edited {
        message: MessageRef,
        text: String,
        markup: Markup,
    },
    Acked {
        press_id: String,
        notice: Option<Notice>,
    },
}

/// Gateway that records every call instead of talking to a chat platform
#[derive(Debug, Default)]
pub struct RecordingGateway {
    calls: Mutex<Vec<Outbound>>,
}

impl RecordingGateway {
    pub async fn calls(&self) -> Vec<Outbound> {
        self.calls.lock().await.clone()
    }

    pub async fn take(&self) -> Vec<Outbound> {
        std::mem::take(&mut *self.calls.lock().await)
    }

    /// Text of the last sent or edited message
    pub async fn last_text(&self) -> Option<String> {
        self.calls.lock().await.iter().rev().find_map(|call| match call {
            Outbound::Sent { text, .. } | Outbound::Edited { text, .. } => Some(text.clone()),
            Outbound::Acked { .. } => None,
        })
    }
}

#[async_trait::async_trait]
impl ChatGateway for RecordingGateway {
    async fn send_message(&self, chat: ChatId, text: &str, markup: Markup) -> Result<()> {
        self.calls.lock().await.push(Outbound::Sent {
            chat,
            text: text.to_string(),
            markup,
        });
        Ok(())
    }

    async fn edit_message(&self, message: MessageRef, text: &str, markup: Markup) -> Result<()> {
        self.calls.lock().await.push(Outbound::Edited {
            message,
            text: text.to_string(),
            markup,
        });
        Ok(())
    }

    async fn acknowledge_press(&self, press_id: &str, notice: Option<Notice>) -> Result<()> {
        self.calls.lock().await.push(Outbound::Acked {
            press_id: press_id.to_string(),
            notice,
        });
        Ok(())
    }
}

pub struct Harness {
    pub backend: Arc<MemoryBackend>,
    pub ledger: Arc<LedgerStore>,
    pub sessions: Arc<SessionStore>,
    pub gateway: Arc<RecordingGateway>,
    pub clock: Arc<FixedClock>,
    pub dispatcher: Dispatcher,
}

pub fn start_time() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2026-03-01 09:30:00", "%Y-%m-%d %H:%M:%S").unwrap()
}

pub async fn harness() -> Result<Harness> {
    harness_with(AccessPolicy::open(), Duration::from_secs(5)).await
}

pub async fn harness_with(access: AccessPolicy, remote_timeout: Duration) -> Result<Harness> {
    let backend = Arc::new(MemoryBackend::new());
    let clock = Arc::new(FixedClock::new(start_time()));
    let ledger = Arc::new(
        LedgerStore::new(
            backend.clone(),
            Arc::new(ClockIdGenerator::new()),
            clock.clone(),
            RowCodec::default(),
        )
        .with_call_timeout(remote_timeout),
    );
    ledger.ensure_schema().await?;
    let sessions = Arc::new(SessionStore::new(Duration::from_secs(600)));
    let gateway = Arc::new(RecordingGateway::default());
    let dispatcher = Dispatcher::new(
        ledger.clone(),
        sessions.clone(),
        gateway.clone(),
        access,
        DispatcherOptions::default(),
    );
    Ok(Harness {
        backend,
        ledger,
        sessions,
        gateway,
        clock,
        dispatcher,
    })
}

/// The message a user event came in as
pub fn user_message() -> MessageRef {
    MessageRef {
        chat: GROUP,
        message_id: 321,
    }
}

pub fn command(name: &str, args: &str, user: UserId) -> InboundEvent {
    InboundEvent::Command {
        name: name.to_string(),
        args: args.to_string(),
        user,
        chat: GROUP,
        message: Some(user_message()),
    }
}

pub fn text(body: &str, user: UserId) -> InboundEvent {
    InboundEvent::FreeText {
        text: body.to_string(),
        user,
        chat: GROUP,
        message: Some(user_message()),
    }
}

pub fn list_message() -> MessageRef {
    MessageRef {
        chat: GROUP,
        message_id: 555,
    }
}

pub fn press(press_id: &str, token: &str, user: UserId) -> InboundEvent {
    InboundEvent::ButtonPress {
        press_id: press_id.to_string(),
        token: token.to_string(),
        user,
        chat: GROUP,
        message: Some(list_message()),
    }
}
