//! Event dispatcher - routes inbound chat events to the add flow, the
//! completion protocol or the list view.
//!
//! One call to [`Dispatcher::handle`] per inbound event. Calls for different
//! events may run concurrently; nothing here serializes them.
//!
//! # Failure model
//!
//! Each ledger call carries its own deadline (see
//! [`LedgerStore::with_call_timeout`]). A ledger that is down or slow turns
//! into a generic failure reply for that one event; the error is logged and
//! `handle` still returns `Ok`. A write that returned is always reported as
//! done. Gateway failures are returned to the caller.
//!
//! # Groups
//!
//! Prompts for the item name are sent as forced replies, so the answer
//! reaches the bot even when it only sees commands and replies to itself.

use std::{collections::HashSet, str::FromStr, sync::Arc};

use tracing::{debug, error, info, warn};

use crate::{
    completion::{complete, CompletionOutcome},
    gateway::{ChatGateway, ChatId, Control, InboundEvent, Markup, MessageRef, Notice},
    ledger::LedgerStore,
    projection::{project_snapshot, ListView, ProjectionOptions},
    session::{Action, Input, SessionState, SessionStore, MENU_ADD, MENU_CANCEL, MENU_LIST},
    ActionToken, Error, Result, UserId,
};

/// Usage text for `/start` and `/help`
pub const HELP_TEXT: &str = "🛒 Shopping list (group)\n\
Add: /add milk\n\
Show list: /list\n\
Mark bought: ✅ button\n\
Stop adding: /cancel";

/// Asked when the add flow starts
pub const PROMPT_TEXT: &str = "✏ What should I add? Send the item name, or /cancel.";

/// Asked again when the reply was not a usable name
pub const REPROMPT_TEXT: &str = "Please send an item name, or /cancel.";

/// Reply to a cancelled add flow
pub const CANCELLED_TEXT: &str = "Cancelled, nothing was added.";

/// Reply to `/cancel` with no flow in progress
pub const NOTHING_TO_CANCEL_TEXT: &str = "Nothing to cancel.";

/// Shown above the list for a press on an item that is gone or already done
pub const NOT_FOUND_TEXT: &str = "❌ Item not found (maybe it was already bought).";

/// Reply when the ledger cannot be reached
pub const FAILURE_TEXT: &str = "⚠ Could not reach the shopping list, please try again.";

/// Alert for presses coming from chats outside the allowlist
pub const FOREIGN_CHAT_TEXT: &str = "This bot only works in the configured group.";

/// Commands the bot understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BotCommand {
    /// Usage and menu
    Start,
    /// Same as start
    Help,
    /// Report the chat id
    #[strum(serialize = "chatid")]
    ChatId,
    /// Add an item, inline or through the add flow
    Add,
    /// Show the pending list
    List,
    /// Abandon the add flow
    Cancel,
}

/// Which chats may use the bot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    allowed: HashSet<ChatId>,
}

impl AccessPolicy {
    /// Every chat may use the bot
    #[must_use]
    pub fn open() -> Self {
        Self::default()
    }

    /// Only the given chats may use the bot; an empty list means open
    #[must_use]
    pub fn only(chats: impl IntoIterator<Item = ChatId>) -> Self {
        Self {
            allowed: chats.into_iter().collect(),
        }
    }

    /// Whether `chat` may use the bot
    #[must_use]
    pub fn allows(&self, chat: ChatId) -> bool {
        self.allowed.is_empty() || self.allowed.contains(&chat)
    }
}

/// Dispatcher tuning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherOptions {
    /// Rendering of the list view
    pub projection: ProjectionOptions,
}

/// Routes inbound events
pub struct Dispatcher {
    ledger: Arc<LedgerStore>,
    sessions: Arc<SessionStore>,
    gateway: Arc<dyn ChatGateway>,
    access: AccessPolicy,
    options: DispatcherOptions,
}

impl Dispatcher {
    /// Create a dispatcher
    pub fn new(
        ledger: Arc<LedgerStore>,
        sessions: Arc<SessionStore>,
        gateway: Arc<dyn ChatGateway>,
        access: AccessPolicy,
        options: DispatcherOptions,
    ) -> Self {
        Self {
            ledger,
            sessions,
            gateway,
            access,
            options,
        }
    }

    /// Session store shared with the poll loop
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Handle one inbound event
    pub async fn handle(&self, event: InboundEvent) -> Result<()> {
        debug!(?event, "inbound event");
        match self.route(&event).await {
            Err(err) if err.is_ledger_unavailable() => {
                error!(%err, chat = %event.chat(), user = %event.user(), "ledger unavailable");
                self.report_failure(&event).await
            }
            other => other,
        }
    }

    async fn route(&self, event: &InboundEvent) -> Result<()> {
        if let InboundEvent::Command { name, chat, .. } = event {
            if matches!(name.parse::<BotCommand>(), Ok(BotCommand::ChatId)) {
                return self
                    .gateway
                    .send_message(*chat, &format!("chat_id = {chat}"), Markup::None)
                    .await;
            }
        }

        if !self.access.allows(event.chat()) {
            warn!(chat = %event.chat(), user = %event.user(), "event from chat outside allowlist");
            if let InboundEvent::ButtonPress { press_id, .. } = event {
                return self
                    .gateway
                    .acknowledge_press(press_id, Some(alert(FOREIGN_CHAT_TEXT)))
                    .await;
            }
            return Ok(());
        }

        match event {
            InboundEvent::Command {
                name,
                args,
                user,
                chat,
                message,
            } => self.on_command(name, args, *user, *chat, *message).await,
            InboundEvent::ButtonPress {
                press_id,
                token,
                user,
                chat,
                message,
            } => self.on_press(press_id, token, *user, *chat, *message).await,
            InboundEvent::FreeText {
                text,
                user,
                chat,
                message,
            } => self.on_text(text, *user, *chat, *message).await,
        }
    }

    async fn on_command(
        &self,
        name: &str,
        args: &str,
        user: UserId,
        chat: ChatId,
        origin: Option<MessageRef>,
    ) -> Result<()> {
        let Ok(command) = BotCommand::from_str(name) else {
            debug!(name, "ignoring unknown command");
            return Ok(());
        };

        match command {
            BotCommand::Start | BotCommand::Help => {
                self.gateway
                    .send_message(chat, HELP_TEXT, menu_markup())
                    .await
            }
            BotCommand::ChatId => {
                self.gateway
                    .send_message(chat, &format!("chat_id = {chat}"), Markup::None)
                    .await
            }
            BotCommand::Add => {
                let text = Some(args.trim()).filter(|t| !t.is_empty());
                let action = self.sessions.apply(user, Input::AddCommand(text)).await;
                self.perform(action, user, chat, origin, false).await
            }
            BotCommand::List => self.send_list(chat).await,
            BotCommand::Cancel => {
                let action = self.sessions.apply(user, Input::Cancel).await;
                self.perform(action, user, chat, origin, false).await
            }
        }
    }

    async fn on_text(
        &self,
        text: &str,
        user: UserId,
        chat: ChatId,
        origin: Option<MessageRef>,
    ) -> Result<()> {
        let trimmed = text.trim();
        if trimmed == MENU_CANCEL {
            let action = self.sessions.apply(user, Input::Cancel).await;
            return self.perform(action, user, chat, origin, false).await;
        }

        let awaiting = self.sessions.state(user).await == SessionState::AwaitingItemText;
        if !awaiting {
            if trimmed == MENU_ADD {
                let action = self.sessions.apply(user, Input::AddButton).await;
                return self.perform(action, user, chat, origin, false).await;
            }
            if trimmed == MENU_LIST {
                return self.send_list(chat).await;
            }
        }

        let action = self.sessions.apply(user, Input::Text(text)).await;
        self.perform(action, user, chat, origin, awaiting).await
    }

    async fn on_press(
        &self,
        press_id: &str,
        token: &str,
        user: UserId,
        chat: ChatId,
        message: Option<MessageRef>,
    ) -> Result<()> {
        self.gateway.acknowledge_press(press_id, None).await?;
        let Ok(token) = token.parse::<ActionToken>() else {
            debug!(token, "ignoring unknown button token");
            return Ok(());
        };

        match token {
            ActionToken::Done(id) => {
                let outcome = complete(&self.ledger, id, user, &self.options.projection).await?;
                match &outcome {
                    CompletionOutcome::Completed { view, .. } => {
                        self.show_view(chat, message, &view.text, view).await
                    }
                    CompletionOutcome::NotFound { view } => {
                        let text = format!("{NOT_FOUND_TEXT}\n\n{}", view.text);
                        self.show_view(chat, message, &text, view).await
                    }
                }
            }
            ActionToken::Refresh => {
                let view = self.current_view().await?;
                self.show_view(chat, message, &view.text, &view).await
            }
            ActionToken::Add => {
                let action = self.sessions.apply(user, Input::AddButton).await;
                self.perform(action, user, chat, None, false).await
            }
        }
    }

    /// Carry out a session action. `origin` is the user's message, if any;
    /// `from_flow` is set when the action came from text sent while the add
    /// flow was waiting for it.
    async fn perform(
        &self,
        action: Action,
        user: UserId,
        chat: ChatId,
        origin: Option<MessageRef>,
        from_flow: bool,
    ) -> Result<()> {
        let (reply, markup) = match action {
            Action::Append(name) => match self.ledger.append_item(&name, user).await {
                Ok(id) => {
                    info!(%id, %user, "item added from chat");
                    (format!("✅ Added: {name}"), Markup::None)
                }
                Err(err) => {
                    // a timed-out append may still land; only a refused one reopens the flow
                    if from_flow && matches!(err, Error::Backend(_)) {
                        self.sessions.resume_awaiting(user).await;
                    }
                    return Err(err);
                }
            },
            Action::Prompt => (PROMPT_TEXT.to_string(), prompt_markup(origin)),
            Action::Reprompt => (REPROMPT_TEXT.to_string(), prompt_markup(origin)),
            Action::Cancelled => (CANCELLED_TEXT.to_string(), Markup::None),
            Action::NothingToCancel => (NOTHING_TO_CANCEL_TEXT.to_string(), Markup::None),
            Action::Ignore => return Ok(()),
        };
        self.gateway.send_message(chat, &reply, markup).await
    }

    async fn current_view(&self) -> Result<ListView> {
        let snapshot = self.ledger.snapshot().await?;
        Ok(project_snapshot(&snapshot, &self.options.projection))
    }

    async fn send_list(&self, chat: ChatId) -> Result<()> {
        let view = self.current_view().await?;
        self.gateway
            .send_message(chat, &view.text, list_markup(&view))
            .await
    }

    /// Show `view` with `text`, in place when the pressed message is known
    async fn show_view(
        &self,
        chat: ChatId,
        message: Option<MessageRef>,
        text: &str,
        view: &ListView,
    ) -> Result<()> {
        match message {
            Some(message) => self.gateway.edit_message(message, text, list_markup(view)).await,
            None => self.gateway.send_message(chat, text, list_markup(view)).await,
        }
    }

    /// Presses were already acknowledged, so every failure is a chat message
    async fn report_failure(&self, event: &InboundEvent) -> Result<()> {
        self.gateway
            .send_message(event.chat(), FAILURE_TEXT, Markup::None)
            .await
    }}

/// Inline buttons for a list view: one per shown pending item plus
/// add/refresh. Views without pending items carry no controls.
#[must_use]
pub fn list_markup(view: &ListView) -> Markup {
    if view.entries.is_empty() {
        return Markup::None;
    }
    let rows = view
        .entries
        .iter()
        .map(|entry| vec![Control::new(format!("✅ {}", entry.label), ActionToken::Done(entry.id))])
        .chain(std::iter::once(vec![
            Control::new(MENU_ADD, ActionToken::Add),
            Control::new("🔄 Refresh", ActionToken::Refresh),
        ]))
        .collect();
    Markup::Inline(rows)
}

const fn prompt_markup(origin: Option<MessageRef>) -> Markup {
    Markup::ForceReply { reply_to: origin }
}

fn menu_markup() -> Markup {
    Markup::Menu(vec![
        vec![MENU_ADD.to_string(), MENU_LIST.to_string()],
        vec![MENU_CANCEL.to_string()],
    ])
}

fn alert(text: impl Into<String>) -> Notice {
    Notice {
        text: text.into(),
        alert: true,
    }
}
