//! Chat Gateway boundary.
//!
//! Inbound events arrive already translated from the chat platform; outbound
//! calls go through [`ChatGateway`]. Nothing here knows about Telegram.

use crate::{ActionToken, UserId};

/// Chat (group or private) identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message already sent, addressable for in-place edits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    /// Chat holding the message
    pub chat: ChatId,
    /// Platform message id
    pub message_id: i64,
}

/// Something a user did in a chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// `/name args`
    Command {
        /// Command name without slash or `@bot` suffix, lowercased
        name: String,
        /// Everything after the command, trimmed
        args: String,
        /// Sender
        user: UserId,
        /// Chat
        chat: ChatId,
        /// The command message itself
        message: Option<MessageRef>,
    },
    /// An inline button was pressed
    ButtonPress {
        /// Platform id of the press, needed to acknowledge it
        press_id: String,
        /// Opaque token attached to the button
        token: String,
        /// Who pressed
        user: UserId,
        /// Chat
        chat: ChatId,
        /// Message carrying the button, if the platform still has it
        message: Option<MessageRef>,
    },
    /// Plain text
    FreeText {
        /// Message text
        text: String,
        /// Sender
        user: UserId,
        /// Chat
        chat: ChatId,
        /// The text message itself
        message: Option<MessageRef>,
    },
}

impl InboundEvent {
    /// Chat the event came from
    #[must_use]
    pub const fn chat(&self) -> ChatId {
        match self {
            Self::Command { chat, .. } | Self::ButtonPress { chat, .. } | Self::FreeText { chat, .. } => *chat,
        }
    }

    /// User the event came from
    #[must_use]
    pub const fn user(&self) -> UserId {
        match self {
            Self::Command { user, .. } | Self::ButtonPress { user, .. } | Self::FreeText { user, .. } => *user,
        }
    }
}

/// A selectable control: visible label plus opaque token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    /// Button text
    pub label: String,
    /// Token sent back on press
    pub token: String,
}

impl Control {
    /// Build a control from an action token
    #[must_use]
    pub fn new(label: impl Into<String>, token: ActionToken) -> Self {
        Self {
            label: label.into(),
            token: token.to_string(),
        }
    }
}

/// Controls attached to an outbound message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Markup {
    /// Plain message
    #[default]
    None,
    /// Inline buttons, one inner vec per row
    Inline(Vec<Vec<Control>>),
    /// Persistent menu keyboard; pressing a label sends it as text
    Menu(Vec<Vec<String>>),
    /// Ask the client to open a reply to this message.
    ///
    /// With `reply_to` set, only the sender of that message is asked.
    ForceReply {
        /// Message the prompt answers
        reply_to: Option<MessageRef>,
    },
}

/// Short notice shown when acknowledging a press
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Text
    pub text: String,
    /// Modal alert instead of a transient toast
    pub alert: bool,
}

/// Outbound half of the chat platform
#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    /// Send a new message
    async fn send_message(&self, chat: ChatId, text: &str, markup: Markup) -> crate::Result<()>;

    /// Replace the text and controls of an existing message
    async fn edit_message(&self, message: MessageRef, text: &str, markup: Markup) -> crate::Result<()>;

    /// Acknowledge a button press, optionally with a notice
    async fn acknowledge_press(&self, press_id: &str, notice: Option<Notice>) -> crate::Result<()>;
}
