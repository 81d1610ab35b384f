//! Telegram Bot API adapter.
//!
//! Long-polls `getUpdates`, turns updates into [`InboundEvent`]s and
//! implements [`ChatGateway`] with `sendMessage`, `editMessageText` and
//! `answerCallbackQuery`.
//!
//! With privacy mode on (the default for bots), a group only forwards
//! commands and replies to the bot's own messages. Prompts are therefore
//! sent as forced replies; menu keyboard taps in groups are not delivered.

use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use shoplist_core::{
    ChatGateway, ChatId, Error, InboundEvent, Markup, MessageRef, Notice, Result, UserId,
};
use tracing::{debug, instrument};

const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

/// What `getMe` says about the bot
#[derive(Debug, Clone, Deserialize)]
pub struct BotProfile {
    pub username: Option<String>,
    /// `false` means privacy mode is on
    #[serde(default)]
    pub can_read_all_group_messages: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

/// Translate an update into an event. Updates the bot has no use for
/// (stickers, commands addressed to another bot, presses on messages
/// Telegram no longer has) give `None`.
pub fn to_event(update: Update, bot_username: Option<&str>) -> Option<InboundEvent> {
    if let Some(query) = update.callback_query {
        let message = query.message?;
        let chat = ChatId(message.chat.id);
        return Some(InboundEvent::ButtonPress {
            press_id: query.id,
            token: query.data.unwrap_or_default(),
            user: UserId::new(query.from.id),
            chat,
            message: Some(MessageRef {
                chat,
                message_id: message.message_id,
            }),
        });
    }

    let message = update.message?;
    let user = UserId::new(message.from?.id);
    let chat = ChatId(message.chat.id);
    let origin = Some(MessageRef {
        chat,
        message_id: message.message_id,
    });
    let text = message.text?;

    let Some(command) = text.strip_prefix('/') else {
        return Some(InboundEvent::FreeText {
            text,
            user,
            chat,
            message: origin,
        });
    };
    let (head, args) = command
        .split_once(char::is_whitespace)
        .unwrap_or((command, ""));
    let (name, addressee) = head.split_once('@').map_or((head, None), |(n, a)| (n, Some(a)));
    if let (Some(addressee), Some(me)) = (addressee, bot_username) {
        if !addressee.eq_ignore_ascii_case(me) {
            debug!(addressee, "command addressed to another bot");
            return None;
        }
    }
    if name.is_empty() {
        return None;
    }

    Some(InboundEvent::Command {
        name: name.to_ascii_lowercase(),
        args: args.trim().to_string(),
        user,
        chat,
        message: origin,
    })
}

fn markup_json(markup: &Markup) -> Option<Value> {
    match markup {
        Markup::None => None,
        Markup::Inline(rows) => Some(json!({
            "inline_keyboard": rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|c| json!({ "text": c.label, "callback_data": c.token }))
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>(),
        })),
        Markup::Menu(rows) => Some(json!({
            "keyboard": rows
                .iter()
                .map(|row| row.iter().map(|label| json!({ "text": label })).collect::<Vec<_>>())
                .collect::<Vec<_>>(),
            "resize_keyboard": true,
        })),
        Markup::ForceReply { reply_to } => Some(json!({
            "force_reply": true,
            "selective": reply_to.is_some(),
        })),
    }
}

fn send_body(chat: ChatId, text: &str, markup: &Markup) -> Value {
    let mut body = json!({ "chat_id": chat.0, "text": text });
    if let Some(json) = markup_json(markup) {
        body["reply_markup"] = json;
    }
    if let Markup::ForceReply {
        reply_to: Some(message),
    } = markup
    {
        body["reply_parameters"] = json!({
            "message_id": message.message_id,
            "allow_sending_without_reply": true,
        });
    }
    body
}

/// Bot API client
pub struct TelegramClient {
    client: reqwest::Client,
    base: String,
    poll_timeout: Duration,
}

impl TelegramClient {
    pub fn new(token: &str, poll_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(poll_timeout + Duration::from_secs(10))
            .build()
            .map_err(|e| Error::gateway(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base: format!("{API_BASE}/bot{token}"),
            poll_timeout,
        })
    }

    /// The bot's own account. The username tells `/cmd@thisbot` from
    /// `/cmd@otherbot`.
    pub async fn profile(&self) -> Result<BotProfile> {
        self.call("getMe", &json!({})).await
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": self.poll_timeout.as_secs(),
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }

    #[instrument(name = "telegram_call", skip(self, body))]
    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T> {
        let response = self
            .client
            .post(format!("{}/{method}", self.base))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::gateway(format!("{method} request failed: {}", e.without_url())))?;

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| Error::gateway(format!("{method} response unreadable: {}", e.without_url())))?;

        match envelope {
            Envelope {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            Envelope { description, .. } => Err(Error::gateway(format!(
                "{method} rejected: {}",
                description.unwrap_or_else(|| "no description".to_string())
            ))),
        }
    }
}

fn is_not_modified(err: &Error) -> bool {
    matches!(err, Error::Gateway(msg) if msg.contains("message is not modified"))
}

#[async_trait::async_trait]
impl ChatGateway for TelegramClient {
    async fn send_message(&self, chat: ChatId, text: &str, markup: Markup) -> Result<()> {
        let body = send_body(chat, text, &markup);
        self.call::<Value>("sendMessage", &body).await.map(drop)
    }

    async fn edit_message(&self, message: MessageRef, text: &str, markup: Markup) -> Result<()> {
        let mut body = json!({
            "chat_id": message.chat.0,
            "message_id": message.message_id,
            "text": text,
        });
        // Only inline keyboards can be attached to an edited message.
        if let Some(markup) = markup_json(&markup).filter(|_| matches!(markup, Markup::Inline(_))) {
            body["reply_markup"] = markup;
        }
        match self.call::<Value>("editMessageText", &body).await {
            Err(err) if is_not_modified(&err) => Ok(()),
            other => other.map(drop),
        }
    }

    async fn acknowledge_press(&self, press_id: &str, notice: Option<Notice>) -> Result<()> {
        let mut body = json!({ "callback_query_id": press_id });
        if let Some(notice) = notice {
            body["text"] = Value::String(notice.text);
            body["show_alert"] = Value::Bool(notice.alert);
        }
        self.call::<Value>("answerCallbackQuery", &body).await.map(drop)
    }
}
