//! Outbound message channel abstraction over the Telegram Bot API.
//!
//! Handlers talk to a `MessageChannel` instead of `teloxide::Bot` so the
//! dispatch logic can be exercised in tests with a recording fake.

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQueryId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode,
};

/// One inline button: visible label plus the callback data it fires.
#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Rows of inline buttons, top to bottom.
pub type Keyboard = Vec<Vec<Button>>;

/// An incoming text message, reduced to what the dispatcher needs.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub user_id: i64,
    pub message_id: i32,
    pub text: String,
}

/// An incoming inline-button press.
#[derive(Debug, Clone)]
pub struct InboundCallback {
    pub id: String,
    pub chat_id: i64,
    pub user_id: i64,
    /// Id of the message carrying the pressed keyboard, when Telegram
    /// still has it.
    pub message_id: Option<i32>,
    pub data: String,
}

/// Sink for everything the bot shows to users.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Send a fresh message, returning its id for later edits.
    async fn send(&self, chat_id: i64, text: &str, keyboard: Option<Keyboard>) -> Result<i32>;

    /// Edit an existing message in place.
    async fn edit(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<()>;

    /// Delete a message. Best effort at all call sites.
    async fn delete(&self, chat_id: i64, message_id: i32) -> Result<()>;

    /// Acknowledge a callback query so the client stops its spinner.
    async fn ack(&self, callback_id: &str) -> Result<()>;
}

/// Production channel backed by the Telegram Bot API.
pub struct TelegramChannel {
    bot: Bot,
}

impl TelegramChannel {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn to_markup(keyboard: Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.into_iter().map(|row| {
        row.into_iter()
            .map(|b| InlineKeyboardButton::callback(b.label, b.data))
            .collect::<Vec<_>>()
    }))
}

#[async_trait]
impl MessageChannel for TelegramChannel {
    async fn send(&self, chat_id: i64, text: &str, keyboard: Option<Keyboard>) -> Result<i32> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Markdown);
        if let Some(kb) = keyboard {
            request = request.reply_markup(to_markup(kb));
        }
        let message = request.await.context("Failed to send message")?;
        Ok(message.id.0)
    }

    async fn edit(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        let mut request = self
            .bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id), text)
            .parse_mode(ParseMode::Markdown);
        if let Some(kb) = keyboard {
            request = request.reply_markup(to_markup(kb));
        }
        request.await.context("Failed to edit message")?;
        Ok(())
    }

    async fn delete(&self, chat_id: i64, message_id: i32) -> Result<()> {
        self.bot
            .delete_message(ChatId(chat_id), MessageId(message_id))
            .await
            .context("Failed to delete message")?;
        Ok(())
    }

    async fn ack(&self, callback_id: &str) -> Result<()> {
        self.bot
            .answer_callback_query(CallbackQueryId(callback_id.to_string()))
            .await
            .context("Failed to answer callback query")?;
        Ok(())
    }
}
