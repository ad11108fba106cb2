use anyhow::Result;
use log::{info, warn};
use rusqlite::Connection;
use std::sync::Arc;
use teloxide::prelude::*;
use tokio::sync::Mutex;

use neurochef::bot::{
    self, BotDeps, InboundCallback, InboundMessage, TelegramChannel,
};
use neurochef::config::Config;
use neurochef::db;
use neurochef::gigachat::GigaChatClient;
use neurochef::locales::Locales;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    info!("Starting NeuroChef Telegram Bot");

    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    info!("Initializing database at: {}", config.database_path);
    let conn = Connection::open(&config.database_path)?;
    db::init_database_schema(&conn)?;
    let shared_conn = Arc::new(Mutex::new(conn));

    let locales = Arc::new(Locales::load()?);

    let generator = GigaChatClient::new(
        config.gigachat_client_id.clone(),
        config.gigachat_client_secret.clone(),
        config.gigachat_scope.clone(),
    )?;

    let telegram = Bot::new(&config.telegram_bot_token);
    let channel = TelegramChannel::new(telegram.clone());

    let deps = Arc::new(BotDeps::new(channel, shared_conn, generator, locales));

    info!("Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint({
            let deps = Arc::clone(&deps);
            move |msg: Message| {
                let deps = Arc::clone(&deps);
                async move {
                    if let Some(inbound) = to_inbound_message(&msg) {
                        if let Err(e) = bot::handle_message(deps.as_ref(), inbound).await {
                            warn!("Message handling failed: {e:#}");
                        }
                    }
                    respond(())
                }
            }
        }))
        .branch(Update::filter_callback_query().endpoint({
            let deps = Arc::clone(&deps);
            move |q: CallbackQuery| {
                let deps = Arc::clone(&deps);
                async move {
                    if let Some(inbound) = to_inbound_callback(&q) {
                        if let Err(e) = bot::handle_callback(deps.as_ref(), inbound).await {
                            warn!("Callback handling failed: {e:#}");
                        }
                    }
                    respond(())
                }
            }
        }));

    Dispatcher::builder(telegram, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

/// Reduce a Telegram message to the fields the handlers use. Non-text
/// updates and messages without a sender are ignored.
fn to_inbound_message(msg: &Message) -> Option<InboundMessage> {
    let text = msg.text()?.to_string();
    let user_id = msg.from.as_ref()?.id.0 as i64;
    Some(InboundMessage {
        chat_id: msg.chat.id.0,
        user_id,
        message_id: msg.id.0,
        text,
    })
}

/// Reduce a callback query. Presses without data are ignored.
fn to_inbound_callback(q: &CallbackQuery) -> Option<InboundCallback> {
    let data = q.data.clone()?;
    let message = q.message.as_ref();
    Some(InboundCallback {
        id: q.id.0.clone(),
        chat_id: message.map(|m| m.chat().id.0)?,
        user_id: q.from.id.0 as i64,
        message_id: message.map(|m| m.id().0),
        data,
    })
}
