//! Telegram-facing layer: channel abstraction, screen rendering, and the
//! message/callback handlers.

pub mod callback_handler;
pub mod channel;
pub mod deps;
pub mod message_handler;
pub mod renderer;
pub mod ui_builder;

pub use callback_handler::handle_callback;
pub use channel::{
    Button, InboundCallback, InboundMessage, Keyboard, MessageChannel, TelegramChannel,
};
pub use deps::BotDeps;
pub use message_handler::handle_message;
