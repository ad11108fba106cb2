//! Screen rendering with edit-in-place discipline.
//!
//! Every menu render tries to edit the user's last bot message; when that
//! fails (message deleted, chat cleared, first contact) it falls back to a
//! fresh send and remembers the new message id. The state write after a
//! render is best effort: a storage hiccup must not take the reply down
//! with it.

use anyhow::Result;
use log::{debug, warn};

use crate::bot::channel::{Keyboard, MessageChannel};
use crate::bot::deps::BotDeps;
use crate::bot::ui_builder;
use crate::db;
use crate::gigachat::RecipeGenerator;
use crate::state::{ChatState, UserState};

/// Show a screen: edit the stored message if possible, otherwise send a
/// new one, then persist the resulting state.
pub async fn show_screen<C: MessageChannel, G: RecipeGenerator>(
    deps: &BotDeps<C, G>,
    chat_id: i64,
    state: &mut UserState,
    next: ChatState,
    text: &str,
    keyboard: Keyboard,
) -> Result<()> {
    let message_id = match state.last_message_id {
        Some(msg_id) => {
            match deps
                .channel
                .edit(chat_id, msg_id, text, Some(keyboard.clone()))
                .await
            {
                Ok(()) => msg_id,
                Err(e) => {
                    debug!("Edit of message {msg_id} failed, sending fresh: {e}");
                    deps.channel.send(chat_id, text, Some(keyboard)).await?
                }
            }
        }
        None => deps.channel.send(chat_id, text, Some(keyboard)).await?,
    };

    if state.current_state != next {
        state.state_history.push(state.current_state);
    }
    state.current_state = next;
    state.last_message_id = Some(message_id);

    let conn = deps.conn.lock().await;
    if let Err(e) = db::save_user_state(&conn, state) {
        warn!("Failed to persist state for user {}: {e}", state.user_id);
    }
    Ok(())
}

pub async fn render_main_menu<C: MessageChannel, G: RecipeGenerator>(
    deps: &BotDeps<C, G>,
    chat_id: i64,
    state: &mut UserState,
) -> Result<()> {
    let l = &deps.locales;
    let text = l.main_menu.text.clone();
    let kb = ui_builder::main_menu_keyboard(l);
    show_screen(deps, chat_id, state, ChatState::Main, &text, kb).await
}

pub async fn render_help<C: MessageChannel, G: RecipeGenerator>(
    deps: &BotDeps<C, G>,
    chat_id: i64,
    state: &mut UserState,
) -> Result<()> {
    let l = &deps.locales;
    let text = l.help.text.clone();
    let kb = ui_builder::help_keyboard(l);
    show_screen(deps, chat_id, state, ChatState::Help, &text, kb).await
}

/// The settings screen re-reads preferences on every render so the
/// summary always reflects the store.
pub async fn render_settings<C: MessageChannel, G: RecipeGenerator>(
    deps: &BotDeps<C, G>,
    chat_id: i64,
    state: &mut UserState,
) -> Result<()> {
    let l = &deps.locales;
    let prefs = {
        let conn = deps.conn.lock().await;
        db::get_user_preferences(&conn, state.user_id).unwrap_or_else(|e| {
            warn!("Failed to load preferences for user {}: {e}", state.user_id);
            crate::state::UserPreferences::new(state.user_id)
        })
    };
    let summary = ui_builder::format_settings_summary(l, &prefs);
    let text = l.settings_menu.text.replace("{settings}", &summary);
    let kb = ui_builder::settings_keyboard(l);
    show_screen(deps, chat_id, state, ChatState::Settings, &text, kb).await
}

pub async fn render_diet_menu<C: MessageChannel, G: RecipeGenerator>(
    deps: &BotDeps<C, G>,
    chat_id: i64,
    state: &mut UserState,
) -> Result<()> {
    let l = &deps.locales;
    let text = l.diet_menu.text.clone();
    let kb = ui_builder::diet_keyboard(l);
    show_screen(deps, chat_id, state, ChatState::SettingsDiet, &text, kb).await
}

pub async fn render_goal_input<C: MessageChannel, G: RecipeGenerator>(
    deps: &BotDeps<C, G>,
    chat_id: i64,
    state: &mut UserState,
) -> Result<()> {
    let l = &deps.locales;
    let text = l.goal_menu.text.clone();
    let kb = ui_builder::settings_back_keyboard(l);
    show_screen(deps, chat_id, state, ChatState::SettingsGoal, &text, kb).await
}

pub async fn render_allergies_input<C: MessageChannel, G: RecipeGenerator>(
    deps: &BotDeps<C, G>,
    chat_id: i64,
    state: &mut UserState,
) -> Result<()> {
    let l = &deps.locales;
    let text = l.allergies_menu.text.clone();
    let kb = ui_builder::settings_back_keyboard(l);
    show_screen(deps, chat_id, state, ChatState::SettingsAllergies, &text, kb).await
}

pub async fn render_habits_menu<C: MessageChannel, G: RecipeGenerator>(
    deps: &BotDeps<C, G>,
    chat_id: i64,
    state: &mut UserState,
) -> Result<()> {
    let l = &deps.locales;
    let text = l.habits_menu.text.clone();
    let kb = ui_builder::habits_keyboard(l);
    show_screen(deps, chat_id, state, ChatState::SettingsHabits, &text, kb).await
}

pub async fn render_likes_input<C: MessageChannel, G: RecipeGenerator>(
    deps: &BotDeps<C, G>,
    chat_id: i64,
    state: &mut UserState,
) -> Result<()> {
    let l = &deps.locales;
    let text = l.likes_menu.text.clone();
    let kb = ui_builder::habits_back_keyboard(l);
    show_screen(deps, chat_id, state, ChatState::SettingsHabitsLikes, &text, kb).await
}

pub async fn render_dislikes_input<C: MessageChannel, G: RecipeGenerator>(
    deps: &BotDeps<C, G>,
    chat_id: i64,
    state: &mut UserState,
) -> Result<()> {
    let l = &deps.locales;
    let text = l.dislikes_menu.text.clone();
    let kb = ui_builder::habits_back_keyboard(l);
    show_screen(deps, chat_id, state, ChatState::SettingsHabitsDislikes, &text, kb).await
}

/// Shown after the store is wiped. Lands the user back in the settings
/// flow so the returned state is `Settings`.
pub async fn render_clear_success<C: MessageChannel, G: RecipeGenerator>(
    deps: &BotDeps<C, G>,
    chat_id: i64,
    state: &mut UserState,
) -> Result<()> {
    let l = &deps.locales;
    let text = l.clear_success.text.clone();
    let kb = ui_builder::settings_back_keyboard(l);
    show_screen(deps, chat_id, state, ChatState::Settings, &text, kb).await
}

pub async fn render_clear_confirm<C: MessageChannel, G: RecipeGenerator>(
    deps: &BotDeps<C, G>,
    chat_id: i64,
    state: &mut UserState,
) -> Result<()> {
    let l = &deps.locales;
    let text = l.clear_confirm.text.clone();
    let kb = ui_builder::clear_confirm_keyboard(l);
    show_screen(deps, chat_id, state, ChatState::SettingsClearConfirm, &text, kb).await
}
