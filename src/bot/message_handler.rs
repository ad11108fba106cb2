//! Text message handling: slash commands, stateful free-text input for
//! the preference fields, and recipe requests.

use anyhow::Result;
use log::{debug, error, info, warn};

use crate::bot::channel::{InboundMessage, MessageChannel};
use crate::bot::deps::BotDeps;
use crate::bot::renderer;
use crate::bot::ui_builder;
use crate::db;
use crate::gigachat::RecipeGenerator;
use crate::state::{normalize_field_input, ChatState, UserState};

/// Recognized slash commands. Anything else typed by the user is a
/// recipe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Settings,
    Help,
}

/// Parse a leading slash command, tolerating the `@botname` suffix
/// Telegram appends in group chats.
pub fn parse_command(text: &str) -> Option<Command> {
    let trimmed = text.trim();
    let rest = trimmed.strip_prefix('/')?;
    let name = rest.split('@').next().unwrap_or("").to_lowercase();
    match name.as_str() {
        "start" => Some(Command::Start),
        "settings" => Some(Command::Settings),
        "help" => Some(Command::Help),
        _ => None,
    }
}

/// Which preference field a free-text input state feeds.
#[derive(Debug, Clone, Copy)]
enum PrefField {
    Goal,
    Allergies,
    Likes,
    Dislikes,
}

fn input_field(state: ChatState) -> Option<PrefField> {
    match state {
        ChatState::SettingsGoal => Some(PrefField::Goal),
        ChatState::SettingsAllergies => Some(PrefField::Allergies),
        ChatState::SettingsHabitsLikes => Some(PrefField::Likes),
        ChatState::SettingsHabitsDislikes => Some(PrefField::Dislikes),
        _ => None,
    }
}

pub async fn handle_message<C: MessageChannel, G: RecipeGenerator>(
    deps: &BotDeps<C, G>,
    msg: InboundMessage,
) -> Result<()> {
    let lock = deps.user_lock(msg.user_id).await;
    let _guard = lock.lock().await;

    // The chat stays a single bot-rendered menu; user input is consumed.
    if let Err(e) = deps.channel.delete(msg.chat_id, msg.message_id).await {
        debug!("Could not delete inbound message {}: {e}", msg.message_id);
    }

    let text = msg.text.trim().to_string();
    if text.is_empty() {
        return Ok(());
    }

    let mut state = {
        let conn = deps.conn.lock().await;
        match db::get_user_state(&conn, msg.user_id) {
            Ok(state) => state,
            Err(e) => {
                error!("Failed to load state for user {}: {e}", msg.user_id);
                return Ok(());
            }
        }
    };

    if let Some(command) = parse_command(&text) {
        info!("User {} issued {:?}", msg.user_id, command);
        return match command {
            Command::Start => renderer::render_main_menu(deps, msg.chat_id, &mut state).await,
            Command::Settings => renderer::render_settings(deps, msg.chat_id, &mut state).await,
            Command::Help => renderer::render_help(deps, msg.chat_id, &mut state).await,
        };
    }

    // An unrecognized slash command is never field input, even while a
    // prompt is awaiting text; it rides the default recipe path.
    if !text.starts_with('/') {
        if let Some(field) = input_field(state.current_state) {
            return handle_field_input(deps, msg.chat_id, &mut state, field, &text).await;
        }
    }

    handle_recipe_request(deps, msg.chat_id, &mut state, &text).await
}

/// Store one preference field from free text. The success message is
/// only shown once the write actually landed; on a storage failure the
/// user stays in the input state and sees the save error instead.
async fn handle_field_input<C: MessageChannel, G: RecipeGenerator>(
    deps: &BotDeps<C, G>,
    chat_id: i64,
    state: &mut UserState,
    field: PrefField,
    text: &str,
) -> Result<()> {
    let l = &deps.locales;
    let value = normalize_field_input(text);

    let saved = {
        let conn = deps.conn.lock().await;
        db::get_user_preferences(&conn, state.user_id).and_then(|mut prefs| {
            match field {
                PrefField::Goal => prefs.goal = value.clone(),
                PrefField::Allergies => prefs.allergies = value.clone(),
                PrefField::Likes => prefs.likes = value.clone(),
                PrefField::Dislikes => prefs.dislikes = value.clone(),
            }
            db::save_user_preferences(&conn, &prefs)
        })
    };

    match saved {
        Ok(()) => {
            let (success, keyboard, next) = match field {
                PrefField::Goal => (
                    l.goal_menu.success.clone(),
                    ui_builder::settings_back_keyboard(l),
                    ChatState::Settings,
                ),
                PrefField::Allergies => (
                    l.allergies_menu.success.clone(),
                    ui_builder::settings_back_keyboard(l),
                    ChatState::Settings,
                ),
                PrefField::Likes => (
                    l.likes_menu.success.clone(),
                    ui_builder::habits_back_keyboard(l),
                    ChatState::SettingsHabits,
                ),
                PrefField::Dislikes => (
                    l.dislikes_menu.success.clone(),
                    ui_builder::habits_back_keyboard(l),
                    ChatState::SettingsHabits,
                ),
            };
            renderer::show_screen(deps, chat_id, state, next, &success, keyboard).await
        }
        Err(e) => {
            error!("Failed to save {:?} for user {}: {e}", field, state.user_id);
            let keyboard = ui_builder::settings_back_keyboard(l);
            let current = state.current_state;
            renderer::show_screen(deps, chat_id, state, current, &l.notices.save_failed, keyboard)
                .await
        }
    }
}

/// Free text outside an input state asks for a recipe. The reply arrives
/// as a fresh message that first shows an interim notice and is then
/// edited into the result; that message becomes the new menu anchor.
async fn handle_recipe_request<C: MessageChannel, G: RecipeGenerator>(
    deps: &BotDeps<C, G>,
    chat_id: i64,
    state: &mut UserState,
    request: &str,
) -> Result<()> {
    let l = &deps.locales;

    // A rate-limit store failure never blocks the user.
    let allowed = {
        let conn = deps.conn.lock().await;
        match db::check_rate_limit(&conn, state.user_id) {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!("Rate limit check failed for user {}: {e}", state.user_id);
                true
            }
        }
    };
    if !allowed {
        info!("User {} is rate limited", state.user_id);
        deps.channel
            .send(chat_id, &l.notices.rate_limited, None)
            .await?;
        return Ok(());
    }

    let interim_id = deps
        .channel
        .send(chat_id, &l.notices.generating, None)
        .await?;

    let prefs = {
        let conn = deps.conn.lock().await;
        db::get_user_preferences(&conn, state.user_id).unwrap_or_else(|e| {
            warn!("Failed to load preferences for user {}: {e}", state.user_id);
            crate::state::UserPreferences::new(state.user_id)
        })
    };

    info!("Generating recipe for user {} ({} chars request)", state.user_id, request.len());
    let reply = match deps.generator.generate(request, &prefs).await {
        Ok(recipe) => recipe,
        Err(e) => {
            error!("Recipe generation failed for user {}: {e}", state.user_id);
            l.notices.generation_failed.clone()
        }
    };

    let keyboard = ui_builder::help_keyboard(l);
    let final_id = match deps
        .channel
        .edit(chat_id, interim_id, &reply, Some(keyboard.clone()))
        .await
    {
        Ok(()) => interim_id,
        Err(e) => {
            debug!("Edit of interim message {interim_id} failed, sending fresh: {e}");
            deps.channel.send(chat_id, &reply, Some(keyboard)).await?
        }
    };

    if state.current_state != ChatState::Main {
        state.state_history.push(state.current_state);
    }
    state.current_state = ChatState::Main;
    state.last_message_id = Some(final_id);
    let conn = deps.conn.lock().await;
    if let Err(e) = db::save_user_state(&conn, state) {
        warn!("Failed to persist state for user {}: {e}", state.user_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(parse_command("/start"), Some(Command::Start));
        assert_eq!(parse_command("/settings"), Some(Command::Settings));
        assert_eq!(parse_command("/help"), Some(Command::Help));
        assert_eq!(parse_command("  /start  "), Some(Command::Start));
        assert_eq!(parse_command("/START"), Some(Command::Start));
    }

    #[test]
    fn test_parse_command_strips_bot_mention() {
        assert_eq!(parse_command("/start@neurochef_bot"), Some(Command::Start));
        assert_eq!(parse_command("/help@SomeBot"), Some(Command::Help));
    }

    #[test]
    fn test_non_commands_are_not_commands() {
        assert_eq!(parse_command("быстрый ужин"), None);
        assert_eq!(parse_command("/unknown"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("start"), None);
    }

    #[test]
    fn test_input_states_map_to_fields() {
        assert!(input_field(ChatState::SettingsGoal).is_some());
        assert!(input_field(ChatState::SettingsAllergies).is_some());
        assert!(input_field(ChatState::SettingsHabitsLikes).is_some());
        assert!(input_field(ChatState::SettingsHabitsDislikes).is_some());
        assert!(input_field(ChatState::Main).is_none());
        assert!(input_field(ChatState::SettingsDiet).is_none());
        assert!(input_field(ChatState::SettingsClearConfirm).is_none());
    }
}
