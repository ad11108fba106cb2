//! Inline-button press handling. Button data is a fixed vocabulary; the
//! resulting screen depends only on the button, never on where the user
//! was before.

use anyhow::Result;
use log::{debug, error, info};

use crate::bot::channel::{InboundCallback, MessageChannel};
use crate::bot::deps::BotDeps;
use crate::bot::renderer;
use crate::bot::ui_builder;
use crate::db;
use crate::gigachat::RecipeGenerator;
use crate::state::{callback_target, ChatState, UserState};

pub async fn handle_callback<C: MessageChannel, G: RecipeGenerator>(
    deps: &BotDeps<C, G>,
    cb: InboundCallback,
) -> Result<()> {
    let lock = deps.user_lock(cb.user_id).await;
    let _guard = lock.lock().await;

    // Every press is acked, known or not, so the client spinner stops.
    if let Err(e) = deps.channel.ack(&cb.id).await {
        debug!("Could not ack callback {}: {e}", cb.id);
    }

    // Unknown button data never loads state or touches the screen.
    if callback_target(&cb.data).is_none() {
        debug!("Ignoring unknown callback data {:?} from user {}", cb.data, cb.user_id);
        return Ok(());
    }

    let mut state = {
        let conn = deps.conn.lock().await;
        match db::get_user_state(&conn, cb.user_id) {
            Ok(state) => state,
            Err(e) => {
                error!("Failed to load state for user {}: {e}", cb.user_id);
                return Ok(());
            }
        }
    };

    // The pressed keyboard lives on a concrete message; anchor edits to
    // it in case the stored handle is stale.
    if let Some(msg_id) = cb.message_id {
        state.last_message_id = Some(msg_id);
    }

    match cb.data.as_str() {
        "menu:main" => renderer::render_main_menu(deps, cb.chat_id, &mut state).await,
        "menu:help" => renderer::render_help(deps, cb.chat_id, &mut state).await,
        "menu:settings" => renderer::render_settings(deps, cb.chat_id, &mut state).await,
        "menu:diet" => renderer::render_diet_menu(deps, cb.chat_id, &mut state).await,
        "menu:goal" => renderer::render_goal_input(deps, cb.chat_id, &mut state).await,
        "menu:allergies" => renderer::render_allergies_input(deps, cb.chat_id, &mut state).await,
        "menu:habits" => renderer::render_habits_menu(deps, cb.chat_id, &mut state).await,
        "menu:likes" => renderer::render_likes_input(deps, cb.chat_id, &mut state).await,
        "menu:dislikes" => renderer::render_dislikes_input(deps, cb.chat_id, &mut state).await,
        "menu:clear" => renderer::render_clear_confirm(deps, cb.chat_id, &mut state).await,
        "diet:none" | "diet:lose" | "diet:gain" => {
            handle_diet_choice(deps, cb.chat_id, &mut state, &cb.data).await
        }
        "clear:yes" => handle_clear(deps, cb.chat_id, &mut state).await,
        "clear:no" => renderer::render_settings(deps, cb.chat_id, &mut state).await,
        _ => Ok(()),
    }
}

/// Persist the chosen dietary type. The stored value is the visible
/// option label, so the settings summary and the prompt read the same.
async fn handle_diet_choice<C: MessageChannel, G: RecipeGenerator>(
    deps: &BotDeps<C, G>,
    chat_id: i64,
    state: &mut UserState,
    data: &str,
) -> Result<()> {
    let l = &deps.locales;
    let label = match data {
        "diet:lose" => l.diet_menu.options.lose.clone(),
        "diet:gain" => l.diet_menu.options.gain.clone(),
        _ => l.diet_menu.options.none.clone(),
    };

    let saved = {
        let conn = deps.conn.lock().await;
        db::get_user_preferences(&conn, state.user_id).and_then(|mut prefs| {
            prefs.dietary_type = label.clone();
            db::save_user_preferences(&conn, &prefs)
        })
    };

    match saved {
        Ok(()) => {
            info!("User {} set dietary type to {label:?}", state.user_id);
            let text = l.diet_menu.success.replace("{diet}", &label);
            let keyboard = ui_builder::settings_back_keyboard(l);
            renderer::show_screen(deps, chat_id, state, ChatState::Settings, &text, keyboard).await
        }
        Err(e) => {
            error!("Failed to save dietary type for user {}: {e}", state.user_id);
            let keyboard = ui_builder::settings_back_keyboard(l);
            let current = state.current_state;
            renderer::show_screen(deps, chat_id, state, current, &l.notices.save_failed, keyboard)
                .await
        }
    }
}

/// Confirmed reset: wipe the preference row, then report success. The
/// success screen only shows once the delete went through.
async fn handle_clear<C: MessageChannel, G: RecipeGenerator>(
    deps: &BotDeps<C, G>,
    chat_id: i64,
    state: &mut UserState,
) -> Result<()> {
    let l = &deps.locales;
    let cleared = {
        let conn = deps.conn.lock().await;
        db::clear_user_preferences(&conn, state.user_id)
    };

    match cleared {
        Ok(()) => {
            info!("User {} cleared all preferences", state.user_id);
            renderer::render_clear_success(deps, chat_id, state).await
        }
        Err(e) => {
            error!("Failed to clear preferences for user {}: {e}", state.user_id);
            let keyboard = ui_builder::settings_back_keyboard(l);
            let current = state.current_state;
            renderer::show_screen(deps, chat_id, state, current, &l.notices.save_failed, keyboard)
                .await
        }
    }
}
