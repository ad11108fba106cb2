//! Conversation state model: the per-user FSM state enum, the persisted
//! state row, and the stored dietary preferences.

use serde::{Deserialize, Serialize};

/// The flat set of conversation states a user can be in.
///
/// `Generating` is transient: it exists for the duration of one recipe
/// request (the user's events are serialized for that span) and is never
/// written to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatState {
    Main,
    Help,
    Settings,
    SettingsDiet,
    SettingsGoal,
    SettingsAllergies,
    SettingsHabits,
    SettingsHabitsLikes,
    SettingsHabitsDislikes,
    SettingsClearConfirm,
    Generating,
}

impl ChatState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatState::Main => "main",
            ChatState::Help => "help",
            ChatState::Settings => "settings",
            ChatState::SettingsDiet => "settings_diet",
            ChatState::SettingsGoal => "settings_goal",
            ChatState::SettingsAllergies => "settings_allergies",
            ChatState::SettingsHabits => "settings_habits",
            ChatState::SettingsHabitsLikes => "settings_habits_likes",
            ChatState::SettingsHabitsDislikes => "settings_habits_dislikes",
            ChatState::SettingsClearConfirm => "settings_clear_confirm",
            ChatState::Generating => "generating",
        }
    }

    /// Decode a stored state string. Unknown values fall back to `Main`
    /// rather than failing: a corrupted row should never wedge a user.
    pub fn parse(s: &str) -> ChatState {
        match s {
            "help" => ChatState::Help,
            "settings" => ChatState::Settings,
            "settings_diet" => ChatState::SettingsDiet,
            "settings_goal" => ChatState::SettingsGoal,
            "settings_allergies" => ChatState::SettingsAllergies,
            "settings_habits" => ChatState::SettingsHabits,
            "settings_habits_likes" => ChatState::SettingsHabitsLikes,
            "settings_habits_dislikes" => ChatState::SettingsHabitsDislikes,
            "settings_clear_confirm" => ChatState::SettingsClearConfirm,
            "generating" => ChatState::Generating,
            _ => ChatState::Main,
        }
    }
}

/// State the dispatcher lands in after a given inline-button press.
///
/// The mapping is a fixed tree and does not depend on the current state,
/// which is what makes button navigation deterministic. Returns `None`
/// for unknown callback data (ignored by the dispatcher).
pub fn callback_target(data: &str) -> Option<ChatState> {
    match data {
        "menu:main" => Some(ChatState::Main),
        "menu:help" => Some(ChatState::Help),
        "menu:settings" => Some(ChatState::Settings),
        "menu:diet" => Some(ChatState::SettingsDiet),
        "menu:goal" => Some(ChatState::SettingsGoal),
        "menu:allergies" => Some(ChatState::SettingsAllergies),
        "menu:habits" => Some(ChatState::SettingsHabits),
        "menu:likes" => Some(ChatState::SettingsHabitsLikes),
        "menu:dislikes" => Some(ChatState::SettingsHabitsDislikes),
        "menu:clear" => Some(ChatState::SettingsClearConfirm),
        "diet:none" | "diet:lose" | "diet:gain" => Some(ChatState::Settings),
        "clear:yes" | "clear:no" => Some(ChatState::Settings),
        _ => None,
    }
}

/// Per-user conversation state as persisted in `user_states`.
#[derive(Debug, Clone, PartialEq)]
pub struct UserState {
    pub user_id: i64,
    pub current_state: ChatState,
    /// Id of the last menu message the bot rendered, used for
    /// edit-in-place. `None` before the first render.
    pub last_message_id: Option<i32>,
    /// Free text captured while awaiting structured input. Stored but not
    /// currently consumed.
    pub input_buffer: String,
    /// Previously visited states, oldest first. Collected for a future
    /// back-navigation feature; nothing reads it yet.
    pub state_history: Vec<ChatState>,
}

impl UserState {
    /// Initial state for a user with no stored row.
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            current_state: ChatState::Main,
            last_message_id: None,
            input_buffer: String::new(),
            state_history: Vec::new(),
        }
    }
}

/// Dietary preferences as persisted in `user_preferences`.
/// Empty string means "unset" for every field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPreferences {
    pub user_id: i64,
    pub dietary_type: String,
    pub goal: String,
    pub allergies: String,
    pub likes: String,
    pub dislikes: String,
}

impl UserPreferences {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.dietary_type.is_empty()
            && self.goal.is_empty()
            && self.allergies.is_empty()
            && self.likes.is_empty()
            && self.dislikes.is_empty()
    }
}

/// Normalize free-text preference input: trim whitespace, and map the
/// clearing tokens ("no" / "нет", any letter case) to the empty string.
pub fn normalize_field_input(text: &str) -> String {
    let trimmed = text.trim();
    let lowered = trimmed.to_lowercase();
    if lowered == "no" || lowered == "нет" {
        String::new()
    } else {
        trimmed.to_string()
    }
}
