//! Menu text table, deserialized from the bundled `locales/ru.json`.
//!
//! The table is constructed explicitly at startup and handed to the
//! dispatcher; nothing here is global state.

use anyhow::{Context, Result};
use serde::Deserialize;

const RU_JSON: &str = include_str!("../locales/ru.json");

#[derive(Debug, Clone, Deserialize)]
pub struct Locales {
    pub main_menu: MainMenu,
    pub settings_menu: SettingsMenu,
    pub diet_menu: DietMenu,
    pub goal_menu: InputMenu,
    pub allergies_menu: InputMenu,
    pub habits_menu: HabitsMenu,
    pub likes_menu: InputMenu,
    pub dislikes_menu: InputMenu,
    pub clear_confirm: ClearConfirm,
    pub clear_success: ClearSuccess,
    pub help: Help,
    pub notices: Notices,
    pub nav: Nav,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MainMenu {
    pub text: String,
    pub settings: String,
    pub help: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingsMenu {
    /// Contains a `{settings}` placeholder for the preference summary.
    pub text: String,
    pub fields: SettingsFields,
    pub buttons: SettingsButtons,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingsFields {
    pub diet: String,
    pub goal: String,
    pub allergies: String,
    pub habits: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingsButtons {
    pub diet: String,
    pub goal: String,
    pub allergies: String,
    pub habits: String,
    pub clear: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DietMenu {
    pub text: String,
    pub options: DietOptions,
    /// Contains a `{diet}` placeholder for the chosen label.
    pub success: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DietOptions {
    pub none: String,
    pub lose: String,
    pub gain: String,
}

/// A free-text prompt screen (goal, allergies, likes, dislikes).
#[derive(Debug, Clone, Deserialize)]
pub struct InputMenu {
    pub text: String,
    pub success: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HabitsMenu {
    pub text: String,
    pub likes: String,
    pub dislikes: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClearConfirm {
    pub text: String,
    pub yes: String,
    pub no: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClearSuccess {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Help {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Notices {
    pub generating: String,
    pub generation_failed: String,
    pub rate_limited: String,
    pub save_failed: String,
    pub not_set: String,
}

/// Shared navigation button labels.
#[derive(Debug, Clone, Deserialize)]
pub struct Nav {
    pub to_settings: String,
    pub to_main: String,
    pub to_habits: String,
}

impl Locales {
    /// Parse the bundled text table. Fails only on a malformed bundle,
    /// which is a packaging error and fatal at startup.
    pub fn load() -> Result<Self> {
        serde_json::from_str(RU_JSON).context("Failed to parse bundled locales/ru.json")
    }
}
