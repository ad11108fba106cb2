//! Inline keyboard builders and the settings summary formatter. Every
//! screen's buttons are assembled here so layouts stay in one place.

use crate::bot::channel::{Button, Keyboard};
use crate::locales::Locales;
use crate::state::UserPreferences;

pub fn main_menu_keyboard(l: &Locales) -> Keyboard {
    vec![
        vec![Button::new(&l.main_menu.settings, "menu:settings")],
        vec![Button::new(&l.main_menu.help, "menu:help")],
    ]
}

pub fn settings_keyboard(l: &Locales) -> Keyboard {
    let b = &l.settings_menu.buttons;
    vec![
        vec![
            Button::new(&b.diet, "menu:diet"),
            Button::new(&b.goal, "menu:goal"),
        ],
        vec![
            Button::new(&b.allergies, "menu:allergies"),
            Button::new(&b.habits, "menu:habits"),
        ],
        vec![Button::new(&b.clear, "menu:clear")],
        vec![Button::new(&l.nav.to_main, "menu:main")],
    ]
}

pub fn diet_keyboard(l: &Locales) -> Keyboard {
    let o = &l.diet_menu.options;
    vec![
        vec![Button::new(&o.none, "diet:none")],
        vec![Button::new(&o.lose, "diet:lose")],
        vec![Button::new(&o.gain, "diet:gain")],
        vec![Button::new(&l.nav.to_settings, "menu:settings")],
    ]
}

pub fn habits_keyboard(l: &Locales) -> Keyboard {
    vec![
        vec![
            Button::new(&l.habits_menu.likes, "menu:likes"),
            Button::new(&l.habits_menu.dislikes, "menu:dislikes"),
        ],
        vec![Button::new(&l.nav.to_settings, "menu:settings")],
    ]
}

/// Back button under the free-text input prompts (goal, allergies).
pub fn settings_back_keyboard(l: &Locales) -> Keyboard {
    vec![vec![Button::new(&l.nav.to_settings, "menu:settings")]]
}

/// Back button under the likes/dislikes input prompts.
pub fn habits_back_keyboard(l: &Locales) -> Keyboard {
    vec![vec![Button::new(&l.nav.to_habits, "menu:habits")]]
}

pub fn clear_confirm_keyboard(l: &Locales) -> Keyboard {
    vec![
        vec![
            Button::new(&l.clear_confirm.yes, "clear:yes"),
            Button::new(&l.clear_confirm.no, "clear:no"),
        ],
    ]
}

pub fn help_keyboard(l: &Locales) -> Keyboard {
    vec![vec![Button::new(&l.nav.to_main, "menu:main")]]
}

/// Render the stored preferences block for the settings screen. Unset
/// fields show the `not_set` placeholder; likes and dislikes collapse
/// into one habits line.
pub fn format_settings_summary(l: &Locales, prefs: &UserPreferences) -> String {
    let f = &l.settings_menu.fields;
    let not_set = &l.notices.not_set;

    let show = |value: &str| -> String {
        if value.is_empty() {
            not_set.clone()
        } else {
            value.to_string()
        }
    };

    let habits = match (prefs.likes.is_empty(), prefs.dislikes.is_empty()) {
        (true, true) => not_set.clone(),
        (false, true) => format!("❤️ {}", prefs.likes),
        (true, false) => format!("👎 {}", prefs.dislikes),
        (false, false) => format!("❤️ {} / 👎 {}", prefs.likes, prefs.dislikes),
    };

    format!(
        "{}: {}\n{}: {}\n{}: {}\n{}: {}",
        f.diet,
        show(&prefs.dietary_type),
        f.goal,
        show(&prefs.goal),
        f.allergies,
        show(&prefs.allergies),
        f.habits,
        habits,
    )
}
