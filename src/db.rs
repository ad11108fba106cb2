use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension};

use crate::state::{ChatState, UserPreferences, UserState};

/// Requests admitted per rate-limit window.
pub const RATE_LIMIT_MAX_REQUESTS: i64 = 5;
/// Window length in seconds. The window is anchored at the first accepted
/// request, so a burst straddling the boundary can admit up to twice the
/// nominal rate. Accepted approximation.
pub const RATE_LIMIT_WINDOW_SECS: i64 = 60;

/// Oldest history entries are dropped past this bound so the row cannot
/// grow without limit.
const STATE_HISTORY_CAP: usize = 50;

/// Initialize the database schema
pub fn init_database_schema(conn: &Connection) -> Result<()> {
    info!("Initializing database schema...");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS user_states (
            user_id INTEGER PRIMARY KEY,
            current_state TEXT NOT NULL,
            last_message_id INTEGER,
            input_buffer TEXT NOT NULL DEFAULT '',
            state_history TEXT NOT NULL DEFAULT '[]'
        )",
        [],
    )
    .context("Failed to create user_states table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS user_preferences (
            user_id INTEGER PRIMARY KEY,
            dietary_type TEXT NOT NULL DEFAULT '',
            goal TEXT NOT NULL DEFAULT '',
            allergies TEXT NOT NULL DEFAULT '',
            likes TEXT NOT NULL DEFAULT '',
            dislikes TEXT NOT NULL DEFAULT ''
        )",
        [],
    )
    .context("Failed to create user_preferences table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS rate_limits (
            user_id INTEGER PRIMARY KEY,
            last_request_at TEXT NOT NULL,
            request_count INTEGER NOT NULL
        )",
        [],
    )
    .context("Failed to create rate_limits table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Load a user's conversation state. A missing row is not an error: it
/// decodes to the initial state (`Main`, empty history).
pub fn get_user_state(conn: &Connection, user_id: i64) -> Result<UserState> {
    let row = conn
        .query_row(
            "SELECT current_state, last_message_id, input_buffer, state_history
             FROM user_states WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<i32>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()
        .context("Failed to read user state")?;

    let Some((current, last_message_id, input_buffer, history_json)) = row else {
        return Ok(UserState::new(user_id));
    };

    let state_history: Vec<ChatState> = serde_json::from_str(&history_json).unwrap_or_else(|e| {
        warn!("Discarding unreadable state history for user {user_id}: {e}");
        Vec::new()
    });

    Ok(UserState {
        user_id,
        current_state: ChatState::parse(&current),
        last_message_id,
        input_buffer,
        state_history,
    })
}

/// Upsert a user's conversation state.
pub fn save_user_state(conn: &Connection, state: &UserState) -> Result<()> {
    let mut history = state.state_history.clone();
    if history.len() > STATE_HISTORY_CAP {
        history.drain(..history.len() - STATE_HISTORY_CAP);
    }
    let history_json =
        serde_json::to_string(&history).context("Failed to encode state history")?;

    conn.execute(
        "INSERT INTO user_states (user_id, current_state, last_message_id, input_buffer, state_history)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_id) DO UPDATE SET
            current_state = excluded.current_state,
            last_message_id = excluded.last_message_id,
            input_buffer = excluded.input_buffer,
            state_history = excluded.state_history",
        params![
            state.user_id,
            state.current_state.as_str(),
            state.last_message_id,
            state.input_buffer,
            history_json,
        ],
    )
    .context("Failed to save user state")?;

    Ok(())
}

/// Load a user's preferences. A missing row yields all-empty fields.
pub fn get_user_preferences(conn: &Connection, user_id: i64) -> Result<UserPreferences> {
    let prefs = conn
        .query_row(
            "SELECT dietary_type, goal, allergies, likes, dislikes
             FROM user_preferences WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(UserPreferences {
                    user_id,
                    dietary_type: row.get(0)?,
                    goal: row.get(1)?,
                    allergies: row.get(2)?,
                    likes: row.get(3)?,
                    dislikes: row.get(4)?,
                })
            },
        )
        .optional()
        .context("Failed to read user preferences")?;

    Ok(prefs.unwrap_or_else(|| UserPreferences::new(user_id)))
}

/// Upsert a user's preferences. All five fields are written
/// unconditionally; there is no partial update.
pub fn save_user_preferences(conn: &Connection, prefs: &UserPreferences) -> Result<()> {
    conn.execute(
        "INSERT INTO user_preferences (user_id, dietary_type, goal, allergies, likes, dislikes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(user_id) DO UPDATE SET
            dietary_type = excluded.dietary_type,
            goal = excluded.goal,
            allergies = excluded.allergies,
            likes = excluded.likes,
            dislikes = excluded.dislikes",
        params![
            prefs.user_id,
            prefs.dietary_type,
            prefs.goal,
            prefs.allergies,
            prefs.likes,
            prefs.dislikes,
        ],
    )
    .context("Failed to save user preferences")?;

    Ok(())
}

/// Reset all preference fields to empty. Succeeds whether or not a row
/// previously existed, and is idempotent.
pub fn clear_user_preferences(conn: &Connection, user_id: i64) -> Result<()> {
    save_user_preferences(conn, &UserPreferences::new(user_id))
}

/// Fixed-window rate limiting: returns `true` when the request is
/// admitted. A denied request does not mutate the record.
pub fn check_rate_limit(conn: &Connection, user_id: i64) -> Result<bool> {
    check_rate_limit_at(conn, user_id, Utc::now())
}

/// Same as [`check_rate_limit`] with an explicit clock, for tests.
pub fn check_rate_limit_at(conn: &Connection, user_id: i64, now: DateTime<Utc>) -> Result<bool> {
    let row = conn
        .query_row(
            "SELECT last_request_at, request_count FROM rate_limits WHERE user_id = ?1",
            params![user_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()
        .context("Failed to read rate limit record")?;

    let Some((last_at, count)) = row else {
        conn.execute(
            "INSERT INTO rate_limits (user_id, last_request_at, request_count) VALUES (?1, ?2, 1)",
            params![user_id, now.to_rfc3339()],
        )
        .context("Failed to create rate limit record")?;
        return Ok(true);
    };

    // An unparsable timestamp counts as an expired window.
    let window_start = DateTime::parse_from_rfc3339(&last_at)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    if now - window_start > Duration::seconds(RATE_LIMIT_WINDOW_SECS) {
        conn.execute(
            "UPDATE rate_limits SET last_request_at = ?2, request_count = 1 WHERE user_id = ?1",
            params![user_id, now.to_rfc3339()],
        )
        .context("Failed to reset rate limit window")?;
        return Ok(true);
    }

    if count >= RATE_LIMIT_MAX_REQUESTS {
        return Ok(false);
    }

    conn.execute(
        "UPDATE rate_limits SET request_count = request_count + 1 WHERE user_id = ?1",
        params![user_id],
    )
    .context("Failed to increment rate limit count")?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn setup_test_db() -> Result<(Connection, NamedTempFile)> {
        let temp_file = NamedTempFile::new()?;
        let conn = Connection::open(temp_file.path())?;
        init_database_schema(&conn)?;
        Ok((conn, temp_file))
    }

    #[test]
    fn test_get_user_state_missing_row_yields_defaults() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        let state = get_user_state(&conn, 12345)?;

        assert_eq!(state, UserState::new(12345));
        Ok(())
    }

    #[test]
    fn test_save_and_reload_user_state() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        let state = UserState {
            user_id: 12345,
            current_state: ChatState::SettingsGoal,
            last_message_id: Some(777),
            input_buffer: "хочу пасту".to_string(),
            state_history: vec![ChatState::Main, ChatState::Settings],
        };
        save_user_state(&conn, &state)?;

        let loaded = get_user_state(&conn, 12345)?;
        assert_eq!(loaded, state);
        Ok(())
    }

    #[test]
    fn test_save_user_state_is_upsert() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        let mut state = UserState::new(1);
        save_user_state(&conn, &state)?;

        state.current_state = ChatState::Settings;
        state.last_message_id = Some(9);
        save_user_state(&conn, &state)?;

        let loaded = get_user_state(&conn, 1)?;
        assert_eq!(loaded.current_state, ChatState::Settings);
        assert_eq!(loaded.last_message_id, Some(9));

        // Still exactly one row for the user.
        let rows: i64 = conn.query_row(
            "SELECT COUNT(*) FROM user_states WHERE user_id = 1",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(rows, 1);
        Ok(())
    }

    #[test]
    fn test_state_history_is_capped() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        let mut state = UserState::new(2);
        for _ in 0..200 {
            state.state_history.push(ChatState::Settings);
        }
        state.state_history.push(ChatState::Help);
        save_user_state(&conn, &state)?;

        let loaded = get_user_state(&conn, 2)?;
        assert_eq!(loaded.state_history.len(), STATE_HISTORY_CAP);
        // Newest entries survive the trim.
        assert_eq!(*loaded.state_history.last().unwrap(), ChatState::Help);
        Ok(())
    }

    #[test]
    fn test_corrupt_state_history_is_discarded() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        conn.execute(
            "INSERT INTO user_states (user_id, current_state, state_history)
             VALUES (3, 'settings', 'not json')",
            [],
        )?;

        let loaded = get_user_state(&conn, 3)?;
        assert_eq!(loaded.current_state, ChatState::Settings);
        assert!(loaded.state_history.is_empty());
        Ok(())
    }

    #[test]
    fn test_get_user_preferences_missing_row_yields_empty() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        let prefs = get_user_preferences(&conn, 12345)?;

        assert!(prefs.is_empty());
        assert_eq!(prefs.user_id, 12345);
        Ok(())
    }

    #[test]
    fn test_save_and_reload_user_preferences() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        let prefs = UserPreferences {
            user_id: 12345,
            dietary_type: "Похудение".to_string(),
            goal: "минус 5 кг".to_string(),
            allergies: "орехи".to_string(),
            likes: "курица".to_string(),
            dislikes: "брокколи".to_string(),
        };
        save_user_preferences(&conn, &prefs)?;

        let loaded = get_user_preferences(&conn, 12345)?;
        assert_eq!(loaded, prefs);
        Ok(())
    }

    #[test]
    fn test_save_user_preferences_overwrites_all_fields() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        let mut prefs = UserPreferences::new(5);
        prefs.goal = "набрать массу".to_string();
        prefs.likes = "рис".to_string();
        save_user_preferences(&conn, &prefs)?;

        // A second save with only the goal set wipes likes too: full-row
        // upsert, no partial update.
        let mut updated = UserPreferences::new(5);
        updated.goal = "сушка".to_string();
        save_user_preferences(&conn, &updated)?;

        let loaded = get_user_preferences(&conn, 5)?;
        assert_eq!(loaded.goal, "сушка");
        assert_eq!(loaded.likes, "");
        Ok(())
    }

    #[test]
    fn test_clear_user_preferences_without_prior_row() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        clear_user_preferences(&conn, 999)?;

        let prefs = get_user_preferences(&conn, 999)?;
        assert!(prefs.is_empty());
        Ok(())
    }

    #[test]
    fn test_clear_user_preferences_is_idempotent() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        let mut prefs = UserPreferences::new(6);
        prefs.dietary_type = "Обычное".to_string();
        prefs.allergies = "молоко".to_string();
        save_user_preferences(&conn, &prefs)?;

        clear_user_preferences(&conn, 6)?;
        assert!(get_user_preferences(&conn, 6)?.is_empty());

        clear_user_preferences(&conn, 6)?;
        assert!(get_user_preferences(&conn, 6)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_rate_limit_first_request_allowed() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        let now = Utc::now();
        assert!(check_rate_limit_at(&conn, 1, now)?);
        Ok(())
    }

    #[test]
    fn test_rate_limit_sixth_request_in_window_denied() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        let start = Utc::now();
        for i in 0..5 {
            let at = start + Duration::seconds(i * 2);
            assert!(check_rate_limit_at(&conn, 1, at)?, "request {} should pass", i + 1);
        }
        assert!(!check_rate_limit_at(&conn, 1, start + Duration::seconds(10))?);
        Ok(())
    }

    #[test]
    fn test_rate_limit_denial_does_not_mutate_record() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        let start = Utc::now();
        for i in 0..5 {
            check_rate_limit_at(&conn, 1, start + Duration::seconds(i))?;
        }
        assert!(!check_rate_limit_at(&conn, 1, start + Duration::seconds(30))?);

        let count: i64 = conn.query_row(
            "SELECT request_count FROM rate_limits WHERE user_id = 1",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(count, RATE_LIMIT_MAX_REQUESTS);
        Ok(())
    }

    #[test]
    fn test_rate_limit_window_resets_after_gap() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        let start = Utc::now();
        for i in 0..5 {
            check_rate_limit_at(&conn, 1, start + Duration::seconds(i))?;
        }
        assert!(!check_rate_limit_at(&conn, 1, start + Duration::seconds(10))?);

        // 61 seconds after the window opened: admitted again, count back to 1.
        assert!(check_rate_limit_at(&conn, 1, start + Duration::seconds(61))?);

        let count: i64 = conn.query_row(
            "SELECT request_count FROM rate_limits WHERE user_id = 1",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(count, 1);
        Ok(())
    }

    #[test]
    fn test_rate_limit_is_per_user() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        let now = Utc::now();
        for i in 0..5 {
            check_rate_limit_at(&conn, 1, now + Duration::seconds(i))?;
        }
        assert!(!check_rate_limit_at(&conn, 1, now + Duration::seconds(10))?);
        // Another user is unaffected.
        assert!(check_rate_limit_at(&conn, 2, now + Duration::seconds(10))?);
        Ok(())
    }
}
