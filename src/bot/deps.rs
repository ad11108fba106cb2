//! Shared handler dependencies, threaded through the dispatcher as one
//! `Arc`.

use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::bot::channel::MessageChannel;
use crate::gigachat::RecipeGenerator;
use crate::locales::Locales;

pub struct BotDeps<C: MessageChannel, G: RecipeGenerator> {
    pub channel: C,
    pub conn: Arc<Mutex<Connection>>,
    pub generator: G,
    pub locales: Arc<Locales>,
    // One lock per user so their events apply strictly in order while
    // different users proceed in parallel.
    user_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl<C: MessageChannel, G: RecipeGenerator> BotDeps<C, G> {
    pub fn new(
        channel: C,
        conn: Arc<Mutex<Connection>>,
        generator: G,
        locales: Arc<Locales>,
    ) -> Self {
        Self {
            channel,
            conn,
            generator,
            locales,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Lock guarding all event handling for one user. The map only ever
    /// grows; entries are a single `Arc<Mutex<()>>` each.
    pub async fn user_lock(&self, user_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
