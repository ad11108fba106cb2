//! GigaChat recipe generation client: OAuth client-credentials token
//! acquisition with cached expiry, and a single chat-completion call per
//! recipe request.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{error, info};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tokio::sync::Mutex;

use crate::state::UserPreferences;

const OAUTH_URL: &str = "https://ngw.devices.sberbank.ru:9443/api/v2/oauth";
const API_URL: &str = "https://gigachat.devices.sberbank.ru/api/v1/chat/completions";
const MODEL: &str = "GigaChat";

/// Outbound request timeout. The generation call blocks the handling task
/// for its full round trip.
const REQUEST_TIMEOUT_SECS: u64 = 90;
/// Tokens are refreshed this long before their reported expiry.
const TOKEN_EXPIRY_SKEW_SECS: i64 = 60;

/// Produces recipe prose from a free-text request plus resolved
/// preferences. The dispatcher treats failures as opaque.
#[async_trait]
pub trait RecipeGenerator: Send + Sync {
    async fn generate(&self, request: &str, prefs: &UserPreferences) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    /// Lifetime in seconds.
    #[serde(default)]
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && now < self.expires_at
    }
}

pub struct GigaChatClient {
    client_id: String,
    client_secret: String,
    scope: String,
    http: reqwest::Client,
    // Guards token refresh so concurrent requests cannot storm /oauth.
    token: Mutex<Option<CachedToken>>,
}

impl GigaChatClient {
    pub fn new(client_id: String, client_secret: String, scope: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            // The Sber endpoint presents a certificate chain that stock
            // roots do not validate.
            .danger_accept_invalid_certs(true)
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client_id,
            client_secret,
            scope,
            http,
            token: Mutex::new(None),
        })
    }

    /// Return a cached access token, fetching a fresh one when missing,
    /// expired, or `force_refresh` is set (after a 401).
    async fn access_token(&self, force_refresh: bool) -> Result<String> {
        let mut cached = self.token.lock().await;

        if !force_refresh {
            if let Some(token) = cached.as_ref() {
                if token.is_valid(Utc::now()) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let rq_uid = new_request_id();
        info!("Requesting GigaChat access token (RqUID={rq_uid})");

        let resp = self
            .http
            .post(OAUTH_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header("RqUID", &rq_uid)
            .form(&[("scope", self.scope.as_str())])
            .send()
            .await
            .context("OAuth request failed")?;

        let status = resp.status();
        let body = resp.text().await.context("Failed to read OAuth response")?;
        if !status.is_success() {
            bail!("OAuth request failed with {status}: {body}");
        }

        let token: TokenResponse =
            serde_json::from_str(&body).context("Malformed OAuth response")?;
        if token.access_token.is_empty() {
            bail!("OAuth response carried an empty access_token");
        }

        let skewed = (token.expires_in - TOKEN_EXPIRY_SKEW_SECS).max(0);
        let fresh = CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now() + Duration::seconds(skewed),
        };
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);

        info!("GigaChat access token refreshed, valid for {}s", token.expires_in);
        Ok(access_token)
    }
}

#[async_trait]
impl RecipeGenerator for GigaChatClient {
    async fn generate(&self, request: &str, prefs: &UserPreferences) -> Result<String> {
        let system_prompt = build_system_prompt(prefs);
        let chat_request = ChatRequest {
            model: MODEL,
            messages: vec![
                ChatMessage { role: "system", content: &system_prompt },
                ChatMessage { role: "user", content: request },
            ],
        };

        // At most two attempts: the second runs with a force-refreshed
        // token after a 401. No recursion.
        let mut force_refresh = false;
        loop {
            let token = self.access_token(force_refresh).await?;

            let resp = self
                .http
                .post(API_URL)
                .bearer_auth(&token)
                .header("Accept", "application/json")
                .header("RqUID", new_request_id())
                .header("X-Client-ID", &self.client_id)
                .header("X-Request-ID", new_request_id())
                .header("X-Session-ID", new_session_id())
                .json(&chat_request)
                .send()
                .await
                .context("Chat completion request failed")?;

            let status = resp.status();
            if status == StatusCode::UNAUTHORIZED && !force_refresh {
                info!("Chat completion returned 401, refreshing access token");
                force_refresh = true;
                continue;
            }

            let body = resp
                .text()
                .await
                .context("Failed to read chat completion response")?;
            if !status.is_success() {
                bail!("Chat completion failed with {status}: {body}");
            }

            let parsed: ChatResponse =
                serde_json::from_str(&body).context("Malformed chat completion response")?;

            if let Some(api_error) = parsed.error {
                if !api_error.message.is_empty() {
                    error!(
                        "GigaChat reported an error: {} (type: {})",
                        api_error.message, api_error.kind
                    );
                    bail!("Model error: {}", api_error.message);
                }
            }

            let content = parsed
                .choices
                .into_iter()
                .next()
                .context("Chat completion returned no choices")?
                .message
                .content;
            if content.is_empty() {
                bail!("Chat completion returned empty content");
            }

            info!("Generated recipe of {} characters", content.len());
            return Ok(content);
        }
    }
}

/// Build the system prompt from the user's preferences. Falls back to a
/// generic "everyday cooking" profile when nothing is set.
pub fn build_system_prompt(prefs: &UserPreferences) -> String {
    let mut prompt = String::from(
        "Ты — профессиональный шеф-повар и нутрициолог. \
         Составь реально выполнимый, безопасный и сбалансированный рецепт \
         под запрос пользователя.\n\n\
         Правила:\n\
         1. Строго исключи ингредиенты из списков аллергий и нелюбимого.\n\
         2. Любимые продукты приоритетны при выборе блюда и замен.\n\
         3. Учитывай тип питания и цель при балансе КБЖУ.\n\n",
    );

    if prefs.is_empty() {
        prompt.push_str(
            "Настройки пользователя не заданы. Готовь в духе здорового \
             повседневного питания: бюджетно, быстро, без экзотики, \
             с упором на сытость и энергию.\n",
        );
    } else {
        let or_unset = |value: &str, fallback: &str| -> String {
            if value.is_empty() {
                fallback.to_string()
            } else {
                value.to_string()
            }
        };

        let _ = write!(
            prompt,
            "Параметры пользователя:\n\
             - Тип питания: {}\n\
             - Цель: {}\n\
             - Аллергии и непереносимости: {}\n\
             - Избегать: {}\n\
             - Любит: {}\n",
            or_unset(&prefs.dietary_type, "не указан"),
            or_unset(&prefs.goal, "не указана"),
            or_unset(&prefs.allergies, "нет"),
            or_unset(&prefs.dislikes, "ничего"),
            or_unset(&prefs.likes, "не указано"),
        );
    }

    prompt.push_str(
        "\nФормат ответа (Markdown):\n\
         *Название блюда*\n\
         _Почему оно подходит под цель и тип питания_\n\
         *⏱ Время:* X мин, *🔥 Сложность:* легко/средне/сложно, *🍽 Порций:* 1–2\n\
         *Ингредиенты* — нумерованный список с количествами\n\
         *Пошаговый рецепт* — нумерованные шаги\n\
         *💡 Шеф-совет* — один практичный лайфхак\n\
         Пищевая ценность на порцию: ккал, белки, жиры, углеводы.\n",
    );

    if !prefs.allergies.is_empty() || !prefs.dislikes.is_empty() {
        prompt.push_str("\nЗапрещено упоминать, даже как альтернативу:\n");
        if !prefs.allergies.is_empty() {
            let _ = writeln!(prompt, "- {}", prefs.allergies);
        }
        if !prefs.dislikes.is_empty() {
            let _ = writeln!(prompt, "- {}", prefs.dislikes);
        }
    }

    prompt
}

/// Timestamp-based session marker for the X-Session-ID header.
fn new_session_id() -> String {
    format!("sess-{}", Utc::now().format("%Y%m%dT%H%M%SZ"))
}

/// Random UUIDv4 string for the RqUID / X-Request-ID headers.
fn new_request_id() -> String {
    let mut bytes: [u8; 16] = rand::random();
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let hex = |slice: &[u8]| -> String {
        slice.iter().map(|b| format!("{b:02x}")).collect()
    };
    format!(
        "{}-{}-{}-{}-{}",
        hex(&bytes[0..4]),
        hex(&bytes[4..6]),
        hex(&bytes[6..8]),
        hex(&bytes[8..10]),
        hex(&bytes[10..16]),
    )
}
