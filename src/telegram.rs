//! Telegram notification channel
//!
//! Push notifier with a /subscribe and /unsubscribe handshake over the
//! Telegram Bot API (sendMessage + getUpdates long-polling). A single chat
//! is subscribed at a time, last subscriber wins; notifications while
//! unsubscribed are dropped. When no credentials are configured the no-op
//! notifier stands in.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Long-poll timeout for getUpdates, in seconds.
const UPDATES_TIMEOUT_SECS: u64 = 50;

/// Delay before retrying after a failed getUpdates round.
const UPDATES_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Outbound notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message, best effort. Failures are logged, not returned;
    /// a broken channel must not stall the pipeline.
    async fn notify(&self, message: &str);
}

/// Null notifier used when no Telegram credentials are configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _message: &str) {}
}

/// Current notification recipient.
///
/// A single atomically-updated chat id; 0 means unsubscribed (Telegram
/// never assigns chat id 0). Written by the command loop, read by the
/// send path.
pub struct SubscriptionState {
    chat_id: AtomicI64,
}

impl SubscriptionState {
    pub fn new() -> Self {
        Self {
            chat_id: AtomicI64::new(0),
        }
    }

    /// Record the subscriber's chat. Last subscriber wins.
    pub fn subscribe(&self, chat_id: i64) {
        self.chat_id.store(chat_id, Ordering::SeqCst);
    }

    pub fn unsubscribe(&self) {
        self.chat_id.store(0, Ordering::SeqCst);
    }

    /// The subscribed chat, if any.
    pub fn current(&self) -> Option<i64> {
        match self.chat_id.load(Ordering::SeqCst) {
            0 => None,
            id => Some(id),
        }
    }
}

impl Default for SubscriptionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply one inbound command to the subscription state.
///
/// Returns the acknowledgement to send back, or None when the message is
/// not a command or the sender is filtered out by the allow-list.
fn handle_command(
    state: &SubscriptionState,
    allowed_username: Option<&str>,
    sender: Option<&str>,
    chat_id: i64,
    text: &str,
) -> Option<&'static str> {
    if let Some(allowed) = allowed_username {
        if sender != Some(allowed) {
            return None;
        }
    }

    match text {
        "/subscribe" => {
            state.subscribe(chat_id);
            Some("You are subscribed!")
        }
        "/unsubscribe" => {
            state.unsubscribe();
            Some("You are unsubscribed.")
        }
        _ => None,
    }
}

// Telegram Bot API wire types (only the fields this bot reads)

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    from: Option<User>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    #[serde(default)]
    username: Option<String>,
}

/// Telegram bot: sends notifications to the subscribed chat and runs the
/// inbound command loop.
pub struct TelegramBot {
    client: reqwest::Client,
    base_url: String,
    username: Option<String>,
    state: SubscriptionState,
}

impl TelegramBot {
    pub fn new(token: &str, username: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("https://api.telegram.org/bot{}", token),
            username,
            state: SubscriptionState::new(),
        }
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let url = format!("{}/sendMessage", self.base_url);
        let body = json!({ "chat_id": chat_id, "text": text });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to send Telegram message")?;

        if !response.status().is_success() {
            anyhow::bail!("Telegram sendMessage returned {}", response.status());
        }
        Ok(())
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let url = format!(
            "{}/getUpdates?timeout={}&offset={}",
            self.base_url, UPDATES_TIMEOUT_SECS, offset
        );

        let response: UpdatesResponse = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(UPDATES_TIMEOUT_SECS + 10))
            .send()
            .await
            .context("Failed to poll Telegram updates")?
            .json()
            .await
            .context("Failed to parse Telegram updates")?;

        if !response.ok {
            anyhow::bail!("Telegram getUpdates returned ok=false");
        }
        Ok(response.result)
    }

    /// Inbound command loop: long-polls getUpdates and applies
    /// /subscribe and /unsubscribe commands.
    pub async fn run_updates_loop(self: Arc<Self>) {
        let mut offset = 0i64;

        loop {
            let updates = match self.get_updates(offset).await {
                Ok(updates) => updates,
                Err(e) => {
                    warn!("Telegram updates poll failed: {:#}", e);
                    tokio::time::sleep(UPDATES_RETRY_DELAY).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);

                let message = match update.message {
                    Some(message) => message,
                    None => continue,
                };
                let text = match message.text.as_deref() {
                    Some(text) => text,
                    None => continue,
                };
                let sender = message.from.as_ref().and_then(|u| u.username.as_deref());

                if let Some(reply) = handle_command(
                    &self.state,
                    self.username.as_deref(),
                    sender,
                    message.chat.id,
                    text,
                ) {
                    info!("Telegram {} from chat {}", text, message.chat.id);
                    if let Err(e) = self.send_message(message.chat.id, reply).await {
                        warn!("Failed to acknowledge command: {:#}", e);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Notifier for TelegramBot {
    async fn notify(&self, message: &str) {
        let chat_id = match self.state.current() {
            Some(chat_id) => chat_id,
            // Nobody subscribed: drop silently
            None => return,
        };

        if let Err(e) = self.send_message(chat_id, message).await {
            warn!("Failed to deliver notification: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_state_initial() {
        let state = SubscriptionState::new();
        assert_eq!(state.current(), None);
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let state = SubscriptionState::new();

        assert_eq!(
            handle_command(&state, None, Some("alice"), 42, "/subscribe"),
            Some("You are subscribed!")
        );
        assert_eq!(state.current(), Some(42));

        assert_eq!(
            handle_command(&state, None, Some("alice"), 42, "/unsubscribe"),
            Some("You are unsubscribed.")
        );
        assert_eq!(state.current(), None);
    }

    #[test]
    fn test_last_subscriber_wins() {
        let state = SubscriptionState::new();
        handle_command(&state, None, Some("alice"), 42, "/subscribe");
        handle_command(&state, None, Some("bob"), 99, "/subscribe");
        assert_eq!(state.current(), Some(99));
    }

    #[test]
    fn test_username_filter_ignores_others() {
        let state = SubscriptionState::new();

        assert_eq!(
            handle_command(&state, Some("alice"), Some("mallory"), 13, "/subscribe"),
            None
        );
        assert_eq!(state.current(), None);

        // Missing username is also filtered
        assert_eq!(
            handle_command(&state, Some("alice"), None, 13, "/subscribe"),
            None
        );

        assert_eq!(
            handle_command(&state, Some("alice"), Some("alice"), 13, "/subscribe"),
            Some("You are subscribed!")
        );
        assert_eq!(state.current(), Some(13));
    }

    #[test]
    fn test_non_command_text_ignored() {
        let state = SubscriptionState::new();
        assert_eq!(handle_command(&state, None, Some("alice"), 42, "hello"), None);
        assert_eq!(state.current(), None);
    }

    #[test]
    fn test_parse_updates_response() {
        let json = r#"{
            "ok": true,
            "result": [
                {
                    "update_id": 7,
                    "message": {
                        "chat": { "id": 42 },
                        "from": { "username": "alice" },
                        "text": "/subscribe"
                    }
                }
            ]
        }"#;
        let response: UpdatesResponse = serde_json::from_str(json).unwrap();
        assert!(response.ok);
        assert_eq!(response.result.len(), 1);
        assert_eq!(response.result[0].update_id, 7);
        let message = response.result[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, 42);
        assert_eq!(message.text.as_deref(), Some("/subscribe"));
    }
}
