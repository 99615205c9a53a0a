// src/notify/telegram.rs

use crate::notify::{Notifier, NotifyError};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Telegram refuses messages longer than this many characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    base_url: String,
    client: Client,
}

#[derive(Serialize)]
struct SendMessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Result<Self, NotifyError> {
        if bot_token.trim().is_empty() {
            return Err(NotifyError::NotConfigured("TELEGRAM_BOT_TOKEN"));
        }
        if chat_id.trim().is_empty() {
            return Err(NotifyError::NotConfigured("TELEGRAM_CHAT_ID"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::RequestFailed(e.to_string()))?;

        Ok(Self {
            bot_token,
            chat_id,
            base_url: "https://api.telegram.org".to_string(),
            client,
        })
    }

    fn send_chunk(&self, text: &str) -> Result<(), NotifyError> {
        let payload = SendMessagePayload {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(format!("{}/bot{}/sendMessage", self.base_url, self.bot_token))
            .json(&payload)
            .send()
            .map_err(|e| NotifyError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response.text().unwrap_or_else(|_| "(no body)".to_string());

        let parsed: Option<TelegramResponse> = serde_json::from_str(&body).ok();
        match parsed {
            Some(r) if status.is_success() && r.ok => Ok(()),
            Some(r) => Err(NotifyError::Api(format!(
                "{status}: {}",
                r.description.unwrap_or(body)
            ))),
            None => Err(NotifyError::Api(format!("{status}: {body}"))),
        }
    }
}

impl Notifier for TelegramNotifier {
    fn send(&self, text: &str) -> Result<(), NotifyError> {
        let chunks = split_message(text, MAX_MESSAGE_CHARS);
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            self.send_chunk(chunk)?;
            tracing::debug!(part = i + 1, total, "telegram message sent");
        }
        Ok(())
    }
}

/// Splits on line boundaries so no chunk exceeds `max_chars`. A single line
/// longer than the limit is cut by characters.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len + line_len > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > max_chars {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
