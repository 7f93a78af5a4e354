//! Telegram Bot API client.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::TelegramError;
use super::types::{
    ApiResponse, InlineKeyboardMarkup, LabeledPrice, Message, Update,
};

/// Bot API origin.
const API_BASE: &str = "https://api.telegram.org";

/// Client for the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    token: SecretString,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    #[must_use]
    pub fn new(token: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
        }
    }

    /// Call one Bot API method.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &impl Serialize,
    ) -> Result<T, TelegramError> {
        let url = format!("{API_BASE}/bot{}/{method}", self.token.expose_secret());
        let response: ApiResponse<T> = self
            .client
            .post(url)
            .json(body)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            let description = response
                .description
                .unwrap_or_else(|| "unknown error".to_owned());
            tracing::error!(method = %method, error = %description, "Bot API error");
            return Err(TelegramError::Api(description));
        }

        response
            .result
            .ok_or_else(|| TelegramError::Api("ok response without result".to_owned()))
    }

    /// Long-poll for updates past `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        self.call(
            "getUpdates",
            &serde_json::json!({ "offset": offset, "timeout": timeout_secs }),
        )
        .await
    }

    /// Send a text message, optionally with an inline keyboard.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, text, reply_markup), fields(chat_id = chat_id))]
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<Message, TelegramError> {
        let mut body = serde_json::json!({ "chat_id": chat_id, "text": text });
        if let (Some(markup), Some(map)) = (reply_markup, body.as_object_mut()) {
            map.insert("reply_markup".to_owned(), serde_json::to_value(markup)?);
        }
        self.call("sendMessage", &body).await
    }

    /// Edit a previously sent message in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the message cannot be
    /// edited.
    #[instrument(skip(self, text, reply_markup), fields(chat_id = chat_id, message_id = message_id))]
    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });
        if let (Some(markup), Some(map)) = (reply_markup, body.as_object_mut()) {
            map.insert("reply_markup".to_owned(), serde_json::to_value(markup)?);
        }
        self.call::<serde_json::Value>("editMessageText", &body)
            .await
            .map(|_| ())
    }

    /// Delete a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is gone already or too old.
    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), TelegramError> {
        self.call::<serde_json::Value>(
            "deleteMessage",
            &serde_json::json!({ "chat_id": chat_id, "message_id": message_id }),
        )
        .await
        .map(|_| ())
    }

    /// Send a photo by URL with a caption and keyboard.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, caption, reply_markup), fields(chat_id = chat_id))]
    pub async fn send_photo(
        &self,
        chat_id: i64,
        photo_url: &str,
        caption: &str,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<Message, TelegramError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "photo": photo_url,
            "caption": caption,
        });
        if let (Some(markup), Some(map)) = (reply_markup, body.as_object_mut()) {
            map.insert("reply_markup".to_owned(), serde_json::to_value(markup)?);
        }
        self.call("sendPhoto", &body).await
    }

    /// Answer a callback query with a transient notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: &str,
    ) -> Result<(), TelegramError> {
        self.call::<serde_json::Value>(
            "answerCallbackQuery",
            &serde_json::json!({
                "callback_query_id": callback_query_id,
                "text": text,
                "show_alert": false,
            }),
        )
        .await
        .map(|_| ())
    }

    /// Send an itemized invoice.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(chat_id = chat_id))]
    pub async fn send_invoice(
        &self,
        chat_id: i64,
        title: &str,
        description: &str,
        payload: &str,
        provider_token: &SecretString,
        start_parameter: &str,
        currency: &str,
        prices: &[LabeledPrice],
    ) -> Result<Message, TelegramError> {
        debug!(lines = prices.len(), "sending invoice");
        self.call(
            "sendInvoice",
            &serde_json::json!({
                "chat_id": chat_id,
                "title": title,
                "description": description,
                "payload": payload,
                "provider_token": provider_token.expose_secret(),
                "start_parameter": start_parameter,
                "currency": currency,
                "prices": prices,
            }),
        )
        .await
    }

    /// Answer a pre-checkout query, approving or declining the charge.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn answer_pre_checkout_query(
        &self,
        pre_checkout_query_id: &str,
        ok: bool,
        error_message: Option<&str>,
    ) -> Result<(), TelegramError> {
        let mut body = serde_json::json!({
            "pre_checkout_query_id": pre_checkout_query_id,
            "ok": ok,
        });
        if let (Some(message), Some(map)) = (error_message, body.as_object_mut()) {
            map.insert(
                "error_message".to_owned(),
                serde_json::Value::String(message.to_owned()),
            );
        }
        self.call::<serde_json::Value>("answerPreCheckoutQuery", &body)
            .await
            .map(|_| ())
    }

    /// Share a map point.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn send_location(
        &self,
        chat_id: i64,
        latitude: f64,
        longitude: f64,
    ) -> Result<Message, TelegramError> {
        self.call(
            "sendLocation",
            &serde_json::json!({
                "chat_id": chat_id,
                "latitude": latitude,
                "longitude": longitude,
            }),
        )
        .await
    }
}
