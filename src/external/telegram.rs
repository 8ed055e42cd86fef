use crate::config::TelegramConfig;
use crate::error::{AppError, AppResult};
use crate::external::{Messenger, PhotoUpload};
use crate::models::telegram::{InlineKeyboardMarkup, TelegramFile, TelegramResponse};
use crate::utils::messages::CLAIM_BUTTON_TEXT;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde_json::json;

/// Telegram Bot API client.
#[derive(Clone)]
pub struct TelegramService {
    client: Client,
    config: TelegramConfig,
}

impl TelegramService {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.bot_token,
            file_path
        )
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> AppResult<T> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await?;
        let text = response.text().await?;
        parse_response(method, &text)
    }

    async fn call_multipart<T: DeserializeOwned>(&self, method: &str, form: Form) -> AppResult<T> {
        let response = self
            .client
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .await?;
        let text = response.text().await?;
        parse_response(method, &text)
    }

    fn photo_form(chat_id: i64, photo: PhotoUpload) -> AppResult<Form> {
        let part = Part::bytes(photo.bytes)
            .file_name(photo.file_name)
            .mime_str("image/jpeg")?;
        Ok(Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", part))
    }
}

/// Unwraps the Bot API envelope; `ok: false` becomes an `ExternalApiError`.
fn parse_response<T: DeserializeOwned>(method: &str, body: &str) -> AppResult<T> {
    let parsed: TelegramResponse<T> = serde_json::from_str(body)?;
    match (parsed.ok, parsed.result) {
        (true, Some(result)) => Ok(result),
        _ => {
            let description = parsed
                .description
                .unwrap_or_else(|| "Unknown error".to_string());
            log::error!("Telegram {method} failed: {description}");
            Err(AppError::ExternalApiError(format!(
                "Telegram {method} failed: {description}"
            )))
        }
    }
}

#[async_trait]
impl Messenger for TelegramService {
    async fn send_text(&self, chat_id: i64, text: &str) -> AppResult<()> {
        let _: serde_json::Value = self
            .call_json("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(())
    }

    async fn send_html(&self, chat_id: i64, html: &str) -> AppResult<()> {
        let _: serde_json::Value = self
            .call_json(
                "sendMessage",
                json!({ "chat_id": chat_id, "text": html, "parse_mode": "HTML" }),
            )
            .await?;
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        photo: PhotoUpload,
        caption: Option<&str>,
    ) -> AppResult<()> {
        let mut form = Self::photo_form(chat_id, photo)?;
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }
        let _: serde_json::Value = self.call_multipart("sendPhoto", form).await?;
        Ok(())
    }

    async fn send_claim_offer(
        &self,
        chat_id: i64,
        photo: PhotoUpload,
        prize_id: i32,
    ) -> AppResult<()> {
        let markup = InlineKeyboardMarkup::single(CLAIM_BUTTON_TEXT, prize_id.to_string());
        let form = Self::photo_form(chat_id, photo)?
            .text("reply_markup", serde_json::to_string(&markup)?);
        let _: serde_json::Value = self.call_multipart("sendPhoto", form).await?;
        log::debug!("Claim offer for prize {prize_id} sent to {chat_id}");
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> AppResult<()> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        let _: bool = self.call_json("answerCallbackQuery", body).await?;
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> AppResult<Vec<u8>> {
        let file: TelegramFile = self
            .call_json("getFile", json!({ "file_id": file_id }))
            .await?;
        let file_path = file.file_path.ok_or_else(|| {
            AppError::ExternalApiError(format!("Telegram file {} has no path", file.file_id))
        })?;

        let response = self.client.get(self.file_url(&file_path)).send().await?;
        if !response.status().is_success() {
            log::error!("Telegram file download failed: {}", response.status());
            return Err(AppError::ExternalApiError(format!(
                "File download failed with status {}",
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}
