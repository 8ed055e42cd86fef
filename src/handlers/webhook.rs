use crate::models::telegram::Update;
use crate::services::BotService;
use actix_web::{HttpRequest, HttpResponse, Result, web};
use log::{error, warn};

pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// Secret configured with `setWebhook`; `None` disables the check.
#[derive(Clone, Debug, Default)]
pub struct WebhookSecret(pub Option<String>);

impl WebhookSecret {
    pub fn verify(&self, provided: Option<&str>) -> bool {
        match &self.0 {
            None => true,
            Some(expected) => provided == Some(expected.as_str()),
        }
    }
}

/// Telegram webhook处理器
///
/// 处理失败也返回 200，避免 Telegram 重复投递同一个 update
pub async fn telegram_webhook(
    req: HttpRequest,
    body: web::Bytes,
    secret: web::Data<WebhookSecret>,
    bot: web::Data<BotService>,
) -> Result<HttpResponse> {
    let provided = req
        .headers()
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok());
    if !secret.verify(provided) {
        warn!("Rejected webhook call with invalid secret token");
        return Ok(HttpResponse::Unauthorized().finish());
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("Ignoring malformed Telegram update: {e}");
            return Ok(HttpResponse::Ok().finish());
        }
    };

    if let Err(e) = bot.handle_update(update).await {
        error!("Failed to process Telegram update: {e}");
    }
    Ok(HttpResponse::Ok().finish())
}

pub fn webhook_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/telegram/webhook", web::post().to(telegram_webhook));
}
