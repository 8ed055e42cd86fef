pub mod api;
pub mod webhook;

pub use api::api_config;
pub use webhook::{WebhookSecret, webhook_config};
