pub mod telegram;

pub use telegram::*;

use crate::error::AppResult;
use async_trait::async_trait;

/// An image to upload along with the name it is sent under.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl PhotoUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// Outbound side of the chat transport. Chat ids equal user ids in private chats.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> AppResult<()>;

    /// Text rendered with HTML parse mode.
    async fn send_html(&self, chat_id: i64, html: &str) -> AppResult<()>;

    async fn send_photo(
        &self,
        chat_id: i64,
        photo: PhotoUpload,
        caption: Option<&str>,
    ) -> AppResult<()>;

    /// Image with a single button whose callback data is the prize id.
    async fn send_claim_offer(&self, chat_id: i64, photo: PhotoUpload, prize_id: i32)
    -> AppResult<()>;

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> AppResult<()>;

    async fn download_file(&self, file_id: &str) -> AppResult<Vec<u8>>;
}
