//! Shared fixtures for the in-crate test modules.

use crate::error::{AppError, AppResult};
use crate::external::{Messenger, PhotoUpload};
use crate::store::Store;
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database};
use std::path::Path;
use std::sync::Mutex;

/// In-memory SQLite with the full schema. One connection keeps the database alive
/// for the whole test, so every query is serialized; use [`setup_file_store`] for
/// concurrency tests.
pub async fn setup_store() -> Store {
    let mut opt = ConnectOptions::new("sqlite::memory:".to_string());
    opt.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    Store::new(db)
}

/// File-backed SQLite with a multi-connection pool, so concurrent tests really race.
/// Keep the returned directory alive for as long as the store is used.
pub async fn setup_file_store() -> (Store, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("prizes.db").display()
    );
    let mut opt = ConnectOptions::new(url);
    opt.max_connections(8)
        .min_connections(2)
        .sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    (Store::new(db), dir)
}

/// Writes an 8x8 single-colour PNG, creating `dir` if needed.
pub fn write_test_image(dir: &Path, name: &str, rgb: [u8; 3]) {
    std::fs::create_dir_all(dir).unwrap();
    RgbImage::from_pixel(8, 8, Rgb(rgb))
        .save(dir.join(name))
        .unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text { chat_id: i64, text: String },
    Html { chat_id: i64, html: String },
    Photo {
        chat_id: i64,
        file_name: String,
        caption: Option<String>,
    },
    ClaimOffer {
        chat_id: i64,
        file_name: String,
        prize_id: i32,
    },
    CallbackAnswer {
        callback_id: String,
        text: Option<String>,
    },
}

/// Records everything sent through it. Sends to a chat listed in `failing`
/// return an error without being recorded.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    failing: Vec<i64>,
    files: Vec<(String, Vec<u8>)>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(chat_ids: Vec<i64>) -> Self {
        Self {
            failing: chat_ids,
            ..Self::default()
        }
    }

    /// Makes `download_file(file_id)` return `bytes`.
    pub fn with_file(mut self, file_id: &str, bytes: Vec<u8>) -> Self {
        self.files.push((file_id.to_string(), bytes));
        self
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Texts sent to one chat, in order.
    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { chat_id: c, text } if c == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, chat_id: i64, item: Sent) -> AppResult<()> {
        if self.failing.contains(&chat_id) {
            return Err(AppError::ExternalApiError(format!("chat {chat_id} blocked the bot")));
        }
        self.sent.lock().unwrap().push(item);
        Ok(())
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, chat_id: i64, text: &str) -> AppResult<()> {
        self.record(
            chat_id,
            Sent::Text {
                chat_id,
                text: text.to_string(),
            },
        )
    }

    async fn send_html(&self, chat_id: i64, html: &str) -> AppResult<()> {
        self.record(
            chat_id,
            Sent::Html {
                chat_id,
                html: html.to_string(),
            },
        )
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        photo: PhotoUpload,
        caption: Option<&str>,
    ) -> AppResult<()> {
        self.record(
            chat_id,
            Sent::Photo {
                chat_id,
                file_name: photo.file_name,
                caption: caption.map(str::to_string),
            },
        )
    }

    async fn send_claim_offer(
        &self,
        chat_id: i64,
        photo: PhotoUpload,
        prize_id: i32,
    ) -> AppResult<()> {
        self.record(
            chat_id,
            Sent::ClaimOffer {
                chat_id,
                file_name: photo.file_name,
                prize_id,
            },
        )
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> AppResult<()> {
        self.sent.lock().unwrap().push(Sent::CallbackAnswer {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> AppResult<Vec<u8>> {
        self.files
            .iter()
            .find(|(id, _)| id == file_id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| AppError::ExternalApiError(format!("unknown file {file_id}")))
    }
}
