use crate::entities::prize_entity as prizes;
use crate::error::AppResult;
use crate::external::{Messenger, PhotoUpload};
use crate::models::FanOutReport;
use crate::utils::image::ImageProcessor;
use crate::utils::messages::COLLECTION_CAPTION;
use futures_util::{StreamExt, stream};
use std::sync::Arc;

/// 同时进行中的发送数量上限
const FAN_OUT_CONCURRENCY: usize = 16;
const COLLAGE_FILE_NAME: &str = "collection.jpg";

/// Obscured image of one prize, ready to be offered.
#[derive(Debug, Clone)]
pub struct PreparedOffer {
    pub prize_id: i32,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Sends prize images to users.
#[derive(Clone)]
pub struct BroadcastService {
    messenger: Arc<dyn Messenger>,
    images: ImageProcessor,
}

impl BroadcastService {
    pub fn new(messenger: Arc<dyn Messenger>, images: ImageProcessor) -> Self {
        Self { messenger, images }
    }

    /// Obscures the prize image and loads the bytes every recipient will get.
    /// Nothing is sent yet, so a failure here leaves no trace with users.
    pub async fn prepare_offer(&self, prize: &prizes::Model) -> AppResult<PreparedOffer> {
        let hidden = self.images.obscure(&prize.image).await?;
        let bytes = tokio::fs::read(&hidden).await?;
        Ok(PreparedOffer {
            prize_id: prize.id,
            file_name: prize.image.clone(),
            bytes,
        })
    }

    /// Offers the prepared image to every user with a claim button.
    /// A failed send is counted and the fan-out carries on with the next user.
    pub async fn fan_out(&self, offer: &PreparedOffer, user_ids: &[i64]) -> FanOutReport {
        let prize_id = offer.prize_id;
        let results: Vec<(i64, AppResult<()>)> = stream::iter(user_ids.iter().copied())
            .map(|chat_id| {
                let messenger = self.messenger.clone();
                let photo = PhotoUpload::new(offer.file_name.clone(), offer.bytes.clone());
                async move {
                    let res = messenger.send_claim_offer(chat_id, photo, prize_id).await;
                    (chat_id, res)
                }
            })
            .buffer_unordered(FAN_OUT_CONCURRENCY)
            .collect()
            .await;

        let mut report = FanOutReport::default();
        for (chat_id, res) in results {
            match res {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    log::warn!("Failed to offer prize {prize_id} to {chat_id}: {e}");
                    report.failed += 1;
                }
            }
        }
        log::info!(
            "Prize {prize_id} broadcast: {} delivered, {} failed",
            report.delivered,
            report.failed
        );
        report
    }

    /// Sends the original, unobscured image.
    pub async fn deliver_prize(
        &self,
        chat_id: i64,
        image: &str,
        caption: Option<&str>,
    ) -> AppResult<()> {
        let bytes = self.images.read_original(image).await?;
        self.messenger
            .send_photo(chat_id, PhotoUpload::new(image, bytes), caption)
            .await
    }

    /// Sends one collage of `images`. Returns `false` when there was nothing to draw.
    pub async fn deliver_collage(&self, chat_id: i64, images: &[String]) -> AppResult<bool> {
        let Some(bytes) = self.images.collage(images).await? else {
            return Ok(false);
        };
        self.messenger
            .send_photo(
                chat_id,
                PhotoUpload::new(COLLAGE_FILE_NAME, bytes),
                Some(COLLECTION_CAPTION),
            )
            .await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssetsConfig;
    use crate::test_utils::{RecordingMessenger, Sent, write_test_image};
    use chrono::Utc;
    use std::path::Path;

    fn processor(dir: &Path) -> ImageProcessor {
        ImageProcessor::new(&AssetsConfig {
            image_dir: dir.join("img").to_string_lossy().into_owned(),
            hidden_dir: dir.join("hidden").to_string_lossy().into_owned(),
        })
    }

    fn prize(id: i32, image: &str) -> prizes::Model {
        prizes::Model {
            id,
            image: image.to_string(),
            used: true,
            opened_at: Some(Utc::now()),
            winner_count: 0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_fan_out_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        write_test_image(&dir.path().join("img"), "cat.png", [200, 10, 10]);
        let messenger = Arc::new(RecordingMessenger::failing_for(vec![2]));
        let svc = BroadcastService::new(messenger.clone(), processor(dir.path()));

        let offer = svc.prepare_offer(&prize(5, "cat.png")).await.unwrap();
        assert!(!offer.bytes.is_empty());
        let report = svc.fan_out(&offer, &[1, 2, 3]).await;
        assert_eq!(
            report,
            FanOutReport {
                delivered: 2,
                failed: 1
            }
        );
        assert!(dir.path().join("hidden").join("cat.png").exists());

        let mut offered: Vec<i64> = messenger
            .sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::ClaimOffer {
                    chat_id, prize_id, ..
                } if prize_id == 5 => Some(chat_id),
                _ => None,
            })
            .collect();
        offered.sort();
        assert_eq!(offered, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_missing_image_fails_before_sending() {
        let dir = tempfile::tempdir().unwrap();
        let messenger = Arc::new(RecordingMessenger::new());
        let svc = BroadcastService::new(messenger.clone(), processor(dir.path()));

        assert!(svc.prepare_offer(&prize(1, "gone.png")).await.is_err());
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_deliver_collage() {
        let dir = tempfile::tempdir().unwrap();
        write_test_image(&dir.path().join("img"), "a.png", [1, 2, 3]);
        let messenger = Arc::new(RecordingMessenger::new());
        let svc = BroadcastService::new(messenger.clone(), processor(dir.path()));

        assert!(svc.deliver_collage(9, &["a.png".into()]).await.unwrap());
        assert!(!svc.deliver_collage(9, &[]).await.unwrap());
        assert_eq!(
            messenger.sent(),
            vec![Sent::Photo {
                chat_id: 9,
                file_name: COLLAGE_FILE_NAME.to_string(),
                caption: Some(COLLECTION_CAPTION.to_string()),
            }]
        );
    }
}
