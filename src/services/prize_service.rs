use crate::config::GameConfig;
use crate::entities::prize_entity as prizes;
use crate::error::{AppError, AppResult};
use crate::external::Messenger;
use crate::models::PrizeStatusResponse;
use crate::models::telegram::PhotoSize;
use crate::store::Store;
use crate::utils::image::ImageProcessor;
use std::collections::HashSet;
use std::sync::Arc;

/// 奖品图片管理：管理员上传、启动时从图片目录导入
#[derive(Clone)]
pub struct PrizeService {
    store: Store,
    messenger: Arc<dyn Messenger>,
    images: ImageProcessor,
    admin_ids: Vec<i64>,
    game: GameConfig,
}

impl PrizeService {
    pub fn new(
        store: Store,
        messenger: Arc<dyn Messenger>,
        images: ImageProcessor,
        admin_ids: Vec<i64>,
        game: GameConfig,
    ) -> Self {
        Self {
            store,
            messenger,
            images,
            admin_ids,
            game,
        }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    /// Stores the largest size of an uploaded photo and adds it to the pool.
    pub async fn upload(&self, user_id: i64, photos: &[PhotoSize]) -> AppResult<prizes::Model> {
        if !self.is_admin(user_id) {
            log::warn!("User {user_id} tried to upload a prize image");
            return Err(AppError::Forbidden);
        }
        let largest = photos
            .iter()
            .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
            .ok_or_else(|| AppError::ValidationError("Message has no photo".to_string()))?;

        let bytes = self.messenger.download_file(&largest.file_id).await?;
        let image = format!("{}.jpg", largest.file_unique_id);
        self.images.store_original(&image, &bytes).await?;
        let prize = self.store.add_prize(&image).await?;
        log::info!("Admin {user_id} added prize {} ({image})", prize.id);
        Ok(prize)
    }

    /// Adds a prize for every image in the image directory that is not in the pool yet.
    pub async fn seed_from_directory(&self) -> AppResult<usize> {
        let known: HashSet<String> = self.store.list_prize_images().await?.into_iter().collect();
        let fresh: Vec<String> = self
            .images
            .list_originals()
            .await?
            .into_iter()
            .filter(|name| !known.contains(name))
            .collect();
        let added = self.store.add_prizes(fresh).await?;
        if added > 0 {
            log::info!("Seeded {added} prizes from the image directory");
        }
        Ok(added)
    }

    pub async fn prize_status(&self, prize_id: i32) -> AppResult<PrizeStatusResponse> {
        let prize = self
            .store
            .find_prize(prize_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Prize not found".to_string()))?;
        let win_count = self.store.count_wins(prize_id).await?;
        Ok(PrizeStatusResponse::new(&prize, win_count, self.game.winner_cap))
    }
}
