use crate::config::GameConfig;
use crate::entities::user_entity as users;
use crate::error::{AppError, AppResult};
use crate::models::{LeaderboardEntry, RegisterOutcome};
use crate::store::Store;

#[derive(Clone)]
pub struct UserService {
    store: Store,
    game: GameConfig,
}

impl UserService {
    pub fn new(store: Store, game: GameConfig) -> Self {
        Self { store, game }
    }

    /// 注册用户；重复注册不会重置余额
    pub async fn register(&self, user_id: i64, name: &str) -> AppResult<RegisterOutcome> {
        if self.store.register_user(user_id, name).await? {
            log::info!("User {user_id} registered as {name}");
            Ok(RegisterOutcome::Registered)
        } else {
            Ok(RegisterOutcome::AlreadyRegistered)
        }
    }

    pub async fn get_user(&self, user_id: i64) -> AppResult<users::Model> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn is_registered(&self, user_id: i64) -> AppResult<bool> {
        Ok(self.store.find_user(user_id).await?.is_some())
    }

    /// Top users by number of prizes held, capped at `leaderboard_size`.
    pub async fn leaderboard(&self) -> AppResult<Vec<LeaderboardEntry>> {
        self.store.leaderboard(self.game.leaderboard_size).await
    }

    pub async fn won_images(&self, user_id: i64) -> AppResult<Vec<String>> {
        self.store.won_images(user_id).await
    }
}
