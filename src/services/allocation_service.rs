use crate::config::GameConfig;
use crate::error::{AppError, AppResult};
use crate::models::ClaimOutcome;
use crate::store::Store;

/// 领奖：每个奖品最多 `winner_cap` 个获奖者，每个用户每个奖品只能领取一次
#[derive(Clone)]
pub struct AllocationService {
    store: Store,
    game: GameConfig,
}

impl AllocationService {
    pub fn new(store: Store, game: GameConfig) -> Self {
        Self { store, game }
    }

    /// Claims `prize_id` for `user_id`.
    ///
    /// The win record, the guarded winner-count increment and the award credit commit
    /// together or not at all. The count check up front is only a shortcut; the cap
    /// itself is enforced by the conditional increment.
    pub async fn claim(&self, user_id: i64, prize_id: i32) -> AppResult<ClaimOutcome> {
        let Some(prize) = self.store.find_prize(prize_id).await? else {
            return Ok(ClaimOutcome::Unavailable);
        };
        if !prize.is_open_for_claims() {
            log::debug!("User {user_id} tried to claim prize {prize_id} which is not open");
            return Ok(ClaimOutcome::Unavailable);
        }
        if self.store.find_user(user_id).await?.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let cap = self.game.winner_cap;
        if self.store.count_wins(prize_id).await? >= cap as u64 {
            if self.store.has_won(user_id, prize_id).await? {
                return Ok(ClaimOutcome::AlreadyClaimed);
            }
            self.record_missed(user_id, prize_id).await;
            return Ok(ClaimOutcome::Closed);
        }

        let txn = self.store.begin().await?;
        if !self.store.insert_win_if_absent(&txn, user_id, prize_id).await? {
            txn.rollback().await?;
            return Ok(ClaimOutcome::AlreadyClaimed);
        }
        if !self.store.reserve_winner_slot(&txn, prize_id, cap).await? {
            txn.rollback().await?;
            self.record_missed(user_id, prize_id).await;
            return Ok(ClaimOutcome::Closed);
        }
        self.store
            .credit_coins(&txn, user_id, self.game.win_award)
            .await?;
        txn.commit().await?;

        log::info!("User {user_id} won prize {prize_id}");
        Ok(ClaimOutcome::Won {
            prize_id,
            image: prize.image,
        })
    }

    // backlog 记录失败不影响领奖结果
    async fn record_missed(&self, user_id: i64, prize_id: i32) {
        if let Err(e) = self.store.record_missed(user_id, prize_id).await {
            log::warn!("Failed to record missed prize {prize_id} for user {user_id}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{setup_file_store, setup_store};

    async fn open_prize(store: &Store) -> i32 {
        store.add_prize("a.png").await.unwrap();
        store
            .take_random_unused_prize(store.connection(), true)
            .await
            .unwrap()
            .unwrap()
            .id
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_respect_cap() {
        let (store, _dir) = setup_file_store().await;
        let svc = AllocationService::new(store.clone(), GameConfig::default());
        let prize_id = open_prize(&store).await;
        for id in 1..=40 {
            store.register_user(id, &format!("user{id}")).await.unwrap();
        }

        let handles: Vec<_> = (1..=40)
            .map(|id| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.claim(id, prize_id).await.unwrap() })
            })
            .collect();
        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }

        let won = outcomes
            .iter()
            .filter(|o| matches!(o, ClaimOutcome::Won { .. }))
            .count();
        let closed = outcomes
            .iter()
            .filter(|o| **o == ClaimOutcome::Closed)
            .count();
        assert_eq!(won, 3);
        assert_eq!(closed, 37);
        assert_eq!(store.count_wins(prize_id).await.unwrap(), 3);
        assert_eq!(
            store.find_prize(prize_id).await.unwrap().unwrap().winner_count,
            3
        );

        let mut missed = 0;
        let mut coins = 0;
        for id in 1..=40 {
            missed += store.count_missed_entries(id).await.unwrap();
            coins += store.balance(id).await.unwrap().unwrap();
        }
        assert_eq!(missed, 37);
        assert_eq!(coins, 30);
    }

    #[tokio::test]
    async fn test_repeat_claim_is_not_credited_twice() {
        let store = setup_store().await;
        let svc = AllocationService::new(store.clone(), GameConfig::default());
        let prize_id = open_prize(&store).await;
        store.register_user(1, "ann").await.unwrap();

        let first = svc.claim(1, prize_id).await.unwrap();
        assert_eq!(
            first,
            ClaimOutcome::Won {
                prize_id,
                image: "a.png".into()
            }
        );
        assert_eq!(
            svc.claim(1, prize_id).await.unwrap(),
            ClaimOutcome::AlreadyClaimed
        );
        assert_eq!(store.count_wins(prize_id).await.unwrap(), 1);
        assert_eq!(store.balance(1).await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn test_winner_sees_already_claimed_after_close() {
        let store = setup_store().await;
        let svc = AllocationService::new(store.clone(), GameConfig::default());
        let prize_id = open_prize(&store).await;
        for id in 1..=4 {
            store.register_user(id, "u").await.unwrap();
        }
        for id in 1..=3 {
            assert!(matches!(
                svc.claim(id, prize_id).await.unwrap(),
                ClaimOutcome::Won { .. }
            ));
        }

        assert_eq!(
            svc.claim(2, prize_id).await.unwrap(),
            ClaimOutcome::AlreadyClaimed
        );
        assert_eq!(svc.claim(4, prize_id).await.unwrap(), ClaimOutcome::Closed);
        assert_eq!(store.list_missed(4).await.unwrap(), vec![prize_id]);
        assert_eq!(store.count_missed_entries(2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unopened_or_unknown_prize_is_unavailable() {
        let store = setup_store().await;
        let svc = AllocationService::new(store.clone(), GameConfig::default());
        store.register_user(1, "ann").await.unwrap();
        let prize = store.add_prize("a.png").await.unwrap();

        assert_eq!(
            svc.claim(1, prize.id).await.unwrap(),
            ClaimOutcome::Unavailable
        );
        assert_eq!(svc.claim(1, 999).await.unwrap(), ClaimOutcome::Unavailable);

        // 被兑换的奖品没有 opened_at，同样不能被领取
        store
            .mark_prize_used(store.connection(), prize.id, false)
            .await
            .unwrap();
        assert_eq!(
            svc.claim(1, prize.id).await.unwrap(),
            ClaimOutcome::Unavailable
        );
        assert_eq!(store.count_wins(prize.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unregistered_user_is_rejected() {
        let store = setup_store().await;
        let svc = AllocationService::new(store.clone(), GameConfig::default());
        let prize_id = open_prize(&store).await;

        let result = svc.claim(42, prize_id).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(store.count_wins(prize_id).await.unwrap(), 0);
    }
}
