use crate::config::GameConfig;
use crate::error::{AppError, AppResult};
use crate::models::RedeemOutcome;
use crate::store::Store;

#[derive(Clone)]
pub struct EconomyService {
    store: Store,
    game: GameConfig,
}

impl EconomyService {
    pub fn new(store: Store, game: GameConfig) -> Self {
        Self { store, game }
    }

    /// 金币余额；未注册用户为 0
    pub async fn balance(&self, user_id: i64) -> AppResult<i64> {
        Ok(self.store.balance(user_id).await?.unwrap_or(0))
    }

    /// Buys one random unused prize for `cost` coins.
    ///
    /// Runs as one transaction starting with the guarded debit. The prize is granted
    /// regardless of the winner cap and earns the regular win award. With no unused
    /// prize left the transaction is rolled back and nothing is spent.
    pub async fn redeem(&self, user_id: i64, cost: i64) -> AppResult<RedeemOutcome> {
        if cost <= 0 {
            return Err(AppError::ValidationError(
                "Redemption cost must be positive".to_string(),
            ));
        }

        let txn = self.store.begin().await?;
        if !self
            .store
            .debit_coins_if_sufficient(&txn, user_id, cost)
            .await?
        {
            txn.rollback().await?;
            let balance = self.balance(user_id).await?;
            return Ok(RedeemOutcome::InsufficientFunds { balance, cost });
        }

        let Some(prize) = self.store.take_random_unused_prize(&txn, false).await? else {
            txn.rollback().await?;
            log::info!("User {user_id} tried to redeem but no prizes are left");
            return Ok(RedeemOutcome::NoPrizesLeft);
        };

        if !self
            .store
            .insert_win_if_absent(&txn, user_id, prize.id)
            .await?
        {
            // 未使用的奖品不可能已有获奖记录
            txn.rollback().await?;
            return Err(AppError::InternalError(format!(
                "Unused prize {} already has a win for user {user_id}",
                prize.id
            )));
        }
        self.store.bump_winner_count(&txn, prize.id).await?;
        self.store
            .credit_coins(&txn, user_id, self.game.win_award)
            .await?;
        txn.commit().await?;

        let balance = self.balance(user_id).await?;
        log::info!(
            "User {user_id} redeemed prize {} for {cost} coins, balance {balance}",
            prize.id
        );
        Ok(RedeemOutcome::Redeemed {
            prize_id: prize.id,
            image: prize.image,
            balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{setup_file_store, setup_store};
    use std::collections::HashSet;

    async fn user_with_coins(store: &Store, user_id: i64, coins: i64) {
        store.register_user(user_id, "ann").await.unwrap();
        store
            .credit_coins(store.connection(), user_id, coins)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_insufficient_funds_changes_nothing() {
        let store = setup_store().await;
        let svc = EconomyService::new(store.clone(), GameConfig::default());
        user_with_coins(&store, 1, 29).await;
        store.add_prize("a.png").await.unwrap();

        assert_eq!(
            svc.redeem(1, 30).await.unwrap(),
            RedeemOutcome::InsufficientFunds {
                balance: 29,
                cost: 30
            }
        );
        assert_eq!(svc.balance(1).await.unwrap(), 29);
        assert!(!store.find_prize(1).await.unwrap().unwrap().used);
    }

    #[tokio::test]
    async fn test_redeem_grants_prize_and_win() {
        let store = setup_store().await;
        let svc = EconomyService::new(store.clone(), GameConfig::default());
        user_with_coins(&store, 1, 35).await;
        store.add_prize("a.png").await.unwrap();

        let outcome = svc.redeem(1, 30).await.unwrap();
        assert_eq!(
            outcome,
            RedeemOutcome::Redeemed {
                prize_id: 1,
                image: "a.png".into(),
                // 35 - 30 + 10
                balance: 15,
            }
        );
        assert!(store.has_won(1, 1).await.unwrap());
        let prize = store.find_prize(1).await.unwrap().unwrap();
        assert!(prize.used);
        assert!(!prize.is_open_for_claims());
        assert_eq!(prize.winner_count, 1);
    }

    #[tokio::test]
    async fn test_no_prizes_left_rolls_back_debit() {
        let store = setup_store().await;
        let svc = EconomyService::new(store.clone(), GameConfig::default());
        user_with_coins(&store, 1, 40).await;

        assert_eq!(
            svc.redeem(1, 30).await.unwrap(),
            RedeemOutcome::NoPrizesLeft
        );
        assert_eq!(svc.balance(1).await.unwrap(), 40);
        assert!(store.won_images(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_balance_of_unknown_user_is_zero() {
        let store = setup_store().await;
        let svc = EconomyService::new(store, GameConfig::default());
        assert_eq!(svc.balance(99).await.unwrap(), 0);
        assert_eq!(
            svc.redeem(99, 30).await.unwrap(),
            RedeemOutcome::InsufficientFunds {
                balance: 0,
                cost: 30
            }
        );
        assert!(matches!(
            svc.redeem(99, 0).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_second_redemption_needs_new_coins() {
        let store = setup_store().await;
        let svc = EconomyService::new(store.clone(), GameConfig::default());
        user_with_coins(&store, 1, 40).await;
        store
            .add_prizes(vec!["a.png".into(), "b.png".into()])
            .await
            .unwrap();

        assert!(matches!(
            svc.redeem(1, 30).await.unwrap(),
            RedeemOutcome::Redeemed { balance: 20, .. }
        ));
        assert_eq!(
            svc.redeem(1, 30).await.unwrap(),
            RedeemOutcome::InsufficientFunds {
                balance: 20,
                cost: 30
            }
        );
        assert_eq!(store.won_images(1).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redemptions_never_overdraw() {
        let (store, _dir) = setup_file_store().await;
        let svc = EconomyService::new(store.clone(), GameConfig::default());
        user_with_coins(&store, 1, 60).await;
        store
            .add_prizes((0..10).map(|i| format!("p{i}.png")).collect())
            .await
            .unwrap();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.redeem(1, 30).await.unwrap() })
            })
            .collect();
        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }

        // 60 -> 40 -> 20，第三次起余额不足
        let redeemed = outcomes
            .iter()
            .filter(|o| matches!(o, RedeemOutcome::Redeemed { .. }))
            .count();
        let refused = outcomes
            .iter()
            .filter(|o| matches!(o, RedeemOutcome::InsufficientFunds { .. }))
            .count();
        assert_eq!(redeemed, 2);
        assert_eq!(refused, 8);
        assert_eq!(store.balance(1).await.unwrap(), Some(20));
        assert_eq!(store.won_images(1).await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redemptions_get_distinct_prizes() {
        let (store, _dir) = setup_file_store().await;
        let svc = EconomyService::new(store.clone(), GameConfig::default());
        for id in 1..=10 {
            user_with_coins(&store, id, 30).await;
        }
        store
            .add_prizes((0..10).map(|i| format!("p{i}.png")).collect())
            .await
            .unwrap();

        let handles: Vec<_> = (1..=10)
            .map(|id| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.redeem(id, 30).await.unwrap() })
            })
            .collect();
        let mut prize_ids = HashSet::new();
        for handle in handles {
            match handle.await.unwrap() {
                RedeemOutcome::Redeemed { prize_id, .. } => assert!(prize_ids.insert(prize_id)),
                other => panic!("expected a redemption, got {other:?}"),
            }
        }
        assert_eq!(prize_ids.len(), 10);
        assert!(
            store
                .random_unused_prize_id(store.connection(), &[])
                .await
                .unwrap()
                .is_none()
        );
    }
}
