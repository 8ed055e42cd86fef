use crate::error::AppResult;
use crate::models::TickOutcome;
use crate::services::BroadcastService;
use crate::store::Store;

/// 定时开放奖品并广播给所有用户
#[derive(Clone)]
pub struct SchedulerService {
    store: Store,
    broadcast: BroadcastService,
}

impl SchedulerService {
    pub fn new(store: Store, broadcast: BroadcastService) -> Self {
        Self { store, broadcast }
    }

    /// One scheduler period: open a random unused prize and offer it to everyone.
    ///
    /// The obscured image is prepared before the prize is marked used, so a prize
    /// whose image cannot be read stays in the pool and another one is tried. The
    /// tick fails only when no unused prize could be prepared. Without unused
    /// prizes this is a no-op.
    pub async fn tick(&self) -> AppResult<TickOutcome> {
        let conn = self.store.connection();
        let mut skipped = Vec::new();
        let mut last_err = None;
        while let Some(prize_id) = self.store.random_unused_prize_id(conn, &skipped).await? {
            skipped.push(prize_id);
            let Some(prize) = self.store.find_prize(prize_id).await? else {
                continue;
            };
            let offer = match self.broadcast.prepare_offer(&prize).await {
                Ok(offer) => offer,
                Err(e) => {
                    log::warn!(
                        "Prize {prize_id} ({}) cannot be offered, leaving it unused: {e}",
                        prize.image
                    );
                    last_err = Some(e);
                    continue;
                }
            };
            if !self.store.mark_prize_used(conn, prize_id, true).await? {
                log::debug!("Prize {prize_id} was taken concurrently, picking again");
                continue;
            }
            log::info!("Opened prize {prize_id} ({}) for claims", prize.image);

            let user_ids = self.store.list_user_ids().await?;
            let report = self.broadcast.fan_out(&offer, &user_ids).await;
            return Ok(TickOutcome::Broadcast { prize_id, report });
        }

        match last_err {
            Some(e) => Err(e),
            None => {
                log::debug!("No unused prizes left, skipping broadcast");
                Ok(TickOutcome::NoPrizes)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AssetsConfig, GameConfig};
    use crate::models::{ClaimOutcome, FanOutReport};
    use crate::services::{AllocationService, BacklogService};
    use crate::test_utils::{RecordingMessenger, Sent, setup_store, write_test_image};
    use crate::utils::image::ImageProcessor;
    use std::sync::Arc;

    fn scheduler(
        store: &Store,
        dir: &std::path::Path,
        messenger: Arc<RecordingMessenger>,
    ) -> SchedulerService {
        let images = ImageProcessor::new(&AssetsConfig {
            image_dir: dir.join("img").to_string_lossy().into_owned(),
            hidden_dir: dir.join("hidden").to_string_lossy().into_owned(),
        });
        SchedulerService::new(store.clone(), BroadcastService::new(messenger, images))
    }

    #[tokio::test]
    async fn test_tick_without_prizes_is_noop() {
        let store = setup_store().await;
        let dir = tempfile::tempdir().unwrap();
        let messenger = Arc::new(RecordingMessenger::new());
        store.register_user(1, "ann").await.unwrap();

        let svc = scheduler(&store, dir.path(), messenger.clone());
        assert_eq!(svc.tick().await.unwrap(), TickOutcome::NoPrizes);
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_ticks_open_distinct_prizes_then_claims_fill_up() {
        let store = setup_store().await;
        let dir = tempfile::tempdir().unwrap();
        let img_dir = dir.path().join("img");
        let mut names = Vec::new();
        for (i, color) in [[255, 0, 0], [0, 255, 0], [0, 0, 255]].into_iter().enumerate() {
            let name = format!("p{i}.png");
            write_test_image(&img_dir, &name, color);
            names.push(name);
        }
        store.add_prizes(names).await.unwrap();
        for id in 1..=4 {
            store.register_user(id, &format!("user{id}")).await.unwrap();
        }
        let messenger = Arc::new(RecordingMessenger::new());
        let svc = scheduler(&store, dir.path(), messenger.clone());

        let TickOutcome::Broadcast { prize_id: first, report } = svc.tick().await.unwrap() else {
            panic!("expected a broadcast");
        };
        assert_eq!(
            report,
            FanOutReport {
                delivered: 4,
                failed: 0
            }
        );
        let TickOutcome::Broadcast { prize_id: second, .. } = svc.tick().await.unwrap() else {
            panic!("expected a broadcast");
        };
        assert_ne!(first, second);
        let offers = messenger
            .sent()
            .iter()
            .filter(|s| matches!(s, Sent::ClaimOffer { prize_id, .. } if *prize_id == second))
            .count();
        assert_eq!(offers, 4);

        let allocation = AllocationService::new(store.clone(), GameConfig::default());
        for id in 1..=3 {
            assert!(matches!(
                allocation.claim(id, first).await.unwrap(),
                ClaimOutcome::Won { .. }
            ));
        }
        assert_eq!(allocation.claim(4, first).await.unwrap(), ClaimOutcome::Closed);
        let backlog = BacklogService::new(store.clone());
        assert_eq!(backlog.list(4).await.unwrap(), vec![first]);
        assert_eq!(store.balance(1).await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn test_unreadable_image_keeps_prize_in_pool() {
        let store = setup_store().await;
        let dir = tempfile::tempdir().unwrap();
        let messenger = Arc::new(RecordingMessenger::new());
        store.register_user(1, "ann").await.unwrap();
        let prize = store.add_prize("late.png").await.unwrap();
        let svc = scheduler(&store, dir.path(), messenger.clone());

        assert!(svc.tick().await.is_err());
        let stored = store.find_prize(prize.id).await.unwrap().unwrap();
        assert!(!stored.used);
        assert!(!stored.is_open_for_claims());
        assert!(messenger.sent().is_empty());

        // 图片补上后下一次调度正常广播
        write_test_image(&dir.path().join("img"), "late.png", [9, 9, 9]);
        assert_eq!(
            svc.tick().await.unwrap(),
            TickOutcome::Broadcast {
                prize_id: prize.id,
                report: FanOutReport {
                    delivered: 1,
                    failed: 0
                }
            }
        );
        assert!(store.find_prize(prize.id).await.unwrap().unwrap().used);
    }

    #[tokio::test]
    async fn test_tick_falls_back_to_readable_prize() {
        let store = setup_store().await;
        let dir = tempfile::tempdir().unwrap();
        let messenger = Arc::new(RecordingMessenger::new());
        store.register_user(1, "ann").await.unwrap();
        let good = store.add_prize("ok.png").await.unwrap();
        let broken = store.add_prize("gone.png").await.unwrap();
        write_test_image(&dir.path().join("img"), "ok.png", [1, 1, 1]);
        let svc = scheduler(&store, dir.path(), messenger.clone());

        for _ in 0..3 {
            // 无论先选中哪个，都只会开放可读的那个
            let outcome = svc.tick().await;
            if let Ok(TickOutcome::Broadcast { prize_id, .. }) = outcome {
                assert_eq!(prize_id, good.id);
            } else {
                assert!(outcome.is_err());
            }
        }
        assert!(store.find_prize(good.id).await.unwrap().unwrap().used);
        assert!(!store.find_prize(broken.id).await.unwrap().unwrap().used);
        assert_eq!(
            messenger.sent(),
            vec![Sent::ClaimOffer {
                chat_id: 1,
                file_name: "ok.png".into(),
                prize_id: good.id,
            }]
        );
    }
}
