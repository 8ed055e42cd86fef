use crate::entities::prize_entity as prizes;
use crate::error::AppResult;
use crate::store::Store;

/// 错过的奖品（backlog）：容量满时记录，之后可以一次性补发
#[derive(Clone)]
pub struct BacklogService {
    store: Store,
}

impl BacklogService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn record(&self, user_id: i64, prize_id: i32) -> AppResult<()> {
        self.store.record_missed(user_id, prize_id).await
    }

    pub async fn list(&self, user_id: i64) -> AppResult<Vec<i32>> {
        self.store.list_missed(user_id).await
    }

    pub async fn clear(&self, user_id: i64) -> AppResult<u64> {
        self.store.clear_missed(user_id).await
    }

    /// Removes every backlog prize and returns the ones this call removed.
    /// A concurrent or retried replay gets only what is left, so nothing is granted twice.
    /// No win record, no coins, no change to the prize's winner count.
    pub async fn take_backlog(&self, user_id: i64) -> AppResult<Vec<prizes::Model>> {
        let mut granted = Vec::new();
        for prize_id in self.store.list_missed(user_id).await? {
            if !self.store.remove_missed_prize(user_id, prize_id).await? {
                continue;
            }
            match self.store.find_prize(prize_id).await? {
                Some(prize) => granted.push(prize),
                None => log::warn!("Backlog of user {user_id} referenced missing prize {prize_id}"),
            }
        }
        if !granted.is_empty() {
            log::info!("Replayed {} missed prizes for user {user_id}", granted.len());
        }
        Ok(granted)
    }
}
