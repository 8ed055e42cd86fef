//! Durable game state.
//!
//! Every service reaches users, prizes, wins and missed claims through [`Store`].
//! Methods that take a `conn` argument run on whatever connection they are given,
//! so a service can compose several of them inside one transaction; the others
//! run directly on the pool.

use crate::entities::{
    missed_entity as missed, prize_entity as prizes, user_entity as users, win_entity as wins,
};
use crate::error::AppResult;
use crate::models::LeaderboardEntry;
use chrono::Utc;
use rand::seq::SliceRandom;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};

#[derive(Clone)]
pub struct Store {
    db: DatabaseConnection,
}

impl Store {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn begin(&self) -> AppResult<DatabaseTransaction> {
        Ok(self.db.begin().await?)
    }

    // -----------------------------
    // users
    // -----------------------------

    /// Inserts the user unless the id already exists. Returns `true` when a row was created.
    pub async fn register_user(&self, user_id: i64, name: &str) -> AppResult<bool> {
        let rows = users::Entity::insert(users::ActiveModel {
            id: Set(user_id),
            name: Set(name.to_string()),
            coins: Set(0),
            created_at: Set(Utc::now()),
        })
        .on_conflict(
            OnConflict::column(users::Column::Id)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await?;
        Ok(rows > 0)
    }

    pub async fn list_user_ids(&self) -> AppResult<Vec<i64>> {
        let ids = users::Entity::find()
            .select_only()
            .column(users::Column::Id)
            .order_by_asc(users::Column::Id)
            .into_tuple::<i64>()
            .all(&self.db)
            .await?;
        Ok(ids)
    }

    pub async fn find_user(&self, user_id: i64) -> AppResult<Option<users::Model>> {
        Ok(users::Entity::find_by_id(user_id).one(&self.db).await?)
    }

    pub async fn balance(&self, user_id: i64) -> AppResult<Option<i64>> {
        Ok(self.find_user(user_id).await?.map(|u| u.coins))
    }

    pub async fn credit_coins<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: i64,
        amount: i64,
    ) -> AppResult<bool> {
        let res = users::Entity::update_many()
            .col_expr(
                users::Column::Coins,
                Expr::col(users::Column::Coins).add(amount),
            )
            .filter(users::Column::Id.eq(user_id))
            .exec(conn)
            .await?;
        Ok(res.rows_affected == 1)
    }

    /// 条件扣款（where coins >= amount），余额不足时不修改任何数据
    pub async fn debit_coins_if_sufficient<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: i64,
        amount: i64,
    ) -> AppResult<bool> {
        let res = users::Entity::update_many()
            .col_expr(
                users::Column::Coins,
                Expr::col(users::Column::Coins).sub(amount),
            )
            .filter(users::Column::Id.eq(user_id))
            .filter(users::Column::Coins.gte(amount))
            .exec(conn)
            .await?;
        Ok(res.rows_affected == 1)
    }

    // -----------------------------
    // prizes
    // -----------------------------

    pub async fn add_prize(&self, image: &str) -> AppResult<prizes::Model> {
        let model = prizes::Entity::insert(new_prize(image.to_string()))
            .exec_with_returning(&self.db)
            .await?;
        Ok(model)
    }

    pub async fn add_prizes(&self, images: Vec<String>) -> AppResult<usize> {
        if images.is_empty() {
            return Ok(0);
        }
        let count = images.len();
        prizes::Entity::insert_many(images.into_iter().map(new_prize))
            .exec(&self.db)
            .await?;
        Ok(count)
    }

    pub async fn find_prize(&self, prize_id: i32) -> AppResult<Option<prizes::Model>> {
        Ok(prizes::Entity::find_by_id(prize_id).one(&self.db).await?)
    }

    pub async fn list_prize_images(&self) -> AppResult<Vec<String>> {
        let images = prizes::Entity::find()
            .select_only()
            .column(prizes::Column::Image)
            .into_tuple::<String>()
            .all(&self.db)
            .await?;
        Ok(images)
    }

    /// Random unused prize id, skipping the ids in `exclude`.
    pub async fn random_unused_prize_id<C: ConnectionTrait>(
        &self,
        conn: &C,
        exclude: &[i32],
    ) -> AppResult<Option<i32>> {
        let mut query = prizes::Entity::find()
            .select_only()
            .column(prizes::Column::Id)
            .filter(prizes::Column::Used.eq(false));
        if !exclude.is_empty() {
            query = query.filter(prizes::Column::Id.is_not_in(exclude.iter().copied()));
        }
        let ids = query.into_tuple::<i32>().all(conn).await?;
        let picked = {
            let mut rng = rand::thread_rng();
            ids.choose(&mut rng).copied()
        };
        Ok(picked)
    }

    /// Compare-and-set `used: false -> true`. Only the caller that flips the flag gets `true`.
    /// `open_for_claims` also stamps `opened_at`, which is what lets users claim the prize.
    pub async fn mark_prize_used<C: ConnectionTrait>(
        &self,
        conn: &C,
        prize_id: i32,
        open_for_claims: bool,
    ) -> AppResult<bool> {
        let mut update = prizes::Entity::update_many()
            .col_expr(prizes::Column::Used, Expr::value(true));
        if open_for_claims {
            update = update.col_expr(prizes::Column::OpenedAt, Expr::value(Utc::now()));
        }
        let res = update
            .filter(prizes::Column::Id.eq(prize_id))
            .filter(prizes::Column::Used.eq(false))
            .exec(conn)
            .await?;
        Ok(res.rows_affected == 1)
    }

    /// 随机取一个未使用奖品并原子标记为已使用；被并发占用的奖品不再参与选择，
    /// 直到候选集为空才返回 `None`
    pub async fn take_random_unused_prize<C: ConnectionTrait>(
        &self,
        conn: &C,
        open_for_claims: bool,
    ) -> AppResult<Option<prizes::Model>> {
        let mut lost = Vec::new();
        while let Some(prize_id) = self.random_unused_prize_id(conn, &lost).await? {
            if self.mark_prize_used(conn, prize_id, open_for_claims).await? {
                return Ok(prizes::Entity::find_by_id(prize_id).one(conn).await?);
            }
            log::debug!("Prize {prize_id} was taken concurrently, picking again");
            lost.push(prize_id);
        }
        Ok(None)
    }

    /// 条件递增获奖人数（where winner_count < cap），返回是否占到名额
    pub async fn reserve_winner_slot<C: ConnectionTrait>(
        &self,
        conn: &C,
        prize_id: i32,
        cap: i32,
    ) -> AppResult<bool> {
        let res = prizes::Entity::update_many()
            .col_expr(
                prizes::Column::WinnerCount,
                Expr::col(prizes::Column::WinnerCount).add(1),
            )
            .filter(prizes::Column::Id.eq(prize_id))
            .filter(prizes::Column::WinnerCount.lt(cap))
            .exec(conn)
            .await?;
        Ok(res.rows_affected == 1)
    }

    /// Unguarded increment, used by redemptions which bypass the cap.
    pub async fn bump_winner_count<C: ConnectionTrait>(
        &self,
        conn: &C,
        prize_id: i32,
    ) -> AppResult<()> {
        prizes::Entity::update_many()
            .col_expr(
                prizes::Column::WinnerCount,
                Expr::col(prizes::Column::WinnerCount).add(1),
            )
            .filter(prizes::Column::Id.eq(prize_id))
            .exec(conn)
            .await?;
        Ok(())
    }

    // -----------------------------
    // wins
    // -----------------------------

    /// Inserts the (user, prize) win unless one exists. Returns `true` when newly created;
    /// a duplicate is reported as `false`, never as an error.
    pub async fn insert_win_if_absent<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: i64,
        prize_id: i32,
    ) -> AppResult<bool> {
        let rows = wins::Entity::insert(wins::ActiveModel {
            user_id: Set(user_id),
            prize_id: Set(prize_id),
            won_at: Set(Utc::now()),
        })
        .on_conflict(
            OnConflict::columns([wins::Column::UserId, wins::Column::PrizeId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;
        Ok(rows > 0)
    }

    pub async fn count_wins(&self, prize_id: i32) -> AppResult<u64> {
        let count = wins::Entity::find()
            .filter(wins::Column::PrizeId.eq(prize_id))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    pub async fn has_won(&self, user_id: i64, prize_id: i32) -> AppResult<bool> {
        let found = wins::Entity::find_by_id((user_id, prize_id))
            .one(&self.db)
            .await?;
        Ok(found.is_some())
    }

    /// 排行榜：按获奖次数倒序，次数相同按用户ID升序；只统计有获奖记录的用户
    pub async fn leaderboard(&self, limit: u64) -> AppResult<Vec<LeaderboardEntry>> {
        let rows = wins::Entity::find()
            .select_only()
            .column_as(wins::Column::UserId, "user_id")
            .column_as(users::Column::Name, "name")
            .column_as(
                Expr::col((wins::Entity, wins::Column::PrizeId)).count(),
                "win_count",
            )
            .join(JoinType::InnerJoin, wins::Relation::User.def())
            .group_by(wins::Column::UserId)
            .group_by(users::Column::Name)
            .order_by_desc(Expr::col((wins::Entity, wins::Column::PrizeId)).count())
            .order_by_asc(wins::Column::UserId)
            .limit(limit)
            .into_model::<LeaderboardEntry>()
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    /// Original image references of every prize the user holds, oldest win first.
    pub async fn won_images(&self, user_id: i64) -> AppResult<Vec<String>> {
        let list = prizes::Entity::find()
            .inner_join(wins::Entity)
            .filter(wins::Column::UserId.eq(user_id))
            .order_by_asc(wins::Column::WonAt)
            .order_by_asc(prizes::Column::Id)
            .all(&self.db)
            .await?;
        Ok(list.into_iter().map(|p| p.image).collect())
    }

    // -----------------------------
    // missed
    // -----------------------------

    pub async fn record_missed(&self, user_id: i64, prize_id: i32) -> AppResult<()> {
        missed::Entity::insert(missed::ActiveModel {
            user_id: Set(user_id),
            prize_id: Set(prize_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        })
        .exec(&self.db)
        .await?;
        Ok(())
    }

    /// Distinct prize ids in the user's backlog.
    pub async fn list_missed(&self, user_id: i64) -> AppResult<Vec<i32>> {
        let ids = missed::Entity::find()
            .select_only()
            .column(missed::Column::PrizeId)
            .filter(missed::Column::UserId.eq(user_id))
            .distinct()
            .order_by_asc(missed::Column::PrizeId)
            .into_tuple::<i32>()
            .all(&self.db)
            .await?;
        Ok(ids)
    }

    #[cfg(test)]
    pub async fn count_missed_entries(&self, user_id: i64) -> AppResult<u64> {
        let count = missed::Entity::find()
            .filter(missed::Column::UserId.eq(user_id))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    pub async fn clear_missed(&self, user_id: i64) -> AppResult<u64> {
        let res = missed::Entity::delete_many()
            .filter(missed::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected)
    }

    /// 单条语句删除某个奖品的 backlog 记录；只有真正删除了记录的调用方返回 true
    pub async fn remove_missed_prize(&self, user_id: i64, prize_id: i32) -> AppResult<bool> {
        let res = missed::Entity::delete_many()
            .filter(missed::Column::UserId.eq(user_id))
            .filter(missed::Column::PrizeId.eq(prize_id))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected > 0)
    }
}

fn new_prize(image: String) -> prizes::ActiveModel {
    prizes::ActiveModel {
        image: Set(image),
        used: Set(false),
        opened_at: Set(None),
        winner_count: Set(0),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
}
