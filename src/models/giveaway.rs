use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::prize_entity;

/// 领取结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClaimOutcome {
    /// The claim created a win record; `image` is the original (unobscured) image.
    Won { prize_id: i32, image: String },
    /// The user already holds a win for this prize.
    AlreadyClaimed,
    /// The winner cap was reached; a backlog entry was recorded.
    Closed,
    /// Unknown prize, or one that was never opened for claims.
    Unavailable,
}

/// 兑换结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RedeemOutcome {
    Redeemed {
        prize_id: i32,
        image: String,
        balance: i64,
    },
    InsufficientFunds {
        balance: i64,
        cost: i64,
    },
    NoPrizesLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterOutcome {
    Registered,
    AlreadyRegistered,
}

/// 一次调度的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    Broadcast { prize_id: i32, report: FanOutReport },
    NoPrizes,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanOutReport {
    pub delivered: usize,
    pub failed: usize,
}

/// 排行榜一行：只包含至少获奖一次的用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromQueryResult, ToSchema)]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub name: String,
    pub win_count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BalanceResponse {
    pub user_id: i64,
    pub coins: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserPrizesResponse {
    pub user_id: i64,
    /// Image references of every prize the user holds, oldest first
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PrizeStatusResponse {
    pub id: i32,
    pub used: bool,
    pub open_for_claims: bool,
    pub win_count: u64,
    pub winner_cap: i32,
}

impl PrizeStatusResponse {
    pub fn new(prize: &prize_entity::Model, win_count: u64, winner_cap: i32) -> Self {
        Self {
            id: prize.id,
            used: prize.used,
            open_for_claims: prize.is_open_for_claims() && win_count < winner_cap as u64,
            win_count,
            winner_cap,
        }
    }
}
