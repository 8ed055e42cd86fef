use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 奖品（一张图片）
/// 说明:
/// - image: 原图文件名，遮挡后的图片使用同名文件存放在 hidden 目录
/// - used: 只能 false -> true，被调度器开放或被兑换时设置
/// - opened_at: 仅调度器开放领取时设置；兑换得到的奖品保持 NULL
/// - winner_count: 获奖人数计数器，领取时以 winner_count < cap 作为条件原子递增
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "prizes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub image: String,
    pub used: bool,
    pub opened_at: Option<DateTime<Utc>>,
    pub winner_count: i32,
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// Whether the scheduler has opened this prize for competitive claims.
    pub fn is_open_for_claims(&self) -> bool {
        self.used && self.opened_at.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::wins::Entity")]
    Wins,
    #[sea_orm(has_many = "super::missed::Entity")]
    Missed,
}

impl Related<super::wins::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wins.def()
    }
}

impl Related<super::missed::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Missed.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
