use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 参与者
/// - id: 外部消息平台的用户ID（非自增）
/// - coins: 金币余额，数据库层 CHECK(coins >= 0)
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub name: String,
    pub coins: i64,
    pub created_at: DateTime<Utc>,
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
