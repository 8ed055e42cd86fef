use sea_orm_migration::prelude::*;

/// Registered participants
#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Name,
    Coins,
    CreatedAt,
}

/// Prize pool (one row per image)
#[derive(DeriveIden)]
enum Prizes {
    Table,
    Id,
    Image,
    Used,
    OpenedAt,
    WinnerCount,
    CreatedAt,
}

/// One row per (user, prize) win
#[derive(DeriveIden)]
enum Wins {
    Table,
    UserId,
    PrizeId,
    WonAt,
}

/// Claims rejected because the winner cap was reached
#[derive(DeriveIden)]
enum Missed {
    Table,
    Id,
    UserId,
    PrizeId,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Users::Coins)
                            .big_integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Users::Coins).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // id 使用 integer：SQLite 的 AUTOINCREMENT 只接受 INTEGER 主键
        manager
            .create_table(
                Table::create()
                    .table(Prizes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Prizes::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Prizes::Image).string_len(512).not_null())
                    .col(
                        ColumnDef::new(Prizes::Used)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Prizes::OpenedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Prizes::WinnerCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Prizes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // (user_id, prize_id) 复合主键即去重约束
        manager
            .create_table(
                Table::create()
                    .table(Wins::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Wins::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Wins::PrizeId).integer().not_null())
                    .col(
                        ColumnDef::new(Wins::WonAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(Index::create().col(Wins::UserId).col(Wins::PrizeId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_wins_user")
                            .from(Wins::Table, Wins::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_wins_prize")
                            .from(Wins::Table, Wins::PrizeId)
                            .to(Prizes::Table, Prizes::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // 无唯一约束：同一 (user, prize) 允许重复记录
        manager
            .create_table(
                Table::create()
                    .table(Missed::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Missed::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Missed::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Missed::PrizeId).integer().not_null())
                    .col(
                        ColumnDef::new(Missed::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_missed_user")
                            .from(Missed::Table, Missed::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_missed_prize")
                            .from(Missed::Table, Missed::PrizeId)
                            .to(Prizes::Table, Prizes::Id),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 删除顺序：missed -> wins -> prizes -> users
        manager
            .drop_table(Table::drop().if_exists().table(Missed::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Wins::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Prizes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
