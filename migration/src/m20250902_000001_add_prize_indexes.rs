use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Prizes {
    Table,
    Used,
}

#[derive(DeriveIden)]
enum Wins {
    Table,
    PrizeId,
}

#[derive(DeriveIden)]
enum Missed {
    Table,
    UserId,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 调度器按 used = false 取随机奖品
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_prizes_used")
                    .table(Prizes::Table)
                    .col(Prizes::Used)
                    .to_owned(),
            )
            .await?;

        // 按奖品统计获奖人数
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_wins_prize")
                    .table(Wins::Table)
                    .col(Wins::PrizeId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_missed_user")
                    .table(Missed::Table)
                    .col(Missed::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_missed_user").table(Missed::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_wins_prize").table(Wins::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_prizes_used").table(Prizes::Table).to_owned())
            .await?;
        Ok(())
    }
}
