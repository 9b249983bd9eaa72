//! Create community and `community_member` tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Community::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Community::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Community::Name)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Community::Description).text())
                    .col(
                        ColumnDef::new(Community::CreatorId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Community::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_community_creator")
                            .from(Community::Table, Community::CreatorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: created_at (newest-first listing)
        manager
            .create_index(
                Index::create()
                    .name("idx_community_created_at")
                    .table(Community::Table)
                    .col(Community::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CommunityMember::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CommunityMember::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CommunityMember::CommunityId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CommunityMember::UserId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CommunityMember::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_community_member_community")
                            .from(CommunityMember::Table, CommunityMember::CommunityId)
                            .to(Community::Table, Community::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_community_member_user")
                            .from(CommunityMember::Table, CommunityMember::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (community_id, user_id) - one membership per user per community
        manager
            .create_index(
                Index::create()
                    .name("idx_community_member_community_user")
                    .table(CommunityMember::Table)
                    .col(CommunityMember::CommunityId)
                    .col(CommunityMember::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CommunityMember::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Community::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Community {
    Table,
    Id,
    Name,
    Description,
    CreatorId,
    CreatedAt,
}

#[derive(Iden)]
enum CommunityMember {
    Table,
    Id,
    CommunityId,
    UserId,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
