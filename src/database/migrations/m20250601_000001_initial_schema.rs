use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_job_records_table(manager).await?;
        self.create_job_type_settings_table(manager).await?;
        self.create_group_chats_table(manager).await?;
        self.create_messages_table(manager).await?;
        self.create_accounts_table(manager).await?;
        self.create_group_members_table(manager).await?;
        self.create_message_links_table(manager).await?;
        self.create_graph_edges_table(manager).await?;
        self.create_left_chats_table(manager).await?;

        self.create_indexes(manager).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LeftChats::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GraphEdges::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MessageLinks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GroupMembers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Messages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GroupChats::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(JobTypeSettings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(JobRecords::Table).to_owned())
            .await?;

        Ok(())
    }
}

impl Migration {
    fn id_column(&self, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        col.integer().not_null().auto_increment().primary_key();
        col
    }

    fn timestamp_column(&self, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        col.timestamp_with_time_zone().not_null();
        col
    }

    fn flag_column(&self, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        col.boolean().not_null().default(false);
        col
    }

    async fn create_job_records_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(JobRecords::Table)
                    .if_not_exists()
                    .col(self.id_column(JobRecords::Id))
                    .col(ColumnDef::new(JobRecords::JobType).string().not_null())
                    .col(ColumnDef::new(JobRecords::State).string().not_null())
                    .col(
                        ColumnDef::new(JobRecords::Priority)
                            .integer()
                            .not_null()
                            .default(100),
                    )
                    .col(ColumnDef::new(JobRecords::Param1).string())
                    .col(ColumnDef::new(JobRecords::Param2).string())
                    .col(ColumnDef::new(JobRecords::Param3).string())
                    .col(ColumnDef::new(JobRecords::Param4).string())
                    .col(ColumnDef::new(JobRecords::Depth).integer())
                    .col(ColumnDef::new(JobRecords::CreatedBy).string().not_null())
                    .col(ColumnDef::new(JobRecords::Fingerprint).text().unique_key())
                    .col(
                        ColumnDef::new(JobRecords::Version)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(self.timestamp_column(JobRecords::CreatedAt))
                    .col(self.timestamp_column(JobRecords::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_job_type_settings_table(
        &self,
        manager: &SchemaManager<'_>,
    ) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(JobTypeSettings::Table)
                    .if_not_exists()
                    .col(self.id_column(JobTypeSettings::Id))
                    .col(
                        ColumnDef::new(JobTypeSettings::JobType)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(self.flag_column(JobTypeSettings::IsPaused))
                    .col(self.timestamp_column(JobTypeSettings::CreatedAt))
                    .col(self.timestamp_column(JobTypeSettings::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_group_chats_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GroupChats::Table)
                    .if_not_exists()
                    .col(self.id_column(GroupChats::Id))
                    .col(
                        ColumnDef::new(GroupChats::ChatId)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(GroupChats::SupergroupId).big_integer())
                    .col(ColumnDef::new(GroupChats::Title).string().not_null())
                    .col(ColumnDef::new(GroupChats::Handle).string())
                    .col(ColumnDef::new(GroupChats::Description).text())
                    .col(
                        ColumnDef::new(GroupChats::MemberCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(self.flag_column(GroupChats::IsChannel))
                    .col(self.flag_column(GroupChats::IsMemberListPublic))
                    .col(self.flag_column(GroupChats::IsAllHistoryAvailable))
                    .col(self.flag_column(GroupChats::IsStatisticsEnabled))
                    .col(self.flag_column(GroupChats::CanSendMessages))
                    .col(self.flag_column(GroupChats::CanSendMediaMessages))
                    .col(self.flag_column(GroupChats::CanSendPolls))
                    .col(self.flag_column(GroupChats::CanSendOtherMessages))
                    .col(self.flag_column(GroupChats::CanAddWebPagePreviews))
                    .col(self.flag_column(GroupChats::IsSupergroup))
                    .col(self.flag_column(GroupChats::Deleted))
                    .col(self.timestamp_column(GroupChats::CreatedAt))
                    .col(self.timestamp_column(GroupChats::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_messages_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Messages::Table)
                    .if_not_exists()
                    .col(self.id_column(Messages::Id))
                    .col(ColumnDef::new(Messages::MessageId).big_integer().not_null())
                    .col(ColumnDef::new(Messages::ChatId).big_integer().not_null())
                    .col(ColumnDef::new(Messages::AuthorId).big_integer().not_null())
                    .col(self.timestamp_column(Messages::Date))
                    .col(self.flag_column(Messages::IsForwarded))
                    .col(ColumnDef::new(Messages::ForwardOriginChatId).big_integer())
                    .col(ColumnDef::new(Messages::ForwardOriginMessageId).big_integer())
                    .col(ColumnDef::new(Messages::TextContent).text().not_null())
                    .col(ColumnDef::new(Messages::MessageType).string().not_null())
                    .col(ColumnDef::new(Messages::FileId).integer())
                    .col(ColumnDef::new(Messages::RemoteFileId).string())
                    .col(ColumnDef::new(Messages::RemoteUniqueId).string())
                    .col(ColumnDef::new(Messages::FileName).string())
                    .col(ColumnDef::new(Messages::Duration).integer())
                    .col(ColumnDef::new(Messages::Width).integer())
                    .col(ColumnDef::new(Messages::Height).integer())
                    .col(ColumnDef::new(Messages::TextEntities).json().not_null())
                    .col(self.timestamp_column(Messages::CreatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_accounts_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(self.id_column(Accounts::Id))
                    .col(
                        ColumnDef::new(Accounts::UserId)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Accounts::FirstName).string())
                    .col(ColumnDef::new(Accounts::LastName).string())
                    .col(ColumnDef::new(Accounts::Username).string())
                    .col(ColumnDef::new(Accounts::PhoneNumber).string())
                    .col(self.flag_column(Accounts::IsVerified))
                    .col(self.flag_column(Accounts::IsScam))
                    .col(self.flag_column(Accounts::IsFake))
                    .col(self.timestamp_column(Accounts::CreatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_group_members_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GroupMembers::Table)
                    .if_not_exists()
                    .col(self.id_column(GroupMembers::Id))
                    .col(ColumnDef::new(GroupMembers::ChatId).big_integer().not_null())
                    .col(ColumnDef::new(GroupMembers::UserId).big_integer().not_null())
                    .col(self.timestamp_column(GroupMembers::JoinedAt))
                    .col(self.timestamp_column(GroupMembers::CreatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_message_links_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MessageLinks::Table)
                    .if_not_exists()
                    .col(self.id_column(MessageLinks::Id))
                    .col(ColumnDef::new(MessageLinks::ChatId).big_integer().not_null())
                    .col(
                        ColumnDef::new(MessageLinks::MessageId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MessageLinks::Url).string_len(2048).not_null())
                    .col(ColumnDef::new(MessageLinks::Domain).string().not_null())
                    .col(self.timestamp_column(MessageLinks::CreatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_graph_edges_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GraphEdges::Table)
                    .if_not_exists()
                    .col(self.id_column(GraphEdges::Id))
                    .col(ColumnDef::new(GraphEdges::Connections).integer().not_null())
                    .col(ColumnDef::new(GraphEdges::TargetId).big_integer().not_null())
                    .col(ColumnDef::new(GraphEdges::TargetName).string().not_null())
                    .col(
                        ColumnDef::new(GraphEdges::TargetMemberCount)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GraphEdges::TargetForwardMessageCount)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GraphEdges::TargetOriginalMessageCount)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(GraphEdges::SourceId).big_integer().not_null())
                    .col(ColumnDef::new(GraphEdges::SourceName).string().not_null())
                    .col(
                        ColumnDef::new(GraphEdges::SourceMemberCount)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GraphEdges::SourceForwardMessageCount)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GraphEdges::SourceOriginalMessageCount)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(GraphEdges::ClusterId).integer())
                    .col(self.timestamp_column(GraphEdges::CreatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_left_chats_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LeftChats::Table)
                    .if_not_exists()
                    .col(self.id_column(LeftChats::Id))
                    .col(
                        ColumnDef::new(LeftChats::ChatId)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(self.timestamp_column(LeftChats::CreatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_indexes(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        // Batch selection
        manager
            .create_index(
                Index::create()
                    .name("idx_job_records_type_state")
                    .table(JobRecords::Table)
                    .col(JobRecords::JobType)
                    .col(JobRecords::State)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_group_chats_member_count")
                    .table(GroupChats::Table)
                    .col(GroupChats::MemberCount)
                    .to_owned(),
            )
            .await?;

        // Messages
        manager
            .create_index(
                Index::create()
                    .name("idx_messages_message_chat_unique")
                    .table(Messages::Table)
                    .col(Messages::MessageId)
                    .col(Messages::ChatId)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_messages_chat_id")
                    .table(Messages::Table)
                    .col(Messages::ChatId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_messages_forward_origin_chat_id")
                    .table(Messages::Table)
                    .col(Messages::ForwardOriginChatId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_messages_author_id")
                    .table(Messages::Table)
                    .col(Messages::AuthorId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_messages_date")
                    .table(Messages::Table)
                    .col(Messages::Date)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_group_members_chat_user_unique")
                    .table(GroupMembers::Table)
                    .col(GroupMembers::ChatId)
                    .col(GroupMembers::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Message links
        manager
            .create_index(
                Index::create()
                    .name("idx_message_links_chat_message_url_unique")
                    .table(MessageLinks::Table)
                    .col(MessageLinks::ChatId)
                    .col(MessageLinks::MessageId)
                    .col(MessageLinks::Url)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_message_links_domain")
                    .table(MessageLinks::Table)
                    .col(MessageLinks::Domain)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum JobRecords {
    Table,
    Id,
    JobType,
    State,
    Priority,
    Param1,
    Param2,
    Param3,
    Param4,
    Depth,
    CreatedBy,
    Fingerprint,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum JobTypeSettings {
    Table,
    Id,
    JobType,
    IsPaused,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum GroupChats {
    Table,
    Id,
    ChatId,
    SupergroupId,
    Title,
    Handle,
    Description,
    MemberCount,
    IsChannel,
    IsMemberListPublic,
    IsAllHistoryAvailable,
    IsStatisticsEnabled,
    CanSendMessages,
    CanSendMediaMessages,
    CanSendPolls,
    CanSendOtherMessages,
    CanAddWebPagePreviews,
    IsSupergroup,
    Deleted,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Messages {
    Table,
    Id,
    MessageId,
    ChatId,
    AuthorId,
    Date,
    IsForwarded,
    ForwardOriginChatId,
    ForwardOriginMessageId,
    TextContent,
    MessageType,
    FileId,
    RemoteFileId,
    RemoteUniqueId,
    FileName,
    Duration,
    Width,
    Height,
    TextEntities,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Accounts {
    Table,
    Id,
    UserId,
    FirstName,
    LastName,
    Username,
    PhoneNumber,
    IsVerified,
    IsScam,
    IsFake,
    CreatedAt,
}

#[derive(DeriveIden)]
enum GroupMembers {
    Table,
    Id,
    ChatId,
    UserId,
    JoinedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum MessageLinks {
    Table,
    Id,
    ChatId,
    MessageId,
    Url,
    Domain,
    CreatedAt,
}

#[derive(DeriveIden)]
enum GraphEdges {
    Table,
    Id,
    Connections,
    TargetId,
    TargetName,
    TargetMemberCount,
    TargetForwardMessageCount,
    TargetOriginalMessageCount,
    SourceId,
    SourceName,
    SourceMemberCount,
    SourceForwardMessageCount,
    SourceOriginalMessageCount,
    ClusterId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum LeftChats {
    Table,
    Id,
    ChatId,
    CreatedAt,
}
