use sea_orm::entity::prelude::*;

/// A discovered group or supergroup
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "group_chats")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub chat_id: i64,
    pub supergroup_id: Option<i64>,
    pub title: String,
    pub handle: Option<String>,
    pub description: Option<String>,
    /// 0 when unknown
    pub member_count: i32,
    pub is_channel: bool,
    pub is_member_list_public: bool,
    pub is_all_history_available: bool,
    pub is_statistics_enabled: bool,
    pub can_send_messages: bool,
    pub can_send_media_messages: bool,
    pub can_send_polls: bool,
    pub can_send_other_messages: bool,
    pub can_add_web_page_previews: bool,
    pub is_supergroup: bool,
    pub deleted: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
