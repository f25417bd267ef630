use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub message_id: i64,
    pub chat_id: i64,
    pub author_id: i64,
    pub date: DateTimeUtc,
    pub is_forwarded: bool,
    pub forward_origin_chat_id: Option<i64>,
    pub forward_origin_message_id: Option<i64>,
    pub text_content: String,
    pub message_type: String,
    pub file_id: Option<i32>,
    pub remote_file_id: Option<String>,
    pub remote_unique_id: Option<String>,
    pub file_name: Option<String>,
    pub duration: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    /// `[{"kind": "url", "offset": 0, "length": 18}, ...]`
    pub text_entities: Json,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
