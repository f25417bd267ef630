use sea_orm::entity::prelude::*;

/// Derived forward relation between two groups. The target group forwarded
/// `connections` messages originating in the source group.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "graph_edges")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub connections: i32,
    pub target_id: i64,
    pub target_name: String,
    pub target_member_count: i32,
    pub target_forward_message_count: i32,
    pub target_original_message_count: i32,
    pub source_id: i64,
    pub source_name: String,
    pub source_member_count: i32,
    pub source_forward_message_count: i32,
    pub source_original_message_count: i32,
    pub cluster_id: Option<i32>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
