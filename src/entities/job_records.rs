use sea_orm::entity::prelude::*;

/// A persisted unit of crawl work. `job_type` and `state` hold enum names.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "job_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub job_type: String,
    pub state: String,
    pub priority: i32,
    pub param1: Option<String>,
    pub param2: Option<String>,
    pub param3: Option<String>,
    pub param4: Option<String>,
    pub depth: Option<i32>,
    pub created_by: String,
    /// Encoded (type, param1..4); NULL for recurring-run markers
    #[sea_orm(unique)]
    pub fingerprint: Option<String>,
    pub version: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
