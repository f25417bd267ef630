//! SeaORM repository implementations
//!
//! Repositories work across SQLite, PostgreSQL and MySQL and convert entity
//! models into domain types.

pub mod account;
pub mod graph_edge;
pub mod group_chat;
pub mod job_record;
pub mod job_type_settings;
pub mod left_chat;
pub mod message;
pub mod message_link;

// Re-export for convenience
pub use account::{AccountSeaOrmRepository, GroupMemberSeaOrmRepository};
pub use graph_edge::GraphEdgeSeaOrmRepository;
pub use group_chat::GroupChatSeaOrmRepository;
pub use job_record::{GroupedCounts, JobRecordSeaOrmRepository, RecoveryStats};
pub use job_type_settings::JobTypeSettingsSeaOrmRepository;
pub use left_chat::LeftChatSeaOrmRepository;
pub use message::MessageSeaOrmRepository;
pub use message_link::MessageLinkSeaOrmRepository;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// All repositories over one connection pool
#[derive(Clone)]
pub struct Repositories {
    pub job_records: JobRecordSeaOrmRepository,
    pub job_type_settings: JobTypeSettingsSeaOrmRepository,
    pub group_chats: GroupChatSeaOrmRepository,
    pub messages: MessageSeaOrmRepository,
    pub accounts: AccountSeaOrmRepository,
    pub group_members: GroupMemberSeaOrmRepository,
    pub message_links: MessageLinkSeaOrmRepository,
    pub graph_edges: GraphEdgeSeaOrmRepository,
    pub left_chats: LeftChatSeaOrmRepository,
}

impl Repositories {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self {
            job_records: JobRecordSeaOrmRepository::new(connection.clone()),
            job_type_settings: JobTypeSettingsSeaOrmRepository::new(connection.clone()),
            group_chats: GroupChatSeaOrmRepository::new(connection.clone()),
            messages: MessageSeaOrmRepository::new(connection.clone()),
            accounts: AccountSeaOrmRepository::new(connection.clone()),
            group_members: GroupMemberSeaOrmRepository::new(connection.clone()),
            message_links: MessageLinkSeaOrmRepository::new(connection.clone()),
            graph_edges: GraphEdgeSeaOrmRepository::new(connection.clone()),
            left_chats: LeftChatSeaOrmRepository::new(connection),
        }
    }
}
