//! SeaORM entity definitions, one module per table

pub mod prelude;

pub mod accounts;
pub mod graph_edges;
pub mod group_chats;
pub mod group_members;
pub mod job_records;
pub mod job_type_settings;
pub mod left_chats;
pub mod message_links;
pub mod messages;
