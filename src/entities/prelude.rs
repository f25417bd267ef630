pub use super::accounts::Entity as Accounts;
pub use super::graph_edges::Entity as GraphEdges;
pub use super::group_chats::Entity as GroupChats;
pub use super::group_members::Entity as GroupMembers;
pub use super::job_records::Entity as JobRecords;
pub use super::job_type_settings::Entity as JobTypeSettings;
pub use super::left_chats::Entity as LeftChats;
pub use super::message_links::Entity as MessageLinks;
pub use super::messages::Entity as Messages;
