use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::{MediaInfo, TextEntity};

/// A group discovered by the crawl
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupChat {
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
}

/// A message ready to be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub message_id: i64,
    pub chat_id: i64,
    pub author_id: i64,
    pub date: DateTime<Utc>,
    pub forward_origin: Option<(i64, i64)>,
    pub text: String,
    pub message_type: String,
    pub entities: Vec<TextEntity>,
    pub media: MediaInfo,
}

/// Message totals of one group, split by forwarded flag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageTotals {
    pub forwarded: i64,
    pub original: i64,
}

impl MessageTotals {
    pub fn total(&self) -> i64 {
        self.forwarded + self.original
    }
}

/// `target` forwarded `connections` messages that originate in `source`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub connections: i64,
    pub target: GraphNode,
    pub source: GraphNode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub chat_id: i64,
    pub name: String,
    pub member_count: i32,
    pub forward_message_count: i64,
    pub original_message_count: i64,
}
