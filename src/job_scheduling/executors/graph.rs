//! Forward graph between crawled groups
//!
//! An edge `target <- source` counts the messages `target` forwarded from
//! `source`. Only pairs between known groups with enough traffic on both
//! sides are kept.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::CrawlContext;
use crate::config::GraphConfig;
use crate::job_scheduling::{JobError, JobType, RecurringJobExecutor};
use crate::models::{GraphEdge, GraphNode, GroupChat, MessageTotals};

pub struct CalculateGraphExecutor {
    ctx: Arc<CrawlContext>,
}

impl CalculateGraphExecutor {
    pub fn new(ctx: Arc<CrawlContext>) -> Self {
        Self { ctx }
    }
}

fn node(group: &GroupChat, totals: MessageTotals) -> GraphNode {
    GraphNode {
        chat_id: group.chat_id,
        name: group.title.clone(),
        member_count: group.member_count,
        forward_message_count: totals.forwarded,
        original_message_count: totals.original,
    }
}

/// Filter `(forwarding chat, origin chat, count)` triples into graph edges
pub fn build_edges(
    forward_counts: &[(i64, i64, i64)],
    totals: &HashMap<i64, MessageTotals>,
    groups: &HashMap<i64, GroupChat>,
    config: &GraphConfig,
) -> Vec<GraphEdge> {
    forward_counts
        .iter()
        .filter(|(target, source, count)| target != source && *count > config.min_connections)
        .filter_map(|&(target_id, source_id, connections)| {
            let target = groups.get(&target_id)?;
            let source = groups.get(&source_id)?;
            if target.member_count != 0 && target.member_count <= config.min_member_count {
                return None;
            }

            let target_totals = totals.get(&target_id).copied().unwrap_or_default();
            let source_totals = totals.get(&source_id).copied().unwrap_or_default();
            if target_totals.total() <= config.min_messages || source_totals.total() <= config.min_messages {
                return None;
            }

            Some(GraphEdge {
                connections,
                target: node(target, target_totals),
                source: node(source, source_totals),
            })
        })
        .collect()
}

#[async_trait]
impl RecurringJobExecutor for CalculateGraphExecutor {
    fn job_type(&self) -> JobType {
        JobType::CalculateGraph
    }

    async fn execute(&self) -> Result<(), JobError> {
        let repositories = &self.ctx.repositories;
        let config = &self.ctx.config.graph;

        let totals = repositories.messages.totals_by_chat().await?;
        let forward_counts = repositories.messages.forward_counts().await?;
        let groups: HashMap<i64, GroupChat> = repositories
            .group_chats
            .find_all()
            .await?
            .into_iter()
            .map(|g| (g.chat_id, g))
            .collect();

        let edges = build_edges(&forward_counts, &totals, &groups, config);
        repositories.graph_edges.replace_all(&edges, config.chunk_size).await?;

        info!(
            "Persisted new graph: {} edges from {} forward pairs",
            edges.len(),
            forward_counts.len()
        );
        Ok(())
    }
}
