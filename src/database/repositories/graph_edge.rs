//! SeaORM-based repository for the derived forward graph

use chrono::Utc;
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder, Set, TransactionTrait};
use std::sync::Arc;
use tracing::debug;

use crate::entities::{graph_edges, prelude::GraphEdges};
use crate::errors::RepositoryResult;
use crate::models::{GraphEdge, GraphNode};

#[derive(Clone)]
pub struct GraphEdgeSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl GraphEdgeSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Swap the whole edge table for `edges` in one transaction
    pub async fn replace_all(&self, edges: &[GraphEdge], chunk_size: usize) -> RepositoryResult<()> {
        let txn = self.connection.begin().await?;
        let removed = GraphEdges::delete_many().exec(&txn).await?;

        let now = Utc::now();
        for chunk in edges.chunks(chunk_size.max(1)) {
            let models = chunk.iter().map(|edge| graph_edges::ActiveModel {
                connections: Set(saturating_i32(edge.connections)),
                target_id: Set(edge.target.chat_id),
                target_name: Set(edge.target.name.clone()),
                target_member_count: Set(edge.target.member_count),
                target_forward_message_count: Set(saturating_i32(edge.target.forward_message_count)),
                target_original_message_count: Set(saturating_i32(
                    edge.target.original_message_count,
                )),
                source_id: Set(edge.source.chat_id),
                source_name: Set(edge.source.name.clone()),
                source_member_count: Set(edge.source.member_count),
                source_forward_message_count: Set(saturating_i32(edge.source.forward_message_count)),
                source_original_message_count: Set(saturating_i32(
                    edge.source.original_message_count,
                )),
                cluster_id: Set(None),
                created_at: Set(now),
                ..Default::default()
            });
            GraphEdges::insert_many(models).exec(&txn).await?;
        }

        txn.commit().await?;
        debug!(
            "Replaced {} graph edges with {}",
            removed.rows_affected,
            edges.len()
        );
        Ok(())
    }

    pub async fn find_all(&self) -> RepositoryResult<Vec<GraphEdge>> {
        Ok(GraphEdges::find()
            .order_by_asc(graph_edges::Column::Id)
            .all(&*self.connection)
            .await?
            .into_iter()
            .map(|m| GraphEdge {
                connections: i64::from(m.connections),
                target: GraphNode {
                    chat_id: m.target_id,
                    name: m.target_name,
                    member_count: m.target_member_count,
                    forward_message_count: i64::from(m.target_forward_message_count),
                    original_message_count: i64::from(m.target_original_message_count),
                },
                source: GraphNode {
                    chat_id: m.source_id,
                    name: m.source_name,
                    member_count: m.source_member_count,
                    forward_message_count: i64::from(m.source_forward_message_count),
                    original_message_count: i64::from(m.source_original_message_count),
                },
            })
            .collect())
    }
}

fn saturating_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
