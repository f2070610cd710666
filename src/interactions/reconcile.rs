//! Out-of-band counter repair. Recounts live interactions and overwrites the
//! post counters. Never called from the request path.

use serde::Serialize;

use crate::db::models::InteractionKind;
use crate::error::{AppError, AppResult};
use crate::store::{DynEntityStore, PostCounters};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub post_id: String,
    pub likes_count: i64,
    pub comments_count: i64,
    /// Stored counter minus live count, before the repair.
    pub likes_drift: i64,
    pub comments_drift: i64,
}

impl Reconciliation {
    pub fn drifted(&self) -> bool {
        self.likes_drift != 0 || self.comments_drift != 0
    }
}

pub async fn reconcile_post_counters(
    store: &DynEntityStore,
    post_id: &str,
) -> AppResult<Reconciliation> {
    let post = store
        .get_post(post_id)
        .await?
        .ok_or_else(|| AppError::not_found("post not found"))?;

    let live = PostCounters {
        likes_count: store.count_interactions(post_id, InteractionKind::Like).await?,
        comments_count: store
            .count_interactions(post_id, InteractionKind::Comment)
            .await?,
    };

    let report = Reconciliation {
        post_id: post_id.to_string(),
        likes_count: live.likes_count,
        comments_count: live.comments_count,
        likes_drift: post.likes_count - live.likes_count,
        comments_drift: post.comments_count - live.comments_count,
    };

    if report.drifted() {
        // Writes racing with this overwrite are lost; run it when traffic is idle.
        store.set_post_counters(post_id, live).await?;
        tracing::warn!(
            "Repaired counters on post {}: likes drift {}, comments drift {}",
            post_id,
            report.likes_drift,
            report.comments_drift
        );
    }

    Ok(report)
}

/// Reconcile every post. Returns only the posts that had drifted.
pub async fn reconcile_all(store: &DynEntityStore) -> AppResult<Vec<Reconciliation>> {
    let mut repaired = Vec::new();
    for post_id in store.list_post_ids().await? {
        let report = reconcile_post_counters(store, &post_id).await?;
        if report.drifted() {
            repaired.push(report);
        }
    }
    tracing::info!("Reconciliation finished, {} posts repaired", repaired.len());
    Ok(repaired)
}
