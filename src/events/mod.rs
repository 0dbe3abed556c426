use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::category::Category;
use crate::models::menu::Menu;
use crate::tree::TreeCache;
use crate::utils::utc_now;

#[derive(Debug, Clone, Serialize)]
pub struct DomainEvent<T> {
    pub id: Uuid,
    pub name: &'static str,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub payload: T,
}

impl<T> DomainEvent<T> {
    pub fn new(name: &'static str, actor_id: Option<Uuid>, payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            occurred_at: utc_now(),
            actor_id,
            payload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TreeKind {
    Menu,
    Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TreeAction {
    Created,
    Moved,
    Updated,
    Disabled,
    Deleted,
}

/// A row of a hierarchical table changed. Any cached index of that kind is stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TreeChanged {
    pub kind: TreeKind,
    pub action: TreeAction,
    pub node_id: i64,
}

pub type TreeEvent = DomainEvent<TreeChanged>;

pub type EventBus = broadcast::Sender<TreeEvent>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<TreeEvent>) {
    broadcast::channel(256)
}

/// Announces a tree mutation made by the host's write layer.
pub fn publish_tree_changed(
    event_bus: &EventBus,
    actor_id: Option<Uuid>,
    kind: TreeKind,
    action: TreeAction,
    node_id: i64,
) {
    let event = DomainEvent::new("tree.changed", actor_id, TreeChanged { kind, action, node_id });

    // No subscribers means no caches to invalidate.
    if event_bus.send(event).is_err() {
        tracing::debug!(?kind, node_id, "tree change published with no listeners");
    }
}

/// Drops cached indexes as change events arrive. Runs until the bus closes.
pub async fn start_cache_listener(
    mut rx: broadcast::Receiver<TreeEvent>,
    menus: Arc<TreeCache<Menu>>,
    categories: Arc<TreeCache<Category>>,
) {
    tracing::info!("tree cache listener started");
    loop {
        match rx.recv().await {
            Ok(event) => {
                tracing::debug!(
                    kind = ?event.payload.kind,
                    action = ?event.payload.action,
                    node_id = event.payload.node_id,
                    "tree changed"
                );
                match event.payload.kind {
                    TreeKind::Menu => menus.invalidate().await,
                    TreeKind::Category => categories.invalidate().await,
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "tree cache listener lagged; invalidating all caches");
                menus.invalidate().await;
                categories.invalidate().await;
            }
            Err(RecvError::Closed) => break,
        }
    }
    tracing::info!("tree cache listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;

    #[tokio::test]
    async fn test_listener_invalidates_matching_cache() {
        let menus = Arc::new(TreeCache::<Menu>::new(true));
        let categories = Arc::new(TreeCache::<Category>::new(true));
        menus
            .get_or_build(|| async { Ok::<_, AppError>(vec![Menu::new(1, None, "Root", 0)]) })
            .await
            .unwrap();
        categories
            .get_or_build(|| async { Ok::<_, AppError>(vec![Category::new(1, None, "Root", 0)]) })
            .await
            .unwrap();

        let (bus, rx) = init_event_bus();
        let listener = tokio::spawn(start_cache_listener(rx, Arc::clone(&menus), Arc::clone(&categories)));

        publish_tree_changed(&bus, None, TreeKind::Menu, TreeAction::Moved, 1);
        drop(bus);
        listener.await.unwrap();

        assert!(!menus.is_warm().await);
        assert!(categories.is_warm().await);
    }
}
