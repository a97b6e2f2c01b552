use std::collections::{BTreeMap, BTreeSet};

use tokio::sync::Mutex;

/// Which frame origins follow which assets, keyed by stringified WAL.
#[derive(Default)]
pub struct AssetSubscriptions {
    by_wal: Mutex<BTreeMap<String, BTreeSet<String>>>,
}

impl AssetSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the origin already followed the asset.
    pub async fn subscribe(&self, wal_key: &str, origin: &str) -> bool {
        self.by_wal
            .lock()
            .await
            .entry(wal_key.to_string())
            .or_default()
            .insert(origin.to_string())
    }

    pub async fn unsubscribe(&self, wal_key: &str, origin: &str) -> bool {
        let mut by_wal = self.by_wal.lock().await;
        let Some(origins) = by_wal.get_mut(wal_key) else {
            return false;
        };
        let removed = origins.remove(origin);
        if origins.is_empty() {
            by_wal.remove(wal_key);
        }
        removed
    }

    /// Stop everything `origin` follows. Returns how many assets it dropped.
    pub async fn forget_origin(&self, origin: &str) -> usize {
        let mut dropped = 0;
        self.by_wal.lock().await.retain(|_, origins| {
            if origins.remove(origin) {
                dropped += 1;
            }
            !origins.is_empty()
        });
        dropped
    }

    pub async fn is_empty(&self) -> bool {
        self.by_wal.lock().await.is_empty()
    }

    pub async fn subscribers(&self, wal_key: &str) -> Vec<String> {
        self.by_wal
            .lock()
            .await
            .get(wal_key)
            .map(|origins| origins.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_unsubscribe() {
        let subs = AssetSubscriptions::new();
        assert!(subs.subscribe("w1", "applet://a").await);
        assert!(!subs.subscribe("w1", "applet://a").await);
        assert!(subs.subscribe("w1", "applet://b").await);
        assert_eq!(subs.subscribers("w1").await, vec!["applet://a", "applet://b"]);

        assert!(subs.unsubscribe("w1", "applet://a").await);
        assert!(!subs.unsubscribe("w1", "applet://a").await);
        assert!(subs.unsubscribe("w1", "applet://b").await);
        assert!(subs.subscribers("w1").await.is_empty());
        assert!(!subs.unsubscribe("w2", "applet://b").await);
    }

    #[tokio::test]
    async fn forgetting_an_origin_keeps_the_others() {
        let subs = AssetSubscriptions::new();
        subs.subscribe("w1", "applet://a").await;
        subs.subscribe("w2", "applet://a").await;
        subs.subscribe("w2", "applet://b").await;

        assert_eq!(subs.forget_origin("applet://a").await, 2);
        assert!(subs.subscribers("w1").await.is_empty());
        assert_eq!(subs.subscribers("w2").await, vec!["applet://b"]);
        assert_eq!(subs.forget_origin("applet://a").await, 0);

        subs.forget_origin("applet://b").await;
        assert!(subs.is_empty().await);
    }
}
