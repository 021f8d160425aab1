//! Periodic expiry of unclaimed scratch files.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ReaperConfig;
use crate::store::ArtifactStore;

/// Start the reaper if enabled.
pub fn spawn(store: ArtifactStore, config: &ReaperConfig) -> Option<JoinHandle<()>> {
    if !config.enabled {
        debug!("Scratch reaper disabled");
        return None;
    }
    let (interval, max_age) = (config.interval(), config.max_age());
    info!(
        interval_secs = interval.as_secs(),
        max_age_secs = max_age.as_secs(),
        "Starting scratch reaper"
    );
    Some(tokio::spawn(reaper_task(store, interval, max_age)))
}

/// Sweep the scratch directory every `interval`, forever.
pub async fn reaper_task(store: ArtifactStore, interval: Duration, max_age: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        match store.sweep_expired(max_age).await {
            Ok(0) => {}
            Ok(removed) => info!(removed = removed, "Expired stale scratch files"),
            Err(e) => warn!(error = %e, root = %store.root().display(), "Scratch sweep failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reaper_removes_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let stale = dir.path().join(format!("{}_stale.stl", uuid::Uuid::new_v4()));
        std::fs::write(&stale, b"x").unwrap();
        let foreign = dir.path().join("stale.stl");
        std::fs::write(&foreign, b"x").unwrap();

        let handle = tokio::spawn(reaper_task(
            store,
            Duration::from_millis(10),
            Duration::ZERO,
        ));
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.abort();
        assert!(!stale.exists());
        assert!(foreign.exists());
    }

    #[tokio::test]
    async fn test_disabled_reaper_not_spawned() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let config = ReaperConfig {
            enabled: false,
            ..ReaperConfig::default()
        };
        assert!(spawn(store, &config).is_none());
    }
}
