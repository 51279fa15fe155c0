use crate::metrics::{Op, Outcome, SyncMetrics};
use ahash::AHashMap as HashMap;
use anyhow::{anyhow, Result};
use hub_agent_core::{
    sync::{ClusterResource, PlatformResource, ResourceHandler, ResourceLister},
    ResourceKey,
};
use std::future::Future;
use tokio::time;
use tracing::{debug, error, info};

/// Converges one kind of cluster object toward the platform's desired state.
pub struct ResourceSyncer<L, H> {
    kind: &'static str,
    platform: L,
    cluster: H,
    timeout: time::Duration,
    metrics: SyncMetrics,
}

// === impl ResourceSyncer ===

impl<L, H> ResourceSyncer<L, H>
where
    L: ResourceLister,
    H: ResourceHandler,
    L::Item: PlatformResource<Resource = H::Resource>,
{
    pub fn new(
        kind: &'static str,
        platform: L,
        cluster: H,
        timeout: time::Duration,
        metrics: SyncMetrics,
    ) -> Self {
        Self {
            kind,
            platform,
            cluster,
            timeout,
            metrics,
        }
    }

    /// Runs a synchronization pass every `interval` until shutdown is
    /// signaled. A pass that has started is allowed to complete.
    pub async fn run(self, interval: time::Duration, shutdown: drain::Watch) {
        let mut ticks = time::interval(interval);
        ticks.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        let shutdown = shutdown.signaled();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(kind = self.kind, "Synchronization stopped");
                    return;
                }
                _ = ticks.tick() => self.sync().await,
            }
        }
    }

    /// Performs a single synchronization pass.
    ///
    /// Failures are logged and never returned: a pass that cannot list either
    /// side writes nothing, and a failure on one item does not prevent the
    /// others. Every cluster object left unmatched by the platform is deleted.
    pub async fn sync(&self) {
        let kind = self.kind;

        let desired = match self.call(self.platform.list()).await {
            Ok(desired) => desired,
            Err(error) => {
                error!(kind, %error, "Failed to list platform resources");
                self.metrics.pass(kind, Outcome::Aborted);
                return;
            }
        };

        let existing = match self.call(self.cluster.list()).await {
            Ok(existing) => existing,
            Err(error) => {
                error!(kind, %error, "Failed to list cluster resources");
                self.metrics.pass(kind, Outcome::Aborted);
                return;
            }
        };
        debug!(
            kind,
            platform = desired.len(),
            cluster = existing.len(),
            "Synchronizing"
        );

        let mut orphans = existing
            .into_iter()
            .map(|r| (r.key(), r))
            .collect::<HashMap<ResourceKey, H::Resource>>();

        for item in desired {
            let new = match item.resource() {
                Ok(new) => {
                    self.metrics.operation(kind, Op::Materialize, true);
                    new
                }
                Err(error) => {
                    error!(kind, %error, "Failed to build cluster resource");
                    self.metrics.operation(kind, Op::Materialize, false);
                    continue;
                }
            };

            let key = new.key();
            match orphans.remove(&key) {
                None => match self.call(self.cluster.create(new)).await {
                    Ok(()) => {
                        info!(kind, %key, "Created");
                        self.metrics.operation(kind, Op::Create, true);
                    }
                    Err(error) => {
                        error!(kind, %key, %error, "Failed to create resource");
                        self.metrics.operation(kind, Op::Create, false);
                    }
                },
                Some(old) => match self.call(self.cluster.update(old, new)).await {
                    Ok(()) => self.metrics.operation(kind, Op::Update, true),
                    Err(error) => {
                        error!(kind, %key, %error, "Failed to update resource");
                        self.metrics.operation(kind, Op::Update, false);
                    }
                },
            }
        }

        for (key, old) in orphans {
            match self.call(self.cluster.delete(old)).await {
                Ok(()) => {
                    info!(kind, %key, "Deleted");
                    self.metrics.operation(kind, Op::Delete, true);
                }
                Err(error) => {
                    error!(kind, %key, %error, "Failed to delete resource");
                    self.metrics.operation(kind, Op::Delete, false);
                }
            }
        }

        self.metrics.pass(kind, Outcome::Completed);
    }

    async fn call<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match time::timeout(self.timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(anyhow!("timed out after {:?}", self.timeout)),
        }
    }
}
