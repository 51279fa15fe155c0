use crate::{Compile, HandlerSwitcher, Policy, PolicyEvent, RoutingEntry, RoutingTable};
use ahash::AHashMap as HashMap;
use hub_agent_core::ResourceKey;
use hub_agent_k8s_api::hub::AccessControlPolicy;
use prometheus_client::{metrics::counter::Counter, registry::Registry};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Rebuilds the routing table as policies change.
///
/// All compilation happens on the task driving [`PolicyWatcher::run`], which
/// is the only writer of the table.
pub struct PolicyWatcher {
    rx: mpsc::Receiver<PolicyEvent>,
    policies: HashMap<ResourceKey, Policy>,
    compiler: Arc<dyn Compile>,
    switcher: HandlerSwitcher,
    generation: u64,
    metrics: WatcherMetrics,
}

/// Feeds policy changes to a [`PolicyWatcher`].
///
/// Sending never blocks: when the watcher falls behind and its queue is full,
/// the event is dropped and the next relist restores it.
#[derive(Clone, Debug)]
pub struct PolicyEvents {
    tx: mpsc::Sender<PolicyEvent>,
}

#[derive(Clone, Debug, Default)]
pub struct WatcherMetrics {
    compile_failures: Counter,
}

// === impl PolicyWatcher ===

impl PolicyWatcher {
    pub fn new(
        compiler: Arc<dyn Compile>,
        switcher: HandlerSwitcher,
        queue_size: usize,
        metrics: WatcherMetrics,
    ) -> (Self, PolicyEvents) {
        let (tx, rx) = mpsc::channel(queue_size);
        let generation = switcher.table().generation();
        let watcher = Self {
            rx,
            policies: HashMap::default(),
            compiler,
            switcher,
            generation,
            metrics,
        };
        (watcher, PolicyEvents { tx })
    }

    /// Processes events until shutdown is signaled or every [`PolicyEvents`]
    /// handle is dropped. Events still queued at shutdown are discarded.
    pub async fn run(mut self, shutdown: drain::Watch) {
        let shutdown = shutdown.signaled();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Policy watcher stopped");
                    return;
                }
                event = self.rx.recv() => match event {
                    Some(event) => self.process(event),
                    None => {
                        debug!("Policy event sources closed");
                        return;
                    }
                },
            }
        }
    }

    fn process(&mut self, event: PolicyEvent) {
        let changed = match event {
            PolicyEvent::Upsert(policy) => {
                let key = policy.key.clone();
                let changed = self.policies.get(&key) != Some(&policy);
                self.policies.insert(key, policy);
                changed
            }
            PolicyEvent::Delete(key) => self.policies.remove(&key).is_some(),
        };
        if changed {
            self.publish();
        }
    }

    /// Compiles every known policy into a new table and publishes it.
    fn publish(&mut self) {
        let mut entries = Vec::with_capacity(self.policies.len());
        for (key, policy) in &self.policies {
            let fingerprint = match policy.fingerprint() {
                Ok(fingerprint) => fingerprint,
                Err(error) => {
                    error!(%key, %error, "Failed to fingerprint policy");
                    self.metrics.compile_failures.inc();
                    continue;
                }
            };
            match self.compiler.compile(policy) {
                Ok(handler) => entries.push((key.clone(), RoutingEntry::new(handler, fingerprint))),
                Err(error) => {
                    error!(%key, %error, "Failed to compile policy");
                    self.metrics.compile_failures.inc();
                }
            }
        }

        self.generation += 1;
        let table = RoutingTable::new(self.generation, entries);
        debug!(generation = self.generation, entries = table.len(), "Publishing routing table");
        self.switcher.replace(table);
    }
}

// === impl PolicyEvents ===

impl PolicyEvents {
    pub fn on_add(&self, acp: AccessControlPolicy) {
        self.upsert(acp);
    }

    pub fn on_update(&self, acp: AccessControlPolicy) {
        self.upsert(acp);
    }

    pub fn on_delete(&self, acp: AccessControlPolicy) {
        match Policy::from_resource(acp) {
            Ok(policy) => self.send(PolicyEvent::Delete(policy.key)),
            Err(error) => warn!(%error, "Dropping malformed policy deletion"),
        }
    }

    fn upsert(&self, acp: AccessControlPolicy) {
        match Policy::from_resource(acp) {
            Ok(policy) => self.send(PolicyEvent::Upsert(policy)),
            Err(error) => warn!(%error, "Dropping malformed policy"),
        }
    }

    fn send(&self, event: PolicyEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                error!(key = %event.key(), "Policy event queue is full; dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                debug!(key = %event.key(), "Policy watcher stopped; dropping event");
            }
        }
    }
}

impl kubert::index::IndexNamespacedResource<AccessControlPolicy> for PolicyEvents {
    fn apply(&mut self, acp: AccessControlPolicy) {
        self.on_update(acp);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.send(PolicyEvent::Delete(ResourceKey::new(name, Some(&namespace))));
    }
}

// === impl WatcherMetrics ===

impl WatcherMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let compile_failures = Counter::default();
        prom.register(
            "policy_compile_failures",
            "Count of policies that failed to compile",
            compile_failures.clone(),
        );
        Self { compile_failures }
    }

    #[cfg(test)]
    pub(crate) fn compile_failures(&self) -> u64 {
        self.compile_failures.get()
    }
}
