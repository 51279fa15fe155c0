use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

/// Counters describing the outcome of synchronization passes.
#[derive(Clone, Debug, Default)]
pub struct SyncMetrics {
    operations: Family<OperationLabels, Counter>,
    passes: Family<PassLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct OperationLabels {
    kind: &'static str,
    op: &'static str,
    result: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct PassLabels {
    kind: &'static str,
    outcome: &'static str,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Op {
    Materialize,
    Create,
    Update,
    Delete,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Completed,
    /// Either side could not be listed; nothing was written.
    Aborted,
}

// === impl SyncMetrics ===

impl SyncMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let operations = Family::default();
        prom.register(
            "sync_operations",
            "Count of cluster operations issued by synchronization passes",
            operations.clone(),
        );

        let passes = Family::default();
        prom.register(
            "sync_passes",
            "Count of synchronization passes by outcome",
            passes.clone(),
        );

        Self { operations, passes }
    }

    pub(crate) fn operation(&self, kind: &'static str, op: Op, ok: bool) {
        let op = match op {
            Op::Materialize => "materialize",
            Op::Create => "create",
            Op::Update => "update",
            Op::Delete => "delete",
        };
        let result = if ok { "success" } else { "failure" };
        self.operations
            .get_or_create(&OperationLabels { kind, op, result })
            .inc();
    }

    pub(crate) fn pass(&self, kind: &'static str, outcome: Outcome) {
        let outcome = match outcome {
            Outcome::Completed => "completed",
            Outcome::Aborted => "aborted",
        };
        self.passes.get_or_create(&PassLabels { kind, outcome }).inc();
    }

    #[cfg(test)]
    pub(crate) fn operations(&self, kind: &'static str, op: &'static str, result: &'static str) -> u64 {
        self.operations
            .get_or_create(&OperationLabels { kind, op, result })
            .get()
    }

    #[cfg(test)]
    pub(crate) fn passes(&self, kind: &'static str, outcome: &'static str) -> u64 {
        self.passes.get_or_create(&PassLabels { kind, outcome }).get()
    }
}
