use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Appends (committed events, conflicts)
// - Replays (events folded, snapshot vs genesis starts, duration)
// - Snapshot compaction outcomes
//
// Snapshot write failures never fail an append; this registry (together with
// the tracing warning) is where they become visible.
// ============================================================================

/// Label value for replays that started from a snapshot
pub const SOURCE_SNAPSHOT: &str = "snapshot";
/// Label value for replays that started from the first event
pub const SOURCE_GENESIS: &str = "genesis";

pub struct Metrics {
    registry: Registry,

    // Write path
    pub events_appended: IntCounterVec,
    pub append_conflicts: IntCounterVec,

    // Read path
    pub events_replayed: IntCounterVec,
    pub replays: IntCounterVec,
    pub replay_duration: HistogramVec,

    // Compaction
    pub snapshot_writes: IntCounterVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let events_appended = IntCounterVec::new(
            Opts::new("events_appended_total", "Events committed to the log"),
            &["aggregate_type"],
        )?;
        registry.register(Box::new(events_appended.clone()))?;

        let append_conflicts = IntCounterVec::new(
            Opts::new("append_conflicts_total", "Appends rejected on expected version"),
            &["aggregate_type"],
        )?;
        registry.register(Box::new(append_conflicts.clone()))?;

        let events_replayed = IntCounterVec::new(
            Opts::new("events_replayed_total", "Events folded into state during reads"),
            &["aggregate_type"],
        )?;
        registry.register(Box::new(events_replayed.clone()))?;

        let replays = IntCounterVec::new(
            Opts::new("replays_total", "State rebuilds by starting point"),
            &["aggregate_type", "source"],
        )?;
        registry.register(Box::new(replays.clone()))?;

        let replay_duration = HistogramVec::new(
            HistogramOpts::new("replay_duration_seconds", "Time to rebuild state")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["aggregate_type"],
        )?;
        registry.register(Box::new(replay_duration.clone()))?;

        let snapshot_writes = IntCounterVec::new(
            Opts::new("snapshot_writes_total", "Snapshot writes by outcome"),
            &["aggregate_type", "outcome"],
        )?;
        registry.register(Box::new(snapshot_writes.clone()))?;

        Ok(Self {
            registry,
            events_appended,
            append_conflicts,
            events_replayed,
            replays,
            replay_duration,
            snapshot_writes,
        })
    }

    /// Get the Prometheus registry for exposing metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_append(&self, aggregate_type: &str, event_count: usize) {
        self.events_appended
            .with_label_values(&[aggregate_type])
            .inc_by(event_count as u64);
    }

    pub fn record_conflict(&self, aggregate_type: &str) {
        self.append_conflicts.with_label_values(&[aggregate_type]).inc();
    }

    pub fn record_replay(
        &self,
        aggregate_type: &str,
        from_snapshot: bool,
        event_count: u64,
        duration_secs: f64,
    ) {
        let source = if from_snapshot { SOURCE_SNAPSHOT } else { SOURCE_GENESIS };
        self.replays.with_label_values(&[aggregate_type, source]).inc();
        self.events_replayed
            .with_label_values(&[aggregate_type])
            .inc_by(event_count);
        self.replay_duration
            .with_label_values(&[aggregate_type])
            .observe(duration_secs);
    }

    /// `outcome` is `written` or `failed`
    pub fn record_snapshot_write(&self, aggregate_type: &str, outcome: &str) {
        self.snapshot_writes
            .with_label_values(&[aggregate_type, outcome])
            .inc();
    }

    /// Sum of a counter over every label set matching `labels`
    pub fn counter_value(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        self.registry
            .gather()
            .iter()
            .filter(|family| family.name() == name)
            .flat_map(|family| family.metric.iter())
            .filter(|metric| {
                labels.iter().all(|(label, value)| {
                    metric
                        .label
                        .iter()
                        .any(|pair| pair.name() == *label && pair.value() == *value)
                })
            })
            .map(|metric| metric.counter.value.unwrap_or(0.0) as u64)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        // Vec metrics only show up in gather() once a label set is used
        metrics.record_append("ShipmentState", 1);
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_append_and_conflict() {
        let metrics = Metrics::new().unwrap();
        metrics.record_append("ShipmentState", 2);
        metrics.record_append("ShipmentState", 1);
        metrics.record_conflict("ShipmentState");

        assert_eq!(
            metrics.counter_value("events_appended_total", &[("aggregate_type", "ShipmentState")]),
            3
        );
        assert_eq!(
            metrics.counter_value("append_conflicts_total", &[("aggregate_type", "ShipmentState")]),
            1
        );
    }

    #[test]
    fn test_record_replay_by_source() {
        let metrics = Metrics::new().unwrap();
        metrics.record_replay("ShipmentState", true, 4, 0.002);
        metrics.record_replay("ShipmentState", false, 10, 0.004);

        assert_eq!(
            metrics.counter_value("replays_total", &[("source", SOURCE_SNAPSHOT)]),
            1
        );
        assert_eq!(
            metrics.counter_value("replays_total", &[("source", SOURCE_GENESIS)]),
            1
        );
        assert_eq!(metrics.counter_value("events_replayed_total", &[]), 14);
    }

    #[test]
    fn test_record_snapshot_failures() {
        let metrics = Metrics::new().unwrap();
        metrics.record_snapshot_write("ShipmentState", "failed");
        metrics.record_snapshot_write("ShipmentState", "failed");
        metrics.record_snapshot_write("ShipmentState", "written");

        assert_eq!(
            metrics.counter_value("snapshot_writes_total", &[("outcome", "failed")]),
            2
        );
        assert_eq!(
            metrics.counter_value("snapshot_writes_total", &[("outcome", "written")]),
            1
        );
        assert_eq!(metrics.counter_value("snapshot_writes_total", &[("outcome", "skipped")]), 0);
    }
}
