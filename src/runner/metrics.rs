use crate::k8s_types::K8sType;
use crate::runner::reconcile::Phase;

use prometheus::proto::MetricFamily;
use prometheus::{IntCounterVec, Opts, Registry};

use std::fmt::{self, Debug};

const PHASE: &[&str] = &["phase"];
const KIND_AND_VERB: &[&str] = &["kind", "verb"];

/// The write calls that the engine makes against the store, as they're labeled in metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteVerb {
    Create,
    Update,
    UpdateStatus,
    Delete,
}

impl WriteVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteVerb::Create => "create",
            WriteVerb::Update => "update",
            WriteVerb::UpdateStatus => "update_status",
            WriteVerb::Delete => "delete",
        }
    }
}

/// Counters for reconciliation passes. Cloning returns a handle to the same counters.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    passes_by_phase: IntCounterVec,
    pass_errors_by_phase: IntCounterVec,
    writes_by_kind: IntCounterVec,
}

impl Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Metrics")
    }
}

impl Metrics {
    pub fn new() -> Result<Metrics, prometheus::Error> {
        let registry = Registry::new();

        let pass_opts = Opts::new(
            "passes",
            "the number of reconciliation passes, by the phase of the parent",
        )
        .subsystem("reconcile");
        let passes_by_phase = IntCounterVec::new(pass_opts, PHASE)?;
        registry.register(Box::new(passes_by_phase.clone()))?;

        let error_opts = Opts::new(
            "pass_errors",
            "the number of passes that returned an error, by the phase of the parent",
        )
        .subsystem("reconcile");
        let pass_errors_by_phase = IntCounterVec::new(error_opts, PHASE)?;
        registry.register(Box::new(pass_errors_by_phase.clone()))?;

        let write_opts = Opts::new(
            "writes",
            "the number of write calls issued to the object store, by kind and verb",
        )
        .subsystem("reconcile");
        let writes_by_kind = IntCounterVec::new(write_opts, KIND_AND_VERB)?;
        registry.register(Box::new(writes_by_kind.clone()))?;

        Ok(Metrics {
            registry,
            passes_by_phase,
            pass_errors_by_phase,
            writes_by_kind,
        })
    }

    pub fn pass_started(&self, phase: Phase) {
        self.passes_by_phase.with_label_values(&[phase.as_str()]).inc();
    }

    pub fn pass_error(&self, phase: Phase) {
        self.pass_errors_by_phase.with_label_values(&[phase.as_str()]).inc();
    }

    pub fn write_issued(&self, k8s_type: &K8sType, verb: WriteVerb) {
        self.writes_by_kind
            .with_label_values(&[k8s_type.kind, verb.as_str()])
            .inc();
    }

    pub fn pass_count(&self, phase: Phase) -> u64 {
        self.passes_by_phase.with_label_values(&[phase.as_str()]).get()
    }

    pub fn pass_error_count(&self, phase: Phase) -> u64 {
        self.pass_errors_by_phase.with_label_values(&[phase.as_str()]).get()
    }

    pub fn write_count(&self, k8s_type: &K8sType, verb: WriteVerb) -> u64 {
        self.writes_by_kind
            .with_label_values(&[k8s_type.kind, verb.as_str()])
            .get()
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    pub fn encode_as_text(&self) -> Result<Vec<u8>, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::with_capacity(4096);
        encoder.encode(self.gather().as_slice(), &mut buffer)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::k8s_types::core::v1::ConfigMap;

    #[test]
    fn metrics_are_created_successfully() {
        let _metrics = Metrics::new().unwrap();
    }

    #[test]
    fn counters_are_labeled_and_gathered() {
        let metrics = Metrics::new().unwrap();
        metrics.pass_started(Phase::Steady);
        metrics.pass_started(Phase::Steady);
        metrics.pass_error(Phase::Deleting);
        metrics.write_issued(ConfigMap, WriteVerb::Create);

        assert_eq!(2, metrics.pass_count(Phase::Steady));
        assert_eq!(0, metrics.pass_count(Phase::Absent));
        assert_eq!(1, metrics.pass_error_count(Phase::Deleting));
        assert_eq!(1, metrics.write_count(ConfigMap, WriteVerb::Create));
        assert_eq!(0, metrics.write_count(ConfigMap, WriteVerb::Delete));

        let names: Vec<String> = metrics
            .gather()
            .iter()
            .map(|family| family.get_name().to_owned())
            .collect();
        assert!(names.contains(&"reconcile_passes".to_owned()));
        assert!(names.contains(&"reconcile_writes".to_owned()));

        let text = String::from_utf8(metrics.encode_as_text().unwrap()).unwrap();
        assert!(text.contains("reconcile_writes{kind=\"ConfigMap\",verb=\"create\"} 1"));
    }
}
