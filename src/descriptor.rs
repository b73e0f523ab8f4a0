//! Metric descriptors and the observations emitted against them.
//!
//! A [`MetricDescriptor`] is the immutable identity of one exported metric:
//! fully-qualified name, help text, [`MetricKind`] and the ordered label names
//! of its [`Scope`]. Descriptors are built once per collector and reused for
//! every scrape.
//!
//! Collecting produces [`Observation`]s. A valid observation is a [`Sample`]
//! carrying a value and one label value per declared label name. A failed
//! statistics pull is reported as an [`InvalidMetric`] attached to some
//! descriptor of the failing collector.
//!
//! # Naming
//!
//! Every name is `bolt_<subsystem>_<metric>`, with subsystem one of
//! `db`, `tx` or `bucket`.

use std::fmt;

use prometheus::core::{Desc, Describer, Opts};
use prometheus::proto::{self, LabelPair, MetricFamily, MetricType};

/// Namespace shared by every exported metric.
pub const NAMESPACE: &str = "bolt";

/// Label carrying the configured database identity.
pub const DATABASE_LABEL: &str = "database";

/// Label carrying a bucket name.
pub const BUCKET_LABEL: &str = "bucket";

/// Whether a metric reports a current level or a lifetime total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Point-in-time level that can rise or fall.
    Gauge,
    /// Monotonically non-decreasing lifetime total.
    Counter,
}

impl MetricKind {
    fn metric_type(self) -> MetricType {
        match self {
            MetricKind::Gauge => MetricType::GAUGE,
            MetricKind::Counter => MetricType::COUNTER,
        }
    }
}

/// The label shape of a group of descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Whole-database metrics, labeled `[database]`.
    Database,
    /// Per-bucket metrics, labeled `[database, bucket]`.
    Bucket,
}

impl Scope {
    /// Ordered label names every descriptor in this scope declares.
    pub fn label_names(self) -> &'static [&'static str] {
        match self {
            Scope::Database => &[DATABASE_LABEL],
            Scope::Bucket => &[DATABASE_LABEL, BUCKET_LABEL],
        }
    }
}

/// Immutable identity of one exported metric.
#[derive(Debug, Clone)]
pub struct MetricDescriptor {
    desc: Desc,
    kind: MetricKind,
    scope: Scope,
}

impl MetricDescriptor {
    /// Build a descriptor named `bolt_{subsystem}_{name}`.
    ///
    /// The database identity becomes a constant label of the underlying
    /// Prometheus descriptor; the other labels of `scope` are variable.
    ///
    /// # Panics
    ///
    /// Panics if `subsystem` or `name` produce an invalid metric name. Both are
    /// compile-time constants in this crate.
    pub fn new(
        subsystem: &str,
        name: &str,
        help: &str,
        kind: MetricKind,
        scope: Scope,
        database: &str,
    ) -> Self {
        let variable: Vec<String> = scope
            .label_names()
            .iter()
            .filter(|l| **l != DATABASE_LABEL)
            .map(|l| l.to_string())
            .collect();

        let desc = Opts::new(name, help)
            .namespace(NAMESPACE)
            .subsystem(subsystem)
            .const_label(DATABASE_LABEL, database)
            .variable_labels(variable)
            .describe()
            .expect("metric descriptor should be valid");

        Self { desc, kind, scope }
    }

    /// Fully-qualified metric name.
    pub fn fq_name(&self) -> &str {
        &self.desc.fq_name
    }

    /// Help text.
    pub fn help(&self) -> &str {
        &self.desc.help
    }

    /// Gauge or counter.
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Label shape of this descriptor.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Ordered label names; emissions must supply values in this order.
    pub fn label_names(&self) -> &'static [&'static str] {
        self.scope.label_names()
    }

    /// The Prometheus descriptor used for registration.
    pub fn desc(&self) -> &Desc {
        &self.desc
    }

    /// Emit a sample for this descriptor.
    ///
    /// # Panics
    ///
    /// Panics if the number of label values differs from the number of
    /// declared label names. Misaligned labels are a programming error and
    /// must never reach a scrape.
    pub fn sample(&self, value: f64, label_values: &[&str]) -> Observation<'_> {
        let names = self.label_names();
        assert_eq!(
            label_values.len(),
            names.len(),
            "{}: expected label values for {:?}, got {:?}",
            self.fq_name(),
            names,
            label_values
        );

        Observation::Sample(Sample {
            descriptor: self,
            value,
            label_values: label_values.iter().map(|v| v.to_string()).collect(),
        })
    }

    /// Emit an invalid-metric marker carrying `error`.
    pub fn invalid(&self, error: impl fmt::Display) -> Observation<'_> {
        Observation::Invalid(InvalidMetric {
            descriptor: self,
            error: error.to_string(),
        })
    }
}

impl PartialEq for MetricDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.desc.id == other.desc.id && self.kind == other.kind
    }
}

/// One metric value with its label values.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<'a> {
    descriptor: &'a MetricDescriptor,
    value: f64,
    label_values: Vec<String>,
}

impl<'a> Sample<'a> {
    /// The descriptor this sample was emitted for.
    pub fn descriptor(&self) -> &'a MetricDescriptor {
        self.descriptor
    }

    /// Observed value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Label values, in the descriptor's declared label order.
    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Value of the label called `name`, if declared.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.descriptor
            .label_names()
            .iter()
            .position(|n| *n == name)
            .map(|i| self.label_values[i].as_str())
    }

    /// Convert into a Prometheus metric with label pairs sorted by name.
    pub fn to_metric(&self) -> proto::Metric {
        let mut pairs: Vec<(&str, &str)> = self
            .descriptor
            .label_names()
            .iter()
            .copied()
            .zip(self.label_values.iter().map(String::as_str))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));

        let mut metric = proto::Metric::default();
        for (name, value) in pairs {
            let mut lp = LabelPair::default();
            lp.set_name(name.to_string());
            lp.set_value(value.to_string());
            metric.mut_label().push(lp);
        }

        match self.descriptor.kind {
            MetricKind::Gauge => {
                let mut g = proto::Gauge::default();
                g.set_value(self.value);
                metric.set_gauge(g);
            }
            MetricKind::Counter => {
                let mut c = proto::Counter::default();
                c.set_value(self.value);
                metric.set_counter(c);
            }
        }
        metric
    }
}

/// Marker for a statistics pull that failed during a scrape.
///
/// The descriptor is only an attachment point; the marker has no value.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidMetric<'a> {
    descriptor: &'a MetricDescriptor,
    error: String,
}

impl<'a> InvalidMetric<'a> {
    /// The descriptor the marker is attached to.
    pub fn descriptor(&self) -> &'a MetricDescriptor {
        self.descriptor
    }

    /// Error text of the failed pull.
    pub fn error(&self) -> &str {
        &self.error
    }
}

/// A single item produced by a collect pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation<'a> {
    /// A valid metric value.
    Sample(Sample<'a>),
    /// A failed statistics pull.
    Invalid(InvalidMetric<'a>),
}

impl<'a> Observation<'a> {
    /// The descriptor this observation refers to.
    pub fn descriptor(&self) -> &'a MetricDescriptor {
        match self {
            Observation::Sample(s) => s.descriptor,
            Observation::Invalid(i) => i.descriptor,
        }
    }

    /// The sample, if this observation is valid.
    pub fn as_sample(&self) -> Option<&Sample<'a>> {
        match self {
            Observation::Sample(s) => Some(s),
            Observation::Invalid(_) => None,
        }
    }

    /// Whether this observation is an invalid-metric marker.
    pub fn is_invalid(&self) -> bool {
        matches!(self, Observation::Invalid(_))
    }
}

/// Group samples into metric families, one per descriptor name.
///
/// Families appear in the order their first sample was emitted and samples
/// keep their emission order within a family. Invalid markers are skipped.
pub fn metric_families<'a, I>(observations: I) -> Vec<MetricFamily>
where
    I: IntoIterator<Item = &'a Observation<'a>>,
{
    let mut families: Vec<MetricFamily> = Vec::new();

    for sample in observations.into_iter().filter_map(Observation::as_sample) {
        let d = sample.descriptor;
        let idx = match families.iter().position(|f| f.get_name() == d.fq_name()) {
            Some(idx) => idx,
            None => {
                let mut mf = MetricFamily::default();
                mf.set_name(d.fq_name().to_string());
                mf.set_help(d.help().to_string());
                mf.set_field_type(d.kind.metric_type());
                families.push(mf);
                families.len() - 1
            }
        };
        families[idx].mut_metric().push(sample.to_metric());
    }

    families
}
