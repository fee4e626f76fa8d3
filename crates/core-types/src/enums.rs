use serde::{Deserialize, Serialize};

/// The kind of analysis window a metric is aggregated over.
///
/// Daily, weekly and growth windows cover fixed-length periods relative to
/// each unit's enrollment; the overall window covers everything from
/// enrollment up to the as-of date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    Daily,
    Weekly,
    Growth,
    Overall,
}

impl WindowKind {
    /// The length of one period in days, or `None` for the overall window.
    pub fn period_days(&self) -> Option<u32> {
        match self {
            WindowKind::Daily => Some(1),
            WindowKind::Weekly => Some(7),
            WindowKind::Growth => Some(28),
            WindowKind::Overall => None,
        }
    }

    /// Short label used in result tables and export file names.
    pub fn label(&self) -> &'static str {
        match self {
            WindowKind::Daily => "day",
            WindowKind::Weekly => "week",
            WindowKind::Growth => "growth",
            WindowKind::Overall => "overall",
        }
    }
}

/// A single aggregated metric value for one analysis unit.
///
/// Absence of qualifying events is explicit: a unit that produced no data is
/// `NoData`, never silently dropped, so that downstream statistics can tell
/// "no data" apart from a true zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricValue {
    Value(f64),
    NoData,
}

impl MetricValue {
    /// Returns the inner value, or `None` for the no-data marker.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Value(v) => Some(*v),
            MetricValue::NoData => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, MetricValue::NoData)
    }
}
