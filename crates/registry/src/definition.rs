use crate::error::RegistryError;
use serde::{Deserialize, Serialize};

/// The statistical family a metric belongs to.
///
/// This tag selects the treatment applied downstream; keeping it a closed set
/// bounds the statistical logic to a finite number of cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticalType {
    /// Per-unit 0/1 outcome, estimated as a conversion rate.
    Binary,
    /// Per-unit real-valued outcome (sums, means of event payloads).
    Continuous,
    /// Per-unit event count.
    Count,
}

impl StatisticalType {
    pub fn label(&self) -> &'static str {
        match self {
            StatisticalType::Binary => "binary",
            StatisticalType::Continuous => "continuous",
            StatisticalType::Count => "count",
        }
    }
}

/// How raw per-unit events become one scalar per unit.
///
/// A closed set of variants rather than open-ended dispatch: every rule here
/// has a defined pairing with a statistical type, checked at registry build
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationRule {
    /// 1.0 if the unit produced any qualifying event, else the missing policy
    /// applies.
    AnyEvent,
    /// Number of qualifying events.
    CountEvents,
    /// Sum of the event payload values. Events without a payload do not
    /// qualify.
    SumValue,
    /// Mean of the event payload values. Events without a payload do not
    /// qualify.
    MeanValue,
}

impl AggregationRule {
    pub fn label(&self) -> &'static str {
        match self {
            AggregationRule::AnyEvent => "any_event",
            AggregationRule::CountEvents => "count_events",
            AggregationRule::SumValue => "sum_value",
            AggregationRule::MeanValue => "mean_value",
        }
    }
}

/// What a unit with no qualifying events contributes to the metric table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// An explicit zero. The natural default for binary and count metrics,
    /// where "did nothing" is a real observation.
    Zero,
    /// An explicit no-data marker, excluded from estimation. The natural
    /// default for continuous metrics, where zero would bias the mean.
    NoData,
}

/// A declarative metric specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    /// Unique within the registry.
    pub name: String,
    pub aggregation: AggregationRule,
    pub statistical_type: StatisticalType,
    /// Branches with fewer qualifying units than this are suppressed instead
    /// of estimated.
    #[serde(default)]
    pub min_sample_size: Option<usize>,
    /// Overrides the per-type default missing policy.
    #[serde(default)]
    pub missing: Option<MissingPolicy>,
}

impl MetricDefinition {
    /// The effective missing policy: the declared one, or the default for
    /// the metric's statistical type.
    pub fn missing_policy(&self) -> MissingPolicy {
        self.missing.unwrap_or(match self.statistical_type {
            StatisticalType::Binary | StatisticalType::Count => MissingPolicy::Zero,
            StatisticalType::Continuous => MissingPolicy::NoData,
        })
    }

    /// The suppression threshold with its implicit floor of one unit: an
    /// empty branch can never be estimated.
    pub fn effective_min_sample_size(&self) -> usize {
        self.min_sample_size.unwrap_or(1).max(1)
    }

    /// Checks that the aggregation rule and statistical type agree.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let compatible = matches!(
            (self.aggregation, self.statistical_type),
            (AggregationRule::AnyEvent, StatisticalType::Binary)
                | (AggregationRule::CountEvents, StatisticalType::Count)
                | (AggregationRule::SumValue, StatisticalType::Continuous)
                | (AggregationRule::MeanValue, StatisticalType::Continuous)
        );

        if compatible {
            Ok(())
        } else {
            Err(RegistryError::IncompatibleAggregation {
                metric: self.name.clone(),
                aggregation: self.aggregation.label().to_string(),
                statistical_type: self.statistical_type.label().to_string(),
            })
        }
    }
}
