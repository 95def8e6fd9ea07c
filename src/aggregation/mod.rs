//! Aggregation kernel (C6) — reduces the matches belonging to one
//! population row into a single scalar, under whichever subset of those
//! matches is currently "active" (spec §4.4, the `AS`/`Sigma` data model of
//! §3).
//!
//! Aggregations are a closed tagged union, not an open trait-object
//! hierarchy (spec §9's "tagged union, not inheritance" design note made
//! concrete): `AggregationKind` enumerates every capability, and
//! [`kernels::reduce`] dispatches on it. The active-set bookkeeping
//! (`Sigma`, `active_set.rs`) and the per-row statistic computation
//! (`AggregationState`, `state.rs`) are kept separate so the splitter (C7)
//! can flip membership many times per node without re-deriving the row
//! index each time.

pub mod active_set;
pub mod kernels;
pub mod state;

use serde::{Deserialize, Serialize};

/// Half-life windows for the exponentially weighted moving average family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EwmaWindow {
    OneSecond,
    OneMinute,
    OneHour,
    OneDay,
    SevenDays,
    ThirtyDays,
    NinetyDays,
    ThreeSixtyFiveDays,
}

impl EwmaWindow {
    pub fn half_life_seconds(self) -> f64 {
        use EwmaWindow::*;
        match self {
            OneSecond => 1.0,
            OneMinute => 60.0,
            OneHour => 3_600.0,
            OneDay => 86_400.0,
            SevenDays => 7.0 * 86_400.0,
            ThirtyDays => 30.0 * 86_400.0,
            NinetyDays => 90.0 * 86_400.0,
            ThreeSixtyFiveDays => 365.0 * 86_400.0,
        }
    }
}

/// Every aggregation named in spec §4.4, as a closed enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationKind {
    Avg,
    AvgTimeBetween,
    Count,
    CountAboveMean,
    CountBelowMean,
    CountDistinct,
    CountMinusCountDistinct,
    CountDistinctOverCount,
    Ewma(EwmaWindow),
    First,
    Last,
    Kurtosis,
    Max,
    Median,
    Min,
    Mode,
    NumMax,
    NumMin,
    /// Percentile in `1..=99`; `Median` is kept as its own variant because
    /// spec §4.4 lists it separately from the `Q*` family.
    Quantile(u8),
    Skew,
    Sum,
    Stddev,
    TimeSinceFirstMaximum,
    TimeSinceFirstMinimum,
    TimeSinceLastMaximum,
    TimeSinceLastMinimum,
    Trend,
    Var,
    VariationCoefficient,
}

impl AggregationKind {
    /// Aggregations whose reduction is naturally computed over a
    /// value-sorted list (quantiles, min/max and their derivatives). The
    /// kernel sorts its local buffer once per `update_and_clear` call for
    /// these rather than re-deriving order per query.
    pub fn needs_sorting(self) -> bool {
        matches!(
            self,
            AggregationKind::Median
                | AggregationKind::Quantile(_)
                | AggregationKind::Min
                | AggregationKind::Max
                | AggregationKind::NumMax
                | AggregationKind::NumMin
                | AggregationKind::Mode
        )
    }

    /// Aggregations that need the peripheral event timestamp (and, for the
    /// `TimeSince*`/`Ewma` family, the population row's reference
    /// timestamp) in addition to the value being aggregated.
    pub fn needs_time(self) -> bool {
        matches!(
            self,
            AggregationKind::AvgTimeBetween
                | AggregationKind::Ewma(_)
                | AggregationKind::TimeSinceFirstMaximum
                | AggregationKind::TimeSinceFirstMinimum
                | AggregationKind::TimeSinceLastMaximum
                | AggregationKind::TimeSinceLastMinimum
                | AggregationKind::Trend
        )
    }

    /// Value returned for a population row with zero active matches (spec
    /// §8 boundary cases: `0` for count-like aggregations, `NaN`
    /// otherwise).
    pub fn neutral(self) -> f64 {
        use AggregationKind::*;
        match self {
            Sum | Count | CountAboveMean | CountBelowMean | CountDistinct
            | CountMinusCountDistinct | NumMax | NumMin => 0.0,
            _ => f64::NAN,
        }
    }
}
