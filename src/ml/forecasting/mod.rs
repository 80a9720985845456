/*!
 * # Demand Forecasting Engine
 *
 * Produces a fixed-length daily demand curve from a product's sales series by
 * walking an ordered chain of forecasters:
 *
 * 1. [`seasonal::SeasonalDecomposition`]: multiplicative weekly + yearly model
 * 2. [`sequence::RecurrentSequence`]: small recurrent network over 30-day windows
 * 3. [`moving_average::MovingAverage`]: always succeeds
 *
 * Each tier reports a [`TierOutcome`]. The first `Forecast` wins; insufficient
 * data and runtime faults both hand over to the next tier. The engine itself
 * never fails: if every configured tier declines, the moving average runs
 * regardless.
 */

pub mod moving_average;
pub mod seasonal;
pub mod sequence;

use metrics::counter;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::ml::clock::{Clock, SystemClock};
use crate::ml::series::{self, TimeSeries};
use crate::models::product::Product;

use self::moving_average::MovingAverage;
use self::seasonal::SeasonalDecomposition;
use self::sequence::{RecurrentSequence, SequenceSettings};

/// Forecasting tier, also accepted as the caller's preferred method.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[strum(ascii_case_insensitive)]
pub enum ForecastMethod {
    #[default]
    #[strum(to_string = "seasonal", serialize = "prophet")]
    Seasonal,
    #[strum(to_string = "sequence", serialize = "lstm")]
    Sequence,
    #[strum(to_string = "moving-average", serialize = "simple", serialize = "moving_average")]
    MovingAverage,
}

impl ForecastMethod {
    /// Parses a method name; unknown names select the moving average.
    pub fn parse_lenient(name: &str) -> Self {
        name.trim().parse().unwrap_or(ForecastMethod::MovingAverage)
    }
}

/// What a single tier made of the series.
#[derive(Debug, Clone, PartialEq)]
pub enum TierOutcome {
    Forecast(Vec<f64>),
    InsufficientData(String),
    RuntimeFault(String),
}

/// Failures raised while fitting or projecting a model.
#[derive(Debug, Error)]
pub enum ModelFault {
    #[error("training deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
    #[error("singular system while fitting {0}")]
    Singular(&'static str),
    #[error("tier returned {actual} values, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
}

impl From<ModelFault> for TierOutcome {
    fn from(fault: ModelFault) -> Self {
        TierOutcome::RuntimeFault(fault.to_string())
    }
}

/// Per-call inputs shared by every tier.
#[derive(Debug, Clone, Copy)]
pub struct ForecastContext<'a> {
    pub seed: Option<u64>,
    pub clock: &'a dyn Clock,
}

impl ForecastContext<'_> {
    /// Fresh generator for one tier attempt; identical seeds give identical draws.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// A forecasting strategy in the fallback chain.
pub trait Forecaster: Send + Sync {
    fn method(&self) -> ForecastMethod;

    fn attempt(&self, series: &TimeSeries, days: usize, ctx: &ForecastContext<'_>) -> TierOutcome;
}

/// Demand curve with the tier that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ForecastResult {
    pub values: Vec<f64>,
    pub tier: ForecastMethod,
}

impl ForecastResult {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Mean forecast demand, `0.0` for an empty horizon.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }
}

/// Engine tuning taken from configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub sequence: SequenceSettings,
    /// Seed for stochastic terms; `None` draws from entropy on every call.
    pub noise_seed: Option<u64>,
}

/// Ordered fallback chain of forecasters.
pub struct ForecastEngine {
    tiers: Vec<Box<dyn Forecaster>>,
    seed: Option<u64>,
    clock: Arc<dyn Clock>,
}

impl ForecastEngine {
    /// Standard seasonal → sequence → moving-average chain.
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            tiers: vec![
                Box::new(SeasonalDecomposition::default()),
                Box::new(RecurrentSequence::new(settings.sequence)),
                Box::new(MovingAverage),
            ],
            seed: settings.noise_seed,
            clock: Arc::new(SystemClock),
        }
    }

    /// Engine over a caller-supplied chain.
    pub fn with_tiers(tiers: Vec<Box<dyn Forecaster>>) -> Self {
        Self {
            tiers,
            seed: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn tiers(&self) -> impl Iterator<Item = ForecastMethod> + '_ {
        self.tiers.iter().map(|tier| tier.method())
    }

    /// Forecasts `days` values, starting the chain at `method`.
    pub fn forecast(&self, series: &TimeSeries, days: usize, method: ForecastMethod) -> ForecastResult {
        let ctx = ForecastContext {
            seed: self.seed,
            clock: self.clock.as_ref(),
        };

        let start = self
            .tiers
            .iter()
            .position(|tier| tier.method() == method)
            .unwrap_or(0);

        for tier in &self.tiers[start..] {
            let tier_method = tier.method();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| tier.attempt(series, days, &ctx)))
                .unwrap_or_else(|_| TierOutcome::RuntimeFault("tier panicked".to_string()));

            let outcome = match outcome {
                TierOutcome::Forecast(values) => match finalize(values, days) {
                    Ok(values) => {
                        counter!("forecast.tier.selected", 1, "tier" => tier_method.to_string());
                        debug!(tier = %tier_method, points = series.len(), days, "forecast produced");
                        return ForecastResult {
                            values,
                            tier: tier_method,
                        };
                    }
                    Err(fault) => TierOutcome::from(fault),
                },
                other => other,
            };

            match outcome {
                TierOutcome::InsufficientData(reason) => {
                    counter!("forecast.tier.fallback", 1, "tier" => tier_method.to_string(), "reason" => "insufficient_data");
                    debug!(tier = %tier_method, %reason, "tier skipped");
                }
                TierOutcome::RuntimeFault(reason) => {
                    counter!("forecast.tier.fallback", 1, "tier" => tier_method.to_string(), "reason" => "runtime_fault");
                    warn!(tier = %tier_method, %reason, "tier failed, falling back");
                }
                TierOutcome::Forecast(_) => unreachable!("forecast outcomes return above"),
            }
        }

        // Last resort when the configured chain has no total tier.
        let mut rng = ctx.rng();
        let values = moving_average::project(&series.quantities(), days, &mut rng);
        counter!("forecast.tier.selected", 1, "tier" => ForecastMethod::MovingAverage.to_string());
        ForecastResult {
            values: values.into_iter().map(clamp_whole).collect(),
            tier: ForecastMethod::MovingAverage,
        }
    }

    /// Extracts the product's series and forecasts it.
    pub fn forecast_product(&self, product: &Product, days: usize, method: ForecastMethod) -> ForecastResult {
        let series = series::extract(&product.historical_sales);
        self.forecast(&series, days, method)
    }
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

/// Validates a tier's output and normalises it to non-negative whole units.
fn finalize(values: Vec<f64>, days: usize) -> Result<Vec<f64>, ModelFault> {
    if values.len() != days {
        return Err(ModelFault::LengthMismatch {
            expected: days,
            actual: values.len(),
        });
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ModelFault::NonFinite("forecast output"));
    }
    Ok(values.into_iter().map(clamp_whole).collect())
}

/// Clamps at zero and rounds half to even.
pub(crate) fn clamp_whole(value: f64) -> f64 {
    let rounded = value.max(0.0).round_ties_even();
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    struct Declines(ForecastMethod);

    impl Forecaster for Declines {
        fn method(&self) -> ForecastMethod {
            self.0
        }

        fn attempt(&self, _: &TimeSeries, _: usize, _: &ForecastContext<'_>) -> TierOutcome {
            TierOutcome::InsufficientData("never enough".into())
        }
    }

    struct Fixed(ForecastMethod, Vec<f64>);

    impl Forecaster for Fixed {
        fn method(&self) -> ForecastMethod {
            self.0
        }

        fn attempt(&self, _: &TimeSeries, _: usize, _: &ForecastContext<'_>) -> TierOutcome {
            TierOutcome::Forecast(self.1.clone())
        }
    }

    struct Panics;

    impl Forecaster for Panics {
        fn method(&self) -> ForecastMethod {
            ForecastMethod::Sequence
        }

        fn attempt(&self, _: &TimeSeries, _: usize, _: &ForecastContext<'_>) -> TierOutcome {
            panic!("numeric blow-up")
        }
    }

    fn series(quantities: &[f64]) -> TimeSeries {
        TimeSeries::from_entries(
            quantities
                .iter()
                .enumerate()
                .map(|(i, q)| (format!("Day-{}", i + 1), *q)),
        )
    }

    #[test]
    fn method_names_and_aliases() {
        assert_eq!("seasonal".parse::<ForecastMethod>().unwrap(), ForecastMethod::Seasonal);
        assert_eq!("Prophet".parse::<ForecastMethod>().unwrap(), ForecastMethod::Seasonal);
        assert_eq!("lstm".parse::<ForecastMethod>().unwrap(), ForecastMethod::Sequence);
        assert_eq!("simple".parse::<ForecastMethod>().unwrap(), ForecastMethod::MovingAverage);
        assert_eq!(ForecastMethod::parse_lenient("arima"), ForecastMethod::MovingAverage);
        assert_eq!(ForecastMethod::MovingAverage.to_string(), "moving-average");
    }

    #[test]
    fn first_successful_tier_wins() {
        let engine = ForecastEngine::with_tiers(vec![
            Box::new(Declines(ForecastMethod::Seasonal)),
            Box::new(Fixed(ForecastMethod::Sequence, vec![1.4, 2.5, 3.5])),
            Box::new(MovingAverage),
        ]);
        let result = engine.forecast(&series(&[1.0; 10]), 3, ForecastMethod::Seasonal);
        assert_eq!(result.tier, ForecastMethod::Sequence);
        assert_eq!(result.values, vec![1.0, 2.0, 4.0]);
    }

    #[test]
    fn chain_starts_at_requested_method() {
        let engine = ForecastEngine::with_tiers(vec![
            Box::new(Fixed(ForecastMethod::Seasonal, vec![9.0, 9.0])),
            Box::new(MovingAverage),
        ])
        .with_seed(Some(1));
        let result = engine.forecast(&series(&[2.0, 2.0]), 2, ForecastMethod::MovingAverage);
        assert_eq!(result.tier, ForecastMethod::MovingAverage);
        assert_eq!(result.values, vec![2.0, 2.0]);
    }

    #[test]
    fn wrong_length_counts_as_fault() {
        let engine = ForecastEngine::with_tiers(vec![
            Box::new(Fixed(ForecastMethod::Seasonal, vec![5.0])),
            Box::new(MovingAverage),
        ]);
        let result = engine.forecast(&series(&[3.0]), 4, ForecastMethod::Seasonal);
        assert_eq!(result.tier, ForecastMethod::MovingAverage);
        assert_eq!(result.values, vec![3.0; 4]);
    }

    #[test]
    fn panicking_tier_is_contained() {
        let engine = ForecastEngine::with_tiers(vec![Box::new(Panics), Box::new(MovingAverage)]);
        let result = engine.forecast(&series(&[]), 5, ForecastMethod::Sequence);
        assert_eq!(result.values, vec![0.0; 5]);
    }

    #[test]
    fn empty_chain_still_answers() {
        let engine = ForecastEngine::with_tiers(Vec::new());
        let result = engine.forecast(&series(&[4.0, 6.0]), 3, ForecastMethod::Seasonal);
        assert_eq!(result.tier, ForecastMethod::MovingAverage);
        assert_eq!(result.values, vec![5.0; 3]);
    }

    #[test]
    fn finalize_rounds_half_to_even_and_clamps() {
        assert_eq!(finalize(vec![0.5, 1.5, 2.5, -3.0], 4).unwrap(), vec![0.0, 2.0, 2.0, 0.0]);
        assert_matches!(
            finalize(vec![f64::NAN], 1),
            Err(ModelFault::NonFinite(_))
        );
    }
}
