//! Moving-average forecaster, the total last tier of the chain.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use super::{ForecastContext, ForecastMethod, Forecaster, TierOutcome};
use crate::ml::series::TimeSeries;

/// Observations averaged for the base level.
pub const WINDOW: usize = 5;

/// Standard deviation of the daily variation, as a share of the base level.
pub const NOISE_RATIO: f64 = 0.1;

#[derive(Debug, Clone, Copy, Default)]
pub struct MovingAverage;

impl Forecaster for MovingAverage {
    fn method(&self) -> ForecastMethod {
        ForecastMethod::MovingAverage
    }

    fn attempt(&self, series: &TimeSeries, days: usize, ctx: &ForecastContext<'_>) -> TierOutcome {
        let mut rng = ctx.rng();
        TierOutcome::Forecast(project(&series.quantities(), days, &mut rng))
    }
}

/// Base level of the series and whether daily variation applies to it.
///
/// Short series (fewer than [`WINDOW`] points) use the raw mean without
/// variation; an empty series has level zero.
pub fn base_level(quantities: &[f64]) -> (f64, bool) {
    if quantities.len() < WINDOW {
        let mean = if quantities.is_empty() {
            0.0
        } else {
            quantities.iter().sum::<f64>() / quantities.len() as f64
        };
        return (mean, false);
    }

    let window = WINDOW.min(quantities.len());
    let tail = &quantities[quantities.len() - window..];
    (tail.iter().sum::<f64>() / window as f64, true)
}

/// Projects the base level over `days`, adding Gaussian variation of
/// [`NOISE_RATIO`] × level when the level is positive. Values are clamped at 0
/// but not rounded.
pub fn project<R: Rng + ?Sized>(quantities: &[f64], days: usize, rng: &mut R) -> Vec<f64> {
    let (level, noisy) = base_level(quantities);
    let noise = if noisy && level > 0.0 {
        Normal::new(0.0, level * NOISE_RATIO).ok()
    } else {
        None
    };

    (0..days)
        .map(|_| {
            let variation = noise.as_ref().map_or(0.0, |normal| normal.sample(&mut *rng));
            (level + variation).max(0.0)
        })
        .collect()
}
