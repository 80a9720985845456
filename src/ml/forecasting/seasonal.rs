/*!
 * # Seasonal Decomposition Forecaster
 *
 * Multiplicative model `y(t) = level(t) · weekly(weekday) · (1 + yearly(t))`:
 *
 * - `level` is a least-squares linear trend over calendar days
 * - `weekly` holds one factor per weekday, normalised to mean 1
 * - `yearly` is a ridge-regularised Fourier series with a 365.25 day period
 *
 * Day labels are coerced onto the calendar first. Only `Day-DD-MM-YYYY` labels
 * carry a date; plain `Day-N` ordinals do not, so such histories fall through
 * to the next tier.
 */

use chrono::{Datelike, Duration, NaiveDate};
use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;

use super::{ForecastContext, ForecastMethod, Forecaster, ModelFault, TierOutcome};
use crate::ml::series::TimeSeries;

/// Raw observations required before dates are even considered.
pub const MIN_RAW_POINTS: usize = 30;

/// Observations that must survive date coercion.
pub const MIN_DATED_POINTS: usize = 14;

const YEAR_DAYS: f64 = 365.25;
const LEVEL_FLOOR: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct SeasonalDecomposition {
    /// Number of sine/cosine pairs in the yearly component.
    pub fourier_order: usize,
    /// Ridge penalty on yearly coefficients, per observation.
    pub yearly_penalty: f64,
}

impl Default for SeasonalDecomposition {
    fn default() -> Self {
        Self {
            fourier_order: 3,
            yearly_penalty: 0.5,
        }
    }
}

impl Forecaster for SeasonalDecomposition {
    fn method(&self) -> ForecastMethod {
        ForecastMethod::Seasonal
    }

    fn attempt(&self, series: &TimeSeries, days: usize, _ctx: &ForecastContext<'_>) -> TierOutcome {
        if series.len() < MIN_RAW_POINTS {
            return TierOutcome::InsufficientData(format!(
                "{} observations, seasonal model needs {}",
                series.len(),
                MIN_RAW_POINTS
            ));
        }

        let dated = coerce_series(series);
        if dated.len() < MIN_DATED_POINTS {
            return TierOutcome::InsufficientData(format!(
                "{} observations carry a usable date, seasonal model needs {}",
                dated.len(),
                MIN_DATED_POINTS
            ));
        }

        if dated.iter().all(|(_, quantity)| *quantity == 0.0) {
            return TierOutcome::Forecast(vec![0.0; days]);
        }

        match self.fit(&dated) {
            Ok(model) => match model.project(days) {
                Ok(values) => TierOutcome::Forecast(values),
                Err(fault) => fault.into(),
            },
            Err(fault) => fault.into(),
        }
    }
}

impl SeasonalDecomposition {
    fn fit(&self, dated: &[(NaiveDate, f64)]) -> Result<SeasonalModel, ModelFault> {
        let origin = dated[0].0;
        let last = dated[dated.len() - 1].0;
        let offsets: Vec<f64> = dated
            .iter()
            .map(|(date, _)| (*date - origin).num_days() as f64)
            .collect();
        let quantities: Vec<f64> = dated.iter().map(|(_, quantity)| *quantity).collect();
        let n = dated.len() as f64;

        let mean_t = offsets.iter().sum::<f64>() / n;
        let mean_y = quantities.iter().sum::<f64>() / n;
        let var_t: f64 = offsets.iter().map(|t| (t - mean_t).powi(2)).sum();
        if var_t <= 0.0 {
            return Err(ModelFault::Singular("trend"));
        }
        let cov: f64 = offsets
            .iter()
            .zip(&quantities)
            .map(|(t, y)| (t - mean_t) * (y - mean_y))
            .sum();
        let slope = cov / var_t;
        let intercept = mean_y - slope * mean_t;

        let mut model = SeasonalModel {
            origin,
            last,
            intercept,
            slope,
            weekly: [1.0; 7],
            yearly: DVector::zeros(2 * self.fourier_order),
            fourier_order: self.fourier_order,
        };

        model.weekly = weekly_factors(dated, &offsets, &model);

        let mut rows = Vec::new();
        let mut residuals = Vec::new();
        for ((date, quantity), t) in dated.iter().zip(&offsets) {
            let base = model.level(*t) * model.weekly[weekday(*date)];
            if base > LEVEL_FLOOR {
                rows.push(*t);
                residuals.push(quantity / base - 1.0);
            }
        }

        if !rows.is_empty() && self.fourier_order > 0 {
            let columns = 2 * self.fourier_order;
            let design = DMatrix::from_fn(rows.len(), columns, |i, j| {
                fourier_term(rows[i], j, self.fourier_order)
            });
            let target = DVector::from_vec(residuals);
            let penalty = self.yearly_penalty * rows.len() as f64;
            let gram = design.transpose() * &design + DMatrix::identity(columns, columns) * penalty;
            let rhs = design.tr_mul(&target);
            let cholesky = gram.cholesky().ok_or(ModelFault::Singular("yearly seasonality"))?;
            model.yearly = cholesky.solve(&rhs);
        }

        if !model.intercept.is_finite()
            || !model.slope.is_finite()
            || model.weekly.iter().any(|f| !f.is_finite())
            || model.yearly.iter().any(|c| !c.is_finite())
        {
            return Err(ModelFault::NonFinite("seasonal fit"));
        }

        Ok(model)
    }
}

struct SeasonalModel {
    origin: NaiveDate,
    last: NaiveDate,
    intercept: f64,
    slope: f64,
    weekly: [f64; 7],
    yearly: DVector<f64>,
    fourier_order: usize,
}

impl SeasonalModel {
    fn level(&self, t: f64) -> f64 {
        (self.intercept + self.slope * t).max(LEVEL_FLOOR)
    }

    fn yearly(&self, t: f64) -> f64 {
        (0..self.yearly.len())
            .map(|j| fourier_term(t, j, self.fourier_order) * self.yearly[j])
            .sum()
    }

    fn predict(&self, date: NaiveDate) -> f64 {
        let t = (date - self.origin).num_days() as f64;
        self.level(t) * self.weekly[weekday(date)] * (1.0 + self.yearly(t)).max(0.0)
    }

    fn project(&self, days: usize) -> Result<Vec<f64>, ModelFault> {
        (1..=days as i64)
            .map(|step| {
                let value = self.predict(self.last + Duration::days(step));
                if value.is_finite() {
                    Ok(value.max(0.0))
                } else {
                    Err(ModelFault::NonFinite("seasonal projection"))
                }
            })
            .collect()
    }
}

/// Mean ratio of observation to trend level per weekday, normalised to mean 1.
/// Weekdays without observations get a neutral factor.
fn weekly_factors(dated: &[(NaiveDate, f64)], offsets: &[f64], model: &SeasonalModel) -> [f64; 7] {
    let mut sums = [0.0; 7];
    let mut counts = [0usize; 7];
    for ((date, quantity), t) in dated.iter().zip(offsets) {
        let level = model.level(*t);
        if level > LEVEL_FLOOR {
            let day = weekday(*date);
            sums[day] += quantity / level;
            counts[day] += 1;
        }
    }

    let observed: Vec<f64> = (0..7)
        .filter(|&d| counts[d] > 0)
        .map(|d| sums[d] / counts[d] as f64)
        .collect();
    if observed.is_empty() {
        return [1.0; 7];
    }
    let mean = observed.iter().sum::<f64>() / observed.len() as f64;
    if !(mean.is_finite() && mean > 0.0) {
        return [1.0; 7];
    }

    let mut factors = [1.0; 7];
    for day in 0..7 {
        if counts[day] > 0 {
            factors[day] = sums[day] / counts[day] as f64 / mean;
        }
    }
    factors
}

fn fourier_term(t: f64, column: usize, order: usize) -> f64 {
    let harmonic = (column % order + 1) as f64;
    let angle = 2.0 * PI * harmonic * t / YEAR_DAYS;
    if column < order {
        angle.sin()
    } else {
        angle.cos()
    }
}

fn weekday(date: NaiveDate) -> usize {
    date.weekday().num_days_from_monday() as usize
}

/// Date of a `Day-DD-MM-YYYY` label. Anything else has none.
pub fn coerce_date(label: &str) -> Option<NaiveDate> {
    let body = label.trim().strip_prefix("Day-")?;
    NaiveDate::parse_from_str(body, "%d-%m-%Y").ok()
}

fn coerce_series(series: &TimeSeries) -> Vec<(NaiveDate, f64)> {
    let mut dated: Vec<(NaiveDate, f64)> = series
        .points()
        .iter()
        .filter_map(|point| coerce_date(&point.label).map(|date| (date, point.quantity)))
        .collect();
    dated.sort_by_key(|(date, _)| *date);
    dated
}
