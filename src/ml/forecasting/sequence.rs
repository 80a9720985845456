/*!
 * # Recurrent Sequence Forecaster
 *
 * Learns one-step-ahead demand from sliding 30-day windows with a small Elman
 * network (tanh hidden state, linear read-out), then feeds its own
 * predictions back to cover the horizon.
 *
 * Training is bounded twice: a fixed epoch count and a deadline measured on
 * the context's [`Clock`]. Running past the deadline is reported as a fault so
 * the chain can move on to the moving average.
 */

use nalgebra::{DMatrix, DVector};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use std::time::Duration;
use tracing::debug;

use super::{ForecastContext, ForecastMethod, Forecaster, ModelFault, TierOutcome};
use crate::ml::clock::Clock;
use crate::ml::series::TimeSeries;

/// Observations required before the network is trained.
pub const MIN_POINTS: usize = 60;

/// Input window length, in days.
pub const WINDOW: usize = 30;

const TRAIN_FRACTION: f64 = 0.8;
const BATCH_SIZE: usize = 32;
const GRADIENT_CLIP: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct SequenceSettings {
    pub epochs: usize,
    pub hidden_units: usize,
    pub learning_rate: f64,
    /// Training budget, measured on the forecast context's clock.
    pub deadline: Duration,
    /// Seed for weight initialisation and batch shuffling.
    pub seed: u64,
}

impl Default for SequenceSettings {
    fn default() -> Self {
        Self {
            epochs: 50,
            hidden_units: 16,
            learning_rate: 0.01,
            deadline: Duration::from_millis(2_000),
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecurrentSequence {
    settings: SequenceSettings,
}

impl RecurrentSequence {
    pub fn new(settings: SequenceSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SequenceSettings {
        &self.settings
    }

    fn fit_and_project(
        &self,
        quantities: &[f64],
        days: usize,
        clock: &dyn Clock,
    ) -> Result<Vec<f64>, ModelFault> {
        let started = clock.now();
        let hidden = self.settings.hidden_units.max(1);

        let scaler = MinMaxScaler::fit(quantities);
        let scaled: Vec<f64> = quantities.iter().map(|q| scaler.transform(*q)).collect();

        // window start offsets; each predicts the value right after its window
        let samples: Vec<usize> = (0..scaled.len() - WINDOW).collect();
        let train_len = ((samples.len() as f64 * TRAIN_FRACTION) as usize).max(1);
        let (train, holdout) = samples.split_at(train_len);

        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        let mut net = RecurrentNet::random(hidden, &mut rng);
        let mut optimizer = Adam::new(self.settings.learning_rate, net.parameter_count());
        let mut order = train.to_vec();

        for _ in 0..self.settings.epochs {
            order.shuffle(&mut rng);
            for batch in order.chunks(BATCH_SIZE) {
                if clock.elapsed_since(started) >= self.settings.deadline {
                    return Err(ModelFault::DeadlineExceeded(self.settings.deadline));
                }

                let mut gradients = RecurrentNet::zeros(hidden);
                let mut loss = 0.0;
                for &start in batch {
                    loss += net.accumulate(
                        &scaled[start..start + WINDOW],
                        scaled[start + WINDOW],
                        &mut gradients,
                    );
                }
                if !loss.is_finite() {
                    return Err(ModelFault::NonFinite("training loss"));
                }

                let mut flat_gradients = gradients.flatten();
                let scale = 1.0 / batch.len() as f64;
                flat_gradients.iter_mut().for_each(|g| *g *= scale);
                clip(&mut flat_gradients, GRADIENT_CLIP);

                let mut params = net.flatten();
                optimizer.update(&mut params, &flat_gradients);
                net = RecurrentNet::unflatten(hidden, &params);
            }
        }

        if !holdout.is_empty() {
            let holdout_mse = holdout
                .iter()
                .map(|&start| {
                    let error = net.predict(&scaled[start..start + WINDOW]) - scaled[start + WINDOW];
                    error * error
                })
                .sum::<f64>()
                / holdout.len() as f64;
            if !holdout_mse.is_finite() {
                return Err(ModelFault::NonFinite("holdout error"));
            }
            debug!(
                holdout_mse,
                train_samples = train.len(),
                elapsed_ms = clock.elapsed_since(started).as_millis() as u64,
                "sequence model trained"
            );
        }

        let mut window = scaled[scaled.len() - WINDOW..].to_vec();
        let mut forecast = Vec::with_capacity(days);
        for _ in 0..days {
            let next = net.predict(&window);
            if !next.is_finite() {
                return Err(ModelFault::NonFinite("sequence projection"));
            }
            forecast.push(scaler.inverse(next).max(0.0));
            window.remove(0);
            window.push(next);
        }

        Ok(forecast)
    }
}

impl Forecaster for RecurrentSequence {
    fn method(&self) -> ForecastMethod {
        ForecastMethod::Sequence
    }

    fn attempt(&self, series: &TimeSeries, days: usize, ctx: &ForecastContext<'_>) -> TierOutcome {
        if series.len() < MIN_POINTS {
            return TierOutcome::InsufficientData(format!(
                "{} observations, sequence model needs {}",
                series.len(),
                MIN_POINTS
            ));
        }

        match self.fit_and_project(&series.quantities(), days, ctx.clock) {
            Ok(values) => TierOutcome::Forecast(values),
            Err(fault) => fault.into(),
        }
    }
}

/// Maps observations onto [0, 1] using the series' own range.
#[derive(Debug, Clone, Copy)]
struct MinMaxScaler {
    min: f64,
    scale: f64,
}

impl MinMaxScaler {
    fn fit(values: &[f64]) -> Self {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        Self {
            min,
            scale: if range > 0.0 { range } else { 1.0 },
        }
    }

    fn transform(&self, value: f64) -> f64 {
        (value - self.min) / self.scale
    }

    fn inverse(&self, scaled: f64) -> f64 {
        scaled * self.scale + self.min
    }
}

/// Elman network weights. Gradients are accumulated in the same shape.
#[derive(Debug, Clone)]
struct RecurrentNet {
    input: DVector<f64>,
    recurrent: DMatrix<f64>,
    bias: DVector<f64>,
    output: DVector<f64>,
    output_bias: f64,
}

impl RecurrentNet {
    fn zeros(hidden: usize) -> Self {
        Self {
            input: DVector::zeros(hidden),
            recurrent: DMatrix::zeros(hidden, hidden),
            bias: DVector::zeros(hidden),
            output: DVector::zeros(hidden),
            output_bias: 0.0,
        }
    }

    fn random(hidden: usize, rng: &mut StdRng) -> Self {
        let bound = 1.0 / (hidden as f64).sqrt();
        Self {
            input: DVector::from_fn(hidden, |_, _| rng.gen_range(-bound..bound)),
            recurrent: DMatrix::from_fn(hidden, hidden, |_, _| rng.gen_range(-bound..bound)),
            bias: DVector::from_fn(hidden, |_, _| rng.gen_range(-bound..bound)),
            output: DVector::from_fn(hidden, |_, _| rng.gen_range(-bound..bound)),
            output_bias: 0.0,
        }
    }

    fn parameter_count(&self) -> usize {
        let hidden = self.bias.len();
        hidden * hidden + 3 * hidden + 1
    }

    /// Hidden states h_0..=h_T, with h_0 = 0.
    fn hidden_states(&self, window: &[f64]) -> Vec<DVector<f64>> {
        let mut states = Vec::with_capacity(window.len() + 1);
        let mut state = DVector::zeros(self.bias.len());
        states.push(state.clone());
        for &x in window {
            state = (&self.recurrent * &state + &self.input * x + &self.bias).map(f64::tanh);
            states.push(state.clone());
        }
        states
    }

    fn predict(&self, window: &[f64]) -> f64 {
        let states = self.hidden_states(window);
        self.output.dot(&states[window.len()]) + self.output_bias
    }

    /// Backpropagates squared error through time into `gradients`; returns the loss.
    fn accumulate(&self, window: &[f64], target: f64, gradients: &mut RecurrentNet) -> f64 {
        let states = self.hidden_states(window);
        let last = &states[window.len()];
        let error = self.output.dot(last) + self.output_bias - target;

        gradients.output += last * error;
        gradients.output_bias += error;

        let mut carried = &self.output * error;
        for step in (1..=window.len()).rev() {
            let state = &states[step];
            let delta = carried.component_mul(&state.map(|h| 1.0 - h * h));
            gradients.input += &delta * window[step - 1];
            gradients.recurrent += &delta * states[step - 1].transpose();
            gradients.bias += &delta;
            carried = self.recurrent.tr_mul(&delta);
        }

        0.5 * error * error
    }

    fn flatten(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(self.parameter_count());
        flat.extend_from_slice(self.input.as_slice());
        flat.extend_from_slice(self.recurrent.as_slice());
        flat.extend_from_slice(self.bias.as_slice());
        flat.extend_from_slice(self.output.as_slice());
        flat.push(self.output_bias);
        flat
    }

    fn unflatten(hidden: usize, flat: &[f64]) -> Self {
        let (input, rest) = flat.split_at(hidden);
        let (recurrent, rest) = rest.split_at(hidden * hidden);
        let (bias, rest) = rest.split_at(hidden);
        let (output, rest) = rest.split_at(hidden);
        Self {
            input: DVector::from_column_slice(input),
            recurrent: DMatrix::from_column_slice(hidden, hidden, recurrent),
            bias: DVector::from_column_slice(bias),
            output: DVector::from_column_slice(output),
            output_bias: rest[0],
        }
    }
}

fn clip(gradients: &mut [f64], max_norm: f64) {
    let norm = gradients.iter().map(|g| g * g).sum::<f64>().sqrt();
    if norm > max_norm {
        let factor = max_norm / norm;
        gradients.iter_mut().for_each(|g| *g *= factor);
    }
}

struct Adam {
    learning_rate: f64,
    first_moment: Vec<f64>,
    second_moment: Vec<f64>,
    step: i32,
}

impl Adam {
    const BETA1: f64 = 0.9;
    const BETA2: f64 = 0.999;
    const EPSILON: f64 = 1e-8;

    fn new(learning_rate: f64, parameters: usize) -> Self {
        Self {
            learning_rate,
            first_moment: vec![0.0; parameters],
            second_moment: vec![0.0; parameters],
            step: 0,
        }
    }

    fn update(&mut self, params: &mut [f64], gradients: &[f64]) {
        self.step += 1;
        let correction1 = 1.0 - Self::BETA1.powi(self.step);
        let correction2 = 1.0 - Self::BETA2.powi(self.step);
        for (i, (param, gradient)) in params.iter_mut().zip(gradients).enumerate() {
            let m = &mut self.first_moment[i];
            *m = Self::BETA1 * *m + (1.0 - Self::BETA1) * gradient;
            let v = &mut self.second_moment[i];
            *v = Self::BETA2 * *v + (1.0 - Self::BETA2) * gradient * gradient;
            let m_hat = self.first_moment[i] / correction1;
            let v_hat = self.second_moment[i] / correction2;
            *param -= self.learning_rate * m_hat / (v_hat.sqrt() + Self::EPSILON);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::clock::{FrozenClock, SystemClock};
    use assert_matches::assert_matches;

    static FROZEN: once_cell::sync::Lazy<FrozenClock> = once_cell::sync::Lazy::new(FrozenClock::new);

    /// Training budget never runs out, so results do not depend on build speed.
    fn ctx() -> ForecastContext<'static> {
        ForecastContext {
            seed: None,
            clock: &*FROZEN,
        }
    }

    fn quick() -> RecurrentSequence {
        RecurrentSequence::new(SequenceSettings {
            epochs: 30,
            hidden_units: 8,
            ..SequenceSettings::default()
        })
    }

    fn weekly_wave(len: usize) -> TimeSeries {
        TimeSeries::from_entries((0..len).map(|i| {
            let phase = (i % 7) as f64 / 7.0 * std::f64::consts::TAU;
            (format!("Day-{}", i + 1), 20.0 + 8.0 * phase.sin())
        }))
    }

    #[test]
    fn needs_sixty_points() {
        let outcome = RecurrentSequence::default().attempt(&weekly_wave(59), 7, &ctx());
        assert_matches!(outcome, TierOutcome::InsufficientData(_));
    }

    #[test]
    fn forecasts_requested_horizon_deterministically() {
        let tier = quick();
        let series = weekly_wave(90);
        let first = tier.attempt(&series, 10, &ctx());
        let second = tier.attempt(&series, 10, &ctx());
        assert_eq!(first, second);

        let values = match first {
            TierOutcome::Forecast(values) => values,
            other => panic!("expected a forecast, got {other:?}"),
        };
        assert_eq!(values.len(), 10);
        assert!(values.iter().all(|v| v.is_finite() && *v >= 0.0 && *v <= 100.0), "{values:?}");
    }

    #[test]
    fn constant_history_stays_near_constant() {
        let series = TimeSeries::from_entries((1..=60).map(|n| (format!("Day-{n}"), 7.0)));
        let outcome = quick().attempt(&series, 5, &ctx());
        let values = match outcome {
            TierOutcome::Forecast(values) => values,
            other => panic!("expected a forecast, got {other:?}"),
        };
        assert!(values.iter().all(|v| (v - 7.0).abs() <= 1.0), "{values:?}");
    }

    #[test]
    fn expired_deadline_is_a_fault() {
        let tier = RecurrentSequence::new(SequenceSettings {
            deadline: Duration::ZERO,
            ..SequenceSettings::default()
        });
        let outcome = tier.attempt(&weekly_wave(80), 7, &ctx());
        assert_matches!(outcome, TierOutcome::RuntimeFault(reason) if reason.contains("deadline"));
    }

    #[test]
    fn generous_wall_clock_budget_trains() {
        let tier = RecurrentSequence::new(SequenceSettings {
            epochs: 2,
            hidden_units: 4,
            deadline: Duration::from_secs(60),
            ..SequenceSettings::default()
        });
        let ctx = ForecastContext {
            seed: None,
            clock: &SystemClock,
        };
        assert_matches!(tier.attempt(&weekly_wave(70), 3, &ctx), TierOutcome::Forecast(v) if v.len() == 3);
    }

    #[test]
    fn scaler_round_trips_flat_series() {
        let scaler = MinMaxScaler::fit(&[4.0, 4.0, 4.0]);
        assert_eq!(scaler.transform(4.0), 0.0);
        assert_eq!(scaler.inverse(0.0), 4.0);
    }

    #[test]
    fn flatten_preserves_layout() {
        let mut rng = StdRng::seed_from_u64(3);
        let net = RecurrentNet::random(4, &mut rng);
        let flat = net.flatten();
        assert_eq!(flat.len(), net.parameter_count());
        let rebuilt = RecurrentNet::unflatten(4, &flat);
        assert_eq!(rebuilt.flatten(), flat);
    }
}
