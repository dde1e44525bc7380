//! Stacked LSTM regressor on min-max scaled closing prices
//!
//! Each sample is a window of `lookback` scaled closes and the target is the
//! next close. The network is a stack of LSTM layers (all but the last feed
//! their whole sequence upward) followed by a single linear unit. Training
//! minimises mean squared error with Adam over shuffled mini-batches and full
//! backpropagation through time.
//!
//! The historical fit trains on the leading `train_ratio` share of windows and
//! predicts the remaining ones, so its fitted values carry their own actuals.
//! The future forecast retrains on every window and feeds each prediction
//! back into the window.

use crate::config::LstmConfig;
use crate::error::{ForecastError, Result};
use crate::models::{
    check_steps, last_date, DatedValue, FitResult, ForecastAdapter, ForecastResult, ModelKind,
};
use crate::preprocessing::PreprocessedSeries;
use crate::utils::train_size;
use crypto_math::scaling::MinMaxScaler;
use ndarray::linalg::general_mat_mul;
use ndarray::{s, Array, Array1, Array2, Axis, Dimension, Ix1, Ix2, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-7;

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

fn uniform(rng: &mut StdRng, limit: f64) -> f64 {
    rng.gen_range(-limit..limit)
}

/// One LSTM layer with the four gates stacked as `[input; forget; cell; output]`
#[derive(Debug, Clone)]
struct LstmLayer {
    input: usize,
    hidden: usize,
    /// `(4 * hidden, input + hidden)` weights over the concatenated `[x; h]`
    w: Array2<f64>,
    b: Array1<f64>,
}

/// Activations kept from the forward pass for one time step
struct StepCache {
    xh: Array1<f64>,
    i: Array1<f64>,
    f: Array1<f64>,
    g: Array1<f64>,
    o: Array1<f64>,
    c_prev: Array1<f64>,
    tanh_c: Array1<f64>,
}

impl LstmLayer {
    fn new(input: usize, hidden: usize, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (input + 5 * hidden) as f64).sqrt();
        let w = Array2::from_shape_fn((4 * hidden, input + hidden), |_| uniform(rng, limit));

        let mut b: Array1<f64> = Array1::zeros(4 * hidden);
        b.slice_mut(s![hidden..2 * hidden]).fill(1.0);

        Self {
            input,
            hidden,
            w,
            b,
        }
    }

    /// Hidden state at every step of `inputs`, plus the caches for backprop
    fn forward(&self, inputs: &[Array1<f64>]) -> (Vec<Array1<f64>>, Vec<StepCache>) {
        let n = self.hidden;
        let mut h: Array1<f64> = Array1::zeros(n);
        let mut c: Array1<f64> = Array1::zeros(n);
        let mut outputs = Vec::with_capacity(inputs.len());
        let mut caches = Vec::with_capacity(inputs.len());

        for x in inputs {
            let mut xh: Array1<f64> = Array1::zeros(self.input + n);
            xh.slice_mut(s![..self.input]).assign(x);
            xh.slice_mut(s![self.input..]).assign(&h);

            let z = self.w.dot(&xh) + &self.b;
            let i = z.slice(s![..n]).mapv(sigmoid);
            let f = z.slice(s![n..2 * n]).mapv(sigmoid);
            let g = z.slice(s![2 * n..3 * n]).mapv(f64::tanh);
            let o = z.slice(s![3 * n..]).mapv(sigmoid);

            let c_next = &f * &c + &i * &g;
            let tanh_c = c_next.mapv(f64::tanh);
            let h_next = &o * &tanh_c;

            caches.push(StepCache {
                xh,
                i,
                f,
                g,
                o,
                c_prev: c,
                tanh_c,
            });
            outputs.push(h_next.clone());
            h = h_next;
            c = c_next;
        }

        (outputs, caches)
    }

    /// Accumulate parameter gradients given `d_out[t] = dL/dh_t` and return
    /// the gradient with respect to each input.
    fn backward(
        &self,
        caches: &[StepCache],
        d_out: &[Array1<f64>],
        grads: &mut LayerGradients,
    ) -> Vec<Array1<f64>> {
        let n = self.hidden;
        let mut dh_next: Array1<f64> = Array1::zeros(n);
        let mut dc_next: Array1<f64> = Array1::zeros(n);
        let mut dx = vec![Array1::zeros(self.input); caches.len()];

        for t in (0..caches.len()).rev() {
            let step = &caches[t];
            let dh = &d_out[t] + &dh_next;

            let d_o = &dh * &step.tanh_c;
            let dc = &dh * &step.o * &step.tanh_c.mapv(|v| 1.0 - v * v) + &dc_next;
            let di = &dc * &step.g;
            let dg = &dc * &step.i;
            let df = &dc * &step.c_prev;

            let mut dz: Array1<f64> = Array1::zeros(4 * n);
            dz.slice_mut(s![..n])
                .assign(&(di * &step.i.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![n..2 * n])
                .assign(&(df * &step.f.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![2 * n..3 * n])
                .assign(&(dg * &step.g.mapv(|v| 1.0 - v * v)));
            dz.slice_mut(s![3 * n..])
                .assign(&(d_o * &step.o.mapv(|v| v * (1.0 - v))));

            let dz_col = dz.view().insert_axis(Axis(1));
            let xh_row = step.xh.view().insert_axis(Axis(0));
            general_mat_mul(1.0, &dz_col, &xh_row, 1.0, &mut grads.w);
            grads.b += &dz;

            let dxh = self.w.t().dot(&dz);
            dx[t] = dxh.slice(s![..self.input]).to_owned();
            dh_next = dxh.slice(s![self.input..]).to_owned();
            dc_next = &dc * &step.f;
        }

        dx
    }
}

#[derive(Debug, Clone)]
struct LayerGradients {
    w: Array2<f64>,
    b: Array1<f64>,
}

#[derive(Debug, Clone)]
struct Gradients {
    layers: Vec<LayerGradients>,
    head_w: Array1<f64>,
    head_b: Array1<f64>,
}

impl Gradients {
    fn zeros(net: &Network) -> Self {
        Self {
            layers: net
                .layers
                .iter()
                .map(|l| LayerGradients {
                    w: Array2::zeros(l.w.raw_dim()),
                    b: Array1::zeros(l.b.len()),
                })
                .collect(),
            head_w: Array1::zeros(net.head_w.len()),
            head_b: Array1::zeros(1),
        }
    }

    fn scale(&mut self, factor: f64) {
        for layer in &mut self.layers {
            layer.w *= factor;
            layer.b *= factor;
        }
        self.head_w *= factor;
        self.head_b *= factor;
    }
}

/// First and second moment estimates for one parameter tensor
#[derive(Debug, Clone)]
struct Moments<D: Dimension> {
    m: Array<f64, D>,
    v: Array<f64, D>,
}

impl<D: Dimension> Moments<D> {
    fn zeros_like(param: &Array<f64, D>) -> Self {
        Self {
            m: Array::zeros(param.raw_dim()),
            v: Array::zeros(param.raw_dim()),
        }
    }

    fn update(&mut self, param: &mut Array<f64, D>, grad: &Array<f64, D>, step_size: f64) {
        Zip::from(param)
            .and(grad)
            .and(&mut self.m)
            .and(&mut self.v)
            .for_each(|p, &g, m, v| {
                *m = BETA1 * *m + (1.0 - BETA1) * g;
                *v = BETA2 * *v + (1.0 - BETA2) * g * g;
                *p -= step_size * *m / (v.sqrt() + EPSILON);
            });
    }
}

#[derive(Debug, Clone)]
struct Adam {
    learning_rate: f64,
    t: i32,
    layers: Vec<(Moments<Ix2>, Moments<Ix1>)>,
    head_w: Moments<Ix1>,
    head_b: Moments<Ix1>,
}

impl Adam {
    fn new(net: &Network, learning_rate: f64) -> Self {
        Self {
            learning_rate,
            t: 0,
            layers: net
                .layers
                .iter()
                .map(|l| (Moments::zeros_like(&l.w), Moments::zeros_like(&l.b)))
                .collect(),
            head_w: Moments::zeros_like(&net.head_w),
            head_b: Moments::zeros_like(&net.head_b),
        }
    }

    fn step(&mut self, net: &mut Network, grads: &Gradients) {
        self.t += 1;
        let step_size = self.learning_rate * (1.0 - BETA2.powi(self.t)).sqrt()
            / (1.0 - BETA1.powi(self.t));

        for ((layer, g), (mw, mb)) in net
            .layers
            .iter_mut()
            .zip(&grads.layers)
            .zip(&mut self.layers)
        {
            mw.update(&mut layer.w, &g.w, step_size);
            mb.update(&mut layer.b, &g.b, step_size);
        }
        self.head_w.update(&mut net.head_w, &grads.head_w, step_size);
        self.head_b.update(&mut net.head_b, &grads.head_b, step_size);
    }
}

/// LSTM stack with a linear output unit
#[derive(Debug, Clone)]
struct Network {
    layers: Vec<LstmLayer>,
    head_w: Array1<f64>,
    head_b: Array1<f64>,
}

impl Network {
    fn new(hidden: usize, depth: usize, rng: &mut StdRng) -> Self {
        let layers = (0..depth)
            .map(|k| LstmLayer::new(if k == 0 { 1 } else { hidden }, hidden, rng))
            .collect();
        let limit = (6.0 / (hidden + 1) as f64).sqrt();
        let head_w = Array1::from_shape_fn(hidden, |_| uniform(rng, limit));

        Self {
            layers,
            head_w,
            head_b: Array1::zeros(1),
        }
    }

    fn sequence(window: &[f64]) -> Vec<Array1<f64>> {
        window.iter().map(|v| Array1::from_elem(1, *v)).collect()
    }

    fn predict(&self, window: &[f64]) -> f64 {
        let mut seq = Self::sequence(window);
        for layer in &self.layers {
            seq = layer.forward(&seq).0;
        }
        match seq.last() {
            Some(h) => self.head_w.dot(h) + self.head_b[0],
            None => self.head_b[0],
        }
    }

    /// Add the squared-error gradient of one sample to `grads`, returning the loss
    fn accumulate(&self, window: &[f64], target: f64, grads: &mut Gradients) -> f64 {
        let mut seq = Self::sequence(window);
        let mut caches = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let (out, cache) = layer.forward(&seq);
            caches.push(cache);
            seq = out;
        }

        let hidden = self.head_w.len();
        let last = seq.last().cloned().unwrap_or_else(|| Array1::zeros(hidden));
        let err = self.head_w.dot(&last) + self.head_b[0] - target;
        let dy = 2.0 * err;

        grads.head_w.scaled_add(dy, &last);
        grads.head_b[0] += dy;

        let mut d_out: Vec<Array1<f64>> = vec![Array1::zeros(hidden); seq.len()];
        if let Some(tail) = d_out.last_mut() {
            *tail = &self.head_w * dy;
        }
        for (k, layer) in self.layers.iter().enumerate().rev() {
            d_out = layer.backward(&caches[k], &d_out, &mut grads.layers[k]);
        }

        err * err
    }

    /// Fit on windows `scaled[j..j + lookback] -> scaled[j + lookback]` for
    /// `j < n_windows`. Returns the mean loss of each epoch.
    fn train(
        &mut self,
        scaled: &[f64],
        lookback: usize,
        n_windows: usize,
        config: &LstmConfig,
        rng: &mut StdRng,
    ) -> Vec<f64> {
        let mut adam = Adam::new(self, config.learning_rate);
        let mut order: Vec<usize> = (0..n_windows).collect();
        let mut history = Vec::with_capacity(config.epochs);

        for epoch in 0..config.epochs {
            order.shuffle(rng);
            let mut total = 0.0;

            for batch in order.chunks(config.batch_size) {
                let mut grads = Gradients::zeros(self);
                for &j in batch {
                    total += self.accumulate(
                        &scaled[j..j + lookback],
                        scaled[j + lookback],
                        &mut grads,
                    );
                }
                grads.scale(1.0 / batch.len() as f64);
                adam.step(self, &grads);
            }

            let loss = total / n_windows as f64;
            debug!(epoch = epoch + 1, loss, "LSTM epoch");
            history.push(loss);
        }

        history
    }
}

/// Recurrent network adapter
#[derive(Debug, Clone)]
pub struct LstmAdapter {
    config: LstmConfig,
}

impl LstmAdapter {
    pub fn new(config: LstmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LstmConfig {
        &self.config
    }

    fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Scaler fitted on the whole series and the scaled closes
    fn scale(&self, closes: &[f64]) -> Result<(MinMaxScaler, Vec<f64>)> {
        let scaler = MinMaxScaler::fit(closes)?;
        let scaled = scaler.transform(closes);
        Ok((scaler, scaled))
    }

    fn build(&self, rng: &mut StdRng) -> Network {
        Network::new(self.config.hidden_units, self.config.layers, rng)
    }
}

impl Default for LstmAdapter {
    fn default() -> Self {
        Self::new(LstmConfig::default())
    }
}

impl ForecastAdapter for LstmAdapter {
    fn kind(&self) -> ModelKind {
        ModelKind::Lstm
    }

    fn fit_historical(&self, series: &PreprocessedSeries) -> Result<FitResult> {
        self.config.validate()?;
        let lookback = self.config.lookback;
        let closes = series.closes();
        let dates = series.dates();

        let n_windows = closes.len().saturating_sub(lookback);
        let n_train = train_size(n_windows, self.config.train_ratio);
        if n_train == 0 || n_train >= n_windows {
            return Err(ForecastError::InsufficientData {
                required: lookback + 2,
                actual: closes.len(),
            });
        }

        let (scaler, scaled) = self.scale(&closes)?;
        let mut rng = self.rng();
        let mut net = self.build(&mut rng);
        let losses = net.train(&scaled, lookback, n_train, &self.config, &mut rng);

        let mut fitted = Vec::with_capacity(n_windows - n_train);
        let mut actual = Vec::with_capacity(n_windows - n_train);
        for j in n_train..n_windows {
            let target = j + lookback;
            let pred = scaler.inverse_one(net.predict(&scaled[j..target]));
            fitted.push(DatedValue::new(dates[target], pred));
            actual.push(DatedValue::new(dates[target], closes[target]));
        }

        info!(
            symbol = series.symbol(),
            train_windows = n_train,
            test_points = fitted.len(),
            final_loss = losses.last().copied().unwrap_or(f64::NAN),
            "LSTM historical fit"
        );

        FitResult::new(ModelKind::Lstm, fitted)?.with_actual(actual)
    }

    fn forecast_future(
        &self,
        series: &PreprocessedSeries,
        steps: usize,
    ) -> Result<ForecastResult> {
        check_steps(steps)?;
        self.config.validate()?;
        let last = last_date(series)?;
        let lookback = self.config.lookback;
        let closes = series.closes();

        let n_windows = closes.len().saturating_sub(lookback);
        if n_windows == 0 {
            return Err(ForecastError::InsufficientData {
                required: lookback + 1,
                actual: closes.len(),
            });
        }

        let (scaler, scaled) = self.scale(&closes)?;
        let mut rng = self.rng();
        let mut net = self.build(&mut rng);
        net.train(&scaled, lookback, n_windows, &self.config, &mut rng);

        let mut window = scaled[scaled.len() - lookback..].to_vec();
        let mut values = Vec::with_capacity(steps);
        for _ in 0..steps {
            let next = net.predict(&window);
            values.push(scaler.inverse_one(next));
            window.remove(0);
            window.push(next);
        }

        info!(symbol = series.symbol(), steps, "LSTM forecast");
        ForecastResult::new(ModelKind::Lstm, last, values)
    }
}
