use serde::{Deserialize, Serialize};

/// Online mean and standard deviation (Welford's algorithm).
#[derive(Debug, Default)]
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    sq_dev_sum: f64,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub n_vals: usize,
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;
        let dev_old = val - self.mean;
        self.mean += dev_old / self.n_vals as f64;
        self.sq_dev_sum += dev_old * (val - self.mean);
    }

    pub fn report(&self) -> AccumulatorReport {
        let std_dev = match self.n_vals {
            0 | 1 => f64::NAN,
            n_vals => (self.sq_dev_sum / (n_vals - 1) as f64).sqrt(),
        };
        AccumulatorReport {
            n_vals: self.n_vals,
            mean: if self.n_vals == 0 { f64::NAN } else { self.mean },
            std_dev,
        }
    }
}

/// Time series of a scalar observable, one value per iteration.
#[derive(Debug, Default)]
pub struct TimeSeries {
    vals: Vec<f64>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesReport {
    /// Index of the first value of the equilibrated part.
    pub i_equil: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub sem: f64,
    pub is_equil: bool,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, val: f64) {
        self.vals.push(val);
    }

    /// Report statistics of the equilibrated part of the series.
    ///
    /// The part is chosen with the marginal standard error rule; the series
    /// counts as equilibrated if the cut is before its second half.
    pub fn report(&self) -> TimeSeriesReport {
        let i_equil = equilibration_index(&self.vals);
        let tail = &self.vals[i_equil..];
        TimeSeriesReport {
            i_equil,
            mean: mean(tail),
            std_dev: sample_var(tail).sqrt(),
            sem: blocking_sem(tail),
            is_equil: i_equil < self.vals.len() / 2,
        }
    }
}

fn mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

fn sample_var(vals: &[f64]) -> f64 {
    if vals.len() < 2 {
        return f64::NAN;
    }
    let mean = mean(vals);
    let sq_dev_sum: f64 = vals.iter().map(|val| (val - mean).powi(2)).sum();
    sq_dev_sum / (vals.len() - 1) as f64
}

/// Standard error of the mean of correlated values (Flyvbjerg-Petersen blocking).
fn blocking_sem(vals: &[f64]) -> f64 {
    let mut block = vals.to_vec();
    let mut estimates = Vec::new();
    while block.len() >= 2 {
        let n_vals = block.len() as f64;
        let sem_sq = sample_var(&block) / n_vals;
        let sem_sq_err = sem_sq * (2.0 / (n_vals - 1.0)).sqrt();
        estimates.push((sem_sq, sem_sq_err));
        block = block
            .chunks_exact(2)
            .map(|pair| 0.5 * (pair[0] + pair[1]))
            .collect();
    }

    // First blocking level whose estimate exceeds every later lower bound.
    for (i_lvl, &(sem_sq, _)) in estimates.iter().enumerate() {
        let max_lower = estimates[i_lvl..]
            .iter()
            .map(|&(est, err)| est - err)
            .fold(f64::NEG_INFINITY, f64::max);
        if sem_sq > max_lower {
            return sem_sq.sqrt();
        }
    }
    estimates.last().map_or(f64::NAN, |&(sem_sq, _)| sem_sq.sqrt())
}

/// Start of the equilibrated part by the marginal standard error rule.
///
/// Candidate cuts are `len / 2^k`; the one minimizing the marginal standard
/// error of the remaining values wins, half of the series by default.
fn equilibration_index(vals: &[f64]) -> usize {
    let n_vals = vals.len();
    if n_vals < 2 {
        return 0;
    }
    let n_cuts = n_vals.ilog2() + 1;

    let mut best = (f64::INFINITY, n_vals / 2);
    for k in (1..=n_cuts).rev() {
        let i_cut = n_vals >> k;
        let tail = &vals[i_cut..];
        let n_tail = tail.len();
        let mse = sample_var(tail) * (n_tail - 1) as f64 / n_tail.pow(2) as f64;
        if mse < best.0 {
            best = (mse, i_cut);
        }
    }
    best.1
}
