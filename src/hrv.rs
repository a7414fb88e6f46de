//! Heart-rate-variability statistics from a parsed BPM series.
//!
//! [`calculate_hrv_metrics`] converts each heart-rate reading to an
//! inter-beat interval (`ibi_ms = 60000 / bpm`) and derives the standard
//! HRV measures over the IBI series:
//!
//! | Metric | Description |
//! |--------|-------------|
//! | `mean_hr` | Arithmetic mean of the BPM values |
//! | `mean_ibi` | Mean inter-beat interval in ms |
//! | `sdnn_population` | Population standard deviation of the IBI series (÷ N) |
//! | `sdnn_sample` | Sample standard deviation (÷ N−1) |
//! | `rmssd` | Root mean square of successive IBI differences (≥ 3 samples) |
//! | `pnn50` | % of successive IBI differences with \|Δ\| > 50 ms (≥ 2 samples) |
//!
//! Band validation of the raw readings (`30 < bpm < 220`) happens upstream
//! before data reaches this module; the calculator still guards against
//! non-positive or non-finite values so the IBI division can never blow up.

use chrono::{DateTime, Utc};
use thiserror::Error;

// ---------------------------------------------------------------------------
// HrvError
// ---------------------------------------------------------------------------

/// Reason an HRV computation was rejected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HrvError {
    /// Fewer than two readings — sample SDNN would divide by zero.
    #[error("insufficient data: {got} reading(s), need at least 2")]
    InsufficientData { got: usize },

    /// A reading has a non-positive or non-finite BPM value.
    #[error("invalid bpm value at index {index}: {bpm}")]
    InvalidBpm { index: usize, bpm: f64 },
}

// ---------------------------------------------------------------------------
// HrvSample / HrvMetrics
// ---------------------------------------------------------------------------

/// One heart-rate reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HrvSample {
    /// Time the reading was taken.
    pub timestamp: DateTime<Utc>,
    /// Heart rate in beats per minute.
    pub bpm: f64,
}

impl HrvSample {
    /// Convenience constructor stamping the sample with the current time.
    pub fn now(bpm: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            bpm,
        }
    }
}

/// Computed HRV statistics.  All values are rounded to two decimals.
#[derive(Debug, Clone, PartialEq)]
pub struct HrvMetrics {
    /// Mean heart rate (BPM).
    pub mean_hr: f64,
    /// Mean inter-beat interval (ms).
    pub mean_ibi: f64,
    /// Population standard deviation of the IBI series (÷ N).
    pub sdnn_population: f64,
    /// Sample standard deviation of the IBI series (÷ N−1).
    ///
    /// For exactly two identical readings this is a valid `0.0` — N−1 = 1 is
    /// a well-defined divisor, and zero variance is still zero.
    pub sdnn_sample: f64,
    /// RMSSD over successive IBI differences; `None` with fewer than three
    /// readings (fewer than two successive pairs).
    pub rmssd: Option<f64>,
    /// Percentage of successive IBI differences whose absolute value exceeds
    /// 50 ms; `None` with fewer than two readings.
    pub pnn50: Option<f64>,
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Round to two decimal places — all reported metrics use this precision.
fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Compute [`HrvMetrics`] from an ordered BPM series.
///
/// # Errors
///
/// * [`HrvError::InsufficientData`] with fewer than two readings.
/// * [`HrvError::InvalidBpm`] when any reading is non-positive or non-finite.
///
/// # Example
///
/// ```rust
/// use mindchat::hrv::{calculate_hrv_metrics, HrvSample};
///
/// let samples = vec![HrvSample::now(60.0), HrvSample::now(60.0)];
/// let metrics = calculate_hrv_metrics(&samples).unwrap();
/// assert_eq!(metrics.mean_hr, 60.0);
/// assert_eq!(metrics.sdnn_population, 0.0);
/// assert_eq!(metrics.sdnn_sample, 0.0);
/// ```
pub fn calculate_hrv_metrics(samples: &[HrvSample]) -> Result<HrvMetrics, HrvError> {
    if samples.len() < 2 {
        return Err(HrvError::InsufficientData { got: samples.len() });
    }

    for (index, sample) in samples.iter().enumerate() {
        if !sample.bpm.is_finite() || sample.bpm <= 0.0 {
            return Err(HrvError::InvalidBpm {
                index,
                bpm: sample.bpm,
            });
        }
    }

    let bpms: Vec<f64> = samples.iter().map(|s| s.bpm).collect();
    let ibis: Vec<f64> = bpms.iter().map(|bpm| 60_000.0 / bpm).collect();
    let n = ibis.len() as f64;

    let mean_hr = mean(&bpms);
    let mean_ibi = mean(&ibis);

    let sum_sq_dev: f64 = ibis.iter().map(|ibi| (ibi - mean_ibi).powi(2)).sum();
    let sdnn_population = (sum_sq_dev / n).sqrt();
    let sdnn_sample = (sum_sq_dev / (n - 1.0)).sqrt();

    let diffs: Vec<f64> = ibis.windows(2).map(|w| w[1] - w[0]).collect();

    // RMSSD needs at least two successive differences to be meaningful.
    let rmssd = if samples.len() > 2 {
        let mean_sq_diff = diffs.iter().map(|d| d * d).sum::<f64>() / diffs.len() as f64;
        Some(round2(mean_sq_diff.sqrt()))
    } else {
        None
    };

    let pnn50 = if diffs.is_empty() {
        None
    } else {
        let over_50 = diffs.iter().filter(|d| d.abs() > 50.0).count();
        Some(round2(over_50 as f64 / diffs.len() as f64 * 100.0))
    };

    Ok(HrvMetrics {
        mean_hr: round2(mean_hr),
        mean_ibi: round2(mean_ibi),
        sdnn_population: round2(sdnn_population),
        sdnn_sample: round2(sdnn_sample),
        rmssd,
        pnn50,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
