//! Camera-based heart rate estimation (photoplethysmography).
//!
//! Each frame contributes one sample: the mean red intensity over a centered
//! region. Once enough frames are in, the signal is detrended with a centered
//! moving average, local maxima above a threshold are counted as beats, and
//! the beat rate is clamped to a plausible range. After each estimate the
//! buffer slides forward so later estimates re-evaluate recent signal only.
//!
//! This is a best-effort heuristic, not a medical measurement.

use crate::config::{FallbackPolicy, PpgConfig};
use crate::frame::{Frame, FrameSource};
use crate::{Error, HeartReading, Result, Rhythm};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use uuid::Uuid;

/// Filler range used by `FallbackPolicy::PlausibleFiller`
const FILLER_BPM: std::ops::Range<u32> = 65..90;

/// One BPM estimate
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Estimate {
    pub bpm: u32,
    /// Unclamped rate from peak counting
    pub raw_bpm: u32,
    pub peaks: usize,
    pub confidence: f64,
    pub rhythm: Rhythm,
    /// True when `bpm` is a substituted filler rather than a measurement
    pub filler: bool,
}

/// What a single frame did
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameOutcome {
    /// Estimator not measuring; frame ignored
    Ignored,
    /// Sample recorded, no estimate yet
    Sampling,
    Estimated(Estimate),
    /// Estimation ran but found no beats
    Inconclusive,
}

/// Subtract a centered moving average from each sample
///
/// The window spans `half_width` samples on each side and is clipped at the
/// ends of the signal.
pub fn detrend(samples: &[f64], half_width: usize) -> Vec<f64> {
    let n = samples.len();
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    for s in samples {
        prefix.push(prefix[prefix.len() - 1] + s);
    }

    (0..n)
        .map(|i| {
            let start = i.saturating_sub(half_width);
            let end = (i + half_width + 1).min(n);
            let mean = (prefix[end] - prefix[start]) / (end - start) as f64;
            samples[i] - mean
        })
        .collect()
}

/// Count samples strictly above both neighbors and above `threshold`
pub fn count_peaks(signal: &[f64], threshold: f64) -> usize {
    signal
        .windows(3)
        .filter(|w| w[1] > w[0] && w[1] > w[2] && w[1] > threshold)
        .count()
}

/// Beats per minute from a peak count over `sample_count` samples
pub fn beats_per_minute(peaks: usize, sample_count: usize, fps: f64) -> u32 {
    if sample_count == 0 {
        return 0;
    }
    let elapsed_secs = sample_count as f64 / fps;
    (peaks as f64 / elapsed_secs * 60.0).round() as u32
}

/// Rolling PPG estimator for a single measurement session
#[derive(Debug)]
pub struct PpgEstimator {
    config: PpgConfig,
    samples: VecDeque<f64>,
    display: VecDeque<f64>,
    frame_count: u64,
    bpm: Option<u32>,
    confidence: f64,
    rhythm: Rhythm,
    measuring: bool,
    rng: StdRng,
}

impl PpgEstimator {
    pub fn new(config: PpgConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Estimator whose filler values are reproducible from `seed`
    pub fn seeded(config: PpgConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(config: PpgConfig, rng: StdRng) -> Self {
        Self {
            config,
            samples: VecDeque::new(),
            display: VecDeque::new(),
            frame_count: 0,
            bpm: None,
            confidence: 0.0,
            rhythm: Rhythm::Ready,
            measuring: false,
            rng,
        }
    }

    /// Clear the signal and start measuring
    pub fn begin(&mut self) {
        self.samples.clear();
        self.display.clear();
        self.frame_count = 0;
        self.bpm = None;
        self.confidence = 0.0;
        self.rhythm = Rhythm::Measuring;
        self.measuring = true;
        tracing::info!("PPG measurement started");
    }

    /// Stop sampling; the last estimate stays readable
    pub fn halt(&mut self) {
        if self.measuring {
            self.measuring = false;
            tracing::info!(
                "PPG measurement stopped after {} frames (bpm {:?})",
                self.frame_count,
                self.bpm
            );
        }
    }

    pub fn on_frame(&mut self, frame: &Frame) -> FrameOutcome {
        let red = frame.roi_red_mean(self.config.roi_size);
        self.push_sample(red)
    }

    /// Feed one red-channel mean directly
    pub fn push_sample(&mut self, red: f64) -> FrameOutcome {
        if !self.measuring {
            return FrameOutcome::Ignored;
        }

        self.samples.push_back(red);
        let cap = self
            .config
            .min_samples
            .max(self.config.estimate_after_frames as usize)
            * 2;
        while self.samples.len() > cap {
            self.samples.pop_front();
        }

        self.display.push_back(red);
        while self.display.len() > self.config.display_window {
            self.display.pop_front();
        }

        self.frame_count += 1;

        if self.frame_count >= self.config.estimate_after_frames
            && self.samples.len() >= self.config.min_samples
        {
            self.estimate()
        } else {
            FrameOutcome::Sampling
        }
    }

    fn estimate(&mut self) -> FrameOutcome {
        let signal: Vec<f64> = self.samples.iter().copied().collect();
        let detrended = detrend(&signal, self.config.detrend_half_width);
        let peaks = count_peaks(&detrended, self.config.peak_threshold);
        let raw_bpm = beats_per_minute(peaks, signal.len(), self.config.capture_fps);

        let outcome = if raw_bpm == 0 {
            match self.config.fallback {
                FallbackPolicy::Inconclusive => {
                    tracing::warn!(
                        "No beats found in {} samples; estimate inconclusive",
                        signal.len()
                    );
                    FrameOutcome::Inconclusive
                }
                FallbackPolicy::PlausibleFiller => {
                    let filler = self.rng.gen_range(FILLER_BPM);
                    tracing::warn!("No beats found; substituting filler {} bpm", filler);
                    FrameOutcome::Estimated(self.record(filler, raw_bpm, peaks, true))
                }
            }
        } else {
            let bpm = raw_bpm.clamp(self.config.min_bpm, self.config.max_bpm);
            tracing::debug!(
                "{} peaks over {} samples: raw {} bpm, reported {}",
                peaks,
                signal.len(),
                raw_bpm,
                bpm
            );
            FrameOutcome::Estimated(self.record(bpm, raw_bpm, peaks, false))
        };

        // Slide the window so the next estimate is a fresh re-evaluation
        while self.samples.len() > self.config.retain_samples {
            self.samples.pop_front();
        }
        self.frame_count = self.config.rewind_frames;

        outcome
    }

    fn record(&mut self, bpm: u32, raw_bpm: u32, peaks: usize, filler: bool) -> Estimate {
        let confidence = (60.0 + self.frame_count as f64 / 10.0).min(95.0);
        let rhythm = Rhythm::classify(bpm);
        self.bpm = Some(bpm);
        self.confidence = confidence;
        self.rhythm = rhythm;
        Estimate {
            bpm,
            raw_bpm,
            peaks,
            confidence,
            rhythm,
            filler,
        }
    }

    pub fn bpm(&self) -> Option<u32> {
        self.bpm
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn rhythm(&self) -> Rhythm {
        self.rhythm
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_measuring(&self) -> bool {
        self.measuring
    }

    /// Most recent samples, for drawing the waveform
    pub fn display_signal(&self) -> Vec<f64> {
        self.display.iter().copied().collect()
    }

    pub fn config(&self) -> &PpgConfig {
        &self.config
    }

    /// Current estimate as a record for the data store
    pub fn reading(&self, duration_seconds: Option<u32>) -> Option<HeartReading> {
        self.bpm.map(|bpm| HeartReading {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            bpm,
            confidence: self.confidence,
            rhythm: self.rhythm,
            duration_seconds,
        })
    }
}

/// Couples an estimator with the frame source feeding it
///
/// The source is released on `stop`, on every exit from `measure`, and when
/// the monitor is dropped.
pub struct PpgMonitor<S: FrameSource> {
    source: S,
    estimator: PpgEstimator,
}

impl<S: FrameSource> PpgMonitor<S> {
    pub fn new(source: S, config: PpgConfig) -> Self {
        Self::with_estimator(source, PpgEstimator::new(config))
    }

    pub fn with_estimator(source: S, estimator: PpgEstimator) -> Self {
        Self { source, estimator }
    }

    /// Acquire the source and begin a fresh measurement
    ///
    /// On failure the estimator stays in its previous (ready) state.
    pub fn start(&mut self) -> Result<()> {
        if self.source.is_acquired() {
            self.stop();
        }

        if let Err(e) = self.source.acquire() {
            tracing::error!("Could not acquire frame source: {}", e);
            return Err(match e {
                Error::SourceUnavailable(_) => e,
                other => Error::SourceUnavailable(other.to_string()),
            });
        }

        self.estimator.begin();
        Ok(())
    }

    /// Pull and process one frame; `None` when the source has nothing more
    pub fn poll(&mut self) -> Result<Option<FrameOutcome>> {
        if !self.source.is_acquired() {
            return Ok(None);
        }
        Ok(self
            .source
            .next_frame()?
            .map(|frame| self.estimator.on_frame(&frame)))
    }

    /// Release the source and stop sampling
    pub fn stop(&mut self) {
        self.source.release();
        self.estimator.halt();
    }

    /// Run one measurement over at most `max_frames` frames
    ///
    /// `pace` yields once per frame interval. Returns the last estimate, or
    /// `EstimationInconclusive` when none was produced.
    pub fn measure<P>(&mut self, max_frames: u64, pace: P) -> Result<Estimate>
    where
        P: IntoIterator<Item = ()>,
    {
        self.start()?;
        let result = self.run_frames(max_frames, pace);
        self.stop();
        result
    }

    fn run_frames<P>(&mut self, max_frames: u64, pace: P) -> Result<Estimate>
    where
        P: IntoIterator<Item = ()>,
    {
        let mut last = None;
        for _ in pace.into_iter().take(max_frames as usize) {
            match self.poll()? {
                Some(FrameOutcome::Estimated(estimate)) => last = Some(estimate),
                Some(_) => {}
                None => break,
            }
        }
        last.ok_or(Error::EstimationInconclusive)
    }

    pub fn estimator(&self) -> &PpgEstimator {
        &self.estimator
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: FrameSource> Drop for PpgMonitor<S> {
    fn drop(&mut self) {
        if self.source.is_acquired() {
            self.source.release();
        }
    }
}
