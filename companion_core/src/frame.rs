//! Raster frames and the sources that produce them.
//!
//! The heart rate estimator only ever sees `Frame`s. Where they come from (a
//! live camera, a recorded trace, a synthetic pulse) is hidden behind
//! `FrameSource`, which must be acquired before use and released afterwards.

use crate::{Error, Result};
use std::f64::consts::PI;
use std::path::Path;

/// Side length of frames produced by the replay and synthetic sources
pub const GENERATED_FRAME_SIZE: u32 = 80;

/// Decoded RGBA raster
///
/// Only built through `new` or `with_red_level`, so the buffer always holds
/// `width * height` pixels.
#[derive(Clone, Debug)]
pub struct Frame {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl Frame {
    /// Wrap an RGBA buffer, checking its length against the dimensions
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(Error::Other(format!(
                "Frame buffer has {} bytes, expected {} for {}x{}",
                rgba.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    /// Frame whose red channel averages to `red` over any large region
    ///
    /// The fractional part is spread evenly across pixels so the mean keeps
    /// sub-integer resolution.
    pub fn with_red_level(width: u32, height: u32, red: f64) -> Self {
        let red = red.clamp(0.0, 255.0);
        let base = red.floor();
        let frac = red - base;
        let pixels = width as usize * height as usize;

        let mut rgba = Vec::with_capacity(pixels * 4);
        for i in 0..pixels {
            let bump = ((i + 1) as f64 * frac).floor() > (i as f64 * frac).floor();
            let r = if bump { base + 1.0 } else { base };
            rgba.extend_from_slice(&[r.min(255.0) as u8, 40, 40, 255]);
        }

        Self {
            width,
            height,
            rgba,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Mean red intensity over a centered `roi_size` square
    ///
    /// The region is clipped to the frame. Empty frames, and buffers shorter
    /// than the dimensions claim, read as 0.
    pub fn roi_red_mean(&self, roi_size: u32) -> f64 {
        let w = roi_size.min(self.width);
        let h = roi_size.min(self.height);
        if w == 0 || h == 0 {
            return 0.0;
        }
        if self.rgba.len() < self.width as usize * self.height as usize * 4 {
            tracing::warn!(
                "Frame buffer of {} bytes too short for {}x{}",
                self.rgba.len(),
                self.width,
                self.height
            );
            return 0.0;
        }

        let x0 = (self.width - w) / 2;
        let y0 = (self.height - h) / 2;
        let stride = self.width as usize * 4;

        let mut sum = 0u64;
        for y in y0..y0 + h {
            let row = y as usize * stride;
            for x in x0..x0 + w {
                sum += self.rgba[row + x as usize * 4] as u64;
            }
        }
        sum as f64 / (w as u64 * h as u64) as f64
    }
}

/// Anything that can hand out frames, e.g. a camera
pub trait FrameSource {
    /// Acquire the device; fails with `SourceUnavailable` on permission or
    /// hardware problems
    fn acquire(&mut self) -> Result<()>;

    /// Next frame, or `None` once the source is exhausted or not acquired
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the device. Safe to call more than once.
    fn release(&mut self);

    fn is_acquired(&self) -> bool;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn acquire(&mut self) -> Result<()> {
        (**self).acquire()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn is_acquired(&self) -> bool {
        (**self).is_acquired()
    }
}

/// Replays a recorded red-channel trace, one sample per frame
#[derive(Debug)]
pub struct TraceSource {
    samples: Vec<f64>,
    position: usize,
    acquired: bool,
}

impl TraceSource {
    pub fn new(samples: Vec<f64>) -> Self {
        Self {
            samples,
            position: 0,
            acquired: false,
        }
    }

    /// Load a trace CSV with a `red` column
    pub fn from_csv(path: &Path) -> Result<Self> {
        Ok(Self::new(crate::trace::load_red_trace(path)?))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl FrameSource for TraceSource {
    fn acquire(&mut self) -> Result<()> {
        if self.samples.is_empty() {
            return Err(Error::SourceUnavailable("trace has no samples".into()));
        }
        self.position = 0;
        self.acquired = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.acquired {
            return Ok(None);
        }
        let frame = self.samples.get(self.position).map(|red| {
            Frame::with_red_level(GENERATED_FRAME_SIZE, GENERATED_FRAME_SIZE, *red)
        });
        self.position += 1;
        Ok(frame)
    }

    fn release(&mut self) {
        self.acquired = false;
    }

    fn is_acquired(&self) -> bool {
        self.acquired
    }
}

/// Sinusoidal red signal at a fixed heart rate
#[derive(Debug)]
pub struct SyntheticPulse {
    bpm: f64,
    fps: f64,
    baseline: f64,
    amplitude: f64,
    limit: Option<u64>,
    emitted: u64,
    acquired: bool,
}

impl SyntheticPulse {
    pub fn new(bpm: f64, fps: f64) -> Self {
        Self {
            bpm,
            fps,
            baseline: 150.0,
            amplitude: 3.0,
            limit: None,
            emitted: 0,
            acquired: false,
        }
    }

    /// Stop after `frames` frames
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Red level of the `n`th frame
    pub fn level_at(&self, n: u64) -> f64 {
        let t = n as f64 / self.fps;
        self.baseline + self.amplitude * (2.0 * PI * self.bpm / 60.0 * t).sin()
    }
}

impl FrameSource for SyntheticPulse {
    fn acquire(&mut self) -> Result<()> {
        self.emitted = 0;
        self.acquired = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.acquired || self.limit.is_some_and(|limit| self.emitted >= limit) {
            return Ok(None);
        }
        let level = self.level_at(self.emitted);
        self.emitted += 1;
        Ok(Some(Frame::with_red_level(
            GENERATED_FRAME_SIZE,
            GENERATED_FRAME_SIZE,
            level,
        )))
    }

    fn release(&mut self) {
        self.acquired = false;
    }

    fn is_acquired(&self) -> bool {
        self.acquired
    }
}

/// A source that can never be acquired, like a camera with permission denied
#[derive(Debug)]
pub struct UnavailableSource {
    reason: String,
}

impl UnavailableSource {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl FrameSource for UnavailableSource {
    fn acquire(&mut self) -> Result<()> {
        Err(Error::SourceUnavailable(self.reason.clone()))
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(None)
    }

    fn release(&mut self) {}

    fn is_acquired(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_new_checks_length() {
        assert!(Frame::new(2, 2, vec![0; 16]).is_ok());
        assert!(Frame::new(2, 2, vec![0; 15]).is_err());
    }

    #[test]
    fn test_roi_mean_uses_centered_region() {
        // 4x4 frame: red 200 in the central 2x2, 0 elsewhere
        let mut rgba = vec![0u8; 4 * 4 * 4];
        for y in 1..3 {
            for x in 1..3 {
                rgba[(y * 4 + x) * 4] = 200;
            }
        }
        let frame = Frame::new(4, 4, rgba).unwrap();

        assert_eq!(frame.roi_red_mean(2), 200.0);
        assert_eq!(frame.roi_red_mean(4), 50.0);
        // Larger than the frame: clipped to the whole frame
        assert_eq!(frame.roi_red_mean(80), 50.0);
    }

    #[test]
    fn test_short_buffer_reads_as_zero() {
        let frame = Frame {
            width: 320,
            height: 240,
            rgba: vec![200; 16],
        };
        assert_eq!(frame.roi_red_mean(80), 0.0);

        let mut est = crate::PpgEstimator::new(crate::config::PpgConfig::default());
        est.begin();
        assert_eq!(est.on_frame(&frame), crate::FrameOutcome::Sampling);
        assert_eq!(est.sample_count(), 1);
    }

    #[test]
    fn test_accessors() {
        let frame = Frame::new(2, 1, vec![9, 0, 0, 255, 7, 0, 0, 255]).unwrap();
        assert_eq!((frame.width(), frame.height()), (2, 1));
        assert_eq!(frame.rgba().len(), 8);
        assert_eq!(frame.roi_red_mean(2), 8.0);
    }

    #[test]
    fn test_camera_sized_roi() {
        let frame = Frame::with_red_level(320, 240, 120.0);
        assert_eq!(frame.roi_red_mean(80), 120.0);
    }

    #[test]
    fn test_red_level_keeps_fraction() {
        let frame = Frame::with_red_level(80, 80, 150.37);
        let mean = frame.roi_red_mean(80);
        assert!((mean - 150.37).abs() < 0.001, "mean was {}", mean);
    }

    #[test]
    fn test_trace_source_lifecycle() {
        let mut source = TraceSource::new(vec![100.0, 101.5]);
        assert!(source.next_frame().unwrap().is_none());

        source.acquire().unwrap();
        assert!(source.is_acquired());
        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.roi_red_mean(80), 100.0);
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());

        source.release();
        source.release();
        assert!(!source.is_acquired());
    }

    #[test]
    fn test_empty_trace_unavailable() {
        let mut source = TraceSource::new(vec![]);
        assert!(matches!(source.acquire(), Err(Error::SourceUnavailable(_))));
    }

    #[test]
    fn test_synthetic_pulse_limit() {
        let mut source = SyntheticPulse::new(72.0, 30.0).with_limit(3);
        source.acquire().unwrap();
        let mut count = 0;
        while source.next_frame().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn test_unavailable_source() {
        let mut source = UnavailableSource::new("permission denied");
        let err = source.acquire().unwrap_err();
        assert!(err.to_string().contains("permission denied"));
        assert!(!source.is_acquired());
    }
}
