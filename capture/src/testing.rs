//! Test doubles shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use timelapse_common::frame::Frame;
use tokio::time::Instant;

use crate::camera::{CameraDriver, CameraError, CaptureOptions, CaptureProperty};
use crate::similarity::{Similarity, SimilarityError};
use crate::tracker::Clock;

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

pub fn sized_frame(width: u32, height: u32, value: u8) -> Frame {
    Frame::new(
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([value, value, value]))),
        0,
    )
}

pub fn solid_frame(value: u8) -> Frame {
    sized_frame(8, 8, value)
}

pub fn blank_frame() -> Frame {
    solid_frame(0)
}

/// 32x32 frame with some structure, shifted by `seed`.
pub fn textured_frame(seed: u32) -> Frame {
    let img = RgbImage::from_fn(32, 32, |x, y| {
        let v = ((x * 7 + y * 3 + seed) % 256) as u8;
        Rgb([v, v, v])
    });
    Frame::new(DynamicImage::ImageRgb8(img), 0)
}

/// Camera driver that replays a queue of reads and counts lifecycle calls.
/// An exhausted queue behaves like a blank read.
pub struct ScriptedDriver {
    frames: VecDeque<Option<Frame>>,
    open: bool,
    pub opens: usize,
    pub releases: usize,
    pub reads: usize,
    pub resolution: Option<(u32, u32)>,
    pub last_device: Option<String>,
    pub fail_reads: bool,
}

impl ScriptedDriver {
    pub fn new(frames: Vec<Option<Frame>>) -> Self {
        Self {
            frames: frames.into(),
            open: false,
            opens: 0,
            releases: 0,
            reads: 0,
            resolution: None,
            last_device: None,
            fail_reads: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl CameraDriver for ScriptedDriver {
    fn open(&mut self, device: &str, _options: &CaptureOptions) -> Result<(), CameraError> {
        self.open = true;
        self.opens += 1;
        self.last_device = Some(device.to_string());
        Ok(())
    }

    fn set(&mut self, property: CaptureProperty, value: u32) -> Result<(), CameraError> {
        if !self.open {
            return Err(CameraError::NotOpen);
        }
        let (w, h) = self.resolution.unwrap_or((0, 0));
        self.resolution = Some(match property {
            CaptureProperty::FrameWidth => (value, h),
            CaptureProperty::FrameHeight => (w, value),
        });
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Frame>, CameraError> {
        if !self.open {
            return Err(CameraError::NotOpen);
        }
        self.reads += 1;
        if self.fail_reads {
            return Err(CameraError::Spawn(
                "scripted".into(),
                std::io::Error::other("read failure"),
            ));
        }
        Ok(self.frames.pop_front().flatten())
    }

    fn release(&mut self) -> Result<(), CameraError> {
        self.open = false;
        self.releases += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Similarity backend that replays a queue of scores and records the top-left
/// luma of every pair it was asked to compare.
#[derive(Default)]
pub struct ScriptedSimilarity {
    scores: RefCell<VecDeque<f64>>,
    pub pairs: Rc<RefCell<Vec<(u8, u8)>>>,
}

impl ScriptedSimilarity {
    pub fn new(scores: Vec<f64>) -> Self {
        Self {
            scores: RefCell::new(scores.into()),
            pairs: Rc::default(),
        }
    }
}

impl Similarity for ScriptedSimilarity {
    fn compare(&self, a: &GrayImage, b: &GrayImage) -> Result<f64, SimilarityError> {
        self.pairs
            .borrow_mut()
            .push((a.get_pixel(0, 0).0[0], b.get_pixel(0, 0).0[0]));
        self.scores
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| SimilarityError::Compare("score script exhausted".into()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
