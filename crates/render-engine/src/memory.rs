//! In-memory sources and sinks, for tests and embedding.

use image::RgbImage;
use steadyframe_common::error::{StabError, StabResult};
use steadyframe_model::{FrameSize, Rotation};

use crate::media::{FrameSink, FrameSource, VideoInfo};

/// Source backed by a vector of frames.
#[derive(Debug, Clone)]
pub struct VecSource {
    info: VideoInfo,
    frames: Vec<RgbImage>,
    cursor: usize,
    passes: usize,
    replay_limit: Option<usize>,
}

impl VecSource {
    /// All frames must share the size of the first one.
    pub fn new(frames: Vec<RgbImage>, fps: f64) -> Self {
        let size = frames
            .first()
            .map(|f| FrameSize::new(f.width(), f.height()))
            .unwrap_or(FrameSize::new(0, 0));
        Self {
            info: VideoInfo {
                size,
                fps,
                frame_count: Some(frames.len() as u64),
                rotation: Rotation::None,
            },
            frames,
            cursor: 0,
            passes: 0,
            replay_limit: None,
        }
    }

    /// Override the reported frame size (needed for an empty source).
    pub fn with_size(mut self, size: FrameSize) -> Self {
        self.info.size = size;
        self
    }

    /// After a rewind, yield at most `limit` frames (a source that comes up
    /// short on the second pass).
    pub fn with_replay_limit(mut self, limit: usize) -> Self {
        self.replay_limit = Some(limit);
        self
    }

    /// Number of rewinds so far.
    pub fn rewinds(&self) -> usize {
        self.passes
    }

    fn available(&self) -> usize {
        match self.replay_limit {
            Some(limit) if self.passes > 0 => limit.min(self.frames.len()),
            _ => self.frames.len(),
        }
    }
}

impl FrameSource for VecSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn next_frame(&mut self) -> StabResult<Option<RgbImage>> {
        if self.cursor >= self.available() {
            return Ok(None);
        }
        let frame = self.frames[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn rewind(&mut self) -> StabResult<()> {
        self.cursor = 0;
        self.passes += 1;
        Ok(())
    }
}

/// Sink collecting frames in memory.
#[derive(Debug, Default)]
pub struct VecSink {
    pub frames: Vec<RgbImage>,
    finish_calls: usize,
    fail_after: Option<usize>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every write after `frames` frames were accepted.
    pub fn failing_after(frames: usize) -> Self {
        Self {
            fail_after: Some(frames),
            ..Self::default()
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finish_calls > 0
    }

    pub fn finish_calls(&self) -> usize {
        self.finish_calls
    }
}

impl FrameSink for VecSink {
    fn write_frame(&mut self, frame: &RgbImage) -> StabResult<()> {
        if self.is_finished() {
            return Err(StabError::invariant("write after finish"));
        }
        if self.fail_after.is_some_and(|limit| self.frames.len() >= limit) {
            return Err(StabError::media("sink refused frame"));
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> StabResult<()> {
        self.finish_calls += 1;
        Ok(())
    }
}
