//! Directories of still images as frame sources and sinks.

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::RgbImage;
use steadyframe_common::error::{StabError, StabResult};
use steadyframe_model::{FrameSize, Rotation};

use crate::media::{FrameSink, FrameSource, VideoInfo};

/// Frame rate assumed for image sequences when none is given.
pub const DEFAULT_SEQUENCE_FPS: f64 = 30.0;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn load_rgb(path: &Path) -> StabResult<RgbImage> {
    let img = image::open(path)
        .map_err(|e| StabError::media(format!("Failed to read {}: {e}", path.display())))?;
    Ok(img.to_rgb8())
}

/// Image files of a directory in file-name order.
///
/// Frames whose size differs from the first image are resized to fit it.
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    files: Vec<PathBuf>,
    info: VideoInfo,
    cursor: usize,
}

impl ImageSequenceSource {
    pub fn open(dir: impl AsRef<Path>, fps: Option<f64>) -> StabResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(StabError::FileNotFound {
                path: dir.to_path_buf(),
            });
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let (width, height) = match files.first() {
            Some(first) => image::image_dimensions(first).map_err(|e| {
                StabError::media(format!("Failed to read {}: {e}", first.display()))
            })?,
            None => {
                tracing::warn!(dir = %dir.display(), "No images found, sequence is empty");
                (0, 0)
            }
        };

        let fps = fps.unwrap_or(DEFAULT_SEQUENCE_FPS);
        if !fps.is_finite() || fps <= 0.0 {
            return Err(StabError::config(format!("sequence fps must be positive, got {fps}")));
        }

        tracing::debug!(
            dir = %dir.display(),
            frames = files.len(),
            width,
            height,
            fps,
            "Opened image sequence"
        );

        Ok(Self {
            info: VideoInfo {
                size: FrameSize::new(width, height),
                fps,
                frame_count: Some(files.len() as u64),
                rotation: Rotation::None,
            },
            files,
            cursor: 0,
        })
    }
}

impl FrameSource for ImageSequenceSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn next_frame(&mut self) -> StabResult<Option<RgbImage>> {
        let Some(path) = self.files.get(self.cursor) else {
            return Ok(None);
        };
        let frame = load_rgb(path)?;
        self.cursor += 1;

        let FrameSize { width, height } = self.info.size;
        if frame.dimensions() != (width, height) {
            tracing::debug!(path = %path.display(), "Resizing frame to sequence size");
            return Ok(Some(imageops::resize(&frame, width, height, FilterType::Triangle)));
        }
        Ok(Some(frame))
    }

    fn rewind(&mut self) -> StabResult<()> {
        self.cursor = 0;
        Ok(())
    }
}

/// Writes numbered PNG files (`frame_000001.png`, ...) into a directory.
#[derive(Debug)]
pub struct ImageSequenceSink {
    dir: PathBuf,
    next_index: u64,
}

impl ImageSequenceSink {
    pub fn create(dir: impl Into<PathBuf>) -> StabResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, next_index: 1 })
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{index:06}.png"))
    }
}

impl FrameSink for ImageSequenceSink {
    fn write_frame(&mut self, frame: &RgbImage) -> StabResult<()> {
        let path = self.frame_path(self.next_index);
        frame
            .save(&path)
            .map_err(|e| StabError::media(format!("Failed to write {}: {e}", path.display())))?;
        self.next_index += 1;
        Ok(())
    }

    fn finish(&mut self) -> StabResult<()> {
        tracing::info!(
            dir = %self.dir.display(),
            frames = self.next_index - 1,
            "Image sequence written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_sink_then_source_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageSequenceSink::create(dir.path()).unwrap();
        for shade in [10u8, 20, 30] {
            sink.write_frame(&RgbImage::from_pixel(6, 4, Rgb([shade, 0, 0])))
                .unwrap();
        }
        sink.finish().unwrap();
        assert!(dir.path().join("frame_000003.png").exists());

        let mut source = ImageSequenceSource::open(dir.path(), None).unwrap();
        assert_eq!(source.info().fps, DEFAULT_SEQUENCE_FPS);
        assert_eq!(source.info().frame_count, Some(3));

        let mut shades = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            shades.push(frame.get_pixel(0, 0).0[0]);
        }
        assert_eq!(shades, vec![10, 20, 30]);

        source.rewind().unwrap();
        assert!(source.next_frame().unwrap().is_some());
    }

    #[test]
    fn test_mismatched_frames_are_fitted() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::new(8, 6).save(dir.path().join("a.png")).unwrap();
        RgbImage::new(16, 12).save(dir.path().join("b.png")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), Some(24.0)).unwrap();
        assert_eq!(source.info().frame_count, Some(2));
        source.next_frame().unwrap();
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.dimensions(), (8, 6));
    }

    #[test]
    fn test_empty_directory_is_an_empty_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ImageSequenceSource::open(dir.path(), None).unwrap();
        assert_eq!(source.info().frame_count, Some(0));
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_missing_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ImageSequenceSource::open(dir.path().join("absent"), None).unwrap_err();
        assert!(matches!(err, StabError::FileNotFound { .. }));
    }
}
