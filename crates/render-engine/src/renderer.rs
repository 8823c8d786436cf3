//! Frame renderer: the second pass over the source.

use steadyframe_common::cancel::CancelToken;
use steadyframe_common::error::StabResult;
use steadyframe_model::{AffineTransform, Corrections, FrameSize};

use crate::media::{FrameSink, FrameSource};
use crate::warp::Resampler;

/// Crop factors below this are not worth a second resample.
pub const NEGLIGIBLE_CROP: f64 = 0.001;

/// Applies the per-frame corrections and the global zoom.
pub struct FrameRenderer<'a> {
    resampler: &'a dyn Resampler,
    cancel: CancelToken,
}

impl<'a> FrameRenderer<'a> {
    pub fn new(resampler: &'a dyn Resampler) -> Self {
        Self {
            resampler,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Rewind `source` and write one corrected frame per correction delta.
    ///
    /// Stops early when the source runs out. Returns the number of frames
    /// written. The sink is not finished here.
    pub fn render<P>(
        &self,
        source: &mut dyn FrameSource,
        corrections: &Corrections,
        crop: f64,
        sink: &mut dyn FrameSink,
        size: FrameSize,
        mut progress: P,
    ) -> StabResult<usize>
    where
        P: FnMut(usize),
    {
        corrections.validate()?;
        if corrections.is_empty() {
            tracing::info!("Nothing to render");
            return Ok(0);
        }
        size.validate()?;
        source.rewind()?;

        let zoom = (crop >= NEGLIGIBLE_CROP)
            .then(|| AffineTransform::scale_about_center(1.0 + crop, size));

        let mut written = 0;
        for (index, delta) in corrections.iter().enumerate() {
            self.cancel.check()?;
            let Some(frame) = source.next_frame()? else {
                tracing::warn!(
                    expected = corrections.len(),
                    available = index,
                    "Source ended early on replay"
                );
                break;
            };

            let corrected = self.resampler.warp(&frame, &delta.to_affine(), size)?;
            let output = match &zoom {
                Some(zoom) => self.resampler.warp(&corrected, zoom, size)?,
                None => corrected,
            };
            sink.write_frame(&output)?;
            written += 1;
            progress(written);
        }

        tracing::info!(frames = written, crop, "Render pass complete");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{VecSink, VecSource};
    use image::{Rgb, RgbImage};
    use std::cell::RefCell;
    use steadyframe_common::error::StabError;

    /// Records every transform and returns the frame untouched.
    #[derive(Default)]
    struct RecordingResampler {
        calls: RefCell<Vec<AffineTransform>>,
    }

    impl Resampler for RecordingResampler {
        fn warp(
            &self,
            frame: &RgbImage,
            transform: &AffineTransform,
            _size: FrameSize,
        ) -> StabResult<RgbImage> {
            self.calls.borrow_mut().push(*transform);
            Ok(frame.clone())
        }
    }

    fn numbered(n: u8) -> Vec<RgbImage> {
        (0..n).map(|i| RgbImage::from_pixel(4, 4, Rgb([i, 0, 0]))).collect()
    }

    fn flat(n: usize) -> Corrections {
        Corrections::from_axes(vec![0.0; n], vec![0.0; n], vec![0.0; n]).unwrap()
    }

    #[test]
    fn test_frames_written_in_order() {
        let resampler = RecordingResampler::default();
        let mut source = VecSource::new(numbered(5), 30.0);
        let mut sink = VecSink::new();

        let written = FrameRenderer::new(&resampler)
            .render(&mut source, &flat(5), 0.0, &mut sink, FrameSize::new(4, 4), |_| {})
            .unwrap();

        assert_eq!(written, 5);
        let order: Vec<u8> = sink.frames.iter().map(|f| f.get_pixel(0, 0).0[0]).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
        assert_eq!(source.rewinds(), 1);
    }

    #[test]
    fn test_empty_corrections_write_nothing() {
        let resampler = RecordingResampler::default();
        let mut source = VecSource::new(Vec::new(), 30.0);
        let mut sink = VecSink::new();
        let written = FrameRenderer::new(&resampler)
            .render(
                &mut source,
                &Corrections::default(),
                0.0,
                &mut sink,
                FrameSize::new(0, 0),
                |_| {},
            )
            .unwrap();
        assert_eq!(written, 0);
        assert!(sink.frames.is_empty());
        assert_eq!(source.rewinds(), 0);
    }

    #[test]
    fn test_short_replay_stops_early() {
        let resampler = RecordingResampler::default();
        let mut source = VecSource::new(numbered(6), 30.0).with_replay_limit(4);
        let mut sink = VecSink::new();

        let written = FrameRenderer::new(&resampler)
            .render(&mut source, &flat(6), 0.0, &mut sink, FrameSize::new(4, 4), |_| {})
            .unwrap();
        assert_eq!(written, 4);
        assert_eq!(sink.frames.len(), 4);
    }

    #[test]
    fn test_zoom_skipped_for_negligible_crop() {
        let resampler = RecordingResampler::default();
        let renderer = FrameRenderer::new(&resampler);

        let mut sink = VecSink::new();
        renderer
            .render(&mut VecSource::new(numbered(3), 30.0), &flat(3), 0.0005, &mut sink, FrameSize::new(4, 4), |_| {})
            .unwrap();
        assert_eq!(resampler.calls.borrow().len(), 3);

        resampler.calls.borrow_mut().clear();
        renderer
            .render(&mut VecSource::new(numbered(3), 30.0), &flat(3), 0.1, &mut sink, FrameSize::new(4, 4), |_| {})
            .unwrap();
        let calls = resampler.calls.borrow();
        assert_eq!(calls.len(), 6);
        assert_eq!(calls[1], AffineTransform::scale_about_center(1.1, FrameSize::new(4, 4)));
    }

    #[test]
    fn test_correction_matrix_passed_to_resampler() {
        let resampler = RecordingResampler::default();
        let corrections = Corrections::from_axes(vec![2.0], vec![-1.0], vec![0.1]).unwrap();
        FrameRenderer::new(&resampler)
            .render(
                &mut VecSource::new(numbered(1), 30.0),
                &corrections,
                0.0,
                &mut VecSink::new(),
                FrameSize::new(4, 4),
                |_| {},
            )
            .unwrap();
        let m = resampler.calls.borrow()[0].m;
        assert_eq!(m[0][2], 2.0);
        assert_eq!(m[1][2], -1.0);
        assert_eq!(m[1][0], 0.1f64.sin());
    }

    #[test]
    fn test_cancelled_render_stops() {
        let resampler = RecordingResampler::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = FrameRenderer::new(&resampler)
            .with_cancel_token(cancel)
            .render(&mut VecSource::new(numbered(2), 30.0), &flat(2), 0.0, &mut VecSink::new(), FrameSize::new(4, 4), |_| {})
            .unwrap_err();
        assert!(matches!(err, StabError::Cancelled));
    }
}
