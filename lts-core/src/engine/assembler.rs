//! Gathers every configured feed into the ordered argument set for one
//! backend call.
//!
//! The layout (which buffer or scalar goes in which argument position) and
//! every window buffer are fixed in [`InputAssembler::new`]; `assemble` only
//! copies samples into the existing buffers.

use tracing::debug;

use crate::buffering::{LiveCapture, RingSource};
use crate::error::{LtsError, Result};
use crate::inference::{ModelInputs, TensorSlot};

/// A loaded input, in model argument order.
#[derive(Debug, Clone)]
pub enum EngineInput {
    /// A decoded audio file.
    Audio(RingSource),
    /// The host's live input channel 0.
    Live,
    /// A latent mu/logvar pair; contributes two arguments.
    LatentPair(LatentPair),
    /// The interpolation weight.
    Interpolation,
}

/// Mu and logvar sources of equal length, read in lock-step.
#[derive(Debug, Clone)]
pub struct LatentPair {
    mu: RingSource,
    logvar: RingSource,
}

impl LatentPair {
    /// # Errors
    /// `SourceLoad` when the two vectors differ in length.
    pub fn new(mu: RingSource, logvar: RingSource) -> Result<Self> {
        if mu.len() != logvar.len() {
            return Err(LtsError::source_load(
                "latent pair",
                format!("mu has {} values but logvar has {}", mu.len(), logvar.len()),
            ));
        }
        Ok(Self { mu, logvar })
    }

    pub fn len(&self) -> usize {
        self.mu.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mu.is_empty()
    }
}

/// Window and advance sizes for each feed kind.
#[derive(Debug, Clone, Copy)]
pub struct FeedGeometry {
    /// Window read from audio and live feeds.
    pub input_window: usize,
    /// Advance of audio and live feeds per refill.
    pub hop: usize,
    /// Window and advance of latent feeds.
    pub latent_dim: usize,
    /// Size of the live capture buffer.
    pub live_capacity: usize,
    /// Samples the live write cursor starts ahead of the read cursor.
    pub live_lead: usize,
}

#[derive(Debug)]
enum FeedSource {
    Ring(RingSource),
    Live,
}

#[derive(Debug)]
struct Feed {
    source: FeedSource,
    buffer: usize,
    advance: usize,
}

fn push_feed(
    source: FeedSource,
    window: usize,
    advance: usize,
    feeds: &mut Vec<Feed>,
    layout: &mut Vec<TensorSlot>,
    buffers: &mut Vec<Box<[f32]>>,
) {
    let buffer = buffers.len();
    buffers.push(vec![0.0; window].into_boxed_slice());
    layout.push(TensorSlot::Buffer(buffer));
    feeds.push(Feed {
        source,
        buffer,
        advance,
    });
}

#[derive(Debug)]
pub struct InputAssembler {
    feeds: Vec<Feed>,
    live: Option<LiveCapture>,
    layout: Vec<TensorSlot>,
    buffers: Vec<Box<[f32]>>,
}

impl InputAssembler {
    /// Validate every feed against `geometry` and allocate its window.
    ///
    /// # Errors
    /// - `BoundsViolation` when a window or advance exceeds a source length,
    ///   or the live buffer cannot hold its lead plus one window.
    /// - `InvalidConfig` for an empty input list, or more than one live or
    ///   interpolation input.
    pub fn new(inputs: Vec<EngineInput>, geometry: FeedGeometry) -> Result<Self> {
        if inputs.is_empty() {
            return Err(LtsError::InvalidConfig("no model inputs configured".into()));
        }

        let mut feeds = Vec::new();
        let mut live = None;
        let mut layout = Vec::with_capacity(inputs.len() + 1);
        let mut buffers: Vec<Box<[f32]>> = Vec::new();
        let mut has_scalar = false;

        for input in inputs {
            match input {
                EngineInput::Audio(source) => {
                    debug!(len = source.len(), "audio feed");
                    source.check_read(geometry.input_window, geometry.hop)?;
                    push_feed(
                        FeedSource::Ring(source),
                        geometry.input_window,
                        geometry.hop,
                        &mut feeds,
                        &mut layout,
                        &mut buffers,
                    );
                }
                EngineInput::LatentPair(pair) => {
                    debug!(len = pair.len(), "latent feed");
                    let dim = geometry.latent_dim;
                    for source in [pair.mu, pair.logvar] {
                        source.check_read(dim, dim)?;
                        push_feed(
                            FeedSource::Ring(source),
                            dim,
                            dim,
                            &mut feeds,
                            &mut layout,
                            &mut buffers,
                        );
                    }
                }
                EngineInput::Live => {
                    if live.is_some() {
                        return Err(LtsError::InvalidConfig(
                            "only one live input is supported".into(),
                        ));
                    }
                    live = Some(LiveCapture::new(
                        geometry.live_capacity,
                        geometry.live_lead,
                        geometry.input_window,
                    )?);
                    debug!(
                        capacity = geometry.live_capacity,
                        lead = geometry.live_lead,
                        "live feed"
                    );
                    push_feed(
                        FeedSource::Live,
                        geometry.input_window,
                        geometry.hop,
                        &mut feeds,
                        &mut layout,
                        &mut buffers,
                    );
                }
                EngineInput::Interpolation => {
                    if has_scalar {
                        return Err(LtsError::InvalidConfig(
                            "only one interpolation input is supported".into(),
                        ));
                    }
                    has_scalar = true;
                    layout.push(TensorSlot::Scalar);
                }
            }
        }

        Ok(Self {
            feeds,
            live,
            layout,
            buffers,
        })
    }

    /// Fill every window, advance every cursor, and expose the argument set.
    #[inline]
    pub fn assemble(&mut self, scalar: f32) -> ModelInputs<'_> {
        for feed in &mut self.feeds {
            let dest = &mut self.buffers[feed.buffer];
            match &mut feed.source {
                FeedSource::Ring(source) => source.fill(dest, feed.advance),
                FeedSource::Live => {
                    if let Some(live) = self.live.as_mut() {
                        live.fill(dest, feed.advance);
                    }
                }
            }
        }
        ModelInputs::new(&self.layout, &self.buffers, scalar)
    }

    /// Store one sample of live input; a no-op without a live feed.
    #[inline]
    pub fn push_live(&mut self, sample: f32) {
        if let Some(live) = self.live.as_mut() {
            live.push(sample);
        }
    }

    pub fn has_live(&self) -> bool {
        self.live.is_some()
    }

    pub fn live(&self) -> Option<&LiveCapture> {
        self.live.as_ref()
    }

    pub fn layout(&self) -> &[TensorSlot] {
        &self.layout
    }

    /// Cursor of every file-backed feed, in feed order.
    pub fn cursors(&self) -> Vec<usize> {
        self.feeds
            .iter()
            .filter_map(|feed| match &feed.source {
                FeedSource::Ring(source) => Some(source.cursor()),
                FeedSource::Live => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::InputTensor;

    fn ring(values: &[f32]) -> RingSource {
        RingSource::new(values.to_vec()).unwrap()
    }

    fn geometry(window: usize, hop: usize) -> FeedGeometry {
        FeedGeometry {
            input_window: window,
            hop,
            latent_dim: 2,
            live_capacity: 10 * hop.max(window),
            live_lead: hop.max(window),
        }
    }

    #[test]
    fn layout_follows_input_order() {
        let pair = LatentPair::new(ring(&[1.0, 2.0, 3.0, 4.0]), ring(&[5.0, 6.0, 7.0, 8.0])).unwrap();
        let inputs = vec![
            EngineInput::Audio(ring(&[0.0; 8])),
            EngineInput::Interpolation,
            EngineInput::LatentPair(pair),
        ];
        let mut asm = InputAssembler::new(inputs, geometry(4, 4)).unwrap();
        assert_eq!(
            asm.layout(),
            &[
                TensorSlot::Buffer(0),
                TensorSlot::Scalar,
                TensorSlot::Buffer(1),
                TensorSlot::Buffer(2)
            ]
        );

        let args = asm.assemble(0.3);
        assert_eq!(args.len(), 4);
        assert_eq!(args.get(1), Some(InputTensor::Scalar(0.3)));
        assert_eq!(args.get(2), Some(InputTensor::Buffer(&[1.0, 2.0][..])));
        assert_eq!(args.get(3), Some(InputTensor::Buffer(&[5.0, 6.0][..])));
    }

    #[test]
    fn latent_pair_advances_by_latent_dim() {
        let pair = LatentPair::new(ring(&[1.0, 2.0, 3.0, 4.0]), ring(&[5.0, 6.0, 7.0, 8.0])).unwrap();
        let mut asm =
            InputAssembler::new(vec![EngineInput::LatentPair(pair)], geometry(4, 1)).unwrap();
        asm.assemble(0.0);
        let args = asm.assemble(0.0);
        assert_eq!(args.get(0), Some(InputTensor::Buffer(&[3.0, 4.0][..])));
        assert_eq!(args.get(1), Some(InputTensor::Buffer(&[7.0, 8.0][..])));
        assert_eq!(asm.cursors(), vec![0, 0]);
    }

    #[test]
    fn live_slot_keeps_its_position() {
        let inputs = vec![
            EngineInput::Live,
            EngineInput::Audio(ring(&[9.0; 6])),
        ];
        let mut asm = InputAssembler::new(inputs, geometry(3, 3)).unwrap();
        assert!(asm.has_live());
        assert_eq!(asm.layout(), &[TensorSlot::Buffer(0), TensorSlot::Buffer(1)]);

        let args = asm.assemble(0.0);
        assert_eq!(args.get(0), Some(InputTensor::Buffer(&[0.0, 0.0, 0.0][..])));
        assert_eq!(args.get(1), Some(InputTensor::Buffer(&[9.0, 9.0, 9.0][..])));
    }

    #[test]
    fn mismatched_latent_pair_is_a_source_error() {
        let err = LatentPair::new(ring(&[1.0, 2.0]), ring(&[1.0])).unwrap_err();
        assert!(matches!(err, LtsError::SourceLoad { .. }));
    }

    #[test]
    fn oversized_window_is_rejected() {
        let err = InputAssembler::new(vec![EngineInput::Audio(ring(&[0.0; 3]))], geometry(4, 4))
            .unwrap_err();
        assert!(matches!(err, LtsError::BoundsViolation(_)));
    }

    #[test]
    fn duplicate_scalars_and_empty_lists_are_rejected() {
        let err = InputAssembler::new(
            vec![EngineInput::Interpolation, EngineInput::Interpolation],
            geometry(1, 1),
        )
        .unwrap_err();
        assert!(matches!(err, LtsError::InvalidConfig(_)));
        assert!(InputAssembler::new(Vec::new(), geometry(1, 1)).is_err());
    }
}
