//! Playback queue construction
//!
//! Builds the ordered sequence of narrated segments (fragment ids, alignment
//! and clip per segment) plus the single closing clip from a manuscript,
//! and produces the suffix views used by seeks. Queues are never mutated in
//! place; a seek derives a new view and the old one is discarded.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::manuscript::{fragment_id, Manuscript};
use crate::playback::alignment::AlignmentSet;
use crate::playback::clip::AudioClip;

/// Resolves media locators from the manuscript into live resources
///
/// Fetch transport is the host's concern; the demo binary resolves against
/// local files, a real host against its audio subsystem and HTTP layer.
pub trait MediaResolver {
    /// Produce a playable clip for an audio locator
    fn resolve_clip(&self, url: &str) -> Result<Arc<dyn AudioClip>>;

    /// Fetch and parse an alignment document
    fn resolve_alignment(&self, url: &str) -> Result<AlignmentSet>;
}

/// One narrated unit of the document
pub struct Segment {
    /// Renderer's section id for this segment (non-image section counter)
    pub section_index: usize,

    /// Fragment ids in narration order
    pub fragment_ids: Vec<String>,

    /// Per-fragment timing, index-aligned with `fragment_ids`
    pub alignment: AlignmentSet,

    /// The segment's audio clip
    pub clip: Arc<dyn AudioClip>,
}

/// Ordered segments plus the closing clip
///
/// Built once per loaded manuscript. `slice_from` derives the suffix view
/// a seek plays from; segments are shared between views, so slicing is
/// cheap and the original stays valid for later seeks.
#[derive(Clone)]
pub struct PlaybackQueue {
    segments: Vec<Arc<Segment>>,
    closing_clip: Option<Arc<dyn AudioClip>>,
}

impl PlaybackQueue {
    pub fn new(segments: Vec<Arc<Segment>>, closing_clip: Option<Arc<dyn AudioClip>>) -> Self {
        Self {
            segments,
            closing_clip,
        }
    }

    /// Build the queue from a manuscript
    ///
    /// Sections missing either locator (and image sections, which have
    /// neither) are excluded; they render as silent text. Fragment ids are
    /// derived with the shared zero-padded scheme, counting non-image
    /// sections the way the renderer does.
    pub fn build(manuscript: &Manuscript, resolver: &dyn MediaResolver) -> Result<Self> {
        let mut segments = Vec::new();
        let mut section_index = 0;

        for section in &manuscript.sections {
            if section.is_image() {
                continue;
            }
            if section.is_narrated() {
                // is_narrated guarantees both locators
                let audio_url = section.audio_url.as_deref().unwrap_or_default();
                let alignment_url = section.alignment_url.as_deref().unwrap_or_default();

                let clip = resolver.resolve_clip(audio_url)?;
                let alignment = resolver.resolve_alignment(alignment_url)?;

                let fragment_ids = (0..section.spans.len())
                    .map(|span_index| fragment_id(section_index, span_index))
                    .collect();

                segments.push(Arc::new(Segment {
                    section_index,
                    fragment_ids,
                    alignment,
                    clip,
                }));
            }
            section_index += 1;
        }

        let closing_clip = match manuscript.outro.as_ref().and_then(|o| o.audio_url.as_deref()) {
            Some(url) => Some(resolver.resolve_clip(url)?),
            None => None,
        };

        debug!(
            "Built playback queue: {} segments, closing clip: {}",
            segments.len(),
            closing_clip.is_some()
        );

        Ok(Self {
            segments,
            closing_clip,
        })
    }

    /// Suffix view starting at `index`, sharing the closing clip
    ///
    /// Returns None when `index` is out of range (including any index into
    /// an empty queue).
    pub fn slice_from(&self, index: usize) -> Option<PlaybackQueue> {
        if index >= self.segments.len() {
            return None;
        }
        Some(PlaybackQueue {
            segments: self.segments[index..].to_vec(),
            closing_clip: self.closing_clip.clone(),
        })
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Segment>> {
        self.segments.get(index)
    }

    pub fn closing_clip(&self) -> Option<&Arc<dyn AudioClip>> {
        self.closing_clip.as_ref()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
