//! Manuscript payload model
//!
//! The document format produced by the narration pipeline: an ordered list
//! of sections, each carrying its text spans and, for narrated sections,
//! locators for the section's audio clip and its fragment alignment
//! document. Fetching these payloads is the host's job; this module only
//! models the shape and the fragment-id scheme shared with the renderer.

use serde::{Deserialize, Serialize};

/// Generation state of a manuscript
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ManuscriptState {
    /// Narration audio still being produced; sections may be incomplete
    Generating,
    /// All sections and audio present
    #[default]
    Done,
}

/// One text span within a section; the smallest highlightable unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Span {
    pub text: String,
}

/// One section of the document
///
/// `section_type` is the renderer's tag string (`"h1"`, `"p"`, `"ul"`,
/// `"img"`, ...). Image sections carry `src`/`alt` and no narration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub section_type: String,

    #[serde(default)]
    pub spans: Vec<Span>,

    /// Locator for the section's audio clip, if narrated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,

    /// Locator for the section's alignment document, if narrated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment_url: Option<String>,

    /// Image source (image sections only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,

    /// Image alt text (image sections only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

impl Section {
    /// Image sections are rendered but never narrated
    pub fn is_image(&self) -> bool {
        self.section_type == "img"
    }

    /// A section enters the playback queue only with both locators present
    pub fn is_narrated(&self) -> bool {
        !self.is_image() && self.audio_url.is_some() && self.alignment_url.is_some()
    }
}

/// Closing clip descriptor, played after all sections complete
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outro {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

/// A complete manuscript payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manuscript {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Source article URL, shown as a reference link by the renderer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default)]
    pub state: ManuscriptState,

    /// Generation progress, 0.0-1.0 (informational while `Generating`)
    #[serde(default)]
    pub progress: f64,

    pub sections: Vec<Section>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outro: Option<Outro>,

    /// Whole-document audio download, if available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_audio_url: Option<String>,
}

/// Stable fragment id shared between renderer and engine
///
/// Section index and span index, each zero-padded to four digits, joined
/// with an underscore (`0003_0012`). The section index counts non-image
/// sections only, matching the ids the renderer assigns to its elements.
pub fn fragment_id(section_index: usize, span_index: usize) -> String {
    format!("{:04}_{:04}", section_index, span_index)
}
