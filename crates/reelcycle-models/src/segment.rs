//! Segment roles and rendition kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a segment in the final sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "role", content = "index")]
pub enum SegmentRole {
    /// First clip re-voiced with the intro narration
    Intro,
    /// One transformed source clip (1-based)
    Body(usize),
    /// Freeze-frame call-to-action
    PreOutro,
    /// Fixed closing clip
    Outro,
}

impl fmt::Display for SegmentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentRole::Intro => f.write_str("intro"),
            SegmentRole::Body(i) => write!(f, "body_{:02}", i),
            SegmentRole::PreOutro => f.write_str("pre_outro"),
            SegmentRole::Outro => f.write_str("outro"),
        }
    }
}

/// One of the two outputs produced per folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenditionKind {
    /// Vertical cut with intro, folder overlay and banner
    Social,
    /// Plain cut without intro or banner
    Production,
}

impl RenditionKind {
    pub const ALL: &'static [RenditionKind] = &[RenditionKind::Social, RenditionKind::Production];

    /// Name used for output directories and file suffixes.
    pub fn as_str(&self) -> &'static str {
        match self {
            RenditionKind::Social => "social",
            RenditionKind::Production => "production",
        }
    }

    pub fn has_intro(&self) -> bool {
        matches!(self, RenditionKind::Social)
    }

    pub fn has_banner(&self) -> bool {
        matches!(self, RenditionKind::Social)
    }

    /// Output file name for the `index`-th folder of a run (1-based).
    pub fn file_name(&self, index: usize) -> String {
        format!("v{}_{}.mp4", index, self.as_str())
    }
}

impl fmt::Display for RenditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_display() {
        assert_eq!(SegmentRole::Body(3).to_string(), "body_03");
        assert_eq!(SegmentRole::PreOutro.to_string(), "pre_outro");
    }

    #[test]
    fn test_rendition_file_name() {
        assert_eq!(RenditionKind::Social.file_name(2), "v2_social.mp4");
        assert_eq!(RenditionKind::Production.file_name(1), "v1_production.mp4");
        assert!(!RenditionKind::Production.has_banner());
    }
}
