//! Deterministic per-cycle parameter selection.
//!
//! Every palette is indexed by `(cycle - 1) mod len`, so a cycle always maps
//! to the same look, tint, preset and intro track. Empty palettes select
//! nothing and fall back to a neutral value.

use std::path::{Path, PathBuf};

use reelcycle_media::Treatment;
use reelcycle_models::{LookProfile, Palettes, SpeedZoomPreset, TintColor};

/// Index into a palette of `len` entries for `cycle` (1-based).
pub fn pick_index(cycle: u32, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let zero_based = u64::from(cycle.max(1) - 1);
    Some((zero_based % len as u64) as usize)
}

pub fn pick<T>(items: &[T], cycle: u32) -> Option<&T> {
    pick_index(cycle, items.len()).map(|i| &items[i])
}

/// Everything chosen for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleSelection {
    pub cycle: u32,
    pub look: Option<LookProfile>,
    pub tint: Option<TintColor>,
    pub preset: SpeedZoomPreset,
}

impl CycleSelection {
    pub fn select(cycle: u32, palettes: &Palettes) -> Self {
        Self {
            cycle,
            look: pick(&palettes.looks, cycle).cloned(),
            tint: pick(&palettes.tints, cycle).cloned(),
            preset: pick(&palettes.presets, cycle)
                .cloned()
                .unwrap_or_else(SpeedZoomPreset::identity),
        }
    }

    pub fn look_name(&self) -> &str {
        self.look.as_ref().map(|l| l.name.as_str()).unwrap_or("none")
    }

    /// Visual treatment for intro and body segments.
    pub fn treatment(&self) -> Treatment {
        Treatment {
            look: self.look.as_ref().map(|l| l.filter.clone()),
            zoom: self.preset.zoom,
            speed: self.preset.speed,
            tint: self.tint.as_ref().and_then(TintColor::to_rgb),
        }
    }
}

/// Intro narration for `cycle`: a rotating track when any exist, else the fallback.
pub fn pick_intro_track(tracks: &[PathBuf], fallback: &Path, cycle: u32) -> PathBuf {
    pick(tracks, cycle)
        .cloned()
        .unwrap_or_else(|| fallback.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_index() {
        assert_eq!(pick_index(1, 7), Some(0));
        assert_eq!(pick_index(7, 7), Some(6));
        assert_eq!(pick_index(8, 7), Some(0));
        assert_eq!(pick_index(3, 0), None);
        // cycle 0 is treated as cycle 1
        assert_eq!(pick_index(0, 5), Some(0));
    }

    #[test]
    fn test_periodicity() {
        let palettes = Palettes::default();
        for len in 1..=9usize {
            for cycle in 1..=30u32 {
                for k in 0..4u32 {
                    assert_eq!(pick_index(cycle, len), pick_index(cycle + k * len as u32, len));
                }
            }
        }
        for cycle in 1..=14 {
            assert_eq!(
                CycleSelection::select(cycle, &palettes).treatment(),
                CycleSelection::select(cycle + 7, &palettes).treatment()
            );
        }
    }

    #[test]
    fn test_first_cycle_selection() {
        let selection = CycleSelection::select(1, &Palettes::default());
        assert_eq!(selection.look_name(), "clean");
        assert_eq!(selection.preset.name, "A");

        let treatment = selection.treatment();
        assert_eq!(treatment.look.as_deref(), Some("eq=contrast=1.15:saturation=1.2:brightness=0.03"));
        assert!((treatment.zoom - 1.08).abs() < 1e-9);
        assert!((treatment.speed - 1.03).abs() < 1e-9);
        let tint = treatment.tint.unwrap();
        assert!(tint.r.abs() < 1e-9);
        assert!((tint.b - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_palettes_fall_back() {
        let selection = CycleSelection::select(5, &Palettes::empty());
        assert_eq!(selection.look, None);
        assert_eq!(selection.tint, None);
        assert_eq!(selection.look_name(), "none");
        assert_eq!(selection.treatment(), Treatment::identity());
    }

    #[test]
    fn test_intro_track_rotation() {
        let tracks = vec![PathBuf::from("a.mp3"), PathBuf::from("b.mp3")];
        let fallback = PathBuf::from("intro.mp3");
        assert_eq!(pick_intro_track(&tracks, &fallback, 1), PathBuf::from("a.mp3"));
        assert_eq!(pick_intro_track(&tracks, &fallback, 2), PathBuf::from("b.mp3"));
        assert_eq!(pick_intro_track(&tracks, &fallback, 3), PathBuf::from("a.mp3"));
        assert_eq!(pick_intro_track(&[], &fallback, 3), fallback);
    }
}
