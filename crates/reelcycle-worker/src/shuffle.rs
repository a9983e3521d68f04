//! Seeded clip shuffling.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Seed for one folder in one cycle, derived from the configured base seed.
///
/// The same folder gets the same clip order for a given base seed and cycle,
/// and a different order when it comes round again in a later cycle.
pub fn folder_seed(base_seed: u64, folder: &str, cycle: u32) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(base_seed.to_le_bytes());
    hasher.update(folder.as_bytes());
    hasher.update(cycle.to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Shuffle `clips` and keep at most `cap` of them. A cap of zero keeps all.
pub fn shuffle_clips<R>(clips: &[PathBuf], rng: &mut R, cap: Option<usize>) -> Vec<PathBuf>
where
    R: Rng + ?Sized,
{
    let mut shuffled = clips.to_vec();
    shuffled.shuffle(rng);
    if let Some(cap) = cap.filter(|c| *c > 0) {
        shuffled.truncate(cap);
    }
    shuffled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clips(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("clip_{:02}.mp4", i))).collect()
    }

    #[test]
    fn test_folder_seed_is_stable() {
        assert_eq!(folder_seed(42, "ep1", 1), folder_seed(42, "ep1", 1));
        assert_ne!(folder_seed(42, "ep1", 1), folder_seed(42, "ep2", 1));
        assert_ne!(folder_seed(42, "ep1", 1), folder_seed(42, "ep1", 2));
        assert_ne!(folder_seed(42, "ep1", 1), folder_seed(43, "ep1", 1));
    }

    #[test]
    fn test_same_seed_same_order() {
        let input = clips(12);
        let a = shuffle_clips(&input, &mut seeded_rng(7), None);
        let b = shuffle_clips(&input, &mut seeded_rng(7), None);
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(sorted, input);
    }

    #[test]
    fn test_cap_applies_after_shuffle() {
        let input = clips(10);
        let full = shuffle_clips(&input, &mut seeded_rng(3), None);
        let capped = shuffle_clips(&input, &mut seeded_rng(3), Some(3));
        assert_eq!(capped, full[..3].to_vec());
        assert_eq!(shuffle_clips(&input, &mut seeded_rng(3), Some(0)).len(), 10);
        assert_eq!(shuffle_clips(&input, &mut seeded_rng(3), Some(50)).len(), 10);
    }

    #[test]
    fn test_empty_input() {
        assert!(shuffle_clips(&[], &mut seeded_rng(1), Some(3)).is_empty());
    }
}
