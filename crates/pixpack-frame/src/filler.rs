use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

const NOISE_SEED: u64 = 0x7069_7870_6163_6b00;

/// How the bytes between the payload and the end of a frame are filled.
///
/// Filler is never interpreted by the decoder. Either policy is
/// deterministic for a given frame index, so re-encoding the same input
/// yields the same raw stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillerPolicy {
    /// All zeros.
    #[default]
    Zero,
    /// Seeded pseudo-random bytes, keyed on the frame index.
    Noise,
}

impl FillerPolicy {
    pub fn fill(self, index: u64, dst: &mut [u8]) {
        match self {
            FillerPolicy::Zero => dst.fill(0),
            FillerPolicy::Noise => {
                SmallRng::seed_from_u64(NOISE_SEED ^ index).fill_bytes(dst);
            }
        }
    }
}
