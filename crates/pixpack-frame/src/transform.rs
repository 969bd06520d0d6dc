//! Reversible whole-frame transforms.
//!
//! A transform runs after a frame is packed and before it reaches the codec,
//! and its inverse runs on every received frame before unpacking. This is
//! the hook for remapping byte values into a range a codec treats well,
//! kept apart from the framing so header and length rules stay untouched.

/// A length-preserving, reversible transform over one raw frame.
pub trait FrameTransform: Send + Sync {
    /// Applied to a packed frame on its way to the codec.
    fn forward(&self, frame: &mut [u8]);

    /// Undoes [`forward`](Self::forward) on a frame read back from the codec.
    fn inverse(&self, frame: &mut [u8]);
}

/// Leaves frames untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl FrameTransform for Identity {
    fn forward(&self, _frame: &mut [u8]) {}

    fn inverse(&self, _frame: &mut [u8]) {}
}
