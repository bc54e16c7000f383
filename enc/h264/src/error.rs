use thiserror::Error;

/// Errors produced by the picture buffer state machine.
///
/// Apart from the setup errors these all indicate a caller or configuration
/// problem: the per-frame operations are deterministic functions of the
/// store state and cannot fail on a well-formed reference schedule.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PictureBufferError {
    #[error("invalid picture dimensions {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },

    #[error("{provided} frame buffers bound but the store only has {slots} slots")]
    TooManyBuffers { provided: usize, slots: usize },

    #[error("every reference slot is marked, no slot left for reconstruction")]
    NoFreeSlot,

    #[error("no reference slot carries frame number {pic_num}")]
    EvictionTargetMissing { pic_num: i32 },

    #[error("no list entry with frame number {pic_num} is marked for reference")]
    ReferenceNotFound { pic_num: i32 },

    #[error("selected reference has no luma buffer bound")]
    ReferenceUnbound,

    #[error("reconstruction needs a luma buffer but every candidate is still referenced")]
    NoStealableBuffer,

    #[error("chroma read and write buffers collide")]
    ChromaCollision,
}
