//! Reference picture buffer management for the hardware H.264/SVC encoder.
//!
//! The core decides, once per encoded frame, which reconstructed frames the
//! motion-estimation hardware may read, which slot the frame under
//! reconstruction occupies, how golden/alternate references are promoted and
//! demoted, and how the fixed pool of frame buffers is reused when no free
//! luma storage is left.
//!
//! Per-frame call order, driven synchronously by the encoder control loop:
//! [`PictureBuffer::initialize`], the external reconstruction,
//! [`PictureBuffer::update`] (or the SVC variant), then
//! [`PictureBuffer::set_ref`] / [`PictureBuffer::set_ref_for_svct`] which
//! produce the hardware descriptor.

mod error;
mod frame_num;
mod picbuf;
mod picture;
mod set_ref;

pub use asic;

pub use error::PictureBufferError;
pub use picbuf::PictureBuffer;
pub use picture::{BUFFER_SIZE, Marks, Picture, RefPic, SlotId};
