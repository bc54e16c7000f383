//! Boundary types for the encoder ASIC.
//!
//! Only the register fields the picture buffer core produces are modelled
//! here. The register block itself, and everything the hardware writes back,
//! live outside this crate; the caller takes a [`RefFrameDescriptor`] and
//! performs the actual register writes.

/// Bus address of a physical frame buffer as seen by the ASIC.
///
/// Zero means no storage is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BusAddress(pub u64);

impl BusAddress {
    pub const NULL: BusAddress = BusAddress(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Address at a fixed byte offset past this one, e.g. the compression
    /// status table placed directly after a plane buffer.
    pub fn offset(self, bytes: u64) -> BusAddress {
        BusAddress(self.0 + bytes)
    }
}

/// Reference frame compression setup.
///
/// When a plane is compressed the hardware expects a companion status table
/// directly after the plane data; `*_table_offset` is the plane buffer size
/// in bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefCompression {
    pub lum: bool,
    pub chr: bool,
    pub lum_table_offset: u64,
    pub chr_table_offset: u64,
}

/// Reference and reconstruction buffer setup for one encoded frame.
///
/// Rebuilt from zero every frame: the read-side fields are only populated
/// for P-frames, everything else stays at its default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefFrameDescriptor {
    /// Luma base addresses of the primary and secondary reference.
    pub lum_base_r: [BusAddress; 2],
    /// Chroma base addresses of the primary and secondary reference.
    pub chr_base_r: [BusAddress; 2],
    /// Luma base address of the reconstruction target.
    pub lum_base_w: BusAddress,
    /// Chroma base address of the reconstruction target.
    pub chr_base_w: BusAddress,

    /// Compression table addresses for the read and write buffers.
    pub lum_table_base_r: [BusAddress; 2],
    pub chr_table_base_r: [BusAddress; 2],
    pub lum_table_base_w: BusAddress,
    pub chr_table_base_w: BusAddress,

    /// Second reference frame usage enabled.
    pub ref2_enable: bool,
    /// Motion vector reference index of the primary reference; 1 selects
    /// the long-term slot.
    pub mv_ref_idx0: u32,
    /// Current picture is to be marked as a long-term reference.
    pub mark_current_long_term: bool,
    /// Reconstruction writeback disabled for this frame.
    pub rec_write_disable: bool,

    /// Reference reorder command active (SVC temporal layers).
    pub reorder_flag: bool,
    /// Reorder distance minus one, zero when inactive.
    pub reorder_diff: u32,
}
