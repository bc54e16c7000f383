use asic::BusAddress;
use bitflags::bitflags;

/// Number of usable reference list entries. The store holds one slot more
/// than this for the picture under reconstruction.
pub const BUFFER_SIZE: usize = 4;

bitflags! {
    /// Reference marks of a picture buffer slot.
    ///
    /// `IPF | GRF` and `IPF | ARF` are legal combinations; `GRF | ARF` is
    /// not, and the marking policy clears the old mark before applying a
    /// new one so the store never holds two golden or two alt-ref slots.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Marks: u8 {
        /// Immediately previous frame (short-term reference).
        const IPF = 1 << 0;
        /// Golden reference frame (long-term reference).
        const GRF = 1 << 1;
        /// Alternate reference frame.
        const ARF = 1 << 2;
    }
}

/// Index of a slot in the reference picture store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotId(pub(crate) usize);

impl SlotId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Physical frame buffer geometry and base addresses.
///
/// Chroma planes are half the luma size in both directions, rounded down.
/// The base addresses may be null when no storage is bound, or shared
/// between two slots while one buffer serves both reconstruction and
/// reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct Picture {
    pub lum_width: i32,
    pub lum_height: i32,
    pub ch_width: i32,
    pub ch_height: i32,
    pub lum: BusAddress,
    pub cb: BusAddress,
}

impl Picture {
    pub(crate) fn new(lum_width: i32, lum_height: i32) -> Self {
        Picture {
            lum_width,
            lum_height,
            ch_width: lum_width / 2,
            ch_height: lum_height / 2,
            lum: BusAddress::NULL,
            cb: BusAddress::NULL,
        }
    }
}

/// One reference candidate slot.
///
/// Store-resident slots carry their own index in `slot`. List entries are
/// value copies and their `slot` points back at the store slot they were
/// copied from, so edits made on a copy can be folded back into the store.
#[derive(Debug, Clone, Copy)]
pub struct RefPic {
    pub picture: Picture,
    /// Picture order count.
    pub poc: i32,
    pub frame_num: i32,

    /// Key frame, intra macroblocks only.
    pub i_frame: bool,
    /// Inter frame.
    pub p_frame: bool,
    /// Frame is for display.
    pub show: bool,
    pub marks: Marks,
    /// Slot is eligible for the current frame's motion search.
    pub search: bool,
    /// Explicit temporal reorder distance, SVC only.
    pub order_cmd: i32,

    pub(crate) slot: SlotId,
}

impl RefPic {
    pub(crate) fn new(picture: Picture, slot: SlotId) -> Self {
        RefPic {
            picture,
            poc: -1,
            frame_num: 0,
            i_frame: false,
            p_frame: false,
            show: false,
            marks: Marks::empty(),
            search: false,
            order_cmd: 0,
            slot,
        }
    }

    /// Store slot this entry belongs to (or, for a list entry, was copied
    /// from).
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn ipf(&self) -> bool {
        self.marks.contains(Marks::IPF)
    }

    pub fn grf(&self) -> bool {
        self.marks.contains(Marks::GRF)
    }

    pub fn arf(&self) -> bool {
        self.marks.contains(Marks::ARF)
    }

    /// Back to the unreferenced state. Frame number, reorder distance and
    /// the bound buffers are left alone.
    pub(crate) fn reset(&mut self) {
        self.poc = -1;
        self.i_frame = false;
        self.p_frame = false;
        self.show = false;
        self.marks = Marks::empty();
        self.search = false;
    }
}
