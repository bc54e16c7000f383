//! Reference and reconstruction buffer selection for the ASIC.

use crate::error::PictureBufferError;
use crate::frame_num::find_max_frame_num;
use crate::picbuf::PictureBuffer;
use crate::picture::{BUFFER_SIZE, Marks};
use asic::{BusAddress, RefCompression, RefFrameDescriptor};

impl PictureBuffer {
    /// Choose the reference and reconstruction buffers for this frame and
    /// produce the descriptor the caller writes to the hardware.
    ///
    /// Single-layer path: up to two distinct references, and a luma buffer
    /// is stolen from a superseded slot when the reconstruction target has
    /// none bound.
    pub fn set_ref(
        &mut self,
        compression: RefCompression,
    ) -> Result<RefFrameDescriptor, PictureBufferError> {
        let mut desc = RefFrameDescriptor::default();

        // Too few buffered frames to sustain a long-term reference, and the
        // alt-ref is not supported on this path at all.
        if self.size < 2 {
            self.cur_pic_mut().marks.remove(Marks::GRF);
        }
        self.cur_pic_mut().marks.remove(Marks::ARF);

        // The hardware reads at most two references. Take the first two
        // eligible entries backed by distinct luma buffers, deselect
        // everything else.
        let mut ref_idx: Option<usize> = None;
        let mut ref_idx2: Option<usize> = None;
        for i in 0..BUFFER_SIZE {
            let eligible = i < self.size
                && self.list[i].search
                && self.list[i].marks.intersects(Marks::IPF | Marks::GRF);
            if !eligible {
                self.list[i].search = false;
                continue;
            }
            match ref_idx {
                None => ref_idx = Some(i),
                Some(primary)
                    if ref_idx2.is_none()
                        && self.list[primary].picture.lum != self.list[i].picture.lum =>
                {
                    ref_idx2 = Some(i);
                }
                _ => self.list[i].search = false,
            }
        }

        // Nothing preselected by the caller: default to the list head.
        let ref_idx = match ref_idx {
            Some(i) => i,
            None => {
                self.list[0].search = true;
                0
            }
        };

        if self.cur_pic().p_frame {
            let primary = self.list[ref_idx];
            debug_assert!(primary.search);
            if primary.picture.lum.is_null() {
                return Err(PictureBufferError::ReferenceUnbound);
            }

            desc.lum_base_r = [primary.picture.lum; 2];
            desc.chr_base_r = [primary.picture.cb; 2];
            desc.ref2_enable = false;
            if ref_idx != 0 || (primary.grf() && !primary.i_frame) {
                // Long-term slot serves as the primary reference.
                desc.mv_ref_idx0 = 1;
            }

            if let Some(second) = ref_idx2 {
                if !primary.grf() {
                    desc.lum_base_r[1] = self.list[second].picture.lum;
                    desc.chr_base_r[1] = self.list[second].picture.cb;
                    desc.ref2_enable = true;
                }
            }
        }

        if self.cur_pic().grf() {
            desc.mark_current_long_term = true;
        }

        // The reconstruction target needs luma storage. When none is bound,
        // reclaim the buffer of a slot whose remaining obligations the
        // current picture covers.
        if self.cur_pic().picture.lum.is_null() {
            let cur = self.cur.0;
            let cur_marks = self.store[cur].marks;
            let mut rec_idx: Option<usize> = None;

            for i in 0..=self.size {
                if i == cur {
                    continue;
                }
                // List copies may carry refresh marks for this slot.
                let mut required = self.store[i].marks;
                for entry in &self.list[..self.size] {
                    if entry.slot().index() == i {
                        required =
                            self.store[i].marks | (entry.marks & (Marks::GRF | Marks::ARF));
                    }
                }
                if cur_marks.contains(required) {
                    // Keep scanning: the last qualifying candidate wins.
                    rec_idx = Some(i);
                }
            }

            match rec_idx {
                Some(i) => {
                    let lum = self.store[i].picture.lum;
                    self.store[cur].picture.lum = lum;
                    self.store[i].picture.lum = BusAddress::NULL;
                    log::debug!("stole luma buffer {lum:?} from slot {i}");
                }
                None => {
                    // Only legal when this frame makes no reference claims.
                    if !cur_marks.is_empty() {
                        return Err(PictureBufferError::NoStealableBuffer);
                    }
                    desc.rec_write_disable = true;
                }
            }
        }

        // A frame that will not be referenced is not written back at all.
        if !self.cur_pic().marks.intersects(Marks::IPF | Marks::GRF) {
            desc.rec_write_disable = true;
        }

        desc.reorder_flag = false;
        desc.reorder_diff = 0;

        desc.lum_base_w = self.cur_pic().picture.lum;
        desc.chr_base_w = self.cur_pic().picture.cb;

        // Luma may be reconstructed over the read buffer, chroma must not.
        if self.cur_pic().p_frame && desc.chr_base_r[0] == desc.chr_base_w {
            return Err(PictureBufferError::ChromaCollision);
        }

        // The refreshed golden supersedes the list's golden marks for the
        // next rebuild.
        if self.cur_pic().grf() {
            for entry in &mut self.list[..self.size] {
                entry.marks.remove(Marks::GRF);
            }
        }

        derive_compression_tables(&mut desc, compression);
        self.trace_state();
        Ok(desc)
    }

    /// SVC temporal-layer variant: the layer schedule pre-selects the
    /// reference by frame number, so there is no dual-reference and no
    /// buffer stealing here; long-term semantics run through the hardware
    /// reorder command instead.
    pub fn set_ref_for_svct(
        &mut self,
        frame_num_bits: u32,
        compression: RefCompression,
    ) -> Result<RefFrameDescriptor, PictureBufferError> {
        let mut desc = RefFrameDescriptor::default();

        if self.size < 2 {
            self.cur_pic_mut().marks.remove(Marks::GRF);
        }
        self.cur_pic_mut().marks.remove(Marks::ARF);

        let order_cmd = self.cur_pic().order_cmd;
        let pic_num = if order_cmd != 0 {
            let num = self.cur_pic().frame_num;
            if num >= order_cmd {
                num - order_cmd
            } else {
                num + (1 << frame_num_bits) - order_cmd
            }
        } else {
            find_max_frame_num(self.active_slots(), Some(self.cur), frame_num_bits)
        };

        // Locate the list entry carrying the target frame number.
        let mut ref_idx = None;
        for i in 0..BUFFER_SIZE {
            if i < self.size
                && self.list[i].marks.intersects(Marks::IPF | Marks::GRF)
                && self.list[i].frame_num == pic_num
            {
                self.list[i].search = true;
                ref_idx = Some(i);
                break;
            }
        }
        let Some(ref_idx) = ref_idx else {
            return Err(PictureBufferError::ReferenceNotFound { pic_num });
        };

        if self.cur_pic().p_frame {
            let primary = self.list[ref_idx];
            debug_assert!(primary.search);
            if primary.picture.lum.is_null() {
                return Err(PictureBufferError::ReferenceUnbound);
            }
            desc.lum_base_r[0] = primary.picture.lum;
            desc.chr_base_r[0] = primary.picture.cb;
            desc.ref2_enable = false;
            desc.mv_ref_idx0 = 0;
            desc.mark_current_long_term = false;
        }

        desc.rec_write_disable = !self.cur_pic().marks.intersects(Marks::IPF | Marks::GRF);

        desc.reorder_flag = order_cmd != 0;
        desc.reorder_diff = if order_cmd != 0 {
            (order_cmd - 1) as u32
        } else {
            0
        };

        desc.lum_base_w = self.cur_pic().picture.lum;
        desc.chr_base_w = self.cur_pic().picture.cb;

        if self.cur_pic().p_frame && desc.chr_base_r[0] == desc.chr_base_w {
            return Err(PictureBufferError::ChromaCollision);
        }

        if self.cur_pic().grf() {
            for entry in &mut self.list[..self.size] {
                entry.marks.remove(Marks::GRF);
            }
        }

        derive_compression_tables(&mut desc, compression);
        self.trace_state();
        Ok(desc)
    }
}

/// Companion compression status tables live at a fixed offset past each
/// plane; an absent second reference keeps a zero table address.
fn derive_compression_tables(desc: &mut RefFrameDescriptor, c: RefCompression) {
    if c.lum {
        desc.lum_table_base_w = desc.lum_base_w.offset(c.lum_table_offset);
        desc.lum_table_base_r[0] = desc.lum_base_r[0].offset(c.lum_table_offset);
        desc.lum_table_base_r[1] = if desc.lum_base_r[1].is_null() {
            BusAddress::NULL
        } else {
            desc.lum_base_r[1].offset(c.lum_table_offset)
        };
    }
    if c.chr {
        desc.chr_table_base_w = desc.chr_base_w.offset(c.chr_table_offset);
        desc.chr_table_base_r[0] = desc.chr_base_r[0].offset(c.chr_table_offset);
        desc.chr_table_base_r[1] = if desc.chr_base_r[1].is_null() {
            BusAddress::NULL
        } else {
            desc.chr_base_r[1].offset(c.chr_table_offset)
        };
    }
}
