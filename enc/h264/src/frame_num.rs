//! Frame number selection under modulo-`2^bits` wraparound.
//!
//! The hardware's `frame_num` field is a modulo counter, so a plain min or
//! max over the raw values is wrong once the counter wraps. When the spread
//! between the extreme observed values exceeds half the modulus, the
//! apparently small values are the ones that wrapped.

use crate::picture::{RefPic, SlotId};

/// Oldest short-term frame number among `slots`, `exclude` skipped.
pub(crate) fn find_min_frame_num(
    slots: &[RefPic],
    exclude: Option<SlotId>,
    frame_num_bits: u32,
) -> i32 {
    let modulus = 1i32 << frame_num_bits;
    let mut max_pic = 0;
    let mut lmin_pic = modulus;
    let mut rmin_pic = modulus;

    for pic in slots {
        if !pic.ipf() || Some(pic.slot()) == exclude {
            continue;
        }
        let num = pic.frame_num;
        if num > max_pic {
            max_pic = num;
        }
        if num < lmin_pic {
            lmin_pic = num;
        }
        if num > 256 && num < rmin_pic {
            rmin_pic = num;
        }
    }

    if (max_pic - lmin_pic).abs() > modulus / 2 {
        // Wrapped: the small values are the newer ones, the oldest frame is
        // the smallest value still in the high range. With nothing observed
        // past the low range the plain minimum is all there is.
        if rmin_pic == modulus { lmin_pic } else { rmin_pic }
    } else {
        lmin_pic
    }
}

/// Newest short-term frame number among `slots`, `exclude` skipped.
pub(crate) fn find_max_frame_num(
    slots: &[RefPic],
    exclude: Option<SlotId>,
    frame_num_bits: u32,
) -> i32 {
    let modulus = 1i32 << frame_num_bits;
    let mut rmax_pic = 0;
    let mut lmax_pic = 0;

    for pic in slots {
        if !pic.ipf() || Some(pic.slot()) == exclude {
            continue;
        }
        let num = pic.frame_num;
        if num > rmax_pic {
            rmax_pic = num;
        }
        if num < 256 && num > lmax_pic {
            lmax_pic = num;
        }
    }

    // A saturated plain maximum means the counter wrapped; take the
    // low-range maximum instead.
    if rmax_pic == modulus { lmax_pic } else { rmax_pic }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picture::{Marks, Picture};

    fn ipf(slot: usize, frame_num: i32) -> RefPic {
        let mut pic = RefPic::new(Picture::new(176, 144), SlotId(slot));
        pic.marks = Marks::IPF;
        pic.frame_num = frame_num;
        pic
    }

    #[test]
    fn min_without_wraparound() {
        let slots = [ipf(0, 3), ipf(1, 7), ipf(2, 5)];
        assert_eq!(find_min_frame_num(&slots, None, 8), 3);
    }

    #[test]
    fn min_with_low_range_wraparound() {
        // 250 vs 2: spread 248 > 128 signals a wrap, but nothing above 256
        // was observed, so the plain minimum wins.
        let slots = [ipf(0, 250), ipf(1, 2), ipf(2, 5)];
        assert_eq!(find_min_frame_num(&slots, None, 8), 2);
    }

    #[test]
    fn min_with_high_range_wraparound() {
        // 65530 is the oldest frame; 2 already wrapped past it.
        let slots = [ipf(0, 65530), ipf(1, 2)];
        assert_eq!(find_min_frame_num(&slots, None, 16), 65530);
    }

    #[test]
    fn min_skips_unmarked_and_excluded() {
        let mut free = ipf(2, 1);
        free.marks = Marks::empty();
        let slots = [ipf(0, 9), ipf(1, 4), free];
        assert_eq!(find_min_frame_num(&slots, Some(SlotId(1)), 8), 9);
    }

    #[test]
    fn max_without_wraparound() {
        let slots = [ipf(0, 3), ipf(1, 7), ipf(2, 5)];
        assert_eq!(find_max_frame_num(&slots, None, 8), 7);
    }

    #[test]
    fn max_with_saturated_counter() {
        let slots = [ipf(0, 256), ipf(1, 5)];
        assert_eq!(find_max_frame_num(&slots, None, 8), 5);
    }

    #[test]
    fn max_skips_excluded() {
        let slots = [ipf(0, 3), ipf(1, 7)];
        assert_eq!(find_max_frame_num(&slots, Some(SlotId(1)), 8), 3);
    }
}
