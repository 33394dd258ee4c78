//! The small set of canonical out-of-band bit patterns used to reset the
//! DAP or switch it between JTAG, SWD and dormant state.

/// A special sequence, always clocked out-only (the target never drives
/// SWDIO back during one of these).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SpecialSequence {
    LineReset,
    JtagToSwd,
    JtagToDormant,
    SwdToJtag,
    SwdToDormant,
    DormantToSwd,
    DormantToJtag,
}

impl SpecialSequence {
    /// The sequence's bits, LSB-first, and how many of them are
    /// significant (a sequence may be shorter than the buffer backing it).
    pub fn bits(self) -> (&'static [u8], u32) {
        use SpecialSequence::*;
        match self {
            // 50 cycles of SWDIO high.
            LineReset => (&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x03], 50),
            // Seven bytes of line reset, then the 16-bit JTAG-to-SWD
            // magic, then another seven bytes of line reset and an idle
            // byte.
            JtagToSwd => (
                &[
                    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x9e, 0xe7, 0xff, 0xff, 0xff, 0xff,
                    0xff, 0xff, 0xff, 0x00,
                ],
                136,
            ),
            JtagToDormant => (
                &[
                    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xbc, 0xe3, 0x00, 0x00, 0x00, 0x00,
                ],
                88,
            ),
            SwdToJtag => (&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x0f, 0x00], 62),
            SwdToDormant => (&[0xe3, 0xbc], 16),
            DormantToSwd => (
                &[
                    0xff, 0x92, 0xf3, 0x09, 0x62, 0x95, 0x2d, 0x85, 0x86, 0xe9, 0xaf, 0xdd, 0xe3,
                    0xa2, 0x0e, 0xbc, 0x19, 0x08,
                ],
                // 8 cycles SWDIO-high, the full 128-bit selection alert,
                // a 4-bit activation code (0b1000), 2 trailing idle cycles.
                142,
            ),
            DormantToJtag => (
                &[
                    0xff, 0x92, 0xf3, 0x09, 0x62, 0x95, 0x2d, 0x85, 0x86, 0xe9, 0xaf, 0xdd, 0xe3,
                    0xa2, 0x0e, 0xbc, 0x19,
                ],
                // 8 cycles SWDIO-high followed by the full 128-bit
                // selection alert; no activation code in this direction.
                136,
            ),
        }
    }
}
