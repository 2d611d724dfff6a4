//! GS register file.
//!
//! The GS exposes two register banks:
//!
//! | Bank        | Addresses                     | Written by                         |
//! |-------------|-------------------------------|------------------------------------|
//! | Privileged  | `0x1200_0000`-`0x1200_1080`   | EE directly (`write*_privileged`)  |
//! | General     | `0x00`-`0x62`                 | GIF packets (`write64`)            |
//!
//! # Privileged registers
//!
//! | Address       | Register | Description                               |
//! |---------------|----------|-------------------------------------------|
//! | `0x1200_0000` | PMODE    | Read circuit enables, alpha blending      |
//! | `0x1200_0010` | SMODE1   | Sync / PLL settings                       |
//! | `0x1200_0020` | SMODE2   | Interlace, FIELD/FRAME mode               |
//! | `0x1200_0070` | DISPFB1  | Read circuit 1 frame buffer               |
//! | `0x1200_0080` | DISPLAY1 | Read circuit 1 display area               |
//! | `0x1200_0090` | DISPFB2  | Read circuit 2 frame buffer               |
//! | `0x1200_00A0` | DISPLAY2 | Read circuit 2 display area               |
//! | `0x1200_00E0` | BGCOLOR  | Background color                          |
//! | `0x1200_1000` | CSR      | Status and control                        |
//! | `0x1200_1010` | IMR      | Interrupt mask                            |
//! | `0x1200_1040` | BUSDIR   | Host/local transfer direction             |
//! | `0x1200_1080` | SIGLBLID | SIGNAL / LABEL ids                        |
//!
//! Only the fields the bus itself needs are decoded here; everything else is
//! stored verbatim so a state snapshot round-trips exactly.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

pub const PMODE: u32 = 0x1200_0000;
pub const SMODE1: u32 = 0x1200_0010;
pub const SMODE2: u32 = 0x1200_0020;
pub const SRFSH: u32 = 0x1200_0030;
pub const SYNCH1: u32 = 0x1200_0040;
pub const SYNCH2: u32 = 0x1200_0050;
pub const SYNCV: u32 = 0x1200_0060;
pub const DISPFB1: u32 = 0x1200_0070;
pub const DISPLAY1: u32 = 0x1200_0080;
pub const DISPFB2: u32 = 0x1200_0090;
pub const DISPLAY2: u32 = 0x1200_00A0;
pub const EXTBUF: u32 = 0x1200_00B0;
pub const EXTDATA: u32 = 0x1200_00C0;
pub const EXTWRITE: u32 = 0x1200_00D0;
pub const BGCOLOR: u32 = 0x1200_00E0;
pub const CSR: u32 = 0x1200_1000;
pub const IMR: u32 = 0x1200_1010;
pub const BUSDIR: u32 = 0x1200_1040;
pub const SIGLBLID: u32 = 0x1200_1080;

pub const PRIM: u32 = 0x00;
pub const RGBAQ: u32 = 0x01;
pub const ST: u32 = 0x02;
pub const UV: u32 = 0x03;
pub const XYZF2: u32 = 0x04;
pub const XYZ2: u32 = 0x05;
pub const TEX0_1: u32 = 0x06;
pub const TEX0_2: u32 = 0x07;
pub const CLAMP_1: u32 = 0x08;
pub const CLAMP_2: u32 = 0x09;
pub const FOG: u32 = 0x0A;
pub const XYZF3: u32 = 0x0C;
pub const XYZ3: u32 = 0x0D;
pub const TEX1_1: u32 = 0x14;
pub const TEX1_2: u32 = 0x15;
pub const TEX2_1: u32 = 0x16;
pub const TEX2_2: u32 = 0x17;
pub const XYOFFSET_1: u32 = 0x18;
pub const XYOFFSET_2: u32 = 0x19;
pub const PRMODECONT: u32 = 0x1A;
pub const PRMODE: u32 = 0x1B;
pub const TEXCLUT: u32 = 0x1C;
pub const SCANMSK: u32 = 0x22;
pub const MIPTBP1_1: u32 = 0x34;
pub const MIPTBP1_2: u32 = 0x35;
pub const MIPTBP2_1: u32 = 0x36;
pub const MIPTBP2_2: u32 = 0x37;
pub const TEXA: u32 = 0x3B;
pub const FOGCOL: u32 = 0x3D;
pub const TEXFLUSH: u32 = 0x3F;
pub const SCISSOR_1: u32 = 0x40;
pub const SCISSOR_2: u32 = 0x41;
pub const ALPHA_1: u32 = 0x42;
pub const ALPHA_2: u32 = 0x43;
pub const DIMX: u32 = 0x44;
pub const DTHE: u32 = 0x45;
pub const COLCLAMP: u32 = 0x46;
pub const TEST_1: u32 = 0x47;
pub const TEST_2: u32 = 0x48;
pub const PABE: u32 = 0x49;
pub const FBA_1: u32 = 0x4A;
pub const FBA_2: u32 = 0x4B;
pub const FRAME_1: u32 = 0x4C;
pub const FRAME_2: u32 = 0x4D;
pub const ZBUF_1: u32 = 0x4E;
pub const ZBUF_2: u32 = 0x4F;
pub const BITBLTBUF: u32 = 0x50;
pub const TRXPOS: u32 = 0x51;
pub const TRXREG: u32 = 0x52;
pub const TRXDIR: u32 = 0x53;
pub const HWREG: u32 = 0x54;
pub const SIGNAL: u32 = 0x60;
pub const FINISH: u32 = 0x61;
pub const LABEL: u32 = 0x62;

/// Highest general register address reachable without privilege.
pub const GENERAL_REGISTER_END: u32 = LABEL;

/// Number of general register slots (`0x00..=0x62`).
const GENERAL_REGISTER_COUNT: usize = GENERAL_REGISTER_END as usize + 1;

/// IMR value after a GS reset: every interrupt source masked.
const IMR_RESET_VALUE: u64 = 0x7F00;

/// GS revision and id reported in CSR bits 16-31.
const CSR_REVISION: u64 = 0x1B;
const CSR_ID: u64 = 0x55;

/// Primitive topology selected by PRIM bits 0-2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Point,
    Line,
    LineStrip,
    Triangle,
    TriangleStrip,
    TriangleFan,
    Sprite,
    /// Value 7: kicks are accepted but never draw.
    Reserved,
}

impl PrimitiveKind {
    /// Vertices needed to assemble one primitive.
    #[must_use]
    pub const fn vertex_count(self) -> usize {
        match self {
            Self::Point => 1,
            Self::Line | Self::LineStrip | Self::Sprite => 2,
            Self::Triangle | Self::TriangleStrip | Self::TriangleFan => 3,
            Self::Reserved => usize::MAX,
        }
    }
}

impl From<u64> for PrimitiveKind {
    fn from(value: u64) -> Self {
        match value & 0b111 {
            0 => Self::Point,
            1 => Self::Line,
            2 => Self::LineStrip,
            3 => Self::Triangle,
            4 => Self::TriangleStrip,
            5 => Self::TriangleFan,
            6 => Self::Sprite,
            _ => Self::Reserved,
        }
    }
}

/// Decoded PRIM register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prim {
    pub kind: PrimitiveKind,
    pub gouraud: bool,
    /// Drawing context (0 or 1).
    pub context: usize,
}

/// Decoded FRAME_n register: the draw target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTarget {
    /// Base pointer in 2048-word units.
    pub fbp: u32,
    /// Width in 64-pixel units.
    pub fbw: u32,
    pub psm: u32,
    /// Bits set here are preserved on write.
    pub fbmsk: u32,
}

/// Decoded SCISSOR_n register (inclusive bounds, window coordinates).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scissor {
    pub x0: u32,
    pub x1: u32,
    pub y0: u32,
    pub y1: u32,
}

/// Decoded DISPFB_n register: where a read circuit fetches from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayFrame {
    pub fbp: u32,
    pub fbw: u32,
    pub psm: u32,
    pub dbx: u32,
    pub dby: u32,
}

/// Decoded DISPLAY_n register: the area a read circuit shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayArea {
    pub dx: u32,
    pub dy: u32,
    pub magh: u32,
    pub magv: u32,
    pub dw: u32,
    pub dh: u32,
}

impl DisplayArea {
    /// Width and height in frame buffer pixels.
    #[must_use]
    pub const fn size(&self) -> (u32, u32) {
        ((self.dw + 1) / (self.magh + 1), (self.dh + 1) / (self.magv + 1))
    }
}

/// CSR: status flags plus the internal SIGNAL stall condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Csr {
    pub signal: bool,
    pub finish: bool,
    pub hsint: bool,
    pub vsint: bool,
    pub edwint: bool,
    /// Current field (odd = true) for interlaced output.
    pub field: bool,
    /// A SIGNAL arrived while the previous one was still unacknowledged.
    /// Drawing must pause until the EE clears the SIGNAL flag.
    pub signal_stall: bool,
}

impl Csr {
    #[must_use]
    pub fn read(&self) -> u64 {
        let mut value = u64::from(self.signal)
            | u64::from(self.finish) << 1
            | u64::from(self.hsint) << 2
            | u64::from(self.vsint) << 3
            | u64::from(self.edwint) << 4
            | u64::from(self.field) << 13;

        // FIFO always reads as empty, the bus never backs up inside the GS.
        value |= 0b01 << 14;
        value |= CSR_REVISION << 16;
        value |= CSR_ID << 24;
        value
    }

    /// Applies an EE write. Flags written as 1 are acknowledged (cleared).
    /// Returns `true` if the RESET bit was set.
    pub fn write(&mut self, value: u64) -> bool {
        if value.get_bit(0) {
            self.signal = false;
            self.signal_stall = false;
        }
        if value.get_bit(1) {
            self.finish = false;
        }
        if value.get_bit(2) {
            self.hsint = false;
        }
        if value.get_bit(3) {
            self.vsint = false;
        }
        if value.get_bit(4) {
            self.edwint = false;
        }
        value.get_bit(9)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    pub pmode: u64,
    pub smode1: u64,
    pub smode2: u64,
    pub srfsh: u64,
    pub synch1: u64,
    pub synch2: u64,
    pub syncv: u64,
    pub dispfb: [u64; 2],
    pub display: [u64; 2],
    pub extbuf: u64,
    pub extdata: u64,
    pub extwrite: u64,
    pub bgcolor: u64,
    pub csr: Csr,
    pub imr: u64,
    pub busdir: u64,
    pub siglblid: u64,

    /// General registers, indexed by address.
    general: Vec<u64>,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            pmode: 0,
            smode1: 0,
            smode2: 0,
            srfsh: 0,
            synch1: 0,
            synch2: 0,
            syncv: 0,
            dispfb: [0; 2],
            display: [0; 2],
            extbuf: 0,
            extdata: 0,
            extwrite: 0,
            bgcolor: 0,
            csr: Csr::default(),
            imr: IMR_RESET_VALUE,
            busdir: 0,
            siglblid: 0,
            general: vec![0; GENERAL_REGISTER_COUNT],
        }
    }
}

/// Returns `true` for addresses that name a general register.
#[must_use]
pub const fn is_general_register(addr: u32) -> bool {
    matches!(
        addr,
        PRIM..=FOG
            | XYZF3
            | XYZ3
            | TEX1_1..=PRMODE
            | TEXCLUT
            | SCANMSK
            | MIPTBP1_1..=MIPTBP2_2
            | TEXA
            | FOGCOL
            | TEXFLUSH
            | SCISSOR_1..=HWREG
            | SIGNAL..=LABEL
    )
}

impl Registers {
    /// `false` for a decoded register file with missing or extra slots.
    #[must_use]
    pub fn has_full_general_file(&self) -> bool {
        self.general.len() == GENERAL_REGISTER_COUNT
    }

    /// Raw value of a general register. Unknown addresses read as zero.
    #[must_use]
    pub fn general(&self, addr: u32) -> u64 {
        self.general.get(addr as usize).copied().unwrap_or(0)
    }

    /// Stores a general register verbatim. Returns `false` for unknown addresses.
    pub fn set_general(&mut self, addr: u32, value: u64) -> bool {
        if !is_general_register(addr) {
            return false;
        }
        self.general[addr as usize] = value;
        true
    }

    /// Raw value of a privileged register, `None` for unmapped addresses.
    #[must_use]
    pub fn privileged(&self, addr: u32) -> Option<u64> {
        let value = match addr {
            PMODE => self.pmode,
            SMODE1 => self.smode1,
            SMODE2 => self.smode2,
            SRFSH => self.srfsh,
            SYNCH1 => self.synch1,
            SYNCH2 => self.synch2,
            SYNCV => self.syncv,
            DISPFB1 => self.dispfb[0],
            DISPLAY1 => self.display[0],
            DISPFB2 => self.dispfb[1],
            DISPLAY2 => self.display[1],
            EXTBUF => self.extbuf,
            EXTDATA => self.extdata,
            EXTWRITE => self.extwrite,
            BGCOLOR => self.bgcolor,
            CSR => self.csr.read(),
            IMR => self.imr,
            BUSDIR => self.busdir,
            SIGLBLID => self.siglblid,
            _ => return None,
        };
        Some(value)
    }

    /// Stores a privileged register other than CSR. Returns `false` for unmapped addresses.
    pub fn set_privileged(&mut self, addr: u32, value: u64) -> bool {
        let slot = match addr {
            PMODE => &mut self.pmode,
            SMODE1 => &mut self.smode1,
            SMODE2 => &mut self.smode2,
            SRFSH => &mut self.srfsh,
            SYNCH1 => &mut self.synch1,
            SYNCH2 => &mut self.synch2,
            SYNCV => &mut self.syncv,
            DISPFB1 => &mut self.dispfb[0],
            DISPLAY1 => &mut self.display[0],
            DISPFB2 => &mut self.dispfb[1],
            DISPLAY2 => &mut self.display[1],
            EXTBUF => &mut self.extbuf,
            EXTDATA => &mut self.extdata,
            EXTWRITE => &mut self.extwrite,
            BGCOLOR => &mut self.bgcolor,
            IMR => &mut self.imr,
            BUSDIR => &mut self.busdir,
            SIGLBLID => &mut self.siglblid,
            _ => return false,
        };
        *slot = value;
        true
    }

    /// Handles a SIGNAL register write.
    ///
    /// A second SIGNAL before the EE acknowledged the first one stalls drawing.
    pub fn signal(&mut self, value: u64) {
        if self.csr.signal {
            self.csr.signal_stall = true;
            return;
        }

        let id = value.get_bits(0..=31);
        let mask = value.get_bits(32..=63);
        let low = self.siglblid.get_bits(0..=31);
        let low = (low & !mask) | (id & mask);
        self.siglblid = (self.siglblid & 0xFFFF_FFFF_0000_0000) | low;
        self.csr.signal = true;
    }

    /// Handles a LABEL register write.
    pub fn label(&mut self, value: u64) {
        let id = value.get_bits(0..=31);
        let mask = value.get_bits(32..=63);
        let high = self.siglblid.get_bits(32..=63);
        let high = (high & !mask) | (id & mask);
        self.siglblid = (high << 32) | self.siglblid.get_bits(0..=31);
    }

    #[must_use]
    pub fn prim(&self) -> Prim {
        let prim = self.general(PRIM);
        Prim {
            kind: PrimitiveKind::from(prim),
            gouraud: prim.get_bit(3),
            context: usize::from(prim.get_bit(9)),
        }
    }

    #[must_use]
    pub fn frame(&self, context: usize) -> FrameTarget {
        let frame = self.general(FRAME_1 + context as u32);
        FrameTarget {
            fbp: frame.get_bits(0..=8) as u32,
            fbw: frame.get_bits(16..=21) as u32,
            psm: frame.get_bits(24..=29) as u32,
            fbmsk: frame.get_bits(32..=63) as u32,
        }
    }

    #[must_use]
    pub fn scissor(&self, context: usize) -> Scissor {
        let scissor = self.general(SCISSOR_1 + context as u32);
        Scissor {
            x0: scissor.get_bits(0..=10) as u32,
            x1: scissor.get_bits(16..=26) as u32,
            y0: scissor.get_bits(32..=42) as u32,
            y1: scissor.get_bits(48..=58) as u32,
        }
    }

    /// Primitive-to-window offset (12.4 fixed point) for `context`.
    #[must_use]
    pub fn xyoffset(&self, context: usize) -> (u32, u32) {
        let offset = self.general(XYOFFSET_1 + context as u32);
        (
            offset.get_bits(0..=15) as u32,
            offset.get_bits(32..=47) as u32,
        )
    }

    /// Read circuit enables (EN1, EN2).
    #[must_use]
    pub fn circuits_enabled(&self) -> [bool; 2] {
        [self.pmode.get_bit(0), self.pmode.get_bit(1)]
    }

    #[must_use]
    pub fn display_frame(&self, circuit: usize) -> DisplayFrame {
        let dispfb = self.dispfb[circuit];
        DisplayFrame {
            fbp: dispfb.get_bits(0..=8) as u32,
            fbw: dispfb.get_bits(9..=14) as u32,
            psm: dispfb.get_bits(15..=19) as u32,
            dbx: dispfb.get_bits(32..=42) as u32,
            dby: dispfb.get_bits(43..=53) as u32,
        }
    }

    #[must_use]
    pub fn display_area(&self, circuit: usize) -> DisplayArea {
        let display = self.display[circuit];
        DisplayArea {
            dx: display.get_bits(0..=11) as u32,
            dy: display.get_bits(12..=22) as u32,
            magh: display.get_bits(23..=26) as u32,
            magv: display.get_bits(27..=28) as u32,
            dw: display.get_bits(32..=43) as u32,
            dh: display.get_bits(44..=54) as u32,
        }
    }

    /// Read circuit used for output: circuit 2 wins when both are enabled.
    #[must_use]
    pub fn active_circuit(&self) -> Option<usize> {
        match self.circuits_enabled() {
            [_, true] => Some(1),
            [true, false] => Some(0),
            [false, false] => None,
        }
    }

    /// Background color as an ABGR32 pixel.
    #[must_use]
    pub fn background_pixel(&self) -> u32 {
        0xFF00_0000 | self.bgcolor.get_bits(0..=23) as u32
    }
}
