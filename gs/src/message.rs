//! Messages exchanged between the producer (EE side) and the GS thread.
//!
//! ```text
//!   producer ──── GsCommand (SPSC) ────► GS thread
//!   producer ◄─── GsReturn  (SPSC) ───── GS thread
//! ```
//!
//! Every variant carries only its own payload, so the dispatcher's `match`
//! can never read a field that belongs to another command kind.

use std::fmt;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

/// Sequential byte sink handed to the GS thread for `SaveState`/`MemDump`.
/// Ownership moves into the command, so nothing else can write to it meanwhile.
pub type StateSink = Box<dyn Write + Send>;

/// Sequential byte source handed to the GS thread for `LoadState`.
pub type StateSource = Box<dyn Read + Send>;

/// Color and `Q` staged for the next vertex (RGBAQ register).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgbaq {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
    pub q: f32,
}

impl Default for Rgbaq {
    fn default() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
            q: 1.0,
        }
    }
}

/// Vertex position. `x`/`y` are 12.4 fixed point in primitive coordinate space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Xyz {
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub drawing_kick: bool,
}

/// Vertex position with fog coefficient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Xyzf {
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub fog: u8,
    pub drawing_kick: bool,
}

/// CRT (display mode) configuration, set by the BIOS `SetGsCrt` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrtMode {
    pub interlaced: bool,
    pub mode: i32,
    /// `true` for FRAME mode, `false` for FIELD mode.
    pub frame_mode: bool,
}

/// Commands sent from the producer to the GS thread.
pub enum GsCommand {
    /// General register write, as issued through the GIF.
    Write64 { addr: u32, value: u64 },
    /// Privileged register write (`0x1200_xxxx`), bypassing the general register check.
    Write64Privileged { addr: u32, value: u64 },
    /// 32-bit privileged write; bit 2 of `addr` selects the upper half.
    Write32Privileged { addr: u32, value: u32 },
    SetRgba(Rgbaq),
    /// Texture coordinates, ST form (raw IEEE-754 bits).
    SetSt { s: u32, t: u32 },
    /// Texture coordinates, UV form (texel units, 10.4 fixed point).
    SetUv { u: u16, v: u16 },
    SetXyz(Xyz),
    SetXyzf(Xyzf),
    SetCrt(CrtMode),
    /// Composite the displayed area into the back buffer and flip.
    RenderCrt,
    AssertFinish,
    AssertVsync,
    SetVblank(bool),
    /// Write the raw local memory to the sink, then report `GsDumpRenderPartialDone`.
    MemDump(StateSink),
    /// Composite the current draw target into the back buffer and flip.
    GsDump,
    /// Terminate the GS thread.
    Die,
    SaveState(StateSink),
    LoadState(StateSource),
}

impl GsCommand {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Write64 { .. } => "write64",
            Self::Write64Privileged { .. } => "write64_privileged",
            Self::Write32Privileged { .. } => "write32_privileged",
            Self::SetRgba(_) => "set_rgba",
            Self::SetSt { .. } => "set_st",
            Self::SetUv { .. } => "set_uv",
            Self::SetXyz(_) => "set_xyz",
            Self::SetXyzf(_) => "set_xyzf",
            Self::SetCrt(_) => "set_crt",
            Self::RenderCrt => "render_crt",
            Self::AssertFinish => "assert_finish",
            Self::AssertVsync => "assert_vsync",
            Self::SetVblank(_) => "set_vblank",
            Self::MemDump(_) => "memdump",
            Self::GsDump => "gsdump",
            Self::Die => "die",
            Self::SaveState(_) => "save_state",
            Self::LoadState(_) => "load_state",
        }
    }
}

impl fmt::Debug for GsCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write64 { addr, value }
            | Self::Write64Privileged { addr, value } => {
                write!(f, "{}(0x{addr:08X}, 0x{value:016X})", self.name())
            }
            Self::Write32Privileged { addr, value } => {
                write!(f, "{}(0x{addr:08X}, 0x{value:08X})", self.name())
            }
            Self::SetRgba(rgbaq) => write!(f, "{}({rgbaq:?})", self.name()),
            Self::SetSt { s, t } => write!(f, "{}(0x{s:08X}, 0x{t:08X})", self.name()),
            Self::SetUv { u, v } => write!(f, "{}({u}, {v})", self.name()),
            Self::SetXyz(xyz) => write!(f, "{}({xyz:?})", self.name()),
            Self::SetXyzf(xyzf) => write!(f, "{}({xyzf:?})", self.name()),
            Self::SetCrt(crt) => write!(f, "{}({crt:?})", self.name()),
            Self::SetVblank(vblank) => write!(f, "{}({vblank})", self.name()),
            _ => f.write_str(self.name()),
        }
    }
}

/// Events sent from the GS thread back to the producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GsReturn {
    /// A frame was published and is now the current buffer.
    RenderComplete,
    /// The GS thread hit an unrecoverable fault and stopped.
    DeathError(String),
    SaveStateDone,
    LoadStateDone,
    /// A debug dump of the draw target was published.
    GsDumpRenderPartialDone { width: u16, height: u16 },
}
