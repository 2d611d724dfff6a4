//! Device state owned by the GS thread.
//!
//! Nothing in here is shared: the GS thread holds the only [`DeviceState`]
//! and every mutation arrives as a command, in submission order.

pub mod local_memory;
pub mod registers;
pub mod vertex;

use serde::{Deserialize, Serialize};

use crate::bitwise::{Bits, with_bits};
use crate::message::{CrtMode, Rgbaq};
use crate::render::rasterizer::{DrawEnv, Rasterizer};

use self::local_memory::LocalMemory;
use self::registers::{
    FINISH, FOG, LABEL, PRIM, RGBAQ, Registers, SIGNAL, ST, UV, XYZ2, XYZ3, XYZF2, XYZF3,
    is_general_register,
};
use self::vertex::{Primitive, VertexStaging};

/// Register file, local memory and vertex staging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub registers: Registers,
    pub crt: CrtMode,
    pub memory: LocalMemory,
    pub staging: VertexStaging,
    pub vblank: bool,
}

impl DeviceState {
    /// General register write. Privileged or unmapped addresses are refused.
    /// Returns whether the write was accepted.
    pub fn write64(&mut self, addr: u32, value: u64, rasterizer: &mut dyn Rasterizer) -> bool {
        if !is_general_register(addr) {
            tracing::warn!(
                "Refusing write64 to non-general register 0x{addr:08X} = 0x{value:016X}"
            );
            return false;
        }

        self.registers.set_general(addr, value);

        match addr {
            PRIM => self.staging.reset_queue(),
            RGBAQ => {
                self.staging.rgbaq = Rgbaq {
                    r: value.get_bits(0..=7) as u8,
                    g: value.get_bits(8..=15) as u8,
                    b: value.get_bits(16..=23) as u8,
                    a: value.get_bits(24..=31) as u8,
                    q: f32::from_bits(value.get_bits(32..=63) as u32),
                };
            }
            ST => {
                self.staging.s = value.get_bits(0..=31) as u32;
                self.staging.t = value.get_bits(32..=63) as u32;
            }
            UV => {
                self.staging.u = value.get_bits(0..=13) as u16;
                self.staging.v = value.get_bits(16..=29) as u16;
            }
            FOG => self.staging.fog = value.get_bits(56..=63) as u8,
            XYZF2 | XYZF3 => self.set_xyz(
                value.get_bits(0..=15) as u32,
                value.get_bits(16..=31) as u32,
                value.get_bits(32..=55) as u32,
                Some(value.get_bits(56..=63) as u8),
                addr == XYZF2,
                rasterizer,
            ),
            XYZ2 | XYZ3 => self.set_xyz(
                value.get_bits(0..=15) as u32,
                value.get_bits(16..=31) as u32,
                value.get_bits(32..=63) as u32,
                None,
                addr == XYZ2,
                rasterizer,
            ),
            SIGNAL => self.registers.signal(value),
            FINISH => self.registers.csr.finish = true,
            LABEL => self.registers.label(value),
            _ => {}
        }

        true
    }

    /// Privileged register write. Returns whether the address is mapped.
    pub fn write64_privileged(&mut self, addr: u32, value: u64) -> bool {
        if addr == registers::CSR {
            if self.registers.csr.write(value) {
                tracing::debug!("GS reset requested through CSR");
                self.reset();
            }
            return true;
        }

        if !self.registers.set_privileged(addr, value) {
            tracing::warn!("Unmapped privileged write 0x{addr:08X} = 0x{value:016X}");
            return false;
        }
        true
    }

    /// 32-bit privileged write: bit 2 of `addr` selects the upper half of the register.
    pub fn write32_privileged(&mut self, addr: u32, value: u32) -> bool {
        let base = addr & !0x7;
        let upper = addr.is_bit_on(2);

        if base == registers::CSR {
            // CSR bits are acknowledge/reset strobes, the other half must not be replayed.
            return upper || self.write64_privileged(base, u64::from(value));
        }

        let Some(current) = self.registers.privileged(base) else {
            tracing::warn!("Unmapped privileged write32 0x{addr:08X} = 0x{value:08X}");
            return false;
        };

        let start = if upper { 32 } else { 0 };
        self.write64_privileged(base, with_bits(current, start, 32, u64::from(value)))
    }

    /// Latches a position and, on a drawing kick, draws any completed primitive.
    pub fn set_xyz(
        &mut self,
        x: u32,
        y: u32,
        z: u32,
        fog: Option<u8>,
        drawing_kick: bool,
        rasterizer: &mut dyn Rasterizer,
    ) {
        let vertex = self.staging.latch(x, y, z, fog);
        if !drawing_kick {
            return;
        }

        let prim = self.registers.prim();
        if let Some(vertices) = self.staging.kick(vertex, prim.kind) {
            let primitive = Primitive {
                kind: prim.kind,
                gouraud: prim.gouraud,
                context: prim.context,
                vertices,
            };
            let env = self.draw_env(prim.context);
            rasterizer.draw(&primitive, &env, &mut self.memory);
        }
    }

    /// Checks the sizes a decoded state can't vouch for by itself.
    ///
    /// # Errors
    /// Names the first part with the wrong shape.
    pub fn check_layout(&self) -> Result<(), &'static str> {
        if !self.memory.has_full_size() {
            return Err("local memory has the wrong size");
        }
        if !self.registers.has_full_general_file() {
            return Err("general register file has the wrong size");
        }
        if self.staging.queued().len() >= self.registers.prim().kind.vertex_count() {
            return Err("vertex queue already holds a whole primitive");
        }
        Ok(())
    }

    #[must_use]
    pub fn draw_env(&self, context: usize) -> DrawEnv {
        DrawEnv {
            frame: self.registers.frame(context),
            scissor: self.registers.scissor(context),
            offset: self.registers.xyoffset(context),
        }
    }

    /// Updates the VBLANK flag. Entering VBLANK flips the interlace field.
    pub fn set_vblank(&mut self, vblank: bool) {
        if vblank && !self.vblank && self.crt.interlaced {
            self.registers.csr.field = !self.registers.csr.field;
        }
        self.vblank = vblank;
    }

    /// GS reset: registers and vertex staging go back to power-on values.
    /// Local memory and the CRT mode survive.
    pub fn reset(&mut self) {
        self.registers = Registers::default();
        self.staging = VertexStaging::default();
        self.vblank = false;
    }
}
