//! Read circuits: composite local memory into an output frame.

use crate::device::local_memory::LocalMemory;
use crate::device::registers::Registers;
use crate::message::CrtMode;
use crate::render::output::OutputFrame;

const CRT_MODE_NTSC: i32 = 0x02;
const CRT_MODE_PAL: i32 = 0x03;
const CRT_MODE_VESA_640X480: i32 = 0x1A;
const CRT_MODE_DTV_480P: i32 = 0x50;
const CRT_MODE_DTV_1080I: i32 = 0x51;
const CRT_MODE_DTV_720P: i32 = 0x52;

/// Resolution implied by the CRT mode alone.
#[must_use]
pub const fn inner_resolution(crt: &CrtMode) -> (u32, u32) {
    // FIELD mode on an interlaced display shows half the lines per field.
    let halve = !crt.interlaced || !crt.frame_mode;
    match crt.mode {
        CRT_MODE_PAL => (640, if halve { 256 } else { 512 }),
        CRT_MODE_VESA_640X480 => (640, 480),
        CRT_MODE_DTV_480P => (720, 480),
        CRT_MODE_DTV_1080I => (1920, 1080),
        CRT_MODE_DTV_720P => (1280, 720),
        CRT_MODE_NTSC | _ => (640, if halve { 224 } else { 448 }),
    }
}

/// Resolution of the active read circuit's display area, falling back to
/// the CRT mode when no circuit is enabled.
#[must_use]
pub fn display_resolution(regs: &Registers, crt: &CrtMode) -> (u32, u32) {
    regs.active_circuit()
        .map_or_else(|| inner_resolution(crt), |circuit| regs.display_area(circuit).size())
}

/// Composites the displayed area into `frame`. Returns the size written.
pub fn render_crt(
    regs: &Registers,
    crt: &CrtMode,
    memory: &LocalMemory,
    frame: &mut OutputFrame,
) -> (u32, u32) {
    let Some(circuit) = regs.active_circuit() else {
        let (width, height) = inner_resolution(crt);
        let size = frame.resize(width, height);
        frame.pixels_mut().fill(regs.background_pixel());
        return size;
    };

    let source = regs.display_frame(circuit);
    let (width, height) = regs.display_area(circuit).size();
    let (width, height) = frame.resize(width, height);

    let pixels = frame.pixels_mut();
    for y in 0..height {
        let row = &mut pixels[(y * width) as usize..((y + 1) * width) as usize];
        for (x, pixel) in (0..width).zip(row.iter_mut()) {
            let value = memory.read_pixel(source.fbp, source.fbw, source.dbx + x, source.dby + y);
            *pixel = 0xFF00_0000 | value;
        }
    }

    (width, height)
}

/// Copies the scissored area of context 1's draw target into `frame`.
/// Returns the size written.
pub fn render_partial(
    regs: &Registers,
    memory: &LocalMemory,
    frame: &mut OutputFrame,
) -> (u32, u32) {
    let target = regs.frame(0);
    let scissor = regs.scissor(0);
    let width = scissor.x1.saturating_sub(scissor.x0) + 1;
    let height = scissor.y1.saturating_sub(scissor.y0) + 1;
    let (width, height) = frame.resize(width, height);

    let pixels = frame.pixels_mut();
    for y in 0..height {
        for x in 0..width {
            pixels[(y * width + x) as usize] =
                memory.read_pixel(target.fbp, target.fbw, scissor.x0 + x, scissor.y0 + y);
        }
    }

    (width, height)
}
