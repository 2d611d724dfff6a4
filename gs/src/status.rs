//! Producer-visible mirror of a few device state fields.
//!
//! The producer never touches [`DeviceState`]. The GS thread republishes
//! these values after every command, so reads are at most one command stale.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::device::DeviceState;
use crate::render::display::{display_resolution, inner_resolution};

#[derive(Debug, Default)]
pub struct StatusMirror {
    csr: AtomicU64,
    imr: AtomicU64,
    stalled: AtomicBool,
    resolution: AtomicU64,
    inner_resolution: AtomicU64,
}

const fn pack((width, height): (u32, u32)) -> u64 {
    (width as u64) << 32 | height as u64
}

const fn unpack(value: u64) -> (u32, u32) {
    ((value >> 32) as u32, value as u32)
}

impl StatusMirror {
    pub fn update(&self, state: &DeviceState) {
        let regs = &state.registers;
        self.csr.store(regs.csr.read(), Ordering::Release);
        self.imr.store(regs.imr, Ordering::Release);
        self.stalled
            .store(regs.csr.signal_stall, Ordering::Release);
        self.resolution.store(
            pack(display_resolution(regs, &state.crt)),
            Ordering::Release,
        );
        self.inner_resolution
            .store(pack(inner_resolution(&state.crt)), Ordering::Release);
    }

    #[must_use]
    pub fn csr(&self) -> u64 {
        self.csr.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn imr(&self) -> u64 {
        self.imr.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn stalled(&self) -> bool {
        self.stalled.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn resolution(&self) -> (u32, u32) {
        unpack(self.resolution.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn inner_resolution(&self) -> (u32, u32) {
        unpack(self.inner_resolution.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn mirrors_device_state() {
        let mut state = DeviceState::default();
        state.crt.mode = 3;
        state.crt.interlaced = true;
        state.crt.frame_mode = true;
        state.registers.csr.signal_stall = true;
        state.registers.imr = 0x1234;

        let mirror = StatusMirror::default();
        mirror.update(&state);
        assert!(mirror.stalled());
        assert_eq!(mirror.imr(), 0x1234);
        assert_eq!(mirror.csr(), state.registers.csr.read());
        assert_eq!(mirror.inner_resolution(), (640, 512));
        // No read circuit enabled: falls back to the CRT mode.
        assert_eq!(mirror.resolution(), (640, 512));

        state.registers.csr.signal_stall = false;
        mirror.update(&state);
        assert!(!mirror.stalled());
    }

    #[test]
    fn packing() {
        assert_eq!(unpack(pack((1920, 1080))), (1920, 1080));
    }
}
