#![allow(dead_code)]

use std::io::{self, Cursor, Write};
use std::sync::{Arc, Mutex};
use std::thread;

use gs::device::registers::{DISPFB2, DISPLAY2, FRAME_1, PMODE, PRIM, SCISSOR_1};
use gs::{GraphicsSynthesizer, GsCommand, GsError, InterruptLine, StateSource};

/// Side of the square test screen, in pixels.
pub const SCREEN: u64 = 64;

/// Byte sink whose contents outlive the GS thread's ownership of it.
#[derive(Clone, Default)]
pub struct SharedBytes(Arc<Mutex<Vec<u8>>>);

impl SharedBytes {
    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }

    pub fn source(&self) -> StateSource {
        Box::new(Cursor::new(self.bytes()))
    }
}

impl Write for SharedBytes {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Interrupt forwarder that remembers every raised line.
#[derive(Clone, Default)]
pub struct Lines(Arc<Mutex<Vec<InterruptLine>>>);

impl Lines {
    pub fn forwarder(&self) -> Box<dyn FnMut(InterruptLine) + Send> {
        let lines = Arc::clone(&self.0);
        Box::new(move |line: InterruptLine| lines.lock().unwrap().push(line))
    }

    pub fn raised(&self) -> Vec<InterruptLine> {
        self.0.lock().unwrap().clone()
    }
}

pub fn quiet() -> Box<dyn FnMut(InterruptLine) + Send> {
    Box::new(|_: InterruptLine| {})
}

/// Sends `cmd`, retrying while the command queue is full.
pub fn send_blocking(gs: &mut GraphicsSynthesizer, mut cmd: GsCommand) {
    loop {
        match gs.send(cmd) {
            Ok(()) => return,
            Err(GsError::QueueFull(rejected)) => {
                cmd = *rejected;
                thread::yield_now();
            }
            Err(err) => panic!("send failed: {err}"),
        }
    }
}

/// Read circuit 2 shows a `SCREEN`x`SCREEN` buffer at page 0, which is
/// also the context 1 draw target. `prim` selects the topology.
pub fn setup_screen(gs: &mut GraphicsSynthesizer, prim: u64) {
    let last = SCREEN - 1;
    gs.write64_privileged(PMODE, 0b10).unwrap();
    gs.write64_privileged(DISPFB2, (SCREEN / 64) << 9).unwrap();
    gs.write64_privileged(DISPLAY2, (last << 32) | (last << 44))
        .unwrap();
    gs.write64(FRAME_1, (SCREEN / 64) << 16).unwrap();
    gs.write64(SCISSOR_1, (last << 16) | (last << 48)).unwrap();
    gs.write64(PRIM, prim).unwrap();
}

/// Pixel position to 12.4 fixed point.
pub const fn fixed(px: u32) -> u32 {
    px << 4
}
