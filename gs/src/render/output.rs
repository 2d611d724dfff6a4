//! Double-buffered output frames.
//!
//! ```text
//!              current ──┐
//!                        ▼
//!   ┌──────────────┐   ┌──────────────┐
//!   │   slot 0     │   │   slot 1     │ ◄── readers lock this one
//!   │ Mutex<Frame> │   │ Mutex<Frame> │
//!   └──────────────┘   └──────────────┘
//!          ▲
//!          └── GS thread writes here, then flips `current`
//! ```
//!
//! The GS thread only ever fills the slot `current` does not name, and
//! flips the selector after the frame is complete and its lock released.
//! Each slot has its own lock, so a reader copying the current frame and
//! the GS thread filling the other one never wait on each other.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Output frame capacity, in pixels per side.
pub const MAX_FRAME_WIDTH: u32 = 1920;
pub const MAX_FRAME_HEIGHT: u32 = 1280;

const FRAME_CAPACITY: usize = (MAX_FRAME_WIDTH * MAX_FRAME_HEIGHT) as usize;

/// One fixed-capacity output buffer of ABGR32 pixels.
pub struct OutputFrame {
    width: u32,
    height: u32,
    generation: u64,
    pixels: Box<[u32]>,
}

impl Default for OutputFrame {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            generation: 0,
            pixels: vec![0; FRAME_CAPACITY].into_boxed_slice(),
        }
    }
}

impl OutputFrame {
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Publication number of this frame, `0` if never published.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Row-major pixels of the visible area.
    #[must_use]
    pub fn pixels(&self) -> &[u32] {
        &self.pixels[..self.width as usize * self.height as usize]
    }

    pub fn pixels_mut(&mut self) -> &mut [u32] {
        let len = self.width as usize * self.height as usize;
        &mut self.pixels[..len]
    }

    /// Sets the visible size, clamped to the buffer capacity. Returns the size applied.
    pub fn resize(&mut self, width: u32, height: u32) -> (u32, u32) {
        self.width = width.min(MAX_FRAME_WIDTH);
        self.height = height.min(MAX_FRAME_HEIGHT);
        (self.width, self.height)
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        (x < self.width && y < self.height)
            .then(|| self.pixels[(y * self.width + x) as usize])
    }
}

/// Owned copy of a published frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedFrame {
    pub width: u32,
    pub height: u32,
    pub generation: u64,
    pub pixels: Vec<u32>,
}

impl CapturedFrame {
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        (x < self.width && y < self.height)
            .then(|| self.pixels[(y * self.width + x) as usize])
    }
}

impl From<&OutputFrame> for CapturedFrame {
    fn from(frame: &OutputFrame) -> Self {
        Self {
            width: frame.width,
            height: frame.height,
            generation: frame.generation,
            pixels: frame.pixels().to_vec(),
        }
    }
}

/// The output frame pair, shared between the GS thread and frame consumers.
pub struct FrameBuffers {
    slots: [Mutex<OutputFrame>; 2],
    current: AtomicUsize,
    published: AtomicU64,
    frame_complete: AtomicBool,
}

impl Default for FrameBuffers {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffers {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: [
                Mutex::new(OutputFrame::default()),
                Mutex::new(OutputFrame::default()),
            ],
            current: AtomicUsize::new(0),
            published: AtomicU64::new(0),
            frame_complete: AtomicBool::new(false),
        }
    }

    fn lock(&self, slot: usize) -> MutexGuard<'_, OutputFrame> {
        // A panicking reader can't leave a frame half written, the data is still usable.
        self.slots[slot]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Fills the back buffer with `render`, then makes it current.
    ///
    /// Only the GS thread calls this.
    pub fn publish<R>(&self, render: impl FnOnce(&mut OutputFrame) -> R) -> R {
        let back = 1 - self.current.load(Ordering::Acquire);

        let result = {
            let mut frame = self.lock(back);
            let result = render(&mut frame);
            frame.generation = self.published.load(Ordering::Relaxed) + 1;
            result
        };

        self.current.store(back, Ordering::Release);
        self.published.fetch_add(1, Ordering::AcqRel);
        self.frame_complete.store(true, Ordering::Release);
        result
    }

    /// Locks the current frame for the lifetime of the guard.
    ///
    /// Holding the guard for long stalls the second publication after this one.
    pub fn lock_current(&self) -> MutexGuard<'_, OutputFrame> {
        loop {
            let slot = self.current.load(Ordering::Acquire);
            let frame = self.lock(slot);
            // The selector may have moved on while we waited; the slot we hold could
            // then be a newer back buffer that isn't published yet.
            if self.current.load(Ordering::Acquire) == slot {
                return frame;
            }
        }
    }

    /// Runs `read` with the current frame locked.
    pub fn with_current<R>(&self, read: impl FnOnce(&OutputFrame) -> R) -> R {
        read(&self.lock_current())
    }

    #[must_use]
    // `CapturedFrame::from` as a path is not general over the borrow lifetime.
    #[allow(clippy::redundant_closure)]
    pub fn copy_current(&self) -> CapturedFrame {
        self.with_current(|frame| CapturedFrame::from(frame))
    }

    /// Number of frames published so far.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_frame_complete(&self) -> bool {
        self.frame_complete.load(Ordering::Acquire)
    }

    /// Clears the frame-complete indicator before waiting on the next frame.
    pub fn start_frame(&self) {
        self.frame_complete.store(false, Ordering::Release);
    }
}
