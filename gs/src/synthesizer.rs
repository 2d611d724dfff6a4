//! Producer-side handle to a running GS thread.
//!
//! Every setter is a thin constructor around [`GraphicsSynthesizer::send`],
//! the single submission entry point. Nothing here touches device state;
//! what the producer can observe comes from the return queue, the output
//! frames and the status mirror.

use std::collections::VecDeque;
use std::sync::{Arc, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::device::registers::{CSR, IMR};
use crate::error::GsError;
use crate::fifo::{COMMAND_FIFO_SIZE, CommandProducer, RETURN_FIFO_SIZE, ReturnConsumer, fifo};
use crate::gs_thread::{GsThread, Shared};
use crate::interrupt::InterruptForwarder;
use crate::message::{CrtMode, GsCommand, GsReturn, Rgbaq, StateSink, StateSource, Xyz, Xyzf};
use crate::render::output::{CapturedFrame, OutputFrame};
use crate::render::rasterizer::{FlatRasterizer, Rasterizer};

const WAIT_SPINS: u32 = 256;
const WAIT_SLEEP: Duration = Duration::from_micros(100);

/// CSR bit that resets the GS when written.
const CSR_RESET: u64 = 1 << 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GsConfig {
    /// Command queue depth, in commands.
    pub command_capacity: usize,
    /// Return queue depth, in events.
    pub return_capacity: usize,
    pub thread_name: String,
}

impl Default for GsConfig {
    fn default() -> Self {
        Self {
            command_capacity: COMMAND_FIFO_SIZE,
            return_capacity: RETURN_FIFO_SIZE,
            thread_name: "gs".to_owned(),
        }
    }
}

/// Handle owned by the producer. Dropping it shuts the GS thread down.
pub struct GraphicsSynthesizer {
    cmd_tx: CommandProducer,
    return_rx: ReturnConsumer,
    shared: Arc<Shared>,
    thread_handle: Option<JoinHandle<()>>,

    /// Events popped while waiting for a different one, oldest first.
    pending: VecDeque<GsReturn>,
    /// Reason of the first `DeathError` seen.
    fault: Option<String>,
}

impl GraphicsSynthesizer {
    /// Spawns a GS thread with the default configuration and rasterizer.
    ///
    /// # Errors
    /// Fails if the OS refuses to spawn the thread.
    pub fn new(interrupts: impl InterruptForwarder + 'static) -> Result<Self, GsError> {
        Self::spawn(GsConfig::default(), interrupts, FlatRasterizer)
    }

    /// # Errors
    /// Fails if the OS refuses to spawn the thread.
    pub fn spawn(
        config: GsConfig,
        interrupts: impl InterruptForwarder + 'static,
        rasterizer: impl Rasterizer + 'static,
    ) -> Result<Self, GsError> {
        let (cmd_tx, cmd_rx) = fifo(config.command_capacity);
        let (return_tx, return_rx) = fifo(config.return_capacity);
        let shared = Arc::new(Shared::default());

        let worker = GsThread::new(
            cmd_rx,
            return_tx,
            Box::new(interrupts),
            Box::new(rasterizer),
            Arc::clone(&shared),
        );

        let thread_handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || worker.run())
            .map_err(GsError::Spawn)?;

        tracing::debug!(
            "Spawned GS thread '{}' (commands: {}, returns: {})",
            config.thread_name,
            config.command_capacity,
            config.return_capacity
        );

        Ok(Self {
            cmd_tx,
            return_rx,
            shared,
            thread_handle: Some(thread_handle),
            pending: VecDeque::new(),
            fault: None,
        })
    }

    /// Queues a command for the GS thread. Never blocks.
    ///
    /// # Errors
    /// - [`GsError::QueueFull`] with the rejected command if no slot is free.
    /// - [`GsError::Faulted`] once the GS thread reported a `DeathError`.
    /// - [`GsError::Stopped`] if the GS thread has exited.
    pub fn send(&mut self, cmd: GsCommand) -> Result<(), GsError> {
        if let Some(reason) = &self.fault {
            return Err(GsError::Faulted(reason.clone()));
        }
        if self.cmd_tx.is_abandoned() {
            self.collect_returns();
            return Err(self.stopped_error());
        }
        self.cmd_tx
            .push(cmd)
            .map_err(|cmd| GsError::QueueFull(Box::new(cmd)))
    }

    /// # Errors
    /// See [`Self::send`].
    pub fn write64(&mut self, addr: u32, value: u64) -> Result<(), GsError> {
        self.send(GsCommand::Write64 { addr, value })
    }

    /// # Errors
    /// See [`Self::send`].
    pub fn write64_privileged(&mut self, addr: u32, value: u64) -> Result<(), GsError> {
        self.send(GsCommand::Write64Privileged { addr, value })
    }

    /// # Errors
    /// See [`Self::send`].
    pub fn write32_privileged(&mut self, addr: u32, value: u32) -> Result<(), GsError> {
        self.send(GsCommand::Write32Privileged { addr, value })
    }

    /// # Errors
    /// See [`Self::send`].
    pub fn set_rgba(&mut self, r: u8, g: u8, b: u8, a: u8, q: f32) -> Result<(), GsError> {
        self.send(GsCommand::SetRgba(Rgbaq { r, g, b, a, q }))
    }

    /// # Errors
    /// See [`Self::send`].
    pub fn set_st(&mut self, s: u32, t: u32) -> Result<(), GsError> {
        self.send(GsCommand::SetSt { s, t })
    }

    /// # Errors
    /// See [`Self::send`].
    pub fn set_uv(&mut self, u: u16, v: u16) -> Result<(), GsError> {
        self.send(GsCommand::SetUv { u, v })
    }

    /// # Errors
    /// See [`Self::send`].
    pub fn set_xyz(&mut self, x: u32, y: u32, z: u32, drawing_kick: bool) -> Result<(), GsError> {
        self.send(GsCommand::SetXyz(Xyz {
            x,
            y,
            z,
            drawing_kick,
        }))
    }

    /// # Errors
    /// See [`Self::send`].
    pub fn set_xyzf(
        &mut self,
        x: u32,
        y: u32,
        z: u32,
        fog: u8,
        drawing_kick: bool,
    ) -> Result<(), GsError> {
        self.send(GsCommand::SetXyzf(Xyzf {
            x,
            y,
            z,
            fog,
            drawing_kick,
        }))
    }

    /// # Errors
    /// See [`Self::send`].
    pub fn set_crt(
        &mut self,
        interlaced: bool,
        mode: i32,
        frame_mode: bool,
    ) -> Result<(), GsError> {
        self.send(GsCommand::SetCrt(CrtMode {
            interlaced,
            mode,
            frame_mode,
        }))
    }

    /// Requests a frame. Completion is signalled by [`GsReturn::RenderComplete`].
    ///
    /// # Errors
    /// See [`Self::send`].
    pub fn render_crt(&mut self) -> Result<(), GsError> {
        self.send(GsCommand::RenderCrt)
    }

    /// # Errors
    /// See [`Self::send`].
    pub fn assert_finish(&mut self) -> Result<(), GsError> {
        self.send(GsCommand::AssertFinish)
    }

    /// # Errors
    /// See [`Self::send`].
    pub fn assert_vsync(&mut self) -> Result<(), GsError> {
        self.send(GsCommand::AssertVsync)
    }

    /// # Errors
    /// See [`Self::send`].
    pub fn set_vblank(&mut self, vblank: bool) -> Result<(), GsError> {
        self.send(GsCommand::SetVblank(vblank))
    }

    /// Resets the GS through the CSR RESET bit. Local memory is kept.
    ///
    /// # Errors
    /// See [`Self::send`].
    pub fn reset(&mut self) -> Result<(), GsError> {
        self.write64_privileged(CSR, CSR_RESET)
    }

    /// Writes raw local memory to `sink` once every earlier command ran.
    /// Completion is signalled by [`GsReturn::GsDumpRenderPartialDone`]
    /// carrying the displayed resolution; the sink is dropped by then.
    ///
    /// # Errors
    /// See [`Self::send`].
    pub fn memdump(&mut self, sink: StateSink) -> Result<(), GsError> {
        self.send(GsCommand::MemDump(sink))
    }

    /// Requests a debug dump of the draw target.
    /// Completion is signalled by [`GsReturn::GsDumpRenderPartialDone`].
    ///
    /// # Errors
    /// See [`Self::send`].
    pub fn send_dump_request(&mut self) -> Result<(), GsError> {
        self.send(GsCommand::GsDump)
    }

    /// Saves the whole device state to `sink` once every earlier command ran.
    /// The sink belongs to the GS thread until [`GsReturn::SaveStateDone`].
    ///
    /// # Errors
    /// See [`Self::send`].
    pub fn save_state(&mut self, sink: StateSink) -> Result<(), GsError> {
        self.send(GsCommand::SaveState(sink))
    }

    /// Replaces the whole device state with the one read from `source`.
    /// Completion is signalled by [`GsReturn::LoadStateDone`].
    ///
    /// # Errors
    /// See [`Self::send`].
    pub fn load_state(&mut self, source: StateSource) -> Result<(), GsError> {
        self.send(GsCommand::LoadState(source))
    }

    /// Privileged register read. Only CSR and IMR are readable, anything else reads 0.
    #[must_use]
    pub fn read64_privileged(&self, addr: u32) -> u64 {
        match addr {
            CSR => self.shared.status.csr(),
            IMR => self.shared.status.imr(),
            _ => {
                tracing::warn!("Unhandled privileged read64 0x{addr:08X}");
                0
            }
        }
    }

    /// 32-bit privileged read; bit 2 of `addr` selects the upper half.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn read32_privileged(&self, addr: u32) -> u32 {
        let value = self.read64_privileged(addr & !0x7);
        if addr & 0x4 == 0 {
            value as u32
        } else {
            (value >> 32) as u32
        }
    }

    /// Pops the next return event, if any.
    pub fn poll_return(&mut self) -> Option<GsReturn> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        let event = self.return_rx.pop()?;
        self.note(&event);
        Some(event)
    }

    /// Blocks until the next return event.
    ///
    /// # Errors
    /// [`GsError::Stopped`] or [`GsError::Faulted`] if the GS thread exited
    /// with nothing left in the return queue.
    pub fn wait_return(&mut self) -> Result<GsReturn, GsError> {
        let mut idle = 0_u32;
        loop {
            if let Some(event) = self.poll_return() {
                return Ok(event);
            }
            if self.worker_finished() {
                // The last event may have landed right before the thread exited.
                return self.poll_return().ok_or_else(|| self.stopped_error());
            }
            backoff(&mut idle);
        }
    }

    /// Blocks until an event matching `wanted` arrives. Other events stay
    /// queued, in order, for later polls.
    ///
    /// # Errors
    /// [`GsError::Faulted`] if a `DeathError` arrives first,
    /// [`GsError::Stopped`] if the GS thread exits.
    pub fn wait_for(
        &mut self,
        mut wanted: impl FnMut(&GsReturn) -> bool,
    ) -> Result<GsReturn, GsError> {
        if let Some(event) = self
            .pending
            .iter()
            .position(&mut wanted)
            .and_then(|index| self.pending.remove(index))
        {
            return Ok(event);
        }

        let mut idle = 0_u32;
        loop {
            if let Some(event) = self.return_rx.pop() {
                idle = 0;
                self.note(&event);
                if wanted(&event) {
                    return Ok(event);
                }
                let death = matches!(event, GsReturn::DeathError(_));
                self.pending.push_back(event);
                if death {
                    return Err(self.stopped_error());
                }
                continue;
            }
            if self.worker_finished() && self.return_rx.is_empty() {
                return Err(self.stopped_error());
            }
            backoff(&mut idle);
        }
    }

    /// Whether the GS is stalled on an unacknowledged SIGNAL.
    /// Producers should hold off drawing traffic while this is set.
    #[must_use]
    pub fn stalled(&self) -> bool {
        self.shared.status.stalled()
    }

    #[must_use]
    pub fn is_frame_complete(&self) -> bool {
        self.shared.frames.is_frame_complete()
    }

    /// Clears the frame-complete indicator.
    pub fn start_frame(&self) {
        self.shared.frames.start_frame();
    }

    /// Frames published so far, `RenderCrt` and `GsDump` alike.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.shared.frames.frame_count()
    }

    /// Runs `read` with the current output frame locked.
    pub fn with_current_frame<R>(&self, read: impl FnOnce(&OutputFrame) -> R) -> R {
        self.shared.frames.with_current(read)
    }

    /// Locks the current output frame until the guard is dropped.
    /// Holding it blocks the second publication that follows.
    #[must_use]
    pub fn lock_current_frame(&self) -> MutexGuard<'_, OutputFrame> {
        self.shared.frames.lock_current()
    }

    #[must_use]
    pub fn copy_current_frame(&self) -> CapturedFrame {
        self.shared.frames.copy_current()
    }

    /// Dumps the draw target and returns a copy of it. Collect the completion
    /// of any outstanding [`Self::memdump`] first, it carries the same event.
    ///
    /// # Errors
    /// Fails if the dump can't be queued or the GS thread stops first.
    pub fn render_partial_frame(&mut self) -> Result<CapturedFrame, GsError> {
        self.send_dump_request()?;
        self.wait_for(|event| matches!(event, GsReturn::GsDumpRenderPartialDone { .. }))?;
        Ok(self.copy_current_frame())
    }

    /// Size of the displayed area as of the last executed command.
    #[must_use]
    pub fn resolution(&self) -> (u32, u32) {
        self.shared.status.resolution()
    }

    /// Size implied by the CRT mode as of the last executed command.
    #[must_use]
    pub fn inner_resolution(&self) -> (u32, u32) {
        self.shared.status.inner_resolution()
    }

    /// Free command slots. A lower bound: the GS thread may free more meanwhile.
    #[must_use]
    pub fn free_slots(&self) -> usize {
        self.cmd_tx.free_slots()
    }

    /// Reason of the fatal fault reported by the GS thread, if any.
    #[must_use]
    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    /// Sends `Die` and waits for the GS thread to exit. Every command queued
    /// before it still runs; return events it produces stay pollable.
    ///
    /// # Errors
    /// [`GsError::Panicked`] if the GS thread panicked outside a command.
    pub fn shutdown(mut self) -> Result<(), GsError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), GsError> {
        let Some(handle) = self.thread_handle.take() else {
            return Ok(());
        };

        let mut die = GsCommand::Die;
        while !handle.is_finished() {
            match self.cmd_tx.push(die) {
                Ok(()) => break,
                Err(rejected) => {
                    die = rejected;
                    self.collect_returns();
                    thread::yield_now();
                }
            }
        }

        // The GS thread may be waiting for room in the return queue.
        while !handle.is_finished() {
            self.collect_returns();
            thread::yield_now();
        }
        self.collect_returns();

        handle.join().map_err(|_| GsError::Panicked)?;
        tracing::debug!("GS thread joined");
        Ok(())
    }

    fn collect_returns(&mut self) {
        while let Some(event) = self.return_rx.pop() {
            self.note(&event);
            self.pending.push_back(event);
        }
    }

    fn note(&mut self, event: &GsReturn) {
        if let GsReturn::DeathError(reason) = event {
            self.fault.get_or_insert_with(|| reason.clone());
        }
    }

    fn worker_finished(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_none_or(JoinHandle::is_finished)
    }

    fn stopped_error(&self) -> GsError {
        self.fault
            .clone()
            .map_or(GsError::Stopped, GsError::Faulted)
    }
}

impl Drop for GraphicsSynthesizer {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::error!("GS shutdown failed: {err}");
        }
    }
}

fn backoff(idle: &mut u32) {
    *idle = idle.saturating_add(1);
    if *idle < WAIT_SPINS {
        thread::yield_now();
    } else {
        thread::sleep(WAIT_SLEEP);
    }
}
