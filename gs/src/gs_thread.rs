//! # GS Thread
//!
//! The dispatcher: the only code that ever touches [`DeviceState`].
//!
//! ```text
//! ┌───────────────────────────┐              ┌────────────────────────────┐
//! │        GS Thread          │              │      Producer (EE)         │
//! │                           │   Commands   │                            │
//! │  ┌─────────────────────┐  │ ◄─────────── │  ┌──────────────────────┐  │
//! │  │    DeviceState      │  │    (SPSC)    │  │ GraphicsSynthesizer  │  │
//! │  │    (owned here)     │  │              │  │                      │  │
//! │  └──────────┬──────────┘  │   Returns    │  │  - send commands     │  │
//! │             │             │ ───────────► │  │  - poll returns      │  │
//! │             ▼             │    (SPSC)    │  │  - read frames       │  │
//! │  loop {                   │              │  └──────────────────────┘  │
//! │    pop command            │   Frames     │                            │
//! │    execute it             │ ═══════════► │                            │
//! │    mirror status          │ (dbl buffer) │                            │
//! │  }                        │              │                            │
//! └───────────────────────────┘              └────────────────────────────┘
//! ```

use std::any::Any;
use std::io::Write;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::device::DeviceState;
use crate::fifo::{CommandConsumer, ReturnProducer};
use crate::interrupt::{InterruptForwarder, InterruptLine};
use crate::message::{GsCommand, GsReturn};
use crate::render::display;
use crate::render::output::FrameBuffers;
use crate::render::rasterizer::Rasterizer;
use crate::snapshot::{self, SnapshotError};
use crate::status::StatusMirror;

/// Polls of an empty command queue before backing off to short sleeps.
const IDLE_SPINS: u32 = 256;
const IDLE_SLEEP: Duration = Duration::from_micros(50);

/// State shared between the GS thread and the producer handle.
#[derive(Default)]
pub struct Shared {
    pub frames: FrameBuffers,
    pub status: StatusMirror,
}

pub struct GsThread {
    state: DeviceState,
    cmd_rx: CommandConsumer,
    return_tx: ReturnProducer,
    interrupts: Box<dyn InterruptForwarder>,
    rasterizer: Box<dyn Rasterizer>,
    shared: Arc<Shared>,
}

impl GsThread {
    pub fn new(
        cmd_rx: CommandConsumer,
        return_tx: ReturnProducer,
        interrupts: Box<dyn InterruptForwarder>,
        rasterizer: Box<dyn Rasterizer>,
        shared: Arc<Shared>,
    ) -> Self {
        let state = DeviceState::default();
        shared.status.update(&state);
        Self {
            state,
            cmd_rx,
            return_tx,
            interrupts,
            rasterizer,
            shared,
        }
    }

    /// Runs until `Die`, a fatal fault, or the producer going away.
    pub fn run(mut self) {
        tracing::info!("GS thread started");
        let mut idle = 0_u32;

        loop {
            let Some(cmd) = self.cmd_rx.pop() else {
                if self.cmd_rx.is_abandoned() {
                    tracing::info!("Producer dropped, GS thread exiting");
                    return;
                }
                idle = idle.saturating_add(1);
                if idle < IDLE_SPINS {
                    thread::yield_now();
                } else {
                    thread::sleep(IDLE_SLEEP);
                }
                continue;
            };
            idle = 0;

            if self.dispatch(cmd).is_break() {
                return;
            }
            self.shared.status.update(&self.state);
        }
    }

    /// Executes one command, turning errors and panics into a `DeathError`.
    fn dispatch(&mut self, cmd: GsCommand) -> ControlFlow<()> {
        let name = cmd.name();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(cmd)));

        let reason = match outcome {
            Ok(Ok(flow)) => return flow,
            Ok(Err(err)) => format!("{name} failed: {err}"),
            Err(payload) => format!("{name} panicked: {}", panic_message(payload.as_ref())),
        };

        tracing::error!("GS thread fault: {reason}");
        self.shared.status.update(&self.state);
        self.send_return(GsReturn::DeathError(reason));
        ControlFlow::Break(())
    }

    fn execute(&mut self, cmd: GsCommand) -> Result<ControlFlow<()>, SnapshotError> {
        tracing::trace!("{cmd:?}");

        match cmd {
            GsCommand::Write64 { addr, value } => {
                self.state.write64(addr, value, self.rasterizer.as_mut());
            }
            GsCommand::Write64Privileged { addr, value } => {
                self.state.write64_privileged(addr, value);
            }
            GsCommand::Write32Privileged { addr, value } => {
                self.state.write32_privileged(addr, value);
            }
            GsCommand::SetRgba(rgbaq) => self.state.staging.rgbaq = rgbaq,
            GsCommand::SetSt { s, t } => {
                self.state.staging.s = s;
                self.state.staging.t = t;
            }
            GsCommand::SetUv { u, v } => {
                self.state.staging.u = u;
                self.state.staging.v = v;
            }
            GsCommand::SetXyz(xyz) => self.state.set_xyz(
                xyz.x,
                xyz.y,
                xyz.z,
                None,
                xyz.drawing_kick,
                self.rasterizer.as_mut(),
            ),
            GsCommand::SetXyzf(xyzf) => self.state.set_xyz(
                xyzf.x,
                xyzf.y,
                xyzf.z,
                Some(xyzf.fog),
                xyzf.drawing_kick,
                self.rasterizer.as_mut(),
            ),
            GsCommand::SetCrt(crt) => {
                tracing::debug!("CRT mode set to {crt:?}");
                self.state.crt = crt;
            }
            GsCommand::RenderCrt => self.render_crt(),
            GsCommand::AssertFinish => {
                self.state.registers.csr.finish = true;
                self.interrupts.raise(InterruptLine::Finish);
            }
            GsCommand::AssertVsync => {
                self.state.registers.csr.vsint = true;
                self.interrupts.raise(InterruptLine::Vsync);
            }
            GsCommand::SetVblank(vblank) => self.state.set_vblank(vblank),
            GsCommand::MemDump(mut sink) => {
                self.state.memory.dump(sink.as_mut())?;
                sink.flush()?;
                drop(sink);
                tracing::debug!("Local memory dumped");
                let (width, height) =
                    display::display_resolution(&self.state.registers, &self.state.crt);
                self.send_dump_done(width, height);
            }
            GsCommand::GsDump => self.render_partial(),
            GsCommand::Die => {
                tracing::info!("GS thread received Die");
                return Ok(ControlFlow::Break(()));
            }
            GsCommand::SaveState(mut sink) => {
                snapshot::save_state(&self.state, sink.as_mut())?;
                sink.flush()?;
                tracing::info!("GS state saved");
                self.send_return(GsReturn::SaveStateDone);
            }
            GsCommand::LoadState(mut source) => {
                // Decoded aside so a failed load leaves the live state intact.
                self.state = snapshot::load_state(source.as_mut())?;
                self.shared.frames.start_frame();
                tracing::info!("GS state loaded");
                self.send_return(GsReturn::LoadStateDone);
            }
        }

        Ok(ControlFlow::Continue(()))
    }

    fn render_crt(&mut self) {
        let state = &self.state;
        let (width, height) = self.shared.frames.publish(|frame| {
            display::render_crt(&state.registers, &state.crt, &state.memory, frame)
        });
        tracing::debug!(
            "Frame {} published ({width}x{height})",
            self.shared.frames.frame_count()
        );
        self.send_return(GsReturn::RenderComplete);
    }

    fn render_partial(&mut self) {
        let state = &self.state;
        let (width, height) = self
            .shared
            .frames
            .publish(|frame| display::render_partial(&state.registers, &state.memory, frame));
        self.send_dump_done(width, height);
    }

    fn send_dump_done(&mut self, width: u32, height: u32) {
        self.send_return(GsReturn::GsDumpRenderPartialDone {
            width: u16::try_from(width).unwrap_or(u16::MAX),
            height: u16::try_from(height).unwrap_or(u16::MAX),
        });
    }

    /// Pushes a return event, waiting for room rather than dropping it.
    fn send_return(&mut self, mut event: GsReturn) {
        loop {
            match self.return_tx.push(event) {
                Ok(()) => return,
                Err(_) if self.return_tx.is_abandoned() => {
                    tracing::debug!("Return queue abandoned, event discarded");
                    return;
                }
                Err(rejected) => {
                    event = rejected;
                    thread::yield_now();
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
