mod common;

use std::io::Cursor;
use std::sync::mpsc;

use common::{Lines, SCREEN, fixed, quiet, send_blocking, setup_screen};
use gs::device::local_memory::LocalMemory;
use gs::device::registers::{CSR, SIGNAL};
use gs::device::vertex::Primitive;
use gs::render::rasterizer::DrawEnv;
use gs::{
    FlatRasterizer, GraphicsSynthesizer, GsCommand, GsConfig, GsError, GsReturn, InterruptLine,
    Rasterizer, Rgbaq, Xyz,
};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn small_config(command_capacity: usize) -> GsConfig {
    GsConfig {
        command_capacity,
        return_capacity: 16,
        ..GsConfig::default()
    }
}

#[test]
fn commands_execute_in_submission_order_across_bursts() {
    let mut rng = StdRng::seed_from_u64(0x6753);
    let mut gs = GraphicsSynthesizer::spawn(small_config(64), quiet(), FlatRasterizer).unwrap();
    setup_screen(&mut gs, 0); // points

    let pixels = u32::try_from(SCREEN * SCREEN).unwrap();
    let mut next = 0_u32;
    while next < pixels {
        let burst = rng.gen_range(1..=300).min(pixels - next);
        for k in next..next + burst {
            // The color must land on its own pixel, so RGBA/XYZ pairs can't be reordered.
            send_blocking(
                &mut gs,
                GsCommand::SetRgba(Rgbaq {
                    r: k as u8,
                    g: (k >> 8) as u8,
                    b: 0x40,
                    a: 0xFF,
                    q: 1.0,
                }),
            );
            send_blocking(
                &mut gs,
                GsCommand::SetXyz(Xyz {
                    x: fixed(k % 64),
                    y: fixed(k / 64),
                    z: 0,
                    drawing_kick: true,
                }),
            );
        }
        next += burst;

        if rng.gen_bool(0.3) {
            send_blocking(&mut gs, GsCommand::RenderCrt);
            gs.wait_for(|e| *e == GsReturn::RenderComplete).unwrap();
        }
    }

    send_blocking(&mut gs, GsCommand::RenderCrt);
    gs.wait_for(|e| *e == GsReturn::RenderComplete).unwrap();

    let frame = gs.copy_current_frame();
    assert_eq!((frame.width, frame.height), (64, 64));
    for k in 0..pixels {
        let expected = 0xFF40_0000 | (k & 0xFFFF);
        assert_eq!(frame.pixel(k % 64, k / 64), Some(expected), "pixel {k}");
    }
}

/// Holds the GS thread inside the first draw until released.
struct Gate(mpsc::Receiver<()>);

impl Rasterizer for Gate {
    fn draw(&mut self, _: &Primitive, _: &DrawEnv, _: &mut LocalMemory) {
        let _ = self.0.recv();
    }
}

#[test]
fn full_queue_rejects_without_touching_queued_commands() {
    let (release, gate) = mpsc::channel();
    let mut gs = GraphicsSynthesizer::spawn(small_config(4), quiet(), Gate(gate)).unwrap();

    // PRIM resets to points: this kick parks the GS thread in the rasterizer.
    gs.set_xyz(0, 0, 0, true).unwrap();

    let mut accepted = 0;
    let rejected = loop {
        match gs.write64_privileged(CSR, 0) {
            Ok(()) => {}
            Err(err) => break err,
        }
        match gs.render_crt() {
            Ok(()) => accepted += 1,
            Err(err) => break err,
        }
        assert!(accepted < 100, "queue never filled");
    };

    let cmd = rejected.into_command().expect("QueueFull hands the command back");
    assert!(matches!(
        cmd,
        GsCommand::RenderCrt | GsCommand::Write64Privileged { addr: CSR, value: 0 }
    ));

    release.send(()).unwrap();
    for _ in 0..accepted {
        assert_eq!(
            gs.wait_for(|e| *e == GsReturn::RenderComplete).unwrap(),
            GsReturn::RenderComplete
        );
    }

    // Space frees up once the GS thread drains the queue.
    gs.render_crt().unwrap();
    gs.wait_for(|e| *e == GsReturn::RenderComplete).unwrap();
    assert_eq!(gs.frame_count(), accepted + 1);
    assert_eq!(gs.poll_return(), None);
}

#[test]
fn nothing_after_die_executes() {
    let lines = Lines::default();
    let mut gs = GraphicsSynthesizer::new(lines.forwarder()).unwrap();

    gs.assert_finish().unwrap();
    gs.send(GsCommand::Die).unwrap();
    // Either accepted before the GS thread exits, or refused after; never executed.
    for _ in 0..32 {
        match gs.assert_vsync() {
            Ok(()) | Err(GsError::Stopped) => {}
            Err(err) => panic!("unexpected error {err}"),
        }
        match gs.render_crt() {
            Ok(()) | Err(GsError::Stopped) => {}
            Err(err) => panic!("unexpected error {err}"),
        }
    }

    assert!(matches!(gs.wait_return(), Err(GsError::Stopped)));
    assert_eq!(lines.raised(), vec![InterruptLine::Finish]);
    assert_eq!(gs.frame_count(), 0);
    gs.shutdown().unwrap();
}

#[test]
fn shutdown_runs_everything_queued_before_it() {
    let lines = Lines::default();
    let mut gs = GraphicsSynthesizer::new(lines.forwarder()).unwrap();
    for _ in 0..5 {
        gs.assert_finish().unwrap();
    }
    gs.shutdown().unwrap();
    assert_eq!(lines.raised(), vec![InterruptLine::Finish; 5]);
}

#[test]
fn interrupts_are_forwarded_once_per_command() {
    let lines = Lines::default();
    let mut gs = GraphicsSynthesizer::new(lines.forwarder()).unwrap();

    gs.assert_vsync().unwrap();
    gs.set_vblank(true).unwrap();
    gs.assert_finish().unwrap();
    gs.set_vblank(false).unwrap();
    gs.assert_vsync().unwrap();
    gs.render_crt().unwrap();
    gs.wait_for(|e| *e == GsReturn::RenderComplete).unwrap();

    assert_eq!(
        lines.raised(),
        vec![
            InterruptLine::Vsync,
            InterruptLine::Finish,
            InterruptLine::Vsync
        ]
    );
    // FINISH and VSINT stay set until acknowledged through CSR.
    assert_eq!(gs.read64_privileged(CSR) & 0b1010, 0b1010);

    gs.write64_privileged(CSR, 0b1010).unwrap();
    gs.render_crt().unwrap();
    gs.wait_for(|e| *e == GsReturn::RenderComplete).unwrap();
    assert_eq!(gs.read64_privileged(CSR) & 0b1010, 0);
}

#[test]
fn second_signal_raises_backpressure_until_acknowledged() {
    let mut gs = GraphicsSynthesizer::new(quiet()).unwrap();
    assert!(!gs.stalled());

    gs.write64(SIGNAL, 1).unwrap();
    gs.render_crt().unwrap();
    gs.wait_return().unwrap();
    assert!(!gs.stalled());

    gs.write64(SIGNAL, 2).unwrap();
    gs.render_crt().unwrap();
    gs.wait_return().unwrap();
    assert!(gs.stalled());

    gs.write32_privileged(CSR, 1).unwrap();
    gs.render_crt().unwrap();
    gs.wait_return().unwrap();
    assert!(!gs.stalled());
}

#[test]
fn corrupt_load_faults_the_bus() {
    let mut gs = GraphicsSynthesizer::new(quiet()).unwrap();
    gs.load_state(Box::new(Cursor::new(b"definitely not a state".to_vec())))
        .unwrap();

    let GsReturn::DeathError(reason) = gs.wait_return().unwrap() else {
        panic!("expected a DeathError");
    };
    assert!(reason.contains("load_state"), "{reason}");
    assert_eq!(gs.fault(), Some(reason.as_str()));
    assert!(matches!(gs.render_crt(), Err(GsError::Faulted(_))));
    gs.shutdown().unwrap();
}
