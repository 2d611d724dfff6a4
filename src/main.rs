use std::{
    env, error,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    process,
};

use gs::device::registers::{DISPFB2, DISPLAY2, FRAME_1, PMODE, PRIM, SCISSOR_1};
use gs::{CapturedFrame, GraphicsSynthesizer, GsReturn, InterruptLine};
use logger::LogKind;

const USAGE: &str = "usage: gsbus [--log-file] [--save-state <path>] <output.ppm>";

/// Side of the rendered screen, in pixels. A multiple of 64 (one FBW unit).
const SCREEN: u64 = 256;

/// PRIM value selecting flat triangles.
const PRIM_TRIANGLE: u64 = 3;

#[derive(Debug, PartialEq, Eq)]
struct Options {
    log_kind: LogKind,
    save_state: Option<PathBuf>,
    output: PathBuf,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Options, String> {
    let mut log_kind = LogKind::Stdout;
    let mut save_state = None;
    let mut output = None;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--log-file" => log_kind = LogKind::File,
            "--save-state" => {
                let path = args.next().ok_or("--save-state needs a path")?;
                save_state = Some(PathBuf::from(path));
            }
            flag if flag.starts_with("--") => return Err(format!("unknown option {flag}")),
            _ if output.is_some() => return Err(format!("unexpected argument {arg}")),
            _ => output = Some(PathBuf::from(&arg)),
        }
    }

    Ok(Options {
        log_kind,
        save_state,
        output: output.ok_or("missing output path")?,
    })
}

fn main() {
    println!("gsbus v0.1.0");

    let options = match parse_args(env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            println!("{e}");
            println!("{USAGE}");
            process::exit(1);
        }
    };

    if let Some(path) = logger::init_logger(options.log_kind) {
        println!("Logging to file: {}", path.display());
    }

    if let Err(e) = run(&options) {
        tracing::error!("{e}");
        logger::flush();
        process::exit(2);
    }

    logger::flush();
}

fn run(options: &Options) -> Result<(), Box<dyn error::Error>> {
    let mut gs = GraphicsSynthesizer::new(|line: InterruptLine| {
        tracing::info!("GS raised {line}");
    })?;

    // Read circuit 2 shows the context 1 draw buffer at page 0.
    let last = SCREEN - 1;
    gs.write64_privileged(PMODE, 0b10)?;
    gs.write64_privileged(DISPFB2, (SCREEN / 64) << 9)?;
    gs.write64_privileged(DISPLAY2, (last << 32) | (last << 44))?;
    gs.write64(FRAME_1, (SCREEN / 64) << 16)?;
    gs.write64(SCISSOR_1, (last << 16) | (last << 48))?;
    gs.write64(PRIM, PRIM_TRIANGLE)?;

    gs.set_rgba(255, 0, 0, 255, 1.0)?;
    for (x, y) in [(32, 32), (224, 32), (32, 224)] {
        gs.set_xyz(x << 4, y << 4, 0, true)?;
    }
    gs.assert_finish()?;

    gs.start_frame();
    gs.render_crt()?;
    gs.wait_for(|event| *event == GsReturn::RenderComplete)?;
    let frame = gs.copy_current_frame();
    tracing::info!(
        "Frame {} rendered at {}x{}",
        frame.generation,
        frame.width,
        frame.height
    );

    if let Some(path) = &options.save_state {
        gs.save_state(Box::new(File::create(path)?))?;
        gs.wait_for(|event| *event == GsReturn::SaveStateDone)?;
        tracing::info!("State saved to {}", path.display());
    }

    write_ppm(&frame, &options.output)?;
    tracing::info!("Frame written to {}", options.output.display());

    gs.shutdown()?;
    Ok(())
}

fn write_ppm(frame: &CapturedFrame, path: &Path) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    encode_ppm(frame, &mut out)?;
    out.flush()
}

/// Binary PPM (P6). Pixels are ABGR32, red in the low byte; alpha is dropped.
fn encode_ppm(frame: &CapturedFrame, out: &mut impl Write) -> std::io::Result<()> {
    write!(out, "P6\n{} {}\n255\n", frame.width, frame.height)?;
    for pixel in &frame.pixels {
        out.write_all(&pixel.to_le_bytes()[..3])?;
    }
    Ok(())
}
