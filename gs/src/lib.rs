#[allow(clippy::cast_possible_truncation)]
mod bitwise;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::unreadable_literal)]
pub mod device;

pub mod error;
pub mod fifo;
pub mod gs_thread;
pub mod interrupt;
pub mod message;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
pub mod render;

pub mod snapshot;
pub mod status;
pub mod synthesizer;

pub use error::GsError;
pub use interrupt::{InterruptForwarder, InterruptLine};
pub use message::{CrtMode, GsCommand, GsReturn, Rgbaq, StateSink, StateSource, Xyz, Xyzf};
pub use render::output::{CapturedFrame, OutputFrame};
pub use render::rasterizer::{FlatRasterizer, Rasterizer};
pub use synthesizer::{GraphicsSynthesizer, GsConfig};
