//! Everything between local memory and a presentable frame.

pub mod display;
pub mod output;
pub mod rasterizer;
