//! Vertex attribute staging and primitive assembly.
//!
//! RGBAQ, ST, UV and FOG writes only update the staged attributes. A
//! position write latches them into a vertex; when it carries a drawing
//! kick the vertex enters the queue, and once the queue holds enough
//! vertices for the active topology a [`Primitive`] comes out.
//!
//! ```text
//! topology        needs   kept after drawing
//! point           1       -
//! line            2       -
//! line strip      2       last
//! triangle        3       -
//! triangle strip  3       last two
//! triangle fan    3       first and last
//! sprite          2       -
//! ```

use serde::{Deserialize, Serialize};

use crate::device::registers::PrimitiveKind;
use crate::message::Rgbaq;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// 12.4 fixed point, primitive coordinate space.
    pub x: u16,
    pub y: u16,
    pub z: u32,
    pub rgbaq: Rgbaq,
    pub s: u32,
    pub t: u32,
    pub u: u16,
    pub v: u16,
    pub fog: u8,
}

/// Assembled primitive, ready for the rasterizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub kind: PrimitiveKind,
    pub gouraud: bool,
    pub context: usize,
    pub vertices: Vec<Vertex>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VertexStaging {
    pub rgbaq: Rgbaq,
    pub s: u32,
    pub t: u32,
    pub u: u16,
    pub v: u16,
    pub fog: u8,
    queue: Vec<Vertex>,
}

impl VertexStaging {
    /// Drops every queued vertex. Called when PRIM changes.
    pub fn reset_queue(&mut self) {
        self.queue.clear();
    }

    #[must_use]
    pub fn queued(&self) -> &[Vertex] {
        &self.queue
    }

    /// Latches the staged attributes with a position into a vertex.
    /// `fog` replaces the staged fog value when present (XYZF writes).
    pub fn latch(&mut self, x: u32, y: u32, z: u32, fog: Option<u8>) -> Vertex {
        if let Some(fog) = fog {
            self.fog = fog;
        }

        Vertex {
            x: (x & 0xFFFF) as u16,
            y: (y & 0xFFFF) as u16,
            z,
            rgbaq: self.rgbaq,
            s: self.s,
            t: self.t,
            u: self.u,
            v: self.v,
            fog: self.fog,
        }
    }

    /// Queues a kicked vertex and returns the vertices of a completed primitive.
    pub fn kick(&mut self, vertex: Vertex, kind: PrimitiveKind) -> Option<Vec<Vertex>> {
        if kind == PrimitiveKind::Reserved {
            return None;
        }

        self.queue.push(vertex);
        if self.queue.len() < kind.vertex_count() {
            return None;
        }

        let vertices = self.queue.clone();
        match kind {
            PrimitiveKind::LineStrip | PrimitiveKind::TriangleStrip => {
                self.queue.remove(0);
            }
            PrimitiveKind::TriangleFan => {
                self.queue.remove(1);
            }
            _ => self.queue.clear(),
        }

        Some(vertices)
    }
}
