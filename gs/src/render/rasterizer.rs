//! Rasterizer seam.
//!
//! The bus hands every assembled primitive to a [`Rasterizer`] together
//! with the draw environment of its context. [`FlatRasterizer`] is a
//! plain scanline filler: no texturing, blending, fog or depth test. It
//! is enough to see primitives land in local memory.

use crate::device::local_memory::LocalMemory;
use crate::device::registers::{FrameTarget, PrimitiveKind, Scissor};
use crate::device::vertex::{Primitive, Vertex};

/// Draw environment of the primitive's context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawEnv {
    pub frame: FrameTarget,
    pub scissor: Scissor,
    /// XYOFFSET, 12.4 fixed point.
    pub offset: (u32, u32),
}

pub trait Rasterizer: Send {
    fn draw(&mut self, primitive: &Primitive, env: &DrawEnv, memory: &mut LocalMemory);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FlatRasterizer;

/// Window-space point, 12.4 fixed point.
#[derive(Debug, Clone, Copy)]
struct Point {
    x: i64,
    y: i64,
}

#[must_use]
fn pack_color(vertex: &Vertex) -> u32 {
    let c = vertex.rgbaq;
    u32::from(c.r) | u32::from(c.g) << 8 | u32::from(c.b) << 16 | u32::from(c.a) << 24
}

impl FlatRasterizer {
    fn to_window(vertex: &Vertex, env: &DrawEnv) -> Point {
        Point {
            x: i64::from(vertex.x) - i64::from(env.offset.0),
            y: i64::from(vertex.y) - i64::from(env.offset.1),
        }
    }

    fn plot(env: &DrawEnv, memory: &mut LocalMemory, x: i64, y: i64, color: u32) {
        let s = env.scissor;
        if x < i64::from(s.x0) || x > i64::from(s.x1) || y < i64::from(s.y0) || y > i64::from(s.y1)
        {
            return;
        }
        // Scissor bounds are 11 bits, so the casts are lossless here.
        memory.write_pixel(
            env.frame.fbp,
            env.frame.fbw,
            x as u32,
            y as u32,
            color,
            env.frame.fbmsk,
        );
    }

    fn draw_point(v: &Vertex, env: &DrawEnv, memory: &mut LocalMemory) {
        let p = Self::to_window(v, env);
        Self::plot(env, memory, p.x >> 4, p.y >> 4, pack_color(v));
    }

    fn draw_line(v0: &Vertex, v1: &Vertex, env: &DrawEnv, memory: &mut LocalMemory) {
        let a = Self::to_window(v0, env);
        let b = Self::to_window(v1, env);
        let color = pack_color(v1);

        let (x0, y0, x1, y1) = (a.x >> 4, a.y >> 4, b.x >> 4, b.y >> 4);
        let steps = (x1 - x0).abs().max((y1 - y0).abs());
        if steps == 0 {
            Self::plot(env, memory, x0, y0, color);
            return;
        }

        for i in 0..=steps {
            let x = x0 + (x1 - x0) * i / steps;
            let y = y0 + (y1 - y0) * i / steps;
            Self::plot(env, memory, x, y, color);
        }
    }

    fn draw_sprite(v0: &Vertex, v1: &Vertex, env: &DrawEnv, memory: &mut LocalMemory) {
        let a = Self::to_window(v0, env);
        let b = Self::to_window(v1, env);
        let color = pack_color(v1);

        // Pixel centers inside [min, max).
        let (min_x, max_x) = (a.x.min(b.x), a.x.max(b.x));
        let (min_y, max_y) = (a.y.min(b.y), a.y.max(b.y));
        let first_x = (min_x + 7) >> 4;
        let first_y = (min_y + 7) >> 4;

        let mut y = first_y;
        while y * 16 + 8 < max_y {
            let mut x = first_x;
            while x * 16 + 8 < max_x {
                Self::plot(env, memory, x, y, color);
                x += 1;
            }
            y += 1;
        }
    }

    fn edge(a: Point, b: Point, px: i64, py: i64) -> i64 {
        (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
    }

    fn draw_triangle(
        vertices: &[Vertex],
        gouraud: bool,
        env: &DrawEnv,
        memory: &mut LocalMemory,
    ) {
        let p: Vec<Point> = vertices.iter().map(|v| Self::to_window(v, env)).collect();
        let area = Self::edge(p[0], p[1], p[2].x, p[2].y);
        if area == 0 {
            return;
        }

        let s = env.scissor;
        let min_x = (p.iter().map(|p| p.x).min().unwrap_or(0) >> 4).max(i64::from(s.x0));
        let max_x = (p.iter().map(|p| p.x).max().unwrap_or(0) >> 4).min(i64::from(s.x1));
        let min_y = (p.iter().map(|p| p.y).min().unwrap_or(0) >> 4).max(i64::from(s.y0));
        let max_y = (p.iter().map(|p| p.y).max().unwrap_or(0) >> 4).min(i64::from(s.y1));

        let flat = pack_color(&vertices[2]);

        for y in min_y..=max_y {
            let cy = y * 16 + 8;
            for x in min_x..=max_x {
                let cx = x * 16 + 8;
                let w0 = Self::edge(p[1], p[2], cx, cy);
                let w1 = Self::edge(p[2], p[0], cx, cy);
                let w2 = Self::edge(p[0], p[1], cx, cy);

                let inside = if area > 0 {
                    w0 >= 0 && w1 >= 0 && w2 >= 0
                } else {
                    w0 <= 0 && w1 <= 0 && w2 <= 0
                };
                if !inside {
                    continue;
                }

                let color = if gouraud {
                    Self::interpolate(vertices, [w0, w1, w2], area)
                } else {
                    flat
                };
                Self::plot(env, memory, x, y, color);
            }
        }
    }

    fn interpolate(vertices: &[Vertex], weights: [i64; 3], area: i64) -> u32 {
        let channel = |get: fn(&Vertex) -> u8| -> u32 {
            let sum: i64 = vertices
                .iter()
                .zip(weights)
                .map(|(v, w)| i64::from(get(v)) * w)
                .sum();
            (sum / area).clamp(0, 255) as u32
        };

        channel(|v| v.rgbaq.r)
            | channel(|v| v.rgbaq.g) << 8
            | channel(|v| v.rgbaq.b) << 16
            | channel(|v| v.rgbaq.a) << 24
    }
}

impl Rasterizer for FlatRasterizer {
    fn draw(&mut self, primitive: &Primitive, env: &DrawEnv, memory: &mut LocalMemory) {
        let v = &primitive.vertices;
        match primitive.kind {
            PrimitiveKind::Point => Self::draw_point(&v[0], env, memory),
            PrimitiveKind::Line | PrimitiveKind::LineStrip => {
                Self::draw_line(&v[0], &v[1], env, memory);
            }
            PrimitiveKind::Triangle | PrimitiveKind::TriangleStrip | PrimitiveKind::TriangleFan => {
                Self::draw_triangle(v, primitive.gouraud, env, memory);
            }
            PrimitiveKind::Sprite => Self::draw_sprite(&v[0], &v[1], env, memory),
            PrimitiveKind::Reserved => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Rgbaq;
    use pretty_assertions::assert_eq;

    const RED: u32 = 0xFF00_00FF;

    fn env() -> DrawEnv {
        DrawEnv {
            frame: FrameTarget {
                fbp: 0,
                fbw: 1,
                psm: 0,
                fbmsk: 0,
            },
            scissor: Scissor {
                x0: 0,
                x1: 63,
                y0: 0,
                y1: 63,
            },
            offset: (0, 0),
        }
    }

    fn vertex(x: u16, y: u16) -> Vertex {
        Vertex {
            x: x << 4,
            y: y << 4,
            rgbaq: Rgbaq {
                r: 255,
                g: 0,
                b: 0,
                a: 255,
                q: 1.0,
            },
            ..Vertex::default()
        }
    }

    fn primitive(kind: PrimitiveKind, vertices: Vec<Vertex>) -> Primitive {
        Primitive {
            kind,
            gouraud: false,
            context: 0,
            vertices,
        }
    }

    #[test]
    fn triangle_fills_inside_only() {
        let mut memory = LocalMemory::default();
        let tri = primitive(
            PrimitiveKind::Triangle,
            vec![vertex(0, 0), vertex(32, 0), vertex(0, 32)],
        );
        FlatRasterizer.draw(&tri, &env(), &mut memory);

        assert_eq!(memory.read_pixel(0, 1, 4, 4), RED);
        assert_eq!(memory.read_pixel(0, 1, 10, 10), RED);
        assert_eq!(memory.read_pixel(0, 1, 30, 30), 0);
        assert_eq!(memory.read_pixel(0, 1, 40, 2), 0);
    }

    #[test]
    fn winding_does_not_matter() {
        let mut memory = LocalMemory::default();
        let tri = primitive(
            PrimitiveKind::Triangle,
            vec![vertex(0, 32), vertex(32, 0), vertex(0, 0)],
        );
        FlatRasterizer.draw(&tri, &env(), &mut memory);
        assert_eq!(memory.read_pixel(0, 1, 4, 4), RED);
    }

    #[test]
    fn scissor_clips() {
        let mut memory = LocalMemory::default();
        let mut env = env();
        env.scissor.x1 = 7;
        let sprite = primitive(PrimitiveKind::Sprite, vec![vertex(0, 0), vertex(16, 16)]);
        FlatRasterizer.draw(&sprite, &env, &mut memory);

        assert_eq!(memory.read_pixel(0, 1, 7, 15), RED);
        assert_eq!(memory.read_pixel(0, 1, 8, 0), 0);
        assert_eq!(memory.read_pixel(0, 1, 0, 16), 0);
    }

    #[test]
    fn offset_moves_primitives() {
        let mut memory = LocalMemory::default();
        let mut env = env();
        env.offset = (100 << 4, 100 << 4);
        let point = primitive(PrimitiveKind::Point, vec![vertex(105, 103)]);
        FlatRasterizer.draw(&point, &env, &mut memory);
        assert_eq!(memory.read_pixel(0, 1, 5, 3), RED);
    }

    #[test]
    fn line_covers_both_ends() {
        let mut memory = LocalMemory::default();
        let line = primitive(PrimitiveKind::Line, vec![vertex(2, 2), vertex(12, 2)]);
        FlatRasterizer.draw(&line, &env(), &mut memory);
        for x in 2..=12 {
            assert_eq!(memory.read_pixel(0, 1, x, 2), RED);
        }
        assert_eq!(memory.read_pixel(0, 1, 13, 2), 0);
    }

    #[test]
    fn gouraud_blends_vertex_colors() {
        let mut memory = LocalMemory::default();
        let mut v0 = vertex(0, 0);
        let mut v1 = vertex(60, 0);
        let mut v2 = vertex(0, 60);
        v0.rgbaq.r = 0;
        v1.rgbaq.r = 0;
        v2.rgbaq.r = 0;
        v1.rgbaq.g = 255;

        let mut tri = primitive(PrimitiveKind::Triangle, vec![v0, v1, v2]);
        tri.gouraud = true;
        FlatRasterizer.draw(&tri, &env(), &mut memory);

        let near_v0 = memory.read_pixel(0, 1, 0, 0);
        let near_v1 = memory.read_pixel(0, 1, 55, 1);
        assert!((near_v0 >> 8) & 0xFF < 10);
        assert!((near_v1 >> 8) & 0xFF > 220);
    }
}
