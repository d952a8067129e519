//! Compute kernels run by [`SoftwareDevice`](super::SoftwareDevice), one
//! loop iteration per GPU thread.

use super::super::command::COPY_THREADGROUP;
use super::super::types::{INDICES_PER_QUAD, QuadVertex, VERTICES_PER_QUAD};
use super::surface::SurfaceBuffer;
use crate::geometry::CameraTransform;
use crate::stroke::Quad;

/// Quad expansion kernel body for thread `index`.
fn expand_quad(
    index: usize,
    quad: &Quad,
    transform: &CameraTransform,
    opaque: bool,
    vertices: &mut [QuadVertex],
    indices: &mut [u32],
) {
    let color = if opaque {
        quad.color.with_alpha(1.0)
    } else {
        quad.color
    };
    let premultiplied = color.premultiplied();
    let base = index * VERTICES_PER_QUAD;
    for (corner, point) in quad.corners().iter().enumerate() {
        let view = transform.apply(*point);
        vertices[base + corner] = QuadVertex {
            position: [view.x as f32, view.y as f32],
            color: premultiplied,
            round: quad.shape.is_round(),
        };
    }
    let first = base as u32;
    let out = &mut indices[index * INDICES_PER_QUAD..(index + 1) * INDICES_PER_QUAD];
    out.copy_from_slice(&[first, first + 1, first + 2, first, first + 2, first + 3]);
}

/// Expands `quads` into vertex and index storage, one quad per thread.
pub(super) fn expand_quads(
    quads: &[Quad],
    transform: &CameraTransform,
    opaque: bool,
    vertices: &mut Vec<QuadVertex>,
    indices: &mut Vec<u32>,
) {
    let blank = QuadVertex {
        position: [0.0; 2],
        color: [0.0; 4],
        round: false,
    };
    vertices.clear();
    vertices.resize(quads.len() * VERTICES_PER_QUAD, blank);
    indices.clear();
    indices.resize(quads.len() * INDICES_PER_QUAD, 0);
    for (thread, quad) in quads.iter().enumerate() {
        expand_quad(thread, quad, transform, opaque, vertices, indices);
    }
}

/// Copies `source` into `destination` in square threadgroups.
pub(super) fn copy_texture(source: &SurfaceBuffer, destination: &mut SurfaceBuffer) {
    let extent = source.extent();
    let width = extent.width as usize;
    let groups_x = extent.width.div_ceil(COPY_THREADGROUP);
    let groups_y = extent.height.div_ceil(COPY_THREADGROUP);
    for gy in 0..groups_y {
        for gx in 0..groups_x {
            for ty in 0..COPY_THREADGROUP {
                for tx in 0..COPY_THREADGROUP {
                    let x = gx * COPY_THREADGROUP + tx;
                    let y = gy * COPY_THREADGROUP + ty;
                    if x >= extent.width || y >= extent.height {
                        continue;
                    }
                    destination.copy_pixel(source, y as usize * width + x as usize);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::RED;
    use crate::geometry::{Extent, Point};
    use crate::gpu::Bitmap;
    use crate::stroke::QuadShape;

    #[test]
    fn expansion_writes_four_vertices_and_six_indices_per_quad() {
        let quads = vec![
            Quad::new(Point::new(5.0, 5.0), 4.0, 0.0, QuadShape::Squared, RED),
            Quad::new(Point::new(9.0, 5.0), 2.0, 0.0, QuadShape::Rounded, RED),
        ];
        let (mut vertices, mut indices) = (Vec::new(), Vec::new());
        expand_quads(
            &quads,
            &CameraTransform::IDENTITY,
            false,
            &mut vertices,
            &mut indices,
        );
        assert_eq!(vertices.len(), 8);
        assert_eq!(indices, vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7]);
        assert_eq!(vertices[0].position, [3.0, 3.0]);
        assert!(vertices[4].round);
    }

    #[test]
    fn opaque_expansion_drops_alpha() {
        let quads = vec![Quad::new(
            Point::new(5.0, 5.0),
            4.0,
            0.0,
            QuadShape::Squared,
            RED.with_alpha(0.5),
        )];
        let (mut vertices, mut indices) = (Vec::new(), Vec::new());
        expand_quads(
            &quads,
            &CameraTransform::IDENTITY,
            true,
            &mut vertices,
            &mut indices,
        );
        assert_eq!(vertices[0].color, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn copy_handles_partial_threadgroups() {
        let extent = Extent::new(17, 3);
        let source = SurfaceBuffer::from_bitmap(&Bitmap::filled(extent, RED));
        let mut destination = SurfaceBuffer::new(extent);
        copy_texture(&source, &mut destination);
        assert_eq!(source, destination);
    }
}
