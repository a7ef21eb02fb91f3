// Disc geometry and per-instance records
//
// The disc is a triangle fan stored as an indexed triangle list: 25 rim
// vertices on the unit circle plus one center vertex.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

/// Number of vertices on the rim of the disc
pub const RIM_VERTICES: usize = 25;
/// Rim vertices plus the center
pub const VERTEX_COUNT: usize = RIM_VERTICES + 1;
/// Index of the center vertex
pub const CENTER_INDEX: u32 = RIM_VERTICES as u32;
/// One triangle per rim edge
pub const INDEX_COUNT: usize = RIM_VERTICES * 3;

/// Per-instance data read at vertex binding 1.
///
/// Layout is three tightly packed `f32`s, matching the
/// `R32G32B32_SFLOAT` attribute of the pipeline.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct InstanceRecord {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

impl InstanceRecord {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn new(x: f32, y: f32, radius: f32) -> Self {
        Self { x, y, radius }
    }
}

/// Static disc mesh shared by every draw
#[derive(Clone, Debug, PartialEq)]
pub struct GeometryAsset {
    vertices: [Vec2; VERTEX_COUNT],
    indices: [u32; INDEX_COUNT],
}

impl GeometryAsset {
    /// Build the unit disc: rim vertex `i` sits at angle `2πi/25`
    pub fn disc() -> Self {
        let mut vertices = [Vec2::ZERO; VERTEX_COUNT];
        for (i, vertex) in vertices.iter_mut().take(RIM_VERTICES).enumerate() {
            let angle = std::f32::consts::TAU * i as f32 / RIM_VERTICES as f32;
            *vertex = Vec2::new(angle.cos(), angle.sin());
        }

        let mut indices = [0u32; INDEX_COUNT];
        for (i, triangle) in indices.chunks_exact_mut(3).enumerate() {
            let i = i as u32;
            triangle[0] = i;
            triangle[1] = (i + 1) % RIM_VERTICES as u32;
            triangle[2] = CENTER_INDEX;
        }

        Self { vertices, indices }
    }

    #[cfg(test)]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    #[cfg(test)]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn index_count(&self) -> u32 {
        INDEX_COUNT as u32
    }

    /// Size of the vertex data in bytes
    pub const fn vertex_size() -> u64 {
        (VERTEX_COUNT * std::mem::size_of::<Vec2>()) as u64
    }

    /// Size of the index data in bytes
    pub const fn index_size() -> u64 {
        (INDEX_COUNT * std::mem::size_of::<u32>()) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_record_is_twelve_bytes() {
        assert_eq!(InstanceRecord::SIZE, 12);
        let record = InstanceRecord::new(0.5, -0.25, 0.1);
        let bytes: &[u8] = bytemuck::bytes_of(&record);
        assert_eq!(&bytes[0..4], &0.5f32.to_ne_bytes());
        assert_eq!(&bytes[4..8], &(-0.25f32).to_ne_bytes());
        assert_eq!(&bytes[8..12], &0.1f32.to_ne_bytes());
    }

    #[test]
    fn rim_vertices_lie_on_unit_circle() {
        let disc = GeometryAsset::disc();
        assert_eq!(disc.vertices().len(), 26);
        for (i, v) in disc.vertices().iter().take(RIM_VERTICES).enumerate() {
            let angle = 2.0 * std::f32::consts::PI * i as f32 / 25.0;
            assert!((v.x - angle.cos()).abs() < 1e-6);
            assert!((v.y - angle.sin()).abs() < 1e-6);
            assert!((v.length() - 1.0).abs() < 1e-5);
        }
        assert_eq!(disc.vertices()[25], Vec2::ZERO);
    }

    #[test]
    fn indices_fan_around_center() {
        let disc = GeometryAsset::disc();
        assert_eq!(disc.index_count(), 75);
        for (i, tri) in disc.indices().chunks(3).enumerate() {
            let i = i as u32;
            assert_eq!(tri, &[i, (i + 1) % 25, 25]);
        }
        assert!(disc.indices().iter().all(|&idx| (idx as usize) < VERTEX_COUNT));
    }

    #[test]
    fn byte_views_match_declared_sizes() {
        let disc = GeometryAsset::disc();
        assert_eq!(disc.vertex_bytes().len() as u64, GeometryAsset::vertex_size());
        assert_eq!(disc.index_bytes().len() as u64, GeometryAsset::index_size());
        assert_eq!(GeometryAsset::vertex_size(), 208);
        assert_eq!(GeometryAsset::index_size(), 300);
    }
}
