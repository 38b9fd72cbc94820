//! Tessellated plane the shader backends draw the field onto.

use bytemuck::{Pod, Zeroable};

use crate::error::GeometryError;

/// Position of one plane vertex in local space, each axis in `[-0.5, 0.5]`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Zeroable, Pod)]
pub struct PlaneVertex {
    pub position: [f32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    /// Six vertices per cell, two explicit triangles.
    TriangleList,
    /// Four vertices per cell in strip order.
    TriangleStrip,
}

impl Topology {
    pub fn vertices_per_cell(self) -> usize {
        match self {
            Topology::TriangleList => 6,
            Topology::TriangleStrip => 4,
        }
    }

    pub fn to_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            Topology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
            Topology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: wgpu::VertexFormat,
    pub offset: u64,
}

/// Stride and attribute table describing [`PlaneVertex`] in a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLayout {
    pub stride: u64,
    pub attributes: &'static [VertexAttribute],
}

const PLANE_ATTRIBUTES: [VertexAttribute; 1] = [VertexAttribute {
    location: 0,
    format: wgpu::VertexFormat::Float32x2,
    offset: 0,
}];

const PLANE_WGPU_ATTRIBUTES: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    offset: 0,
    shader_location: 0,
    format: wgpu::VertexFormat::Float32x2,
}];

impl BufferLayout {
    pub const PLANE: BufferLayout = BufferLayout {
        stride: std::mem::size_of::<PlaneVertex>() as u64,
        attributes: &PLANE_ATTRIBUTES,
    };

    pub fn to_wgpu(&self) -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: self.stride as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &PLANE_WGPU_ATTRIBUTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaneMesh {
    vertices: Vec<PlaneVertex>,
    topology: Topology,
    resolution: u32,
}

impl PlaneMesh {
    /// Tessellates a `width` x `height` rectangle into `resolution` squared
    /// cells.
    ///
    /// The dimensions are validated but do not leak into the output: positions
    /// are normalised so the plane always spans `[-0.5, 0.5]` on both axes.
    pub fn new(
        width: f32,
        height: f32,
        resolution: u32,
        topology: Topology,
    ) -> Result<Self, GeometryError> {
        if resolution == 0 {
            return Err(GeometryError::InvalidGeometryParameters(
                "resolution must be at least 1".to_string(),
            ));
        }
        if !(width.is_finite() && width > 0.0 && height.is_finite() && height > 0.0) {
            return Err(GeometryError::InvalidGeometryParameters(format!(
                "plane size must be positive, got {width}x{height}"
            )));
        }

        // Stepping in pixels and dividing by the size again cancels out, so the
        // normalised lattice is computed from cell indices directly.
        let cells_per_axis = resolution as f32;
        let normalize = |column: u32, row: u32| PlaneVertex {
            position: [
                column as f32 / cells_per_axis - 0.5,
                row as f32 / cells_per_axis - 0.5,
            ],
        };

        let cells = (resolution as usize) * (resolution as usize);
        let mut vertices = Vec::with_capacity(cells * topology.vertices_per_cell());
        for column in 0..resolution {
            for row in 0..resolution {
                let v00 = normalize(column, row);
                let v10 = normalize(column + 1, row);
                let v01 = normalize(column, row + 1);
                let v11 = normalize(column + 1, row + 1);
                match topology {
                    Topology::TriangleStrip => vertices.extend([v00, v10, v01, v11]),
                    Topology::TriangleList => vertices.extend([v00, v10, v01, v01, v10, v11]),
                }
            }
        }

        Ok(Self {
            vertices,
            topology,
            resolution,
        })
    }

    /// Single cell covering the whole plane.
    pub fn quad(topology: Topology) -> Self {
        let corners = [[-0.5, -0.5], [0.5, -0.5], [-0.5, 0.5], [0.5, 0.5]];
        let vertex = |index: usize| PlaneVertex {
            position: corners[index],
        };
        let vertices = match topology {
            Topology::TriangleStrip => (0..4).map(vertex).collect(),
            Topology::TriangleList => [0, 1, 2, 2, 1, 3].into_iter().map(vertex).collect(),
        };
        Self {
            vertices,
            topology,
            resolution: 1,
        }
    }

    pub fn vertices(&self) -> &[PlaneVertex] {
        &self.vertices
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn layout(&self) -> BufferLayout {
        BufferLayout::PLANE
    }

    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}
