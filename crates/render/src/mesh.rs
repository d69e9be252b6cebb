use glam::Vec3;
use pixelgrid_kernel::Shape;

/// Vertex with a flat-shading normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshVertex {
    pub position: Vec3,
    pub normal: Vec3,
}

/// Triangle list with counter-clockwise front faces.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u16>,
}

impl MeshData {
    pub fn for_shape(shape: &Shape) -> Self {
        match *shape {
            Shape::Cuboid {
                width,
                height,
                depth,
            } => Self::cuboid(width, height, depth),
            Shape::Plane { size } => Self::plane(size),
            Shape::Icosahedron { radius } => Self::icosahedron(radius),
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Box centered on the origin, four vertices per face.
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        let (x, y, z) = (width / 2.0, height / 2.0, depth / 2.0);
        #[rustfmt::skip]
        let faces: [(Vec3, [Vec3; 4]); 6] = [
            (Vec3::Z,     [Vec3::new(-x, -y,  z), Vec3::new( x, -y,  z), Vec3::new( x,  y,  z), Vec3::new(-x,  y,  z)]),
            (Vec3::NEG_Z, [Vec3::new( x, -y, -z), Vec3::new(-x, -y, -z), Vec3::new(-x,  y, -z), Vec3::new( x,  y, -z)]),
            (Vec3::X,     [Vec3::new( x, -y,  z), Vec3::new( x, -y, -z), Vec3::new( x,  y, -z), Vec3::new( x,  y,  z)]),
            (Vec3::NEG_X, [Vec3::new(-x, -y, -z), Vec3::new(-x, -y,  z), Vec3::new(-x,  y,  z), Vec3::new(-x,  y, -z)]),
            (Vec3::Y,     [Vec3::new(-x,  y,  z), Vec3::new( x,  y,  z), Vec3::new( x,  y, -z), Vec3::new(-x,  y, -z)]),
            (Vec3::NEG_Y, [Vec3::new(-x, -y, -z), Vec3::new( x, -y, -z), Vec3::new( x, -y,  z), Vec3::new(-x, -y,  z)]),
        ];
        let mut mesh = Self::default();
        for (normal, corners) in faces {
            mesh.push_quad(normal, corners);
        }
        mesh
    }

    /// Square in the XY plane facing +Z.
    pub fn plane(size: f32) -> Self {
        let h = size / 2.0;
        let mut mesh = Self::default();
        mesh.push_quad(
            Vec3::Z,
            [
                Vec3::new(-h, -h, 0.0),
                Vec3::new(h, -h, 0.0),
                Vec3::new(h, h, 0.0),
                Vec3::new(-h, h, 0.0),
            ],
        );
        mesh
    }

    /// Regular icosahedron with unshared vertices so every face is flat.
    pub fn icosahedron(radius: f32) -> Self {
        let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
        let corners = [
            Vec3::new(-1.0, t, 0.0),
            Vec3::new(1.0, t, 0.0),
            Vec3::new(-1.0, -t, 0.0),
            Vec3::new(1.0, -t, 0.0),
            Vec3::new(0.0, -1.0, t),
            Vec3::new(0.0, 1.0, t),
            Vec3::new(0.0, -1.0, -t),
            Vec3::new(0.0, 1.0, -t),
            Vec3::new(t, 0.0, -1.0),
            Vec3::new(t, 0.0, 1.0),
            Vec3::new(-t, 0.0, -1.0),
            Vec3::new(-t, 0.0, 1.0),
        ]
        .map(|c| c.normalize() * radius);
        #[rustfmt::skip]
        let faces: [[usize; 3]; 20] = [
            [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
            [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
            [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
            [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
        ];
        let mut mesh = Self::default();
        for [a, b, c] in faces {
            let (mut a, mut b, c) = (corners[a], corners[b], corners[c]);
            let mut normal = (b - a).cross(c - a).normalize();
            if normal.dot(a + b + c) < 0.0 {
                std::mem::swap(&mut a, &mut b);
                normal = -normal;
            }
            mesh.push_triangle(normal, [a, b, c]);
        }
        mesh
    }

    fn push_quad(&mut self, normal: Vec3, corners: [Vec3; 4]) {
        let base = self.vertices.len() as u16;
        self.vertices.extend(
            corners
                .iter()
                .map(|&position| MeshVertex { position, normal }),
        );
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    fn push_triangle(&mut self, normal: Vec3, corners: [Vec3; 3]) {
        let base = self.vertices.len() as u16;
        self.vertices.extend(
            corners
                .iter()
                .map(|&position| MeshVertex { position, normal }),
        );
        self.indices.extend_from_slice(&[base, base + 1, base + 2]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_outward_ccw(mesh: &MeshData) {
        for tri in mesh.indices.chunks_exact(3) {
            let [a, b, c] = [0, 1, 2].map(|k| mesh.vertices[tri[k] as usize]);
            let winding = (b.position - a.position).cross(c.position - a.position);
            assert!(winding.dot(a.normal) > 0.0, "face winding disagrees with normal");
        }
    }

    #[test]
    fn cuboid_has_twelve_outward_triangles() {
        let mesh = MeshData::cuboid(0.3, 0.8, 0.3);
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.vertices.len(), 24);
        assert_outward_ccw(&mesh);
        for v in &mesh.vertices {
            assert!((v.position.y.abs() - 0.4).abs() < 1e-6);
        }
    }

    #[test]
    fn plane_faces_positive_z() {
        let mesh = MeshData::plane(2.0);
        assert_eq!(mesh.triangle_count(), 2);
        assert_outward_ccw(&mesh);
        assert!(mesh.vertices.iter().all(|v| v.normal == Vec3::Z));
    }

    #[test]
    fn icosahedron_is_flat_shaded_and_on_sphere() {
        let mesh = MeshData::icosahedron(0.2);
        assert_eq!(mesh.triangle_count(), 20);
        assert_eq!(mesh.vertices.len(), 60);
        assert_outward_ccw(&mesh);
        for v in &mesh.vertices {
            assert!((v.position.length() - 0.2).abs() < 1e-5);
            assert!(v.normal.dot(v.position) > 0.0);
        }
    }

    #[test]
    fn for_shape_dispatches() {
        let mesh = MeshData::for_shape(&Shape::Plane { size: 1.0 });
        assert_eq!(mesh.triangle_count(), 2);
    }
}
