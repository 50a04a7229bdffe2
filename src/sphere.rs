use std::f32::consts::{PI, TAU};

use eframe::egui::{self, epaint::Vertex, pos2, Color32, Mesh, Pos2, Rect, Stroke, TextureId};
use glam::{Mat3, Vec3};

pub const SLICES: u32 = 100;
pub const STACKS: u32 = 50;
pub const FOV_Y: f32 = 90.0;
const RADIUS: f32 = 50.0;
const NEAR: f32 = 0.1;
const GRID_LINES: usize = 10;

// Zenith on -Z, image centre column on -Y, image right towards +X.
pub struct Sphere {
    directions: Vec<Vec3>,
    uvs: Vec<Pos2>,
    indices: Vec<u32>,
}

impl Sphere {
    pub fn new(slices: u32, stacks: u32) -> Self {
        let ring = slices + 1;
        let mut directions = Vec::with_capacity((ring * (stacks + 1)) as usize);
        let mut uvs = Vec::with_capacity(directions.capacity());
        for stack in 0..=stacks {
            let v = stack as f32 / stacks as f32;
            let lat = (0.5 - v) * PI;
            for slice in 0..=slices {
                let u = slice as f32 / slices as f32;
                let lon = (u - 0.5) * TAU;
                directions.push(Vec3::new(
                    lat.cos() * lon.sin(),
                    -lat.cos() * lon.cos(),
                    -lat.sin(),
                ));
                uvs.push(pos2(u, v));
            }
        }

        let mut indices = Vec::with_capacity((slices * stacks * 6) as usize);
        for stack in 0..stacks {
            for slice in 0..slices {
                let a = stack * ring + slice;
                let b = a + ring;
                indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
            }
        }

        Self { directions, uvs, indices }
    }

    pub fn mesh(&self, rotation: Mat3, rect: Rect, texture: TextureId) -> Mesh {
        let focal = rect.height() * 0.5 / (FOV_Y.to_radians() * 0.5).tan();
        let center = rect.center();
        let projected: Vec<Option<Pos2>> = self
            .directions
            .iter()
            .map(|d| project(rotation * (*d * RADIUS), center, focal))
            .collect();

        // Seen from the centre no two kept triangles overlap, so draw order is free.
        let mut mesh = Mesh::with_texture(texture);
        mesh.vertices.reserve(projected.len());
        for (pos, uv) in projected.iter().zip(&self.uvs) {
            mesh.vertices.push(Vertex {
                pos: pos.unwrap_or(center),
                uv: *uv,
                color: Color32::WHITE,
            });
        }
        for tri in self.indices.chunks_exact(3) {
            if tri.iter().all(|&i| projected[i as usize].is_some()) {
                mesh.add_triangle(tri[0], tri[1], tri[2]);
            }
        }
        mesh
    }
}

impl Default for Sphere {
    fn default() -> Self {
        Sphere::new(SLICES, STACKS)
    }
}

fn project(p: Vec3, center: Pos2, focal: f32) -> Option<Pos2> {
    if p.z > -NEAR {
        return None;
    }
    let scale = focal / -p.z;
    Some(pos2(center.x + p.x * scale, center.y - p.y * scale))
}

pub fn grid_lines(rect: Rect) -> Vec<([Pos2; 2], Color32)> {
    let mut lines = Vec::with_capacity(GRID_LINES * 2);
    for i in 0..GRID_LINES {
        let color = if i == GRID_LINES / 2 { Color32::RED } else { Color32::WHITE };
        let t = i as f32 / GRID_LINES as f32;
        let y = rect.bottom() - t * rect.height();
        let x = rect.left() + t * rect.width();
        lines.push(([pos2(rect.left(), y), pos2(rect.right(), y)], color));
        lines.push(([pos2(x, rect.top()), pos2(x, rect.bottom())], color));
    }
    lines
}

pub fn paint_grid(painter: &egui::Painter, rect: Rect) {
    for (points, color) in grid_lines(rect) {
        painter.line_segment(points, Stroke::new(1.0, color));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orientation::{Command, Orientation};

    fn viewport() -> Rect {
        Rect::from_min_size(pos2(0.0, 0.0), egui::vec2(800.0, 600.0))
    }

    #[test]
    fn test_tessellation_sizes() {
        let sphere = Sphere::new(SLICES, STACKS);
        assert_eq!(sphere.directions.len(), 101 * 51);
        assert_eq!(sphere.uvs.len(), sphere.directions.len());
        assert_eq!(sphere.indices.len(), (100 * 50 * 6) as usize);
        assert!(sphere.directions.iter().all(|d| (d.length() - 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_image_centre_projects_to_screen_centre() {
        let sphere = Sphere::new(4, 2);
        let rotation = Orientation::default().rotation();
        let mesh = sphere.mesh(rotation, viewport(), TextureId::default());

        // Middle stack, middle slice: u = v = 0.5.
        let centre = mesh
            .vertices
            .iter()
            .find(|v| v.uv == pos2(0.5, 0.5))
            .unwrap();
        assert!((centre.pos - viewport().center()).length() < 1e-3);
    }

    #[test]
    fn test_top_of_image_projects_upwards() {
        let rotation = Orientation::default().rotation();
        let focal = 300.0;
        let above = Vec3::new(0.0, -1.0, -0.2).normalize() * RADIUS;
        let pos = project(rotation * above, pos2(400.0, 300.0), focal).unwrap();
        assert!(pos.y < 300.0);
        assert!((pos.x - 400.0).abs() < 1e-3);
    }

    #[test]
    fn test_behind_camera_is_culled() {
        let sphere = Sphere::default();
        let rotation = Orientation::default().rotation();
        let mesh = sphere.mesh(rotation, viewport(), TextureId::default());
        let total = sphere.indices.len();
        assert!(!mesh.indices.is_empty());
        assert!(mesh.indices.len() < total * 3 / 4);
        assert!(mesh.is_valid());

        // Everything kept lies in front of the near plane.
        for &i in &mesh.indices {
            let p = rotation * (sphere.directions[i as usize] * RADIUS);
            assert!(p.z <= -NEAR);
        }
    }

    #[test]
    fn test_snapping_turns_view() {
        let sphere = Sphere::new(8, 4);
        let mut o = Orientation::default();
        o.apply(Command::SnapRight);
        let mesh = sphere.mesh(o.rotation(), viewport(), TextureId::default());
        // A quarter turn to the right leaves the image centre off-screen.
        let centre_visible = mesh
            .indices
            .iter()
            .any(|&i| mesh.vertices[i as usize].uv == pos2(0.5, 0.5));
        assert!(!centre_visible);
    }

    #[test]
    fn test_grid_lines() {
        let rect = viewport();
        let lines = grid_lines(rect);
        assert_eq!(lines.len(), 20);
        let red: Vec<_> = lines.iter().filter(|(_, c)| *c == Color32::RED).collect();
        assert_eq!(red.len(), 2);
        for ([a, b], _) in red {
            let mid = pos2((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
            assert!((mid - rect.center()).length() < 1e-3);
        }
    }
}
