/// Debug geometry accumulated during a frame
///
/// Any task may append through `&self`; the renderer clears it once per
/// frame after submitting.

use std::sync::{Arc, Mutex};
use glam::{DMat4, Vec3, Vec4};
use crate::model::RenderUnit;

const DEFAULT_COLOR: Vec4 = Vec4::new(1.0, 0.0, 0.0, 0.5);

/// Triangle already in clip space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugTriangle {
    pub vertices: [Vec4; 3],
    pub color: Vec4,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugTriangleWorld {
    pub vertices: [Vec3; 3],
    pub color: Vec4,
}

#[derive(Clone)]
pub struct DebugMeshActor {
    pub unit: Arc<RenderUnit>,
    pub model_mat: DMat4,
}

#[derive(Default)]
struct DebugLists {
    tri: Vec<DebugTriangle>,
    tri_world: Vec<DebugTriangleWorld>,
    meshes: Vec<DebugMeshActor>,
}

#[derive(Default)]
pub struct DebugRender {
    lists: Mutex<DebugLists>,
}

impl DebugRender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tri(&self, p0: Vec4, p1: Vec4, p2: Vec4) {
        self.add_tri_colored(p0, p1, p2, DEFAULT_COLOR);
    }

    pub fn add_tri_colored(&self, p0: Vec4, p1: Vec4, p2: Vec4, color: Vec4) {
        if let Ok(mut lists) = self.lists.lock() {
            lists.tri.push(DebugTriangle { vertices: [p0, p1, p2], color });
        }
    }

    /// World-space triangle
    pub fn tri(&self, p0: Vec3, p1: Vec3, p2: Vec3, color: Vec4) {
        if let Ok(mut lists) = self.lists.lock() {
            lists.tri_world.push(DebugTriangleWorld { vertices: [p0, p1, p2], color });
        }
    }

    pub fn mesh(&self, unit: Arc<RenderUnit>, model_mat: DMat4) {
        if let Ok(mut lists) = self.lists.lock() {
            lists.meshes.push(DebugMeshActor { unit, model_mat });
        }
    }

    pub fn clear(&self) {
        if let Ok(mut lists) = self.lists.lock() {
            lists.tri.clear();
            lists.tri_world.clear();
            lists.meshes.clear();
        }
    }

    pub fn triangles(&self) -> Vec<DebugTriangle> {
        self.lists.lock().map(|l| l.tri.clone()).unwrap_or_default()
    }

    pub fn world_triangles(&self) -> Vec<DebugTriangleWorld> {
        self.lists.lock().map(|l| l.tri_world.clone()).unwrap_or_default()
    }

    pub fn meshes(&self) -> Vec<DebugMeshActor> {
        self.lists.lock().map(|l| l.meshes.clone()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.lists
            .lock()
            .map(|l| l.tri.is_empty() && l.tri_world.is_empty() && l.meshes.is_empty())
            .unwrap_or(true)
    }
}
