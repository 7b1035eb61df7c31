/// Cosmos - the entity registry the renderer reads every frame
///
/// Wraps a `hecs::World` with the main camera selection and the frame's
/// delta time. Components: `Transform`, `StandardCamera`, `DLight`,
/// `SLight`, `MdlActorStatic`, `MdlActorSkinned`.
///
/// Frame tasks borrow components dynamically from a shared `&World`. Tasks
/// running in parallel touch disjoint component sets as long as a light
/// entity does not also carry a model actor.

pub mod transform;
pub mod camera;
pub mod light;
pub mod model_actor;

pub use transform::*;
pub use camera::*;
pub use light::*;
pub use model_actor::*;

use hecs::{Entity, World};

pub struct Cosmos {
    world: World,
    main_camera: Option<Entity>,
    dt: f64,
}

impl Cosmos {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            main_camera: None,
            dt: 0.0,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Entity whose `StandardCamera` + `Transform` drive the view
    pub fn main_camera(&self) -> Option<Entity> {
        self.main_camera
    }

    pub fn set_main_camera(&mut self, entity: Option<Entity>) {
        self.main_camera = entity;
    }

    /// Spawn a camera entity and make it the main camera
    pub fn spawn_camera(&mut self, camera: StandardCamera, tform: Transform) -> Entity {
        let entity = self.world.spawn((camera, tform));
        self.main_camera = Some(entity);
        entity
    }

    /// Seconds elapsed since the previous frame
    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn set_dt(&mut self, dt: f64) {
        self.dt = dt;
    }
}

impl Default for Cosmos {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "cosmos_tests.rs"]
mod tests;
