pub mod aabb;
pub mod cover;
pub mod mesh;
pub mod obstacles;
pub mod path;
pub mod tactical;
pub mod world;

#[cfg(test)]
mod tests;

pub use cover::CoverPoint;
pub use mesh::{NavigationLevel, NavigationMesh, SurfaceType};
pub use obstacles::{DestructibleModification, DynamicObstacle};
pub use path::PathResult;
pub use tactical::{TacticalPosition, TacticalType};
pub use world::{Entity, World};
