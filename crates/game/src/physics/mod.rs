mod transform;
mod world;

pub use transform::Transform;
pub use world::{GRAVITY, PhysicsWorld};

pub use rapier3d::dynamics::RigidBodyHandle;
