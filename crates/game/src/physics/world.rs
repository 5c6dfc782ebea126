use glam::{Quat, Vec3};
use rapier3d::prelude::*;

use super::Transform;

pub const GRAVITY: f32 = -9.81;

pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    gravity: Vector,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    const TICK_RATE: Real = 1.0 / 60.0;

    pub fn new() -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = Self::TICK_RATE;
        integration_parameters.min_ccd_dt = Self::TICK_RATE / 100.0;

        Self {
            pipeline: PhysicsPipeline::new(),
            integration_parameters,
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity: Vector::new(0.0, GRAVITY, 0.0),
        }
    }

    /// Advances every body by exactly `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        if self.integration_parameters.dt != dt {
            self.integration_parameters.dt = dt;
            self.integration_parameters.min_ccd_dt = dt / 100.0;
        }

        self.pipeline.step(
            self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &(),
        );
    }

    pub fn add_player(
        &mut self,
        position: Vec3,
        half_extents: Vec3,
        mass: Real,
    ) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(Vector::new(position.x, position.y, position.z))
            .lock_rotations()
            .ccd_enabled(true)
            .build();

        let handle = self.bodies.insert(body);

        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .mass(mass)
            .friction(0.5)
            .build();

        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        handle
    }

    pub fn add_static_box(&mut self, position: Vec3, half_extents: Vec3) -> ColliderHandle {
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .translation(Vector::new(position.x, position.y, position.z))
            .build();
        self.colliders.insert(collider)
    }

    /// Adds a force at the centre of mass, applied over the following steps
    /// until `clear_forces` is called.
    pub fn apply_force(&mut self, handle: RigidBodyHandle, force: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.add_force(Vector::new(force.x, force.y, force.z), true);
        }
    }

    pub fn clear_forces(&mut self) {
        for (_, body) in self.bodies.iter_mut() {
            body.reset_forces(false);
        }
    }

    pub fn set_body_pose(&mut self, handle: RigidBodyHandle, position: Vec3, rotation: Quat) {
        if let Some(body) = self.bodies.get_mut(handle) {
            let rot =
                Rotation::from_xyzw(rotation.x, rotation.y, rotation.z, rotation.w).normalize();
            let new_pose = Pose::from_parts(Vector::new(position.x, position.y, position.z), rot);
            body.set_position(new_pose, true);
        }
    }

    pub fn set_body_velocity(&mut self, handle: RigidBodyHandle, velocity: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_linvel(Vector::new(velocity.x, velocity.y, velocity.z), true);
        }
    }

    /// Teleports a body and zeroes its motion.
    pub fn reset_body(&mut self, handle: RigidBodyHandle, position: Vec3) {
        self.set_body_pose(handle, position, Quat::IDENTITY);
        self.set_body_velocity(handle, Vec3::ZERO);
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_angvel(Vector::new(0.0, 0.0, 0.0), true);
            body.reset_forces(true);
        }
    }

    pub fn body_position(&self, handle: RigidBodyHandle) -> Option<Vec3> {
        self.bodies.get(handle).map(|b| {
            let t = b.translation();
            Vec3::new(t.x, t.y, t.z)
        })
    }

    pub fn body_transform(&self, handle: RigidBodyHandle) -> Option<Transform> {
        self.bodies.get(handle).map(|b| {
            let t = b.translation();
            let r = b.rotation();
            Transform::from_pose(
                Vec3::new(t.x, t.y, t.z),
                Quat::from_xyzw(r.x, r.y, r.z, r.w),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_falls_under_gravity() {
        let mut physics = PhysicsWorld::new();
        let handle = physics.add_player(Vec3::new(0.0, 10.0, 0.0), Vec3::splat(0.5), 1.0);

        for _ in 0..30 {
            physics.step(1.0 / 60.0);
        }

        let position = physics.body_position(handle).unwrap();
        assert!(position.y < 10.0);
    }

    #[test]
    fn ground_stops_fall() {
        let mut physics = PhysicsWorld::new();
        physics.add_static_box(Vec3::new(0.0, -0.5, 0.0), Vec3::new(50.0, 0.5, 50.0));
        let handle = physics.add_player(Vec3::new(0.0, 2.0, 0.0), Vec3::splat(0.5), 1.0);

        for _ in 0..240 {
            physics.step(1.0 / 60.0);
        }

        let position = physics.body_position(handle).unwrap();
        assert!(position.y > 0.0 && position.y < 1.5);
    }

    #[test]
    fn force_moves_body_along_axis() {
        let mut physics = PhysicsWorld::new();
        let handle = physics.add_player(Vec3::ZERO, Vec3::splat(0.5), 1.0);

        physics.apply_force(handle, Vec3::new(0.0, 0.0, 50.0));
        for _ in 0..10 {
            physics.step(1.0 / 60.0);
        }
        physics.clear_forces();

        let position = physics.body_position(handle).unwrap();
        assert!(position.z > 0.0);
        assert!(position.x.abs() < 1e-4);
        assert!(position.y < 0.0);
    }

    #[test]
    fn reset_body_teleports_and_stops() {
        let mut physics = PhysicsWorld::new();
        let handle = physics.add_player(Vec3::ZERO, Vec3::splat(0.5), 1.0);
        physics.set_body_velocity(handle, Vec3::new(3.0, 0.0, 0.0));

        physics.reset_body(handle, Vec3::new(5.0, 1.0, -2.0));

        let transform = physics.body_transform(handle).unwrap();
        assert!((transform.position - Vec3::new(5.0, 1.0, -2.0)).length() < 1e-5);

        physics.step(1.0 / 60.0);
        let position = physics.body_position(handle).unwrap();
        assert!((position.x - 5.0).abs() < 1e-3);
    }
}
