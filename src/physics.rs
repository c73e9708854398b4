use nalgebra::{Isometry3, Point3, Translation3, Unit, UnitQuaternion};
use rapier3d::control::{CharacterLength, KinematicCharacterController};
use rapier3d::parry::query::ShapeCastOptions;
use rapier3d::parry::shape::Capsule;
use rapier3d::prelude::*;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use crate::config::ControllerConfig;
use crate::controller::backend::{
    BodyActuator, CapsuleSpec, ClearanceQuery, MantleDetector, MantleQuery, MantleTarget,
};
use crate::controller::constants::physics as consts;
use crate::controller::ground_probe::{sensor_range, GroundProbe, GroundSample};
use crate::controller::math::{normalize_or_zero, Vec3};
use crate::error::ControllerError;

// Characters don't collide with each other, only with static geometry
const GROUP_STATIC: Group = Group::GROUP_1; // Walls, floors, obstacles
const GROUP_CHARACTER: Group = Group::GROUP_2; // Walker bodies

/// Collider shape of a level part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartShape {
    #[default]
    Block,
    /// Triangular prism: flat bottom, slope rises from +X to -X
    Wedge,
    Cylinder,
}

/// Builds a collider with the correct shape for a given part shape and size.
fn build_part_collider(size: [f32; 3], shape: PartShape, can_collide: bool) -> Collider {
    let [sx, sy, sz] = size;
    let shared_shape = match shape {
        PartShape::Block => SharedShape::cuboid(sx / 2.0, sy / 2.0, sz / 2.0),
        PartShape::Cylinder => SharedShape::cylinder(sy / 2.0, sx / 2.0),
        PartShape::Wedge => {
            let hx = sx / 2.0;
            let hy = sy / 2.0;
            let hz = sz / 2.0;
            let points = [
                point![-hx, -hy, -hz], // bottom-left-back
                point![hx, -hy, -hz],  // bottom-right-back
                point![-hx, -hy, hz],  // bottom-left-front
                point![hx, -hy, hz],   // bottom-right-front
                point![-hx, hy, -hz],  // top-left-back
                point![-hx, hy, hz],   // top-left-front
            ];
            SharedShape::convex_hull(&points)
                .unwrap_or_else(|| SharedShape::cuboid(hx, hy, hz))
        }
    };
    ColliderBuilder::new(shared_shape)
        .sensor(!can_collide)
        .collision_groups(InteractionGroups::new(GROUP_STATIC, Group::ALL))
        .build()
}

/// Body dimensions of a walker capsule. The collider is lifted by the step
/// height so the ground sensor covers the gap under it.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CapsuleDims {
    height: f32,
    radius: f32,
    step_height_ratio: f32,
}

impl CapsuleDims {
    fn step_height(&self) -> f32 {
        self.height * self.step_height_ratio
    }

    fn collider_height(&self) -> f32 {
        self.height - self.step_height()
    }

    fn collider_radius(&self) -> f32 {
        self.radius.min(self.collider_height() * 0.5)
    }

    fn half_segment(&self) -> f32 {
        (self.collider_height() * 0.5 - self.collider_radius()).max(0.0)
    }

    /// Collider center above the body origin.
    fn center_offset(&self) -> f32 {
        self.step_height() + self.collider_height() * 0.5
    }

    fn shape(&self) -> Capsule {
        Capsule::new_y(self.half_segment(), self.collider_radius())
    }

    fn collider(&self) -> Collider {
        ColliderBuilder::capsule_y(self.half_segment(), self.collider_radius())
            .translation(vector![0.0, self.center_offset(), 0.0])
            .collision_groups(InteractionGroups::new(GROUP_CHARACTER, GROUP_STATIC))
            .build()
    }
}

/// State for a walker body
pub struct CharacterControllerState {
    pub body_handle: RigidBodyHandle,
    pub collider_handle: ColliderHandle,
    /// Feet position
    pub position: Vec3,
    pub rotation: UnitQuaternion<f32>,
    pub velocity: Vec3,
    pub radius: f32,
    pub height: f32,
    pub step_height_ratio: f32,
    pub sensor_extension_ratio: f32,
    pub skin_width: f32,
    /// Degrees
    pub slope_limit: f32,
    pub extended_sensor: bool,
    /// Vertical correction that puts the feet on the sensed ground
    pub ground_adjustment: Option<f32>,
}

impl CharacterControllerState {
    fn dims(&self) -> CapsuleDims {
        CapsuleDims {
            height: self.height,
            radius: self.radius,
            step_height_ratio: self.step_height_ratio,
        }
    }

    fn up(&self) -> Vec3 {
        self.rotation * Vec3::y()
    }

    /// World pose of the (lifted) collider.
    fn collider_pose(&self) -> Isometry3<f32> {
        let center = self.position + self.up() * self.dims().center_offset();
        Isometry3::from_parts(Translation3::from(center), self.rotation)
    }

    fn query_filter(&self) -> QueryFilter<'static> {
        QueryFilter::default()
            .exclude_rigid_body(self.body_handle)
            .exclude_sensors()
            .groups(InteractionGroups::new(GROUP_CHARACTER, GROUP_STATIC))
    }
}

/// Result of one kinematic move.
#[derive(Debug, Clone, Default)]
pub struct MoveOutcome {
    /// Surface normals of everything touched, pointing toward the body
    pub contact_normals: Vec<Vec3>,
    pub translation: Vec3,
    pub grounded: bool,
}

/// Wrapper around a Rapier3D world holding static level geometry and walker bodies.
pub struct PhysicsWorld {
    pub gravity: Vector<Real>,
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    pub query_pipeline: QueryPipeline,

    /// Maps part ID to Rapier rigid body handle
    pub parts: HashMap<u64, RigidBodyHandle>,
    /// Walker bodies by character ID
    pub characters: HashMap<u64, CharacterControllerState>,
}

impl PhysicsWorld {
    /// Creates an empty world. Walkers integrate their own gravity; the world
    /// value only affects dynamic bodies.
    pub fn new() -> Self {
        Self {
            gravity: vector![0.0, 0.0, 0.0],
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            parts: HashMap::new(),
            characters: HashMap::new(),
        }
    }

    /// Steps the physics simulation forward by dt seconds
    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    /// Refreshes the query pipeline after geometry changes outside of `step`.
    pub fn update_queries(&mut self) {
        self.query_pipeline.update(&self.collider_set);
    }

    /// Adds a fixed part to the level
    pub fn add_part(
        &mut self,
        id: u64,
        position: [f32; 3],
        rotation: UnitQuaternion<f32>,
        size: [f32; 3],
        can_collide: bool,
        shape: PartShape,
    ) -> RigidBodyHandle {
        let body = RigidBodyBuilder::fixed()
            .translation(vector![position[0], position[1], position[2]])
            .rotation(rotation.scaled_axis())
            .build();
        let handle = self.rigid_body_set.insert(body);

        let collider = build_part_collider(size, shape, can_collide);
        self.collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);

        self.parts.insert(id, handle);
        handle
    }

    /// Removes a part from the level
    pub fn remove_part(&mut self, id: u64) -> bool {
        if let Some(handle) = self.parts.remove(&id) {
            self.rigid_body_set.remove(
                handle,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            );
            true
        } else {
            false
        }
    }

    pub fn has_part(&self, id: u64) -> bool {
        self.parts.contains_key(&id)
    }

    /// Adds a walker body with its feet at `position`, standing height from
    /// `config.body`.
    pub fn add_character(
        &mut self,
        id: u64,
        position: [f32; 3],
        config: &ControllerConfig,
    ) -> RigidBodyHandle {
        let position = Vec3::new(position[0], position[1], position[2]);
        let body = RigidBodyBuilder::kinematic_position_based()
            .translation(position)
            .build();
        let body_handle = self.rigid_body_set.insert(body);

        let dims = CapsuleDims {
            height: config.body.standing_height,
            radius: config.body.radius,
            step_height_ratio: config.ground.step_height_ratio,
        };
        let collider_handle =
            self.collider_set
                .insert_with_parent(dims.collider(), body_handle, &mut self.rigid_body_set);

        let state = CharacterControllerState {
            body_handle,
            collider_handle,
            position,
            rotation: UnitQuaternion::identity(),
            velocity: Vec3::zeros(),
            radius: config.body.radius,
            height: config.body.standing_height,
            step_height_ratio: config.ground.step_height_ratio,
            sensor_extension_ratio: config.ground.sensor_extension_ratio,
            skin_width: config.ground.skin_width,
            slope_limit: config.movement.slope_limit,
            extended_sensor: false,
            ground_adjustment: None,
        };
        self.characters.insert(id, state);
        body_handle
    }

    pub fn remove_character(&mut self, id: u64) -> bool {
        if let Some(state) = self.characters.remove(&id) {
            self.rigid_body_set.remove(
                state.body_handle,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            );
            true
        } else {
            false
        }
    }

    pub fn has_character(&self, id: u64) -> bool {
        self.characters.contains_key(&id)
    }

    pub fn character_position(&self, id: u64) -> Option<Vec3> {
        self.characters.get(&id).map(|c| c.position)
    }

    pub fn character_state(&self, id: u64) -> Option<&CharacterControllerState> {
        self.characters.get(&id)
    }

    /// Borrowed view of one walker body, implementing the controller seams.
    pub fn character_mut(&mut self, id: u64) -> Result<CharacterBody<'_>, ControllerError> {
        let character = self
            .characters
            .get_mut(&id)
            .ok_or(ControllerError::UnknownCharacter(id))?;
        Ok(CharacterBody {
            character,
            bodies: &mut self.rigid_body_set,
            colliders: &mut self.collider_set,
            islands: &mut self.island_manager,
            queries: &self.query_pipeline,
        })
    }

    /// Moves a walker by its velocity using the kinematic controller, plus the
    /// pending ground adjustment while the extended sensor is active.
    pub fn move_character(&mut self, id: u64, dt: f32) -> Result<MoveOutcome, ControllerError> {
        let character = self
            .characters
            .get_mut(&id)
            .ok_or(ControllerError::UnknownCharacter(id))?;

        let up = character.up();
        let mut desired = character.velocity * dt;
        if character.extended_sensor {
            if let Some(adjustment) = character.ground_adjustment {
                desired += up * adjustment;
            }
        }
        character.ground_adjustment = None;

        // The walker handles slopes itself; the controller only resolves collisions
        let slope_limit = character.slope_limit.to_radians();
        let controller = KinematicCharacterController {
            up: Unit::new_normalize(up),
            offset: CharacterLength::Absolute(consts::CONTROLLER_OFFSET),
            autostep: None,
            snap_to_ground: None,
            max_slope_climb_angle: slope_limit,
            min_slope_slide_angle: slope_limit,
            ..Default::default()
        };

        let shape = character.dims().shape();
        let pose = character.collider_pose();
        let filter = character.query_filter();
        let mut contact_normals = Vec::new();
        let movement = controller.move_shape(
            dt,
            &self.rigid_body_set,
            &self.collider_set,
            &self.query_pipeline,
            &shape,
            &pose,
            desired,
            filter,
            |collision| contact_normals.push(collision.hit.normal1.into_inner()),
        );

        character.position += movement.translation;
        if let Some(body) = self.rigid_body_set.get_mut(character.body_handle) {
            body.set_next_kinematic_translation(character.position);
        }

        Ok(MoveOutcome {
            contact_normals,
            translation: movement.translation,
            grounded: movement.grounded,
        })
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable access to one walker body and read access to the world queries.
pub struct CharacterBody<'w> {
    character: &'w mut CharacterControllerState,
    bodies: &'w mut RigidBodySet,
    colliders: &'w mut ColliderSet,
    islands: &'w mut IslandManager,
    queries: &'w QueryPipeline,
}

impl CharacterBody<'_> {
    fn cast_ray(&self, origin: Vec3, direction: Vec3, max_toi: f32) -> Option<(Vec3, Vec3)> {
        let ray = Ray::new(Point3::from(origin), direction);
        self.queries
            .cast_ray_and_get_normal(
                &*self.bodies,
                &*self.colliders,
                &ray,
                max_toi,
                true,
                self.character.query_filter(),
            )
            .map(|(_, hit)| (ray.point_at(hit.time_of_impact).coords, hit.normal))
    }

    /// True when a capsule with its feet at `feet` overlaps solid geometry.
    fn capsule_blocked_at(&self, feet: Vec3, up: Vec3, height: f32, radius: f32) -> bool {
        let lift = self.character.skin_width;
        let spec = CapsuleSpec {
            center: feet + up * (lift + (height - lift) * 0.5),
            up,
            height: height - lift,
            radius: radius.min((height - lift) * 0.5),
        };
        let (a, b) = spec.endpoints();
        let capsule = Capsule::new(Point3::from(a), Point3::from(b), spec.radius);
        self.queries
            .intersection_with_shape(
                &*self.bodies,
                &*self.colliders,
                &Isometry3::identity(),
                &capsule,
                self.character.query_filter(),
            )
            .is_some()
    }
}

impl BodyActuator for CharacterBody<'_> {
    fn position(&self) -> Vec3 {
        self.character.position
    }

    fn set_position(&mut self, position: Vec3) {
        self.character.position = position;
        self.character.ground_adjustment = None;
        if let Some(body) = self.bodies.get_mut(self.character.body_handle) {
            body.set_translation(position, true);
            body.set_next_kinematic_translation(position);
        }
    }

    fn rotation(&self) -> UnitQuaternion<f32> {
        self.character.rotation
    }

    fn collider_height(&self) -> f32 {
        self.character.height
    }

    /// Rebuilds the capsule collider at the new height, feet kept in place.
    fn set_collider_height(&mut self, height: f32) {
        if (height - self.character.height).abs() <= f32::EPSILON {
            return;
        }
        self.character.height = height;
        self.colliders
            .remove(self.character.collider_handle, self.islands, self.bodies, true);
        self.character.collider_handle = self.colliders.insert_with_parent(
            self.character.dims().collider(),
            self.character.body_handle,
            self.bodies,
        );
    }

    fn radius(&self) -> f32 {
        self.character.radius
    }

    fn set_velocity(&mut self, velocity: Vec3) {
        self.character.velocity = velocity;
    }

    fn velocity(&self) -> Vec3 {
        self.character.velocity
    }
}

impl GroundProbe for CharacterBody<'_> {
    fn set_extended_sensor_range(&mut self, extended: bool) {
        self.character.extended_sensor = extended;
    }

    /// Casts the lifted capsule downward through the step gap.
    fn probe(&mut self) -> GroundSample {
        let c = &*self.character;
        let up = c.up();
        let dims = c.dims();
        let position = c.position;
        let range = sensor_range(
            c.height,
            c.step_height_ratio,
            c.sensor_extension_ratio,
            c.extended_sensor,
        ) + c.skin_width;

        let hit = self.queries.cast_shape(
            &*self.bodies,
            &*self.colliders,
            &c.collider_pose(),
            &(-up),
            &dims.shape(),
            ShapeCastOptions::with_max_time_of_impact(range),
            c.query_filter(),
        );

        match hit {
            Some((_, hit)) => {
                let adjustment = dims.step_height() - hit.time_of_impact;
                let normal = normalize_or_zero(&hit.normal1.into_inner());
                let normal = if normal == Vec3::zeros() { up } else { normal };
                self.character.ground_adjustment = Some(adjustment);
                GroundSample {
                    grounded: true,
                    normal,
                    ground_point: hit.witness1.coords,
                }
            }
            None => {
                self.character.ground_adjustment = None;
                GroundSample::airborne(up, position)
            }
        }
    }
}

impl ClearanceQuery for CharacterBody<'_> {
    /// Sweeps the part of the capsule above the step gap, like the real
    /// collider. Initial overlaps the sweep moves away from do not count.
    fn capsule_sweep_hits(&self, capsule: &CapsuleSpec, direction: Vec3, distance: f32) -> bool {
        let lift = capsule.height * self.character.step_height_ratio;
        let height = capsule.height - lift;
        let trimmed = CapsuleSpec {
            center: capsule.center + capsule.up * (lift * 0.5),
            up: capsule.up,
            height,
            radius: capsule.radius.min(height * 0.5),
        };
        let (a, b) = trimmed.endpoints();
        let shape = Capsule::new(Point3::from(a), Point3::from(b), trimmed.radius);
        let options = ShapeCastOptions {
            max_time_of_impact: distance,
            stop_at_penetration: false,
            ..ShapeCastOptions::default()
        };
        self.queries
            .cast_shape(
                &*self.bodies,
                &*self.colliders,
                &Isometry3::identity(),
                &normalize_or_zero(&direction),
                &shape,
                options,
                self.character.query_filter(),
            )
            .is_some()
    }
}

impl MantleDetector for CharacterBody<'_> {
    /// Looks for a wall ahead, a walkable ledge on top of it within reach, and
    /// room for a standing (else crouched) body on the ledge.
    fn find_mantle(&self, query: &MantleQuery) -> Option<MantleTarget> {
        let up = query.up;
        let forward = normalize_or_zero(&query.forward);
        if forward == Vec3::zeros() {
            return None;
        }
        let feet = query.ground_point;
        let step_height = query.standing_height * query.step_height_ratio;
        let max_height = query.standing_height * consts::MANTLE_MAX_HEIGHT_RATIO;

        // Wall just above step height, so stairs are not mistaken for ledges
        let probe_origin = feet + up * (step_height + self.character.skin_width);
        let reach = query.radius + consts::MANTLE_REACH;
        let (wall_point, wall_normal) = self.cast_ray(probe_origin, forward, reach)?;
        if (-wall_normal).dot(&forward) < consts::MANTLE_MIN_FACING_COS {
            return None;
        }

        // Drop down onto the ledge from above the reachable height
        let wall_dist = (wall_point - probe_origin).dot(&forward);
        let over_ledge = feet + forward * (wall_dist + query.radius + self.character.skin_width);
        let drop_origin = over_ledge + up * (max_height + self.character.skin_width);
        let drop = max_height + self.character.skin_width;
        let (ledge_point, ledge_normal) = self.cast_ray(drop_origin, -up, drop)?;
        if ledge_normal.dot(&up) < consts::MANTLE_MIN_LEDGE_COS {
            return None;
        }
        let ledge_height = (ledge_point - feet).dot(&up);
        if ledge_height <= step_height || ledge_height > max_height {
            return None;
        }

        // Nothing between the head and the ledge top
        if self
            .cast_ray(
                feet + up * (query.standing_height * 0.5),
                up,
                ledge_height + query.crouched_height * 0.5,
            )
            .is_some()
        {
            return None;
        }

        let target = ledge_point;
        let crouch = if !self.capsule_blocked_at(target, up, query.standing_height, query.radius) {
            false
        } else if !self.capsule_blocked_at(target, up, query.crouched_height, query.radius) {
            true
        } else {
            return None;
        };
        debug!(ledge_height, crouch, "mantle target found");
        Some(MantleTarget {
            position: target,
            crouch,
        })
    }
}
