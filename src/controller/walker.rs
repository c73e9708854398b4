//! The walker controller: state machine, momentum, crouch and mantle.
//!
//! Call [`Walker::frame_update`] once per rendered frame with the raw input and
//! [`Walker::fixed_update`] once per fixed physics step. Contact normals seen by
//! the physics step are fed back through [`Walker::report_contacts`].

use nalgebra::{UnitQuaternion, Vector2};
use serde::Serialize;
use tracing::{debug, error, trace};

use crate::config::{ControllerConfig, CrouchMode};
use crate::error::ControllerError;

use super::backend::{
    BodyActuator, CameraRig, CapsuleSpec, CharacterBackend, MantleQuery, MantleTarget, ViewRig,
};
use super::ceiling::CeilingProbe;
use super::constants::movement::VERTICAL_MOMENTUM_THRESHOLD;
use super::footsteps::{BodySound, FootstepSelector};
use super::ground_probe::GroundSample;
use super::input::{CrouchLatch, JumpLatch, LookState, RawInput};
use super::math::{normalize_or_zero, project_on_plane, Vec3};
use super::momentum::{
    integrate, is_rising, strip_vertical, transfer_on_ground_lost, MomentumFrame, MomentumParams,
    MomentumStep,
};
use super::state::{next_state, ControllerState, StateInputs, TransitionEffect};
use super::transition::{crouch_duration, CrouchTransition, MantleTransition};

/// Notifications emitted by the controller; drained by the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControllerEvent {
    StateChanged {
        from: ControllerState,
        to: ControllerState,
    },
    Jump {
        momentum: [f32; 3],
    },
    Land {
        velocity: [f32; 3],
    },
    CrouchDown,
    CrouchUp,
    MantleStart {
        target: [f32; 3],
        crouch: bool,
    },
    MantleEnd,
    BodySound(BodySound),
}

fn arr(v: &Vec3) -> [f32; 3] {
    [v.x, v.y, v.z]
}

/// Assembles a [`Walker`], checking that every collaborator is present.
pub struct WalkerBuilder<V: ViewRig> {
    config: ControllerConfig,
    ceiling: Option<CeilingProbe>,
    view: Option<V>,
    footsteps: Option<FootstepSelector>,
}

impl<V: ViewRig> WalkerBuilder<V> {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            ceiling: None,
            view: None,
            footsteps: None,
        }
    }

    pub fn ceiling_probe(mut self, probe: CeilingProbe) -> Self {
        self.ceiling = Some(probe);
        self
    }

    pub fn view_rig(mut self, view: V) -> Self {
        self.view = Some(view);
        self
    }

    /// Optional; without it no `BodySound` events are emitted.
    pub fn footsteps(mut self, selector: FootstepSelector) -> Self {
        self.footsteps = Some(selector);
        self
    }

    /// Reads standing collider height from `body` and standing camera height
    /// from the view rig.
    pub fn build(self, body: &impl BodyActuator) -> Result<Walker<V>, ControllerError> {
        if let Err(e) = self.config.validate() {
            error!(error = %e, "walker configuration rejected");
            return Err(e.into());
        }
        let Some(ceiling) = self.ceiling else {
            error!(collaborator = "ceiling probe", "walker is missing a required collaborator");
            return Err(ControllerError::MissingCollaborator("ceiling probe"));
        };
        let Some(view) = self.view else {
            error!(collaborator = "view rig", "walker is missing a required collaborator");
            return Err(ControllerError::MissingCollaborator("view rig"));
        };

        let standing_height = body.collider_height();
        let crouched_height = self.config.crouch.crouched_height;
        let standing_cam_height = view.local_height();
        let crouched_cam_height = if standing_height > 0.0 {
            standing_cam_height / standing_height * crouched_height
        } else {
            standing_cam_height
        };
        let frame = if self.config.movement.use_local_momentum {
            MomentumFrame::Local
        } else {
            MomentumFrame::World
        };
        let rotation = body.rotation();
        let up = rotation * Vec3::y();

        Ok(Walker {
            crouch_mode: self.config.crouch.mode,
            config: self.config,
            state: ControllerState::default(),
            frame,
            momentum: Vec3::zeros(),
            saved_velocity: Vec3::zeros(),
            saved_movement_velocity: Vec3::zeros(),
            rotation,
            ground: GroundSample::airborne(up, body.position()),
            ceiling,
            view,
            footsteps: self.footsteps,
            jump: JumpLatch::default(),
            crouch_latch: CrouchLatch::default(),
            move_axis: Vector2::zeros(),
            sprint: false,
            look: LookState::default(),
            can_move: true,
            wish_stand: true,
            crouch_toggle_armed: false,
            is_crouching: false,
            is_crouch_mantle: false,
            standing_height,
            crouched_height,
            standing_cam_height,
            crouched_cam_height,
            crouch_transition: None,
            mantle_transition: None,
            clock: 0.0,
            jump_start: 0.0,
            events: Vec::new(),
        })
    }
}

/// First-person locomotion controller for one body.
pub struct Walker<V: ViewRig = CameraRig> {
    config: ControllerConfig,
    state: ControllerState,
    frame: MomentumFrame,
    /// Stored in `frame`
    momentum: Vec3,
    saved_velocity: Vec3,
    saved_movement_velocity: Vec3,
    rotation: UnitQuaternion<f32>,
    ground: GroundSample,
    ceiling: CeilingProbe,
    view: V,
    footsteps: Option<FootstepSelector>,

    jump: JumpLatch,
    crouch_latch: CrouchLatch,
    move_axis: Vector2<f32>,
    sprint: bool,
    look: LookState,
    can_move: bool,

    crouch_mode: CrouchMode,
    wish_stand: bool,
    /// Toggle mode ignores the standing desire until the first press
    crouch_toggle_armed: bool,
    is_crouching: bool,
    is_crouch_mantle: bool,
    standing_height: f32,
    crouched_height: f32,
    standing_cam_height: f32,
    crouched_cam_height: f32,
    crouch_transition: Option<CrouchTransition>,
    mantle_transition: Option<MantleTransition>,

    clock: f32,
    jump_start: f32,
    events: Vec<ControllerEvent>,
}

impl Walker<CameraRig> {
    /// Walker with a plain camera rig and the configured ceiling probe.
    pub fn with_defaults(
        config: ControllerConfig,
        body: &impl BodyActuator,
    ) -> Result<Self, ControllerError> {
        let ceiling = CeilingProbe::new(config.ceiling.method, config.ceiling.angle_limit);
        let view = CameraRig::new(config.body.standing_cam_height);
        WalkerBuilder::new(config)
            .ceiling_probe(ceiling)
            .view_rig(view)
            .build(body)
    }
}

impl<V: ViewRig> Walker<V> {
    /// Latches input edges, accumulates look and advances timed transitions.
    pub fn frame_update(&mut self, body: &mut impl BodyActuator, input: &RawInput, dt: f32) {
        self.jump.update(input.jump);
        self.crouch_latch.update(input.crouch);
        self.move_axis = clamp_move_axis(input.move_vector());
        self.sprint = input.sprint;
        self.look
            .apply_delta(input.look_delta, self.config.body.look_sensitivity);

        self.advance_transitions(body, dt);
    }

    /// Progresses in-flight crouch and mantle transitions by one frame.
    pub fn advance_transitions(&mut self, body: &mut impl BodyActuator, dt: f32) {
        if let Some(transition) = &mut self.crouch_transition {
            if transition.advance(dt, body, &mut self.view) {
                self.crouch_transition = None;
            }
        }
        if let Some(transition) = &mut self.mantle_transition {
            if transition.advance(dt, &mut self.view) {
                self.mantle_transition = None;
                self.on_mantle_end();
            }
        }
    }

    /// Runs one fixed physics step and hands the resulting velocity to the body.
    pub fn fixed_update(&mut self, body: &mut impl CharacterBackend, dt: f32) {
        if !self.can_move {
            body.set_velocity(Vec3::zeros());
            self.end_step(dt);
            return;
        }

        self.rotation = body.rotation();
        let up = self.rotation * Vec3::y();
        let mut momentum = self.frame.to_world(self.momentum, &self.rotation);

        self.ground = body.probe();

        momentum = self.determine_state(momentum, &up);

        let step = MomentumStep {
            state: self.state,
            up,
            movement_velocity: self.movement_velocity(&up),
            ground_normal: self.ground.normal,
            dt,
        };
        momentum = integrate(momentum, &step, &self.momentum_params());

        momentum = self.handle_jumping(body, momentum, &up);
        self.handle_crouching(body);

        let mut velocity = if self.state == ControllerState::Grounded {
            self.movement_velocity(&up)
        } else {
            Vec3::zeros()
        };
        velocity += momentum;

        body.set_extended_sensor_range(self.state.is_grounded());
        body.set_velocity(velocity);

        self.saved_velocity = velocity;
        self.saved_movement_velocity = self.movement_velocity(&up);
        self.momentum = self.frame.from_world(momentum, &self.rotation);

        trace!(
            state = self.state.name(),
            vx = velocity.x,
            vy = velocity.y,
            vz = velocity.z,
            "walker step"
        );
        self.end_step(dt);
    }

    fn end_step(&mut self, dt: f32) {
        self.jump.clear_edges();
        self.crouch_latch.clear_edges();
        self.ceiling.reset();
        self.clock += dt;
    }

    fn determine_state(&mut self, mut momentum: Vec3, up: &Vec3) -> Vec3 {
        let inputs = StateInputs {
            grounded: self.ground.grounded,
            too_steep: self
                .ground
                .is_too_steep(up, self.config.movement.slope_limit),
            rising: is_rising(&momentum, up, VERTICAL_MOMENTUM_THRESHOLD),
            ceiling_hit: self.ceiling.hit_ceiling(),
            jump_elapsed: self.clock - self.jump_start,
            jump_duration: self.config.jump.jump_duration,
            jump_released: self.jump.was_let_go,
        };
        let transition = next_state(self.state, &inputs);

        match transition.effect {
            Some(TransitionEffect::GroundContactLost) => {
                momentum = transfer_on_ground_lost(momentum, self.saved_movement_velocity);
            }
            Some(TransitionEffect::GroundContactRegained) => {
                self.events.push(ControllerEvent::Land {
                    velocity: arr(&momentum),
                });
            }
            Some(TransitionEffect::CeilingContact) => {
                momentum = strip_vertical(momentum, up);
            }
            None => {}
        }

        self.set_state(transition.state);
        momentum
    }

    fn set_state(&mut self, state: ControllerState) {
        if state != self.state {
            debug!(from = self.state.name(), to = state.name(), "walker state changed");
            self.events.push(ControllerEvent::StateChanged {
                from: self.state,
                to: state,
            });
            self.state = state;
        }
    }

    fn momentum_params(&self) -> MomentumParams {
        let m = &self.config.movement;
        MomentumParams {
            gravity: m.gravity,
            slide_gravity: m.slide_gravity,
            walk_speed: m.walk_speed,
            air_control_rate: m.air_control_rate,
            air_friction: m.air_friction,
            ground_friction: m.ground_friction,
            friction_model: m.friction_model,
            jump_speed: self.config.jump.jump_speed,
        }
    }

    /// Input velocity for this step (zero while movement is suspended).
    fn movement_velocity(&self, up: &Vec3) -> Vec3 {
        if !self.can_move {
            return Vec3::zeros();
        }
        let direction = self.look.movement_direction(self.move_axis, up);
        let m = &self.config.movement;
        let speed = if self.is_crouching {
            m.crouched_speed
        } else if self.sprint {
            m.sprint_speed
        } else {
            m.walk_speed
        };
        direction * speed
    }

    fn handle_jumping(
        &mut self,
        body: &mut impl CharacterBackend,
        mut momentum: Vec3,
        up: &Vec3,
    ) -> Vec3 {
        if self.state != ControllerState::Grounded || !self.jump.wants_jump() {
            return momentum;
        }

        if self.config.jump.mantle_enabled {
            let query = MantleQuery {
                ground_point: self.ground.ground_point,
                forward: normalize_or_zero(&project_on_plane(&self.look.forward(), up)),
                up: *up,
                standing_height: self.standing_height,
                crouched_height: self.crouched_height,
                radius: body.radius(),
                step_height_ratio: self.config.ground.step_height_ratio,
            };
            if let Some(target) = body.find_mantle(&query) {
                self.start_mantle(body, target);
                return momentum;
            }
        }

        debug!("no mantle target, jumping");
        momentum = transfer_on_ground_lost(momentum, self.saved_movement_velocity);
        momentum += up * self.config.jump.jump_speed;
        self.jump_start = self.clock;
        self.jump.locked = true;
        self.events.push(ControllerEvent::Jump {
            momentum: arr(&momentum),
        });
        self.set_state(ControllerState::Jumping);
        momentum
    }

    fn handle_crouching(&mut self, body: &mut impl CharacterBackend) {
        if !self.can_move || self.state != ControllerState::Grounded || self.crouch_latch.locked {
            return;
        }

        match self.crouch_mode {
            CrouchMode::Toggle => {
                if self.crouch_latch.was_pressed {
                    self.crouch_toggle_armed = true;
                    self.wish_stand = !self.wish_stand;
                    self.crouch_latch.was_pressed = false;
                }
                if !self.crouch_toggle_armed {
                    return;
                }
                if !self.is_crouching && !self.wish_stand {
                    self.start_crouch(body);
                } else if self.is_crouching && self.wish_stand && self.has_room_to_stand(body) {
                    self.end_crouch(body);
                }
            }
            CrouchMode::Hold => {
                if self.crouch_latch.is_pressed {
                    if !self.is_crouching {
                        self.start_crouch(body);
                    }
                } else if self.is_crouching && self.has_room_to_stand(body) {
                    self.end_crouch(body);
                }
            }
        }
    }

    /// No ceiling contact this step and the upward sweep is clear.
    pub fn has_room_to_stand(&self, body: &impl CharacterBackend) -> bool {
        if self.ceiling.hit_ceiling() {
            return false;
        }
        let capsule = body_capsule(body);
        self.ceiling
            .can_stand_up(self.standing_height, self.crouched_height, &capsule, body)
    }

    fn start_crouch(&mut self, body: &mut impl BodyActuator) {
        debug!("crouch started");
        self.is_crouching = true;
        self.jump.locked = true;
        self.begin_height_transition(body, self.crouched_height, self.crouched_cam_height);
        self.events.push(ControllerEvent::CrouchDown);
    }

    fn end_crouch(&mut self, body: &mut impl BodyActuator) {
        debug!("stand started");
        self.is_crouching = false;
        self.jump.locked = false;
        self.begin_height_transition(body, self.standing_height, self.standing_cam_height);
        self.events.push(ControllerEvent::CrouchUp);
    }

    /// Replaces any in-flight crouch transition, starting from live heights.
    fn begin_height_transition(
        &mut self,
        body: &mut impl BodyActuator,
        target_height: f32,
        target_cam: f32,
    ) {
        self.crouch_transition = None;
        self.play_body_sound();

        let start_height = body.collider_height();
        let start_cam = self.view.local_height();
        let duration = crouch_duration(
            self.config.crouch.crouch_trans_time,
            start_height,
            target_height,
            self.standing_height,
            self.crouched_height,
        );
        let transition =
            CrouchTransition::new(start_height, target_height, start_cam, target_cam, duration);
        transition.apply(body, &mut self.view);
        if !transition.is_finished() {
            self.crouch_transition = Some(transition);
        }
    }

    fn start_mantle(&mut self, body: &mut impl BodyActuator, target: MantleTarget) {
        debug!(
            x = target.position.x,
            y = target.position.y,
            z = target.position.z,
            crouch = target.crouch,
            "mantle started"
        );
        self.is_crouch_mantle = target.crouch;
        self.can_move = false;
        self.jump.locked = true;
        self.crouch_latch.lock_while_held();

        if target.crouch && !self.is_crouching {
            self.events.push(ControllerEvent::CrouchDown);
        } else if !target.crouch && self.is_crouching {
            self.events.push(ControllerEvent::CrouchUp);
        }
        self.is_crouching = target.crouch;

        self.crouch_transition = None;
        self.mantle_transition = None;
        self.play_body_sound();

        let rotation = body.rotation();
        let start_cam_world = body.position() + rotation * self.view.local_position();
        let (height, cam_height) = if target.crouch {
            (self.crouched_height, self.crouched_cam_height)
        } else {
            (self.standing_height, self.standing_cam_height)
        };
        body.set_collider_height(height);
        body.set_position(target.position);
        body.set_velocity(Vec3::zeros());

        self.events.push(ControllerEvent::MantleStart {
            target: arr(&target.position),
            crouch: target.crouch,
        });

        let transition = MantleTransition::new(
            start_cam_world,
            target.position,
            &rotation,
            cam_height,
            self.config.crouch.mantle_trans_time,
        );
        transition.apply(&mut self.view);
        if transition.is_finished() {
            self.on_mantle_end();
        } else {
            self.mantle_transition = Some(transition);
        }
    }

    fn on_mantle_end(&mut self) {
        debug!("mantle finished");
        self.can_move = true;
        self.events.push(ControllerEvent::MantleEnd);
    }

    fn play_body_sound(&mut self) {
        if let Some(sound) = self.footsteps.as_mut().and_then(|f| f.next_sound()) {
            self.events.push(ControllerEvent::BodySound(sound));
        }
    }

    /// Sets crouched or standing heights immediately, cancelling transitions.
    /// In toggle mode the standing desire is aligned with the applied pose.
    pub fn apply_crouch_state_instant(&mut self, body: &mut impl BodyActuator, crouched: bool) {
        self.crouch_transition = None;
        self.is_crouching = crouched;
        self.jump.locked = crouched;
        let (height, cam) = if crouched {
            (self.crouched_height, self.crouched_cam_height)
        } else {
            (self.standing_height, self.standing_cam_height)
        };
        body.set_collider_height(height);
        self.view.set_local_height(cam);
        if self.crouch_mode == CrouchMode::Toggle {
            self.crouch_toggle_armed = true;
            self.wish_stand = !crouched;
        }
    }

    /// Places the body on a mantle target with no camera glide.
    pub fn apply_mantle_state_instant(&mut self, body: &mut impl BodyActuator, target: MantleTarget) {
        self.crouch_transition = None;
        self.mantle_transition = None;
        self.is_crouching = target.crouch;
        self.is_crouch_mantle = target.crouch;
        let (height, cam) = if target.crouch {
            (self.crouched_height, self.crouched_cam_height)
        } else {
            (self.standing_height, self.standing_cam_height)
        };
        body.set_collider_height(height);
        body.set_position(target.position);
        body.set_velocity(Vec3::zeros());
        self.view.set_local_position(Vec3::new(0.0, cam, 0.0));
        if self.crouch_mode == CrouchMode::Toggle {
            self.crouch_toggle_armed = true;
            self.wish_stand = !target.crouch;
        }
        self.on_mantle_end();
    }

    /// Feed contact normals gathered during the physics step.
    pub fn report_contacts(&mut self, normals: &[Vec3]) {
        let up = self.rotation * Vec3::y();
        self.ceiling.report_contacts(normals, &up);
    }

    pub fn set_crouch_mode(&mut self, mode: CrouchMode) {
        self.crouch_mode = mode;
    }

    pub fn crouch_mode(&self) -> CrouchMode {
        self.crouch_mode
    }

    /// Momentum in world space.
    pub fn momentum(&self) -> Vec3 {
        self.frame.to_world(self.momentum, &self.rotation)
    }

    pub fn add_momentum(&mut self, delta: Vec3) {
        let world = self.momentum() + delta;
        self.momentum = self.frame.from_world(world, &self.rotation);
    }

    pub fn set_momentum(&mut self, momentum: Vec3) {
        self.momentum = self.frame.from_world(momentum, &self.rotation);
    }

    /// Total velocity handed to the body last step.
    pub fn velocity(&self) -> Vec3 {
        self.saved_velocity
    }

    /// Input-only velocity from last step (momentum excluded).
    pub fn movement_velocity_last_step(&self) -> Vec3 {
        self.saved_movement_velocity
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_grounded(&self) -> bool {
        self.state.is_grounded()
    }

    pub fn is_sliding(&self) -> bool {
        self.state == ControllerState::Sliding
    }

    pub fn is_crouching(&self) -> bool {
        self.is_crouching
    }

    pub fn is_crouch_mantle(&self) -> bool {
        self.is_crouch_mantle
    }

    pub fn wish_stand(&self) -> bool {
        self.wish_stand
    }

    pub fn can_move(&self) -> bool {
        self.can_move
    }

    pub fn ground(&self) -> &GroundSample {
        &self.ground
    }

    pub fn look(&self) -> &LookState {
        &self.look
    }

    pub fn look_mut(&mut self) -> &mut LookState {
        &mut self.look
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn standing_height(&self) -> f32 {
        self.standing_height
    }

    pub fn crouched_height(&self) -> f32 {
        self.crouched_height
    }

    pub fn standing_cam_height(&self) -> f32 {
        self.standing_cam_height
    }

    pub fn crouched_cam_height(&self) -> f32 {
        self.crouched_cam_height
    }

    pub fn crouch_transition(&self) -> Option<&CrouchTransition> {
        self.crouch_transition.as_ref()
    }

    pub fn mantle_transition(&self) -> Option<&MantleTransition> {
        self.mantle_transition.as_ref()
    }

    pub fn drain_events(&mut self) -> Vec<ControllerEvent> {
        std::mem::take(&mut self.events)
    }
}

fn clamp_move_axis(axis: Vector2<f32>) -> Vector2<f32> {
    let len = axis.norm();
    if len > 1.0 {
        axis / len
    } else {
        axis
    }
}

/// World-space capsule of the body; the body origin sits at its feet.
pub fn body_capsule(body: &impl BodyActuator) -> CapsuleSpec {
    let up = body.up();
    let height = body.collider_height();
    CapsuleSpec {
        center: body.position() + up * (height * 0.5),
        up,
        height,
        radius: body.radius(),
    }
}
