//! Headless driver: renders frames at a variable rate and runs fixed physics
//! steps from an accumulator, the way a game loop would.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::ControllerConfig;
use crate::controller::backend::{BodyActuator, CameraRig, ViewRig};
use crate::controller::ceiling::CeilingProbe;
use crate::controller::footsteps::FootstepSelector;
use crate::controller::input::RawInput;
use crate::controller::state::ControllerState;
use crate::controller::walker::{ControllerEvent, Walker, WalkerBuilder};
use crate::error::ControllerError;
use crate::physics::PhysicsWorld;
use crate::scenario::{Scenario, PLAYER_ID};

/// Snapshot taken after each rendered frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameRecord {
    pub frame: usize,
    pub time: f32,
    pub state: ControllerState,
    pub position: [f32; 3],
    pub velocity: [f32; 3],
    pub collider_height: f32,
    pub camera_height: f32,
    pub crouching: bool,
    pub can_move: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<ControllerEvent>,
}

/// Whole-run output written by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub scenario: String,
    pub fixed_steps: usize,
    pub final_state: ControllerState,
    pub final_position: [f32; 3],
    pub frames: Vec<FrameRecord>,
}

pub struct Simulation {
    world: PhysicsWorld,
    walker: Walker,
    character: u64,
    fixed_dt: f32,
    accumulator: f32,
    time: f32,
    frame: usize,
    fixed_steps: usize,
}

impl Simulation {
    /// Builds a walker for an existing body in `world`.
    pub fn new(
        mut world: PhysicsWorld,
        character: u64,
        config: ControllerConfig,
        footsteps: Option<FootstepSelector>,
        fixed_dt: f32,
    ) -> Result<Self, ControllerError> {
        world.update_queries();
        let ceiling = CeilingProbe::new(config.ceiling.method, config.ceiling.angle_limit);
        let view = CameraRig::new(config.body.standing_cam_height);
        let mut builder = WalkerBuilder::new(config).ceiling_probe(ceiling).view_rig(view);
        if let Some(selector) = footsteps {
            builder = builder.footsteps(selector);
        }
        let walker = {
            let body = world.character_mut(character)?;
            builder.build(&body)?
        };

        Ok(Self {
            world,
            walker,
            character,
            fixed_dt,
            accumulator: 0.0,
            time: 0.0,
            frame: 0,
            fixed_steps: 0,
        })
    }

    pub fn from_scenario(scenario: &Scenario) -> Result<Self, ControllerError> {
        scenario.validate()?;
        let world = scenario.build_world();
        let footsteps = match scenario.sounds.seed {
            _ if scenario.sounds.clips == 0 => None,
            Some(seed) => Some(FootstepSelector::seeded(
                scenario.sounds.clips,
                scenario.sounds.volume,
                scenario.sounds.pitch,
                seed,
            )),
            None => Some(FootstepSelector::new(
                scenario.sounds.clips,
                scenario.sounds.volume,
                scenario.sounds.pitch,
            )),
        };
        let mut sim = Self::new(
            world,
            PLAYER_ID,
            scenario.controller.clone(),
            footsteps,
            scenario.fixed_timestep,
        )?;
        sim.walker.look_mut().yaw = scenario.yaw;
        Ok(sim)
    }

    pub fn walker(&self) -> &Walker {
        &self.walker
    }

    pub fn walker_mut(&mut self) -> &mut Walker {
        &mut self.walker
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.world
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn fixed_steps(&self) -> usize {
        self.fixed_steps
    }

    /// One controller step, one kinematic move, one world step.
    pub fn fixed_step(&mut self) -> Result<(), ControllerError> {
        {
            let mut body = self.world.character_mut(self.character)?;
            self.walker.fixed_update(&mut body, self.fixed_dt);
        }
        let outcome = self.world.move_character(self.character, self.fixed_dt)?;
        self.walker.report_contacts(&outcome.contact_normals);
        self.world.step(self.fixed_dt);
        self.fixed_steps += 1;
        Ok(())
    }

    /// Runs due fixed steps, then the per-frame update with `input`.
    pub fn frame(&mut self, input: &RawInput, dt: f32) -> Result<FrameRecord, ControllerError> {
        self.accumulator += dt;
        while self.accumulator >= self.fixed_dt {
            self.fixed_step()?;
            self.accumulator -= self.fixed_dt;
        }

        {
            let mut body = self.world.character_mut(self.character)?;
            self.walker.frame_update(&mut body, input, dt);
        }
        self.time += dt;
        self.frame += 1;
        self.record()
    }

    fn record(&mut self) -> Result<FrameRecord, ControllerError> {
        let body = self.world.character_mut(self.character)?;
        let position = body.position();
        let velocity = body.velocity();
        let collider_height = body.collider_height();
        let events = self.walker.drain_events();
        for event in &events {
            debug!(frame = self.frame, ?event, "controller event");
        }
        Ok(FrameRecord {
            frame: self.frame,
            time: self.time,
            state: self.walker.state(),
            position: [position.x, position.y, position.z],
            velocity: [velocity.x, velocity.y, velocity.z],
            collider_height,
            camera_height: self.walker.view().local_height(),
            crouching: self.walker.is_crouching(),
            can_move: self.walker.can_move(),
            events,
        })
    }

    /// Plays the scenario's input script to the end.
    pub fn run(&mut self, scenario: &Scenario) -> Result<SimulationReport, ControllerError> {
        let dt = scenario.frame_dt();
        let mut frames = Vec::with_capacity(scenario.frame_count());
        for _ in 0..scenario.frame_count() {
            let input = scenario.input_at(self.time);
            frames.push(self.frame(&input, dt)?);
        }

        let final_position = self
            .world
            .character_position(self.character)
            .ok_or(ControllerError::UnknownCharacter(self.character))?;
        info!(
            scenario = %scenario.name,
            frames = frames.len(),
            fixed_steps = self.fixed_steps,
            state = self.walker.state().name(),
            "scenario finished"
        );
        Ok(SimulationReport {
            scenario: scenario.name.clone(),
            fixed_steps: self.fixed_steps,
            final_state: self.walker.state(),
            final_position: [final_position.x, final_position.y, final_position.z],
            frames,
        })
    }
}
