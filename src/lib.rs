//! Walker locomotion library
//!
//! A first-person character controller (ground probing, momentum, jumping,
//! crouching and mantling) driven against a rapier3d world, plus a headless
//! scenario runner for testing and replays.

pub mod config;
pub mod controller;
pub mod error;
pub mod physics;
pub mod scenario;
pub mod sim;
