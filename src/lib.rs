//! Protocol execution engine for a lab-automation robot.
//!
//! Commands are queued, executed one at a time against a hardware
//! abstraction, and every effect is recorded as an action reduced into a
//! single state store. Geometry and motion planning are pure queries over
//! that state.

pub mod actions;
pub mod commands;
pub mod config;
pub mod definitions;
pub mod engine;
pub mod error;
pub mod execution;
pub mod hardware;
pub mod resources;
pub mod state;
pub mod types;

pub use engine::{ProtocolEngine, ProtocolEngineBuilder};
pub use error::{EngineError, EngineResult};
