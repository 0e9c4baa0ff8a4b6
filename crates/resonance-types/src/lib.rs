//! Shared type definitions for the Resonance energy network.
//!
//! This crate is the single source of truth for the plain value types that
//! flow between the energy core, the grid, and the engine binary.
//!
//! # Modules
//!
//! - [`enums`] -- Grid directions, energy roles, and the simulate/commit mode
//! - [`structs`] -- Positions, the persisted pool record, and transfer outcomes

pub mod enums;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{Direction, EnergyRole, TransferMode};
pub use structs::{PoolRecord, Position, TransferOutcome};
