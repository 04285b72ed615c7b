//! # Core Models Module
//!
//! This module contains the fundamental data structures used to represent particle
//! systems and their geometry for neighbor-list construction.
//!
//! ## Overview
//!
//! The models module defines the contracts between the neighbor subsystem and its
//! external collaborators (domain decomposition, force evaluation). These models
//! are designed to:
//!
//! - **Represent simulation state** - Particle positions, types, tags, and the
//!   local/ghost split maintained by the communication layer
//! - **Describe domain geometry** - Orthogonal and triclinic sub-domain bounds
//!   with the coordinate transforms binning needs
//! - **Encode pair metadata compactly** - Bonded-exclusion classes packed into
//!   the high bits of each stored neighbor index
//! - **Maintain type safety** - Opaque slotmap keys for list handles
//!
//! ## Key Components
//!
//! - [`particle`] - Read-only particle storage view with the local/ghost split
//! - [`domain`] - Sub-domain box geometry and Cartesian/fractional transforms
//! - [`exclusion`] - Special-bonds schemes, per-particle exclusion tables, and
//!   the centralized packed neighbor-entry encoding
//! - [`ids`] - Unique identifier types for registered neighbor lists

pub mod domain;
pub mod exclusion;
pub mod ids;
pub mod particle;
