//! # Core Module
//!
//! This module provides the fundamental building blocks for spatial neighbor-list
//! construction, serving as the stateless data foundation of the library.
//!
//! ## Overview
//!
//! The core module defines how particle data, domain geometry, and bonded-exclusion
//! rules are represented. Nothing in this layer is mutated by a list build; the
//! engine reads these models and writes only into its own state.
//!
//! ## Architecture
//!
//! - **Particle and Domain Models** ([`models`]) - Read-only particle storage views,
//!   orthogonal/triclinic box geometry, exclusion tables, and the packed
//!   neighbor-entry encoding shared by every list variant.

pub mod models;
