//! # Pairlist Core Library
//!
//! A high-performance library for constructing spatial neighbor lists in particle
//! simulations: given a set of point particles in an orthogonal or triclinic
//! sub-domain (plus a ghost halo), it repeatedly computes, for every particle,
//! the set of other particles within an interaction cutoff.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a clear
//! separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless data models (`ParticleSet`,
//!   `Domain`), the bonded-exclusion tables, and the packed neighbor-entry encoding.
//!
//! - **[`engine`]: The Logic Core.** This stateful layer performs the actual work:
//!   spatial binning (`BinGrid`), stencil precomputation (`Stencil`), the paged
//!   list arena (`PageArena`), the parameterized pair-list builder, and the
//!   skin-based rebuild scheduler.
//!
//! - **[`workflows`]: The Public API.** The highest-level, user-facing layer. It
//!   ties `engine` and `core` together behind a registry of simultaneously-active
//!   lists (`NeighborHub`), which is the entry point a simulation driver calls
//!   once per timestep.

pub mod core;
pub mod engine;
pub mod workflows;
