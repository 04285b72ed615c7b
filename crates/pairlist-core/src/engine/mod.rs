//! # Engine Module
//!
//! This module implements the stateful logic core of neighbor-list construction:
//! everything between raw particle positions and the finished per-particle
//! adjacency lists.
//!
//! ## Overview
//!
//! The engine orchestrates the build pipeline in dependency order: the spatial
//! bin grid partitions the sub-domain (plus ghost halo) into uniform bins, the
//! stencil generator precomputes which neighboring bins must be scanned for a
//! given cutoff set and symmetry mode, and the pair-list builder walks bins
//! through the stencil to emit packed neighbor runs into a paged arena. The
//! rebuild scheduler decides, once per timestep, whether any of that work can
//! be skipped.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - List configuration surface, per-type cutoff
//!   matrices, and setup-time validation of incompatible combinations
//! - **Spatial Binning** ([`bin_grid`]) - Uniform bin grid over the halo-extended
//!   sub-domain with linked per-bin particle chains
//! - **Stencil Generation** ([`stencil`]) - Precomputed bin-offset lists under
//!   half/full symmetry, per-type cutoff shaping, and 2-D/3-D geometry
//! - **List Storage** ([`arena`]) - Paged, amortized-growth arena supplying
//!   contiguous per-particle neighbor runs
//! - **Pair-List Building** ([`pair_list`]) - The single parameterized builder
//!   covering every symmetry/cutoff/ghost/size combination
//! - **Rebuild Scheduling** ([`scheduler`]) - Skin-based staleness tracking and
//!   lazy (on-demand) build support
//! - **Error Handling** ([`error`]) - Engine-specific error types

pub mod arena;
pub mod bin_grid;
pub mod config;
pub mod error;
pub mod pair_list;
pub mod scheduler;
pub mod stencil;
