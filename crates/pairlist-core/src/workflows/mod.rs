//! High-level neighbor-list management workflows.
//!
//! The engine layer exposes the individual moving parts (bin grid, stencil,
//! pair-list builder, rebuild scheduler); this layer wires them into the
//! facade a simulation driver actually talks to. Consumers register list
//! requests once at setup, then call one per-step update and query rows by
//! handle.

pub mod lists;
