use nalgebra::Point3;

/// Read-only view of the particle arrays maintained by the simulation driver.
///
/// The neighbor subsystem never mutates particle data. Indices below `nlocal`
/// are particles owned by this rank; indices from `nlocal` to `total()` are
/// ghost copies of particles owned by neighboring sub-domains, kept locally
/// only for proximity computations. The communication collaborator is
/// responsible for keeping ghost positions consistent before any build starts.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleSet {
    /// Particle coordinates, local particles first, then ghosts.
    pub positions: Vec<Point3<f64>>,
    /// Per-particle type index (0-based, dense).
    pub types: Vec<usize>,
    /// Globally unique particle tags, stable across migration between ranks.
    pub tags: Vec<i64>,
    /// Number of locally-owned particles at the front of the arrays.
    pub nlocal: usize,
}

impl ParticleSet {
    /// Creates a particle set with no ghosts, one type, and sequential tags.
    ///
    /// Convenience constructor for drivers and tests that work with a single
    /// fully-local system.
    pub fn from_positions(positions: Vec<Point3<f64>>) -> Self {
        let n = positions.len();
        Self {
            positions,
            types: vec![0; n],
            tags: (1..=n as i64).collect(),
            nlocal: n,
        }
    }

    /// Total particle count, local plus ghost.
    pub fn total(&self) -> usize {
        self.positions.len()
    }

    /// Number of ghost particles appended after the local block.
    pub fn nghost(&self) -> usize {
        self.positions.len() - self.nlocal
    }

    pub fn is_ghost(&self, i: usize) -> bool {
        i >= self.nlocal
    }

    /// Largest type index present, or `None` for an empty set.
    pub fn max_type(&self) -> Option<usize> {
        self.types.iter().copied().max()
    }
}
