use nalgebra::Point3;
use tracing::{debug, trace};

use super::bin_grid::GridKey;
use super::config::BuildCadence;
use crate::core::models::particle::ParticleSet;

/// Lifecycle of one neighbor list across timesteps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListState {
    /// No list built yet.
    Fresh,
    /// The list still matches current positions within the skin tolerance.
    Valid,
    /// Skin exceeded or geometry changed; the next update must rebuild.
    Stale,
    /// Invalidated, but the consumer is occasional: rebuild lazily on first
    /// access instead of eagerly every step.
    OnDemand,
}

/// Decides, once per timestep, whether the bin grid, stencil, and pair list
/// can be reused or must be rebuilt.
///
/// Positions update every step regardless; only the adjacency graph is
/// cached. The cached list stays valid while no owned particle has moved
/// more than half the skin since the last build and the grid geometry
/// (box, cutoff, bin sizing) is unchanged.
#[derive(Debug, Clone)]
pub struct RebuildScheduler {
    state: ListState,
    trigger_sq: f64,
    reference: Vec<Point3<f64>>,
    grid_key: Option<GridKey>,
}

impl RebuildScheduler {
    pub fn new(skin: f64) -> Self {
        let half_skin = skin / 2.0;
        Self {
            state: ListState::Fresh,
            trigger_sq: half_skin * half_skin,
            reference: Vec::new(),
            grid_key: None,
        }
    }

    pub fn state(&self) -> ListState {
        self.state
    }

    /// Records a completed build: current owned positions become the
    /// displacement reference and the list is valid.
    pub fn note_built(&mut self, particles: &ParticleSet, key: GridKey) {
        self.reference.clear();
        self.reference
            .extend_from_slice(&particles.positions[..particles.nlocal]);
        self.grid_key = Some(key);
        self.state = ListState::Valid;
    }

    /// Per-step staleness check.
    ///
    /// Transitions `Valid` to `Stale` (or `OnDemand` for occasional
    /// consumers) when any owned particle has moved more than half the skin
    /// since the last build, when the owned count changed, or when the grid
    /// geometry key differs. A `Fresh` list always needs its first build.
    pub fn check(
        &mut self,
        particles: &ParticleSet,
        key: GridKey,
        cadence: BuildCadence,
    ) -> ListState {
        match self.state {
            ListState::Fresh | ListState::Stale | ListState::OnDemand => return self.state,
            ListState::Valid => {}
        }

        let invalid = self.grid_key != Some(key) || self.drifted(particles);

        if invalid {
            self.state = match cadence {
                BuildCadence::EveryStep => ListState::Stale,
                BuildCadence::Occasional => ListState::OnDemand,
            };
            debug!(state = ?self.state, "Neighbor list invalidated");
        } else {
            trace!("Neighbor list still within skin tolerance");
        }
        self.state
    }

    /// Forces invalidation regardless of displacement (e.g., the driver
    /// changed the exclusion tables).
    pub fn mark_stale(&mut self, cadence: BuildCadence) {
        if self.state != ListState::Fresh {
            self.state = match cadence {
                BuildCadence::EveryStep => ListState::Stale,
                BuildCadence::Occasional => ListState::OnDemand,
            };
        }
    }

    /// Whether the set has drifted from the reference recorded at the last
    /// build: the owned count changed or some owned particle moved past the
    /// trigger. Unlike [`RebuildScheduler::check`] this ignores the cached
    /// state, so callers can detect motion that happened after a build within
    /// the same step.
    pub fn drifted(&self, particles: &ParticleSet) -> bool {
        self.reference.len() != particles.nlocal || self.max_displacement_exceeded(particles)
    }

    fn max_displacement_exceeded(&self, particles: &ParticleSet) -> bool {
        self.reference
            .iter()
            .zip(&particles.positions[..particles.nlocal])
            .any(|(old, new)| (new - old).norm_squared() > self.trigger_sq)
    }
}
