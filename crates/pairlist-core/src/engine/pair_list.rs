use tracing::debug;

use super::arena::{PageArena, Span};
use super::bin_grid::BinGrid;
use super::config::{NeighborConfig, Symmetry, TypeCutoffs};
use super::error::NeighborError;
use super::stencil::Stencil;
use crate::core::models::exclusion::{
    self, ExclusionTable, PairDisposition, SpecialKind, SpecialScheme,
};
use crate::core::models::particle::ParticleSet;

/// Everything one list needs to be (re)built: the configuration record that
/// replaces the original one-class-per-combination dispatch, the raw per-type
/// cutoffs, and the bonded-exclusion inputs supplied by the driver.
#[derive(Debug, Clone)]
pub struct ListRequest {
    pub config: NeighborConfig,
    pub cutoffs: TypeCutoffs,
    pub scheme: SpecialScheme,
    pub exclusions: ExclusionTable,
}

impl ListRequest {
    /// A request with the uniform cutoff taken from `config` and no
    /// exclusions; the common single-type starting point.
    pub fn simple(config: NeighborConfig) -> Self {
        let cutoffs = TypeCutoffs::uniform(1, config.cutoff);
        Self {
            config,
            cutoffs,
            scheme: SpecialScheme::pass_through(),
            exclusions: ExclusionTable::default(),
        }
    }
}

/// The per-particle adjacency lists produced by one build.
///
/// Each row is a contiguous run of packed entries in the arena (index plus
/// bonded-path bits, see [`crate::core::models::exclusion`]); consumers mask
/// the high bits off before indexing and may inspect them to apply scale
/// factors. Rows cover owned particles, plus ghosts in ghost-inclusive mode.
#[derive(Debug, Clone)]
pub struct NeighborList {
    spans: Vec<Span>,
    arena: PageArena<u32>,
}

impl NeighborList {
    pub fn new(page_size: usize) -> Self {
        Self {
            spans: Vec::new(),
            arena: PageArena::new(page_size),
        }
    }

    /// Number of rows built (owned particles, plus ghosts when requested).
    pub fn rows(&self) -> usize {
        self.spans.len()
    }

    /// The packed neighbor entries of particle `i`.
    #[inline]
    pub fn neighbors(&self, i: usize) -> &[u32] {
        self.arena.get(self.spans[i])
    }

    pub fn count(&self, i: usize) -> usize {
        self.spans[i].len as usize
    }

    /// Neighbor indices of particle `i` with the path-class bits masked off.
    pub fn indices(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        self.neighbors(i).iter().map(|&e| exclusion::index_of(e))
    }

    /// Total pairs stored across all rows.
    pub fn total_pairs(&self) -> usize {
        self.arena.len()
    }

    /// Rebuilds every row from the current bin assignment.
    ///
    /// One parameterized scan covers all behavioral combinations: the stencil
    /// fixes which bins are visited and whether the `j > i` index tie-break
    /// applies, the request fixes cutoffs, exclusion handling, Newton
    /// ownership, and ghost-row coverage.
    pub fn rebuild(
        &mut self,
        particles: &ParticleSet,
        grid: &BinGrid,
        stencil: &Stencil,
        request: &ListRequest,
    ) -> Result<(), NeighborError> {
        if grid.assigned_count() != particles.total() {
            return Err(NeighborError::Internal(format!(
                "bin grid covers {} particles but the set holds {}",
                grid.assigned_count(),
                particles.total()
            )));
        }

        let config = &request.config;
        let cutoffs = request.cutoffs.inflated(config.skin);
        let rows = if config.include_ghosts {
            particles.total()
        } else {
            particles.nlocal
        };
        let full = config.symmetry == Symmetry::Full;
        let index_tie_break = stencil.index_tie_break();

        let spans = &mut self.spans;
        let arena = &mut self.arena;
        arena.reset();
        spans.clear();
        spans.reserve(rows);

        for i in 0..rows {
            let itype = particles.types[i];
            let xi = particles.positions[i];
            let tag_i = particles.tags[i];
            let coords = grid.coords_of(i);
            let use_exclusions =
                !config.size_aware && i < particles.nlocal && !request.exclusions.is_empty();

            arena.begin_run();

            let mut visit = |j: usize| {
                let rsq = (particles.positions[j] - xi).norm_squared();
                if rsq >= cutoffs.cut_sq(itype, particles.types[j]) {
                    return;
                }
                if use_exclusions {
                    let kind = request.exclusions.kind(i, particles.tags[j]);
                    match request.scheme.disposition(kind) {
                        PairDisposition::Drop => {}
                        PairDisposition::Keep => arena.push(exclusion::pack(j, SpecialKind::None)),
                        PairDisposition::KeepScaled(kind) => arena.push(exclusion::pack(j, kind)),
                    }
                } else {
                    arena.push(exclusion::pack(j, SpecialKind::None));
                }
            };

            if full {
                // Every surrounding bin including our own; skip only self.
                for delta in stencil.offsets_for(itype) {
                    let mut j = grid.first_in_offset_bin(coords, *delta).unwrap_or(-1);
                    while j >= 0 {
                        let ju = j as usize;
                        if ju != i {
                            visit(ju);
                        }
                        j = grid.next_of(ju);
                    }
                }
            } else if index_tie_break {
                // Half list resolved by particle index (newton off, or
                // ghost-inclusive): full-range stencil, keep j > i. A
                // local/ghost pair lands on both owning ranks because the
                // ghost index is always above the local one.
                for delta in stencil.offsets_for(itype) {
                    let mut j = grid.first_in_offset_bin(coords, *delta).unwrap_or(-1);
                    while j >= 0 {
                        let ju = j as usize;
                        if ju > i {
                            visit(ju);
                        }
                        j = grid.next_of(ju);
                    }
                }
            } else {
                // Half list with newton on. Same-bin pairs come off the
                // ascending chain (j > i); a ghost partner is kept only by
                // the rank owning the lower tag, so exactly one rank stores
                // each boundary pair and reduces forces later.
                let mut j = grid.next_of(i);
                while j >= 0 {
                    let ju = j as usize;
                    if !particles.is_ghost(ju) || tag_i < particles.tags[ju] {
                        visit(ju);
                    }
                    j = grid.next_of(ju);
                }
                // Distinct-bin pairs are assigned by the stencil's geometric
                // tie-break; the mirrored bin is scanned on the rank that owns
                // the other particle.
                for delta in stencil.offsets_for(itype) {
                    let mut j = grid.first_in_offset_bin(coords, *delta).unwrap_or(-1);
                    while j >= 0 {
                        let ju = j as usize;
                        visit(ju);
                        j = grid.next_of(ju);
                    }
                }
            }

            spans.push(arena.end_run());
        }

        debug!(
            rows,
            pairs = self.total_pairs(),
            symmetry = ?config.symmetry,
            "Rebuilt neighbor list"
        );
        Ok(())
    }
}
