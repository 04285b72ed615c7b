use itertools::iproduct;
use tracing::debug;

use super::bin_grid::BinGrid;
use super::config::{ConfigError, CutoffVariant, NeighborConfig, Symmetry, TypeCutoffs};
use super::error::NeighborError;

/// Which bin offsets a builder scans from each bin.
///
/// `Half` keeps exactly one representative of every distinct bin pair (the
/// geometric tie-break `k > 0 || j > 0 || (j == 0 && i > 0)`), leaving
/// same-bin pairs to the builder's local-index tie-break. `FullRange` covers
/// every surrounding bin including the bin itself; it serves both full lists
/// and half lists that resolve pair ownership by particle index instead of
/// bin geometry (newton off, ghost-inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coverage {
    Half,
    FullRange,
}

/// Precomputed bin-offset lists for one bin-grid geometry and cutoff set.
///
/// Offsets are ordered deterministically (z-major loop order), so the pair
/// scan — and therefore any downstream floating-point summation order — is
/// reproducible across runs with identical input.
#[derive(Debug, Clone)]
pub struct Stencil {
    per_type: Vec<Vec<[i32; 3]>>,
    /// True when the builder must apply the `i < j` index tie-break because
    /// the offsets cover the full surrounding range.
    index_tie_break: bool,
}

impl Stencil {
    /// Builds the stencil for `grid` under the configured symmetry and cutoff
    /// variant. `cutoffs` must already be skin-inflated.
    pub fn build(
        grid: &BinGrid,
        config: &NeighborConfig,
        cutoffs: &TypeCutoffs,
    ) -> Result<Self, NeighborError> {
        let per_type_variant = config.cutoff_variant != CutoffVariant::Uniform;
        if per_type_variant && grid.is_triclinic() {
            return Err(ConfigError::Incompatible(
                "per-type cutoff stencils are not supported with triclinic domains",
            )
            .into());
        }

        let coverage = match config.symmetry {
            Symmetry::Half if config.newton && !config.include_ghosts => Coverage::Half,
            _ => Coverage::FullRange,
        };

        let per_type = if per_type_variant {
            (0..cutoffs.ntypes())
                .map(|t| {
                    let cut = cutoffs.type_max(t);
                    offsets(grid, cut, coverage)
                })
                .collect()
        } else {
            vec![offsets(grid, cutoffs.max(), coverage)]
        };

        let total: usize = per_type.iter().map(Vec::len).sum();
        debug!(
            stencils = per_type.len(),
            offsets = total,
            ?coverage,
            "Built neighbor stencil"
        );

        Ok(Self {
            per_type,
            index_tie_break: coverage == Coverage::FullRange,
        })
    }

    /// Offset list to scan for a particle of type `itype`.
    #[inline]
    pub fn offsets_for(&self, itype: usize) -> &[[i32; 3]] {
        if self.per_type.len() == 1 {
            &self.per_type[0]
        } else {
            &self.per_type[itype]
        }
    }

    /// Whether the builder must keep only `j > i` candidates (full-range
    /// coverage under half symmetry).
    #[inline]
    pub fn index_tie_break(&self) -> bool {
        self.index_tie_break
    }
}

fn offsets(grid: &BinGrid, cut: f64, coverage: Coverage) -> Vec<[i32; 3]> {
    let cut_sq = cut * cut;
    let [sx, sy, sz] = grid.stencil_range(cut);
    let k_lo = match coverage {
        Coverage::Half => 0,
        Coverage::FullRange => -sz,
    };
    iproduct!(k_lo..=sz, -sy..=sy, -sx..=sx)
        .filter(|&(k, j, i)| match coverage {
            Coverage::Half => k > 0 || j > 0 || (j == 0 && i > 0),
            Coverage::FullRange => true,
        })
        .filter(|&(k, j, i)| grid.bin_distance_sq(i, j, k) < cut_sq)
        .map(|(k, j, i)| [i, j, k])
        .collect()
}
