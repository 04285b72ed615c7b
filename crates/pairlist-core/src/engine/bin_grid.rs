use nalgebra::Point3;
use tracing::{debug, warn};

use super::config::{Dimension, NeighborConfig};
use super::error::NeighborError;
use crate::core::models::domain::Domain;
use crate::core::models::particle::ParticleSet;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Identifies a bin-grid geometry so identically-shaped grids can be shared
/// read-only between lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridKey {
    domain: [u64; 9],
    cutneigh: u64,
    bin_ratio: u64,
    dimension: Dimension,
}

impl GridKey {
    pub fn new(domain: &Domain, config: &NeighborConfig, cutneigh: f64) -> Self {
        Self {
            domain: domain.geometry_key(),
            cutneigh: cutneigh.to_bits(),
            bin_ratio: config.bin_ratio.to_bits(),
            dimension: config.dimension,
        }
    }
}

/// Uniform spatial bin grid over the halo-extended local sub-domain.
///
/// Bins are sized from the largest neighbor cutoff (cutoff + skin) scaled by
/// the configured bin ratio, and extend one cutoff + skin beyond the
/// sub-domain on every side so ghost particles bin correctly. For triclinic
/// domains the grid subdivides the box's fractional (lamda) coordinate
/// system rather than Cartesian space.
///
/// Particle membership is kept as classic linked chains: `head[bin]` holds
/// the lowest-index particle in the bin and `next[i]` the following one, so
/// walking a chain always yields ascending local indices. The half-symmetry
/// same-bin tie-break relies on that ordering.
#[derive(Debug, Clone)]
pub struct BinGrid {
    nbin: [i32; 3],
    lo: [f64; 3],
    binsize: [f64; 3],
    bininv: [f64; 3],
    /// Conservative Cartesian bin extents used for stencil pruning; equal to
    /// `binsize` for orthogonal domains, scaled by the perpendicular widths
    /// for triclinic ones.
    binsize_cart: [f64; 3],
    triclinic: bool,
    dimension: Dimension,
    key: GridKey,
    head: Vec<i32>,
    next: Vec<i32>,
    coords: Vec<[i32; 3]>,
    max_occupancy: usize,
}

/// A bin with chain occupancy this far beyond the grid average is loud enough
/// to report; it usually indicates a clustering bug in the simulated system.
const OCCUPANCY_WARN_FACTOR: usize = 16;
const OCCUPANCY_WARN_FLOOR: usize = 256;

impl BinGrid {
    pub fn new(domain: &Domain, config: &NeighborConfig, cutneigh: f64) -> Self {
        let triclinic = domain.is_triclinic();
        let lengths = domain.lengths();

        let mut nbin = [1i32; 3];
        let mut lo = [0.0; 3];
        let mut binsize = [0.0; 3];
        let mut binsize_cart = [0.0; 3];

        for axis in 0..3 {
            if axis == 2 && config.dimension == Dimension::Two {
                // Flat axis: one bin covering everything ever handed to us.
                lo[axis] = f64::NEG_INFINITY;
                binsize[axis] = f64::INFINITY;
                binsize_cart[axis] = f64::INFINITY;
                continue;
            }
            let (lo_b, extent, target, to_cart) = if triclinic {
                let perp = domain.perpendicular_width(axis);
                let halo = cutneigh / perp;
                (-halo, 1.0 + 2.0 * halo, config.bin_ratio * halo, perp)
            } else {
                (
                    domain.lo()[axis] - cutneigh,
                    lengths[axis] + 2.0 * cutneigh,
                    config.bin_ratio * cutneigh,
                    1.0,
                )
            };
            let n = ((extent / target).floor() as i32).max(1);
            nbin[axis] = n;
            lo[axis] = lo_b;
            binsize[axis] = extent / n as f64;
            binsize_cart[axis] = binsize[axis] * to_cart;
        }

        let total_bins = (nbin[0] as usize) * (nbin[1] as usize) * (nbin[2] as usize);
        debug!(
            nbinx = nbin[0],
            nbiny = nbin[1],
            nbinz = nbin[2],
            triclinic,
            "Sized neighbor bin grid"
        );

        Self {
            nbin,
            lo,
            binsize,
            bininv: binsize.map(|s| 1.0 / s),
            binsize_cart,
            triclinic,
            dimension: config.dimension,
            key: GridKey::new(domain, config, cutneigh),
            head: vec![-1; total_bins],
            next: Vec::new(),
            coords: Vec::new(),
            max_occupancy: 0,
        }
    }

    pub fn key(&self) -> GridKey {
        self.key
    }

    pub fn is_triclinic(&self) -> bool {
        self.triclinic
    }

    pub fn nbin(&self) -> [i32; 3] {
        self.nbin
    }

    pub fn total_bins(&self) -> usize {
        self.head.len()
    }

    /// Assigns every local and ghost particle to its bin.
    ///
    /// A particle mapping outside the allocated bin range is a consistency
    /// violation on the domain-decomposition side and fails the build; indices
    /// are never clamped into range.
    pub fn assign(&mut self, particles: &ParticleSet, domain: &Domain) -> Result<(), NeighborError> {
        let n = particles.total();

        #[cfg(not(feature = "parallel"))]
        let coords: Result<Vec<[i32; 3]>, NeighborError> = particles
            .positions
            .iter()
            .enumerate()
            .map(|(i, x)| self.coord_to_bin(i, x, domain))
            .collect();

        #[cfg(feature = "parallel")]
        let coords: Result<Vec<[i32; 3]>, NeighborError> = particles
            .positions
            .par_iter()
            .enumerate()
            .map(|(i, x)| self.coord_to_bin(i, x, domain))
            .collect();

        self.coords = coords?;
        self.head.fill(-1);
        self.next.clear();
        self.next.resize(n, -1);

        // Insert in reverse so every chain runs in ascending particle index.
        for i in (0..n).rev() {
            let bin = self.linear(self.coords[i]);
            self.next[i] = self.head[bin];
            self.head[bin] = i as i32;
        }

        let mut occupancy = vec![0usize; self.head.len()];
        for c in &self.coords {
            occupancy[self.linear(*c)] += 1;
        }
        self.max_occupancy = occupancy.iter().copied().max().unwrap_or(0);
        let average = if self.head.is_empty() {
            0
        } else {
            n / self.head.len()
        };
        if self.max_occupancy > OCCUPANCY_WARN_FLOOR
            && self.max_occupancy > OCCUPANCY_WARN_FACTOR * average.max(1)
        {
            warn!(
                max = self.max_occupancy,
                average, "Pathological bin occupancy detected; check for particle clustering"
            );
        }

        debug!(particles = n, max_occupancy = self.max_occupancy, "Binned particles");
        Ok(())
    }

    fn coord_to_bin(
        &self,
        index: usize,
        x: &Point3<f64>,
        domain: &Domain,
    ) -> Result<[i32; 3], NeighborError> {
        let p = if self.triclinic {
            domain.to_lamda(x)
        } else {
            *x
        };
        let mut c = [0i32; 3];
        for axis in 0..3 {
            if axis == 2 && self.dimension == Dimension::Two {
                continue;
            }
            let mut ib = ((p[axis] - self.lo[axis]) * self.bininv[axis]).floor() as i64;
            let upper = self.lo[axis] + self.binsize[axis] * self.nbin[axis] as f64;
            // A particle exactly on the upper halo face belongs to the last bin.
            if ib == self.nbin[axis] as i64 && p[axis] <= upper {
                ib -= 1;
            }
            if ib < 0 || ib >= self.nbin[axis] as i64 {
                return Err(NeighborError::OutOfDomain {
                    index,
                    x: x.x,
                    y: x.y,
                    z: x.z,
                });
            }
            c[axis] = ib as i32;
        }
        Ok(c)
    }

    #[inline]
    fn linear(&self, c: [i32; 3]) -> usize {
        ((c[2] * self.nbin[1] + c[1]) * self.nbin[0] + c[0]) as usize
    }

    /// Bin coordinate of particle `i` from the last `assign`.
    #[inline]
    pub fn coords_of(&self, i: usize) -> [i32; 3] {
        self.coords[i]
    }

    /// First particle of the bin at `coords` offset by `delta`, or `None` when
    /// the offset bin lies outside the grid.
    #[inline]
    pub fn first_in_offset_bin(&self, coords: [i32; 3], delta: [i32; 3]) -> Option<i32> {
        let mut c = [0i32; 3];
        for axis in 0..3 {
            let v = coords[axis] + delta[axis];
            if v < 0 || v >= self.nbin[axis] {
                return None;
            }
            c[axis] = v;
        }
        Some(self.head[self.linear(c)])
    }

    /// Next particle after `i` in its bin chain, `-1` at the end.
    #[inline]
    pub fn next_of(&self, i: usize) -> i32 {
        self.next[i]
    }

    /// How many bins a stencil must reach along each axis to cover `cut`.
    pub fn stencil_range(&self, cut: f64) -> [i32; 3] {
        let mut range = [0i32; 3];
        for axis in 0..3 {
            if axis == 2 && self.dimension == Dimension::Two {
                continue;
            }
            range[axis] = (cut * self.bininv_cart(axis)).ceil() as i32;
        }
        range
    }

    #[inline]
    fn bininv_cart(&self, axis: usize) -> f64 {
        1.0 / self.binsize_cart[axis]
    }

    /// Smallest squared Cartesian distance between bin (0,0,0) and the bin at
    /// offset `(i, j, k)`; prunes stencil offsets that can never hold a
    /// particle within cutoff.
    pub fn bin_distance_sq(&self, i: i32, j: i32, k: i32) -> f64 {
        let axis_dist = |d: i32, size: f64| -> f64 {
            if d > 0 {
                (d - 1) as f64 * size
            } else if d < 0 {
                (d + 1) as f64 * size
            } else {
                0.0
            }
        };
        let dx = axis_dist(i, self.binsize_cart[0]);
        let dy = axis_dist(j, self.binsize_cart[1]);
        let dz = if self.dimension == Dimension::Two {
            0.0
        } else {
            axis_dist(k, self.binsize_cart[2])
        };
        dx * dx + dy * dy + dz * dz
    }

    /// Largest single-bin occupancy observed during the last `assign`.
    pub fn max_occupancy(&self) -> usize {
        self.max_occupancy
    }

    /// How many particles the last `assign` covered.
    pub fn assigned_count(&self) -> usize {
        self.coords.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{NeighborConfig, Symmetry};
    use nalgebra::Point3;

    fn config(cutoff: f64, skin: f64) -> NeighborConfig {
        NeighborConfig::builder()
            .cutoff(cutoff)
            .skin(skin)
            .symmetry(Symmetry::Half)
            .build()
            .unwrap()
    }

    fn domain_10() -> Domain {
        Domain::orthogonal(Point3::origin(), Point3::new(10.0, 10.0, 10.0)).unwrap()
    }

    #[test]
    fn grid_covers_domain_plus_halo() {
        let domain = domain_10();
        let cfg = config(2.0, 0.5);
        let grid = BinGrid::new(&domain, &cfg, 2.5);

        // Extended extent 15.0, target edge 1.25 -> 12 bins per axis.
        assert_eq!(grid.nbin(), [12, 12, 12]);
        assert_eq!(grid.total_bins(), 12 * 12 * 12);
    }

    #[test]
    fn assign_places_particles_in_expected_bins() {
        let domain = domain_10();
        let cfg = config(2.0, 0.5);
        let mut grid = BinGrid::new(&domain, &cfg, 2.5);

        let particles = ParticleSet::from_positions(vec![
            Point3::new(0.1, 0.1, 0.1),
            Point3::new(0.2, 0.1, 0.1),
            Point3::new(9.9, 9.9, 9.9),
        ]);
        grid.assign(&particles, &domain).unwrap();

        assert_eq!(grid.coords_of(0), grid.coords_of(1));
        assert_ne!(grid.coords_of(0), grid.coords_of(2));

        // Chains run in ascending index order.
        let first = grid.first_in_offset_bin(grid.coords_of(0), [0, 0, 0]).unwrap();
        assert_eq!(first, 0);
        assert_eq!(grid.next_of(0), 1);
        assert_eq!(grid.next_of(1), -1);
    }

    #[test]
    fn ghost_particles_bin_inside_the_halo() {
        let domain = domain_10();
        let cfg = config(2.0, 0.5);
        let mut grid = BinGrid::new(&domain, &cfg, 2.5);

        let mut particles = ParticleSet::from_positions(vec![
            Point3::new(0.5, 5.0, 5.0),
            Point3::new(-1.5, 5.0, 5.0), // ghost from the neighboring sub-domain
        ]);
        particles.nlocal = 1;

        assert!(grid.assign(&particles, &domain).is_ok());
    }

    #[test]
    fn out_of_range_particle_is_fatal() {
        let domain = domain_10();
        let cfg = config(2.0, 0.5);
        let mut grid = BinGrid::new(&domain, &cfg, 2.5);

        let particles = ParticleSet::from_positions(vec![Point3::new(50.0, 5.0, 5.0)]);
        let err = grid.assign(&particles, &domain).unwrap_err();
        assert!(matches!(err, NeighborError::OutOfDomain { index: 0, .. }));
    }

    #[test]
    fn two_d_grid_never_subdivides_z() {
        let domain = domain_10();
        let cfg = NeighborConfig::builder()
            .cutoff(2.0)
            .skin(0.5)
            .symmetry(Symmetry::Half)
            .dimension(Dimension::Two)
            .build()
            .unwrap();
        let mut grid = BinGrid::new(&domain, &cfg, 2.5);
        assert_eq!(grid.nbin()[2], 1);

        // Arbitrary z never falls out of range in 2-D mode.
        let particles = ParticleSet::from_positions(vec![Point3::new(5.0, 5.0, 1.0e6)]);
        assert!(grid.assign(&particles, &domain).is_ok());
    }

    #[test]
    fn triclinic_grid_bins_in_lamda_space() {
        let domain = Domain::triclinic(
            Point3::origin(),
            Point3::new(10.0, 10.0, 10.0),
            3.0,
            0.0,
            0.0,
        )
        .unwrap();
        let cfg = config(2.0, 0.5);
        let mut grid = BinGrid::new(&domain, &cfg, 2.5);

        // The sheared far corner is inside the box even though its Cartesian x
        // exceeds hi.x.
        let particles = ParticleSet::from_positions(vec![Point3::new(12.5, 9.5, 5.0)]);
        assert!(grid.assign(&particles, &domain).is_ok());
    }

    #[test]
    fn stencil_range_covers_the_cutoff() {
        let domain = domain_10();
        let cfg = config(2.0, 0.5);
        let grid = BinGrid::new(&domain, &cfg, 2.5);

        let range = grid.stencil_range(2.5);
        for axis in 0..3 {
            assert!(range[axis] as f64 * grid.binsize_cart[axis] >= 2.5);
        }
    }

    #[test]
    fn bin_distance_is_zero_for_adjacent_bins() {
        let domain = domain_10();
        let cfg = config(2.0, 0.5);
        let grid = BinGrid::new(&domain, &cfg, 2.5);

        assert_eq!(grid.bin_distance_sq(0, 0, 0), 0.0);
        assert_eq!(grid.bin_distance_sq(1, 0, 0), 0.0);
        assert!(grid.bin_distance_sq(2, 0, 0) > 0.0);
    }
}
