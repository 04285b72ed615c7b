use nalgebra::{Matrix3, Point3, Vector3};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Domain has non-positive extent along axis {axis}: lo {lo} >= hi {hi}")]
    NonPositiveExtent { axis: usize, lo: f64, hi: f64 },
    #[error("Domain basis matrix is not invertible")]
    NotInvertible,
}

/// The local simulation sub-domain assigned to this rank.
///
/// Supports axis-aligned orthogonal boxes and triclinic (sheared) boxes
/// described by the three tilt factors `xy`, `xz`, `yz`. For triclinic
/// domains, binning happens in the box's natural fractional coordinate
/// system ("lamda" space, each axis in `[0, 1]` inside the sub-domain),
/// not in Cartesian space.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    lo: Point3<f64>,
    hi: Point3<f64>,
    h: Matrix3<f64>,
    h_inv: Matrix3<f64>,
    triclinic: bool,
}

impl Domain {
    /// Creates an axis-aligned orthogonal sub-domain from its corner bounds.
    pub fn orthogonal(lo: Point3<f64>, hi: Point3<f64>) -> Result<Self, DomainError> {
        Self::triclinic(lo, hi, 0.0, 0.0, 0.0).map(|mut d| {
            d.triclinic = false;
            d
        })
    }

    /// Creates a triclinic sub-domain with tilt factors `xy`, `xz`, `yz`.
    ///
    /// The basis follows the upper-triangular convention: the first edge lies
    /// along x, the second in the xy plane tilted by `xy`, the third tilted by
    /// `xz` and `yz`.
    pub fn triclinic(
        lo: Point3<f64>,
        hi: Point3<f64>,
        xy: f64,
        xz: f64,
        yz: f64,
    ) -> Result<Self, DomainError> {
        for axis in 0..3 {
            if hi[axis] <= lo[axis] {
                return Err(DomainError::NonPositiveExtent {
                    axis,
                    lo: lo[axis],
                    hi: hi[axis],
                });
            }
        }
        let h = Matrix3::new(
            hi.x - lo.x,
            xy,
            xz,
            0.0,
            hi.y - lo.y,
            yz,
            0.0,
            0.0,
            hi.z - lo.z,
        );
        let h_inv = h.try_inverse().ok_or(DomainError::NotInvertible)?;
        Ok(Self {
            lo,
            hi,
            h,
            h_inv,
            triclinic: true,
        })
    }

    pub fn lo(&self) -> Point3<f64> {
        self.lo
    }

    pub fn hi(&self) -> Point3<f64> {
        self.hi
    }

    pub fn is_triclinic(&self) -> bool {
        self.triclinic
    }

    /// Edge lengths of the bounding box, ignoring tilt.
    pub fn lengths(&self) -> Vector3<f64> {
        self.hi - self.lo
    }

    /// Converts a Cartesian position into fractional (lamda) coordinates,
    /// `[0, 1]` per axis inside the sub-domain.
    pub fn to_lamda(&self, x: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.h_inv * (x - self.lo))
    }

    /// Converts fractional (lamda) coordinates back to Cartesian.
    pub fn from_lamda(&self, lamda: &Point3<f64>) -> Point3<f64> {
        self.lo + self.h * lamda.coords
    }

    /// Perpendicular distance between the two parallel faces normal to `axis`.
    ///
    /// Equals the edge length for orthogonal boxes; shrinks with tilt. Used to
    /// size bins so that one bin row always covers the cutoff along each axis.
    pub fn perpendicular_width(&self, axis: usize) -> f64 {
        1.0 / self.h_inv.row(axis).norm()
    }

    /// Opaque fingerprint of the box geometry, used to detect geometry changes
    /// and to share identically-shaped bin grids between lists.
    pub fn geometry_key(&self) -> [u64; 9] {
        let mut key = [0u64; 9];
        let values = [
            self.lo.x, self.lo.y, self.lo.z, self.hi.x, self.hi.y, self.hi.z, self.h.m12,
            self.h.m13, self.h.m23,
        ];
        for (slot, v) in key.iter_mut().zip(values) {
            *slot = v.to_bits();
        }
        key
    }
}
