/// Bonded-path classification of a candidate pair.
///
/// Particles connected by a short bonded path (directly bonded, or separated
/// by one or two intermediate bonds) are subject to the special-bonds scheme:
/// the pair may be dropped entirely, kept as an ordinary neighbor, or kept
/// with a scale marker the force consumer applies later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SpecialKind {
    /// Not bonded within three bonds; an ordinary neighbor.
    #[default]
    None,
    /// Directly bonded (1-2).
    OneTwo,
    /// Separated by one intermediate particle (1-3).
    OneThree,
    /// Separated by two intermediate particles (1-4).
    OneFour,
}

/// What the pair-list builder should do with a bonded candidate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PairDisposition {
    /// Store the neighbor as a plain index.
    Keep,
    /// Store the neighbor with its path class packed into the index.
    KeepScaled(SpecialKind),
    /// Suppress the pair entirely.
    Drop,
}

/// The special-bonds weighting scheme supplied by the simulation driver.
///
/// One weight per bonded-path class (1-2, 1-3, 1-4). A weight of exactly 0.0
/// fully excludes such pairs from the list, exactly 1.0 passes them through
/// unmarked, and any other value keeps them marked with the path class so the
/// consumer can apply the scale factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecialScheme {
    weights: [f64; 3],
}

impl SpecialScheme {
    pub fn new(one_two: f64, one_three: f64, one_four: f64) -> Self {
        Self {
            weights: [one_two, one_three, one_four],
        }
    }

    /// Scheme that excludes nothing; every candidate pair is kept plain.
    pub fn pass_through() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    /// Scheme that fully excludes all three bonded-path classes.
    pub fn exclude_all() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn weight(&self, kind: SpecialKind) -> f64 {
        match kind {
            SpecialKind::None => 1.0,
            SpecialKind::OneTwo => self.weights[0],
            SpecialKind::OneThree => self.weights[1],
            SpecialKind::OneFour => self.weights[2],
        }
    }

    pub fn disposition(&self, kind: SpecialKind) -> PairDisposition {
        let w = self.weight(kind);
        if w == 0.0 {
            PairDisposition::Drop
        } else if w == 1.0 {
            PairDisposition::Keep
        } else {
            PairDisposition::KeepScaled(kind)
        }
    }
}

/// Per-particle bonded-partner table, indexed by local particle index.
///
/// Partners are identified by global tag rather than local index, since a
/// bonded partner may currently be a ghost with a different local index on
/// every rank.
#[derive(Debug, Clone, Default)]
pub struct ExclusionTable {
    partners: Vec<Vec<(i64, SpecialKind)>>,
}

impl ExclusionTable {
    /// Creates an empty table covering `n` local particles.
    pub fn new(n: usize) -> Self {
        Self {
            partners: vec![Vec::new(); n],
        }
    }

    /// Records that the particle at local index `i` is bonded to the particle
    /// with global tag `tag` through a path of class `kind`.
    pub fn add(&mut self, i: usize, tag: i64, kind: SpecialKind) {
        self.partners[i].push((tag, kind));
    }

    /// Looks up the bonded-path class between local particle `i` and the
    /// particle with global tag `tag`.
    pub fn kind(&self, i: usize, tag: i64) -> SpecialKind {
        match self.partners.get(i) {
            Some(list) => list
                .iter()
                .find(|(t, _)| *t == tag)
                .map(|(_, k)| *k)
                .unwrap_or(SpecialKind::None),
            None => SpecialKind::None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.partners.iter().all(|p| p.is_empty())
    }
}

// Packed neighbor-entry encoding. The two high bits of each stored u32 carry
// the bonded-path class; the remaining 30 bits carry the neighbor's local
// index. Pack/unpack is centralized here so no other module touches the bit
// layout.

const KIND_SHIFT: u32 = 30;

/// Mask extracting the index field from a packed entry.
pub const NEIGH_MASK: u32 = (1 << KIND_SHIFT) - 1;

/// Largest local index a packed entry can carry.
pub const MAX_PACKED_INDEX: usize = NEIGH_MASK as usize;

/// Packs a neighbor index and its bonded-path class into one entry.
#[inline]
pub fn pack(j: usize, kind: SpecialKind) -> u32 {
    debug_assert!(j <= MAX_PACKED_INDEX);
    let bits = match kind {
        SpecialKind::None => 0u32,
        SpecialKind::OneTwo => 1,
        SpecialKind::OneThree => 2,
        SpecialKind::OneFour => 3,
    };
    (bits << KIND_SHIFT) | j as u32
}

/// The neighbor's local index, with the path-class bits masked off.
#[inline]
pub fn index_of(entry: u32) -> usize {
    (entry & NEIGH_MASK) as usize
}

/// The bonded-path class carried by a packed entry.
#[inline]
pub fn kind_of(entry: u32) -> SpecialKind {
    match entry >> KIND_SHIFT {
        0 => SpecialKind::None,
        1 => SpecialKind::OneTwo,
        2 => SpecialKind::OneThree,
        _ => SpecialKind::OneFour,
    }
}
