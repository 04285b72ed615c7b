use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Parameter {name} is invalid: {reason}")]
    Invalid {
        name: &'static str,
        reason: &'static str,
    },

    #[error("Incompatible configuration: {0}")]
    Incompatible(&'static str),
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Configuration rejected: {source}")]
    Invalid {
        #[from]
        source: ConfigError,
    },
}

/// Pair symmetry mode: record each interacting pair once, or once per direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Symmetry {
    Half,
    Full,
}

/// How cutoffs vary across particle types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CutoffVariant {
    /// A single cutoff shared by all type pairs; one shared stencil.
    Uniform,
    /// One stencil per type, sized to that type's fixed radius; pair cutoffs
    /// derive from the larger of the two per-type radii.
    PerTypeLegacy,
    /// One stencil per type, sized from the largest pairwise cutoff involving
    /// that type; the pair-cutoff matrix may be fully asymmetric.
    PerTypeCurrent,
}

/// When a consumer's list is (re)built relative to invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildCadence {
    /// Rebuilt eagerly inside every per-step update once stale.
    EveryStep,
    /// Marked on-demand when stale; built lazily on first access.
    Occasional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dimension {
    Two,
    Three,
}

/// Full configuration surface of one neighbor list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct NeighborConfig {
    /// Largest interaction cutoff this list must cover.
    pub cutoff: f64,
    /// Extra margin beyond the cutoff so a built list stays valid while
    /// particles move; a rebuild triggers once any particle has moved more
    /// than half of this since the last build.
    pub skin: f64,
    pub symmetry: Symmetry,
    /// Whether a boundary-straddling pair is assigned to exactly one owning
    /// rank (true) or duplicated on both (false). Only meaningful for half
    /// lists.
    #[serde(default = "default_newton")]
    pub newton: bool,
    #[serde(default = "default_cutoff_variant")]
    pub cutoff_variant: CutoffVariant,
    /// Also build neighbor rows for ghost particles.
    #[serde(default)]
    pub include_ghosts: bool,
    #[serde(default = "default_cadence")]
    pub cadence: BuildCadence,
    /// Skip bonded-exclusion rules entirely; every pair within cutoff is
    /// reported (used to build topology, not forces).
    #[serde(default)]
    pub size_aware: bool,
    #[serde(default = "default_dimension")]
    pub dimension: Dimension,
    /// Bin edge length as a fraction of cutoff + skin. Tuned empirically;
    /// smaller bins mean larger stencils but lower bin occupancy.
    #[serde(default = "default_bin_ratio")]
    pub bin_ratio: f64,
    /// Default capacity of one arena page, in packed neighbor entries.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_newton() -> bool {
    true
}
fn default_cutoff_variant() -> CutoffVariant {
    CutoffVariant::Uniform
}
fn default_cadence() -> BuildCadence {
    BuildCadence::EveryStep
}
fn default_dimension() -> Dimension {
    Dimension::Three
}
fn default_bin_ratio() -> f64 {
    0.5
}
fn default_page_size() -> usize {
    4096
}

impl NeighborConfig {
    pub fn builder() -> NeighborConfigBuilder {
        NeighborConfigBuilder::new()
    }

    /// Loads and validates a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let config: NeighborConfig =
            toml::from_str(&content).map_err(|e| ConfigLoadError::Toml {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects incompatible or nonsensical combinations at setup time.
    ///
    /// A failure here is fatal to this list's construction only; other lists
    /// are unaffected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cutoff > 0.0) {
            return Err(ConfigError::Invalid {
                name: "cutoff",
                reason: "must be positive",
            });
        }
        if !(self.skin >= 0.0) {
            return Err(ConfigError::Invalid {
                name: "skin",
                reason: "must be non-negative",
            });
        }
        if !(self.bin_ratio > 0.0 && self.bin_ratio <= 1.0) {
            return Err(ConfigError::Invalid {
                name: "bin_ratio",
                reason: "must lie in (0, 1]",
            });
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid {
                name: "page_size",
                reason: "must be positive",
            });
        }
        if self.include_ghosts && self.symmetry == Symmetry::Half && self.newton {
            return Err(ConfigError::Incompatible(
                "ghost-inclusive half lists require newton off; the pair owner \
                 tie-break is undefined for ghost-ghost pairs",
            ));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct NeighborConfigBuilder {
    cutoff: Option<f64>,
    skin: Option<f64>,
    symmetry: Option<Symmetry>,
    newton: Option<bool>,
    cutoff_variant: Option<CutoffVariant>,
    include_ghosts: Option<bool>,
    cadence: Option<BuildCadence>,
    size_aware: Option<bool>,
    dimension: Option<Dimension>,
    bin_ratio: Option<f64>,
    page_size: Option<usize>,
}

impl NeighborConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = Some(cutoff);
        self
    }
    pub fn skin(mut self, skin: f64) -> Self {
        self.skin = Some(skin);
        self
    }
    pub fn symmetry(mut self, symmetry: Symmetry) -> Self {
        self.symmetry = Some(symmetry);
        self
    }
    pub fn newton(mut self, newton: bool) -> Self {
        self.newton = Some(newton);
        self
    }
    pub fn cutoff_variant(mut self, variant: CutoffVariant) -> Self {
        self.cutoff_variant = Some(variant);
        self
    }
    pub fn include_ghosts(mut self, include: bool) -> Self {
        self.include_ghosts = Some(include);
        self
    }
    pub fn cadence(mut self, cadence: BuildCadence) -> Self {
        self.cadence = Some(cadence);
        self
    }
    pub fn size_aware(mut self, size_aware: bool) -> Self {
        self.size_aware = Some(size_aware);
        self
    }
    pub fn dimension(mut self, dimension: Dimension) -> Self {
        self.dimension = Some(dimension);
        self
    }
    pub fn bin_ratio(mut self, ratio: f64) -> Self {
        self.bin_ratio = Some(ratio);
        self
    }
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn build(self) -> Result<NeighborConfig, ConfigError> {
        let config = NeighborConfig {
            cutoff: self.cutoff.ok_or(ConfigError::MissingParameter("cutoff"))?,
            skin: self.skin.ok_or(ConfigError::MissingParameter("skin"))?,
            symmetry: self
                .symmetry
                .ok_or(ConfigError::MissingParameter("symmetry"))?,
            newton: self.newton.unwrap_or_else(default_newton),
            cutoff_variant: self.cutoff_variant.unwrap_or_else(default_cutoff_variant),
            include_ghosts: self.include_ghosts.unwrap_or(false),
            cadence: self.cadence.unwrap_or_else(default_cadence),
            size_aware: self.size_aware.unwrap_or(false),
            dimension: self.dimension.unwrap_or_else(default_dimension),
            bin_ratio: self.bin_ratio.unwrap_or_else(default_bin_ratio),
            page_size: self.page_size.unwrap_or_else(default_page_size),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Per-type-pair neighbor cutoffs, with the per-type and global maxima the
/// stencil generator queries.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeCutoffs {
    ntypes: usize,
    cut: Vec<f64>,
}

impl TypeCutoffs {
    /// One shared cutoff for every type pair.
    pub fn uniform(ntypes: usize, cutoff: f64) -> Self {
        Self {
            ntypes: ntypes.max(1),
            cut: vec![cutoff; ntypes.max(1) * ntypes.max(1)],
        }
    }

    /// Legacy per-type radii: the pair cutoff is the larger of the two
    /// per-type radii.
    pub fn from_type_radii(radii: &[f64]) -> Self {
        let n = radii.len().max(1);
        let mut cut = vec![0.0; n * n];
        if radii.is_empty() {
            return Self { ntypes: n, cut };
        }
        for i in 0..n {
            for j in 0..n {
                cut[i * n + j] = radii[i].max(radii[j]);
            }
        }
        Self { ntypes: n, cut }
    }

    /// Fully general pair-cutoff matrix (current multi variant). Explicit
    /// entries are symmetrized with the larger value so both scan directions
    /// agree; pairs with no entry take the `fill` cutoff.
    pub fn from_matrix(ntypes: usize, entries: &[(usize, usize, f64)], fill: f64) -> Self {
        let n = ntypes.max(1);
        let mut cut: Vec<Option<f64>> = vec![None; n * n];
        for &(i, j, c) in entries {
            let merged = cut[i * n + j].map_or(c, |prev| prev.max(c));
            cut[i * n + j] = Some(merged);
            cut[j * n + i] = Some(merged);
        }
        Self {
            ntypes: n,
            cut: cut.into_iter().map(|c| c.unwrap_or(fill)).collect(),
        }
    }

    pub fn ntypes(&self) -> usize {
        self.ntypes
    }

    pub fn cut(&self, i: usize, j: usize) -> f64 {
        self.cut[i * self.ntypes + j]
    }

    pub fn cut_sq(&self, i: usize, j: usize) -> f64 {
        let c = self.cut(i, j);
        c * c
    }

    /// Largest cutoff involving type `i`; sizes that type's stencil.
    pub fn type_max(&self, i: usize) -> f64 {
        self.cut[i * self.ntypes..(i + 1) * self.ntypes]
            .iter()
            .fold(0.0, |acc, &c| acc.max(c))
    }

    pub fn max(&self) -> f64 {
        self.cut.iter().fold(0.0, |acc, &c| acc.max(c))
    }

    /// A copy with the skin distance added to every pair cutoff; list builds
    /// test distances against these inflated values so the list survives
    /// sub-skin motion.
    pub fn inflated(&self, skin: f64) -> Self {
        Self {
            ntypes: self.ntypes,
            cut: self.cut.iter().map(|c| c + skin).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn builder_requires_core_parameters() {
        let err = NeighborConfigBuilder::new().build().unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("cutoff"));

        let err = NeighborConfigBuilder::new()
            .cutoff(2.5)
            .skin(0.3)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("symmetry"));
    }

    #[test]
    fn builder_applies_defaults() {
        let config = NeighborConfig::builder()
            .cutoff(2.5)
            .skin(0.3)
            .symmetry(Symmetry::Half)
            .build()
            .unwrap();

        assert!(config.newton);
        assert_eq!(config.cutoff_variant, CutoffVariant::Uniform);
        assert_eq!(config.cadence, BuildCadence::EveryStep);
        assert_eq!(config.dimension, Dimension::Three);
        assert!(!config.include_ghosts);
        assert!(!config.size_aware);
        assert_eq!(config.bin_ratio, 0.5);
        assert_eq!(config.page_size, 4096);
    }

    #[test]
    fn validate_rejects_nonpositive_cutoff() {
        let err = NeighborConfig::builder()
            .cutoff(0.0)
            .skin(0.3)
            .symmetry(Symmetry::Half)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "cutoff", .. }));
    }

    #[test]
    fn validate_rejects_ghost_half_newton() {
        let err = NeighborConfig::builder()
            .cutoff(2.5)
            .skin(0.3)
            .symmetry(Symmetry::Half)
            .newton(true)
            .include_ghosts(true)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Incompatible(_)));

        // Newton off is the supported ghost-inclusive half combination.
        let config = NeighborConfig::builder()
            .cutoff(2.5)
            .skin(0.3)
            .symmetry(Symmetry::Half)
            .newton(false)
            .include_ghosts(true)
            .build();
        assert!(config.is_ok());
    }

    #[test]
    fn load_parses_toml_and_validates() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("neighbor.toml");
        fs::write(
            &path,
            r#"
            cutoff = 2.5
            skin = 0.3
            symmetry = "half"
            newton = false
            cutoff-variant = "per-type-legacy"
            cadence = "occasional"
            dimension = "two"
            "#,
        )
        .expect("Failed to write temporary file for test");

        let config = NeighborConfig::load(&path).unwrap();
        assert_eq!(config.cutoff, 2.5);
        assert_eq!(config.symmetry, Symmetry::Half);
        assert_eq!(config.cutoff_variant, CutoffVariant::PerTypeLegacy);
        assert_eq!(config.cadence, BuildCadence::Occasional);
        assert_eq!(config.dimension, Dimension::Two);
        assert!(!config.newton);
    }

    #[test]
    fn load_reports_invalid_file_contents() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("neighbor.toml");
        fs::write(&path, "cutoff = -1.0\nskin = 0.3\nsymmetry = \"full\"\n")
            .expect("Failed to write temporary file for test");

        let err = NeighborConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Invalid { .. }));
    }

    #[test]
    fn legacy_radii_resolve_pair_cutoff_to_larger_radius() {
        let cutoffs = TypeCutoffs::from_type_radii(&[1.0, 2.0]);
        assert_eq!(cutoffs.cut(0, 0), 1.0);
        assert_eq!(cutoffs.cut(0, 1), 2.0);
        assert_eq!(cutoffs.cut(1, 0), 2.0);
        assert_eq!(cutoffs.type_max(0), 2.0);
        assert_eq!(cutoffs.max(), 2.0);
    }

    #[test]
    fn matrix_cutoffs_are_symmetrized() {
        let cutoffs = TypeCutoffs::from_matrix(2, &[(0, 1, 3.0), (1, 0, 2.0)], 1.0);
        assert_eq!(cutoffs.cut(0, 1), 3.0);
        assert_eq!(cutoffs.cut(1, 0), 3.0); // larger direction wins
        assert_eq!(cutoffs.type_max(1), 3.0);
    }

    #[test]
    fn explicit_matrix_entry_below_fill_is_honored() {
        let cutoffs = TypeCutoffs::from_matrix(2, &[(0, 0, 1.0)], 2.0);
        assert_eq!(cutoffs.cut(0, 0), 1.0);
        // Unspecified pairs take the fill cutoff.
        assert_eq!(cutoffs.cut(0, 1), 2.0);
        assert_eq!(cutoffs.cut(1, 1), 2.0);
    }

    #[test]
    fn inflated_adds_skin_to_every_pair() {
        let cutoffs = TypeCutoffs::uniform(2, 1.5).inflated(0.3);
        assert!((cutoffs.cut(0, 1) - 1.8).abs() < 1e-12);
        assert!((cutoffs.max() - 1.8).abs() < 1e-12);
    }
}
