use thiserror::Error;

use super::config::ConfigError;
use crate::core::models::domain::DomainError;

#[derive(Debug, Error)]
pub enum NeighborError {
    #[error("List configuration rejected: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Domain geometry error: {source}")]
    Domain {
        #[from]
        source: DomainError,
    },

    #[error(
        "Particle {index} at ({x:.6}, {y:.6}, {z:.6}) maps outside the allocated bin range; \
         the domain decomposition must reclaim escaped particles before a build"
    )]
    OutOfDomain { index: usize, x: f64, y: f64, z: f64 },

    #[error("Unknown list handle")]
    UnknownList,

    #[error("Internal logic error: {0}")]
    Internal(String),
}
