//! Typed error taxonomy for the AOI core.

use thiserror::Error;

/// Errors surfaced by the geometry, boundary, and assembly operations.
///
/// All failures are deterministic given the same input; nothing here is
/// worth retrying without changing the request.
#[derive(Debug, Error)]
pub enum AoiError {
    /// Malformed, empty, or unrepairable input geometry.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A polygon whose topology could not be fixed by best-effort repair.
    #[error("geometry repair failed: {0}")]
    GeometryRepair(String),

    /// A feature fed to the assembler failed geometry validation.
    #[error("invalid feature '{id}': {reason}")]
    InvalidFeature { id: String, reason: String },

    #[error("invalid buffer spec: {0}")]
    InvalidBufferSpec(String),

    /// No boundary layer is loaded for the requested country.
    #[error("no boundary data loaded for country '{0}'")]
    UnknownCountry(String),

    #[error("unknown region '{region}' for country '{country}'")]
    UnknownRegion { country: String, region: String },

    #[error("municipality '{city}' not found in region '{region}'")]
    UnknownMunicipality { region: String, city: String },

    /// The node set key is absent or has been evicted from the session store.
    #[error("unknown or expired node set '{0}'")]
    UnknownNodeSet(String),

    /// A node upload that could not be turned into coordinates.
    #[error("invalid node upload: {0}")]
    InvalidNodeUpload(String),
}

pub type Result<T> = std::result::Result<T, AoiError>;
