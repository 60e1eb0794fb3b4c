//! Error types for the economy simulation.
//!
//! Every error is returned synchronously to the caller of an action or a
//! loader. Tick arithmetic never produces errors: divisions fall back to zero
//! and stocks clamp at zero instead.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    // ------------------------------------------------------------------
    // Validation errors
    // ------------------------------------------------------------------
    /// Unknown orbital zone identifier.
    #[error("Unknown zone: {0}")]
    UnknownZone(String),

    /// Unknown building identifier.
    #[error("Unknown building: {0}")]
    UnknownBuilding(String),

    /// Unknown probe type identifier.
    #[error("Unknown probe type: {0}")]
    UnknownProbeType(String),

    /// A transfer was requested with identical source and destination.
    #[error("Transfer source and destination are the same zone: {0}")]
    SameZoneTransfer(String),

    /// A continuous transfer rate (or one-time count) was not positive.
    #[error("Transfer amount must be positive, got {0}")]
    InvalidTransferRate(f64),

    /// A manual probe allocation request was malformed.
    #[error("Invalid allocation: {0}")]
    InvalidAllocation(String),

    /// A building may not be placed in the requested zone.
    #[error("Building {building} is not allowed in zone {zone}")]
    BuildingNotAllowed {
        /// Building identifier.
        building: String,
        /// Zone identifier.
        zone: String,
    },

    // ------------------------------------------------------------------
    // Resource insufficiency
    // ------------------------------------------------------------------
    /// Insufficient global resources.
    #[error("Insufficient resources: need {required} {resource}, have {available}")]
    InsufficientResources {
        /// Resource name.
        resource: String,
        /// Amount required.
        required: f64,
        /// Amount available.
        available: f64,
    },

    /// Insufficient probes in a zone.
    #[error("Insufficient probes in {zone}: need {required}, have {available}")]
    InsufficientProbes {
        /// Zone identifier.
        zone: String,
        /// Probes required.
        required: f64,
        /// Probes available.
        available: f64,
    },

    // ------------------------------------------------------------------
    // Prerequisites
    // ------------------------------------------------------------------
    /// A required structure is absent.
    #[error("Prerequisite not met for {target}: requires {prerequisite}")]
    PrerequisiteNotMet {
        /// What was being purchased.
        target: String,
        /// Missing structure.
        prerequisite: String,
    },

    // ------------------------------------------------------------------
    // Not found
    // ------------------------------------------------------------------
    /// Transfer id not present in the active list.
    #[error("Transfer not found: {0}")]
    TransferNotFound(u64),

    /// Research tree id not present in state.
    #[error("Research tree not found: {0}")]
    ResearchTreeNotFound(String),

    /// Research tier id not present in its tree.
    #[error("Research tier not found: {tree}/{tier}")]
    ResearchTierNotFound {
        /// Tree identifier.
        tree: String,
        /// Tier identifier.
        tier: String,
    },

    /// No structure of the given type exists in the zone.
    #[error("No {building} structures in zone {zone}")]
    StructureNotFound {
        /// Zone identifier.
        zone: String,
        /// Building identifier.
        building: String,
    },

    // ------------------------------------------------------------------
    // Data and state
    // ------------------------------------------------------------------
    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path (or label) of the data that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Static game data failed validation.
    #[error("Invalid game data: {0}")]
    InvalidData(String),

    /// Invalid game state (serialization failures, corrupt saves).
    #[error("Invalid game state: {0}")]
    InvalidState(String),

    /// A replayed action log diverged from its recorded hash.
    #[error("Desync detected at tick {tick}: expected hash {expected_hash}, got {actual_hash}")]
    DesyncDetected {
        /// Tick where the divergence was detected.
        tick: u64,
        /// Recorded hash.
        expected_hash: u64,
        /// Hash produced by the replay.
        actual_hash: u64,
    },
}

impl GameError {
    /// Short machine-readable kind, used by the headless protocol.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownZone(_)
            | Self::UnknownBuilding(_)
            | Self::UnknownProbeType(_)
            | Self::SameZoneTransfer(_)
            | Self::InvalidTransferRate(_)
            | Self::InvalidAllocation(_)
            | Self::BuildingNotAllowed { .. } => "validation",
            Self::InsufficientResources { .. } | Self::InsufficientProbes { .. } => {
                "insufficient"
            }
            Self::PrerequisiteNotMet { .. } => "prerequisite",
            Self::TransferNotFound(_)
            | Self::ResearchTreeNotFound(_)
            | Self::ResearchTierNotFound { .. }
            | Self::StructureNotFound { .. } => "not_found",
            Self::DataParseError { .. } | Self::InvalidData(_) => "data",
            Self::InvalidState(_) | Self::DesyncDetected { .. } => "state",
        }
    }
}
