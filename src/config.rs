//! Process-wide numeric configuration, selected once before use.
//!
//! The configuration is installed with [`configure`] at program start.
//! The first [`SimplicialComplex`][crate::SimplicialComplex] or
//! [`Cochain`][crate::Cochain] construction seals it (installing the
//! default if none was chosen); calling [`configure`] after that point
//! fails with [`ConfigError::AlreadySealed`] instead of silently
//! reconfiguring half-built state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

/// Floating-point precision regime for geometric computations.
///
/// Coefficients are stored as `f64` either way; the selection controls
/// the tolerance below which a linear solve or a volume ratio is
/// treated as degenerate, matching the precision the surrounding
/// pipeline actually carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FloatPrecision {
    /// Single-precision regime, degeneracy tolerance 1e-6.
    Single,
    /// Double-precision regime, degeneracy tolerance 1e-12.
    #[default]
    Double,
}

/// Width of the index type the mesh data is expected to round-trip
/// through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IntWidth {
    /// Vertex and simplex counts must fit in 32 bits;
    /// violations are rejected at complex construction.
    Narrow,
    /// Native index width, no extra validation.
    #[default]
    Wide,
}

/// Compute device selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Device {
    /// Synchronous CPU execution (the only supported device).
    #[default]
    Cpu,
}

/// Immutable process-wide configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// Precision regime, see [`FloatPrecision`].
    pub float_precision: FloatPrecision,
    /// Index width validation, see [`IntWidth`].
    pub int_width: IntWidth,
    /// Compute device, see [`Device`].
    pub device: Device,
}

impl Config {
    /// Threshold under which determinants, pivots, and volume ratios
    /// are considered degenerate.
    #[inline]
    pub fn degeneracy_tolerance(&self) -> f64 {
        match self.float_precision {
            FloatPrecision::Single => 1e-6,
            FloatPrecision::Double => 1e-12,
        }
    }

    /// Largest vertex/simplex count accepted under the configured
    /// index width.
    #[inline]
    pub(crate) fn max_index(&self) -> usize {
        match self.int_width {
            IntWidth::Narrow => i32::MAX as usize,
            IntWidth::Wide => usize::MAX,
        }
    }

    /// The active configuration, sealing it as used.
    ///
    /// Called internally by every complex and cochain constructor.
    /// If [`configure`] was never called, the default configuration
    /// is installed here.
    pub fn global() -> Config {
        SEALED.store(true, Ordering::Release);
        *CONFIG.get_or_init(Config::default)
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();
static SEALED: AtomicBool = AtomicBool::new(false);

/// Error in configuration handling.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// [`configure`] was called after the configuration was already
    /// installed or sealed by a complex/cochain construction.
    #[error("configuration is already sealed and cannot be changed")]
    AlreadySealed,
}

/// Install the process-wide configuration.
///
/// Must be called before any complex or cochain is constructed,
/// and at most once.
pub fn configure(config: Config) -> Result<(), ConfigError> {
    if SEALED.load(Ordering::Acquire) {
        return Err(ConfigError::AlreadySealed);
    }
    CONFIG.set(config).map_err(|_| ConfigError::AlreadySealed)
}
