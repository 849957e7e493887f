//! Matcher configuration.
//!
//! Replaces the original's global `debug` verbosity variable and
//! hardcoded driver bounds (`restart_count < 20`, `stage` capped at 3)
//! with an explicit, constructible options struct.

use crate::types::Stage;

/// Verbosity threshold for diagnostic logging, mirroring the original's
/// `debug ∈ {0,1,2,3}` knob. `tracing` targets are chosen so a caller can
/// also just set `RUST_LOG=runpre_matcher=debug` instead of using this
/// field; the field exists because some behavior (the `rerun` trace
/// pass) is gated on the verbosity level, not just log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum DebugLevel {
    /// No per-section diagnostics.
    #[default]
    Silent,
    /// Per-section mismatch summaries (original: `debug >= 1`).
    Summary,
    /// Reserved verbosity tier between `Summary` and `Detailed`,
    /// matching the original's unused `debug == 2`.
    Verbose,
    /// Relocation detail and search progress (original: `debug >= 3`).
    Detailed,
}

impl DebugLevel {
    fn rank(self) -> u8 {
        match self {
            DebugLevel::Silent => 0,
            DebugLevel::Summary => 1,
            DebugLevel::Verbose => 2,
            DebugLevel::Detailed => 3,
        }
    }

    /// Whether per-section mismatch summaries should be emitted.
    pub fn wants_summary(self) -> bool {
        self.rank() >= DebugLevel::Summary.rank()
    }

    /// Whether relocation detail and search progress should be emitted.
    pub fn wants_detail(self) -> bool {
        self.rank() >= DebugLevel::Detailed.rank()
    }
}

/// Configuration bounding and shaping a single matcher run.
///
/// Constructed with [`MatcherConfig::default`], or one of the named
/// presets below, and then adjusted field-by-field as needed.
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Diagnostic verbosity.
    pub debug: DebugLevel,
    /// Maximum number of full-pass restarts before declaring
    /// [`crate::error::MatchError::RestartLimitExceeded`] (default 20).
    pub restart_limit: u32,
    /// The most permissive stage the driver is allowed to escalate to
    /// (default [`Stage::Brute`]).
    pub max_stage: Stage,
    /// Module name prefix excluded from brute search as "this matcher's
    /// own modules".
    pub own_module_prefix: String,
    /// Module name suffix excluded from brute search (`_helper` suffix
    /// convention).
    pub own_module_suffix: String,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        MatcherConfig {
            debug: DebugLevel::Silent,
            restart_limit: 20,
            max_stage: Stage::Brute,
            own_module_prefix: String::new(),
            own_module_suffix: "_helper".to_string(),
        }
    }
}

impl MatcherConfig {
    /// A conservative preset that never escalates to brute-force
    /// scanning: only matches sections with unique or disambiguated
    /// candidates. Useful when an unexpected match would be costly to
    /// act on incorrectly.
    pub fn strict() -> Self {
        MatcherConfig {
            max_stage: Stage::AnyCandidate,
            debug: DebugLevel::Summary,
            ..Default::default()
        }
    }

    /// A preset that raises the restart bound and always permits brute
    /// search, for offline or diagnostic runs where wall-clock time
    /// matters less than eventually finding every section.
    pub fn exhaustive() -> Self {
        MatcherConfig {
            restart_limit: 100,
            max_stage: Stage::Brute,
            debug: DebugLevel::Detailed,
            ..Default::default()
        }
    }
}
