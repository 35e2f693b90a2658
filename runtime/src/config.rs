//! Bind configuration: optimization level and target feature selection.

use std::str::FromStr;

use bon::bon;
use inkwell::OptimizationLevel;

use crate::{Error, Result};

/// Feature mask applied unless the caller opts in to the host's full feature set.
///
/// AVX detection has been unreliable on virtualized hosts, so it stays off by default.
pub const CONSERVATIVE_FEATURES: &str = "-avx";

/// Optimization level for both the pass pipeline and JIT code generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OptLevel {
    None,
    Less,
    Default,
    #[default]
    Aggressive,
}

impl OptLevel {
    /// New pass manager pipeline string.
    pub const fn pipeline(&self) -> &'static str {
        match self {
            Self::None => "default<O0>",
            Self::Less => "default<O1>",
            Self::Default => "default<O2>",
            Self::Aggressive => "default<O3>",
        }
    }

    pub const fn codegen_level(&self) -> OptimizationLevel {
        match self {
            Self::None => OptimizationLevel::None,
            Self::Less => OptimizationLevel::Less,
            Self::Default => OptimizationLevel::Default,
            Self::Aggressive => OptimizationLevel::Aggressive,
        }
    }
}

impl FromStr for OptLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "0" => Ok(Self::None),
            "1" => Ok(Self::Less),
            "2" => Ok(Self::Default),
            "3" => Ok(Self::Aggressive),
            other => Err(Error::InvalidConfig { reason: format!("optimization level '{other}' is not 0..3") }),
        }
    }
}

/// Configuration of a single `bind` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindConfig {
    /// Optimization level.
    pub opt_level: OptLevel,
    /// Enable loop and SLP vectorization in the pass pipeline.
    pub vectorize: bool,
    /// Target CPU name. `None` selects the host CPU.
    pub cpu: Option<String>,
    /// LLVM target feature string, e.g. `"-avx"` or `"+sse4.2,-avx"`.
    pub features: String,
    /// Verify the module before optimizing it.
    pub verify: bool,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            opt_level: OptLevel::default(),
            vectorize: true,
            cpu: None,
            features: CONSERVATIVE_FEATURES.to_string(),
            verify: true,
        }
    }
}

#[bon]
impl BindConfig {
    /// Create a bind configuration with builder pattern.
    #[builder]
    pub fn builder(
        #[builder(default)] opt_level: OptLevel,
        #[builder(default = true)] vectorize: bool,
        cpu: Option<String>,
        #[builder(default = CONSERVATIVE_FEATURES.to_string())] features: String,
        #[builder(default = true)] verify: bool,
    ) -> Self {
        Self { opt_level, vectorize, cpu, features, verify }
    }

    /// Use every feature the host reports, AVX included.
    pub fn host_native() -> Self {
        let features = inkwell::targets::TargetMachine::get_host_cpu_features().to_string();
        Self { features, ..Self::default() }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `KBIND_OPT_LEVEL` - Optimization level 0..3 (default: 3)
    /// * `KBIND_TARGET_FEATURES` - LLVM feature string (default: `-avx`)
    /// * `KBIND_TARGET_CPU` - Target CPU name (default: host CPU)
    /// * `KBIND_NO_VECTORIZE` - Disable vectorization if set
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`BindConfig::from_env`], reading variables through `lookup`.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let opt_level = match lookup("KBIND_OPT_LEVEL").map(|s| s.parse::<OptLevel>()) {
            Some(Ok(level)) => level,
            Some(Err(err)) => {
                tracing::warn!(%err, "ignoring KBIND_OPT_LEVEL");
                defaults.opt_level
            }
            None => defaults.opt_level,
        };
        let features = lookup("KBIND_TARGET_FEATURES").unwrap_or(defaults.features);
        let cpu = lookup("KBIND_TARGET_CPU").filter(|cpu| !cpu.is_empty());
        let vectorize = lookup("KBIND_NO_VECTORIZE").is_none();

        Self { opt_level, vectorize, cpu, features, verify: defaults.verify }
    }
}
