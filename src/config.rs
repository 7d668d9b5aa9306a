//! Pipeline configuration with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. Built-in defaults
//! 2. Optional TOML file (`--config`, or `biograph.toml` in the working directory)
//! 3. Environment variables: `BIOGRAPH_*` (e.g. `BIOGRAPH_OUTPUT_ROOT`)
//!
//! Command-line flags are applied on top by the binary.
//!
//! ```toml
//! output_root = "/data/biograph"
//! input_root = "/data/sources"
//! sample_size = 10
//! spill_threshold = 500000
//! dangling = "fail"
//! ```

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::dedup::DedupConfig;
use crate::export::{DanglingPolicy, DumpWriter};
use crate::{Error, Result};

/// Project config file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "biograph.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Dumps land in `<output_root>/<source>/`.
    pub output_root: PathBuf,
    /// Where file-based adapters find `<input_root>/<source>/`.
    pub input_root: Option<PathBuf>,
    /// Rows copied into the uncompressed sample files.
    pub sample_size: usize,
    /// Records buffered in memory before the dedup stage spills a run.
    pub spill_threshold: usize,
    /// Spill directory; the system temp dir if unset.
    pub spill_dir: Option<PathBuf>,
    pub dangling: DanglingPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("./biograph-out"),
            input_root: None,
            sample_size: 10,
            spill_threshold: 500_000,
            spill_dir: None,
            dangling: DanglingPolicy::Drop,
        }
    }
}

impl PipelineConfig {
    /// Load defaults ← TOML ← environment.
    ///
    /// An explicit `file` must exist; the implicit `biograph.toml` is optional.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let toml = match file {
            Some(path) if !path.is_file() => {
                return Err(Error::Config(format!("config file {} not found", path.display())));
            }
            Some(path) => Toml::file(path),
            None => Toml::file(DEFAULT_CONFIG_FILE),
        };
        Self::figment(toml).extract().map_err(|e| Error::Config(e.to_string()))
    }

    fn figment(toml: figment::providers::Data<Toml>) -> Figment {
        Figment::from(Serialized::defaults(PipelineConfig::default()))
            .merge(toml)
            .merge(Env::prefixed("BIOGRAPH_"))
    }

    pub fn dedup_config(&self) -> DedupConfig {
        DedupConfig { spill_threshold: self.spill_threshold, spill_dir: self.spill_dir.clone() }
    }

    pub fn dump_writer(&self) -> DumpWriter {
        DumpWriter::new(&self.output_root)
            .with_sample_size(self.sample_size)
            .with_dangling(self.dangling)
    }

    /// Input root, falling back to the working directory.
    pub fn input_root(&self) -> PathBuf {
        self.input_root.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}
