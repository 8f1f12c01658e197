//! Conversion configuration
//!
//! Loaded from a JSON file when one is given; every field has a default matching
//! the CIFAR-10 binary distribution, so `{}` is a valid configuration.
//!
//! ```json
//! {
//!   "input_dir": "cifar-10-batches-bin",
//!   "layout": { "width": 32, "height": 32, "depth": 3, "classes": 10 },
//!   "training": { "input": "training.bin", "output": "cifar10_training.parquet", "examples": 49920 },
//!   "test": { "input": "test.bin", "output": "cifar10_test.parquet", "examples": 9984 }
//! }
//! ```

use crate::cifar::ImageLayout;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Training examples converted by default (the legacy tool dropped the last 80)
pub const DEFAULT_TRAINING_EXAMPLES: usize = 49_920;
/// Test examples converted by default (the legacy tool dropped the last 16)
pub const DEFAULT_TEST_EXAMPLES: usize = 9_984;

/// Input/output pair for one split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Record file, relative to `input_dir`
    pub input: PathBuf,
    /// Container file, relative to `output_dir`
    pub output: PathBuf,
    /// Records to convert; `None` converts the whole file
    pub examples: Option<usize>,
}

impl SplitConfig {
    fn training() -> Self {
        Self {
            input: PathBuf::from("training.bin"),
            output: PathBuf::from("cifar10_training.parquet"),
            examples: Some(DEFAULT_TRAINING_EXAMPLES),
        }
    }

    fn test() -> Self {
        Self {
            input: PathBuf::from("test.bin"),
            output: PathBuf::from("cifar10_test.parquet"),
            examples: Some(DEFAULT_TEST_EXAMPLES),
        }
    }
}

fn default_training() -> SplitConfig {
    SplitConfig::training()
}

fn default_test() -> SplitConfig {
    SplitConfig::test()
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Full converter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConvertConfig {
    /// Directory holding the record files
    #[serde(default = "default_dir")]
    pub input_dir: PathBuf,
    /// Directory receiving the container files
    #[serde(default = "default_dir")]
    pub output_dir: PathBuf,
    /// Geometry shared by both splits
    #[serde(default)]
    pub layout: ImageLayout,
    /// Training split
    #[serde(default = "default_training")]
    pub training: SplitConfig,
    /// Test split
    #[serde(default = "default_test")]
    pub test: SplitConfig,
    /// Where to write collected metrics as JSON lines
    #[serde(default)]
    pub metrics_out: Option<PathBuf>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            input_dir: default_dir(),
            output_dir: default_dir(),
            layout: ImageLayout::default(),
            training: SplitConfig::training(),
            test: SplitConfig::test(),
            metrics_out: None,
        }
    }
}

impl ConvertConfig {
    /// Load a configuration file and validate it.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the file cannot be read, [`Error::Json`] if it is not
    /// a valid configuration document, or [`Error::Config`] if validation fails.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read(path.as_ref())?;
        let config: Self = serde_json::from_slice(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the converter cannot honor.
    ///
    /// # Errors
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let layout = self.layout;
        if layout.width == 0 || layout.height == 0 || layout.depth == 0 {
            return Err(Error::Config(format!(
                "image dimensions must be non-zero, got {}x{}x{}",
                layout.width, layout.height, layout.depth
            )));
        }
        if layout.classes == 0 || layout.classes > 256 {
            return Err(Error::Config(format!(
                "class count must be in 1..=256 to fit the one-byte label, got {}",
                layout.classes
            )));
        }
        if i32::try_from(layout.image_size()).is_err() {
            return Err(Error::Config(format!(
                "image size {} is too large",
                layout.image_size()
            )));
        }
        if self.training.output == self.test.output {
            return Err(Error::Config(format!(
                "training and test splits both write {}",
                self.training.output.display()
            )));
        }
        Ok(())
    }

    /// Absolute-or-relative path of a split's record file
    #[must_use]
    pub fn input_path(&self, split: &SplitConfig) -> PathBuf {
        self.input_dir.join(&split.input)
    }

    /// Absolute-or-relative path of a split's container file
    #[must_use]
    pub fn output_path(&self, split: &SplitConfig) -> PathBuf {
        self.output_dir.join(&split.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cifar10() {
        let config = ConvertConfig::default();
        assert_eq!(config.layout.image_size(), 3072);
        assert_eq!(config.layout.classes, 10);
        assert_eq!(config.training.examples, Some(49_920));
        assert_eq!(config.test.examples, Some(9_984));
        assert_eq!(
            config.output_path(&config.training),
            PathBuf::from("./cifar10_training.parquet")
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_document_is_default() {
        let config: ConvertConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ConvertConfig::default());
    }

    #[test]
    fn test_partial_document_overrides() {
        let config: ConvertConfig = serde_json::from_str(
            r#"{
                "input_dir": "/data/cifar",
                "layout": { "width": 8, "height": 8, "depth": 1, "classes": 4 },
                "test": { "input": "t.bin", "output": "t.parquet", "examples": null }
            }"#,
        )
        .unwrap();

        assert_eq!(config.input_path(&config.test), PathBuf::from("/data/cifar/t.bin"));
        assert_eq!(config.test.examples, None);
        assert_eq!(config.layout.image_size(), 64);
        assert_eq!(config.training, SplitConfig::training());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: std::result::Result<ConvertConfig, _> =
            serde_json::from_str(r#"{ "inptu_dir": "x" }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_dimension() {
        let mut config = ConvertConfig::default();
        config.layout.depth = 0;
        assert!(config.validate().unwrap_err().to_string().contains("non-zero"));
    }

    #[test]
    fn test_validate_rejects_too_many_classes() {
        let mut config = ConvertConfig::default();
        config.layout.classes = 300;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_shared_output() {
        let mut config = ConvertConfig::default();
        config.test.output = config.training.output.clone();
        assert!(config.validate().unwrap_err().to_string().contains("both write"));
    }
}
