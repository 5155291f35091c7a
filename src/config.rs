use {
  serde::{Deserialize, Serialize},
  std::path::PathBuf,
  crate::error::MatrixError as Error,
};

type Result<T> = std::result::Result<T, Error>;

/// Where the encoded bits of a matrix live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backing {
  /// In memory.
  Memory,
  /// In a random-access file at `path`, created or truncated on build.
  File {
    /// Path of the backing file.
    path: PathBuf,
  },
}
impl Default for Backing {
  fn default() -> Self {
    Backing::Memory
  }
}

/// Tuning knobs for building a `CompressedMatrix`.
///
/// Every field has a default, so partial documents deserialize:
/// ```
/// use quad_matrix::config::{Backing, MatrixConfig};
/// let config: MatrixConfig = serde_json::from_str(r#"{ "cache_percent": 0.5 }"#).unwrap();
/// assert_eq!(0.5, config.cache_percent);
/// assert_eq!(Backing::Memory, config.backing);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
  /// Fraction of the matrix's cells that the offset cache may hold, in `[0, 1]`.
  pub cache_percent: f64,
  /// Backing storage for the encoded bits.
  pub backing: Backing,
  /// Whether to pre-populate the cache along row 0 and column 0.
  pub warm_cache: bool,
  /// Whether to shrink the buffer to its exact size once it has been encoded.
  pub trim_on_build: bool,
}
impl Default for MatrixConfig {
  fn default() -> Self {
    MatrixConfig {
      cache_percent: 0.1,
      backing: Backing::Memory,
      warm_cache: true,
      trim_on_build: true,
    }
  }
}
impl MatrixConfig {
  /// A config with the given cache fraction and defaults elsewhere.
  pub fn with_cache_percent(cache_percent: f64) -> Self {
    MatrixConfig {
      cache_percent,
      ..Default::default()
    }
  }
  /// Rejects a cache fraction outside `[0, 1]`.
  pub fn validate(&self) -> Result<()> {
    if !(0.0..=1.0).contains(&self.cache_percent) {
      return Err(Error::invalid(format!(
        "cache_percent must lie in [0, 1], found {}", self.cache_percent
      )))
    }
    Ok(())
  }
  /// The number of entries the offset cache may hold for a `height` x `width` matrix.
  pub fn cache_capacity(&self, height: usize, width: usize) -> usize {
    (height as f64 * width as f64 * self.cache_percent).round() as usize
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;
  #[test]
  fn validation() {
    assert!(MatrixConfig::default().validate().is_ok());
    assert!(MatrixConfig::with_cache_percent(0.0).validate().is_ok());
    assert!(MatrixConfig::with_cache_percent(1.0).validate().is_ok());
    for &bad in &[-0.1, 1.5, f64::NAN] {
      let err = MatrixConfig::with_cache_percent(bad).validate().unwrap_err();
      assert_eq!(ErrorKind::InvalidArgument, err.kind());
    }
  }
  #[test]
  fn capacity_rounds() {
    let config = MatrixConfig::with_cache_percent(0.25);
    assert_eq!(4, config.cache_capacity(4, 4));
    assert_eq!(0, config.cache_capacity(1, 1));
    assert_eq!(1, config.cache_capacity(1, 2));
    assert_eq!(0, MatrixConfig::with_cache_percent(0.0).cache_capacity(100, 100));
  }
  #[test]
  fn from_yaml() {
    let yaml = "cache_percent: 0.75\nbacking:\n  kind: file\n  path: /tmp/matrix.qm\nwarm_cache: false\n";
    let config: MatrixConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(0.75, config.cache_percent);
    assert_eq!(Backing::File { path: "/tmp/matrix.qm".into() }, config.backing);
    assert!(!config.warm_cache);
    assert!(config.trim_on_build);
  }
  #[test]
  fn json_round_trip() {
    let config = MatrixConfig {
      cache_percent: 0.2,
      backing: Backing::Memory,
      warm_cache: false,
      trim_on_build: false,
    };
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains(r#""kind":"memory""#));
    let back: MatrixConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(config, back);
  }
}
