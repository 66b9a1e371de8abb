//! Configuration management for the clustering engine

use std::path::Path;
use serde::{Serialize, Deserialize};
use crate::error::{ClusterError, Result};

/// Size bounds of the communities to produce, given as factors of a target size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeBounds {
    /// Try to obtain communities of this total size
    pub target_size: u64,

    /// Split communities whose size reaches `target_size * min_split_size_factor`
    pub min_split_size_factor: Option<f64>,

    /// Merge communities whose size is at most `target_size * max_merge_size_factor`
    pub max_merge_size_factor: Option<f64>,

    /// Merge communities with fewer nodes than this
    pub min_nodes: Option<usize>,
}

impl Default for SizeBounds {
    fn default() -> Self {
        Self {
            target_size: 48,
            min_split_size_factor: Some(2.0),
            max_merge_size_factor: Some(0.25),
            min_nodes: None,
        }
    }
}

/// Concrete size limits derived from a `SizeBounds`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedBounds {
    pub target_size: u64,
    pub max_size: Option<u64>,
    pub min_size: Option<u64>,
    pub min_nodes: Option<usize>,
}

impl SizeBounds {
    /// Create new bounds with custom values
    pub fn new(
        target_size: u64,
        min_split_size_factor: Option<f64>,
        max_merge_size_factor: Option<f64>,
        min_nodes: Option<usize>,
    ) -> Self {
        Self {
            target_size,
            min_split_size_factor,
            max_merge_size_factor,
            min_nodes,
        }
    }

    /// Validate the bounds and compute the concrete size limits
    ///
    /// `max_size = ceil(target * split) - 1` and `min_size = floor(target * merge) + 1`.
    pub fn resolve(&self) -> Result<ResolvedBounds> {
        if self.target_size == 0 {
            return Err(ClusterError::InvalidConfig("target size must be positive".into()));
        }
        let target = self.target_size as f64;

        let max_size = match self.min_split_size_factor {
            Some(factor) if !(factor > 0.0) => {
                return Err(ClusterError::InvalidConfig(format!(
                    "min split size factor must be positive, got {}", factor
                )));
            }
            Some(factor) => Some(((target * factor).ceil() as u64).saturating_sub(1)),
            None => None,
        };

        let min_size = match self.max_merge_size_factor {
            Some(factor) if !(factor > 0.0) => {
                return Err(ClusterError::InvalidConfig(format!(
                    "max merge size factor must be positive, got {}", factor
                )));
            }
            Some(factor) => Some((target * factor).floor() as u64 + 1),
            None => None,
        };

        if let (Some(split), Some(merge)) = (self.min_split_size_factor, self.max_merge_size_factor) {
            if merge >= split {
                return Err(ClusterError::InvalidConfig(format!(
                    "max merge size factor {} must be less than min split size factor {}",
                    merge, split
                )));
            }
        }

        if let (Some(min_size), Some(max_size)) = (min_size, max_size) {
            if min_size > max_size {
                return Err(ClusterError::InvalidConfig(format!(
                    "min size {} exceeds max size {}", min_size, max_size
                )));
            }
        }

        Ok(ResolvedBounds {
            target_size: self.target_size,
            max_size,
            min_size,
            min_nodes: self.min_nodes,
        })
    }
}

/// Bounds on the piles the driver feeds to the direct clusterer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PileBounds {
    /// Number of entities in each random pile
    pub target_pile_size: usize,

    /// Only split into piles when there are at least `target_pile_size` times this many
    pub min_split_size_factor: f64,

    /// Merge final piles smaller than `target_pile_size` times this
    pub max_merge_size_factor: f64,
}

impl Default for PileBounds {
    fn default() -> Self {
        Self {
            target_pile_size: 10_000,
            min_split_size_factor: 1.25,
            max_merge_size_factor: 0.25,
        }
    }
}

impl PileBounds {
    /// Entity count at or above which the driver splits into piles
    pub fn split_threshold(&self) -> f64 {
        self.target_pile_size as f64 * self.min_split_size_factor
    }

    /// The community bounds used when grouping preliminary clusters into final piles
    pub fn as_size_bounds(&self) -> SizeBounds {
        SizeBounds {
            target_size: self.target_pile_size as u64,
            min_split_size_factor: Some(self.min_split_size_factor),
            max_merge_size_factor: Some(self.max_merge_size_factor),
            min_nodes: None,
        }
    }
}

/// Full configuration of a clustering run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pile sizing for the divide-and-conquer driver
    pub piles: PileBounds,

    /// Bounds of the final communities
    pub communities: SizeBounds,

    /// How many times to recurse on outliers (`None` for no limit)
    pub max_outlier_levels: Option<usize>,

    /// Whether every entity must end up in some community
    pub must_complete_cover: bool,

    /// Dissolve communities smaller than `target_size` times this into outliers
    pub dissolve_min_robust_size_factor: Option<f64>,

    /// Random seed; zero means non-reproducible
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            piles: PileBounds::default(),
            communities: SizeBounds::default(),
            max_outlier_levels: Some(1),
            must_complete_cover: false,
            dissolve_min_robust_size_factor: Some(0.5),
            seed: 123_456,
        }
    }
}

impl Config {
    /// Create a new configuration with custom values
    pub fn new(
        piles: PileBounds,
        communities: SizeBounds,
        max_outlier_levels: Option<usize>,
        must_complete_cover: bool,
        seed: u64,
    ) -> Self {
        Self {
            piles,
            communities,
            max_outlier_levels,
            must_complete_cover,
            seed,
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            ClusterError::InvalidConfig(format!("{}: {}", path.display(), e))
        })
    }

    /// Validate every parameter once, before any work is done
    pub fn validate(&self) -> Result<()> {
        if self.piles.target_pile_size == 0 {
            return Err(ClusterError::InvalidConfig("target pile size must be positive".into()));
        }
        self.piles.as_size_bounds().resolve()?;
        self.communities.resolve()?;

        if let Some(factor) = self.dissolve_min_robust_size_factor {
            if factor < 0.0 {
                return Err(ClusterError::InvalidConfig(format!(
                    "dissolve min robust size factor must not be negative, got {}", factor
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_factors() {
        let bounds = SizeBounds::new(3, Some(2.0), Some(1.0), None).resolve().unwrap();
        assert_eq!(bounds.max_size, Some(5));
        assert_eq!(bounds.min_size, Some(4));
        assert_eq!(bounds.min_nodes, None);
    }

    #[test]
    fn test_resolve_optional_factors() {
        let bounds = SizeBounds::new(10, None, None, Some(3)).resolve().unwrap();
        assert_eq!(bounds.max_size, None);
        assert_eq!(bounds.min_size, None);
        assert_eq!(bounds.min_nodes, Some(3));
    }

    #[test]
    fn test_rejects_zero_target() {
        let err = SizeBounds::new(0, None, None, None).resolve().unwrap_err();
        assert!(matches!(err, ClusterError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_merge_not_below_split() {
        let err = SizeBounds::new(10, Some(1.0), Some(1.0), None).resolve().unwrap_err();
        assert!(matches!(err, ClusterError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_json_defaults() {
        let config: Config = serde_json::from_str(r#"{"seed": 7, "piles": {"target_pile_size": 100}}"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.piles.target_pile_size, 100);
        assert_eq!(config.piles.min_split_size_factor, 1.25);
        assert_eq!(config.communities, SizeBounds::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_pile_size() {
        let mut config = Config::default();
        config.piles.target_pile_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_file_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = Config::from_json_file(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, ClusterError::Io(_)));

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{\"seed\": \"seven\"}").unwrap();
        let broken = Config::from_json_file(&path).unwrap_err();
        assert!(matches!(broken, ClusterError::InvalidConfig(_)));

        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"max_outlier_levels": null}"#).unwrap();
        let config = Config::from_json_file(&path).unwrap();
        assert_eq!(config.max_outlier_levels, None);
    }
}
