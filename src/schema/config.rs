//! Configuration for the reference images a run is trained and tested on.

use serde::{Deserialize, Serialize};

use super::Scene;

fn default_width() -> usize {
    96
}

fn default_height() -> usize {
    64
}

fn default_test_scenes() -> Vec<Scene> {
    Scene::test_set()
}

/// Reference image set configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Rendered image width in pixels.
    #[serde(default = "default_width")]
    pub width: usize,
    /// Rendered image height in pixels.
    #[serde(default = "default_height")]
    pub height: usize,
    /// Scenes every chromosome is scored against each epoch.
    #[serde(default = "Scene::training_set")]
    pub scenes: Vec<Scene>,
    /// Held-out scenes used to report the final best chromosome.
    #[serde(default = "default_test_scenes")]
    pub test_scenes: Vec<Scene>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            scenes: Scene::training_set(),
            test_scenes: default_test_scenes(),
        }
    }
}

impl TrainingConfig {
    /// Number of pixels per rendered image.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.scenes.is_empty() {
            return Err(ConfigError::NoScenes);
        }
        for (i, scene) in self.scenes.iter().chain(&self.test_scenes).enumerate() {
            if let Scene::Checker { cells: 0, .. } = scene {
                return Err(ConfigError::InvalidScene {
                    index: i,
                    reason: "checker needs at least one cell".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Training configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Image dimensions (width, height) must be non-zero")]
    InvalidDimensions,
    #[error("At least one training scene is required")]
    NoScenes,
    #[error("Scene {index} is invalid: {reason}")]
    InvalidScene { index: usize, reason: String },
}
