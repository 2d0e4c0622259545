//! Procedural HDR scene descriptions used as reference images.
//!
//! Scenes stand in for decoded EXR files: each one renders a linear,
//! unbounded-radiance RGB image with enough dynamic range to make tone
//! mapping meaningful.

use serde::{Deserialize, Serialize};

/// Procedural scene for generating a reference HDR image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Scene {
    /// Vertical sky gradient with a bright sun disk.
    Sunset {
        /// Sun center as fraction of image size (0.0-1.0).
        sun_center: (f32, f32),
        /// Sun radius as fraction of image height.
        sun_radius: f32,
        /// Peak radiance of the sun.
        sun_intensity: f32,
        /// Radiance of the sky at the horizon.
        horizon_intensity: f32,
    },
    /// Dim interior lit through a bright window.
    Interior {
        /// Window rectangle (x0, y0, x1, y1) as fractions of image size.
        window: (f32, f32, f32, f32),
        /// Radiance seen through the window.
        window_intensity: f32,
        /// Ambient radiance of the room.
        ambient: f32,
    },
    /// Checkerboard of colored tiles with exponentially spaced radiance.
    Checker {
        /// Number of tiles along each axis.
        cells: usize,
        /// Radiance of the darkest tile.
        min_intensity: f32,
        /// Radiance of the brightest tile.
        max_intensity: f32,
    },
    /// Several colored point lights over a dark floor.
    Lights {
        /// List of light specifications.
        lights: Vec<LightSpec>,
        /// Floor radiance.
        ambient: f32,
    },
}

impl Default for Scene {
    fn default() -> Self {
        Self::Sunset {
            sun_center: (0.7, 0.3),
            sun_radius: 0.05,
            sun_intensity: 200.0,
            horizon_intensity: 4.0,
        }
    }
}

/// Specification for a single light in the `Lights` scene.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LightSpec {
    /// Position as fraction of image size.
    pub center: (f32, f32),
    /// Falloff radius as fraction of image height.
    pub radius: f32,
    /// Linear RGB color.
    pub color: [f32; 3],
    /// Peak radiance multiplier.
    pub intensity: f32,
}

impl Scene {
    /// Default training set: one of each scene type.
    pub fn training_set() -> Vec<Scene> {
        vec![
            Scene::default(),
            Scene::Interior {
                window: (0.55, 0.15, 0.85, 0.6),
                window_intensity: 80.0,
                ambient: 0.05,
            },
            Scene::Checker {
                cells: 8,
                min_intensity: 0.001,
                max_intensity: 50.0,
            },
        ]
    }

    /// Default test set, disjoint from the training set.
    pub fn test_set() -> Vec<Scene> {
        vec![Scene::Lights {
            lights: vec![
                LightSpec {
                    center: (0.25, 0.4),
                    radius: 0.08,
                    color: [1.0, 0.6, 0.3],
                    intensity: 120.0,
                },
                LightSpec {
                    center: (0.7, 0.6),
                    radius: 0.12,
                    color: [0.3, 0.5, 1.0],
                    intensity: 40.0,
                },
            ],
            ambient: 0.02,
        }]
    }
}
