//! Linear RGB image buffers shared by HDR references and tone-mapped output.

use crate::schema::Scene;

/// Rec. 601 luma coefficients.
const LUMA: [f32; 3] = [0.299, 0.587, 0.114];

/// Small offset keeping logarithms of black pixels finite.
pub const LOG_EPSILON: f32 = 1e-4;

/// Luminance of a linear RGB pixel.
#[inline]
pub fn luminance(pixel: [f32; 3]) -> f32 {
    pixel[0] * LUMA[0] + pixel[1] * LUMA[1] + pixel[2] * LUMA[2]
}

/// Row-major RGB image with `f32` channels.
///
/// Reference images hold unbounded linear radiance; tone-mapped images are
/// expected in `[0, 1]` once composited.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<[f32; 3]>,
}

impl Image {
    /// Create a black image.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0.0; 3]; width * height],
        }
    }

    /// Create an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> [f32; 3],
    {
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Create an image of the same size by mapping every pixel.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn([f32; 3]) -> [f32; 3],
    {
        Self {
            width: self.width,
            height: self.height,
            pixels: self.pixels.iter().map(|&p| f(p)).collect(),
        }
    }

    /// Render a procedural HDR scene.
    pub fn from_scene(scene: &Scene, width: usize, height: usize) -> Self {
        let w = width.max(1) as f32;
        let h = height.max(1) as f32;

        match scene {
            Scene::Sunset {
                sun_center,
                sun_radius,
                sun_intensity,
                horizon_intensity,
            } => {
                let zenith = [0.2f32, 0.35, 0.8];
                let horizon = [1.0f32, 0.55, 0.25];
                let ground = [0.05f32, 0.04, 0.03];
                let radius = (*sun_radius).max(1e-3);

                Self::from_fn(width, height, |x, y| {
                    let u = x as f32 / w;
                    let v = y as f32 / h;

                    let mut pixel = if v < 0.75 {
                        let t = v / 0.75;
                        let scale = horizon_intensity * (0.3 + 0.7 * t);
                        [
                            scale * lerp(zenith[0], horizon[0], t),
                            scale * lerp(zenith[1], horizon[1], t),
                            scale * lerp(zenith[2], horizon[2], t),
                        ]
                    } else {
                        ground.map(|c| c * *horizon_intensity)
                    };

                    let dx = (u - sun_center.0) * w / h;
                    let dy = v - sun_center.1;
                    let d = (dx * dx + dy * dy).sqrt() / radius;
                    let glow = if d < 1.0 {
                        *sun_intensity
                    } else {
                        sun_intensity * 0.05 * (-(d - 1.0) * 2.0).exp()
                    };
                    pixel[0] += glow;
                    pixel[1] += glow * 0.9;
                    pixel[2] += glow * 0.7;
                    pixel
                })
            }
            Scene::Interior {
                window,
                window_intensity,
                ambient,
            } => {
                let (x0, y0, x1, y1) = *window;
                let cx = 0.5 * (x0 + x1);
                let cy = 0.5 * (y0 + y1);

                Self::from_fn(width, height, |x, y| {
                    let u = x as f32 / w;
                    let v = y as f32 / h;

                    if u >= x0 && u <= x1 && v >= y0 && v <= y1 {
                        return [
                            window_intensity * 0.8,
                            window_intensity * 0.9,
                            *window_intensity,
                        ];
                    }

                    let dist = ((u - cx).powi(2) + (v - cy).powi(2)).sqrt();
                    let spill = window_intensity * 0.02 / (1.0 + dist * 10.0);
                    let room = ambient * (1.0 + 0.5 * u);
                    [
                        room * 0.9 + spill * 0.8,
                        room * 0.8 + spill * 0.9,
                        room * 0.7 + spill,
                    ]
                })
            }
            Scene::Checker {
                cells,
                min_intensity,
                max_intensity,
            } => {
                let cells = (*cells).max(1);
                let last = (cells * cells - 1).max(1) as f32;
                let palette = [[1.0f32, 0.3, 0.3], [0.3, 1.0, 0.4], [0.35, 0.4, 1.0]];

                Self::from_fn(width, height, |x, y| {
                    let cx = (x * cells / width.max(1)).min(cells - 1);
                    let cy = (y * cells / height.max(1)).min(cells - 1);
                    let index = cy * cells + cx;
                    let t = index as f32 / last;

                    let intensity = if *min_intensity > 0.0 && *max_intensity > *min_intensity {
                        min_intensity * (max_intensity / min_intensity).powf(t)
                    } else {
                        lerp(*min_intensity, *max_intensity, t)
                    };
                    palette[index % palette.len()].map(|c| c * intensity)
                })
            }
            Scene::Lights { lights, ambient } => Self::from_fn(width, height, |x, y| {
                let u = x as f32 / w;
                let v = y as f32 / h;

                let mut pixel = [*ambient, *ambient * 0.9, *ambient * 0.8];
                for light in lights {
                    let dx = (u - light.center.0) * w / h;
                    let dy = v - light.center.1;
                    let r = light.radius.max(1e-3);
                    let falloff = (-(dx * dx + dy * dy) / (r * r)).exp();
                    for (channel, color) in pixel.iter_mut().zip(light.color) {
                        *channel += color * light.intensity * falloff;
                    }
                }
                pixel
            }),
        }
    }

    /// Render every scene at the same size.
    pub fn render_scenes(scenes: &[Scene], width: usize, height: usize) -> Vec<Self> {
        scenes
            .iter()
            .map(|scene| Self::from_scene(scene, width, height))
            .collect()
    }

    /// Total pixel count.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Get a pixel.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> [f32; 3] {
        self.pixels[y * self.width + x]
    }

    /// Per-pixel luminance.
    pub fn luminance_map(&self) -> Vec<f32> {
        self.pixels.iter().map(|&p| luminance(p)).collect()
    }

    /// Arithmetic mean luminance.
    pub fn average_luminance(&self) -> f32 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        self.pixels.iter().map(|&p| luminance(p)).sum::<f32>() / self.pixels.len() as f32
    }

    /// Geometric mean luminance (exp of mean log luminance).
    pub fn log_average_luminance(&self) -> f32 {
        if self.pixels.is_empty() {
            return LOG_EPSILON;
        }
        let log_sum: f32 = self
            .pixels
            .iter()
            .map(|&p| (luminance(p).max(0.0) + LOG_EPSILON).ln())
            .sum();
        (log_sum / self.pixels.len() as f32).exp()
    }

    /// Maximum luminance.
    pub fn max_luminance(&self) -> f32 {
        self.pixels
            .iter()
            .map(|&p| luminance(p))
            .fold(0.0f32, f32::max)
    }

    /// Per-channel means.
    pub fn channel_means(&self) -> [f32; 3] {
        if self.pixels.is_empty() {
            return [0.0; 3];
        }
        let mut sum = [0.0f32; 3];
        for p in &self.pixels {
            for c in 0..3 {
                sum[c] += p[c];
            }
        }
        sum.map(|s| s / self.pixels.len() as f32)
    }

    /// Replace NaN channel values.
    pub fn patch_nans(&mut self, value: f32) {
        for p in &mut self.pixels {
            for c in p.iter_mut() {
                if c.is_nan() {
                    *c = value;
                }
            }
        }
    }

    /// Accumulate `other * weight` into this image.
    ///
    /// Panics if dimensions differ.
    pub fn add_weighted(&mut self, other: &Image, weight: f32) {
        assert_eq!(
            (self.width, self.height),
            (other.width, other.height),
            "image dimensions must match"
        );
        for (dst, src) in self.pixels.iter_mut().zip(&other.pixels) {
            for c in 0..3 {
                dst[c] += src[c] * weight;
            }
        }
    }

    /// Clamp every channel to [0, 1].
    pub fn clamp01(&mut self) {
        for p in &mut self.pixels {
            for c in p.iter_mut() {
                *c = c.clamp(0.0, 1.0);
            }
        }
    }
}

#[inline]
pub(crate) fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::LightSpec;

    #[test]
    fn test_luminance_white() {
        assert!((luminance([1.0, 1.0, 1.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_scenes_are_hdr() {
        for scene in Scene::training_set().iter().chain(&Scene::test_set()) {
            let image = Image::from_scene(scene, 48, 32);
            assert_eq!(image.pixels.len(), 48 * 32);
            assert!(image.pixels.iter().flatten().all(|c| c.is_finite() && *c >= 0.0));
            assert!(image.max_luminance() > 1.0, "{scene:?} should exceed LDR range");
        }
    }

    #[test]
    fn test_lights_peak_at_center() {
        let scene = Scene::Lights {
            lights: vec![LightSpec {
                center: (0.5, 0.5),
                radius: 0.1,
                color: [1.0, 1.0, 1.0],
                intensity: 10.0,
            }],
            ambient: 0.0,
        };
        let image = Image::from_scene(&scene, 33, 33);
        let center = luminance(image.get(16, 16));
        let corner = luminance(image.get(0, 0));
        assert!(center > 9.0);
        assert!(corner < 0.01);
    }

    #[test]
    fn test_patch_and_clamp() {
        let mut image = Image::new(2, 1);
        image.pixels[0] = [f32::NAN, 2.0, -1.0];
        image.patch_nans(1.0);
        image.clamp01();
        assert_eq!(image.pixels[0], [1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_add_weighted() {
        let mut acc = Image::new(1, 1);
        let src = Image::from_fn(1, 1, |_, _| [1.0, 0.5, 0.25]);
        acc.add_weighted(&src, 0.5);
        acc.add_weighted(&src, 0.5);
        assert_eq!(acc.pixels[0], [1.0, 0.5, 0.25]);
    }

    #[test]
    fn test_log_average_black() {
        let image = Image::new(4, 4);
        assert!((image.log_average_luminance() - LOG_EPSILON).abs() < 1e-7);
    }
}
