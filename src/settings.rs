//! Runtime render-state flags.
//!
//! [`RenderSettings`] is the whole externally tunable surface of the renderer:
//! the pass toggles, the multisample count and a handful of numeric knobs the
//! passes read as uniforms. Settings can be built in code or read from TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub depth_of_field: bool,
    pub post_processing: bool,
    pub shadow_map: bool,
    pub bloom: bool,
    pub profile: bool,
    /// Multisample count. `0` and `1` disable multisampling.
    pub samples: u32,

    pub bloom_mips: u32,
    pub bloom_strength: f32,
    pub exposure: f32,
    pub gamma: f32,
    pub shadow_resolution: u32,
    pub shadow_far: f32,
    pub focus_distance: f32,
    pub focus_range: f32,
    pub blur_radius: f32,
    pub clear_color: [f32; 4],
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            depth_of_field: false,
            post_processing: false,
            shadow_map: true,
            bloom: true,
            profile: false,
            samples: 4,
            bloom_mips: 5,
            bloom_strength: 0.04,
            exposure: 1.0,
            gamma: 2.2,
            shadow_resolution: 1024,
            shadow_far: 100.0,
            focus_distance: 0.98,
            focus_range: 0.02,
            blur_radius: 1.0,
            clear_color: [0.02, 0.02, 0.03, 1.0],
        }
    }
}

impl RenderSettings {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.bloom_mips == 0 {
            return Err(EngineError::Config("bloom_mips must be at least 1".into()));
        }
        if self.shadow_resolution == 0 || !self.shadow_resolution.is_power_of_two() {
            return Err(EngineError::Config(format!(
                "shadow_resolution must be a power of two, got {}",
                self.shadow_resolution
            )));
        }
        if self.shadow_far <= 0.0 {
            return Err(EngineError::Config("shadow_far must be positive".into()));
        }
        Ok(())
    }

    pub fn multisampled(&self) -> bool {
        self.samples > 1
    }

    /// Largest supported sample count not above the requested one.
    ///
    /// `supported` lists the counts the adapter allows for the HDR color
    /// format; 1 is always allowed.
    pub fn effective_samples(&self, supported: &[u32]) -> u32 {
        if self.samples <= 1 {
            return 1;
        }
        supported
            .iter()
            .copied()
            .filter(|&count| count <= self.samples)
            .max()
            .unwrap_or(1)
    }

    /// Whether the separable blur has a consumer this frame.
    pub fn needs_blur(&self, active_effects: usize) -> bool {
        self.depth_of_field || (self.post_processing && active_effects > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let settings = RenderSettings::from_toml_str(
            r#"
            bloom = false
            samples = 8
            "#,
        )
        .unwrap();
        assert!(!settings.bloom);
        assert_eq!(settings.samples, 8);
        assert_eq!(settings.bloom_mips, RenderSettings::default().bloom_mips);
    }

    #[test]
    fn rejects_zero_bloom_mips() {
        let err = RenderSettings::from_toml_str("bloom_mips = 0").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn rejects_non_power_of_two_shadow_resolution() {
        assert!(RenderSettings::from_toml_str("shadow_resolution = 1000").is_err());
    }

    #[test]
    fn sample_count_clamps_to_supported() {
        let mut settings = RenderSettings::default();
        settings.samples = 8;
        assert_eq!(settings.effective_samples(&[1, 2, 4]), 4);
        settings.samples = 0;
        assert_eq!(settings.effective_samples(&[1, 2, 4]), 1);
        settings.samples = 3;
        assert_eq!(settings.effective_samples(&[1, 4]), 1);
    }

    #[test]
    fn blur_runs_only_for_a_consumer() {
        let mut settings = RenderSettings::default();
        assert!(!settings.needs_blur(2));
        settings.post_processing = true;
        assert!(!settings.needs_blur(0));
        assert!(settings.needs_blur(1));
        settings.post_processing = false;
        settings.depth_of_field = true;
        assert!(settings.needs_blur(0));
    }

    #[test]
    fn toml_round_trip_preserves_flags() {
        let mut settings = RenderSettings::default();
        settings.profile = true;
        let text = settings.to_toml_string().unwrap();
        assert_eq!(RenderSettings::from_toml_str(&text).unwrap(), settings);
    }
}
