//! Resolution-dependent render targets.
//!
//! Everything here is created at startup and recreated as a whole on resize
//! or when the sample count changes. Creation validates each target and
//! fails with [`EngineError::IncompleteTarget`]; the renderer cannot run
//! without them.

use crate::{
    data_structures::texture::Texture,
    error::{EngineError, Result},
    pipelines::chain::TargetChain,
};

/// Expected shape of a target, checked against what was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSpec {
    pub size: [u32; 2],
    pub format: wgpu::TextureFormat,
    pub samples: u32,
    pub layers: u32,
}

impl TargetSpec {
    pub fn color(size: [u32; 2], samples: u32) -> Self {
        Self {
            size,
            format: Texture::HDR_FORMAT,
            samples,
            layers: 1,
        }
    }

    pub fn depth(size: [u32; 2], samples: u32) -> Self {
        Self {
            size,
            format: Texture::DEPTH_FORMAT,
            samples,
            layers: 1,
        }
    }
}

/// Validates a requested target against the device before creating it.
pub fn check_spec(label: &str, spec: &TargetSpec, limits: &wgpu::Limits) -> Result<()> {
    let [width, height] = spec.size;
    if width == 0 || height == 0 {
        return Err(EngineError::incomplete(
            label,
            format!("zero-sized extent {width}x{height}"),
        ));
    }
    let max = limits.max_texture_dimension_2d;
    if width > max || height > max {
        return Err(EngineError::incomplete(
            label,
            format!("{width}x{height} exceeds the device limit of {max}"),
        ));
    }
    if !spec.samples.is_power_of_two() {
        return Err(EngineError::incomplete(
            label,
            format!("invalid sample count {}", spec.samples),
        ));
    }
    Ok(())
}

/// Compares a created texture with the spec it was created from.
pub fn check_target(label: &str, texture: &Texture, spec: &TargetSpec) -> Result<()> {
    let t = &texture.texture;
    let mismatch = if [t.width(), t.height()] != spec.size {
        Some(format!(
            "size {}x{} instead of {}x{}",
            t.width(),
            t.height(),
            spec.size[0],
            spec.size[1]
        ))
    } else if t.format() != spec.format {
        Some(format!("format {:?} instead of {:?}", t.format(), spec.format))
    } else if t.sample_count() != spec.samples {
        Some(format!("{} samples instead of {}", t.sample_count(), spec.samples))
    } else if t.depth_or_array_layers() != spec.layers {
        Some(format!(
            "{} layers instead of {}",
            t.depth_or_array_layers(),
            spec.layers
        ))
    } else {
        None
    };
    match mismatch {
        Some(reason) => {
            log::error!("render target '{label}' is incomplete: {reason}");
            Err(EngineError::incomplete(label, reason))
        }
        None => Ok(()),
    }
}

/// Sizes of the bloom chain: each level half the previous, never below 1.
pub fn bloom_mip_sizes(size: [u32; 2], mips: u32) -> Vec<[u32; 2]> {
    let mut sizes = Vec::with_capacity(mips as usize);
    let mut current = size;
    for _ in 0..mips {
        current = [(current[0] / 2).max(1), (current[1] / 2).max(1)];
        sizes.push(current);
    }
    sizes
}

fn color(device: &wgpu::Device, spec: TargetSpec, label: &str) -> Result<Texture> {
    check_spec(label, &spec, &device.limits())?;
    let texture = Texture::create_render_target(device, spec.size, spec.format, spec.samples, label);
    check_target(label, &texture, &spec)?;
    Ok(texture)
}

fn depth(device: &wgpu::Device, spec: TargetSpec, label: &str) -> Result<Texture> {
    check_spec(label, &spec, &device.limits())?;
    let texture = Texture::create_depth_texture(device, spec.size, spec.samples, label);
    check_target(label, &texture, &spec)?;
    Ok(texture)
}

/// The screen-sized targets of one frame.
#[derive(Debug)]
pub struct RenderTargets {
    pub size: [u32; 2],
    pub samples: u32,
    /// Forward pass color when multisampling, resolved into the chain.
    pub multisampled: Option<Texture>,
    /// Forward pass depth, at the forward sample count.
    pub depth: Texture,
    /// Single-sample copy of `depth` when it is multisampled.
    pub resolved_depth: Option<Texture>,
    pub chain: TargetChain<Texture>,
    /// Horizontal blur output, read by the vertical blur.
    pub blur_scratch: Texture,
    pub blurred: Texture,
    pub bloom_mips: Vec<Texture>,
}

impl RenderTargets {
    pub fn new(device: &wgpu::Device, size: [u32; 2], samples: u32, bloom_mips: u32) -> Result<Self> {
        let multisampled = if samples > 1 {
            Some(color(device, TargetSpec::color(size, samples), "multisample color")?)
        } else {
            None
        };
        let resolved_depth = if samples > 1 {
            Some(depth(device, TargetSpec::depth(size, 1), "resolved depth")?)
        } else {
            None
        };
        let single = TargetSpec::color(size, 1);
        let bloom_mips = bloom_mip_sizes(size, bloom_mips)
            .into_iter()
            .enumerate()
            .map(|(i, mip)| color(device, TargetSpec::color(mip, 1), &format!("bloom mip {i}")))
            .collect::<Result<Vec<_>>>()?;

        log::debug!("render targets created: {}x{}, {samples}x MSAA", size[0], size[1]);
        Ok(Self {
            size,
            samples,
            multisampled,
            depth: depth(device, TargetSpec::depth(size, samples), "forward depth")?,
            resolved_depth,
            chain: TargetChain::new(
                color(device, single, "ping-pong A")?,
                color(device, single, "ping-pong B")?,
            ),
            blur_scratch: color(device, single, "blur scratch")?,
            blurred: color(device, single, "blurred")?,
            bloom_mips,
        })
    }

    /// Single-sample scene depth, as later passes sample it.
    pub fn scene_depth(&self) -> &Texture {
        self.resolved_depth.as_ref().unwrap_or(&self.depth)
    }

    /// Where the forward and skybox passes draw.
    pub fn forward_color(&self) -> &Texture {
        self.multisampled.as_ref().unwrap_or_else(|| self.chain.front())
    }
}

/// The depth cube the shadow pass renders into.
#[derive(Debug)]
pub struct ShadowTarget {
    pub resolution: u32,
    pub cube: Texture,
    pub faces: [wgpu::TextureView; 6],
}

impl ShadowTarget {
    pub fn new(device: &wgpu::Device, resolution: u32) -> Result<Self> {
        let spec = TargetSpec {
            size: [resolution, resolution],
            format: Texture::DEPTH_FORMAT,
            samples: 1,
            layers: 6,
        };
        check_spec("shadow cube", &spec, &device.limits())?;
        let cube = Texture::create_cube(device, resolution, 1, Texture::DEPTH_FORMAT, "shadow cube");
        check_target("shadow cube", &cube, &spec)?;
        let faces = std::array::from_fn(|face| cube.face_view(face as u32, 0));
        Ok(Self {
            resolution,
            cube,
            faces,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bloom_mips_halve_down_to_one() {
        assert_eq!(
            bloom_mip_sizes([64, 20], 6),
            vec![[32, 10], [16, 5], [8, 2], [4, 1], [2, 1], [1, 1]]
        );
        assert!(bloom_mip_sizes([64, 64], 0).is_empty());
    }

    #[test]
    fn zero_sized_targets_are_incomplete() {
        let err = check_spec(
            "ping-pong A",
            &TargetSpec::color([0, 10], 1),
            &wgpu::Limits::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::IncompleteTarget { ref label, .. } if label == "ping-pong A"));
    }

    #[test]
    fn oversized_targets_are_incomplete() {
        let limits = wgpu::Limits::default();
        let huge = limits.max_texture_dimension_2d + 1;
        assert!(check_spec("x", &TargetSpec::color([huge, 1], 1), &limits).is_err());
        assert!(check_spec("x", &TargetSpec::color([64, 64], 4), &limits).is_ok());
    }

    #[test]
    fn odd_sample_counts_are_incomplete() {
        assert!(check_spec("x", &TargetSpec::depth([8, 8], 3), &wgpu::Limits::default()).is_err());
    }
}
