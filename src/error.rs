//! Engine error taxonomy.
//!
//! Setup-time failures (targets, shaders, unknown resource names) are returned
//! to the caller as [`EngineError`]. Steady-state per-frame anomalies never
//! surface here: they are logged and the affected pass or binding is skipped.

use std::fmt;

/// The kind of named resource a lookup or registration refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Mesh,
    Texture,
    Shader,
    Material,
    Model,
    Light,
    InstanceGroup,
    Effect,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Mesh => "mesh",
            ResourceKind::Texture => "texture",
            ResourceKind::Shader => "shader",
            ResourceKind::Material => "material",
            ResourceKind::Model => "model",
            ResourceKind::Light => "light",
            ResourceKind::InstanceGroup => "instance group",
            ResourceKind::Effect => "post-processing effect",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("{kind} '{name}' does not exist")]
    NotFound { kind: ResourceKind, name: String },

    #[error("{kind} '{name}' already exists")]
    Duplicate { kind: ResourceKind, name: String },

    /// A render target could not be created in a usable state. Fatal at startup.
    #[error("render target '{label}' is incomplete: {reason}")]
    IncompleteTarget { label: String, reason: String },

    #[error("shader program '{program}' failed to compile:\n{reason}")]
    ShaderCompile { program: String, reason: String },

    #[error("no suitable GPU adapter found")]
    Adapter,

    #[error("failed to acquire GPU device: {0}")]
    Device(String),

    #[error("surface error: {0}")]
    Surface(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("asset error: {0}")]
    Asset(#[from] anyhow::Error),
}

impl EngineError {
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn duplicate(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::Duplicate {
            kind,
            name: name.into(),
        }
    }

    pub fn incomplete(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::IncompleteTarget {
            label: label.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_kind_and_resource() {
        let err = EngineError::not_found(ResourceKind::Mesh, "cube");
        assert_eq!(err.to_string(), "mesh 'cube' does not exist");
    }

    #[test]
    fn incomplete_target_reports_reason() {
        let err = EngineError::incomplete("bloom mip 3", "zero-sized extent");
        assert!(err.to_string().contains("bloom mip 3"));
        assert!(err.to_string().contains("zero-sized"));
    }
}
