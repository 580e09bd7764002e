//! Shader programs and the uniform binder.
//!
//! A program is reflected once when it is compiled: each global it uses is
//! matched by name against the fixed [`catalog`]. The resulting
//! [`SlotTable`] says where the program wants each slot, and the
//! [`UniformPool`] resolves exactly those slots into bind group entries.
//! One pool therefore serves every pass, whatever subset of the catalog its
//! shaders declare. Each program caches the bind groups built from the pool
//! so draws only look them up.

pub mod binder;
pub mod catalog;
pub mod program;
pub mod reflect;

pub use binder::{Override, UniformPool};
pub use catalog::{LightsUniform, ShadowUniform, SlotKind, TextureShape, UniformSlot};
pub use program::ShaderProgram;
pub use reflect::{Reflection, SlotBinding, SlotTable, VertexInput, reflect};
