//! Scene store: per-entity transforms and the state derived from them.
//!
//! - `transform` holds the position/rotation/scale component
//! - `store` keeps the dense component arrays, the dirty set and `update()`

pub mod store;
pub mod transform;

pub use store::{Derived, SceneStore};
pub use transform::Transform;
