//! Engine data structures: resource records, entities and their attributes.
//!
//! - `registry` is the dense arena plus name index behind every resource table
//! - `mesh` holds the mesh asset record, bounding spheres and GPU buffers
//! - `model` is the per-entity record and the vertex layout
//! - `material` holds surface parameters and their users
//! - `light` keeps the point lights and the sun's shadow cube
//! - `instance` holds per-instance attribute streams and dirty masks
//! - `texture` contains the GPU texture wrapper and creation utilities

pub mod instance;
pub mod light;
pub mod material;
pub mod mesh;
pub mod model;
pub mod registry;
pub mod texture;
