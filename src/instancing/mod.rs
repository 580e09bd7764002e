//! Instance batching.
//!
//! Entities sharing a mesh and shader can be put in an instance group and drawn
//! with one instanced call. Each frame the group's visible members are diffed
//! against the rows it currently holds and only the delta is uploaded.
//!
//! - `group` holds the per-group diff and the solo rows of individual draws
//! - `batcher` owns all groups and routes dirty marks
//! - `buffers` mirrors a group's rows into six GPU vertex buffers

pub mod batcher;
pub mod buffers;
pub mod group;

pub use batcher::{FrameWrites, InstanceBatcher};
pub use buffers::InstanceBuffers;
pub use group::{InstanceGroup, RowWrite, SoloRows, WriteSet};
