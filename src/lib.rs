//! Runtime toolkit on top of the `aurora-files` codecs: converts parsed
//! walkmeshes into spatially indexed navigation meshes and answers the
//! projection, raycast, pathfinding and cover queries an engine needs.

pub mod navigation;

pub use aurora_files;
