//! Anchor resolution: binding schema fields to template locations.

pub mod resolver;
pub mod types;

pub use resolver::{resolve_anchors, resolve_field};
pub use types::{AnchorMap, Location, Resolution, ResolutionFailure, ResolvedAnchor, UnresolvedAnchor};
