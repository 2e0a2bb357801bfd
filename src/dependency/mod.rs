//! Dependency model: coordinates, resolved trees and resolvers

pub mod coordinates;
pub mod maven;
pub mod node;
pub mod resolver;

pub use coordinates::{Coordinates, CoordinatesError};
pub use maven::MavenLocalResolver;
pub use node::{DependencyNode, ResolvedArtifact};
pub use resolver::{DependencyResolver, ResolveError, StaticResolver};
