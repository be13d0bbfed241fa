mod model;
pub(crate) mod registry;
mod store;

pub use model::{Artifact, ArtifactStatus, NewArtifact};
pub use registry::{ArtifactRegistry, MemoryRegistry};
pub use store::JsonRegistry;
