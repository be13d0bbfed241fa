mod coordinate;
mod metadata;

pub use coordinate::MavenCoordinate;
pub use metadata::MavenMetadata;

/// Maven repositories hosting the loader installers.
pub const FORGE_MAVEN: &str = "https://maven.minecraftforge.net";
pub const FABRIC_MAVEN: &str = "https://maven.fabricmc.net";
