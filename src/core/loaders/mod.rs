pub mod context;
pub mod dispatcher;
pub mod fabric;
pub mod forge;
pub mod installer;
mod loader;

pub use context::{InstallContext, InstallReport};
pub use dispatcher::{DispatchOutcome, LoaderDispatcher};
pub use installer::{Installer, ServerInstaller};
pub use loader::ModLoader;
