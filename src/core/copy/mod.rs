mod engine;
mod exclusion;

pub use engine::{copy_directories, copy_directories_until, CopyFailure, CopyReport, CopyTarget, SAVES_PREFIX};
pub use exclusion::{exclude_client_mods, ExclusionReport};
