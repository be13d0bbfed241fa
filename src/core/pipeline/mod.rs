// ─── Pipelines ───
// Configuration → copy → client-mod exclusion → server installation →
// server files → archive. `single` drives one run from the config file,
// `hosted` runs builds in the background and records them as artifacts.

mod builder;
mod guard;
mod hosted;
mod single;

use std::path::PathBuf;
use std::time::Duration;

use crate::core::copy::{CopyReport, ExclusionReport};
use crate::core::loaders::DispatchOutcome;
use crate::core::version::Endpoints;

pub use builder::PackBuilder;
pub use guard::{BuildLock, BuildLocks, PartialBuildGuard};
pub use hosted::{BuildTicket, HostedRequest, PackService};
pub use single::{run_single_shot, SingleShotOutcome};

/// Knobs shared by both pipelines.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Upper bound for each installer download and installer process.
    pub installer_timeout: Duration,
    /// Upper bound for version manifest lookups.
    pub fetch_timeout: Duration,
    /// Leave installer jars and installer logs out of the archive.
    pub exclude_installer_files: bool,
    pub endpoints: Endpoints,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            installer_timeout: Duration::from_secs(15 * 60),
            fetch_timeout: Duration::from_secs(30),
            exclude_installer_files: true,
            endpoints: Endpoints::default(),
        }
    }
}

/// How a build treats a mod loader it does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Unknown loader aborts the build with `PackError::UnknownLoader`.
    SingleShot,
    /// Unknown loader is logged, the pack is built without a server runtime.
    Hosted,
}

/// Everything one finished build produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub pack_root: PathBuf,
    pub copy: CopyReport,
    pub excluded: ExclusionReport,
    /// `None` when neither installation nor start scripts were requested.
    pub dispatch: Option<DispatchOutcome>,
    /// Icon and properties copied into the pack root.
    pub server_files: Vec<PathBuf>,
    pub archive: Option<PathBuf>,
}
