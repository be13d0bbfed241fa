use std::process::Stdio;

use async_trait::async_trait;
use tracing::{debug, info};

use super::context::{InstallContext, InstallReport};
use super::fabric::FabricInstaller;
use super::forge::ForgeInstaller;
use super::ModLoader;
use crate::core::error::PackResult;
use crate::core::version::Endpoints;

/// Lines of installer output kept in an error message.
const OUTPUT_TAIL_LINES: usize = 20;

#[async_trait]
pub trait ServerInstaller: Send + Sync {
    async fn install(&self, ctx: InstallContext<'_>) -> PackResult<InstallReport>;
}

/// Dispatcher without `Box<dyn>`.
pub enum Installer {
    Forge(ForgeInstaller),
    Fabric(FabricInstaller),
}

impl Installer {
    pub fn new(loader: ModLoader, endpoints: &Endpoints) -> Self {
        match loader {
            ModLoader::Forge => Self::Forge(ForgeInstaller::new(endpoints.forge_maven.clone())),
            ModLoader::Fabric => Self::Fabric(FabricInstaller::new(endpoints.fabric_maven.clone())),
        }
    }
}

#[async_trait]
impl ServerInstaller for Installer {
    async fn install(&self, ctx: InstallContext<'_>) -> PackResult<InstallReport> {
        match self {
            Installer::Forge(i) => i.install(ctx).await,
            Installer::Fabric(i) => i.install(ctx).await,
        }
    }
}

/// Run `<java> <args>` inside the pack root, bounded by the context timeout.
///
/// The child is killed if the timeout elapses or the future is dropped.
pub(crate) async fn run_java(ctx: &InstallContext<'_>, loader: ModLoader, args: &[String]) -> PackResult<()> {
    info!(java = ctx.java_path, ?args, dir = ?ctx.pack_root, "Running {loader} installer");

    let mut command = tokio::process::Command::new(ctx.java_path);
    command
        .args(args)
        .current_dir(ctx.pack_root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(ctx.timeout, command.output()).await {
        Err(_) => {
            return Err(ctx.error(
                loader,
                format!("installer did not finish within {}s", ctx.timeout.as_secs_f32()),
            ))
        }
        Ok(Err(e)) => return Err(ctx.error(loader, format!("could not start `{}`: {e}", ctx.java_path))),
        Ok(Ok(output)) => output,
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!(%stdout, "installer output");

    if !output.status.success() {
        return Err(ctx.error(
            loader,
            format!(
                "installer exited with code {:?}\nSTDOUT:\n{}\nSTDERR:\n{}",
                output.status.code(),
                tail(&stdout),
                tail(&stderr)
            ),
        ));
    }

    Ok(())
}

fn tail(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(OUTPUT_TAIL_LINES)..].join("\n")
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use super::*;
    use crate::core::downloader::Downloader;
    use crate::core::error::PackError;

    /// Installer stand-in, run through `/bin/sh` rather than executed directly.
    fn fake_installer(dir: &Path, body: &str) -> String {
        let path = dir.join("installer.sh");
        std::fs::write(&path, format!("{body}\n")).unwrap();
        path.to_string_lossy().into_owned()
    }

    async fn run_with_java(java: &str, script: &str, pack_root: &Path, timeout: Duration) -> PackResult<()> {
        let downloader = Downloader::new(reqwest::Client::new());
        let ctx = InstallContext {
            minecraft_version: "1.18.2",
            loader_version: "40.1.0",
            pack_root,
            java_path: java,
            downloader: &downloader,
            timeout,
        };
        run_java(&ctx, ModLoader::Forge, &[script.to_string()]).await
    }

    async fn run(script: &str, pack_root: &Path, timeout: Duration) -> PackResult<()> {
        run_with_java("/bin/sh", script, pack_root, timeout).await
    }

    #[tokio::test]
    async fn successful_process_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let script = fake_installer(tmp.path(), "touch installed-marker");

        run(&script, tmp.path(), Duration::from_secs(10)).await.unwrap();

        assert!(tmp.path().join("installed-marker").exists());
    }

    #[tokio::test]
    async fn failing_process_names_loader_and_version() {
        let tmp = tempfile::tempdir().unwrap();
        let script = fake_installer(tmp.path(), "echo broken >&2\nexit 3");

        match run(&script, tmp.path(), Duration::from_secs(10)).await {
            Err(PackError::Install { loader, version, message }) => {
                assert_eq!(loader, "Forge");
                assert!(version.contains("40.1.0"));
                assert!(message.contains("broken"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn hanging_process_times_out() {
        let tmp = tempfile::tempdir().unwrap();
        let script = fake_installer(tmp.path(), "sleep 30");

        let result = run(&script, tmp.path(), Duration::from_millis(200)).await;

        assert!(matches!(result, Err(PackError::Install { message, .. }) if message.contains("did not finish")));
    }

    #[tokio::test]
    async fn missing_java_is_an_install_error() {
        let tmp = tempfile::tempdir().unwrap();
        let java = tmp.path().join("no-java").to_string_lossy().into_owned();

        let result = run_with_java(&java, "x.jar", tmp.path(), Duration::from_secs(1)).await;

        assert!(matches!(result, Err(PackError::Install { message, .. }) if message.contains("could not start")));
    }

    #[test]
    fn tail_keeps_last_lines() {
        let text = (0..30).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let kept = tail(&text);
        assert!(kept.starts_with("10"));
        assert!(kept.ends_with("29"));
    }
}
