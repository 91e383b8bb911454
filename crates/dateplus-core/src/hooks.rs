use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::timeline::WidgetEntry;

const REFRESH_EVENT: &str = "on-refresh";

/// Delivers "refresh requested" signals to widget surfaces by running the
/// `on-refresh.*` executables in `<data>/hooks`.
#[derive(Debug, Clone)]
pub struct HookRunner {
    enabled: bool,
    hooks_dir: PathBuf,
}

impl HookRunner {
    pub fn new(cfg: &Config, data_dir: &Path) -> Self {
        let enabled = cfg.get_bool("hooks").unwrap_or(true);
        let hooks_dir = data_dir.join("hooks");
        debug!(
            enabled,
            hooks_dir = %hooks_dir.display(),
            "initialized hook runner"
        );
        Self { enabled, hooks_dir }
    }

    /// Each script receives one JSON line per widget entry on stdin.
    /// Returns the number of scripts run.
    #[instrument(skip(self, entries), fields(entries = entries.len()))]
    pub fn request_refresh(&self, entries: &[WidgetEntry]) -> anyhow::Result<usize> {
        if !self.enabled {
            debug!("hooks disabled; skipping refresh request");
            return Ok(0);
        }

        let scripts = self.list_scripts(REFRESH_EVENT)?;
        if scripts.is_empty() {
            debug!("no refresh hooks installed");
            return Ok(0);
        }

        let payload = entries
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()
            .context("failed to encode widget entries for hook")?;

        for script in &scripts {
            run_hook_with_json_lines(script, &payload)?;
        }
        info!(count = scripts.len(), "delivered refresh request");
        Ok(scripts.len())
    }

    #[instrument(skip(self))]
    fn list_scripts(&self, event: &str) -> anyhow::Result<Vec<PathBuf>> {
        if !self.hooks_dir.exists() {
            return Ok(Vec::new());
        }

        let mut scripts = Vec::new();
        for entry in fs::read_dir(&self.hooks_dir)
            .with_context(|| format!("failed to read hooks dir {}", self.hooks_dir.display()))?
        {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if !name.starts_with(&format!("{event}.")) {
                continue;
            }

            if !is_executable(&path)? {
                debug!(path = %path.display(), "skipping non-executable hook");
                continue;
            }

            debug!(event, path = %path.display(), "selected hook script");
            scripts.push(path);
        }

        scripts.sort();
        Ok(scripts)
    }
}

fn run_hook_with_json_lines(path: &Path, input_lines: &[String]) -> anyhow::Result<()> {
    info!(hook = %path.display(), "running hook");
    let mut child = Command::new(path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to run hook {}", path.display()))?;

    if let Some(mut stdin) = child.stdin.take()
        && let Err(err) = write_lines(&mut stdin, input_lines)
    {
        // A hook may exit without reading its input; its status decides.
        if err.kind() == io::ErrorKind::BrokenPipe {
            debug!(hook = %path.display(), "hook closed stdin early");
        } else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(err)
                .with_context(|| format!("failed to send input to hook {}", path.display()));
        }
    }

    let output = child
        .wait_with_output()
        .with_context(|| format!("failed to wait for hook {}", path.display()))?;

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !output.status.success() {
        if !stderr.is_empty() {
            warn!(hook = %path.display(), stderr = %stderr, "hook failed");
        }
        return Err(anyhow!(
            "Hook Error: script {} failed with status {}",
            path.display(),
            output
                .status
                .code()
                .map(|code| code.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        ));
    }

    if !stderr.is_empty() {
        warn!(hook = %path.display(), stderr = %stderr, "hook wrote stderr");
    }

    Ok(())
}

fn write_lines(writer: &mut impl Write, lines: &[String]) -> io::Result<()> {
    for line in lines {
        writeln!(writer, "{line}")?;
    }
    writer.flush()
}

#[cfg(unix)]
fn is_executable(path: &Path) -> anyhow::Result<bool> {
    use std::os::unix::fs::PermissionsExt;

    let mode = fs::metadata(path)?.permissions().mode();
    Ok(mode & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> anyhow::Result<bool> {
    Ok(path.is_file())
}
