use std::{
    ffi::OsString,
    fmt,
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::dtos::StepResult;

/// Description of one external tool invocation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        for (key, value) in &self.envs {
            command.env(key, value);
        }

        command
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;

        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }

        Ok(())
    }
}

/// Runs commands to completion and folds every outcome into a `StepResult`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepRunner {
    timeout: Option<Duration>,
}

impl StepRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub async fn run(&self, spec: &CommandSpec) -> StepResult {
        debug!("Running {spec}");

        let child = match spec.command().spawn() {
            Ok(child) => child,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                warn!("Executable not found: {}", spec.program.display());
                return StepResult::failure(format!(
                    "executable not found: {}",
                    spec.program.display()
                ));
            }
            Err(error) => {
                warn!("Failed to launch {}: {error:?}", spec.program.display());
                return StepResult::failure(format!(
                    "failed to launch {}: {error}",
                    spec.program.display()
                ));
            }
        };

        // Dropping the child on timeout kills it.
        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output,
                Err(_) => {
                    warn!("{spec} timed out after {}s", limit.as_secs());
                    return StepResult::timeout(format!("timed out after {}s", limit.as_secs()));
                }
            },
            None => child.wait_with_output().await,
        };

        let output = match output {
            Ok(output) => output,
            Err(error) => {
                return StepResult::failure(format!(
                    "failed to collect output of {}: {error}",
                    spec.program.display()
                ))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("{} stdout: {}", spec.program.display(), stdout.trim());
        }

        if output.status.success() {
            return StepResult::success();
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();

        if stderr.is_empty() {
            StepResult::failure(format!("process exited with {}", output.status))
        } else {
            StepResult::failure(stderr.to_string())
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn zero_exit_is_success() {
        let result = StepRunner::default().run(&sh("echo done")).await;

        assert_eq!(result, StepResult::success());
    }

    #[tokio::test]
    async fn non_zero_exit_reports_stderr() {
        let result = StepRunner::default()
            .run(&sh("echo 'quota exceeded' >&2; exit 3"))
            .await;

        assert!(!result.ok);
        assert!(!result.timed_out);
        assert_eq!(result.diagnostic.as_deref(), Some("quota exceeded"));
    }

    #[tokio::test]
    async fn non_zero_exit_without_stderr_reports_status() {
        let result = StepRunner::default().run(&sh("exit 7")).await;

        assert!(!result.ok);
        assert!(result.diagnostic().contains('7'), "{}", result.diagnostic());
    }

    #[tokio::test]
    async fn missing_executable_is_folded_into_failure() {
        let spec = CommandSpec::new("/nonexistent/label-tool").arg("--background");

        let result = StepRunner::default().run(&spec).await;

        assert!(!result.ok);
        assert!(result.diagnostic().contains("not found"));
    }

    #[tokio::test]
    async fn deadline_kills_hung_step() {
        let runner = StepRunner::new(Some(Duration::from_millis(200)));

        let result = runner.run(&sh("sleep 30")).await;

        assert!(!result.ok);
        assert!(result.timed_out);
    }

    #[tokio::test]
    async fn working_directory_and_env_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let spec = sh("printf %s \"$LABEL_VALUE\" > out.txt")
            .current_dir(dir.path())
            .env("LABEL_VALUE", "red");

        let result = StepRunner::default().run(&spec).await;

        assert!(result.ok, "{result:?}");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("out.txt")).unwrap(),
            "red"
        );
    }

    #[test]
    fn display_joins_program_and_args() {
        let spec = CommandSpec::new("blender").args(["scene.blend", "--background"]);

        assert_eq!(spec.to_string(), "blender scene.blend --background");
    }
}
