use std::{
    env,
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::{process::Child, process::Command, sync::Mutex};
use tracing::{debug, info, warn};

use crate::{
    config::ViewerConfig,
    dtos::StepResult,
    error::ViewerError,
    step_runner::{CommandSpec, StepRunner},
};

/// Files the viewer project must contain to be served.
pub static VIEWER_FILES: [&str; 4] = [
    "server.js",
    "package.json",
    "public/index.html",
    "public/app.js",
];

/// Starts the local Node viewer and confirms it answers over HTTP.
///
/// The spawned server is owned here and lives as long as the launcher.
#[derive(Debug)]
pub struct ViewerLauncher {
    config: ViewerConfig,
    runner: StepRunner,
    client: reqwest::Client,
    server: Mutex<Option<Child>>,
}

impl ViewerLauncher {
    pub fn new(config: ViewerConfig, runner: StepRunner) -> Self {
        Self {
            config,
            runner,
            client: reqwest::Client::new(),
            server: Mutex::new(None),
        }
    }

    pub async fn publish(&self) -> Result<String, ViewerError> {
        let dir = &self.config.dir;
        debug!("Starting web viewer from directory: {}", dir.display());

        if !dir.is_dir() {
            return Err(ViewerError::MissingProject(dir.display().to_string()));
        }

        if !dir.join("package.json").exists() {
            return Err(ViewerError::MissingManifest(dir.display().to_string()));
        }

        // Serialize launches so two publishes never race for the port.
        let mut server = self.server.lock().await;

        if self.probe().await.is_ok() {
            info!("Web viewer already running at {}", self.config.url);
            return Ok(self.config.url.clone());
        }

        let npm = find_npm().ok_or(ViewerError::NpmNotFound)?;

        if !dir.join("node_modules").exists() {
            info!("Installing Node.js dependencies");

            let result = self
                .runner
                .run(&CommandSpec::new(&npm).arg("install").current_dir(dir))
                .await;

            if !result.ok {
                return Err(ViewerError::InstallFailed(result.diagnostic().to_string()));
            }

            info!("Dependencies installed");
        }

        info!("Starting server with npm start");
        let mut child = spawn_server(&npm, &["start"], dir)?;
        tokio::time::sleep(self.config.startup_delay).await;

        if let Ok(Some(exit)) = child.try_wait() {
            info!("npm start exited ({exit}), trying direct node execution");
            let node = which::which("node").unwrap_or_else(|_| PathBuf::from("node"));
            child = spawn_server(&node, &["server.js"], dir)?;
            tokio::time::sleep(self.config.fallback_delay).await;
        }

        *server = Some(child);
        drop(server);

        self.probe().await?;
        info!("Web viewer server is running at {}", self.config.url);

        Ok(self.config.url.clone())
    }

    async fn probe(&self) -> Result<(), ViewerError> {
        let unreachable_with = |reason: String| ViewerError::Unreachable {
            url: self.config.url.clone(),
            reason,
        };

        let response = self
            .client
            .get(&self.config.url)
            .timeout(self.config.probe_timeout)
            .send()
            .await
            .map_err(|error| unreachable_with(error.to_string()))?;

        if response.status() == reqwest::StatusCode::OK {
            Ok(())
        } else {
            warn!("Server responded with status {}", response.status());
            Err(unreachable_with(format!("responded with status {}", response.status())))
        }
    }
}

fn spawn_server(program: &Path, args: &[&str], dir: &Path) -> Result<Child, ViewerError> {
    Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(ViewerError::Launch)
}

/// `npm` on `PATH`, else one of the usual Windows install locations.
pub fn find_npm() -> Option<PathBuf> {
    if let Ok(npm) = which::which("npm") {
        return Some(npm);
    }

    let mut candidates = vec![
        PathBuf::from(r"C:\Program Files\nodejs\npm.cmd"),
        PathBuf::from(r"C:\Program Files (x86)\nodejs\npm.cmd"),
    ];

    if let Some(appdata) = env::var_os("APPDATA") {
        candidates.push(Path::new(&appdata).join("npm").join("npm.cmd"));
    }

    if let Some(local) = env::var_os("LOCALAPPDATA") {
        candidates.push(
            Path::new(&local)
                .join("Microsoft")
                .join("WindowsApps")
                .join("npm.exe"),
        );
    }

    candidates.into_iter().find(|candidate| candidate.exists()).inspect(|npm| {
        info!("Found npm at: {}", npm.display());
    })
}

/// Opens `url` with the desktop's default handler.
pub async fn open_in_browser(url: &str) -> StepResult {
    let spec = if cfg!(target_os = "windows") {
        CommandSpec::new("cmd").args(["/C", "start", "", url])
    } else if cfg!(target_os = "macos") {
        CommandSpec::new("open").arg(url)
    } else {
        CommandSpec::new("xdg-open").arg(url)
    };

    StepRunner::default().run(&spec).await
}
