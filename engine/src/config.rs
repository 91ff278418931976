use std::{
    env,
    net::SocketAddr,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use crate::error::ConfigError;

static DEFAULT_SCENE_FILE: &str = "assets/blend_files/Golf.blend";
static DEFAULT_EXPORT_SCRIPT: &str = "scripts/export_label_glb.py";
static DEFAULT_IMAGE_PATH: &str = "assets/images/image.png";
static DEFAULT_ASSET_PATH: &str = "assets/models/exported_label.glb";
static DEFAULT_VIEWER_DIR: &str = "viewer";
static DEFAULT_VIEWER_URL: &str = "http://localhost:3000";
static DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
static GENERATOR_NAME: &str = "generate-image";

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub dir: PathBuf,
    pub url: String,
    pub startup_delay: Duration,
    pub fallback_delay: Duration,
    pub probe_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub path: PathBuf,
    pub interval: Duration,
    pub enabled: bool,
}

/// Installation layout and tuning knobs, fixed for the lifetime of the process.
///
/// Every path is absolute: relative values are resolved against `root`.
#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub credentials_file: PathBuf,
    pub blender_exe: PathBuf,
    pub scene_file: PathBuf,
    pub export_script: PathBuf,
    pub generator_bin: PathBuf,
    pub image_path: PathBuf,
    pub asset_path: PathBuf,
    pub viewer: ViewerConfig,
    pub watch: WatchConfig,
    pub step_timeout: Option<Duration>,
    pub bind_addr: SocketAddr,
    pub loki_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok().filter(|value| !value.trim().is_empty()))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let root = match lookup("LABEL_ROOT") {
            Some(root) => PathBuf::from(root),
            None => env::current_dir().map_err(ConfigError::Root)?,
        };

        let path = |key: &str, default: &str| {
            resolve_path(&root, lookup(key).as_deref().unwrap_or(default))
        };

        let image_path = path("IMAGE_PATH", DEFAULT_IMAGE_PATH);

        let blender_exe = match lookup("BLENDER_EXE") {
            Some(value) => resolve_program(&root, &value),
            None => default_blender_exe(),
        };

        let generator_bin = match lookup("GENERATOR_BIN") {
            Some(value) => resolve_program(&root, &value),
            None => default_generator_bin(),
        };

        let step_timeout = parse::<u64>(&lookup, "STEP_TIMEOUT_SECS")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .map_err(|error| ConfigError::Invalid {
                key: "BIND_ADDR".to_string(),
                value: bind_addr.clone(),
                reason: error.to_string(),
            })?;

        Ok(Self {
            credentials_file: path("CREDENTIALS_FILE", ".env"),
            blender_exe,
            scene_file: path("SCENE_FILE", DEFAULT_SCENE_FILE),
            export_script: path("EXPORT_SCRIPT", DEFAULT_EXPORT_SCRIPT),
            generator_bin,
            asset_path: path("ASSET_PATH", DEFAULT_ASSET_PATH),
            viewer: ViewerConfig {
                dir: path("VIEWER_DIR", DEFAULT_VIEWER_DIR),
                url: lookup("VIEWER_URL").unwrap_or_else(|| DEFAULT_VIEWER_URL.to_string()),
                startup_delay: secs(&lookup, "VIEWER_STARTUP_SECS", 5)?,
                fallback_delay: secs(&lookup, "VIEWER_FALLBACK_SECS", 3)?,
                probe_timeout: secs(&lookup, "VIEWER_PROBE_TIMEOUT_SECS", 10)?,
            },
            watch: WatchConfig {
                path: image_path.clone(),
                interval: positive_secs(&lookup, "WATCH_INTERVAL_SECS", 2)?,
                enabled: parse::<bool>(&lookup, "WATCH_ENABLED")?.unwrap_or(true),
            },
            step_timeout,
            bind_addr,
            loki_url: lookup("LOKI_URL"),
            image_path,
            root,
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|error| ConfigError::Invalid {
                    key: key.to_string(),
                    value: value.clone(),
                    reason: error.to_string(),
                })
        })
        .transpose()
}

fn secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    Ok(Duration::from_secs(parse::<u64>(lookup, key)?.unwrap_or(default)))
}

/// Like `secs`, but zero is rejected.
fn positive_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let duration = secs(lookup, key, default)?;

    if duration.is_zero() {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(duration)
}

pub fn resolve_path(root: &Path, value: &str) -> PathBuf {
    let path = PathBuf::from(value);

    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

/// Bare program names are looked up on `PATH`; anything with a separator is a path.
pub fn resolve_program(root: &Path, value: &str) -> PathBuf {
    if Path::new(value).components().count() == 1 {
        which::which(value).unwrap_or_else(|_| PathBuf::from(value))
    } else {
        resolve_path(root, value)
    }
}

fn default_blender_exe() -> PathBuf {
    if let Ok(path) = which::which("blender") {
        return path;
    }

    if cfg!(windows) {
        PathBuf::from(r"C:\Program Files\Blender Foundation\Blender 4.4\blender.exe")
    } else {
        PathBuf::from("blender")
    }
}

fn default_generator_bin() -> PathBuf {
    let sibling = env::current_exe().ok().and_then(|exe| {
        let candidate = exe
            .parent()?
            .join(format!("{GENERATOR_NAME}{}", env::consts::EXE_SUFFIX));
        candidate.exists().then_some(candidate)
    });

    sibling
        .or_else(|| which::which(GENERATOR_NAME).ok())
        .unwrap_or_else(|| PathBuf::from(GENERATOR_NAME))
}
