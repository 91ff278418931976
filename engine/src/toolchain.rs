use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{
    config::Config,
    dtos::StepResult,
    error::ViewerError,
    step_runner::{CommandSpec, StepRunner},
    viewer::ViewerLauncher,
};

/// The external collaborators a pipeline run drives, one per stage.
///
/// Implementations never fail past this boundary: every outcome is a
/// `StepResult` or, for publishing, a typed viewer error.
#[async_trait]
pub trait Toolchain: Send + Sync {
    async fn generate(&self, prompt: &str) -> StepResult;

    async fn export(&self) -> StepResult;

    /// Makes the exported asset reachable and returns the viewer URL.
    async fn publish(&self) -> Result<String, ViewerError>;

    /// Where `export` writes its asset, for reporting only.
    fn asset_path(&self) -> Option<&Path> {
        None
    }
}

/// Toolchain backed by the generator binary, Blender and the Node viewer.
#[derive(Debug)]
pub struct ExternalToolchain {
    runner: StepRunner,
    root: PathBuf,
    generator_bin: PathBuf,
    image_path: PathBuf,
    blender_exe: PathBuf,
    scene_file: PathBuf,
    export_script: PathBuf,
    asset_path: PathBuf,
    viewer: ViewerLauncher,
}

impl ExternalToolchain {
    pub fn from_config(config: &Config) -> Self {
        let runner = StepRunner::new(config.step_timeout);

        Self {
            runner,
            root: config.root.clone(),
            generator_bin: config.generator_bin.clone(),
            image_path: config.image_path.clone(),
            blender_exe: config.blender_exe.clone(),
            scene_file: config.scene_file.clone(),
            export_script: config.export_script.clone(),
            asset_path: config.asset_path.clone(),
            viewer: ViewerLauncher::new(config.viewer.clone(), runner),
        }
    }

    pub fn generation_command(&self, prompt: &str) -> CommandSpec {
        CommandSpec::new(&self.generator_bin)
            .arg("--prompt")
            .arg(prompt)
            .arg("--output")
            .arg(&self.image_path)
            .current_dir(&self.root)
    }

    pub fn export_command(&self) -> CommandSpec {
        CommandSpec::new(&self.blender_exe)
            .arg(&self.scene_file)
            .arg("--background")
            .arg("--python")
            .arg(&self.export_script)
            .arg("--")
            .arg(&self.image_path)
            .arg(&self.asset_path)
            .current_dir(&self.root)
    }
}

#[async_trait]
impl Toolchain for ExternalToolchain {
    async fn generate(&self, prompt: &str) -> StepResult {
        self.runner.run(&self.generation_command(prompt)).await
    }

    async fn export(&self) -> StepResult {
        self.runner.run(&self.export_command()).await
    }

    async fn publish(&self) -> Result<String, ViewerError> {
        self.viewer.publish().await
    }

    fn asset_path(&self) -> Option<&Path> {
        Some(&self.asset_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn config() -> Config {
        Config::from_lookup(|key| match key {
            "LABEL_ROOT" => Some("/opt/label".to_string()),
            "BLENDER_EXE" => Some("/opt/blender/blender".to_string()),
            "GENERATOR_BIN" => Some("/opt/label/bin/generate-image".to_string()),
            _ => None,
        })
        .unwrap()
    }

    fn args(spec: &CommandSpec) -> Vec<String> {
        spec.args
            .iter()
            .map(OsString::as_os_str)
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn export_command_runs_blender_in_background_mode() {
        let toolchain = ExternalToolchain::from_config(&config());

        let spec = toolchain.export_command();

        assert_eq!(spec.program, PathBuf::from("/opt/blender/blender"));
        assert_eq!(
            args(&spec),
            vec![
                "/opt/label/assets/blend_files/Golf.blend",
                "--background",
                "--python",
                "/opt/label/scripts/export_label_glb.py",
                "--",
                "/opt/label/assets/images/image.png",
                "/opt/label/assets/models/exported_label.glb",
            ]
        );
        assert_eq!(spec.cwd, Some(PathBuf::from("/opt/label")));
    }

    #[test]
    fn generation_command_passes_prompt_and_output() {
        let toolchain = ExternalToolchain::from_config(&config());

        let spec = toolchain.generation_command("red label");

        assert_eq!(spec.program, PathBuf::from("/opt/label/bin/generate-image"));
        assert_eq!(
            args(&spec),
            vec![
                "--prompt",
                "red label",
                "--output",
                "/opt/label/assets/images/image.png",
            ]
        );
    }
}
