use std::path::Path;

use tracing::warn;

use crate::{config::Config, dtos::DependencyReport, viewer::VIEWER_FILES};

/// Existence checks for everything a run needs. Never starts anything.
pub fn check(config: &Config) -> DependencyReport {
    let mut issues = Vec::new();

    if !config.credentials_file.exists() {
        issues.push(format!(
            "Missing credentials file with OpenAI API key: {}",
            config.credentials_file.display()
        ));
    }

    if !config.blender_exe.is_file() {
        issues.push(format!("Blender not found at: {}", config.blender_exe.display()));
    }

    if !config.scene_file.exists() {
        issues.push(format!("Blender file not found: {}", config.scene_file.display()));
    }

    for script in [&config.generator_bin, &config.export_script] {
        if !script.exists() {
            issues.push(format!("Required script not found: {}", script.display()));
        }
    }

    let viewer_dir = &config.viewer.dir;
    if viewer_dir.is_dir() {
        issues.extend(missing_viewer_files(viewer_dir));
    } else {
        issues.push(format!("Web app directory not found: {}", viewer_dir.display()));
    }

    DependencyReport::from(issues)
}

fn missing_viewer_files(dir: &Path) -> impl Iterator<Item = String> + '_ {
    VIEWER_FILES
        .iter()
        .map(move |file| dir.join(file))
        .filter(|path| !path.exists())
        .map(|path| format!("Required web app file not found: {}", path.display()))
}

/// Logs each issue as a warning; returns whether the installation is ready.
pub fn log_report(report: &DependencyReport) -> bool {
    for issue in &report.issues {
        warn!("Missing dependency: {issue}");
    }

    report.ready
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config_for(root: &Path) -> Config {
        let root = root.to_path_buf();

        Config::from_lookup(move |key| match key {
            "LABEL_ROOT" => Some(root.display().to_string()),
            "BLENDER_EXE" => Some("tools/blender".to_string()),
            "GENERATOR_BIN" => Some("bin/generate-image".to_string()),
            _ => None,
        })
        .unwrap()
    }

    fn create(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn empty_installation_reports_every_prerequisite() {
        let dir = tempfile::tempdir().unwrap();

        let report = check(&config_for(dir.path()));

        assert!(!report.ready);
        assert_eq!(report.issues.len(), 6);
        assert!(report.issues[0].starts_with("Missing credentials file"));
        assert!(report.issues[1].starts_with("Blender not found at"));
        assert!(report.issues[5].starts_with("Web app directory not found"));
    }

    #[test]
    fn missing_viewer_files_are_listed_individually() {
        let dir = tempfile::tempdir().unwrap();
        for file in [
            ".env",
            "tools/blender",
            "assets/blend_files/Golf.blend",
            "bin/generate-image",
            "scripts/export_label_glb.py",
            "viewer/package.json",
            "viewer/server.js",
        ] {
            create(dir.path(), file);
        }

        let report = check(&config_for(dir.path()));

        assert!(!report.ready);
        assert_eq!(report.issues.len(), 2);
        assert!(report.issues.iter().all(|issue| issue.contains("public")));
    }

    #[test]
    fn complete_installation_is_ready() {
        let dir = tempfile::tempdir().unwrap();
        for file in [
            ".env",
            "tools/blender",
            "assets/blend_files/Golf.blend",
            "bin/generate-image",
            "scripts/export_label_glb.py",
            "viewer/package.json",
            "viewer/server.js",
            "viewer/public/index.html",
            "viewer/public/app.js",
        ] {
            create(dir.path(), file);
        }

        let report = check(&config_for(dir.path()));

        assert_eq!(report, DependencyReport { issues: vec![], ready: true });
        assert!(log_report(&report));
    }
}
