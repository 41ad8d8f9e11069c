//! Page-supplied settings for the boot sequence.
//!
//! The page passes a plain object; every field is optional and falls back to
//! the defaults below.

use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LifecycleConfig {
    /// Length of the CRT power-on animation, in animation frames.
    pub boot_frames: u32,
    /// Visual progress that must be exceeded before the scene takes over.
    pub unlock_threshold: f64,
    pub initial_scene: String,
    pub milestones: LoadMilestones,
    pub dom: DomIds,
    pub modules: ModulePaths,
    /// `tracing` level name for the console subscriber.
    pub log_level: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            boot_frames: 20,
            unlock_threshold: 0.995,
            initial_scene: "home".to_owned(),
            milestones: LoadMilestones::default(),
            dom: DomIds::default(),
            modules: ModulePaths::default(),
            log_level: "info".to_owned(),
        }
    }
}

/// Progress targets reached as each loading step completes. Activating the
/// first scene always means 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoadMilestones {
    pub library: f64,
    pub scene_module: f64,
    pub manager: f64,
}

impl Default for LoadMilestones {
    fn default() -> Self {
        Self {
            library: 0.3,
            scene_module: 0.6,
            manager: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DomIds {
    pub crt_canvas: String,
    pub main_canvas: String,
    pub unlock_control: String,
    pub overlay: String,
}

impl Default for DomIds {
    fn default() -> Self {
        Self {
            crt_canvas: "crt-canvas".to_owned(),
            main_canvas: "scene-canvas".to_owned(),
            unlock_control: "unlock".to_owned(),
            overlay: "fallback-overlay".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModulePaths {
    /// Module-worker script that instantiates this crate and calls `worker_main`.
    pub worker_script: String,
    /// Entry point of the 3D rendering library.
    pub library: String,
    /// Directory holding one `<name>.js` module per scene.
    pub scene_dir: String,
    /// Export of the library module that constructs the scene manager.
    pub manager_export: String,
}

impl Default for ModulePaths {
    fn default() -> Self {
        Self {
            worker_script: "./worker.js".to_owned(),
            library: "./scene/engine.js".to_owned(),
            scene_dir: "./scene/scenes".to_owned(),
            manager_export: "SceneManager".to_owned(),
        }
    }
}

impl LifecycleConfig {
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if self.boot_frames == 0 {
            return Err(LifecycleError::Config("bootFrames must be at least 1".into()));
        }
        if !(self.unlock_threshold > 0.0 && self.unlock_threshold < 1.0) {
            return Err(LifecycleError::Config(format!(
                "unlockThreshold must lie in (0, 1), got {}",
                self.unlock_threshold
            )));
        }
        let m = &self.milestones;
        let steps = [0.0, m.library, m.scene_module, m.manager, 1.0];
        if steps.windows(2).any(|pair| !(pair[0] < pair[1])) {
            return Err(LifecycleError::Config(format!(
                "milestones must increase strictly inside (0, 1), got {} / {} / {}",
                m.library, m.scene_module, m.manager
            )));
        }
        if self.initial_scene.trim().is_empty() {
            return Err(LifecycleError::Config("initialScene must not be empty".into()));
        }
        Ok(())
    }

    pub fn scene_module_path(&self, name: &str) -> String {
        format!("{}/{}.js", self.modules.scene_dir.trim_end_matches('/'), name)
    }
}
