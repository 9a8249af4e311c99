use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod world;

pub use app::{
    run_app, ActionStates, AppError, EngineConfig, EngineError, EngineRuntime, Event, EventKind,
    EventQueue, InputAction, InputEvent, InputSnapshot, Language, LocalizationError, Localizer,
    Renderer, Rgb, Scene, SceneContext, SceneTransition, Surface, TransitionPhase, Untranslated,
    Vec2,
};
pub use world::{
    decode_level, encode_level, read_level_data, save_level, BufferError, ByteBuffer,
    ChangeLevel, Direction, DoorState, Entity, EntityFactory, EntityId, EntityKind, Level,
    LevelData, LevelError, LevelGrid, LevelLoadError, LevelLoader, LevelSettings, MoveOutcome,
    SpriteSheet, StepContext, Tile, TileInteraction,
};

pub const ROOT_ENV_VAR: &str = "RPG_ENGINE_ROOT";

/// Directories under the game root. Every one lives inside `data/`.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub maps_dir: PathBuf,
    pub textures_dir: PathBuf,
    pub langs_dir: PathBuf,
}

impl AppPaths {
    pub fn from_root(root: PathBuf) -> Self {
        let data_dir = root.join("data");
        Self {
            maps_dir: data_dir.join("maps"),
            textures_dir: data_dir.join("textures"),
            langs_dir: data_dir.join("langs"),
            data_dir,
            root,
        }
    }

    pub fn language_file(&self, code: &str) -> PathBuf {
        self.langs_dir.join(format!("{code}.json"))
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error(
        "{var} is set but does not point to a game root: {path}\n\
A game root must contain a data/ directory."
    )]
    InvalidEnvRoot { var: &'static str, path: PathBuf },
    #[error(
        "Could not find a game root by walking upward from {start_dir}\n\
Expected a directory containing data/.\n\
Set {env_var} explicitly, for example:\n\
export {env_var}=\"/path/to/game\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    resolve_root().map(AppPaths::from_root)
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let normalized = normalize_path(&PathBuf::from(value));
            if is_game_root(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot {
                    var: ROOT_ENV_VAR,
                    path: normalized,
                })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;
            find_root_from(&exe_dir).ok_or_else(|| StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn find_root_from(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|candidate| is_game_root(candidate))
        .map(normalize_path)
}

fn is_game_root(path: &Path) -> bool {
    path.join("data").is_dir()
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn root_is_found_from_a_nested_directory() {
        let temp = TempDir::new().expect("temp");
        fs::create_dir_all(temp.path().join("data")).expect("data dir");
        let nested = temp.path().join("target").join("debug");
        fs::create_dir_all(&nested).expect("nested");

        let root = find_root_from(&nested).expect("root");
        assert_eq!(root, normalize_path(temp.path()));
    }

    #[test]
    fn directory_without_data_is_not_a_root() {
        let temp = TempDir::new().expect("temp");
        assert!(!is_game_root(temp.path()));
    }

    #[test]
    fn paths_hang_off_the_data_directory() {
        let paths = AppPaths::from_root(PathBuf::from("/game"));
        assert_eq!(paths.maps_dir, PathBuf::from("/game/data/maps"));
        assert_eq!(paths.language_file("en"), PathBuf::from("/game/data/langs/en.json"));
    }
}
