use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rpg_engine::{
    resolve_app_paths, AppPaths, EngineConfig, Language, LocalizationError, Localizer,
    StartupError, Untranslated,
};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::title_screen::{MenuEntry, TitleScreen};

const CONFIG_FILE_NAME: &str = "game.json";

pub(crate) struct AppWiring {
    pub(crate) config: EngineConfig,
    pub(crate) paths: AppPaths,
    pub(crate) title_screen: TitleScreen,
    pub(crate) localizer: Box<dyn Localizer>,
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Localization(#[from] LocalizationError),
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path} at {field}: {source}")]
    Parse {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    let paths = resolve_app_paths()?;
    let config_path = paths.data_dir.join(CONFIG_FILE_NAME);
    let loaded = load_config(&config_path)?;
    let config_missing = loaded.is_none();
    let config = loaded.unwrap_or_default();
    init_tracing(config.debug);
    info!(
        root = %paths.root.display(),
        game_title = %config.game_title,
        debug = config.debug,
        "=== startup ==="
    );
    if config_missing {
        warn!(path = %config_path.display(), "config_missing_using_defaults");
    }

    let localizer = load_localizer(&paths, &config.language)?;
    let title_screen = TitleScreen::new(
        config.game_title.clone(),
        vec![
            MenuEntry::new_game(
                localizer.translate("screen.title.menu.new_game", &[]),
                config.start_level.clone(),
                config.start_spawn(),
            ),
            MenuEntry::quit(localizer.translate("screen.title.menu.quit_game", &[])),
        ],
    );

    Ok(AppWiring {
        config,
        paths,
        title_screen,
        localizer,
    })
}

/// Safe to call more than once; later calls keep the first subscriber.
pub(crate) fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .try_init();
}

/// `Ok(None)` when the file does not exist.
fn load_config(path: &Path) -> Result<Option<EngineConfig>, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    parse_config(path, &raw).map(Some)
}

fn parse_config(path: &Path, raw: &str) -> Result<EngineConfig, ConfigError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
        let field = match error.path().to_string() {
            field if field.is_empty() || field == "." => "<root>".to_string(),
            field => field,
        };
        ConfigError::Parse {
            path: path.to_path_buf(),
            field,
            source: error.into_inner(),
        }
    })
}

/// A missing language file falls back to untranslated keys; a broken one is fatal.
fn load_localizer(paths: &AppPaths, code: &str) -> Result<Box<dyn Localizer>, LocalizationError> {
    let path = paths.language_file(code);
    match Language::load(&path) {
        Ok(language) => {
            info!(code = language.code(), name = language.name(), "language_selected");
            Ok(Box::new(language))
        }
        Err(LocalizationError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "language_missing_using_keys");
            Ok(Box::new(Untranslated))
        }
        Err(error) => Err(error),
    }
}
