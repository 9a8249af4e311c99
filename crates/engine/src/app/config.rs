use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::Vec2;
use crate::world::{LevelSettings, SpriteSheet};

/// Everything the runtime and the window loop need, passed in explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub game_title: String,
    pub screen_size: (u32, u32),
    pub target_tps: u32,
    pub tile_size_px: u32,
    pub level_fade_ms: u64,
    pub screen_fade_ms: u64,
    pub start_level: String,
    pub start_spawn: (i64, i64),
    pub player_sprite_sheet: String,
    pub player_walk_frames: u32,
    /// Pixels per tick.
    pub player_speed_px: f32,
    pub language: String,
    pub debug: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            game_title: "RPG".to_string(),
            screen_size: (800, 600),
            target_tps: 60,
            tile_size_px: 32,
            level_fade_ms: 500,
            screen_fade_ms: 500,
            start_level: "level_1".to_string(),
            start_spawn: (0, 0),
            player_sprite_sheet: "character".to_string(),
            player_walk_frames: 2,
            player_speed_px: 2.0,
            language: "en".to_string(),
            debug: false,
        }
    }
}

impl EngineConfig {
    pub fn level_settings(&self) -> LevelSettings {
        LevelSettings {
            tile_size_px: self.tile_size_px.max(1),
            player_sprite: SpriteSheet::new(
                self.player_sprite_sheet.clone(),
                self.player_walk_frames,
            ),
            player_speed_px: self.player_speed_px,
        }
    }

    pub fn level_fade(&self) -> Duration {
        Duration::from_millis(self.level_fade_ms)
    }

    pub fn screen_fade(&self) -> Duration {
        Duration::from_millis(self.screen_fade_ms)
    }

    pub fn start_spawn(&self) -> Vec2 {
        Vec2::new(self.start_spawn.0 as f32, self.start_spawn.1 as f32)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.target_tps.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "game_title": "Meadow", "start_spawn": [3, 4] }"#)
                .expect("parse");
        assert_eq!(config.game_title, "Meadow");
        assert_eq!(config.start_spawn(), Vec2::new(3.0, 4.0));
        assert_eq!(config.tile_size_px, 32);
        assert_eq!(config.level_fade(), Duration::from_millis(500));
        assert_eq!(config.language, "en");
    }

    #[test]
    fn level_settings_carry_player_setup() {
        let config = EngineConfig {
            player_sprite_sheet: "hero".to_string(),
            player_walk_frames: 4,
            player_speed_px: 3.0,
            tile_size_px: 0,
            ..EngineConfig::default()
        };
        let settings = config.level_settings();
        assert_eq!(settings.player_sprite.name, "hero");
        assert_eq!(settings.player_sprite.frames_per_direction, 4);
        assert_eq!(settings.player_speed_px, 3.0);
        assert_eq!(settings.tile_size_px, 1);
    }

    #[test]
    fn tick_duration_follows_target_tps() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_duration(), Duration::from_secs_f64(1.0 / 60.0));
    }
}
