use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

use crate::app::{
    Event, EventQueue, InputAction, InputEvent, InputSnapshot, Rgb, Scene, SceneContext, Surface,
    Vec2,
};

use super::entity::{Entity, EntityId, EntityIdAllocator, SpriteSheet, StepContext};
use super::interaction::{TileInteraction, WALL};

pub type EntityFactory = Box<dyn FnOnce(EntityId) -> Entity>;

const TITLE_SHOW_AFTER: Duration = Duration::from_millis(500);
const TITLE_HIDE_AFTER: Duration = Duration::from_secs(3);
const TITLE_POSITION_PX: Vec2 = Vec2::new(6.0, 12.0);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LevelError {
    #[error("level {level} already has a player entity")]
    PlayerAlreadySpawned { level: String },
    #[error("cell ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        x: i64,
        y: i64,
        width: u16,
        height: u16,
    },
    #[error("layer {layer} does not exist (level has {layer_count} layers)")]
    NoSuchLayer { layer: usize, layer_count: usize },
    #[error("{what} grid has {actual} cells, expected {expected}")]
    GridSizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Reference into a tileset atlas. Absent tiles are stored as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    pub tileset_id: u16,
    pub tile_id: u16,
}

impl Tile {
    pub const fn new(tileset_id: u16, tile_id: u16) -> Self {
        Self {
            tileset_id,
            tile_id,
        }
    }
}

/// Row-major tile layers plus the parallel interaction grid.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelGrid {
    width: u16,
    height: u16,
    layers: Vec<Vec<Option<Tile>>>,
    interactions: Vec<TileInteraction>,
}

impl LevelGrid {
    pub fn new(
        width: u16,
        height: u16,
        layers: Vec<Vec<Option<Tile>>>,
        interactions: Vec<TileInteraction>,
    ) -> Result<Self, LevelError> {
        let expected = width as usize * height as usize;
        for layer in &layers {
            check_cell_count("tile layer", expected, layer.len())?;
        }
        check_cell_count("interaction", expected, interactions.len())?;
        Ok(Self {
            width,
            height,
            layers,
            interactions,
        })
    }

    /// A grid with no tile layers and `None` everywhere.
    pub fn empty(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            layers: Vec::new(),
            interactions: vec![TileInteraction::None; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layers(&self) -> &[Vec<Option<Tile>>] {
        &self.layers
    }

    pub fn interactions(&self) -> &[TileInteraction] {
        &self.interactions
    }

    pub fn push_layer(&mut self, tiles: Vec<Option<Tile>>) -> Result<(), LevelError> {
        check_cell_count("tile layer", self.cell_count(), tiles.len())?;
        self.layers.push(tiles);
        Ok(())
    }

    pub fn tile(&self, layer: usize, x: i64, y: i64) -> Result<Option<Tile>, LevelError> {
        let index = self.index_of(x, y)?;
        let tiles = self.layers.get(layer).ok_or(LevelError::NoSuchLayer {
            layer,
            layer_count: self.layers.len(),
        })?;
        Ok(tiles[index])
    }

    pub fn set_tile(
        &mut self,
        layer: usize,
        x: i64,
        y: i64,
        tile: Option<Tile>,
    ) -> Result<(), LevelError> {
        let index = self.index_of(x, y)?;
        let layer_count = self.layers.len();
        let tiles = self
            .layers
            .get_mut(layer)
            .ok_or(LevelError::NoSuchLayer { layer, layer_count })?;
        tiles[index] = tile;
        Ok(())
    }

    /// Strict accessor: out-of-bounds coordinates are an error.
    pub fn interaction(&self, x: i64, y: i64) -> Result<&TileInteraction, LevelError> {
        let index = self.index_of(x, y)?;
        Ok(&self.interactions[index])
    }

    /// Movement lookup: everything outside the grid behaves as a wall.
    pub fn interaction_at(&self, x: i64, y: i64) -> &TileInteraction {
        match self.index_of(x, y) {
            Ok(index) => &self.interactions[index],
            Err(_) => &WALL,
        }
    }

    pub fn set_interaction(
        &mut self,
        x: i64,
        y: i64,
        interaction: TileInteraction,
    ) -> Result<(), LevelError> {
        let index = self.index_of(x, y)?;
        self.interactions[index] = interaction;
        Ok(())
    }

    fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    fn index_of(&self, x: i64, y: i64) -> Result<usize, LevelError> {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return Err(LevelError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(y as usize * self.width as usize + x as usize)
    }
}

fn check_cell_count(what: &'static str, expected: usize, actual: usize) -> Result<(), LevelError> {
    if expected != actual {
        return Err(LevelError::GridSizeMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Everything a `.map` file describes.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelData {
    pub grid: LevelGrid,
    pub background_color: Rgb,
    pub entity_render_layer: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelSettings {
    pub tile_size_px: u32,
    pub player_sprite: SpriteSheet,
    pub player_speed_px: f32,
}

impl Default for LevelSettings {
    fn default() -> Self {
        Self {
            tile_size_px: 32,
            player_sprite: SpriteSheet::new("character", 2),
            player_speed_px: 2.0,
        }
    }
}

/// Half-open range of cells overlapping the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleCells {
    pub x_start: u32,
    pub x_end: u32,
    pub y_start: u32,
    pub y_end: u32,
}

impl VisibleCells {
    pub fn is_empty(&self) -> bool {
        self.x_start >= self.x_end || self.y_start >= self.y_end
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        (self.x_end - self.x_start) as usize * (self.y_end - self.y_start) as usize
    }
}

#[derive(Debug, Clone)]
pub struct TitleLabel {
    text: String,
    first_update: Option<Instant>,
    visible: bool,
}

impl TitleLabel {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            first_update: None,
            visible: false,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn update(&mut self, now: Instant) {
        match self.first_update {
            None => self.first_update = Some(now),
            Some(start) => {
                let elapsed = now.saturating_duration_since(start);
                self.visible = (TITLE_SHOW_AFTER..=TITLE_HIDE_AFTER).contains(&elapsed);
            }
        }
    }
}

pub struct Level {
    name: String,
    data: LevelData,
    settings: LevelSettings,
    entities: Vec<Entity>,
    ids: EntityIdAllocator,
    player: Option<EntityId>,
    camera: Vec2,
    controls_enabled: bool,
    title: TitleLabel,
}

impl Level {
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        data: LevelData,
        settings: LevelSettings,
    ) -> Self {
        Self {
            name: name.into(),
            data,
            settings,
            entities: Vec::new(),
            ids: EntityIdAllocator::default(),
            player: None,
            camera: Vec2::ZERO,
            controls_enabled: true,
            title: TitleLabel::new(title),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &LevelData {
        &self.data
    }

    pub fn grid(&self) -> &LevelGrid {
        &self.data.grid
    }

    pub fn settings(&self) -> &LevelSettings {
        &self.settings
    }

    pub fn camera_offset(&self) -> Vec2 {
        self.camera
    }

    pub fn title(&self) -> &TitleLabel {
        &self.title
    }

    pub fn controls_enabled(&self) -> bool {
        self.controls_enabled
    }

    pub fn set_controls_enabled(&mut self, enabled: bool) {
        self.controls_enabled = enabled;
    }

    /// Entities in insertion order, which is also their draw order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id() == id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id() == id)
    }

    pub fn player(&self) -> Option<&Entity> {
        self.player.and_then(|id| self.entity(id))
    }

    pub fn player_mut(&mut self) -> Option<&mut Entity> {
        let id = self.player?;
        self.entity_mut(id)
    }

    pub fn get_tile(&self, layer: usize, x: i64, y: i64) -> Result<Option<Tile>, LevelError> {
        self.data.grid.tile(layer, x, y)
    }

    pub fn get_tile_interaction(&self, x: i64, y: i64) -> &TileInteraction {
        self.data.grid.interaction_at(x, y)
    }

    pub fn spawn_player(&mut self, at: Vec2) -> Result<EntityId, LevelError> {
        if self.player.is_some() {
            return Err(LevelError::PlayerAlreadySpawned {
                level: self.name.clone(),
            });
        }
        let id = self.ids.allocate();
        let mut player = Entity::player(
            id,
            self.settings.player_sprite.clone(),
            self.settings.player_speed_px,
        );
        player.set_position(at);
        self.entities.push(player);
        self.player = Some(id);
        info!(level = %self.name, x = at.x, y = at.y, "player_spawned");
        Ok(id)
    }

    pub fn spawn_entity(&mut self, factory: EntityFactory, at: Vec2) -> EntityId {
        let id = self.ids.allocate();
        let mut entity = factory(id);
        entity.set_position(at);
        debug!(
            level = %self.name,
            entity = id.get(),
            x = at.x,
            y = at.y,
            "entity_spawned"
        );
        self.entities.push(entity);
        id
    }

    /// One simulation tick: player input, then every entity in insertion order.
    pub fn step(&mut self, input: &InputSnapshot, now: Instant, events: &mut EventQueue) {
        let Level {
            data,
            settings,
            entities,
            player,
            controls_enabled,
            title,
            ..
        } = self;
        let mut ctx = StepContext::new(&data.grid, events, now, settings.tile_size_px);

        if let (true, Some(player_id)) = (*controls_enabled, *player) {
            if let Some(mover) = entities.iter_mut().find(|e| e.id() == player_id) {
                poll_movement(mover, input, &mut ctx);
            }
        }
        for entity in entities.iter_mut() {
            entity.update(&mut ctx);
        }
        title.update(now);
    }

    /// Centers the player, or centers the whole level along an axis where it fits on screen.
    pub fn update_camera(&mut self, window_size: (u32, u32)) {
        let tile = self.settings.tile_size_px as f32;
        let level_w = f32::from(self.data.grid.width()) * tile;
        let level_h = f32::from(self.data.grid.height()) * tile;
        let (window_w, window_h) = (window_size.0 as f32, window_size.1 as f32);
        let focus = self.player().map(Entity::position).unwrap_or(Vec2::ZERO);

        self.camera.x = if level_w <= window_w {
            (level_w - window_w) / 2.0
        } else {
            (focus.x + 0.5) * tile - window_w / 2.0
        };
        self.camera.y = if level_h <= window_h {
            (level_h - window_h) / 2.0
        } else {
            (focus.y + 0.5) * tile - window_h / 2.0
        };
    }

    pub fn visible_cells(&self, window_size: (u32, u32)) -> VisibleCells {
        let tile = self.settings.tile_size_px.max(1) as f32;
        let x_start = (self.camera.x / tile).floor().max(0.0) as u32;
        let y_start = (self.camera.y / tile).floor().max(0.0) as u32;
        let x_end = ((self.camera.x + window_size.0 as f32) / tile)
            .ceil()
            .clamp(0.0, f32::from(self.data.grid.width())) as u32;
        let y_end = ((self.camera.y + window_size.1 as f32) / tile)
            .ceil()
            .clamp(0.0, f32::from(self.data.grid.height())) as u32;
        VisibleCells {
            x_start,
            x_end,
            y_start,
            y_end,
        }
    }

    pub fn screen_position(&self, cell: Vec2) -> Vec2 {
        cell * self.settings.tile_size_px as f32 - self.camera
    }

    fn is_on_screen(&self, screen: Vec2, window_size: (u32, u32)) -> bool {
        let size = self.settings.tile_size_px as f32;
        screen.x > -size
            && screen.y > -size
            && screen.x < window_size.0 as f32
            && screen.y < window_size.1 as f32
    }

    fn draw_layer(&self, layer: usize, cells: VisibleCells, surface: &mut dyn Surface) {
        let Some(tiles) = self.data.grid.layers().get(layer) else {
            return;
        };
        let width = self.data.grid.width() as usize;
        for y in cells.y_start..cells.y_end {
            for x in cells.x_start..cells.x_end {
                if let Some(tile) = tiles[y as usize * width + x as usize] {
                    let at = self.screen_position(Vec2::new(x as f32, y as f32));
                    surface.draw_tile(tile, at, self.settings.tile_size_px);
                }
            }
        }
    }

    fn draw_entities(&self, window_size: (u32, u32), surface: &mut dyn Surface) {
        for entity in &self.entities {
            let at = self.screen_position(entity.position());
            if !self.is_on_screen(at, window_size) {
                continue;
            }
            surface.draw_sprite(
                &entity.sprite().name,
                entity.frame_index(),
                at,
                self.settings.tile_size_px,
            );
        }
    }
}

fn poll_movement(player: &mut Entity, input: &InputSnapshot, ctx: &mut StepContext<'_>) {
    if input.is_down(InputAction::MoveUp) {
        player.go_up(ctx);
    } else if input.is_down(InputAction::MoveDown) {
        player.go_down(ctx);
    }
    if input.is_down(InputAction::MoveLeft) {
        player.go_left(ctx);
    } else if input.is_down(InputAction::MoveRight) {
        player.go_right(ctx);
    }
}

impl Scene for Level {
    fn on_input_event(&mut self, event: InputEvent, ctx: &mut SceneContext<'_>) -> bool {
        if event.is_press_of(InputAction::Cancel) {
            info!(level = %self.name, reason = "cancel_key", "quit_requested");
            ctx.fire_event(Event::quit());
            return true;
        }
        false
    }

    fn update(&mut self, ctx: &mut SceneContext<'_>) {
        let now = ctx.now;
        let input = *ctx.input;
        self.step(&input, now, ctx.events_mut());
        self.update_camera(input.window_size());
    }

    fn draw(&mut self, surface: &mut dyn Surface) {
        let window_size = surface.size();
        self.update_camera(window_size);
        surface.clear(self.data.background_color);

        let cells = self.visible_cells(window_size);
        let entity_layer = usize::from(self.data.entity_render_layer);
        let passes = self.data.grid.layer_count().max(entity_layer + 1);
        for layer in 0..passes {
            self.draw_layer(layer, cells, surface);
            if layer == entity_layer {
                self.draw_entities(window_size, surface);
            }
        }

        if self.title.is_visible() {
            surface.draw_label(self.title.text(), TITLE_POSITION_PX);
        }
    }

    fn debug_title(&self) -> Option<String> {
        let player = self
            .player()
            .map(|player| {
                let (x, y) = player.cell();
                format!("{x},{y}")
            })
            .unwrap_or_else(|| "none".to_string());
        Some(format!(
            "{} | entities {} | player {}",
            self.name,
            self.entities.len(),
            player
        ))
    }

    fn as_level(&self) -> Option<&Level> {
        Some(self)
    }

    fn as_level_mut(&mut self) -> Option<&mut Level> {
        Some(self)
    }
}
