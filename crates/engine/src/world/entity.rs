use std::time::{Duration, Instant};

use crate::app::{Event, EventQueue, Vec2};

use super::interaction::TileInteraction;
use super::level::LevelGrid;

/// Arrival tolerance in cells.
pub const ARRIVAL_EPSILON: f32 = 1e-5;
/// Remaining distance under which a new direction is buffered instead of dropped.
pub const QUEUE_THRESHOLD: f32 = 0.25;
pub const ANIMATION_COEF: f32 = 5.0;
pub const MIN_SPEED_PX: f32 = 1.0;
pub const MAX_SPEED_PX: f32 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Sprite sheet rows follow this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Down,
    Left,
    Right,
    Up,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Down,
        Direction::Left,
        Direction::Right,
        Direction::Up,
    ];

    pub fn row(self) -> u32 {
        match self {
            Direction::Down => 0,
            Direction::Left => 1,
            Direction::Right => 2,
            Direction::Up => 3,
        }
    }

    pub fn offset(self) -> (i64, i64) {
        match self {
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::Up => (0, -1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Player,
    Npc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteSheet {
    pub name: String,
    pub frames_per_direction: u32,
}

impl SpriteSheet {
    pub fn new(name: impl Into<String>, frames_per_direction: u32) -> Self {
        Self {
            name: name.into(),
            frames_per_direction: frames_per_direction.max(1),
        }
    }

    /// Frame index inside the sheet: each row holds one idle frame then the walk cycle.
    pub fn frame_index(&self, direction: Direction, walking_frame: Option<u32>) -> u32 {
        let line_start = (self.frames_per_direction + 1) * direction.row();
        match walking_frame {
            Some(frame) => line_start + 1 + frame % self.frames_per_direction,
            None => line_start,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Started,
    Queued,
    Blocked,
    /// Already moving and too far from the next cell to buffer.
    Ignored,
}

/// Borrowed view of the owning level handed to every movement and interaction call.
pub struct StepContext<'a> {
    grid: &'a LevelGrid,
    events: &'a mut EventQueue,
    pub now: Instant,
    pub tile_size_px: u32,
}

impl<'a> StepContext<'a> {
    pub fn new(
        grid: &'a LevelGrid,
        events: &'a mut EventQueue,
        now: Instant,
        tile_size_px: u32,
    ) -> Self {
        Self {
            grid,
            events,
            now,
            tile_size_px: tile_size_px.max(1),
        }
    }

    pub fn grid(&self) -> &'a LevelGrid {
        self.grid
    }

    pub fn interaction_at(&self, x: i64, y: i64) -> &'a TileInteraction {
        self.grid.interaction_at(x, y)
    }

    pub fn fire_event(&mut self, event: Event) {
        self.events.fire(event);
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    kind: EntityKind,
    sprite: SpriteSheet,
    position: Vec2,
    direction: Direction,
    speed_px: f32,
    moving_target: Option<Vec2>,
    queued_direction: Option<Direction>,
    remaining_distance: f32,
    animation_index: u32,
    animation_timer: Option<Instant>,
    damage_taken: f64,
}

impl Entity {
    pub fn new(id: EntityId, kind: EntityKind, sprite: SpriteSheet, speed_px: f32) -> Self {
        Self {
            id,
            kind,
            sprite,
            position: Vec2::ZERO,
            direction: Direction::Down,
            speed_px: clamp_speed(speed_px),
            moving_target: None,
            queued_direction: None,
            remaining_distance: 0.0,
            animation_index: 0,
            animation_timer: None,
            damage_taken: 0.0,
        }
    }

    pub fn player(id: EntityId, sprite: SpriteSheet, speed_px: f32) -> Self {
        Self::new(id, EntityKind::Player, sprite, speed_px)
    }

    pub fn npc(id: EntityId, sprite: SpriteSheet, speed_px: f32) -> Self {
        Self::new(id, EntityKind::Npc, sprite, speed_px)
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn is_player(&self) -> bool {
        self.kind == EntityKind::Player
    }

    pub fn sprite(&self) -> &SpriteSheet {
        &self.sprite
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Teleports the entity and cancels any move in flight.
    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.moving_target = None;
        self.queued_direction = None;
        self.remaining_distance = 0.0;
    }

    pub fn cell(&self) -> (i64, i64) {
        self.position.cell()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn speed_px(&self) -> f32 {
        self.speed_px
    }

    pub fn set_speed_px(&mut self, speed_px: f32) {
        self.speed_px = clamp_speed(speed_px);
    }

    pub fn moving_target(&self) -> Option<Vec2> {
        self.moving_target
    }

    pub fn queued_direction(&self) -> Option<Direction> {
        self.queued_direction
    }

    pub fn remaining_distance(&self) -> f32 {
        self.remaining_distance
    }

    pub fn is_moving(&self) -> bool {
        self.moving_target.is_some()
    }

    pub fn animation_index(&self) -> u32 {
        self.animation_index
    }

    pub fn damage_taken(&self) -> f64 {
        self.damage_taken
    }

    pub fn take_damage(&mut self, amount: f64) {
        self.damage_taken += amount;
    }

    /// Sprite sheet frame for the current direction and movement state.
    pub fn frame_index(&self) -> u32 {
        let walking = self.is_moving().then_some(self.animation_index);
        self.sprite.frame_index(self.direction, walking)
    }

    pub fn go_up(&mut self, ctx: &mut StepContext<'_>) -> MoveOutcome {
        self.go(Direction::Up, ctx)
    }

    pub fn go_down(&mut self, ctx: &mut StepContext<'_>) -> MoveOutcome {
        self.go(Direction::Down, ctx)
    }

    pub fn go_left(&mut self, ctx: &mut StepContext<'_>) -> MoveOutcome {
        self.go(Direction::Left, ctx)
    }

    pub fn go_right(&mut self, ctx: &mut StepContext<'_>) -> MoveOutcome {
        self.go(Direction::Right, ctx)
    }

    pub fn go(&mut self, direction: Direction, ctx: &mut StepContext<'_>) -> MoveOutcome {
        if self.is_moving() {
            if self.remaining_distance < QUEUE_THRESHOLD {
                self.queued_direction = Some(direction);
                return MoveOutcome::Queued;
            }
            return MoveOutcome::Ignored;
        }

        self.direction = direction;
        let (cx, cy) = self.cell();
        let (dx, dy) = direction.offset();
        let (tx, ty) = (cx + dx, cy + dy);
        let interaction = ctx.interaction_at(tx, ty);
        if !interaction.can_entity_go_through(ctx, self) {
            return MoveOutcome::Blocked;
        }

        interaction.on_entity_enter(ctx, self);
        let from = Vec2::new(cx as f32, cy as f32);
        let target = Vec2::new(tx as f32, ty as f32);
        self.moving_target = Some(target);
        self.remaining_distance = target.distance(from);
        MoveOutcome::Started
    }

    /// Advances movement and animation by one tick. Returns the cell reached this tick, if any.
    pub fn update(&mut self, ctx: &mut StepContext<'_>) -> Option<(i64, i64)> {
        let arrived = self.step_movement(ctx);
        self.step_animation(ctx);
        arrived
    }

    fn step_movement(&mut self, ctx: &mut StepContext<'_>) -> Option<(i64, i64)> {
        let target = self.moving_target?;
        let mut arrived = None;

        if self.remaining_distance < ARRIVAL_EPSILON {
            self.position = target;
            let cell = target.cell();
            let interaction = ctx.interaction_at(cell.0, cell.1);
            interaction.on_entity_inside(ctx, self);
            self.moving_target = None;
            arrived = Some(cell);
            let resumed = match self.queued_direction.take() {
                Some(direction) => self.go(direction, ctx) == MoveOutcome::Started,
                None => false,
            };
            if !resumed {
                self.remaining_distance = 0.0;
            }
        }

        if let Some(target) = self.moving_target {
            let step = self.step_cells(ctx.tile_size_px);
            let velocity = Vec2::new(
                axis_step(self.position.x, target.x, step),
                axis_step(self.position.y, target.y, step),
            );
            self.remaining_distance -= velocity.length();
            self.position = self.position + velocity;
        }
        arrived
    }

    fn step_animation(&mut self, ctx: &StepContext<'_>) {
        let last = *self.animation_timer.get_or_insert(ctx.now);
        if !self.is_moving() {
            return;
        }
        let interval =
            Duration::from_secs_f32(ANIMATION_COEF * self.step_cells(ctx.tile_size_px));
        if ctx.now.saturating_duration_since(last) >= interval {
            self.animation_index = (self.animation_index + 1) % self.sprite.frames_per_direction;
            self.animation_timer = Some(ctx.now);
        }
    }

    fn step_cells(&self, tile_size_px: u32) -> f32 {
        self.speed_px / tile_size_px.max(1) as f32
    }
}

fn clamp_speed(speed_px: f32) -> f32 {
    if speed_px.is_nan() {
        return MIN_SPEED_PX;
    }
    speed_px.clamp(MIN_SPEED_PX, MAX_SPEED_PX)
}

fn axis_step(from: f32, to: f32, step: f32) -> f32 {
    if to < from {
        -step
    } else if to > from {
        step
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::EventKind;
    use crate::world::interaction::{ChangeLevel, DoorState, TileInteraction};

    const TILE: u32 = 32;

    fn hero(speed_px: f32) -> Entity {
        Entity::player(EntityId::new(0), SpriteSheet::new("hero", 3), speed_px)
    }

    fn open_grid(width: u16, height: u16) -> LevelGrid {
        LevelGrid::empty(width, height)
    }

    fn run_until_idle(entity: &mut Entity, grid: &LevelGrid, events: &mut EventQueue) -> u32 {
        let now = Instant::now();
        let mut ticks = 0;
        while entity.is_moving() {
            let mut ctx = StepContext::new(grid, events, now, TILE);
            entity.update(&mut ctx);
            ticks += 1;
            assert!(ticks < 1_000, "entity never settled");
        }
        ticks
    }

    #[test]
    fn speed_is_clamped_on_every_assignment() {
        let mut entity = hero(40.0);
        assert_eq!(entity.speed_px(), MAX_SPEED_PX);
        entity.set_speed_px(0.1);
        assert_eq!(entity.speed_px(), MIN_SPEED_PX);
        entity.set_speed_px(f32::NAN);
        assert_eq!(entity.speed_px(), MIN_SPEED_PX);
        entity.set_speed_px(8.0);
        assert_eq!(entity.speed_px(), 8.0);
    }

    #[test]
    fn blocked_move_into_a_wall_leaves_entity_idle() {
        let mut grid = open_grid(2, 1);
        grid.set_interaction(0, 0, TileInteraction::Wall).expect("in bounds");
        let mut events = EventQueue::default();
        let mut entity = hero(2.0);
        entity.set_position(Vec2::new(1.0, 0.0));

        let mut ctx = StepContext::new(&grid, &mut events, Instant::now(), TILE);
        assert_eq!(entity.go_left(&mut ctx), MoveOutcome::Blocked);
        entity.update(&mut ctx);

        assert!(!entity.is_moving());
        assert_eq!(entity.position(), Vec2::new(1.0, 0.0));
        assert_eq!(entity.direction(), Direction::Left);
    }

    #[test]
    fn leaving_the_grid_is_treated_as_a_wall() {
        let grid = open_grid(1, 1);
        let mut events = EventQueue::default();
        let mut entity = hero(2.0);
        let mut ctx = StepContext::new(&grid, &mut events, Instant::now(), TILE);
        for direction in Direction::ALL {
            assert_eq!(entity.go(direction, &mut ctx), MoveOutcome::Blocked);
        }
    }

    #[test]
    fn one_cell_move_interpolates_then_snaps() {
        let grid = open_grid(2, 1);
        let mut events = EventQueue::default();
        let mut entity = hero(2.0);
        let now = Instant::now();

        let mut ctx = StepContext::new(&grid, &mut events, now, TILE);
        assert_eq!(entity.go_right(&mut ctx), MoveOutcome::Started);
        assert_eq!(entity.remaining_distance(), 1.0);

        entity.update(&mut ctx);
        assert!((entity.position().x - 0.0625).abs() < 1e-6);
        assert!(entity.is_moving());

        drop(ctx);
        let ticks = run_until_idle(&mut entity, &grid, &mut events);
        // 15 more interpolation steps plus the settling tick
        assert_eq!(ticks, 16);
        assert_eq!(entity.position(), Vec2::new(1.0, 0.0));
        assert_eq!(entity.remaining_distance(), 0.0);
    }

    #[test]
    fn move_request_far_from_arrival_is_ignored() {
        let grid = open_grid(3, 3);
        let mut events = EventQueue::default();
        let mut entity = hero(2.0);
        let mut ctx = StepContext::new(&grid, &mut events, Instant::now(), TILE);
        entity.go_right(&mut ctx);
        entity.update(&mut ctx);
        assert_eq!(entity.go_down(&mut ctx), MoveOutcome::Ignored);
        assert_eq!(entity.queued_direction(), None);
    }

    #[test]
    fn direction_near_arrival_is_queued_and_applied_on_arrival() {
        let grid = open_grid(3, 3);
        let mut events = EventQueue::default();
        let mut entity = hero(8.0);
        let now = Instant::now();
        let mut ctx = StepContext::new(&grid, &mut events, now, TILE);

        entity.go_right(&mut ctx);
        for _ in 0..4 {
            entity.update(&mut ctx);
        }
        assert!(entity.remaining_distance() < QUEUE_THRESHOLD);
        assert_eq!(entity.go_down(&mut ctx), MoveOutcome::Queued);

        let arrived = entity.update(&mut ctx);
        assert_eq!(arrived, Some((1, 0)));
        assert_eq!(entity.moving_target(), Some(Vec2::new(1.0, 1.0)));
        assert_eq!(entity.direction(), Direction::Down);
        assert_eq!(entity.queued_direction(), None);
    }

    #[test]
    fn enter_and_inside_fire_once_per_traversed_cell() {
        let mut grid = open_grid(5, 1);
        let spikes = |damage| TileInteraction::HurtEntity { damage };
        let door = |destination: &str| {
            TileInteraction::ChangeLevel(ChangeLevel {
                destination: destination.to_string(),
                spawn: (0, 0),
                state: DoorState::Open,
                hidden: false,
            })
        };
        grid.set_interaction(1, 0, spikes(1.0)).expect("in bounds");
        grid.set_interaction(2, 0, door("cellar")).expect("in bounds");
        grid.set_interaction(3, 0, spikes(10.0)).expect("in bounds");
        grid.set_interaction(4, 0, door("attic")).expect("in bounds");
        let mut events = EventQueue::default();
        let mut entity = hero(4.0);
        let now = Instant::now();

        for _ in 0..200 {
            let mut ctx = StepContext::new(&grid, &mut events, now, TILE);
            entity.go_right(&mut ctx);
            entity.update(&mut ctx);
        }

        assert_eq!(entity.damage_taken(), 11.0);
        let mut destinations = Vec::new();
        while let Some(kind) = events.poll(now) {
            if let EventKind::ChangeLevel { level_name, .. } = kind {
                destinations.push(level_name);
            }
        }
        assert_eq!(destinations, vec!["cellar", "attic"]);
        assert_eq!(entity.position(), Vec2::new(4.0, 0.0));
    }

    #[test]
    fn animation_advances_only_while_moving() {
        let grid = open_grid(4, 1);
        let mut events = EventQueue::default();
        let mut entity = hero(2.0);
        let start = Instant::now();

        let mut ctx = StepContext::new(&grid, &mut events, start, TILE);
        entity.update(&mut ctx);
        assert_eq!(entity.frame_index(), 0);

        entity.go_right(&mut ctx);
        // 5 * (2 / 32) seconds per frame
        ctx.now = start + Duration::from_millis(320);
        entity.update(&mut ctx);
        assert_eq!(entity.animation_index(), 1);
        assert_eq!(entity.frame_index(), (3 + 1) * 2 + 1 + 1);

        ctx.now = start + Duration::from_millis(400);
        entity.update(&mut ctx);
        assert_eq!(entity.animation_index(), 1);
    }

    #[test]
    fn sprite_rows_hold_idle_then_walk_frames() {
        let sheet = SpriteSheet::new("hero", 3);
        assert_eq!(sheet.frame_index(Direction::Down, None), 0);
        assert_eq!(sheet.frame_index(Direction::Left, None), 4);
        assert_eq!(sheet.frame_index(Direction::Up, Some(2)), 15);
        assert_eq!(sheet.frame_index(Direction::Right, Some(4)), 10);
    }

    #[test]
    fn id_allocator_is_monotonic() {
        let mut ids = EntityIdAllocator::default();
        assert_eq!(ids.allocate(), EntityId::new(0));
        assert_eq!(ids.allocate(), EntityId::new(1));
    }
}
