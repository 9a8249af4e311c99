use tracing::debug;

use crate::app::{Event, Vec2};

use super::byte_buffer::{BufferError, ByteBuffer};
use super::entity::{Entity, StepContext};

pub const NO_INTERACTION_ID: u8 = 0;
pub const WALL_ID: u8 = 1;
pub const CHANGE_LEVEL_ID: u8 = 2;
pub const HURT_ENTITY_ID: u8 = 3;

/// Shared instance returned for every out-of-bounds lookup.
pub static WALL: TileInteraction = TileInteraction::Wall;
pub static NO_INTERACTION: TileInteraction = TileInteraction::None;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorState {
    Open,
    Closed,
    Locked,
}

impl DoorState {
    /// Bytes other than 1 and 2 decode as `Open`.
    pub fn from_byte(value: u8) -> Self {
        match value {
            1 => DoorState::Closed,
            2 => DoorState::Locked,
            _ => DoorState::Open,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            DoorState::Open => 0,
            DoorState::Closed => 1,
            DoorState::Locked => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeLevel {
    pub destination: String,
    /// Cell coordinates in the destination level.
    pub spawn: (i64, i64),
    pub state: DoorState,
    pub hidden: bool,
}

impl ChangeLevel {
    pub fn is_locked(&self) -> bool {
        self.state == DoorState::Locked
    }

    pub fn is_open(&self) -> bool {
        self.state != DoorState::Closed && !self.is_locked()
    }

    pub fn spawn_position(&self) -> Vec2 {
        Vec2::new(self.spawn.0 as f32, self.spawn.1 as f32)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum TileInteraction {
    #[default]
    None,
    Wall,
    ChangeLevel(ChangeLevel),
    HurtEntity { damage: f64 },
}

impl TileInteraction {
    pub fn id(&self) -> u8 {
        match self {
            TileInteraction::None => NO_INTERACTION_ID,
            TileInteraction::Wall => WALL_ID,
            TileInteraction::ChangeLevel(_) => CHANGE_LEVEL_ID,
            TileInteraction::HurtEntity { .. } => HURT_ENTITY_ID,
        }
    }

    pub fn can_entity_go_through(&self, _ctx: &StepContext<'_>, entity: &Entity) -> bool {
        match self {
            TileInteraction::None | TileInteraction::HurtEntity { .. } => true,
            TileInteraction::Wall => false,
            TileInteraction::ChangeLevel(door) => door.is_open() && entity.is_player(),
        }
    }

    /// Fires once when `entity` commits to moving into this cell.
    pub fn on_entity_enter(&self, _ctx: &mut StepContext<'_>, entity: &mut Entity) {
        if let TileInteraction::HurtEntity { damage } = self {
            entity.take_damage(*damage);
        }
    }

    /// Fires once when `entity` settles exactly on this cell.
    pub fn on_entity_inside(&self, ctx: &mut StepContext<'_>, entity: &mut Entity) {
        if let TileInteraction::ChangeLevel(door) = self {
            debug!(
                entity = entity.id().get(),
                destination = door.destination.as_str(),
                "change_level_triggered"
            );
            ctx.fire_event(Event::change_level(
                door.destination.clone(),
                door.spawn_position(),
            ));
        }
    }

    pub fn write_to_buffer(&self, buffer: &mut ByteBuffer) {
        buffer.write_u8(self.id());
        match self {
            TileInteraction::None | TileInteraction::Wall => {}
            TileInteraction::ChangeLevel(door) => {
                buffer.write_string(&door.destination);
                buffer.write_int_vector(door.spawn);
                buffer.write_u8(door.state.to_byte());
                buffer.write_bool(door.hidden);
            }
            TileInteraction::HurtEntity { damage } => buffer.write_f64(*damage),
        }
    }

    /// Unknown tags decode as `None` without consuming a payload.
    pub fn read_from_buffer(buffer: &mut ByteBuffer) -> Result<Self, BufferError> {
        Ok(match buffer.read_u8()? {
            WALL_ID => TileInteraction::Wall,
            CHANGE_LEVEL_ID => TileInteraction::ChangeLevel(ChangeLevel {
                destination: buffer.read_string()?,
                spawn: buffer.read_int_vector()?,
                state: DoorState::from_byte(buffer.read_u8()?),
                hidden: buffer.read_bool()?,
            }),
            HURT_ENTITY_ID => TileInteraction::HurtEntity {
                damage: buffer.read_f64()?,
            },
            _ => TileInteraction::None,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::app::{EventKind, EventQueue};
    use crate::world::entity::{EntityId, SpriteSheet};
    use crate::world::level::LevelGrid;

    fn door(state: DoorState, hidden: bool) -> TileInteraction {
        TileInteraction::ChangeLevel(ChangeLevel {
            destination: "cave".to_string(),
            spawn: (4, 7),
            state,
            hidden,
        })
    }

    fn player() -> Entity {
        Entity::player(EntityId::new(0), SpriteSheet::new("hero", 2), 2.0)
    }

    fn npc() -> Entity {
        Entity::npc(EntityId::new(1), SpriteSheet::new("villager", 2), 2.0)
    }

    #[test]
    fn none_and_wall_are_fixed_barriers() {
        let grid = LevelGrid::empty(1, 1);
        let mut events = EventQueue::default();
        let ctx = StepContext::new(&grid, &mut events, Instant::now(), 32);
        assert!(TileInteraction::None.can_entity_go_through(&ctx, &player()));
        assert!(!TileInteraction::Wall.can_entity_go_through(&ctx, &player()));
        assert!(TileInteraction::HurtEntity { damage: 3.0 }.can_entity_go_through(&ctx, &npc()));
    }

    #[test]
    fn locked_door_never_lets_anyone_through() {
        let grid = LevelGrid::empty(1, 1);
        let mut events = EventQueue::default();
        let ctx = StepContext::new(&grid, &mut events, Instant::now(), 32);
        for hidden in [false, true] {
            assert!(!door(DoorState::Locked, hidden).can_entity_go_through(&ctx, &player()));
            assert!(!door(DoorState::Closed, hidden).can_entity_go_through(&ctx, &player()));
        }
    }

    #[test]
    fn open_door_only_admits_the_player() {
        let grid = LevelGrid::empty(1, 1);
        let mut events = EventQueue::default();
        let ctx = StepContext::new(&grid, &mut events, Instant::now(), 32);
        let open = door(DoorState::Open, true);
        assert!(open.can_entity_go_through(&ctx, &player()));
        assert!(!open.can_entity_go_through(&ctx, &npc()));
    }

    #[test]
    fn open_door_fires_change_level_on_arrival() {
        let grid = LevelGrid::empty(1, 1);
        let mut events = EventQueue::default();
        let now = Instant::now();
        {
            let mut ctx = StepContext::new(&grid, &mut events, now, 32);
            let mut mover = player();
            door(DoorState::Open, false).on_entity_enter(&mut ctx, &mut mover);
        }
        assert!(events.is_empty());
        {
            let mut ctx = StepContext::new(&grid, &mut events, now, 32);
            let mut mover = player();
            door(DoorState::Open, false).on_entity_inside(&mut ctx, &mut mover);
        }
        match events.poll(now) {
            Some(EventKind::ChangeLevel { level_name, spawn }) => {
                assert_eq!(level_name, "cave");
                assert_eq!(spawn, Vec2::new(4.0, 7.0));
            }
            other => panic!("expected change level event, got {other:?}"),
        }
    }

    #[test]
    fn hurt_entity_accumulates_damage_on_enter() {
        let grid = LevelGrid::empty(1, 1);
        let mut events = EventQueue::default();
        let mut ctx = StepContext::new(&grid, &mut events, Instant::now(), 32);
        let mut mover = player();
        let spikes = TileInteraction::HurtEntity { damage: 1.5 };
        spikes.on_entity_enter(&mut ctx, &mut mover);
        spikes.on_entity_enter(&mut ctx, &mut mover);
        spikes.on_entity_inside(&mut ctx, &mut mover);
        assert_eq!(mover.damage_taken(), 3.0);
    }

    #[test]
    fn records_round_trip_through_the_buffer() {
        let interactions = vec![
            TileInteraction::None,
            TileInteraction::Wall,
            TileInteraction::ChangeLevel(ChangeLevel {
                destination: "château_nord".to_string(),
                spawn: (12, 3),
                state: DoorState::Locked,
                hidden: true,
            }),
            TileInteraction::HurtEntity { damage: 0.75 },
        ];
        let mut buffer = ByteBuffer::new();
        for interaction in &interactions {
            interaction.write_to_buffer(&mut buffer);
        }
        for expected in &interactions {
            let decoded = TileInteraction::read_from_buffer(&mut buffer).expect("decode");
            assert_eq!(&decoded, expected);
        }
        assert_eq!(buffer.remaining(), 0);
    }

    #[test]
    fn door_spawn_beyond_f32_precision_round_trips() {
        let far = (16_777_217, -9_007_199_254_740_993);
        let mut buffer = ByteBuffer::new();
        TileInteraction::ChangeLevel(ChangeLevel {
            destination: "far_east".to_string(),
            spawn: far,
            state: DoorState::Open,
            hidden: false,
        })
        .write_to_buffer(&mut buffer);

        match TileInteraction::read_from_buffer(&mut buffer).expect("decode") {
            TileInteraction::ChangeLevel(door) => assert_eq!(door.spawn, far),
            other => panic!("expected a door, got {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_decodes_as_none() {
        let mut buffer = ByteBuffer::from_bytes(vec![42, WALL_ID]);
        assert_eq!(
            TileInteraction::read_from_buffer(&mut buffer).expect("unknown"),
            TileInteraction::None
        );
        assert_eq!(
            TileInteraction::read_from_buffer(&mut buffer).expect("wall"),
            TileInteraction::Wall
        );
    }

    #[test]
    fn unknown_door_state_counts_as_open() {
        assert_eq!(DoorState::from_byte(9), DoorState::Open);
        assert_eq!(DoorState::from_byte(2), DoorState::Locked);
    }
}
