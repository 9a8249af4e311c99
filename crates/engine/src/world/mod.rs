mod atomic_io;
mod byte_buffer;
mod entity;
mod interaction;
mod level;
mod loader;

pub use byte_buffer::{BufferError, ByteBuffer};
pub use entity::{
    Direction, Entity, EntityId, EntityIdAllocator, EntityKind, MoveOutcome, SpriteSheet,
    StepContext, ANIMATION_COEF, ARRIVAL_EPSILON, MAX_SPEED_PX, MIN_SPEED_PX, QUEUE_THRESHOLD,
};
pub use interaction::{ChangeLevel, DoorState, TileInteraction, NO_INTERACTION, WALL};
pub use level::{
    EntityFactory, Level, LevelData, LevelError, LevelGrid, LevelSettings, Tile, TitleLabel,
    VisibleCells,
};
pub use loader::{
    decode_level, encode_level, read_level_data, save_level, LevelLoadError, LevelLoader,
    MAP_EXTENSION, MAP_FORMAT_VERSION,
};
