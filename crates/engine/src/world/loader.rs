use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use thiserror::Error;
use tracing::info;

use crate::app::Rgb;

use super::atomic_io::write_bytes_atomic;
use super::byte_buffer::{BufferError, ByteBuffer};
use super::interaction::TileInteraction;
use super::level::{Level, LevelData, LevelError, LevelGrid, LevelSettings, Tile};

pub const MAP_FORMAT_VERSION: u32 = 1;
pub const MAP_EXTENSION: &str = "map";

#[derive(Debug, Error)]
pub enum LevelLoadError {
    #[error("failed to read/write level file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decompress level file {path}: {source}")]
    Decompress {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("level {name} has unrecognized file version {version}")]
    UnsupportedVersion { name: String, version: u32 },
    #[error("level {name} is truncated or malformed: {source}")]
    Buffer {
        name: String,
        #[source]
        source: BufferError,
    },
    #[error("level {name} has an inconsistent grid: {source}")]
    Grid {
        name: String,
        #[source]
        source: LevelError,
    },
    #[error("level {name} has {layer_count} layers; the format stores at most 255")]
    TooManyLayers { name: String, layer_count: usize },
}

/// Builds playable levels from `{maps_dir}/{name}.map`.
#[derive(Debug, Clone)]
pub struct LevelLoader {
    maps_dir: PathBuf,
    settings: LevelSettings,
}

impl LevelLoader {
    pub fn new(maps_dir: impl Into<PathBuf>, settings: LevelSettings) -> Self {
        Self {
            maps_dir: maps_dir.into(),
            settings,
        }
    }

    pub fn maps_dir(&self) -> &Path {
        &self.maps_dir
    }

    pub fn settings(&self) -> &LevelSettings {
        &self.settings
    }

    pub fn map_path(&self, name: &str) -> PathBuf {
        self.maps_dir.join(format!("{name}.{MAP_EXTENSION}"))
    }

    /// `title` is the already-translated label shown when the level opens.
    pub fn load_level(&self, name: &str, title: &str) -> Result<Level, LevelLoadError> {
        let path = self.map_path(name);
        let data = read_level_data(&path, name)?;
        info!(
            level = name,
            path = %path.display(),
            width = data.grid.width(),
            height = data.grid.height(),
            layer_count = data.grid.layer_count(),
            "level_loaded"
        );
        Ok(Level::new(name, title, data, self.settings.clone()))
    }
}

pub fn read_level_data(path: &Path, name: &str) -> Result<LevelData, LevelLoadError> {
    let compressed = fs::read(path).map_err(|source| LevelLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut payload = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut payload)
        .map_err(|source| LevelLoadError::Decompress {
            path: path.to_path_buf(),
            source,
        })?;
    decode_level(name, payload)
}

pub fn save_level(path: &Path, name: &str, data: &LevelData) -> Result<(), LevelLoadError> {
    let payload = encode_level(name, data)?;
    let io_error = |source| LevelLoadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&payload).map_err(io_error)?;
    let compressed = encoder.finish().map_err(io_error)?;
    write_bytes_atomic(path, &compressed).map_err(io_error)?;
    info!(level = name, path = %path.display(), bytes = compressed.len(), "level_saved");
    Ok(())
}

/// Decodes an uncompressed map payload. Only the version is validated; an
/// `entity_render_layer` past the last layer is kept as is.
pub fn decode_level(name: &str, payload: Vec<u8>) -> Result<LevelData, LevelLoadError> {
    let mut buffer = ByteBuffer::from_bytes(payload);
    let buffer_error = |source| LevelLoadError::Buffer {
        name: name.to_string(),
        source,
    };

    let version = buffer.read_u32().map_err(buffer_error)?;
    if version != MAP_FORMAT_VERSION {
        return Err(LevelLoadError::UnsupportedVersion {
            name: name.to_string(),
            version,
        });
    }
    let width = buffer.read_u16().map_err(buffer_error)?;
    let height = buffer.read_u16().map_err(buffer_error)?;
    let background_color = Rgb::new(
        buffer.read_u8().map_err(buffer_error)?,
        buffer.read_u8().map_err(buffer_error)?,
        buffer.read_u8().map_err(buffer_error)?,
    );
    let entity_render_layer = buffer.read_u8().map_err(buffer_error)?;
    let layers = read_layers(&mut buffer, width, height).map_err(buffer_error)?;
    let interactions = read_interactions(&mut buffer, width, height).map_err(buffer_error)?;

    let grid = LevelGrid::new(width, height, layers, interactions).map_err(|source| {
        LevelLoadError::Grid {
            name: name.to_string(),
            source,
        }
    })?;
    Ok(LevelData {
        grid,
        background_color,
        entity_render_layer,
    })
}

/// Serializes `data` into the uncompressed map payload read by [`decode_level`].
pub fn encode_level(name: &str, data: &LevelData) -> Result<Vec<u8>, LevelLoadError> {
    let grid = &data.grid;
    let layer_count = u8::try_from(grid.layer_count()).map_err(|_| {
        LevelLoadError::TooManyLayers {
            name: name.to_string(),
            layer_count: grid.layer_count(),
        }
    })?;

    let mut buffer = ByteBuffer::new();
    buffer.write_u32(MAP_FORMAT_VERSION);
    buffer.write_u16(grid.width());
    buffer.write_u16(grid.height());
    buffer.write_u8(data.background_color.r);
    buffer.write_u8(data.background_color.g);
    buffer.write_u8(data.background_color.b);
    buffer.write_u8(data.entity_render_layer);
    buffer.write_u8(layer_count);
    for layer in grid.layers() {
        for cell in layer {
            let tile = cell.unwrap_or(Tile::new(0, 0));
            buffer.write_u16(tile.tileset_id);
            buffer.write_u16(tile.tile_id);
        }
    }
    for interaction in grid.interactions() {
        interaction.write_to_buffer(&mut buffer);
    }
    Ok(buffer.into_bytes())
}

fn read_layers(
    buffer: &mut ByteBuffer,
    width: u16,
    height: u16,
) -> Result<Vec<Vec<Option<Tile>>>, BufferError> {
    let layer_count = buffer.read_u8()?;
    let cell_count = usize::from(width) * usize::from(height);
    let mut layers = Vec::with_capacity(usize::from(layer_count));
    for _ in 0..layer_count {
        let mut tiles = Vec::with_capacity(cell_count.min(buffer.remaining() / 4));
        for _ in 0..cell_count {
            let tileset_id = buffer.read_u16()?;
            let tile_id = buffer.read_u16()?;
            tiles.push((tileset_id > 0).then_some(Tile::new(tileset_id, tile_id)));
        }
        layers.push(tiles);
    }
    Ok(layers)
}

fn read_interactions(
    buffer: &mut ByteBuffer,
    width: u16,
    height: u16,
) -> Result<Vec<TileInteraction>, BufferError> {
    let cell_count = usize::from(width) * usize::from(height);
    let mut interactions = Vec::with_capacity(cell_count.min(buffer.remaining()));
    for _ in 0..cell_count {
        interactions.push(TileInteraction::read_from_buffer(buffer)?);
    }
    Ok(interactions)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::world::interaction::{ChangeLevel, DoorState};

    fn sample_data() -> LevelData {
        let mut grid = LevelGrid::empty(3, 2);
        grid.push_layer(vec![Some(Tile::new(1, 4)); 6]).expect("ground");
        grid.push_layer(vec![None; 6]).expect("decor");
        grid.set_tile(1, 2, 1, Some(Tile::new(7, 65_000))).expect("cell");
        grid.set_interaction(0, 0, TileInteraction::Wall).expect("cell");
        grid.set_interaction(
            1,
            0,
            TileInteraction::ChangeLevel(ChangeLevel {
                destination: "カフェ_2階".to_string(),
                spawn: (9, 14),
                state: DoorState::Closed,
                hidden: true,
            }),
        )
        .expect("cell");
        grid.set_interaction(2, 1, TileInteraction::HurtEntity { damage: 2.5 }).expect("cell");
        LevelData {
            grid,
            background_color: Rgb::new(12, 34, 56),
            entity_render_layer: 1,
        }
    }

    fn header(version: u32, width: u16, height: u16, entity_layer: u8, layers: u8) -> ByteBuffer {
        let mut buffer = ByteBuffer::new();
        buffer.write_u32(version);
        buffer.write_u16(width);
        buffer.write_u16(height);
        buffer.write_u8(1);
        buffer.write_u8(2);
        buffer.write_u8(3);
        buffer.write_u8(entity_layer);
        buffer.write_u8(layers);
        buffer
    }

    #[test]
    fn encode_then_decode_reproduces_the_level() {
        let data = sample_data();
        let payload = encode_level("inn", &data).expect("encode");
        let decoded = decode_level("inn", payload).expect("decode");
        assert_eq!(decoded, data);
    }

    #[test]
    fn header_layout_matches_the_map_format() {
        let payload = encode_level("inn", &sample_data()).expect("encode");
        assert_eq!(
            &payload[..13],
            &[0, 0, 0, 1, 0, 3, 0, 2, 12, 34, 56, 1, 2]
        );
    }

    #[test]
    fn zero_tileset_is_an_absent_tile() {
        let mut buffer = header(1, 1, 1, 0, 1);
        buffer.write_u16(0);
        buffer.write_u16(99);
        buffer.write_u8(0);
        let data = decode_level("blank", buffer.into_bytes()).expect("decode");
        assert_eq!(data.grid.tile(0, 0, 0).expect("tile"), None);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let buffer = header(2, 1, 1, 0, 0);
        let error = decode_level("future", buffer.into_bytes()).expect_err("version");
        assert!(matches!(
            error,
            LevelLoadError::UnsupportedVersion { version: 2, .. }
        ));
    }

    #[test]
    fn oversized_dimensions_surface_as_underrun() {
        let mut buffer = header(1, 40, 40, 0, 1);
        buffer.write_u16(1);
        buffer.write_u16(1);
        let error = decode_level("short", buffer.into_bytes()).expect_err("underrun");
        assert!(matches!(
            error,
            LevelLoadError::Buffer {
                source: BufferError::Underrun { .. },
                ..
            }
        ));
    }

    #[test]
    fn out_of_range_entity_layer_is_kept() {
        let mut buffer = header(1, 1, 1, 3, 1);
        buffer.write_u16(1);
        buffer.write_u16(0);
        buffer.write_u8(0);
        let data = decode_level("high_layer", buffer.into_bytes()).expect("decode");
        assert_eq!(data.entity_render_layer, 3);
        assert_eq!(data.grid.layer_count(), 1);

        let mut empty = header(1, 1, 1, 0, 0);
        empty.write_u8(0);
        decode_level("no_layers", empty.into_bytes()).expect("zero layers accepted");
    }

    /// Single-member gzip stream with a stored deflate block and the file name
    /// recorded in the header, as Python's `gzip.open(path, "wb")` writes it.
    fn gzip_with_file_name(file_name: &str, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0x1f, 0x8b, 0x08, 0x08, 0, 0, 0, 0, 0x02, 0xff];
        out.extend_from_slice(file_name.as_bytes());
        out.push(0);
        let len = u16::try_from(payload.len()).expect("fits one stored block");
        out.push(0x01);
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&(!len).to_le_bytes());
        out.extend_from_slice(payload);
        let mut crc = flate2::Crc::new();
        crc.update(payload);
        out.extend_from_slice(&crc.sum().to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out
    }

    #[test]
    fn gzip_map_from_the_map_maker_loads() {
        let temp = TempDir::new().expect("temp");
        let loader = LevelLoader::new(temp.path(), LevelSettings::default());
        let mut payload = header(1, 1, 1, 0, 1);
        payload.write_u16(1);
        payload.write_u16(2);
        TileInteraction::Wall.write_to_buffer(&mut payload);
        fs::write(
            loader.map_path("porch"),
            gzip_with_file_name("porch.map", payload.as_bytes()),
        )
        .expect("write");

        let level = loader.load_level("porch", "Porch").expect("gzip map");
        assert_eq!(level.get_tile(0, 0, 0).expect("tile"), Some(Tile::new(1, 2)));
        assert_eq!(level.get_tile_interaction(0, 0), &TileInteraction::Wall);
        assert_eq!(level.data().background_color, Rgb::new(1, 2, 3));
    }

    #[test]
    fn saved_maps_are_gzip_streams() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("inn.map");
        save_level(&path, "inn", &sample_data()).expect("save");
        let bytes = fs::read(&path).expect("read");
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn saved_maps_load_through_the_loader() {
        let temp = TempDir::new().expect("temp");
        let loader = LevelLoader::new(temp.path(), LevelSettings::default());
        let data = sample_data();
        save_level(&loader.map_path("inn"), "inn", &data).expect("save");

        let level = loader.load_level("inn", "The Inn").expect("load");
        assert_eq!(level.name(), "inn");
        assert_eq!(level.title().text(), "The Inn");
        assert_eq!(level.data(), &data);
    }

    #[test]
    fn missing_map_is_an_io_error() {
        let temp = TempDir::new().expect("temp");
        let loader = LevelLoader::new(temp.path(), LevelSettings::default());
        let error = loader.load_level("nowhere", "Nowhere").err().expect("missing");
        assert!(matches!(error, LevelLoadError::Io { .. }));
    }

    #[test]
    fn empty_map_file_is_rejected() {
        let temp = TempDir::new().expect("temp");
        let loader = LevelLoader::new(temp.path(), LevelSettings::default());
        fs::write(loader.map_path("raw"), b"").expect("write");
        let error = loader.load_level("raw", "Raw").err().expect("corrupt");
        assert!(matches!(
            error,
            LevelLoadError::Decompress { .. } | LevelLoadError::Buffer { .. }
        ));
    }
}
