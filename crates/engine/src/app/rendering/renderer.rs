use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageReader;
use pixels::{Error, Pixels, SurfaceTexture};
use tracing::warn;
use winit::window::Window;

use crate::app::Vec2;
use crate::world::Tile;

use super::text::{draw_text_clipped, text_width_px};
use super::{Rgb, Surface};

const TILE_FALLBACK_COLORS: [[u8; 4]; 4] = [
    [74, 112, 56, 255],
    [112, 83, 58, 255],
    [68, 74, 62, 255],
    [58, 70, 96, 255],
];
const SPRITE_PLACEHOLDER_COLOR: [u8; 4] = [220, 220, 240, 255];
const LABEL_COLOR: [u8; 4] = [244, 248, 252, 255];
const LABEL_SHADOW_COLOR: [u8; 4] = [10, 12, 16, 255];

const TILESETS_DIR: &str = "tilesets";
const SPRITES_DIR: &str = "sprites";

struct LoadedImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

/// Software renderer over a `pixels` frame buffer sized to the window.
pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    width: u32,
    height: u32,
    textures_dir: PathBuf,
    image_cache: HashMap<String, Option<LoadedImage>>,
    warned_missing_keys: HashSet<String>,
}

impl Renderer {
    /// `textures_dir` holds `tilesets/<id>.png` and `sprites/<sheet>.png`.
    pub fn new(window: Arc<Window>, textures_dir: PathBuf) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            width: size.width,
            height: size.height,
            textures_dir,
            image_cache: HashMap::new(),
            warned_missing_keys: HashSet::new(),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    pub fn present(&self) -> Result<(), Error> {
        self.pixels.render()
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    fn draw_cell(&mut self, key: &str, index: u32, at: Vec2, size_px: u32) -> bool {
        let (width, height) = (self.width, self.height);
        let Some(image) = resolve_cached_image(
            &mut self.image_cache,
            &mut self.warned_missing_keys,
            &self.textures_dir,
            key,
        ) else {
            return false;
        };
        blit_cell(
            self.pixels.frame_mut(),
            width,
            height,
            image,
            index,
            size_px,
            at.x.round() as i32,
            at.y.round() as i32,
        )
    }
}

impl Surface for Renderer {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self, color: Rgb) {
        let rgba = color.to_rgba();
        for pixel in self.pixels.frame_mut().chunks_exact_mut(4) {
            pixel.copy_from_slice(&rgba);
        }
    }

    fn draw_tile(&mut self, tile: Tile, at: Vec2, size_px: u32) {
        let key = format!("{TILESETS_DIR}/{}", tile.tileset_id);
        if !self.draw_cell(&key, u32::from(tile.tile_id), at, size_px) {
            let color = TILE_FALLBACK_COLORS[usize::from(tile.tile_id) % TILE_FALLBACK_COLORS.len()];
            let (width, height) = (self.width, self.height);
            fill_rect(self.pixels.frame_mut(), width, height, at, size_px, color);
        }
    }

    fn draw_sprite(&mut self, sheet: &str, frame: u32, at: Vec2, size_px: u32) {
        let key = format!("{SPRITES_DIR}/{sheet}");
        if !self.draw_cell(&key, frame, at, size_px) {
            let inset = size_px / 4;
            let (width, height) = (self.width, self.height);
            fill_rect(
                self.pixels.frame_mut(),
                width,
                height,
                Vec2::new(at.x + inset as f32, at.y + inset as f32),
                size_px.saturating_sub(inset * 2).max(1),
                SPRITE_PLACEHOLDER_COLOR,
            );
        }
    }

    fn draw_label(&mut self, text: &str, at: Vec2) {
        let (width, height) = (self.width, self.height);
        let (x, y) = (at.x.round() as i32, at.y.round() as i32);
        if x + text_width_px(text) < 0 || x >= width as i32 || y >= height as i32 {
            return;
        }
        let frame = self.pixels.frame_mut();
        draw_text_clipped(frame, width, height, x + 1, y + 1, text, LABEL_SHADOW_COLOR);
        draw_text_clipped(frame, width, height, x, y, text, LABEL_COLOR);
    }

    fn fade(&mut self, alpha: u8) {
        darken_frame(self.pixels.frame_mut(), alpha);
    }
}

fn resolve_cached_image<'a>(
    cache: &'a mut HashMap<String, Option<LoadedImage>>,
    warned_missing_keys: &mut HashSet<String>,
    textures_dir: &Path,
    key: &str,
) -> Option<&'a LoadedImage> {
    if !cache.contains_key(key) {
        let path = textures_dir.join(format!("{key}.png"));
        let image = match load_image_rgba(&path) {
            Ok(image) => Some(image),
            Err(reason) => {
                warn_image_load_once(warned_missing_keys, key, &path, &reason);
                None
            }
        };
        cache.insert(key.to_string(), image);
    }
    cache.get(key).and_then(Option::as_ref)
}

fn load_image_rgba(path: &Path) -> Result<LoadedImage, String> {
    let reader = ImageReader::open(path).map_err(|error| format!("file_open_failed:{error}"))?;
    let decoded = reader
        .decode()
        .map_err(|error| format!("decode_failed:{error}"))?;
    let image = decoded.to_rgba8();
    Ok(LoadedImage {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

fn warn_image_load_once(warned_keys: &mut HashSet<String>, key: &str, path: &Path, reason: &str) {
    if !warned_keys.insert(key.to_string()) {
        return;
    }
    warn!(
        texture_key = key,
        path = %path.display(),
        reason = reason,
        "renderer_texture_load_failed_using_placeholder"
    );
}

/// Top-left corner of cell `index` in a sheet of square `cell_px` cells laid out
/// row-major, or `None` when the cell lies outside the sheet.
fn cell_origin(image: &LoadedImage, index: u32, cell_px: u32) -> Option<(u32, u32)> {
    if cell_px == 0 || image.width < cell_px {
        return None;
    }
    let columns = image.width / cell_px;
    let x = (index % columns) * cell_px;
    let y = (index / columns).checked_mul(cell_px)?;
    if y.checked_add(cell_px)? > image.height {
        return None;
    }
    Some((x, y))
}

#[allow(clippy::too_many_arguments)]
fn blit_cell(
    frame: &mut [u8],
    width: u32,
    height: u32,
    image: &LoadedImage,
    index: u32,
    cell_px: u32,
    left: i32,
    top: i32,
) -> bool {
    let Some((src_x, src_y)) = cell_origin(image, index, cell_px) else {
        return false;
    };
    if image.rgba.len() < image.width as usize * image.height as usize * 4 {
        return false;
    }
    for dy in 0..cell_px {
        let out_y = top + dy as i32;
        if out_y < 0 || out_y >= height as i32 {
            continue;
        }
        let src_row = ((src_y + dy) * image.width) as usize;
        for dx in 0..cell_px {
            let out_x = left + dx as i32;
            if out_x < 0 || out_x >= width as i32 {
                continue;
            }
            let src = (src_row + (src_x + dx) as usize) * 4;
            let alpha = image.rgba[src + 3];
            if alpha == 0 {
                continue;
            }
            write_pixel_rgba_clipped(
                frame,
                width as usize,
                out_x,
                out_y,
                [image.rgba[src], image.rgba[src + 1], image.rgba[src + 2], alpha],
            );
        }
    }
    true
}

fn fill_rect(frame: &mut [u8], width: u32, height: u32, at: Vec2, size_px: u32, color: [u8; 4]) {
    let left = at.x.round() as i32;
    let top = at.y.round() as i32;
    for y in top.max(0)..(top + size_px as i32).min(height as i32) {
        for x in left.max(0)..(left + size_px as i32).min(width as i32) {
            write_pixel_rgba_clipped(frame, width as usize, x, y, color);
        }
    }
}

fn darken_frame(frame: &mut [u8], alpha: u8) {
    if alpha == 0 {
        return;
    }
    let keep = u16::from(255 - alpha);
    for pixel in frame.chunks_exact_mut(4) {
        for channel in &mut pixel[..3] {
            *channel = ((u16::from(*channel) * keep) / 255) as u8;
        }
    }
}

fn write_pixel_rgba_clipped(frame: &mut [u8], width: usize, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 {
        return;
    }
    let Some(pixel_offset) = (y as usize)
        .checked_mul(width)
        .and_then(|row| row.checked_add(x as usize))
    else {
        return;
    };
    let Some(byte_offset) = pixel_offset.checked_mul(4) else {
        return;
    };
    let Some(pixel) = frame.get_mut(byte_offset..byte_offset + 4) else {
        return;
    };
    pixel.copy_from_slice(&color);
}
