mod renderer;
mod text;

pub use renderer::Renderer;

use crate::app::Vec2;
use crate::world::Tile;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

/// Drawing target handed to scenes. Positions are top-left corners in window pixels.
pub trait Surface {
    fn size(&self) -> (u32, u32);
    fn clear(&mut self, color: Rgb);
    fn draw_tile(&mut self, tile: Tile, at: Vec2, size_px: u32);
    /// `frame` indexes the sheet row-major, one row per direction.
    fn draw_sprite(&mut self, sheet: &str, frame: u32, at: Vec2, size_px: u32);
    fn draw_label(&mut self, text: &str, at: Vec2);
    /// Blends the whole surface toward black; 0 leaves it untouched.
    fn fade(&mut self, alpha: u8);
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum DrawCall {
        Clear(Rgb),
        Tile { tile: Tile, at: Vec2, size: u32 },
        Sprite {
            sheet: String,
            frame: u32,
            at: Vec2,
            size: u32,
        },
        Label { text: String, at: Vec2 },
        Fade(u8),
    }

    pub(crate) struct RecordingSurface {
        width: u32,
        height: u32,
        calls: Vec<DrawCall>,
    }

    impl RecordingSurface {
        pub(crate) fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                calls: Vec::new(),
            }
        }

        pub(crate) fn calls(&self) -> &[DrawCall] {
            &self.calls
        }

        pub(crate) fn tile_count(&self) -> usize {
            self.calls
                .iter()
                .filter(|call| matches!(call, DrawCall::Tile { .. }))
                .count()
        }

        pub(crate) fn sprite_count(&self) -> usize {
            self.calls
                .iter()
                .filter(|call| matches!(call, DrawCall::Sprite { .. }))
                .count()
        }

        pub(crate) fn last_fade(&self) -> Option<u8> {
            self.calls.iter().rev().find_map(|call| match call {
                DrawCall::Fade(alpha) => Some(*alpha),
                _ => None,
            })
        }
    }

    impl Surface for RecordingSurface {
        fn size(&self) -> (u32, u32) {
            (self.width, self.height)
        }

        fn clear(&mut self, color: Rgb) {
            self.calls.push(DrawCall::Clear(color));
        }

        fn draw_tile(&mut self, tile: Tile, at: Vec2, size_px: u32) {
            self.calls.push(DrawCall::Tile {
                tile,
                at,
                size: size_px,
            });
        }

        fn draw_sprite(&mut self, sheet: &str, frame: u32, at: Vec2, size_px: u32) {
            self.calls.push(DrawCall::Sprite {
                sheet: sheet.to_string(),
                frame,
                at,
                size: size_px,
            });
        }

        fn draw_label(&mut self, text: &str, at: Vec2) {
            self.calls.push(DrawCall::Label {
                text: text.to_string(),
                at,
            });
        }

        fn fade(&mut self, alpha: u8) {
            self.calls.push(DrawCall::Fade(alpha));
        }
    }
}
