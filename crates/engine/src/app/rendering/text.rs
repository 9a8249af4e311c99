const GLYPH_WIDTH: i32 = 3;
const GLYPH_HEIGHT: usize = 5;
pub(crate) const TEXT_SCALE: i32 = 2;
pub(crate) const GLYPH_ADVANCE: i32 = (GLYPH_WIDTH + 1) * TEXT_SCALE;

type Rows = [u8; GLYPH_HEIGHT];

const BLANK: Rows = [0; GLYPH_HEIGHT];
const UNKNOWN: Rows = [0b111, 0b001, 0b011, 0b000, 0b010];

// Lowercase letters render with the uppercase glyphs.
const LETTERS: [Rows; 26] = [
    [0b010, 0b101, 0b111, 0b101, 0b101],
    [0b110, 0b101, 0b110, 0b101, 0b110],
    [0b111, 0b100, 0b100, 0b100, 0b111],
    [0b110, 0b101, 0b101, 0b101, 0b110],
    [0b111, 0b100, 0b110, 0b100, 0b111],
    [0b111, 0b100, 0b110, 0b100, 0b100],
    [0b111, 0b100, 0b101, 0b101, 0b111],
    [0b101, 0b101, 0b111, 0b101, 0b101],
    [0b111, 0b010, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b001, 0b101, 0b111],
    [0b101, 0b101, 0b110, 0b101, 0b101],
    [0b100, 0b100, 0b100, 0b100, 0b111],
    [0b101, 0b111, 0b111, 0b101, 0b101],
    [0b101, 0b111, 0b111, 0b111, 0b101],
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b110, 0b101, 0b110, 0b100, 0b100],
    [0b111, 0b101, 0b101, 0b111, 0b001],
    [0b110, 0b101, 0b110, 0b101, 0b101],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b010, 0b010, 0b010, 0b010],
    [0b101, 0b101, 0b101, 0b101, 0b111],
    [0b101, 0b101, 0b101, 0b101, 0b010],
    [0b101, 0b101, 0b111, 0b111, 0b101],
    [0b101, 0b101, 0b010, 0b101, 0b101],
    [0b101, 0b101, 0b010, 0b010, 0b010],
    [0b111, 0b001, 0b010, 0b100, 0b111],
];

const DIGITS: [Rows; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b010, 0b010, 0b010],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

fn glyph_rows(ch: char) -> Rows {
    match ch {
        ' ' => BLANK,
        'a'..='z' | 'A'..='Z' => {
            LETTERS[(ch.to_ascii_uppercase() as u8 - b'A') as usize]
        }
        '0'..='9' => DIGITS[(ch as u8 - b'0') as usize],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '\'' => [0b010, 0b010, 0b000, 0b000, 0b000],
        '|' => [0b010, 0b010, 0b010, 0b010, 0b010],
        _ => UNKNOWN,
    }
}

pub(crate) fn text_width_px(text: &str) -> i32 {
    text.chars().count() as i32 * GLYPH_ADVANCE
}

pub(crate) fn draw_text_clipped(
    frame: &mut [u8],
    width: u32,
    height: u32,
    mut x: i32,
    y: i32,
    text: &str,
    color: [u8; 4],
) {
    if width == 0 || height == 0 {
        return;
    }
    for ch in text.chars() {
        draw_glyph_clipped(frame, width, height, x, y, glyph_rows(ch), color);
        x += GLYPH_ADVANCE;
    }
}

fn draw_glyph_clipped(
    frame: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    rows: Rows,
    color: [u8; 4],
) {
    for (row_index, bits) in rows.iter().enumerate() {
        let glyph_y = y + row_index as i32 * TEXT_SCALE;
        for col in 0..GLYPH_WIDTH {
            if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                continue;
            }
            let glyph_x = x + col * TEXT_SCALE;
            for sy in 0..TEXT_SCALE {
                for sx in 0..TEXT_SCALE {
                    let (px, py) = (glyph_x + sx, glyph_y + sy);
                    if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                        continue;
                    }
                    let offset = (py as usize * width as usize + px as usize) * 4;
                    if let Some(pixel) = frame.get_mut(offset..offset + 4) {
                        pixel.copy_from_slice(&color);
                    }
                }
            }
        }
    }
}
