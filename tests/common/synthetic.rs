//! Deterministic synthetic screenshots for scenario tests.
use gamelens_lib::perception::types::Rect;
use gamelens_lib::PixelBuffer;

/// Integer hash giving stable per-pixel noise.
fn hash(x: u32, y: u32) -> u32 {
    let mut h = x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA77);
    h ^= h >> 15;
    h = h.wrapping_mul(0x2C1B_3C6D);
    h ^= h >> 12;
    h = h.wrapping_mul(0x297A_2D39);
    h ^ (h >> 15)
}

fn inside(r: &Rect, x: u32, y: u32) -> bool {
    x >= r.x && x < r.right() && y >= r.y && y < r.bottom()
}

/// 400×200 colour noise with a solid blue 60×24 button.
pub const FLAT_BUTTON: Rect = Rect { x: 170, y: 88, w: 60, h: 24 };

pub fn flat_button_on_noise() -> PixelBuffer {
    PixelBuffer::from_fn(400, 200, |x, y| {
        if inside(&FLAT_BUTTON, x, y) {
            [30, 60, 210]
        } else {
            let h = hash(x, y);
            [h as u8, (h >> 8) as u8, (h >> 16) as u8]
        }
    })
    .expect("valid buffer")
}

/// 400×200 dark background, 300×100 panel, two 80×30 buttons 10 px apart.
pub const PANEL: Rect = Rect { x: 50, y: 50, w: 300, h: 100 };
pub const PANEL_BUTTONS: [Rect; 2] = [
    Rect { x: 115, y: 85, w: 80, h: 30 },
    Rect { x: 205, y: 85, w: 80, h: 30 },
];

pub fn panel_with_two_buttons() -> PixelBuffer {
    PixelBuffer::from_fn(400, 200, |x, y| {
        if PANEL_BUTTONS.iter().any(|b| inside(b, x, y)) {
            [230, 180, 40]
        } else if inside(&PANEL, x, y) {
            [90, 90, 140]
        } else {
            [30, 30, 30]
        }
    })
    .expect("valid buffer")
}

/// 200×150 checker of two close grays (10 px tiles) with one magenta sprite.
pub const SPRITE: Rect = Rect { x: 90, y: 65, w: 20, h: 20 };

pub fn sprite_on_tiles() -> PixelBuffer {
    PixelBuffer::from_fn(200, 150, |x, y| {
        if inside(&SPRITE, x, y) {
            [220, 40, 200]
        } else if (x / 10 + y / 10) % 2 == 0 {
            [120, 120, 120]
        } else {
            [135, 135, 135]
        }
    })
    .expect("valid buffer")
}

pub fn uniform(width: u32, height: u32, rgb: [u8; 3]) -> PixelBuffer {
    PixelBuffer::from_fn(width, height, |_, _| rgb).expect("valid buffer")
}
