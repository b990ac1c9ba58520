// The tile compositor. Each frame is composed in two passes, low priority
// then high, and within a pass: background plane, foreground plane, sprites,
// window. Later pixels overwrite earlier ones, so the high layer overlays
// the low layer and the window overlays everything in its pass.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use log::trace;

use crate::error::{EmuError, EmuResult};
use crate::vdp::{HScrollKind, Plane, VScrollKind, Vdp};

pub const SCREEN_WIDTH: i32 = 320;
pub const SCREEN_HEIGHT: i32 = 224;

const TILE_SIZE: i32 = 8;
const MAX_SPRITES: usize = 80;

/// A plain RGB image, row-major, three bytes per pixel.
pub struct Frame {
    width: i32,
    height: i32,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(height: i32, width: i32) -> Frame {
        Frame { width, height, data: vec![0; (width * height * 3) as usize] }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn set_pixel(&mut self, y: i32, x: i32, r: u8, g: u8, b: u8) {
        let idx = ((y * self.width + x) * 3) as usize;
        self.data[idx] = r;
        self.data[idx + 1] = g;
        self.data[idx + 2] = b;
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn save_pnm<P: AsRef<Path>>(&self, path: P) -> EmuResult<()> {
        let mut file = File::create(path)?;
        write!(file, "P6\n{} {}\n255\n", self.width, self.height)?;
        file.write_all(&self.data)?;
        Ok(())
    }
}

// Plane coordinates wrap, so the divisions have to round towards negative
// infinity rather than towards zero.
fn floor_mod(a: i32, b: i32) -> i32 {
    ((a % b) + b) % b
}

fn floor_div(a: i32, b: i32) -> i32 {
    (a - floor_mod(a, b)) / b
}

fn bits(v: u32, offset: u32, num: u32) -> u32 {
    (v >> offset) & ((1 << num) - 1)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Priority {
    Low,
    High,
}

impl Priority {
    fn of_bit(bit: u32) -> Priority {
        if bit == 0 {
            Priority::Low
        } else {
            Priority::High
        }
    }
}

/// One entry of the sprite attribute table: four words.
#[derive(Debug, Copy, Clone)]
struct Sprite {
    y: i32,
    x: i32,
    height: i32,
    width: i32,
    priority: Priority,
    palette: u32,
    yflip: bool,
    xflip: bool,
    tiles_addr: u32,
    next: u32,
}

impl Sprite {
    fn new(w1: u16, w2: u16, w3: u16, w4: u16) -> Sprite {
        let (w1, w2, w3, w4) = (w1 as u32, w2 as u32, w3 as u32, w4 as u32);
        Sprite {
            y: bits(w1, 0, 9) as i32,
            x: bits(w4, 0, 9) as i32,
            height: bits(w2, 8, 2) as i32 + 1,
            width: bits(w2, 10, 2) as i32 + 1,
            priority: Priority::of_bit(bits(w3, 15, 1)),
            palette: bits(w3, 13, 2),
            yflip: bits(w3, 12, 1) == 1,
            xflip: bits(w3, 11, 1) == 1,
            tiles_addr: bits(w3, 0, 11) * 0x20,
            next: bits(w2, 0, 7),
        }
    }
}

/// One word of a plane name table.
#[derive(Debug, Copy, Clone)]
struct PlaneCell {
    priority: Priority,
    palette: u32,
    yflip: bool,
    xflip: bool,
    tile_addr: u32,
}

impl PlaneCell {
    fn new(w: u16) -> PlaneCell {
        let w = w as u32;
        PlaneCell {
            priority: Priority::of_bit(bits(w, 15, 1)),
            palette: bits(w, 13, 2),
            yflip: bits(w, 12, 1) == 1,
            xflip: bits(w, 11, 1) == 1,
            tile_addr: bits(w, 0, 11) * 0x20,
        }
    }
}

impl Vdp {
    fn vram_word(&self, word_idx: u32) -> EmuResult<u32> {
        match self.vram.get(word_idx as usize) {
            Some(w) => Ok(*w as u32),
            None => Err(EmuError::Vdp(format!("vram read out of range: word {:x}", word_idx))),
        }
    }

    fn cram_word(&self, word_idx: u32) -> EmuResult<u32> {
        match self.cram.get(word_idx as usize) {
            Some(w) => Ok(*w as u32),
            None => Err(EmuError::Vdp(format!("cram read out of range: word {:x}", word_idx))),
        }
    }

    pub fn render(&self) -> EmuResult<Frame> {
        let mut img = Frame::new(SCREEN_HEIGHT, SCREEN_WIDTH);
        for pri in &[Priority::Low, Priority::High] {
            self.render_plane(&mut img, Plane::Background, *pri)?;
            self.render_plane(&mut img, Plane::Foreground, *pri)?;
            self.render_sprites(&mut img, *pri)?;
            self.render_window(&mut img, *pri)?;
        }
        Ok(img)
    }

    /// 8x8 tile, 4 bits per pixel, two pixels per byte with the left pixel
    /// in the top nibble; color 0 is transparent.
    fn render_tile(
        &self,
        img: &mut Frame,
        tile_addr: u32,
        palette_idx: u32,
        y: i32,
        x: i32,
        yflip: bool,
        xflip: bool,
    ) -> EmuResult<()> {
        let paddr = palette_idx * 0x20;
        for dy in 0..TILE_SIZE {
            for dx in 0..TILE_SIZE {
                let px = if xflip { x - dx + 7 } else { x + dx };
                let py = if yflip { y - dy + 7 } else { y + dy };
                if px < 0 || px >= img.width() || py < 0 || py >= img.height() {
                    continue;
                }
                let nb_addr = tile_addr * 2 + (dy * TILE_SIZE + dx) as u32;
                let word = self.vram_word(nb_addr / 4)?;
                let color_idx = bits(word, (3 - (nb_addr % 4)) * 4, 4);
                if color_idx == 0 {
                    continue;
                }
                let color = self.cram_word((paddr + color_idx * 2) / 2)?;
                img.set_pixel(
                    py,
                    px,
                    (bits(color, 1, 3) * 36) as u8,
                    (bits(color, 5, 3) * 36) as u8,
                    (bits(color, 9, 3) * 36) as u8,
                );
            }
        }
        Ok(())
    }

    fn render_plane_cell(
        &self,
        img: &mut Frame,
        addr: u32,
        y: i32,
        x: i32,
        priority: Priority,
    ) -> EmuResult<()> {
        let cell = PlaneCell::new(self.vram_word(addr / 2)? as u16);
        if cell.priority != priority {
            return Ok(());
        }
        self.render_tile(img, cell.tile_addr, cell.palette, y, x, cell.yflip, cell.xflip)
    }

    /// Whole-screen scroll only; the strip and scanline modes are fatal.
    fn hscroll_amount(&self, plane: Plane) -> EmuResult<i32> {
        let mut addr = self.reg.hscroll_addr();
        match self.reg.hscroll_kind()? {
            HScrollKind::WholeScreen => match plane {
                Plane::Foreground => {}
                Plane::Background => addr += 2,
                Plane::Window => {
                    return Err(EmuError::Vdp(String::from("window plane does not scroll")))
                }
            },
            kind => {
                return Err(EmuError::Vdp(format!("unsupported hscroll kind: {:?}", kind)))
            }
        }
        Ok(bits(self.vram_word(addr / 2)?, 0, 10) as i32)
    }

    fn vscroll_amount(&self, plane: Plane) -> EmuResult<i32> {
        let addr = match self.reg.vscroll_kind()? {
            VScrollKind::WholeScreen => match plane {
                Plane::Foreground => 0usize,
                Plane::Background => 1,
                Plane::Window => {
                    return Err(EmuError::Vdp(String::from("window plane does not scroll")))
                }
            },
            kind => {
                return Err(EmuError::Vdp(format!("unsupported vscroll kind: {:?}", kind)))
            }
        };
        Ok(bits(self.vsram[addr] as u32, 0, 10) as i32)
    }

    fn render_plane(&self, img: &mut Frame, plane: Plane, priority: Priority) -> EmuResult<()> {
        let plane_addr = self.reg.plane_addr(plane);
        let height = self.reg.plane_height()? as i32;
        let width = self.reg.plane_width()? as i32;
        let scroll_x = self.hscroll_amount(plane)?;
        let scroll_y = self.vscroll_amount(plane)?;
        trace!(
            "VDP: render plane {} {}x{} at {:x} scroll {}x{}",
            plane, height, width, plane_addr, scroll_y, scroll_x
        );

        let mut y = 0;
        while y <= img.height() {
            let ay = floor_div(y + scroll_y, TILE_SIZE);
            let cy = floor_mod(ay, height);
            let ty = ay * TILE_SIZE - scroll_y;
            let mut x = 0;
            while x <= img.width() {
                let ax = floor_div(x - scroll_x, TILE_SIZE);
                let cx = floor_mod(ax, width);
                let tx = ax * TILE_SIZE + scroll_x;
                let cell_addr = plane_addr + ((cx + cy * width) * 2) as u32;
                self.render_plane_cell(img, cell_addr, ty, tx, priority)?;
                x += TILE_SIZE;
            }
            y += TILE_SIZE;
        }
        Ok(())
    }

    /// The window covers the full width; its vertical extent is the top or
    /// bottom band around the register 0x12 boundary.
    fn render_window(&self, img: &mut Frame, priority: Priority) -> EmuResult<()> {
        let addr = self.reg.plane_addr(Plane::Window);
        let width = self.reg.plane_width()? as i32;
        let (y0, y1) = if self.reg.window_bottom() {
            (self.reg.window_y() as i32, SCREEN_HEIGHT)
        } else {
            (0, self.reg.window_y() as i32)
        };
        let mut y = y0;
        while y < y1 {
            let line_addr = addr + (width * y / 4) as u32;
            let mut x = 0;
            while x < SCREEN_WIDTH {
                let cell_addr = line_addr + (x / 4) as u32;
                self.render_plane_cell(img, cell_addr, y, x, priority)?;
                x += TILE_SIZE;
            }
            y += TILE_SIZE;
        }
        Ok(())
    }

    /// Walks the sprite list from the table head, bounded so a malformed
    /// next-link cycle cannot loop forever.
    fn get_sprites(&self) -> EmuResult<Vec<Sprite>> {
        let table_addr = self.reg.sprite_table_addr();
        let mut sprites = Vec::new();
        let mut idx = 0u32;
        while sprites.len() < MAX_SPRITES {
            let sprite_addr = table_addr + idx * 8;
            let w1 = self.vram_word(sprite_addr / 2)? as u16;
            let w2 = self.vram_word((sprite_addr + 2) / 2)? as u16;
            let w3 = self.vram_word((sprite_addr + 4) / 2)? as u16;
            let w4 = self.vram_word((sprite_addr + 6) / 2)? as u16;
            let sprite = Sprite::new(w1, w2, w3, w4);
            idx = sprite.next;
            sprites.push(sprite);
            if idx == 0 {
                break;
            }
        }
        // the tail is drawn first so the head overlays it
        sprites.reverse();
        Ok(sprites)
    }

    fn render_sprites(&self, img: &mut Frame, priority: Priority) -> EmuResult<()> {
        let sprites = self.get_sprites()?;
        trace!("VDP: {} sprites", sprites.len());
        for sprite in &sprites {
            if sprite.priority != priority {
                continue;
            }
            self.render_sprite(img, sprite, sprite.y - 128, sprite.x - 128)?;
        }
        Ok(())
    }

    /// Tiles advance column by column from the base address, 32 bytes each.
    fn render_sprite(&self, img: &mut Frame, sprite: &Sprite, y: i32, x: i32) -> EmuResult<()> {
        let mut addr = sprite.tiles_addr;
        for cx in 0..sprite.width {
            let x0 = x + (if sprite.xflip { sprite.width - 1 - cx } else { cx }) * TILE_SIZE;
            for cy in 0..sprite.height {
                let y0 = y + (if sprite.yflip { sprite.height - 1 - cy } else { cy }) * TILE_SIZE;
                self.render_tile(img, addr, sprite.palette, y0, x0, sprite.yflip, sprite.xflip)?;
                addr += 32;
            }
        }
        Ok(())
    }
}
