// Display back-ends. The core talks to a display through two synchronous
// operations: submit a frame, poll events. The interactive window maps host
// keys onto pad keys; the other backends are sinks for headless runs.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use minifb::{Key, Scale, Window, WindowOptions};

use crate::error::{EmuError, EmuResult};
use crate::events::{ControlKey, InputEvent, InputEventKind};
use crate::render::{Frame, SCREEN_HEIGHT, SCREEN_WIDTH};

pub enum DisplayEvent {
    Quit,
    Key(InputEvent),
    AddSpeed(f64),
    ResetSpeed,
}

pub trait DisplayBackend {
    fn update(&mut self, frame: &Frame) -> EmuResult<()>;
    fn poll_events(&mut self) -> EmuResult<Vec<DisplayEvent>>;
}

/// Picks a backend by name; `none` disables display output entirely.
pub fn create_display(name: &str) -> EmuResult<Option<Box<dyn DisplayBackend>>> {
    match name {
        "window" => Ok(Some(Box::new(WindowDisplay::new()?))),
        "pnm" => Ok(Some(Box::new(PnmDisplay::new()?))),
        "hash" => Ok(Some(Box::new(HashDisplay::new()))),
        "none" => Ok(None),
        _ => Err(EmuError::Exec(format!("unknown display option: {}", name))),
    }
}

fn window_err(e: minifb::Error) -> EmuError {
    EmuError::Io(std::io::Error::new(ErrorKind::Other, e.to_string()))
}

fn map_key(key: Key) -> Option<ControlKey> {
    match key {
        Key::W => Some(ControlKey::Up),
        Key::S => Some(ControlKey::Down),
        Key::A => Some(ControlKey::Left),
        Key::D => Some(ControlKey::Right),
        Key::J => Some(ControlKey::A),
        Key::K => Some(ControlKey::B),
        Key::L => Some(ControlKey::C),
        Key::Enter => Some(ControlKey::Start),
        _ => None,
    }
}

pub struct WindowDisplay {
    window: Window,
    buffer: Vec<u32>,
    held: Vec<Key>,
}

impl WindowDisplay {
    pub fn new() -> EmuResult<WindowDisplay> {
        let window = Window::new(
            "emgen",
            SCREEN_WIDTH as usize,
            SCREEN_HEIGHT as usize,
            WindowOptions { scale: Scale::X2, ..WindowOptions::default() },
        )
        .map_err(window_err)?;
        let buffer = vec![0; (SCREEN_WIDTH * SCREEN_HEIGHT) as usize];
        Ok(WindowDisplay { window, buffer, held: Vec::new() })
    }
}

impl DisplayBackend for WindowDisplay {
    fn update(&mut self, frame: &Frame) -> EmuResult<()> {
        let data = frame.data();
        for (i, px) in self.buffer.iter_mut().enumerate() {
            let o = i * 3;
            *px = ((data[o] as u32) << 16) | ((data[o + 1] as u32) << 8) | data[o + 2] as u32;
        }
        self.window
            .update_with_buffer(&self.buffer, SCREEN_WIDTH as usize, SCREEN_HEIGHT as usize)
            .map_err(window_err)
    }

    fn poll_events(&mut self) -> EmuResult<Vec<DisplayEvent>> {
        if !self.window.is_open() {
            return Ok(vec![DisplayEvent::Quit]);
        }
        let now = self.window.get_keys().unwrap_or_default();
        let mut events = Vec::new();
        for key in &now {
            if self.held.contains(key) {
                continue;
            }
            match key {
                Key::Escape => events.push(DisplayEvent::Quit),
                Key::Equal | Key::NumPadPlus => events.push(DisplayEvent::AddSpeed(1.125)),
                Key::Minus | Key::NumPadMinus => events.push(DisplayEvent::AddSpeed(1.0 / 1.125)),
                Key::Space => events.push(DisplayEvent::ResetSpeed),
                _ => {
                    if let Some(ck) = map_key(*key) {
                        events.push(DisplayEvent::Key(InputEvent {
                            kind: InputEventKind::ControlKeyDown,
                            key: ck,
                        }));
                    }
                }
            }
        }
        for key in &self.held {
            if now.contains(key) {
                continue;
            }
            if let Some(ck) = map_key(*key) {
                events.push(DisplayEvent::Key(InputEvent {
                    kind: InputEventKind::ControlKeyUp,
                    key: ck,
                }));
            }
        }
        self.held = now;
        Ok(events)
    }
}

/// Dumps every frame as a P6 file under `screenshots/`.
pub struct PnmDisplay {
    dir: PathBuf,
    counter: u64,
}

impl PnmDisplay {
    pub fn new() -> EmuResult<PnmDisplay> {
        let dir = PathBuf::from("screenshots");
        fs::create_dir_all(&dir)?;
        Ok(PnmDisplay { dir, counter: 0 })
    }
}

impl DisplayBackend for PnmDisplay {
    fn update(&mut self, frame: &Frame) -> EmuResult<()> {
        self.counter += 1;
        frame.save_pnm(self.dir.join(format!("screenshot_{:06}.pnm", self.counter)))
    }

    fn poll_events(&mut self) -> EmuResult<Vec<DisplayEvent>> {
        Ok(Vec::new())
    }
}

/// Prints one checksum line per frame; useful for comparing runs.
pub struct HashDisplay;

impl HashDisplay {
    pub fn new() -> HashDisplay {
        HashDisplay
    }
}

impl DisplayBackend for HashDisplay {
    fn update(&mut self, frame: &Frame) -> EmuResult<()> {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        for &b in frame.data() {
            h ^= b as u64;
            h = h.wrapping_mul(0x100_0000_01b3);
        }
        println!("{:016x}", h);
        Ok(())
    }

    fn poll_events(&mut self) -> EmuResult<Vec<DisplayEvent>> {
        Ok(Vec::new())
    }
}
