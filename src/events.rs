// Controller keys, input events, and the record/replay file format: one
// length-prefixed chunk per frame, each holding that frame's event list.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use serde_derive::{Deserialize, Serialize};

use crate::error::{EmuError, EmuResult};

/// The eight keys of a stock three-button pad.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlKey {
    Start,
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    C,
}

impl ControlKey {
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ControlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEventKind {
    ControlKeyDown,
    ControlKeyUp,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    pub kind: InputEventKind,
    pub key: ControlKey,
}

impl fmt::Display for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            InputEventKind::ControlKeyDown => write!(f, "KeyDown:{}", self.key),
            InputEventKind::ControlKeyUp => write!(f, "KeyUp:{}", self.key),
        }
    }
}

fn encode_err(err: bincode::Error) -> EmuError {
    EmuError::Io(std::io::Error::new(ErrorKind::InvalidData, err))
}

/// Records one chunk per frame, even when the frame had no events, so
/// playback stays frame-aligned.
pub struct EventWriter {
    out: BufWriter<File>,
}

impl EventWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> EmuResult<EventWriter> {
        Ok(EventWriter { out: BufWriter::new(File::create(path)?) })
    }

    pub fn write_frame(&mut self, events: &[InputEvent]) -> EmuResult<()> {
        let chunk = bincode::serialize(&events.to_vec()).map_err(encode_err)?;
        self.out.write_all(&(chunk.len() as u32).to_le_bytes())?;
        self.out.write_all(&chunk)?;
        Ok(())
    }

    pub fn flush(&mut self) -> EmuResult<()> {
        self.out.flush()?;
        Ok(())
    }
}

pub struct EventReader {
    input: BufReader<File>,
}

impl EventReader {
    pub fn open<P: AsRef<Path>>(path: P) -> EmuResult<EventReader> {
        Ok(EventReader { input: BufReader::new(File::open(path)?) })
    }

    /// The next frame's events, or `None` at a clean end of file. A short
    /// read inside a chunk is fatal.
    pub fn read_frame(&mut self) -> EmuResult<Option<Vec<InputEvent>>> {
        let mut len = [0u8; 4];
        match self.input.read_exact(&mut len) {
            Ok(()) => {}
            Err(ref e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(EmuError::Io(e)),
        }
        let mut chunk = vec![0u8; u32::from_le_bytes(len) as usize];
        self.input.read_exact(&mut chunk)?;
        let events: Vec<InputEvent> = bincode::deserialize(&chunk).map_err(encode_err)?;
        Ok(Some(events))
    }
}
