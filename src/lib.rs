// A Mega Drive / Genesis emulator core: a table-driven 68000 interpreter,
// the VDP with its command-port protocol and tile renderer, the memory bus
// router, controllers, and the frame loop that ties them together.
//
// The frame loop owns the entire machine. Time comes from exactly one
// place: every `INSTS_PER_FRAME` executed instructions a vertical-blank
// tick fires, delivering the interrupt and handing the rendered frame to
// the display back-end.

pub mod bus;
pub mod controller;
pub mod disasm;
pub mod display;
pub mod error;
pub mod events;
pub mod fields;
pub mod instruction;
pub mod memory;
pub mod opcodes;
pub mod processor;
pub mod render;
pub mod rom;
pub mod vdp;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, trace};

use crate::bus::{Bus, VBLANK_VECTOR};
use crate::display::{DisplayBackend, DisplayEvent};
use crate::error::{EmuError, EmuResult};
use crate::events::{EventReader, EventWriter, InputEventKind};
use crate::fields::Size;
use crate::processor::{Cpu, Effect};
use crate::rom::RomImage;

/// The vertical-blank cadence: one tick per this many executed
/// instructions.
pub const INSTS_PER_FRAME: u64 = 1_000_000 / 60;

const SAVE_INTERVAL: u64 = 1 << 23;
const FPS: f64 = 60.0;

pub struct Options {
    pub max_frames: Option<u64>,
    pub max_instructions: Option<u64>,
    pub speed: f64,
    pub save_state: Option<PathBuf>,
    pub load_state: Option<PathBuf>,
    pub read_events: Option<PathBuf>,
    pub write_events: Option<PathBuf>,
    pub exit_after_playback: bool,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            max_frames: None,
            max_instructions: None,
            speed: 1.0,
            save_state: None,
            load_state: None,
            read_events: None,
            write_events: None,
            exit_after_playback: false,
        }
    }
}

/// Paces rendered frames against the wall clock.
struct FramePacer {
    next: Instant,
}

impl FramePacer {
    fn new() -> FramePacer {
        FramePacer { next: Instant::now() }
    }

    fn wait(&mut self, speed: f64) {
        let frame = Duration::from_secs_f64(1.0 / (FPS * speed));
        let now = Instant::now();
        if self.next > now {
            thread::sleep(self.next - now);
        }
        let base = if self.next > now { self.next } else { now };
        self.next = base + frame;
    }
}

pub struct Emulator {
    cpu: Cpu,
    display: Option<Box<dyn DisplayBackend>>,
    opts: Options,
    interrupting: bool,
    instruction_count: u64,
    frame_count: u64,
    recorder: Option<EventWriter>,
    player: Option<EventReader>,
    pacer: FramePacer,
    speed: f64,
}

impl Emulator {
    pub fn new(
        rom: RomImage,
        display: Option<Box<dyn DisplayBackend>>,
        opts: Options,
    ) -> EmuResult<Emulator> {
        let bus = Bus::new(rom.into_memory());
        let cpu = Cpu::new(bus)?;
        let recorder = match &opts.write_events {
            Some(path) => Some(EventWriter::create(path)?),
            None => None,
        };
        let player = match &opts.read_events {
            Some(path) => Some(EventReader::open(path)?),
            None => None,
        };
        let speed = opts.speed;
        let mut em = Emulator {
            cpu,
            display,
            opts,
            interrupting: false,
            instruction_count: 0,
            frame_count: 0,
            recorder,
            player,
            pacer: FramePacer::new(),
            speed,
        };
        if let Some(path) = em.opts.load_state.clone() {
            em.load_state(&path)?;
            info!("loaded state from {}", path.display());
        }
        Ok(em)
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    /// Runs until a limit is reached, the display asks to quit, or a fatal
    /// error surfaces. An exit request unwinds cleanly, flushing state.
    pub fn run(&mut self) -> EmuResult<()> {
        match self.run_inner() {
            Ok(()) => self.flush_on_exit(),
            Err(e) => {
                if e.is_exit_request() {
                    info!("{}", e);
                    self.flush_on_exit()
                } else {
                    Err(e)
                }
            }
        }
    }

    fn run_inner(&mut self) -> EmuResult<()> {
        loop {
            if let Some(max) = self.opts.max_instructions {
                if self.instruction_count >= max {
                    info!("maximum instructions reached");
                    return Ok(());
                }
            }
            self.instruction_count += 1;
            if self.opts.save_state.is_some() && self.instruction_count % SAVE_INTERVAL == 1 {
                if let Some(path) = self.opts.save_state.clone() {
                    self.save_state(&path)?;
                }
            }
            if self.cpu.step()? == Effect::Rte {
                self.interrupting = false;
                self.frame_tick()?;
            }
            if self.instruction_count % INSTS_PER_FRAME == 0 {
                self.deliver_vblank()?;
                self.frame_tick()?;
            }
        }
    }

    /// Pushes PC and SR and vectors into the handler, unless the interrupt
    /// is masked, disabled, or already being serviced.
    fn deliver_vblank(&mut self) -> EmuResult<()> {
        if self.cpu.bus.vdp.vblank_enabled()
            && self.cpu.sr.int_priority_mask() <= 6
            && !self.interrupting
        {
            debug!("interrupt: vblank (sr {})", self.cpu.sr);
            let pc = self.cpu.pc as i32;
            self.cpu.push(Size::Long, pc)?;
            let sr = self.cpu.sr.to_word() as i32;
            self.cpu.push(Size::Word, sr)?;
            self.cpu.pc = self.cpu.bus.read_u32(VBLANK_VECTOR)?;
            self.interrupting = true;
        } else {
            trace!("vblank skipped");
        }
        Ok(())
    }

    /// Renders a frame, hands it to the display, and drains input. Invoked
    /// on the per-frame tick and again when the handler returns.
    fn frame_tick(&mut self) -> EmuResult<()> {
        if let Some(max) = self.opts.max_frames {
            if self.frame_count >= max {
                return Err(EmuError::ExitRequested("max frames reached"));
            }
        }
        self.frame_count += 1;
        self.handle_events()?;
        if self.display.is_some() {
            let frame = self.cpu.bus.vdp.render()?;
            if let Some(display) = self.display.as_mut() {
                display.update(&frame)?;
            }
            self.pacer.wait(self.speed);
        }
        Ok(())
    }

    fn handle_events(&mut self) -> EmuResult<()> {
        // host events stay live even during playback, so quit and speed
        // keys always work
        let mut control_events = Vec::new();
        if let Some(display) = self.display.as_mut() {
            for ev in display.poll_events()? {
                match ev {
                    DisplayEvent::Quit => {
                        return Err(EmuError::ExitRequested("display closed"))
                    }
                    DisplayEvent::AddSpeed(mult) => {
                        self.speed *= mult;
                        info!("speed: {}", self.speed);
                    }
                    DisplayEvent::ResetSpeed => {
                        if self.player.take().is_some() {
                            info!("playback cancelled");
                        }
                        self.speed = 1.0;
                    }
                    DisplayEvent::Key(ev) => control_events.push(ev),
                }
            }
        }
        let events = match self.player.as_mut() {
            Some(player) => match player.read_frame()? {
                Some(events) => events,
                None => {
                    if self.opts.exit_after_playback {
                        return Err(EmuError::ExitRequested("end of playback reached"));
                    }
                    info!("playback complete");
                    self.player = None;
                    control_events
                }
            },
            None => control_events,
        };
        for ev in &events {
            match ev.kind {
                InputEventKind::ControlKeyDown => self.cpu.bus.controllers.key_down(0, ev.key),
                InputEventKind::ControlKeyUp => self.cpu.bus.controllers.key_up(0, ev.key),
            }
        }
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.write_frame(&events)?;
        }
        Ok(())
    }

    fn flush_on_exit(&mut self) -> EmuResult<()> {
        if let Some(path) = self.opts.save_state.clone() {
            self.save_state(&path)?;
        }
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.flush()?;
        }
        Ok(())
    }

    /// Raw dumps in fixed order; the on-disk length is a constant of the
    /// emulator version and a short read on restore is fatal.
    pub fn save_state(&mut self, path: &Path) -> EmuResult<()> {
        info!("saving state to {}", path.display());
        let mut w = BufWriter::new(File::create(path)?);
        self.cpu.bus.ram.save_state(&mut w)?;
        self.cpu.bus.vdp.save_state(&mut w)?;
        for v in &self.cpu.regs.d {
            w.write_all(&(*v as u32).to_be_bytes())?;
        }
        for v in &self.cpu.regs.a {
            w.write_all(&(*v as u32).to_be_bytes())?;
        }
        w.write_all(&self.cpu.sr.to_word().to_be_bytes())?;
        w.write_all(&self.cpu.pc.to_be_bytes())?;
        w.write_all(&[self.interrupting as u8])?;
        w.flush()?;
        Ok(())
    }

    pub fn load_state(&mut self, path: &Path) -> EmuResult<()> {
        let mut r = BufReader::new(File::open(path)?);
        self.cpu.bus.ram.load_state(&mut r)?;
        self.cpu.bus.vdp.load_state(&mut r)?;
        for i in 0..8 {
            let mut buf = [0u8; 4];
            r.read_exact(&mut buf)?;
            self.cpu.regs.d[i] = u32::from_be_bytes(buf) as i32;
        }
        for i in 0..8 {
            let mut buf = [0u8; 4];
            r.read_exact(&mut buf)?;
            self.cpu.regs.a[i] = u32::from_be_bytes(buf) as i32;
        }
        let mut buf = [0u8; 2];
        r.read_exact(&mut buf)?;
        self.cpu.sr.set_from_word(u16::from_be_bytes(buf));
        let mut buf = [0u8; 4];
        r.read_exact(&mut buf)?;
        self.cpu.pc = u32::from_be_bytes(buf);
        let mut buf = [0u8; 1];
        r.read_exact(&mut buf)?;
        self.interrupting = buf[0] == 1;
        Ok(())
    }
}
