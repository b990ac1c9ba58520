// The gamepad data port is bit-multiplexed: the program strobes bit 6 of the
// data-out byte and reads back one of two key groups, with the strobe bit
// echoed so the two halves can be told apart. Keys read as 0 when pressed.

use crate::error::{EmuError, EmuResult};
use crate::events::ControlKey;
use crate::fields::Size;

pub const CONTROLLER1_DATA1: u32 = 0xa10002;
pub const CONTROLLER1_DATA2: u32 = 0xa10003;
pub const CONTROLLER2_DATA1: u32 = 0xa10004;
pub const CONTROLLER2_DATA2: u32 = 0xa10005;
pub const CONTROLLER1_CTRL1: u32 = 0xa10008;
pub const CONTROLLER1_CTRL2: u32 = 0xa10009;
pub const CONTROLLER2_CTRL1: u32 = 0xa1000a;
pub const CONTROLLER2_CTRL2: u32 = 0xa1000b;
pub const EXPANSION_PORT_CTRL: u32 = 0xa1000c;

#[derive(Default)]
struct Pad {
    ctrl: [u8; 2],
    data: [u8; 2],
    pressed: [bool; 8],
}

impl Pad {
    fn key_bit(&self, key: ControlKey) -> u8 {
        if self.pressed[key.index()] {
            0
        } else {
            1
        }
    }

    fn make_data(&self, select: u8) -> u8 {
        let mut ret = select << 6;
        match select {
            0 => {
                ret |= self.key_bit(ControlKey::Up);
                ret |= self.key_bit(ControlKey::Down) << 1;
                ret |= self.key_bit(ControlKey::A) << 4;
                ret |= self.key_bit(ControlKey::Start) << 5;
            }
            _ => {
                ret |= self.key_bit(ControlKey::Up);
                ret |= self.key_bit(ControlKey::Down) << 1;
                ret |= self.key_bit(ControlKey::Left) << 2;
                ret |= self.key_bit(ControlKey::Right) << 3;
                ret |= self.key_bit(ControlKey::B) << 4;
                ret |= self.key_bit(ControlKey::C) << 5;
            }
        }
        ret
    }

    fn write_data(&mut self, v: u8) {
        self.data[1] = self.make_data((v >> 6) & 1);
    }
}

/// Both pads behind the 0xa10002..0xa10020 window.
#[derive(Default)]
pub struct Controllers {
    pads: [Pad; 2],
}

impl Controllers {
    pub fn new() -> Controllers {
        Controllers::default()
    }

    pub fn key_down(&mut self, pad: usize, key: ControlKey) {
        self.pads[pad].pressed[key.index()] = true;
    }

    pub fn key_up(&mut self, pad: usize, key: ControlKey) {
        self.pads[pad].pressed[key.index()] = false;
    }

    fn read_u8(&self, addr: u32) -> EmuResult<u8> {
        Ok(match addr {
            CONTROLLER1_DATA1 => self.pads[0].data[0],
            CONTROLLER1_DATA2 => self.pads[0].data[1],
            CONTROLLER2_DATA1 => self.pads[1].data[0],
            CONTROLLER2_DATA2 => self.pads[1].data[1],
            CONTROLLER1_CTRL1 => self.pads[0].ctrl[0],
            CONTROLLER1_CTRL2 => self.pads[0].ctrl[1],
            CONTROLLER2_CTRL1 => self.pads[1].ctrl[0],
            CONTROLLER2_CTRL2 => self.pads[1].ctrl[1],
            _ => {
                return Err(EmuError::Bus(format!(
                    "controller address not supported for byte read: {:x}",
                    addr
                )))
            }
        })
    }

    fn read_u16(&self, addr: u32) -> EmuResult<u16> {
        if addr == EXPANSION_PORT_CTRL {
            // only a modem would answer here
            return Ok(0);
        }
        Ok(((self.read_u8(addr)? as u16) << 8) | self.read_u8(addr + 1)? as u16)
    }

    pub fn read(&self, size: Size, addr: u32) -> EmuResult<u32> {
        match size {
            Size::Byte => Ok(self.read_u8(addr)? as u32),
            Size::Word => Ok(self.read_u16(addr)? as u32),
            Size::Long => {
                Ok(((self.read_u16(addr)? as u32) << 16) | self.read_u16(addr + 2)? as u32)
            }
        }
    }

    pub fn write(&mut self, size: Size, addr: u32, v: u32) -> EmuResult<()> {
        if size != Size::Byte {
            return Err(EmuError::Bus(format!(
                "controller address not supported for {} write: {:x}",
                size, addr
            )));
        }
        let v = v as u8;
        match addr {
            CONTROLLER1_CTRL1 => self.pads[0].ctrl[0] = v,
            CONTROLLER1_CTRL2 => self.pads[0].ctrl[1] = v,
            CONTROLLER2_CTRL1 => self.pads[1].ctrl[0] = v,
            CONTROLLER2_CTRL2 => self.pads[1].ctrl[1] = v,
            CONTROLLER1_DATA1 => self.pads[0].write_data(v),
            CONTROLLER1_DATA2 => self.pads[0].write_data(v),
            CONTROLLER2_DATA1 => self.pads[1].write_data(v),
            CONTROLLER2_DATA2 => self.pads[1].write_data(v),
            _ => {
                return Err(EmuError::Bus(format!(
                    "controller address not supported for byte write: {:x}",
                    addr
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_bit_picks_the_key_group() {
        let mut c = Controllers::new();
        c.key_down(0, ControlKey::Start);
        c.key_down(0, ControlKey::Left);

        c.write(Size::Byte, CONTROLLER1_DATA2, 0x00).unwrap();
        let v = c.read(Size::Byte, CONTROLLER1_DATA2).unwrap();
        // select echo clear, Start pressed (0), Up/Down/A released (1)
        assert_eq!(v, 0b0001_0011);

        c.write(Size::Byte, CONTROLLER1_DATA2, 0x40).unwrap();
        let v = c.read(Size::Byte, CONTROLLER1_DATA2).unwrap();
        // select echo set, Left pressed, Up/Down/Right/B/C released
        assert_eq!(v, 0b0111_1011);
    }

    #[test]
    fn unknown_controller_address_is_fatal() {
        let c = Controllers::new();
        assert!(c.read(Size::Byte, 0xa10006).is_err());
    }
}
