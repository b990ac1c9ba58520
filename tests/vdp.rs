use emgen::bus::{Bus, RAM_BEGIN};
use emgen::fields::Size;
use emgen::memory::Memory;
use emgen::vdp::{VDP_CTRL1, VDP_DATA1};

fn bus() -> Bus {
    Bus::new(Memory::new(0x1000))
}

fn ctrl_word(bus: &mut Bus, v: u16) {
    bus.write(Size::Word, VDP_CTRL1, v as u32).unwrap();
}

fn data_word(bus: &mut Bus, v: u16) {
    bus.write(Size::Word, VDP_DATA1, v as u32).unwrap();
}

fn read_data(bus: &mut Bus) -> u16 {
    bus.read(Size::Word, VDP_DATA1).unwrap() as u16
}

/// Arms a read transfer from VRAM address 0 with a stride of 2.
fn arm_vram_read(bus: &mut Bus, addr: u16) {
    ctrl_word(bus, 0x8f02);
    ctrl_word(bus, addr);
    ctrl_word(bus, 0x0000);
}

#[test]
fn word_command_sets_a_register() {
    let mut bus = bus();
    ctrl_word(&mut bus, 0x8104);
    assert_eq!(bus.vdp.regs().at(1), 0x04);
    assert!(bus.vdp.regs().vblank_enabled() == false);
    ctrl_word(&mut bus, 0x8124);
    assert!(bus.vdp.regs().vblank_enabled());
}

#[test]
fn status_read_reports_fifo_empty_and_vblank() {
    let mut bus = bus();
    let status = bus.read(Size::Word, VDP_CTRL1).unwrap();
    assert_ne!(status & (1 << 9), 0, "fifo empty");
    assert_ne!(status & (1 << 3), 0, "vblank in progress");
}

#[test]
fn register_index_out_of_range_is_fatal() {
    let mut bus = bus();
    // top three bits say register write, but index 31 does not exist
    assert!(bus.write(Size::Word, VDP_CTRL1, 0x9f00).is_err());
}

#[test]
fn two_word_writes_form_a_long_command() {
    let mut bus = bus();
    ctrl_word(&mut bus, 0x8f02);
    // VRAM write to address 0, latched across two word writes
    ctrl_word(&mut bus, 0x4000);
    ctrl_word(&mut bus, 0x0000);
    data_word(&mut bus, 0x1234);
    data_word(&mut bus, 0x5678);

    arm_vram_read(&mut bus, 0x0000);
    assert_eq!(read_data(&mut bus), 0x1234);
    assert_eq!(read_data(&mut bus), 0x5678);
}

#[test]
fn word_command_resets_a_pending_latch() {
    let mut bus = bus();
    // a latched high word followed by a register write must not combine
    ctrl_word(&mut bus, 0x4000);
    ctrl_word(&mut bus, 0x8f02);
    assert_eq!(bus.vdp.regs().at(0xf), 2);
    // the port is idle again: a fresh pair arms a transfer
    ctrl_word(&mut bus, 0x4000);
    ctrl_word(&mut bus, 0x0000);
    data_word(&mut bus, 0xaaaa);
}

#[test]
fn long_write_that_is_not_a_command_sets_two_registers() {
    let mut bus = bus();
    bus.write(Size::Long, VDP_CTRL1, 0x8104_8f02).unwrap();
    assert_eq!(bus.vdp.regs().at(1), 0x04);
    assert_eq!(bus.vdp.regs().at(0xf), 2);
}

#[test]
fn data_port_without_transfer_is_fatal() {
    let mut bus = bus();
    assert!(bus.write(Size::Word, VDP_DATA1, 0x1234).is_err());
    assert!(bus.read(Size::Word, VDP_DATA1).is_err());
}

#[test]
fn invalid_transfer_mode_is_fatal() {
    let mut bus = bus();
    // mode code 2 names no target
    assert!(bus.write(Size::Long, VDP_CTRL1, 0x8000_0000).is_err());
}

#[test]
fn byte_access_to_the_vdp_is_fatal() {
    let mut bus = bus();
    assert!(bus.read(Size::Byte, VDP_CTRL1).is_err());
    assert!(bus.write(Size::Byte, VDP_DATA1, 0).is_err());
}

#[test]
fn dma_fill_repeats_the_word() {
    let mut bus = bus();
    // length 8 bytes, fill mode
    ctrl_word(&mut bus, 0x9304);
    ctrl_word(&mut bus, 0x9400);
    ctrl_word(&mut bus, 0x9780);
    bus.write(Size::Long, VDP_CTRL1, 0x4000_0080).unwrap();
    // the fill word arrives through the data port
    data_word(&mut bus, 0xbeef);

    arm_vram_read(&mut bus, 0x0000);
    for _ in 0..4 {
        assert_eq!(read_data(&mut bus), 0xbeef);
    }
}

#[test]
fn dma_copy_pulls_from_the_bus() {
    let mut bus = bus();
    let src = RAM_BEGIN + 0x100;
    bus.write(Size::Long, src, 0x1122_3344).unwrap();
    bus.write(Size::Long, src + 4, 0x5566_7788).unwrap();

    // source address registers hold src/2; length 8 bytes
    ctrl_word(&mut bus, 0x9580);
    ctrl_word(&mut bus, 0x9680);
    ctrl_word(&mut bus, 0x977f);
    ctrl_word(&mut bus, 0x9304);
    ctrl_word(&mut bus, 0x9400);
    // DMA write to VRAM address 0x40
    bus.write(Size::Long, VDP_CTRL1, 0x4040_0080).unwrap();

    arm_vram_read(&mut bus, 0x0040);
    assert_eq!(read_data(&mut bus), 0x1122);
    assert_eq!(read_data(&mut bus), 0x3344);
    assert_eq!(read_data(&mut bus), 0x5566);
    assert_eq!(read_data(&mut bus), 0x7788);
}

#[test]
fn data_port_write_honors_the_stride() {
    let mut bus = bus();
    // stride 4: every write lands one word apart
    ctrl_word(&mut bus, 0x8f04);
    ctrl_word(&mut bus, 0x4000);
    ctrl_word(&mut bus, 0x0000);
    data_word(&mut bus, 0x1111);
    data_word(&mut bus, 0x2222);

    ctrl_word(&mut bus, 0x8f02);
    arm_vram_read(&mut bus, 0x0000);
    assert_eq!(read_data(&mut bus), 0x1111);
    assert_eq!(read_data(&mut bus), 0x0000);
    assert_eq!(read_data(&mut bus), 0x2222);
}
