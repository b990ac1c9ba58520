use emgen::bus::Bus;
use emgen::events::{ControlKey, EventReader, EventWriter, InputEvent, InputEventKind};
use emgen::fields::Size;
use emgen::memory::Memory;
use emgen::processor::Cpu;
use emgen::rom::RomImage;
use emgen::{Emulator, Options, INSTS_PER_FRAME};

fn rom_with(segments: &[(usize, &[u16])]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x1000];
    for (base, words) in segments {
        for (i, w) in words.iter().enumerate() {
            rom[base + 2 * i] = (*w >> 8) as u8;
            rom[base + 2 * i + 1] = *w as u8;
        }
    }
    rom
}

fn cpu_with(segments: &[(usize, &[u16])]) -> Cpu {
    Cpu::new(Bus::new(Memory::with_content(rom_with(segments)))).unwrap()
}

#[test]
fn reset_and_rom_entry() {
    // 0x200: MOVE.L #0x01000000,A7; JMP 0x300
    // 0x300: NOP; RTS
    let mut cpu = cpu_with(&[
        (0x200, &[0x2e7c, 0x0100, 0x0000, 0x4ef9, 0x0000, 0x0300]),
        (0x300, &[0x4e71, 0x4e75]),
    ]);
    assert_eq!(cpu.pc, 0x200);

    cpu.step().unwrap();
    assert_eq!(cpu.regs.a[7] as u32, 0x0100_0000);

    cpu.step().unwrap();
    assert_eq!(cpu.pc, 0x300);

    cpu.push(Size::Long, 0xabcde).unwrap();
    cpu.step().unwrap(); // NOP
    cpu.step().unwrap(); // RTS
    assert_eq!(cpu.pc, 0xabcde);
}

#[test]
fn immediate_compare_updates_flags() {
    // MOVEQ #0,D0; CMP.B #1,D0
    let mut cpu = cpu_with(&[(0x200, &[0x7000, 0x0c00, 0x0001])]);
    cpu.step().unwrap();
    assert_eq!(cpu.regs.d[0], 0);
    cpu.step().unwrap();
    assert!(cpu.sr.neg().unwrap());
    assert!(!cpu.sr.zero().unwrap());
    assert!(cpu.sr.carry().unwrap());
    assert!(!cpu.sr.ov().unwrap());
}

#[test]
fn movem_stores_reversed_with_predecrement() {
    // MOVEM.L D0-D3,-(A7)
    let mut cpu = cpu_with(&[(0x200, &[0x48e7, 0xf000])]);
    cpu.regs.a[7] = 0x00ff_0100;
    for i in 0..4 {
        cpu.regs.d[i] = i as i32 + 1;
    }
    cpu.step().unwrap();
    assert_eq!(cpu.regs.a[7] as u32, 0x00ff_00f0);
    // D3 was stored first at the highest address, so ascending memory
    // reads D0..D3
    assert_eq!(cpu.bus.read_u32(0xff_00f0).unwrap(), 1);
    assert_eq!(cpu.bus.read_u32(0xff_00f4).unwrap(), 2);
    assert_eq!(cpu.bus.read_u32(0xff_00f8).unwrap(), 3);
    assert_eq!(cpu.bus.read_u32(0xff_00fc).unwrap(), 4);
}

#[test]
fn movem_loads_forward_from_memory() {
    // MOVEM.L (A0),D0-D1/A1
    let mut cpu = cpu_with(&[(0x200, &[0x4cd0, 0x0203])]);
    cpu.regs.a[0] = 0x00ff_0000;
    cpu.bus.write_u32(0xff_0000, 0x11).unwrap();
    cpu.bus.write_u32(0xff_0004, 0x22).unwrap();
    cpu.bus.write_u32(0xff_0008, 0x33).unwrap();
    cpu.step().unwrap();
    assert_eq!(cpu.regs.d[0], 0x11);
    assert_eq!(cpu.regs.d[1], 0x22);
    assert_eq!(cpu.regs.a[1], 0x33);
}

#[test]
fn dbcc_counts_down_to_minus_one() {
    // MOVEQ #3,D0; DBF D0,self
    let mut cpu = cpu_with(&[(0x200, &[0x7003, 0x51c8, 0xfffe])]);
    cpu.step().unwrap();
    for _ in 0..3 {
        cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x202);
    }
    cpu.step().unwrap();
    assert_eq!(cpu.pc, 0x206);
    assert_eq!(cpu.regs.d[0] as u32, 0xffff);
}

#[test]
fn bsr_and_rts_nest() {
    // 0x200: MOVE.L #0x00ff1000,A7; BSR +4 (to 0x20c); BRA self
    // 0x20c: MOVEQ #7,D1; RTS
    let mut cpu = cpu_with(&[
        (0x200, &[0x2e7c, 0x00ff, 0x1000, 0x6104, 0x60fe, 0x0000, 0x7207, 0x4e75]),
    ]);
    cpu.step().unwrap();
    cpu.step().unwrap(); // BSR
    assert_eq!(cpu.pc, 0x20c);
    assert_eq!(cpu.regs.a[7] as u32, 0x00ff_0ffc);
    assert_eq!(cpu.bus.read_u32(0xff_0ffc).unwrap(), 0x208);
    cpu.step().unwrap(); // MOVEQ
    cpu.step().unwrap(); // RTS
    assert_eq!(cpu.pc, 0x208);
    assert_eq!(cpu.regs.d[1], 7);
}

#[test]
fn vertical_blank_interrupt_is_delivered() {
    // 0x200: MOVE.W #0x8124,(0xc00004).l  (enable vblank interrupts)
    // 0x208: BRA self
    // vector at 0x78 points at 0x400
    let mut rom = rom_with(&[
        (0x200, &[0x33fc, 0x8124, 0x00c0, 0x0004, 0x60fe]),
        (0x400, &[0x60fe]),
    ]);
    rom[0x78] = 0x00;
    rom[0x79] = 0x00;
    rom[0x7a] = 0x04;
    rom[0x7b] = 0x00;

    let opts = Options { max_instructions: Some(INSTS_PER_FRAME), ..Options::default() };
    let mut em = Emulator::new(RomImage::from_bytes(rom), None, opts).unwrap();
    em.run().unwrap();

    assert_eq!(em.cpu().pc, 0x400);
    let sr = em.cpu().sr.to_word();
    let cpu = em.cpu_mut();
    // the pre-interrupt context sits on the stack: PC long, then SR word
    assert_eq!(cpu.bus.read_u32(0xff_fffc).unwrap(), 0x208);
    assert_eq!(cpu.bus.read_u16(0xff_fffa).unwrap(), sr);
}

#[test]
fn masked_interrupt_is_skipped() {
    // same rom, but the handler vector is zero and interrupts stay
    // disabled in the VDP; the loop just spins
    let rom = rom_with(&[(0x200, &[0x60fe])]);
    let opts = Options { max_instructions: Some(INSTS_PER_FRAME * 2), ..Options::default() };
    let mut em = Emulator::new(RomImage::from_bytes(rom), None, opts).unwrap();
    em.run().unwrap();
    assert_eq!(em.cpu().pc, 0x200);
}

#[test]
fn save_state_round_trips() {
    let rom = rom_with(&[(0x200, &[0x60fe])]);
    let path = std::env::temp_dir().join("emgen_state_roundtrip.bin");

    let mut em = Emulator::new(RomImage::from_bytes(rom.clone()), None, Options::default())
        .unwrap();
    em.cpu_mut().regs.d[3] = 0x1234_5678;
    em.cpu_mut().regs.a[2] = 0x00ff_8000;
    em.cpu_mut().pc = 0x208;
    em.cpu_mut().bus.write_u32(0xff_0040, 0xdead_beef).unwrap();
    em.save_state(&path).unwrap();

    let mut em2 =
        Emulator::new(RomImage::from_bytes(rom), None, Options::default()).unwrap();
    em2.load_state(&path).unwrap();
    assert_eq!(em2.cpu().pc, 0x208);
    assert_eq!(em2.cpu().regs.d[3], 0x1234_5678);
    assert_eq!(em2.cpu().regs.a[2], 0x00ff_8000);
    assert_eq!(em2.cpu_mut().bus.read_u32(0xff_0040).unwrap(), 0xdead_beef);

    std::fs::remove_file(&path).ok();
}

#[test]
fn event_file_round_trips() {
    let path = std::env::temp_dir().join("emgen_events_roundtrip.bin");
    let frame0 = vec![
        InputEvent { kind: InputEventKind::ControlKeyDown, key: ControlKey::Start },
        InputEvent { kind: InputEventKind::ControlKeyDown, key: ControlKey::Left },
    ];
    let frame1: Vec<InputEvent> = Vec::new();
    let frame2 = vec![InputEvent { kind: InputEventKind::ControlKeyUp, key: ControlKey::Start }];

    {
        let mut w = EventWriter::create(&path).unwrap();
        w.write_frame(&frame0).unwrap();
        w.write_frame(&frame1).unwrap();
        w.write_frame(&frame2).unwrap();
        w.flush().unwrap();
    }
    let mut r = EventReader::open(&path).unwrap();
    assert_eq!(r.read_frame().unwrap().unwrap(), frame0);
    assert_eq!(r.read_frame().unwrap().unwrap(), frame1);
    assert_eq!(r.read_frame().unwrap().unwrap(), frame2);
    assert!(r.read_frame().unwrap().is_none());

    std::fs::remove_file(&path).ok();
}

#[test]
fn bcd_add_chains_through_extend() {
    // ABCD D1,D0 twice, with Extend carried between the digits
    let mut cpu = cpu_with(&[(0x200, &[0xc101, 0xc101])]);
    cpu.regs.d[0] = 0x28;
    cpu.regs.d[1] = 0x45;
    cpu.step().unwrap();
    assert_eq!(cpu.regs.d[0], 0x73);
    assert!(!cpu.sr.ext().unwrap());

    cpu.regs.d[0] = 0x99;
    cpu.regs.d[1] = 0x02;
    cpu.step().unwrap();
    assert_eq!(cpu.regs.d[0], 0x01);
    assert!(cpu.sr.ext().unwrap());
}

#[test]
fn odd_pc_is_fatal() {
    let mut cpu = cpu_with(&[(0x200, &[0x4e71])]);
    cpu.pc = 0x201;
    assert!(cpu.step().is_err());
}

#[test]
fn unimplemented_instruction_reports_kind_and_pc() {
    // TRAP #0 decodes but is not modelled
    let mut cpu = cpu_with(&[(0x200, &[0x4e40])]);
    let err = cpu.step().unwrap_err();
    let msg = format!("{}", err);
    assert!(msg.contains("TRAP"), "{}", msg);
    assert!(msg.contains("200"), "{}", msg);
}
