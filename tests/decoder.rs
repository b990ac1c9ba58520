use emgen::bus::Bus;
use emgen::disasm::Disasm;
use emgen::fields::{AddrMode, Condition, RegisterId, Size};
use emgen::instruction::Kind;
use emgen::memory::Memory;
use emgen::opcodes::OpcodeDecoder;
use emgen::rom::RomImage;

fn rom_with(segments: &[(u32, &[u16])]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x1000];
    for (base, words) in segments {
        for (i, w) in words.iter().enumerate() {
            let off = *base as usize + 2 * i;
            rom[off] = (*w >> 8) as u8;
            rom[off + 1] = *w as u8;
        }
    }
    rom
}

fn bus_with_code(words: &[u16]) -> Bus {
    Bus::new(RomImage::from_bytes(rom_with(&[(0x200, words)])).into_memory())
}

#[test]
fn every_opcode_decodes_or_rejects() {
    let decoder = OpcodeDecoder::builtin().unwrap();
    let mut matched = 0usize;
    let mut rejected = 0usize;
    for opcode in 0..=0xffffu16 {
        match decoder.decode(opcode) {
            Ok(_) => matched += 1,
            Err(_) => rejected += 1,
        }
    }
    assert_eq!(matched + rejected, 0x10000);
    // the bulk of the space is valid encodings
    assert!(matched > 0x8000, "only {} opcodes decoded", matched);
}

#[test]
fn every_table_line_is_reachable() {
    let decoder = OpcodeDecoder::builtin().unwrap();
    let report = decoder.verify().unwrap();
    assert_eq!(report.num_specs, decoder.specs().len());
}

#[test]
fn field_round_trips() {
    let decoder = OpcodeDecoder::builtin().unwrap();

    // TST.W D3 = 01001010 01 000011
    let fields = decoder.decode(0x4a43).unwrap();
    assert_eq!(fields.kind, Kind::TST);
    assert_eq!(fields.size.unwrap(), Size::Word);
    assert_eq!(fields.ea1.unwrap(), 0b000_011);

    // Bcc: BNE.s +0x10 = 0110 0110 00010000
    let fields = decoder.decode(0x6610).unwrap();
    assert_eq!(fields.kind, Kind::BCC);
    assert_eq!(fields.cond.unwrap(), Condition::NE);
    assert_eq!(fields.disp.unwrap(), 0x10);

    // ADDQ.L #3,D2 = 0101 011 0 10 000010
    let fields = decoder.decode(0x5682).unwrap();
    assert_eq!(fields.kind, Kind::ADDQ);
    assert_eq!(fields.data.unwrap(), 3);
    assert_eq!(fields.size.unwrap(), Size::Long);

    // MOVEQ #-1,D7 = 0111 111 0 11111111
    let fields = decoder.decode(0x7eff).unwrap();
    assert_eq!(fields.kind, Kind::MOVEQ);
    assert_eq!(fields.reg1.unwrap(), RegisterId::Data(7));
    assert_eq!(fields.data.unwrap(), -1);

    // fixed-word encodings
    assert_eq!(decoder.decode(0x4e71).unwrap().kind, Kind::NOP);
    assert_eq!(decoder.decode(0x4e75).unwrap().kind, Kind::RTS);
    assert_eq!(decoder.decode(0x4e73).unwrap().kind, Kind::RTE);
    assert_eq!(decoder.decode(0x4afc).unwrap().kind, Kind::ILLEGAL);
}

#[test]
fn first_match_wins_on_overlaps() {
    let decoder = OpcodeDecoder::builtin().unwrap();
    // EXT.W D0 also fits the MOVEM bit pattern; the table must pick EXT
    assert_eq!(decoder.decode(0x4880).unwrap().kind, Kind::EXT);
    // MOVEM.L regs,-(A7)
    assert_eq!(decoder.decode(0x48e7).unwrap().kind, Kind::MOVEM);
    // TAS sits where TST's size field would be 0b11
    assert_eq!(decoder.decode(0x4ac0).unwrap().kind, Kind::TAS);
    // SWAP within PEA's prefix
    assert_eq!(decoder.decode(0x4840).unwrap().kind, Kind::SWAP);
    assert_eq!(decoder.decode(0x4850).unwrap().kind, Kind::PEA);
    // BSR before the generic Bcc pattern
    assert_eq!(decoder.decode(0x6110).unwrap().kind, Kind::BSR);
    assert_eq!(decoder.decode(0x6010).unwrap().kind, Kind::BCC);
}

#[test]
fn a_line_and_f_line_are_rejected() {
    let decoder = OpcodeDecoder::builtin().unwrap();
    assert!(decoder.decode(0xa000).is_err());
    assert!(decoder.decode(0xf123).is_err());
}

#[test]
fn extension_words_advance_the_length() {
    let disasm = Disasm::new().unwrap();

    // TST.W D0: no extension
    let mut bus = bus_with_code(&[0x4a40]);
    assert_eq!(disasm.disasm_one(&mut bus, 0x200).unwrap().bytes, 2);

    // TST.W (0x1234).w: one word
    let mut bus = bus_with_code(&[0x4a78, 0x1234]);
    assert_eq!(disasm.disasm_one(&mut bus, 0x200).unwrap().bytes, 4);

    // TST.W (0x00001234).l: one long
    let mut bus = bus_with_code(&[0x4a79, 0x0000, 0x1234]);
    assert_eq!(disasm.disasm_one(&mut bus, 0x200).unwrap().bytes, 6);

    // ADDI.L #imm,(d16,A0): two extension words for the immediate, one
    // for the displacement
    let mut bus = bus_with_code(&[0x06a8, 0x0001, 0x0000, 0x0010]);
    assert_eq!(disasm.disasm_one(&mut bus, 0x200).unwrap().bytes, 8);
}

#[test]
fn pc_relative_base_is_the_word_after_the_opcode() {
    let disasm = Disasm::new().unwrap();

    // LEA (0x10,PC),A0 at 0x200: base is 0x202
    let mut bus = bus_with_code(&[0x41fa, 0x0010]);
    let inst = disasm.disasm_one(&mut bus, 0x200).unwrap();
    assert_eq!(inst.kind, Kind::LEA);
    assert_eq!(inst.src.unwrap(), AddrMode::AbsLong(0x212));

    // negative displacement
    let mut bus = bus_with_code(&[0x41fa, 0xfffe]);
    let inst = disasm.disasm_one(&mut bus, 0x200).unwrap();
    assert_eq!(inst.src.unwrap(), AddrMode::AbsLong(0x200));
}

#[test]
fn absolute_short_sign_extends() {
    let disasm = Disasm::new().unwrap();
    // TST.W (0xff8000).w reaches the top of the address space
    let mut bus = bus_with_code(&[0x4a78, 0x8000]);
    let inst = disasm.disasm_one(&mut bus, 0x200).unwrap();
    assert_eq!(inst.src.unwrap(), AddrMode::AbsShort(0xffff8000));
}

#[test]
fn move_decodes_both_effective_addresses() {
    let disasm = Disasm::new().unwrap();
    // MOVE.L (0x00ff0000).l,(0x00ff0004).l
    let mut bus = bus_with_code(&[0x23f9, 0x00ff, 0x0000, 0x00ff, 0x0004]);
    let inst = disasm.disasm_one(&mut bus, 0x200).unwrap();
    assert_eq!(inst.kind, Kind::MOVE);
    assert_eq!(inst.size.unwrap(), Size::Long);
    assert_eq!(inst.src.unwrap(), AddrMode::AbsLong(0xff0000));
    assert_eq!(inst.dst.unwrap(), AddrMode::AbsLong(0xff0004));
    assert_eq!(inst.bytes, 10);
}

#[test]
fn reachability_walk_follows_branches() {
    let disasm = Disasm::new().unwrap();
    // 0x200: BRA +4 (to 0x206); 0x206: NOP; RTS. The gap at 0x204 stays
    // undecoded.
    let rom = rom_with(&[(0x200, &[0x6004, 0xffff, 0x4e71, 0x4e75])]);
    let mut bus = Bus::new(Memory::with_content(rom));
    let program = disasm.disasm_all(&mut bus, &[0x200]).unwrap();
    assert!(program.insts.contains_key(&0x200));
    assert!(!program.insts.contains_key(&0x204));
    assert!(program.insts.contains_key(&0x206));
    assert!(program.insts.contains_key(&0x208));
    assert!(program.labels.contains_key(&0x206));
}
