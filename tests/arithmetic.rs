use emgen::fields::{OpResult, Size};
use emgen::processor::Flag;

const SAMPLES: &[i32] = &[
    0,
    1,
    -1,
    2,
    -2,
    5,
    -5,
    127,
    -128,
    255,
    256,
    -256,
    0x7fff,
    -0x8000,
    0xffff,
    0x10000,
    0x12345678,
    -0x12345678,
    i32::max_value(),
    i32::min_value(),
];

fn flag(f: Option<Flag>) -> bool {
    f == Some(Flag::Set)
}

#[test]
fn sub_flags_match_the_definition() {
    for &a in SAMPLES {
        for &b in SAMPLES {
            let (res, ccr) = OpResult::Long(a as u32).sub(OpResult::Long(b as u32), false);
            assert_eq!(res.sign_extend(), a.wrapping_sub(b), "{} - {}", a, b);
            assert_eq!(flag(ccr.c), (a as u32) < (b as u32), "carry of {} - {}", a, b);
            assert_eq!(flag(ccr.z), a == b, "zero of {} - {}", a, b);
            assert_eq!(flag(ccr.n), a.wrapping_sub(b) < 0, "negative of {} - {}", a, b);
            assert_eq!(ccr.x, ccr.c);
        }
    }
}

#[test]
fn sub_flags_at_byte_size() {
    let (res, ccr) = OpResult::Byte(0).sub(OpResult::Byte(1), false);
    assert_eq!(res, OpResult::Byte(0xff));
    assert!(flag(ccr.n));
    assert!(!flag(ccr.z));
    assert!(flag(ccr.c));
    assert!(!flag(ccr.v));
}

#[test]
fn add_signed_overflow() {
    let (res, ccr) = OpResult::Word(0x7fff).add(OpResult::Word(1), false);
    assert_eq!(res, OpResult::Word(0x8000));
    assert!(flag(ccr.v));
    assert!(flag(ccr.n));
    assert!(!flag(ccr.c));

    let (res, ccr) = OpResult::Word(0xffff).add(OpResult::Word(1), false);
    assert_eq!(res, OpResult::Word(0));
    assert!(flag(ccr.c));
    assert!(flag(ccr.z));
    assert!(!flag(ccr.v));
}

#[test]
fn mul_yields_32_bit_products() {
    for &a in &[0i16, 1, -1, 2, 300, -300, 0x7fff, -0x8000] {
        for &b in &[0i16, 1, -1, 7, 1000, -1000, 0x7fff, -0x8000] {
            let (res, _) =
                OpResult::Word(a as u16).muls(OpResult::Word(b as u16));
            assert_eq!(res.sign_extend(), (a as i32) * (b as i32), "muls {} {}", a, b);
            let (res, _) =
                OpResult::Word(a as u16).mulu(OpResult::Word(b as u16));
            assert_eq!(res.inner(), (a as u16 as u32) * (b as u16 as u32), "mulu {} {}", a, b);
        }
    }
}

#[test]
fn div_splits_quotient_and_remainder() {
    let (res, _) = OpResult::Long(100_007).divu(OpResult::Word(10)).unwrap();
    // quotient in the low word, remainder in the high word
    assert_eq!(res.inner() & 0xffff, 10_000);
    assert_eq!(res.inner() >> 16, 7);

    let (res, _) = OpResult::Long(-100i32 as u32).divs(OpResult::Word(7)).unwrap();
    assert_eq!((res.inner() & 0xffff) as u16 as i16, -14);
    assert_eq!((res.inner() >> 16) as u16 as i16, -2);
}

#[test]
fn division_by_zero_is_fatal() {
    assert!(OpResult::Long(1).divu(OpResult::Word(0)).is_err());
    assert!(OpResult::Long(1).divs(OpResult::Word(0)).is_err());
}

#[test]
fn rotate_duality() {
    for &v in &[0u32, 1, 0x80, 0xff, 0x1234, 0x8000_0001, 0xdead_beef] {
        for n in 1..32 {
            let (l, _) = OpResult::Long(v).rol(32 - n);
            let (r, _) = OpResult::Long(v).ror(n);
            assert_eq!(l.inner(), r.inner(), "rot {} by {}", v, n);
        }
    }
    for &v in &[0u16, 1, 0x80, 0xabcd] {
        for n in 1..16 {
            let (l, _) = OpResult::Word(v).rol(16 - n);
            let (r, _) = OpResult::Word(v).ror(n);
            assert_eq!(l.inner(), r.inner(), "rot {} by {}", v, n);
        }
    }
}

#[test]
fn rotate_carry_is_the_last_bit_out() {
    let (res, ccr) = OpResult::Byte(0b1000_0001).ror(1);
    assert_eq!(res, OpResult::Byte(0b1100_0000));
    assert!(flag(ccr.c));
    // rotates leave Extend alone
    assert_eq!(ccr.x, None);

    let (res, ccr) = OpResult::Byte(0b1000_0000).rol(1);
    assert_eq!(res, OpResult::Byte(1));
    assert!(flag(ccr.c));
}

#[test]
fn swap_exchanges_halves() {
    let (res, ccr) = OpResult::Long(0x1234_abcd).swap();
    assert_eq!(res, OpResult::Long(0xabcd_1234));
    assert!(flag(ccr.n));
    let (res, _) = OpResult::Long(0xffff_0000).swap();
    assert_eq!(res, OpResult::Long(0x0000_ffff));
}

#[test]
fn shifts_set_carry_and_extend() {
    let (res, ccr) = OpResult::Word(0x8001).lsr(1);
    assert_eq!(res, OpResult::Word(0x4000));
    assert!(flag(ccr.c));
    assert!(flag(ccr.x));
    assert!(!flag(ccr.v));

    let (res, ccr) = OpResult::Word(0x8001).asr(1);
    assert_eq!(res, OpResult::Word(0xc000));
    assert!(flag(ccr.c));

    // a shift count of zero clears carry and leaves extend alone
    let (_, ccr) = OpResult::Word(0x8001).lsr(0);
    assert!(!flag(ccr.c));
    assert_eq!(ccr.x, None);
}

#[test]
fn asl_overflow_tracks_sign_changes() {
    // 0x4000 << 1 flips the sign bit
    let (res, ccr) = OpResult::Word(0x4000).asl(1);
    assert_eq!(res, OpResult::Word(0x8000));
    assert!(flag(ccr.v));
    // lsl of the same value does not report overflow
    let (_, ccr) = OpResult::Word(0x4000).lsl(1);
    assert!(!flag(ccr.v));
    // shifting zero never overflows
    let (_, ccr) = OpResult::Word(0).asl(5);
    assert!(!flag(ccr.v));
}

#[test]
fn bcd_add_vectors() {
    let (res, ccr) = OpResult::Byte(0x28).abcd(OpResult::Byte(0x45), false);
    assert_eq!(res, OpResult::Byte(0x73));
    assert!(!flag(ccr.x));
    assert!(!flag(ccr.c));

    let (res, _) = OpResult::Byte(0x28).abcd(OpResult::Byte(0x45), true);
    assert_eq!(res, OpResult::Byte(0x74));

    let (res, ccr) = OpResult::Byte(0x99).abcd(OpResult::Byte(0x01), false);
    assert_eq!(res, OpResult::Byte(0x00));
    assert!(flag(ccr.x));
    assert!(flag(ccr.c));
    // zero survives so multi-byte chains can accumulate it
    assert_eq!(ccr.z, None);
    // overflow is architecturally undefined after a decimal add
    assert_eq!(ccr.v, Some(Flag::Invalid));

    let (res, ccr) = OpResult::Byte(0x12).abcd(OpResult::Byte(0x34), false);
    assert_eq!(res, OpResult::Byte(0x46));
    assert_eq!(ccr.z, Some(Flag::Clear));
}

#[test]
fn neg_flags() {
    let (res, ccr) = OpResult::Long(5).neg();
    assert_eq!(res.sign_extend(), -5);
    assert!(flag(ccr.n));
    assert!(flag(ccr.c));
    assert!(!flag(ccr.v));

    let (res, ccr) = OpResult::Long(0).neg();
    assert_eq!(res.sign_extend(), 0);
    assert!(flag(ccr.z));
    assert!(!flag(ccr.c));

    // the most negative value negates onto itself and overflows
    let (res, ccr) = OpResult::Byte(0x80).neg();
    assert_eq!(res, OpResult::Byte(0x80));
    assert!(flag(ccr.v));
}

#[test]
fn ext_sign_extends_the_previous_size() {
    let (res, _) = OpResult::Word(0x00ff).ext(Size::Word);
    assert_eq!(res, OpResult::Word(0xffff));
    let (res, _) = OpResult::Long(0x0000_8000).ext(Size::Long);
    assert_eq!(res, OpResult::Long(0xffff_8000));
    let (res, _) = OpResult::Long(0x0000_7fff).ext(Size::Long);
    assert_eq!(res, OpResult::Long(0x0000_7fff));
}

#[test]
fn bit_operations_only_touch_zero() {
    let ccr = OpResult::Long(0b100).btst(2);
    assert_eq!(ccr.z, Some(Flag::Clear));
    assert_eq!(ccr.n, None);
    assert_eq!(ccr.c, None);

    let (res, ccr) = OpResult::Long(0).bset(5);
    assert_eq!(res.inner(), 32);
    assert_eq!(ccr.z, Some(Flag::Set));

    let (res, _) = OpResult::Long(0xff).bclr(0);
    assert_eq!(res.inner(), 0xfe);

    let (res, _) = OpResult::Byte(0).bchg(9);
    // memory targets wrap the bit number at the operand width
    assert_eq!(res.inner(), 2);
}

#[test]
fn logical_ops_clear_overflow_and_carry() {
    let (res, ccr) = OpResult::Word(0xf0f0).and(OpResult::Word(0x0ff0));
    assert_eq!(res, OpResult::Word(0x00f0));
    assert_eq!(ccr.v, Some(Flag::Clear));
    assert_eq!(ccr.c, Some(Flag::Clear));
    assert_eq!(ccr.x, None);

    let (res, ccr) = OpResult::Byte(0x80).or(OpResult::Byte(0x01));
    assert_eq!(res, OpResult::Byte(0x81));
    assert_eq!(ccr.n, Some(Flag::Set));
}
