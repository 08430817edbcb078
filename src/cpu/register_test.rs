use pretty_assertions::assert_eq;

use crate::cpu::register::{r16, r8, RegisterState, R};

#[test]
fn can_access_gpr() {
    let mut r = RegisterState::default();
    r.set_r16(R::CX, 0x1616);
    assert_eq!(0x1616, r.get_r16(R::CX));

    r.set_r8(R::CL, 0x08);
    assert_eq!(0x08, r.get_r8(R::CL));
    assert_eq!(0x1608, r.get_r16(R::CX));

    r.set_r8(R::CH, 0x09);
    assert_eq!(0x09, r.get_r8(R::CH));
    assert_eq!(0x0908, r.get_r16(R::CX));
}

#[test]
fn byte_halves_alias_words() {
    let mut r = RegisterState::default();
    for (word, lo, hi) in &[
        (R::AX, R::AL, R::AH),
        (R::BX, R::BL, R::BH),
        (R::CX, R::CL, R::CH),
        (R::DX, R::DL, R::DH),
    ] {
        r.set_r16(*word, 0x1234);
        r.set_r8(*lo, 0x99);
        assert_eq!(0x1299, r.get_r16(*word));
        r.set_r8(*hi, 0x55);
        assert_eq!(0x5599, r.get_r16(*word));
    }
}

#[test]
fn can_access_segment_registers() {
    let mut r = RegisterState::default();
    r.set_r16(R::ES, 0x4040);
    assert_eq!(0x4040, r.get_r16(R::ES));
    assert_eq!(0, r.get_r16(R::AX));
}

#[test]
fn modrm_field_mapping() {
    assert_eq!(R::AL, r8(0));
    assert_eq!(R::BH, r8(7));
    assert_eq!(R::AX, r16(0));
    assert_eq!(R::DI, r16(7));
}
