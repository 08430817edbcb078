use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use crate::cpu::{CPU, R};
use crate::machine::{Component, InvalidOpcodePolicy, Machine};
use crate::memory::{MemoryAddress, MMU};

fn com_machine(code: &[u8]) -> Machine {
    let mut m = Machine::default();
    m.load_com(code).unwrap();
    m
}

/// a bare machine with code at 0000:0300 and a stack at 0000:1000
fn raw_machine(code: &[u8]) -> Machine {
    let mut m = Machine::default();
    m.cpu.set_r16(R::CS, 0);
    m.cpu.set_r16(R::DS, 0);
    m.cpu.set_r16(R::ES, 0);
    m.cpu.set_r16(R::SS, 0);
    m.cpu.set_r16(R::SP, 0x1000);
    m.cpu.regs.ip = 0x0300;
    m.mmu.write(0, 0x0300, code);
    m
}

#[test]
fn can_execute_mov_r8() {
    let mut m = com_machine(&[
        0xB2, 0x13, // mov dl,0x13
        0x88, 0xD0, // mov al,dl
    ]);

    m.execute_instruction();
    assert_eq!(0x102, m.cpu.regs.ip);
    assert_eq!(0x13, m.cpu.get_r8(R::DL));

    m.execute_instruction();
    assert_eq!(0x104, m.cpu.regs.ip);
    assert_eq!(0x13, m.cpu.get_r8(R::AL));
}

#[test]
fn can_execute_mov_r8_rm8() {
    let mut m = com_machine(&[
        0xBB, 0x05, 0x01, // mov bx,0x105
        0x8A, 0x27,       // mov ah,[bx]
        0x99,             // db 0x99
    ]);

    m.execute_instruction();
    assert_eq!(0x103, m.cpu.regs.ip);
    assert_eq!(0x105, m.cpu.get_r16(R::BX));

    m.execute_instruction();
    assert_eq!(0x105, m.cpu.regs.ip);
    assert_eq!(0x99, m.cpu.get_r8(R::AH));
}

#[test]
fn can_handle_stack() {
    let mut m = com_machine(&[
        0xB8, 0x88, 0x88, // mov ax,0x8888
        0x8E, 0xD8,       // mov ds,ax
        0x1E,             // push ds
        0x07,             // pop es
    ]);

    m.execute_instructions(2);
    assert_eq!(0xFFFE, m.cpu.get_r16(R::SP));
    m.execute_instruction(); // push
    assert_eq!(0xFFFC, m.cpu.get_r16(R::SP));
    m.execute_instruction(); // pop
    assert_eq!(0xFFFE, m.cpu.get_r16(R::SP));

    assert_eq!(0x107, m.cpu.regs.ip);
    assert_eq!(0x8888, m.cpu.get_r16(R::AX));
    assert_eq!(0x8888, m.cpu.get_r16(R::DS));
    assert_eq!(0x8888, m.cpu.get_r16(R::ES));
}

#[test]
fn sp_wraps_modulo_64k() {
    let mut m = com_machine(&[
        0xBC, 0x00, 0x00, // mov sp,0x0
        0x50,             // push ax
    ]);
    m.execute_instructions(2);
    assert_eq!(0xFFFE, m.cpu.get_r16(R::SP));
}

#[test]
fn can_execute_add8() {
    let mut m = com_machine(&[
        0xB4, 0xFF,       // mov ah,0xff
        0x80, 0xC4, 0x01, // add ah,0x1

        0xB4, 0x01,       // mov ah,0x1
        0x80, 0xC4, 0xFF, // add ah,0xff

        0xB4, 0xFF,       // mov ah,0xff
        0x80, 0xC4, 0x00, // add ah,0x0

        0xB4, 0xFF,       // mov ah,0xff
        0x80, 0xC4, 0xFF, // add ah,0xff
    ]);

    m.execute_instructions(2);
    assert_eq!(0x00, m.cpu.get_r8(R::AH));
    assert_eq!(true, m.cpu.regs.flags.carry);
    assert_eq!(true, m.cpu.regs.flags.parity);
    assert_eq!(true, m.cpu.regs.flags.adjust);
    assert_eq!(true, m.cpu.regs.flags.zero);
    assert_eq!(false, m.cpu.regs.flags.sign);
    assert_eq!(false, m.cpu.regs.flags.overflow);

    m.execute_instructions(2);
    assert_eq!(0x00, m.cpu.get_r8(R::AH));
    assert_eq!(true, m.cpu.regs.flags.carry);
    assert_eq!(true, m.cpu.regs.flags.zero);

    m.execute_instructions(2);
    assert_eq!(0xFF, m.cpu.get_r8(R::AH));
    assert_eq!(false, m.cpu.regs.flags.carry);
    assert_eq!(false, m.cpu.regs.flags.adjust);
    assert_eq!(false, m.cpu.regs.flags.zero);
    assert_eq!(true, m.cpu.regs.flags.sign);

    m.execute_instructions(2);
    assert_eq!(0xFE, m.cpu.get_r8(R::AH));
    assert_eq!(true, m.cpu.regs.flags.carry);
    assert_eq!(false, m.cpu.regs.flags.parity);
    assert_eq!(true, m.cpu.regs.flags.adjust);
    assert_eq!(false, m.cpu.regs.flags.zero);
    assert_eq!(true, m.cpu.regs.flags.sign);
    assert_eq!(false, m.cpu.regs.flags.overflow);
}

#[test]
fn can_execute_add16_with_sign_extended_imm() {
    let mut m = com_machine(&[
        0xB8, 0xFF, 0xFF, // mov ax,0xffff
        0x83, 0xC0, 0x01, // add ax,byte +0x1

        0xB8, 0x01, 0x00, // mov ax,0x1
        0x83, 0xC0, 0xFF, // add ax,byte -0x1
    ]);

    m.execute_instructions(2);
    assert_eq!(0x0000, m.cpu.get_r16(R::AX));
    assert_eq!(true, m.cpu.regs.flags.carry);
    assert_eq!(true, m.cpu.regs.flags.parity);
    assert_eq!(true, m.cpu.regs.flags.adjust);
    assert_eq!(true, m.cpu.regs.flags.zero);
    assert_eq!(false, m.cpu.regs.flags.sign);
    assert_eq!(false, m.cpu.regs.flags.overflow);

    m.execute_instructions(2);
    assert_eq!(0x0000, m.cpu.get_r16(R::AX));
    assert_eq!(true, m.cpu.regs.flags.carry);
    assert_eq!(true, m.cpu.regs.flags.zero);
    assert_eq!(false, m.cpu.regs.flags.overflow);
}

#[test]
fn signed_overflow_is_detected() {
    let mut m = com_machine(&[
        0xB0, 0x7F,       // mov al,0x7f
        0x04, 0x01,       // add al,0x1
        0xB0, 0x80,       // mov al,0x80
        0x2C, 0x01,       // sub al,0x1
    ]);

    m.execute_instructions(2);
    assert_eq!(0x80, m.cpu.get_r8(R::AL));
    assert_eq!(true, m.cpu.regs.flags.overflow);
    assert_eq!(true, m.cpu.regs.flags.sign);
    assert_eq!(false, m.cpu.regs.flags.carry);

    m.execute_instructions(2);
    assert_eq!(0x7F, m.cpu.get_r8(R::AL));
    assert_eq!(true, m.cpu.regs.flags.overflow);
    assert_eq!(false, m.cpu.regs.flags.sign);
    assert_eq!(false, m.cpu.regs.flags.carry);
}

#[test]
fn adc_sbb_propagate_carry() {
    let mut m = com_machine(&[
        0xB8, 0xFF, 0x00, // mov ax,0xff
        0x04, 0x01,       // add al,0x1  (carry out of AL)
        0x80, 0xD4, 0x00, // adc ah,0x0
        0xF9,             // stc
        0xB3, 0x05,       // mov bl,0x5
        0x80, 0xDB, 0x02, // sbb bl,0x2
    ]);

    m.execute_instructions(3);
    assert_eq!(0x0100, m.cpu.get_r16(R::AX));

    m.execute_instructions(3);
    assert_eq!(0x02, m.cpu.get_r8(R::BL));
    assert_eq!(false, m.cpu.regs.flags.carry);
}

#[test]
fn adc_overflow_includes_carry_in() {
    let mut m = com_machine(&[
        0xF9,             // stc
        0xB0, 0x7F,       // mov al,0x7f
        0x14, 0x00,       // adc al,0x0
    ]);
    m.execute_instructions(3);
    assert_eq!(0x80, m.cpu.get_r8(R::AL));
    assert_eq!(true, m.cpu.regs.flags.overflow);
    assert_eq!(false, m.cpu.regs.flags.carry);
}

#[test]
fn inc_dec_do_not_touch_carry() {
    let mut m = com_machine(&[
        0xF9,             // stc
        0xB8, 0xFF, 0xFF, // mov ax,0xffff
        0x40,             // inc ax
        0x48,             // dec ax
    ]);

    m.execute_instructions(3);
    assert_eq!(0x0000, m.cpu.get_r16(R::AX));
    assert_eq!(true, m.cpu.regs.flags.carry);
    assert_eq!(true, m.cpu.regs.flags.zero);

    m.execute_instruction();
    assert_eq!(0xFFFF, m.cpu.get_r16(R::AX));
    assert_eq!(true, m.cpu.regs.flags.carry);
    assert_eq!(false, m.cpu.regs.flags.zero);
}

#[test]
fn inc_overflow_at_signed_boundary() {
    let mut m = com_machine(&[
        0xB8, 0xFF, 0x7F, // mov ax,0x7fff
        0x40,             // inc ax
    ]);
    m.execute_instructions(2);
    assert_eq!(0x8000, m.cpu.get_r16(R::AX));
    assert_eq!(true, m.cpu.regs.flags.overflow);
    assert_eq!(true, m.cpu.regs.flags.sign);
}

#[test]
fn logic_ops_clear_carry_and_overflow() {
    let mut m = com_machine(&[
        0xF9,             // stc
        0xB0, 0xF0,       // mov al,0xf0
        0x24, 0x0F,       // and al,0xf
        0xF9,             // stc
        0xA8, 0xFF,       // test al,0xff
    ]);

    m.execute_instructions(3);
    assert_eq!(0x00, m.cpu.get_r8(R::AL));
    assert_eq!(false, m.cpu.regs.flags.carry);
    assert_eq!(false, m.cpu.regs.flags.overflow);
    assert_eq!(true, m.cpu.regs.flags.zero);

    m.execute_instructions(2);
    assert_eq!(false, m.cpu.regs.flags.carry);
    assert_eq!(true, m.cpu.regs.flags.zero);
    assert_eq!(0x00, m.cpu.get_r8(R::AL)); // test discards the result
}

#[test]
fn arith_group_xor_writes_back() {
    let mut m = com_machine(&[
        0xB6, 0xAA,       // mov dh,0xaa
        0x80, 0xF6, 0xFF, // xor dh,0xff
    ]);
    m.execute_instructions(2);
    assert_eq!(0x55, m.cpu.get_r8(R::DH));
    assert_eq!(false, m.cpu.regs.flags.carry);
    assert_eq!(false, m.cpu.regs.flags.overflow);
}

#[test]
fn can_execute_neg_and_not() {
    let mut m = com_machine(&[
        0xB0, 0x01, // mov al,0x1
        0xF6, 0xD8, // neg al
        0xF6, 0xD0, // not al
    ]);

    m.execute_instructions(2);
    assert_eq!(0xFF, m.cpu.get_r8(R::AL));
    assert_eq!(true, m.cpu.regs.flags.carry);
    assert_eq!(true, m.cpu.regs.flags.sign);
    assert_eq!(false, m.cpu.regs.flags.overflow);

    m.execute_instruction();
    assert_eq!(0x00, m.cpu.get_r8(R::AL));
    // not affects no flags
    assert_eq!(true, m.cpu.regs.flags.carry);
}

#[test]
fn neg_of_min_sets_overflow() {
    let mut m = com_machine(&[
        0xB0, 0x80, // mov al,0x80
        0xF6, 0xD8, // neg al
    ]);
    m.execute_instructions(2);
    assert_eq!(0x80, m.cpu.get_r8(R::AL));
    assert_eq!(true, m.cpu.regs.flags.overflow);
    assert_eq!(true, m.cpu.regs.flags.carry);
}

#[test]
fn sbb_matches_adc_of_complement() {
    // subtraction is addition of the ones-complement with an inverted
    // carry: the result and Z, S, P, O agree, C and A come out inverted
    // because they follow the borrow convention
    for &(a, b) in &[(0x00u8, 0x00u8), (0x12, 0x34), (0x80, 0x7F), (0xFF, 0x01), (0x55, 0xAA)] {
        for &carry in &[false, true] {
            let mut m1 = com_machine(&[0x18, 0xD8, 0xF4]); // sbb al,bl
            m1.cpu.set_r8(R::AL, a);
            m1.cpu.set_r8(R::BL, b);
            m1.cpu.regs.flags.carry = carry;
            m1.emulate(100);

            let mut m2 = com_machine(&[0x10, 0xD8, 0xF4]); // adc al,bl
            m2.cpu.set_r8(R::AL, a);
            m2.cpu.set_r8(R::BL, !b);
            m2.cpu.regs.flags.carry = !carry;
            m2.emulate(100);

            assert_eq!(m1.cpu.get_r8(R::AL), m2.cpu.get_r8(R::AL));
            assert_eq!(m1.cpu.regs.flags.zero, m2.cpu.regs.flags.zero);
            assert_eq!(m1.cpu.regs.flags.sign, m2.cpu.regs.flags.sign);
            assert_eq!(m1.cpu.regs.flags.parity, m2.cpu.regs.flags.parity);
            assert_eq!(m1.cpu.regs.flags.overflow, m2.cpu.regs.flags.overflow);
            assert_eq!(m1.cpu.regs.flags.carry, !m2.cpu.regs.flags.carry);
            assert_eq!(m1.cpu.regs.flags.adjust, !m2.cpu.regs.flags.adjust);
        }
    }
}

#[test]
fn can_execute_mul_imul() {
    let mut m = com_machine(&[
        0xB0, 0xC8, // mov al,200
        0xB3, 0x04, // mov bl,4
        0xF6, 0xE3, // mul bl
    ]);
    m.execute_instructions(3);
    assert_eq!(800, m.cpu.get_r16(R::AX));
    assert_eq!(true, m.cpu.regs.flags.carry);
    assert_eq!(true, m.cpu.regs.flags.overflow);

    let mut m = com_machine(&[
        0xB0, 0xFE, // mov al,-2
        0xB3, 0x03, // mov bl,3
        0xF6, 0xEB, // imul bl
    ]);
    m.execute_instructions(3);
    assert_eq!(0xFFFA, m.cpu.get_r16(R::AX));
    assert_eq!(false, m.cpu.regs.flags.carry);
    assert_eq!(false, m.cpu.regs.flags.overflow);
}

#[test]
fn can_execute_mul16() {
    let mut m = com_machine(&[
        0xB8, 0x00, 0x80, // mov ax,0x8000
        0xBB, 0x04, 0x00, // mov bx,0x4
        0xF7, 0xE3,       // mul bx
    ]);
    m.execute_instructions(3);
    assert_eq!(0x0000, m.cpu.get_r16(R::AX));
    assert_eq!(0x0002, m.cpu.get_r16(R::DX));
    assert_eq!(true, m.cpu.regs.flags.carry);
    assert_eq!(true, m.cpu.regs.flags.overflow);
}

#[test]
fn can_execute_div_idiv() {
    let mut m = com_machine(&[
        0xBA, 0x01, 0x00, // mov dx,0x1
        0xB8, 0x00, 0x00, // mov ax,0x0
        0xBB, 0x02, 0x00, // mov bx,0x2
        0xF7, 0xF3,       // div bx
    ]);
    m.execute_instructions(4);
    assert_eq!(0x8000, m.cpu.get_r16(R::AX));
    assert_eq!(0x0000, m.cpu.get_r16(R::DX));

    let mut m = com_machine(&[
        0xB8, 0x9C, 0xFF, // mov ax,-100
        0xB3, 0x03,       // mov bl,3
        0xF6, 0xFB,       // idiv bl
    ]);
    m.execute_instructions(3);
    assert_eq!(0xDF, m.cpu.get_r8(R::AL)); // -33
    assert_eq!(0xFF, m.cpu.get_r8(R::AH)); // remainder -1
}

#[test]
fn divide_by_zero_raises_vector_zero() {
    // INT 0 pushes FLAGS, CS and the return IP, then jumps via the vector
    let mut m = raw_machine(&[
        0xF6, 0xF3, // div bl
        0xF4,       // hlt
    ]);
    m.mmu.write_vec(0, MemoryAddress::RealSegmentOffset(0, 0x0500));
    m.mmu.write_u8(0, 0x0500, 0xF4); // hlt
    m.cpu.set_r16(R::AX, 0x0100);
    m.cpu.set_r8(R::BL, 0);

    m.emulate(100);
    // three words pushed
    assert_eq!(0x0FFA, m.cpu.get_r16(R::SP));
    // the return address points past the faulting div
    assert_eq!(0x0302, m.mmu.read_u16(0, 0x0FFA));
    assert_eq!(0x0501, m.cpu.regs.ip);
    assert_eq!(0x0100, m.cpu.get_r16(R::AX)); // dividend untouched
    assert_eq!(false, m.cpu.regs.flags.interrupt);
}

#[test]
fn divide_overflow_raises_vector_zero() {
    let mut m = raw_machine(&[
        0xF6, 0xF3, // div bl
        0xF4,       // hlt
    ]);
    m.mmu.write_vec(0, MemoryAddress::RealSegmentOffset(0, 0x0500));
    m.mmu.write_u8(0, 0x0500, 0xF4); // hlt
    m.cpu.set_r16(R::AX, 0x0100);
    m.cpu.set_r8(R::BL, 1); // quotient 0x100 does not fit in AL

    m.emulate(100);
    assert_eq!(0x0FFA, m.cpu.get_r16(R::SP));
    assert_eq!(0x0501, m.cpu.regs.ip);
}

#[test]
fn can_execute_shl_flag_semantics() {
    let mut m = com_machine(&[
        0xB0, 0x80, // mov al,0x80
        0xD0, 0xE0, // shl al,1
    ]);
    m.execute_instructions(2);
    assert_eq!(0x00, m.cpu.get_r8(R::AL));
    assert_eq!(true, m.cpu.regs.flags.carry);
    assert_eq!(true, m.cpu.regs.flags.overflow);
    assert_eq!(true, m.cpu.regs.flags.zero);
}

#[test]
fn can_execute_shr_sar() {
    let mut m = com_machine(&[
        0xB0, 0x81, // mov al,0x81
        0xD0, 0xE8, // shr al,1
    ]);
    m.execute_instructions(2);
    assert_eq!(0x40, m.cpu.get_r8(R::AL));
    assert_eq!(true, m.cpu.regs.flags.carry);
    assert_eq!(true, m.cpu.regs.flags.overflow); // original top bit

    let mut m = com_machine(&[
        0xB0, 0xF1, // mov al,0xf1
        0xD0, 0xF8, // sar al,1
    ]);
    m.execute_instructions(2);
    assert_eq!(0xF8, m.cpu.get_r8(R::AL));
    assert_eq!(true, m.cpu.regs.flags.carry);
    assert_eq!(false, m.cpu.regs.flags.overflow);
    // sign comes from bit 7 of the byte result
    assert_eq!(true, m.cpu.regs.flags.sign);
    assert_eq!(false, m.cpu.regs.flags.zero);
}

#[test]
fn sar_by_cl_saturates_to_sign() {
    let mut m = com_machine(&[
        0xB0, 0x80, // mov al,0x80
        0xB1, 0x0A, // mov cl,10
        0xD2, 0xF8, // sar al,cl
    ]);
    m.execute_instructions(3);
    assert_eq!(0xFF, m.cpu.get_r8(R::AL));
    assert_eq!(true, m.cpu.regs.flags.carry);
    assert_eq!(true, m.cpu.regs.flags.sign);
}

#[test]
fn can_execute_rotates() {
    let mut m = com_machine(&[
        0xB0, 0x81, // mov al,0x81
        0xD0, 0xC0, // rol al,1
    ]);
    m.execute_instructions(2);
    assert_eq!(0x03, m.cpu.get_r8(R::AL));
    assert_eq!(true, m.cpu.regs.flags.carry);
    assert_eq!(true, m.cpu.regs.flags.overflow);

    let mut m = com_machine(&[
        0xB0, 0x01, // mov al,0x1
        0xD0, 0xC8, // ror al,1
    ]);
    m.execute_instructions(2);
    assert_eq!(0x80, m.cpu.get_r8(R::AL));
    assert_eq!(true, m.cpu.regs.flags.carry);
    assert_eq!(true, m.cpu.regs.flags.overflow);
}

#[test]
fn can_execute_rotates_through_carry() {
    let mut m = com_machine(&[
        0xF8,       // clc
        0xB0, 0x80, // mov al,0x80
        0xD0, 0xD0, // rcl al,1
    ]);
    m.execute_instructions(3);
    assert_eq!(0x00, m.cpu.get_r8(R::AL));
    assert_eq!(true, m.cpu.regs.flags.carry);
    assert_eq!(true, m.cpu.regs.flags.overflow);

    let mut m = com_machine(&[
        0xF9,       // stc
        0xB0, 0x00, // mov al,0x0
        0xD0, 0xD8, // rcr al,1
    ]);
    m.execute_instructions(3);
    assert_eq!(0x80, m.cpu.get_r8(R::AL));
    assert_eq!(false, m.cpu.regs.flags.carry);
    assert_eq!(true, m.cpu.regs.flags.overflow);
}

#[test]
fn rcl16_rotates_through_seventeen_bits() {
    let mut m = com_machine(&[
        0xF9,             // stc
        0xB8, 0x00, 0x00, // mov ax,0x0
        0xB1, 0x11,       // mov cl,17
        0xD3, 0xD0,       // rcl ax,cl
    ]);
    // a 17 position rotate of the 17-bit value is a no-op
    m.execute_instructions(4);
    assert_eq!(0x0000, m.cpu.get_r16(R::AX));
    assert_eq!(true, m.cpu.regs.flags.carry);
}

#[test]
fn shift_count_of_zero_leaves_flags() {
    let mut m = com_machine(&[
        0xF9,       // stc
        0xB0, 0xFF, // mov al,0xff
        0xB1, 0x00, // mov cl,0
        0xD2, 0xE0, // shl al,cl
    ]);
    m.execute_instructions(4);
    assert_eq!(0xFF, m.cpu.get_r8(R::AL));
    assert_eq!(true, m.cpu.regs.flags.carry);
}

#[test]
fn can_execute_jcc() {
    // scenario: a zero result takes jz past the first hlt
    let mut m = com_machine(&[
        0xB8, 0x01, 0x00, // mov ax,0x1
        0x2D, 0x01, 0x00, // sub ax,0x1
        0x74, 0x04,       // jz +4
        0xB8, 0xAA, 0xAA, // mov ax,0xaaaa
        0xF4,             // hlt
        0xB8, 0x55, 0x55, // mov ax,0x5555
        0xF4,             // hlt
    ]);
    m.emulate(100);
    assert_eq!(0x5555, m.cpu.get_r16(R::AX));
    assert_eq!(true, m.cpu.regs.flags.zero);
}

#[test]
fn jcc_not_taken_falls_through() {
    let mut m = com_machine(&[
        0xB8, 0x02, 0x00, // mov ax,0x2
        0x2D, 0x01, 0x00, // sub ax,0x1
        0x74, 0x04,       // jz +4
        0xB8, 0xAA, 0xAA, // mov ax,0xaaaa
        0xF4,             // hlt
        0xB8, 0x55, 0x55, // mov ax,0x5555
        0xF4,             // hlt
    ]);
    m.emulate(100);
    assert_eq!(0xAAAA, m.cpu.get_r16(R::AX));
    assert_eq!(false, m.cpu.regs.flags.zero);
}

#[test]
fn signed_jcc_uses_sign_and_overflow() {
    // -1 < 1, jl taken
    let mut m = com_machine(&[
        0xB8, 0xFF, 0xFF, // mov ax,0xffff
        0x3D, 0x01, 0x00, // cmp ax,0x1
        0x7C, 0x01,       // jl +1
        0xF4,             // hlt
        0xB4, 0x42,       // mov ah,0x42
        0xF4,             // hlt
    ]);
    m.emulate(100);
    assert_eq!(0x42, m.cpu.get_r8(R::AH));
}

#[test]
fn can_execute_loop_and_jcxz() {
    let mut m = com_machine(&[
        0xB9, 0x03, 0x00, // mov cx,0x3
        0xB8, 0x00, 0x00, // mov ax,0x0
        0x40,             // inc ax
        0xE2, 0xFD,       // loop -3
        0xF4,             // hlt
    ]);
    m.emulate(100);
    assert_eq!(0x0003, m.cpu.get_r16(R::AX));
    assert_eq!(0x0000, m.cpu.get_r16(R::CX));

    let mut m = com_machine(&[
        0xB9, 0x00, 0x00, // mov cx,0x0
        0xE3, 0x03,       // jcxz +3
        0xB8, 0xAA, 0xAA, // mov ax,0xaaaa
        0xF4,             // hlt
    ]);
    m.emulate(100);
    assert_eq!(0x0000, m.cpu.get_r16(R::AX));
}

#[test]
fn can_execute_rep_movsb() {
    let mut m = raw_machine(&[
        0xF3, 0xA4, // rep movsb
        0xF4,       // hlt
    ]);
    m.cpu.set_r16(R::SI, 0x0100);
    m.cpu.set_r16(R::DI, 0x0200);
    m.cpu.set_r16(R::CX, 4);
    m.mmu.write(0, 0x0100, &[0xDE, 0xAD, 0xBE, 0xEF]);

    m.emulate(100);
    assert_eq!(vec![0xDE, 0xAD, 0xBE, 0xEF], m.mmu.read(0, 0x0200, 4));
    assert_eq!(0x0000, m.cpu.get_r16(R::CX));
    assert_eq!(0x0104, m.cpu.get_r16(R::SI));
    assert_eq!(0x0204, m.cpu.get_r16(R::DI));
}

#[test]
fn rep_with_zero_count_is_a_noop() {
    let mut m = raw_machine(&[
        0xF3, 0xA4, // rep movsb
        0xF4,       // hlt
    ]);
    m.cpu.set_r16(R::SI, 0x0100);
    m.cpu.set_r16(R::DI, 0x0200);
    m.cpu.set_r16(R::CX, 0);
    m.mmu.write(0, 0x0100, &[0xDE, 0xAD]);

    m.emulate(100);
    assert_eq!(vec![0x00, 0x00], m.mmu.read(0, 0x0200, 2));
    assert_eq!(0x0000, m.cpu.get_r16(R::CX));
    assert_eq!(0x0100, m.cpu.get_r16(R::SI));
}

#[test]
fn can_execute_rep_stosw() {
    let mut m = raw_machine(&[
        0xF3, 0xAB, // rep stosw
        0xF4,       // hlt
    ]);
    m.cpu.set_r16(R::AX, 0x1234);
    m.cpu.set_r16(R::DI, 0x0200);
    m.cpu.set_r16(R::CX, 3);

    m.emulate(100);
    assert_eq!(0x1234, m.mmu.read_u16(0, 0x0200));
    assert_eq!(0x1234, m.mmu.read_u16(0, 0x0202));
    assert_eq!(0x1234, m.mmu.read_u16(0, 0x0204));
    assert_eq!(0x0206, m.cpu.get_r16(R::DI));
    assert_eq!(0x0000, m.cpu.get_r16(R::CX));
}

#[test]
fn repne_scasb_stops_on_match() {
    let mut m = raw_machine(&[
        0xF2, 0xAE, // repne scasb
        0xF4,       // hlt
    ]);
    m.cpu.set_r8(R::AL, 0x42);
    m.cpu.set_r16(R::DI, 0x0200);
    m.cpu.set_r16(R::CX, 8);
    m.mmu.write(0, 0x0200, &[0x10, 0x20, 0x42, 0x99]);

    m.emulate(100);
    assert_eq!(true, m.cpu.regs.flags.zero);
    assert_eq!(0x0203, m.cpu.get_r16(R::DI)); // one past the match
    assert_eq!(0x0005, m.cpu.get_r16(R::CX));
}

#[test]
fn repe_cmpsb_compares_until_mismatch() {
    let mut m = raw_machine(&[
        0xF3, 0xA6, // repe cmpsb
        0xF4,       // hlt
    ]);
    m.cpu.set_r16(R::SI, 0x0100);
    m.cpu.set_r16(R::DI, 0x0200);
    m.cpu.set_r16(R::CX, 4);
    m.mmu.write(0, 0x0100, &[b'a', b'b', b'c', b'd']);
    m.mmu.write(0, 0x0200, &[b'a', b'b', b'x', b'd']);

    m.emulate(100);
    assert_eq!(false, m.cpu.regs.flags.zero);
    assert_eq!(0x0103, m.cpu.get_r16(R::SI));
    assert_eq!(0x0001, m.cpu.get_r16(R::CX));
}

#[test]
fn direction_flag_walks_backwards() {
    let mut m = raw_machine(&[
        0xFD,       // std
        0xA4,       // movsb
        0xF4,       // hlt
    ]);
    m.cpu.set_r16(R::SI, 0x0103);
    m.cpu.set_r16(R::DI, 0x0203);
    m.mmu.write_u8(0, 0x0103, 0x7E);

    m.emulate(100);
    assert_eq!(0x7E, m.mmu.read_u8(0, 0x0203));
    assert_eq!(0x0102, m.cpu.get_r16(R::SI));
    assert_eq!(0x0202, m.cpu.get_r16(R::DI));
}

#[test]
fn can_execute_lods_with_segment_override() {
    let mut m = raw_machine(&[
        0x26, 0xAC, // es: lodsb
        0xF4,       // hlt
    ]);
    m.cpu.set_r16(R::ES, 0x0040);
    m.cpu.set_r16(R::SI, 0x0010);
    m.mmu.write_u8(0x0040, 0x0010, 0x5A);

    m.emulate(100);
    assert_eq!(0x5A, m.cpu.get_r8(R::AL));
    assert_eq!(0x0011, m.cpu.get_r16(R::SI));
}

#[test]
fn can_execute_xchg_xlat() {
    let mut m = com_machine(&[
        0xB8, 0x11, 0x11, // mov ax,0x1111
        0xB9, 0x22, 0x22, // mov cx,0x2222
        0x91,             // xchg ax,cx
    ]);
    m.execute_instructions(3);
    assert_eq!(0x2222, m.cpu.get_r16(R::AX));
    assert_eq!(0x1111, m.cpu.get_r16(R::CX));

    let mut m = raw_machine(&[
        0xD7, // xlatb
        0xF4, // hlt
    ]);
    m.cpu.set_r16(R::BX, 0x0500);
    m.cpu.set_r8(R::AL, 0x05);
    m.mmu.write_u8(0, 0x0505, 0x99);
    m.emulate(100);
    assert_eq!(0x99, m.cpu.get_r8(R::AL));
}

#[test]
fn can_execute_lea_les_lds() {
    let mut m = com_machine(&[
        0xBD, 0x00, 0x10, // mov bp,0x1000
        0x8D, 0x46, 0xFC, // lea ax,[bp-0x4]
    ]);
    m.execute_instructions(2);
    assert_eq!(0x0FFC, m.cpu.get_r16(R::AX));

    let mut m = raw_machine(&[
        0xC4, 0x1E, 0x00, 0x04, // les bx,[0x400]
        0xC5, 0x0E, 0x00, 0x04, // lds cx,[0x400]
        0xF4,                   // hlt
    ]);
    m.mmu.write(0, 0x0400, &[0x78, 0x56, 0x34, 0x12]);
    m.emulate(100);
    assert_eq!(0x5678, m.cpu.get_r16(R::BX));
    assert_eq!(0x1234, m.cpu.get_r16(R::ES));
    assert_eq!(0x5678, m.cpu.get_r16(R::CX));
    assert_eq!(0x1234, m.cpu.get_r16(R::DS));
}

#[test]
fn bp_based_operands_default_to_stack_segment() {
    let mut m = raw_machine(&[
        0xC7, 0x46, 0x00, 0x34, 0x12, // mov word [bp+0x0],0x1234
        0xF4,                         // hlt
    ]);
    m.cpu.set_r16(R::SS, 0x0100);
    m.cpu.set_r16(R::BP, 0x0010);

    m.emulate(100);
    assert_eq!(0x1234, m.mmu.read_u16(0x0100, 0x0010));
}

#[test]
fn segment_override_redirects_direct_store() {
    let mut m = raw_machine(&[
        0x26, 0xA3, 0x00, 0x02, // mov [es:0x200],ax
        0xF4,                   // hlt
    ]);
    m.cpu.set_r16(R::ES, 0x0040);
    m.cpu.set_r16(R::AX, 0xBEEF);

    m.emulate(100);
    assert_eq!(0xBEEF, m.mmu.read_u16(0x0040, 0x0200));
    assert_eq!(0x0000, m.mmu.read_u16(0, 0x0200));
}

#[test]
fn can_execute_near_call_ret() {
    let mut m = com_machine(&[
        0xE8, 0x01, 0x00, // call +0x1 (0x104)
        0xF4,             // hlt
        0xC3,             // ret
    ]);
    m.emulate(100);
    assert_eq!(0x0104, m.cpu.regs.ip); // halted after hlt at 0x103
    assert_eq!(0xFFFE, m.cpu.get_r16(R::SP));
}

#[test]
fn ret_imm_releases_arguments() {
    let mut m = com_machine(&[
        0xB8, 0x77, 0x00, // mov ax,0x77
        0x50,             // push ax
        0xE8, 0x01, 0x00, // call +0x1 (0x108)
        0xF4,             // hlt
        0xC2, 0x02, 0x00, // ret 0x2
    ]);
    m.emulate(100);
    assert_eq!(0xFFFE, m.cpu.get_r16(R::SP));
}

#[test]
fn far_call_round_trips() {
    let mut m = raw_machine(&[
        0x9A, 0x00, 0x05, 0x00, 0x00, // call 0x0:0x500
        0xF4,                         // hlt
    ]);
    m.mmu.write_u8(0, 0x0500, 0xCB); // retf

    m.emulate(100);
    assert_eq!(0x0000, m.cpu.get_r16(R::CS));
    assert_eq!(0x0306, m.cpu.regs.ip); // one past the call, plus the hlt
    assert_eq!(0x1000, m.cpu.get_r16(R::SP));
}

#[test]
fn indirect_far_jump_loads_pointer_from_memory() {
    let mut m = raw_machine(&[
        0xFF, 0x2E, 0x00, 0x04, // jmp far [0x400]
    ]);
    m.mmu.write(0, 0x0400, &[0x00, 0x05, 0x40, 0x00]); // 0x0040:0x0500
    m.mmu.write_u8(0x0040, 0x0500, 0xF4); // hlt

    m.emulate(100);
    assert_eq!(0x0040, m.cpu.get_r16(R::CS));
    assert_eq!(0x0501, m.cpu.regs.ip);
}

#[test]
fn pushf_popf_round_trips_flags() {
    let mut m = com_machine(&[
        0xF9, // stc
        0xFD, // std
        0x9C, // pushf
        0xF8, // clc
        0xFC, // cld
        0x9D, // popf
    ]);
    m.execute_instructions(6);
    assert_eq!(true, m.cpu.regs.flags.carry);
    assert_eq!(true, m.cpu.regs.flags.direction);
    assert_eq!(0xFFFE, m.cpu.get_r16(R::SP));
}

#[test]
fn can_execute_sahf_lahf() {
    let mut m = com_machine(&[
        0xF9,       // stc
        0x9F,       // lahf
        0xF8,       // clc
        0x9E,       // sahf
    ]);
    m.execute_instructions(2);
    // bit 1 of the materialized byte is always set
    assert_eq!(0x03, m.cpu.get_r8(R::AH));
    m.execute_instructions(2);
    assert_eq!(true, m.cpu.regs.flags.carry);
}

#[test]
fn can_execute_cbw_cwd() {
    let mut m = com_machine(&[
        0xB0, 0x80, // mov al,0x80
        0x98,       // cbw
        0x99,       // cwd
    ]);
    m.execute_instructions(3);
    assert_eq!(0xFF80, m.cpu.get_r16(R::AX));
    assert_eq!(0xFFFF, m.cpu.get_r16(R::DX));
}

#[test]
fn can_execute_daa() {
    let mut m = com_machine(&[
        0xB0, 0x15, // mov al,0x15
        0x04, 0x27, // add al,0x27
        0x27,       // daa
    ]);
    m.execute_instructions(3);
    assert_eq!(0x42, m.cpu.get_r8(R::AL));
    assert_eq!(false, m.cpu.regs.flags.carry);
    assert_eq!(true, m.cpu.regs.flags.adjust);
}

#[test]
fn can_execute_aam_aad() {
    let mut m = com_machine(&[
        0xB0, 0x35, // mov al,53
        0xD4, 0x0A, // aam
        0xD5, 0x0A, // aad
    ]);
    m.execute_instructions(2);
    assert_eq!(0x05, m.cpu.get_r8(R::AH));
    assert_eq!(0x03, m.cpu.get_r8(R::AL));
    assert_eq!(true, m.cpu.regs.flags.parity);

    m.execute_instruction();
    assert_eq!(0x00, m.cpu.get_r8(R::AH));
    assert_eq!(53, m.cpu.get_r8(R::AL));
}

#[test]
fn aam_by_zero_leaves_state() {
    let mut m = com_machine(&[
        0xB8, 0x35, 0x12, // mov ax,0x1235
        0xD4, 0x00,       // aam 0
    ]);
    m.execute_instructions(2);
    assert_eq!(0x1235, m.cpu.get_r16(R::AX));
}

#[test]
fn int_dispatches_through_vector_and_iret_returns() {
    let mut m = raw_machine(&[
        0xFB,       // sti
        0xCD, 0x20, // int 0x20
        0xF4,       // hlt
    ]);
    m.mmu.write_vec(0x20, MemoryAddress::RealSegmentOffset(0, 0x0500));
    m.mmu.write(0, 0x0500, &[
        0xB8, 0x99, 0x00, // mov ax,0x99
        0xCF,             // iret
    ]);

    m.emulate(100);
    assert_eq!(0x0099, m.cpu.get_r16(R::AX));
    assert_eq!(0x0304, m.cpu.regs.ip); // resumed, then halted
    assert_eq!(0x1000, m.cpu.get_r16(R::SP));
    // iret restored the pre-interrupt interrupt flag
    assert_eq!(true, m.cpu.regs.flags.interrupt);
    assert_eq!(0x20, m.cpu.last_interrupt);
}

#[test]
fn int_clears_interrupt_and_trap_inside_handler() {
    let mut m = raw_machine(&[
        0xFB,       // sti
        0xCD, 0x21, // int 0x21
    ]);
    m.mmu.write_vec(0x21, MemoryAddress::RealSegmentOffset(0, 0x0500));
    m.mmu.write_u8(0, 0x0500, 0xF4); // hlt

    m.emulate(100);
    assert_eq!(false, m.cpu.regs.flags.interrupt);
    assert_eq!(false, m.cpu.regs.flags.trap);
}

struct DosServices;

impl Component for DosServices {
    fn int(&mut self, int: u8, cpu: &mut CPU, _mmu: &mut MMU) -> bool {
        if int != 0x21 {
            return false;
        }
        cpu.set_r16(R::AX, 0x1234);
        true
    }
}

#[test]
fn host_interrupt_stub_invokes_component() {
    let mut m = raw_machine(&[
        0xCD, 0x21, // int 0x21
        0xF4,       // hlt
    ]);
    m.add_component(Box::new(DosServices));
    // the host installs a stub at the vector target: dispatch + iret
    m.mmu.write_vec(0x21, MemoryAddress::RealSegmentOffset(0, 0x0400));
    m.mmu.write(0, 0x0400, &[0x69, 0xCF]);

    m.emulate(100);
    assert_eq!(0x1234, m.cpu.get_r16(R::AX));
    assert_eq!(0x0303, m.cpu.regs.ip); // resumed past the int, then halted
    assert_eq!(0x1000, m.cpu.get_r16(R::SP));
}

struct Uart {
    written: Rc<RefCell<Vec<(u16, u8)>>>,
}

impl Component for Uart {
    fn in_u8(&mut self, port: u16) -> Option<u8> {
        if port == 0x60 {
            Some(0x42)
        } else {
            None
        }
    }

    fn out_u8(&mut self, port: u16, data: u8) -> bool {
        if port == 0x3F8 {
            self.written.borrow_mut().push((port, data));
            true
        } else {
            false
        }
    }
}

#[test]
fn io_ports_are_served_by_components() {
    let written = Rc::new(RefCell::new(Vec::new()));
    let mut m = raw_machine(&[
        0xE4, 0x60,       // in al,0x60
        0xBA, 0xF8, 0x03, // mov dx,0x3f8
        0xEE,             // out dx,al
        0xF4,             // hlt
    ]);
    m.add_component(Box::new(Uart { written: Rc::clone(&written) }));

    m.emulate(100);
    assert_eq!(0x42, m.cpu.get_r8(R::AL));
    assert_eq!(vec![(0x3F8, 0x42)], *written.borrow());
}

#[test]
fn unhandled_in_reads_zero() {
    let mut m = raw_machine(&[
        0xB0, 0xFF, // mov al,0xff
        0xE4, 0x60, // in al,0x60
        0xF4,       // hlt
    ]);
    m.emulate(100);
    assert_eq!(0x00, m.cpu.get_r8(R::AL));
}

#[test]
fn scenario_immediate_arithmetic() {
    let mut m = com_machine(&[
        0xB8, 0x34, 0x12, // mov ax,0x1234
        0x05, 0x01, 0x00, // add ax,0x1
        0xF4,             // hlt
    ]);
    let executed = m.emulate(100);
    assert_eq!(3, executed);
    assert_eq!(0x1235, m.cpu.get_r16(R::AX));
    assert_eq!(false, m.cpu.regs.flags.carry);
    assert_eq!(false, m.cpu.regs.flags.overflow);
    assert_eq!(false, m.cpu.regs.flags.zero);
    assert_eq!(false, m.cpu.regs.flags.sign);
    assert_eq!(true, m.cpu.regs.flags.parity);
}

#[test]
fn emulate_honors_instruction_budget() {
    let mut m = com_machine(&[
        0x90, 0x90, 0x90, 0x90, // 4 x nop
        0xF4,                   // hlt
    ]);
    let executed = m.emulate(2);
    assert_eq!(2, executed);
    assert_eq!(0x102, m.cpu.regs.ip);

    let executed = m.emulate(100);
    assert_eq!(3, executed);
    assert_eq!(true, m.cpu.halted);
}

#[test]
fn end_emulation_stops_at_instruction_boundary() {
    let mut m = com_machine(&[
        0xB8, 0x34, 0x12, // mov ax,0x1234
        0xF4,             // hlt
    ]);
    m.end_emulation();
    assert_eq!(0, m.emulate(100));

    // the request is consumed, a new run proceeds
    assert_eq!(2, m.emulate(100));
    assert_eq!(0x1234, m.cpu.get_r16(R::AX));
}

#[test]
fn abort_handle_is_shared() {
    let mut m = com_machine(&[0x90, 0xF4]);
    let handle = m.abort_handle();
    handle.store(true, std::sync::atomic::Ordering::SeqCst);
    assert_eq!(0, m.emulate(100));
}

#[test]
fn invalid_opcode_is_fatal_by_default() {
    let mut m = raw_machine(&[0x0F]);
    let executed = m.emulate(100);
    assert_eq!(0, executed);
    assert_eq!(true, m.cpu.fatal_error);
}

#[test]
fn invalid_opcode_can_raise_vector_six() {
    let mut m = raw_machine(&[0x0F]);
    m.invalid_op = InvalidOpcodePolicy::Interrupt;
    m.mmu.write_vec(6, MemoryAddress::RealSegmentOffset(0, 0x0500));
    m.mmu.write_u8(0, 0x0500, 0xF4); // hlt

    m.emulate(100);
    assert_eq!(false, m.cpu.fatal_error);
    assert_eq!(0x0501, m.cpu.regs.ip);
    // the return address points at the faulting opcode
    assert_eq!(0x0300, m.mmu.read_u16(0, 0x0FFA));
}

#[test]
fn hlt_notifies_components() {
    struct HaltWatch {
        halted: Rc<RefCell<bool>>,
    }
    impl Component for HaltWatch {
        fn hlt(&mut self) {
            *self.halted.borrow_mut() = true;
        }
    }

    let halted = Rc::new(RefCell::new(false));
    let mut m = com_machine(&[0xF4]);
    m.add_component(Box::new(HaltWatch { halted: Rc::clone(&halted) }));
    m.emulate(100);
    assert_eq!(true, *halted.borrow());
}
