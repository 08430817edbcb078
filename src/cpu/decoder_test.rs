use pretty_assertions::assert_eq;

use crate::cpu::{AMode, Decoder, Instruction, Invalid, Op, Parameter, R, RepeatMode, Segment};
use crate::memory::MMU;

fn decode_single(code: &[u8]) -> Instruction {
    let mut mmu = MMU::default();
    mmu.write(0x085F, 0x100, code);
    let mut decoder = Decoder::default();
    decoder.get_instruction(&mmu, 0x085F, 0x100)
}

#[test]
fn can_decode_mov_imm() {
    let op = decode_single(&[0xB8, 0x23, 0x01]); // mov ax,0x123
    assert_eq!(Op::Mov16, op.command);
    assert_eq!(Parameter::Reg16(R::AX), op.params.dst);
    assert_eq!(Parameter::Imm16(0x0123), op.params.src);
    assert_eq!(3, op.length);

    let op = decode_single(&[0xB4, 0xFF]); // mov ah,0xff
    assert_eq!(Op::Mov8, op.command);
    assert_eq!(Parameter::Reg8(R::AH), op.params.dst);
    assert_eq!(Parameter::Imm8(0xFF), op.params.src);
    assert_eq!(2, op.length);
}

#[test]
fn can_decode_modrm_memory_operands() {
    let op = decode_single(&[0x8A, 0x27]); // mov ah,[bx]
    assert_eq!(Op::Mov8, op.command);
    assert_eq!(Parameter::Reg8(R::AH), op.params.dst);
    assert_eq!(Parameter::Ptr8Amode(Segment::Default, AMode::BX), op.params.src);
    assert_eq!(2, op.length);

    let op = decode_single(&[0x8B, 0x46, 0xFC]); // mov ax,[bp-0x4]
    assert_eq!(Op::Mov16, op.command);
    assert_eq!(Parameter::Ptr16AmodeS8(Segment::Default, AMode::BP, -4), op.params.src);
    assert_eq!(3, op.length);

    let op = decode_single(&[0x8B, 0x94, 0x34, 0x12]); // mov dx,[si+0x1234]
    assert_eq!(Parameter::Ptr16AmodeS16(Segment::Default, AMode::SI, 0x1234), op.params.src);
    assert_eq!(4, op.length);

    let op = decode_single(&[0x8B, 0x1E, 0x34, 0x12]); // mov bx,[0x1234]
    assert_eq!(Parameter::Ptr16(Segment::Default, 0x1234), op.params.src);
    assert_eq!(4, op.length);
}

#[test]
fn can_decode_segment_prefixed_operand() {
    let op = decode_single(&[0x26, 0x8B, 0x0E, 0x34, 0x12]); // mov cx,[es:0x1234]
    assert_eq!(Op::Mov16, op.command);
    assert_eq!(Segment::ES, op.segment_prefix);
    assert_eq!(Parameter::Ptr16(Segment::ES, 0x1234), op.params.src);
    assert_eq!(5, op.length);
}

#[test]
fn resolves_short_jump_targets() {
    // targets are relative to the next instruction's offset
    let op = decode_single(&[0x74, 0x03]); // jz +3
    assert_eq!(Op::Jz, op.command);
    assert_eq!(Parameter::Imm16(0x0105), op.params.dst);

    let op = decode_single(&[0xEB, 0xFE]); // jmp short $
    assert_eq!(Op::JmpShort, op.command);
    assert_eq!(Parameter::Imm16(0x0100), op.params.dst);
}

#[test]
fn classifies_repeat_prefixes() {
    let op = decode_single(&[0xF3, 0xA4]); // rep movsb
    assert_eq!(Op::Movsb, op.command);
    assert_eq!(RepeatMode::Rep, op.repeat);
    assert_eq!(2, op.length);

    // repne on movs repeats like rep, some dos-era linkers emit it
    let op = decode_single(&[0xF2, 0xA4]);
    assert_eq!(Op::Movsb, op.command);
    assert_eq!(RepeatMode::Rep, op.repeat);

    let op = decode_single(&[0xF3, 0xA6]); // repe cmpsb
    assert_eq!(Op::Cmpsb, op.command);
    assert_eq!(RepeatMode::Repe, op.repeat);

    let op = decode_single(&[0xF2, 0xAE]); // repne scasb
    assert_eq!(Op::Scasb, op.command);
    assert_eq!(RepeatMode::Repne, op.repeat);

    // a repeat prefix on a non-string opcode is ignored
    let op = decode_single(&[0xF3, 0x90]);
    assert_eq!(Op::Nop, op.command);
    assert_eq!(RepeatMode::None, op.repeat);
}

#[test]
fn can_decode_segment_register_moves() {
    let op = decode_single(&[0x8E, 0xD8]); // mov ds,ax
    assert_eq!(Op::Mov16, op.command);
    assert_eq!(Parameter::SReg16(R::DS), op.params.dst);
    assert_eq!(Parameter::Reg16(R::AX), op.params.src);

    let op = decode_single(&[0x8C, 0xC0]); // mov ax,es
    assert_eq!(Op::Mov16, op.command);
    assert_eq!(Parameter::Reg16(R::AX), op.params.dst);
    assert_eq!(Parameter::SReg16(R::ES), op.params.src);
}

#[test]
fn can_decode_arith_group_with_sign_extended_imm() {
    let op = decode_single(&[0x83, 0xC0, 0xFF]); // add ax,byte -0x1
    assert_eq!(Op::Add16, op.command);
    assert_eq!(Parameter::Reg16(R::AX), op.params.dst);
    assert_eq!(Parameter::ImmS8(-1), op.params.src);
    assert_eq!(3, op.length);

    let op = decode_single(&[0x80, 0xF6, 0x55]); // xor dh,0x55
    assert_eq!(Op::Xor8, op.command);
    assert_eq!(Parameter::Reg8(R::DH), op.params.dst);
    assert_eq!(Parameter::Imm8(0x55), op.params.src);
}

#[test]
fn can_decode_far_transfers() {
    let op = decode_single(&[0x9A, 0x34, 0x12, 0x00, 0x20]); // call 0x2000:0x1234
    assert_eq!(Op::CallFar, op.command);
    assert_eq!(Parameter::Ptr16Imm(0x2000, 0x1234), op.params.dst);
    assert_eq!(5, op.length);

    let op = decode_single(&[0xEA, 0x00, 0x01, 0x5F, 0x08]); // jmp 0x085F:0x100
    assert_eq!(Op::JmpFar, op.command);
    assert_eq!(Parameter::Ptr16Imm(0x085F, 0x0100), op.params.dst);
}

#[test]
fn undefined_shift_reg_is_invalid() {
    let op = decode_single(&[0xD0, 0xF0]); // reg field 6 of the shift group
    assert_eq!(Op::Invalid(vec![0xD0, 0xF0], Invalid::Reg(6)), op.command);
}

#[test]
fn lock_prefix_is_recorded() {
    let op = decode_single(&[0xF0, 0xFF, 0x06, 0x34, 0x12]); // lock inc word [0x1234]
    assert_eq!(Op::Inc16, op.command);
    assert_eq!(true, op.lock);
    assert_eq!(5, op.length);
}

#[test]
fn can_decode_shift_by_cl() {
    let op = decode_single(&[0xD2, 0xE0]); // shl al,cl
    assert_eq!(Op::Shl8, op.command);
    assert_eq!(Parameter::Reg8(R::AL), op.params.dst);
    assert_eq!(Parameter::Reg8(R::CL), op.params.src);
}

#[test]
fn host_interrupt_stub_decodes() {
    let op = decode_single(&[0x69]);
    assert_eq!(Op::HostInterrupt, op.command);
    assert_eq!(1, op.length);
}

#[test]
fn instruction_info_renders_bytes_and_disassembly() {
    let mut mmu = MMU::default();
    mmu.write(0x085F, 0x100, &[0xB8, 0x23, 0x01]);
    let mut decoder = Decoder::default();
    let info = decoder.get_instruction_info(&mmu, 0x085F, 0x100);
    assert_eq!(vec![0xB8, 0x23, 0x01], info.bytes);
    assert_eq!(
        "[085F:0100] B82301           Mov16    ax, 0x0123",
        format!("{}", info)
    );
}
