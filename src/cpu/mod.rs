// these modules are re-exported as a single module

pub use self::decoder::*;
mod decoder;

pub use self::flag::*;
mod flag;

pub use self::instruction::*;
mod instruction;

pub use self::op::*;
mod op;

pub use self::parameter::*;
mod parameter;

pub use self::register::*;
mod register;

pub use self::segment::*;
mod segment;

use std::num::Wrapping;

use crate::memory::{MemoryAddress, MMU};

pub struct CPU {
    pub instruction_count: usize,

    /// general purpose registers, segment registers, ip, flags
    pub regs: RegisterState,

    /// set by HLT, ends the execution loop
    pub halted: bool,

    /// signals that execution cannot continue (bad opcode)
    pub fatal_error: bool,

    /// vector of the most recent INT, kept for the host callback
    pub last_interrupt: u8,

    pub decoder: Decoder,
}

impl CPU {
    pub fn default() -> Self {
        CPU {
            instruction_count: 0,
            regs: RegisterState::default(),
            halted: false,
            fatal_error: false,
            last_interrupt: 0,
            decoder: Decoder::default(),
        }
    }

    pub fn get_r8(&self, r: R) -> u8 {
        self.regs.get_r8(r)
    }

    pub fn set_r8(&mut self, r: R, val: u8) {
        self.regs.set_r8(r, val);
    }

    pub fn get_r16(&self, r: R) -> u16 {
        self.regs.get_r16(r)
    }

    pub fn set_r16(&mut self, r: R, val: u16) {
        self.regs.set_r16(r, val);
    }

    /// returns the absolute address of CS:IP
    pub fn get_address(&self) -> u32 {
        MemoryAddress::RealSegmentOffset(self.get_r16(R::CS), self.regs.ip).value()
    }

    /// returns "segment, offset" of CS:IP
    pub fn get_address_pair(&self) -> (u16, u16) {
        (self.get_r16(R::CS), self.regs.ip)
    }

    /// transfers control to the interrupt vector, 8086 style: FLAGS, CS
    /// and the return IP go on the stack, I and T are cleared
    pub fn execute_interrupt(&mut self, mmu: &mut MMU, int: u8) {
        self.last_interrupt = int;

        let flags = self.regs.flags.u16();
        self.push16(mmu, flags);
        self.regs.flags.interrupt = false;
        self.regs.flags.trap = false;

        let (cs, ip) = self.get_address_pair();
        self.push16(mmu, cs);
        self.push16(mmu, ip);

        let (new_ip, new_cs) = mmu.read_vec(int);
        self.regs.ip = new_ip;
        self.set_r16(R::CS, new_cs);
    }

    /// compares dst with src, updating C, O, S, Z, A and P
    pub fn cmp8(&mut self, dst: usize, src: usize) {
        let res = (Wrapping(dst) - Wrapping(src)).0;
        self.regs.flags.set_carry_u8(res);
        self.regs.flags.set_overflow_sub_u8(res, src, dst);
        self.regs.flags.set_sign_u8(res);
        self.regs.flags.set_zero_u8(res);
        self.regs.flags.set_adjust(res, src, dst);
        self.regs.flags.set_parity(res);
    }

    pub fn cmp16(&mut self, dst: usize, src: usize) {
        let res = (Wrapping(dst) - Wrapping(src)).0;
        self.regs.flags.set_carry_u16(res);
        self.regs.flags.set_overflow_sub_u16(res, src, dst);
        self.regs.flags.set_sign_u16(res);
        self.regs.flags.set_zero_u16(res);
        self.regs.flags.set_adjust(res, src, dst);
        self.regs.flags.set_parity(res);
    }

    pub fn push16(&mut self, mmu: &mut MMU, data: u16) {
        let sp = self.get_r16(R::SP).wrapping_sub(2);
        self.set_r16(R::SP, sp);
        let ss = self.get_r16(R::SS);
        mmu.write_u16(ss, sp, data);
    }

    pub fn pop16(&mut self, mmu: &mut MMU) -> u16 {
        let sp = self.get_r16(R::SP);
        let data = mmu.read_u16(self.get_r16(R::SS), sp);
        self.set_r16(R::SP, sp.wrapping_add(2));
        data
    }

    /// returns the value of the given segment register
    pub fn segment(&self, seg: Segment) -> u16 {
        self.get_r16(seg.as_register())
    }

    /// returns the segment value for a ModR/M memory operand, honoring
    /// the BP-based default of SS
    fn amode_segment(&self, seg: Segment, amode: &AMode) -> u16 {
        match seg {
            Segment::Default => match *amode {
                AMode::BPSI | AMode::BPDI | AMode::BP => self.get_r16(R::SS),
                _ => self.get_r16(R::DS),
            },
            _ => self.segment(seg),
        }
    }

    /// effective offset of a 16 bit addressing mode
    pub fn amode(&self, amode: &AMode) -> u16 {
        match *amode {
            AMode::BXSI => self.get_r16(R::BX).wrapping_add(self.get_r16(R::SI)),
            AMode::BXDI => self.get_r16(R::BX).wrapping_add(self.get_r16(R::DI)),
            AMode::BPSI => self.get_r16(R::BP).wrapping_add(self.get_r16(R::SI)),
            AMode::BPDI => self.get_r16(R::BP).wrapping_add(self.get_r16(R::DI)),
            AMode::SI => self.get_r16(R::SI),
            AMode::DI => self.get_r16(R::DI),
            AMode::BP => self.get_r16(R::BP),
            AMode::BX => self.get_r16(R::BX),
        }
    }

    /// segment:offset location of a memory operand
    fn get_parameter_addr(&self, p: &Parameter) -> (u16, u16) {
        match *p {
            Parameter::Ptr8(seg, imm) |
            Parameter::Ptr16(seg, imm) => (self.segment(seg), imm),
            Parameter::Ptr8Amode(seg, ref amode) |
            Parameter::Ptr16Amode(seg, ref amode) => {
                (self.amode_segment(seg, amode), self.amode(amode))
            }
            Parameter::Ptr8AmodeS8(seg, ref amode, imm) |
            Parameter::Ptr16AmodeS8(seg, ref amode, imm) => {
                (self.amode_segment(seg, amode), self.amode(amode).wrapping_add(imm as u16))
            }
            Parameter::Ptr8AmodeS16(seg, ref amode, imm) |
            Parameter::Ptr16AmodeS16(seg, ref amode, imm) => {
                (self.amode_segment(seg, amode), self.amode(amode).wrapping_add(imm as u16))
            }
            _ => panic!("get_parameter_addr on non-memory parameter {:?}", p),
        }
    }

    /// used by lds, les and the indirect far jumps and calls, reads the
    /// offset:segment pair a memory operand points at
    pub fn read_segment_selector(&self, mmu: &MMU, p: &Parameter) -> (u16, u16) {
        let (segment, offset) = self.get_parameter_addr(p);
        let o_val = mmu.read_u16(segment, offset);
        let s_val = mmu.read_u16(segment, offset.wrapping_add(2));
        (s_val, o_val)
    }

    /// returns the effective address of a pointer, used by LEA
    pub fn read_parameter_address(&mut self, p: &Parameter) -> u16 {
        match *p {
            Parameter::Ptr16Amode(_, ref amode) => self.amode(amode),
            Parameter::Ptr16AmodeS8(_, ref amode, imm) => self.amode(amode).wrapping_add(imm as u16),
            Parameter::Ptr16AmodeS16(_, ref amode, imm) => self.amode(amode).wrapping_add(imm as u16),
            Parameter::Ptr16(_, imm) => imm,
            _ => panic!("unhandled parameter: {:?} at {:06X}", p, self.get_address()),
        }
    }

    pub fn read_parameter_imm(&self, p: &Parameter) -> usize {
        match *p {
            Parameter::Imm8(imm) => imm as usize,
            Parameter::Imm16(imm) => imm as usize,
            Parameter::ImmS8(imm) => imm as i16 as u16 as usize,
            _ => panic!("read_parameter_imm only allows imm-type params: {:?}", p),
        }
    }

    pub fn read_parameter_value(&mut self, mmu: &MMU, p: &Parameter) -> usize {
        match *p {
            Parameter::Imm8(imm) => imm as usize,
            Parameter::Imm16(imm) => imm as usize,
            Parameter::ImmS8(imm) => imm as i16 as u16 as usize,
            Parameter::Reg8(r) => self.get_r8(r) as usize,
            Parameter::Reg16(r) |
            Parameter::SReg16(r) => self.get_r16(r) as usize,
            Parameter::Ptr8(_, _) |
            Parameter::Ptr8Amode(_, _) |
            Parameter::Ptr8AmodeS8(_, _, _) |
            Parameter::Ptr8AmodeS16(_, _, _) => {
                let (seg, offset) = self.get_parameter_addr(p);
                mmu.read_u8(seg, offset) as usize
            }
            Parameter::Ptr16(_, _) |
            Parameter::Ptr16Amode(_, _) |
            Parameter::Ptr16AmodeS8(_, _, _) |
            Parameter::Ptr16AmodeS16(_, _, _) => {
                let (seg, offset) = self.get_parameter_addr(p);
                mmu.read_u16(seg, offset) as usize
            }
            _ => {
                let (seg, off) = self.get_address_pair();
                panic!("unhandled parameter: {:?} at {:04X}:{:04X}", p, seg, off);
            }
        }
    }

    pub fn write_parameter_u8(&mut self, mmu: &mut MMU, p: &Parameter, data: u8) {
        match *p {
            Parameter::Reg8(r) => self.set_r8(r, data),
            Parameter::Ptr8(_, _) |
            Parameter::Ptr8Amode(_, _) |
            Parameter::Ptr8AmodeS8(_, _, _) |
            Parameter::Ptr8AmodeS16(_, _, _) => {
                let (seg, offset) = self.get_parameter_addr(p);
                mmu.write_u8(seg, offset, data);
            }
            _ => panic!("write_parameter_u8 unhandled type {:?} at {:06X}", p, self.get_address()),
        }
    }

    pub fn write_parameter_u16(&mut self, mmu: &mut MMU, p: &Parameter, data: u16) {
        match *p {
            Parameter::Reg16(r) |
            Parameter::SReg16(r) => self.set_r16(r, data),
            Parameter::Ptr16(_, _) |
            Parameter::Ptr16Amode(_, _) |
            Parameter::Ptr16AmodeS8(_, _, _) |
            Parameter::Ptr16AmodeS16(_, _, _) => {
                let (seg, offset) = self.get_parameter_addr(p);
                mmu.write_u16(seg, offset, data);
            }
            _ => panic!("write_parameter_u16 unhandled type {:?} at {:06X}", p, self.get_address()),
        }
    }

    /// used by aaa, aas
    pub fn adjb(&mut self, param1: i8, param2: i8) {
        if self.regs.flags.adjust || (self.get_r8(R::AL) & 0xF) > 9 {
            let al = (i16::from(self.get_r8(R::AL)) + i16::from(param1)) as u8;
            let ah = (i16::from(self.get_r8(R::AH)) + i16::from(param2)) as u8;
            self.set_r8(R::AL, al);
            self.set_r8(R::AH, ah);
            self.regs.flags.adjust = true;
            self.regs.flags.carry = true;
        } else {
            self.regs.flags.adjust = false;
            self.regs.flags.carry = false;
        }
        let al = self.get_r8(R::AL);
        self.set_r8(R::AL, al & 0x0F);
    }

    /// used by daa, das
    pub fn adj4(&mut self, param1: i16, param2: i16) {
        let mut al = self.get_r8(R::AL);
        if ((al & 0x0F) > 0x09) || self.regs.flags.adjust {
            if (al > 0x99) || self.regs.flags.carry {
                al = (i16::from(al) + param2) as u8;
                self.regs.flags.carry = true;
            } else {
                self.regs.flags.carry = false;
            }
            al = (i16::from(al) + param1) as u8;
            self.regs.flags.adjust = true;
        } else {
            if (al > 0x99) || self.regs.flags.carry {
                al = (i16::from(al) + param2) as u8;
                self.regs.flags.carry = true;
            } else {
                self.regs.flags.carry = false;
            }
            self.regs.flags.adjust = false;
        }
        self.set_r8(R::AL, al);
        self.regs.flags.sign = al & 0x80 != 0;
        self.regs.flags.zero = al == 0;
        self.regs.flags.set_parity(al as usize);
    }
}
