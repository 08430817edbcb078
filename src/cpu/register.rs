use std::fmt;

use crate::cpu::flag::Flags;

#[cfg(test)]
#[path = "./register_test.rs"]
mod register_test;

#[derive(Copy, Clone, Default)]
pub struct Register16 {
    pub val: u16,
}

impl Register16 {
    pub fn set_hi(&mut self, val: u8) {
        self.val = (self.val & 0x00FF) | (u16::from(val) << 8);
    }
    pub fn set_lo(&mut self, val: u8) {
        self.val = (self.val & 0xFF00) | u16::from(val);
    }
    pub fn lo_u8(&self) -> u8 {
        (self.val & 0xFF) as u8
    }
    pub fn hi_u8(&self) -> u8 {
        (self.val >> 8) as u8
    }
}

/// a 8086 register operand
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum R {
    AL, CL, DL, BL, AH, CH, DH, BH,
    AX, CX, DX, BX, SP, BP, SI, DI,
    ES, CS, SS, DS,
}

impl fmt::Display for R {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl R {
    pub fn as_str(&self) -> &'static str {
        match *self {
            R::AL => "al", R::CL => "cl", R::DL => "dl", R::BL => "bl",
            R::AH => "ah", R::CH => "ch", R::DH => "dh", R::BH => "bh",
            R::AX => "ax", R::CX => "cx", R::DX => "dx", R::BX => "bx",
            R::SP => "sp", R::BP => "bp", R::SI => "si", R::DI => "di",
            R::ES => "es", R::CS => "cs", R::SS => "ss", R::DS => "ds",
        }
    }
}

/// maps a ModR/M reg field to a 8-bit register operand
pub fn r8(val: u8) -> R {
    match val {
        0 => R::AL,
        1 => R::CL,
        2 => R::DL,
        3 => R::BL,
        4 => R::AH,
        5 => R::CH,
        6 => R::DH,
        7 => R::BH,
        _ => unreachable!(),
    }
}

/// maps a ModR/M reg field to a 16-bit register operand
pub fn r16(val: u8) -> R {
    match val {
        0 => R::AX,
        1 => R::CX,
        2 => R::DX,
        3 => R::BX,
        4 => R::SP,
        5 => R::BP,
        6 => R::SI,
        7 => R::DI,
        _ => unreachable!(),
    }
}

/// maps a ModR/M reg field to a segment register operand
pub fn sr(val: u8) -> R {
    match val & 3 {
        0 => R::ES,
        1 => R::CS,
        2 => R::SS,
        3 => R::DS,
        _ => unreachable!(),
    }
}

/// 16 bit addressing mode of a memory operand
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum AMode {
    BXSI, BXDI, BPSI, BPDI, SI, DI, BP, BX,
}

impl AMode {
    pub fn as_str(&self) -> &'static str {
        match *self {
            AMode::BXSI => "bx+si",
            AMode::BXDI => "bx+di",
            AMode::BPSI => "bp+si",
            AMode::BPDI => "bp+di",
            AMode::SI => "si",
            AMode::DI => "di",
            AMode::BP => "bp",
            AMode::BX => "bx",
        }
    }
}

/// maps a ModR/M rm field to a 16 bit addressing mode
pub fn amode(val: u8) -> AMode {
    match val {
        0 => AMode::BXSI,
        1 => AMode::BXDI,
        2 => AMode::BPSI,
        3 => AMode::BPDI,
        4 => AMode::SI,
        5 => AMode::DI,
        6 => AMode::BP,
        7 => AMode::BX,
        _ => unreachable!(),
    }
}

/// the architectural register file: general purpose registers,
/// segment registers, instruction pointer and flags
#[derive(Clone)]
pub struct RegisterState {
    /// AX, CX, DX, BX, SP, BP, SI, DI
    gpr: [Register16; 8],

    /// ES, CS, SS, DS
    sreg: [u16; 4],

    pub ip: u16,
    pub flags: Flags,
}

impl RegisterState {
    pub fn default() -> Self {
        RegisterState {
            gpr: [Register16::default(); 8],
            sreg: [0; 4],
            ip: 0,
            flags: Flags::default(),
        }
    }

    pub fn get_r8(&self, r: R) -> u8 {
        match r {
            R::AL => self.gpr[0].lo_u8(),
            R::CL => self.gpr[1].lo_u8(),
            R::DL => self.gpr[2].lo_u8(),
            R::BL => self.gpr[3].lo_u8(),
            R::AH => self.gpr[0].hi_u8(),
            R::CH => self.gpr[1].hi_u8(),
            R::DH => self.gpr[2].hi_u8(),
            R::BH => self.gpr[3].hi_u8(),
            _ => panic!("get_r8 with word register {:?}", r),
        }
    }

    pub fn set_r8(&mut self, r: R, val: u8) {
        match r {
            R::AL => self.gpr[0].set_lo(val),
            R::CL => self.gpr[1].set_lo(val),
            R::DL => self.gpr[2].set_lo(val),
            R::BL => self.gpr[3].set_lo(val),
            R::AH => self.gpr[0].set_hi(val),
            R::CH => self.gpr[1].set_hi(val),
            R::DH => self.gpr[2].set_hi(val),
            R::BH => self.gpr[3].set_hi(val),
            _ => panic!("set_r8 with word register {:?}", r),
        }
    }

    pub fn get_r16(&self, r: R) -> u16 {
        match r {
            R::AX => self.gpr[0].val,
            R::CX => self.gpr[1].val,
            R::DX => self.gpr[2].val,
            R::BX => self.gpr[3].val,
            R::SP => self.gpr[4].val,
            R::BP => self.gpr[5].val,
            R::SI => self.gpr[6].val,
            R::DI => self.gpr[7].val,
            R::ES => self.sreg[0],
            R::CS => self.sreg[1],
            R::SS => self.sreg[2],
            R::DS => self.sreg[3],
            _ => panic!("get_r16 with byte register {:?}", r),
        }
    }

    pub fn set_r16(&mut self, r: R, val: u16) {
        match r {
            R::AX => self.gpr[0].val = val,
            R::CX => self.gpr[1].val = val,
            R::DX => self.gpr[2].val = val,
            R::BX => self.gpr[3].val = val,
            R::SP => self.gpr[4].val = val,
            R::BP => self.gpr[5].val = val,
            R::SI => self.gpr[6].val = val,
            R::DI => self.gpr[7].val = val,
            R::ES => self.sreg[0] = val,
            R::CS => self.sreg[1] = val,
            R::SS => self.sreg[2] = val,
            R::DS => self.sreg[3] = val,
            _ => panic!("set_r16 with byte register {:?}", r),
        }
    }
}
