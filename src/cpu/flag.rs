#[cfg(test)]
#[path = "./flag_test.rs"]
mod flag_test;

// https://en.wikipedia.org/wiki/FLAGS_register
#[derive(Copy, Clone, Default)]
pub struct Flags {
    // ____ O___ SZ_A _P_C
    pub carry: bool,     // 0: carry flag
    pub parity: bool,    // 2: parity flag
    pub adjust: bool,    // 4: auxiliary carry flag (AF)
    pub zero: bool,      // 6: zero flag
    pub sign: bool,      // 7: sign flag
    pub trap: bool,      // 8: trap flag (single step)
    pub interrupt: bool, // 9: interrupt flag
    pub direction: bool, // 10: direction flag (control with cld, std)
    pub overflow: bool,  // 11: overflow flag
}

const FLAG_CF: u16 = 0x0001;
const FLAG_PF: u16 = 0x0004;
const FLAG_AF: u16 = 0x0010;
const FLAG_ZF: u16 = 0x0040;
const FLAG_SF: u16 = 0x0080;
const FLAG_TF: u16 = 0x0100;
const FLAG_IF: u16 = 0x0200;
const FLAG_DF: u16 = 0x0400;
const FLAG_OF: u16 = 0x0800;

/// bit 1 is always set, bits 12-15 always read as set on the 8086
const FLAGS_FIXED: u16 = 0xF002;

static PARITY_LOOKUP: [u16; 256] = [
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF,
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF,
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF
];

impl Flags {
    pub fn set_sign_u8(&mut self, v: usize) {
        // Set equal to the most-significant bit of the result,
        // which is the sign bit of a signed integer.
        self.sign = v & 0x80 != 0;
    }

    pub fn set_sign_u16(&mut self, v: usize) {
        self.sign = v & 0x8000 != 0;
    }

    pub fn set_parity(&mut self, v: usize) {
        // Set if the least-significant byte of the result contains an
        // even number of 1 bits; cleared otherwise.
        self.parity = PARITY_LOOKUP[v & 0xFF] != 0
    }

    pub fn set_zero_u8(&mut self, v: usize) {
        // Set if the result is zero; cleared otherwise.
        self.zero = v.trailing_zeros() >= 8;
    }

    pub fn set_zero_u16(&mut self, v: usize) {
        self.zero = v.trailing_zeros() >= 16;
    }

    pub fn set_adjust(&mut self, res: usize, v1: usize, v2: usize) {
        // Set if an arithmetic operation generates a carry or a borrow out
        // of bit 3 of the result; cleared otherwise. This flag is used in
        // binary-coded decimal (BCD) arithmetic.
        self.adjust = (res ^ (v1 ^ v2)) & 0x10 != 0;
    }

    pub fn set_overflow_add_u8(&mut self, res: usize, v1: usize, v2: usize) {
        // Set if the integer result is too large a positive number or too
        // small a negative number (excluding the sign-bit) to fit in the
        // destination operand; cleared otherwise.
        self.overflow = (res ^ v1) & (res ^ v2) & 0x80 != 0;
    }

    pub fn set_overflow_add_u16(&mut self, res: usize, v1: usize, v2: usize) {
        self.overflow = (res ^ v1) & (res ^ v2) & 0x8000 != 0;
    }

    pub fn set_overflow_sub_u8(&mut self, res: usize, v1: usize, v2: usize) {
        self.overflow = (v2 ^ v1) & (v2 ^ res) & 0x80 != 0;
    }

    pub fn set_overflow_sub_u16(&mut self, res: usize, v1: usize, v2: usize) {
        self.overflow = (v2 ^ v1) & (v2 ^ res) & 0x8000 != 0;
    }

    pub fn set_carry_u8(&mut self, res: usize) {
        // Set if an arithmetic operation generates a carry or a borrow out of
        // the most-significant bit of the result; cleared otherwise.
        self.carry = res & 0x100 != 0;
    }

    pub fn set_carry_u16(&mut self, res: usize) {
        self.carry = res & 0x1_0000 != 0;
    }

    pub fn carry_val(&self) -> usize {
        if self.carry {
            1
        } else {
            0
        }
    }

    /// loads the FLAGS register, keeping only the nine tracked bits
    pub fn set_u16(&mut self, val: u16) {
        self.carry     = val & FLAG_CF != 0;
        self.parity    = val & FLAG_PF != 0;
        self.adjust    = val & FLAG_AF != 0;
        self.zero      = val & FLAG_ZF != 0;
        self.sign      = val & FLAG_SF != 0;
        self.trap      = val & FLAG_TF != 0;
        self.interrupt = val & FLAG_IF != 0;
        self.direction = val & FLAG_DF != 0;
        self.overflow  = val & FLAG_OF != 0;
    }

    /// materializes the FLAGS register
    pub fn u16(&self) -> u16 {
        let mut val = FLAGS_FIXED;
        if self.carry {
            val |= FLAG_CF;
        }
        if self.parity {
            val |= FLAG_PF;
        }
        if self.adjust {
            val |= FLAG_AF;
        }
        if self.zero {
            val |= FLAG_ZF;
        }
        if self.sign {
            val |= FLAG_SF;
        }
        if self.trap {
            val |= FLAG_TF;
        }
        if self.interrupt {
            val |= FLAG_IF;
        }
        if self.direction {
            val |= FLAG_DF;
        }
        if self.overflow {
            val |= FLAG_OF;
        }
        val
    }

    pub fn carry_numeric(&self) -> u8 {
        self.carry as u8
    }

    pub fn zero_numeric(&self) -> u8 {
        self.zero as u8
    }

    pub fn sign_numeric(&self) -> u8 {
        self.sign as u8
    }

    pub fn overflow_numeric(&self) -> u8 {
        self.overflow as u8
    }

    pub fn interrupt_numeric(&self) -> u8 {
        self.interrupt as u8
    }
}
