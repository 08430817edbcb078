use std::fs::File;
use std::io::{BufWriter, Write};
use std::mem;
use std::num::Wrapping;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, warn};

use crate::cpu::{Instruction, Invalid, Op, Parameter, RepeatMode, CPU, R};
use crate::error::Error;
use crate::hex::hex_bytes;
use crate::memory::{MemoryAddress, MMU};

#[cfg(test)]
#[path = "./machine_test.rs"]
mod machine_test;

/// segment a .com image is loaded at, and the register values a DOS
/// program loader leaves behind
const PSP_SEGMENT: u16 = 0x085F;

/// a host-implemented peripheral or service provider. all hooks default
/// to "not handled" so implementations only override what they serve
pub trait Component {
    /// returns Some if the port read was handled
    fn in_u8(&mut self, _port: u16) -> Option<u8> {
        None
    }

    /// returns Some if the port read was handled
    fn in_u16(&mut self, _port: u16) -> Option<u16> {
        None
    }

    /// returns true if the port write was handled
    fn out_u8(&mut self, _port: u16, _data: u8) -> bool {
        false
    }

    /// returns true if the port write was handled
    fn out_u16(&mut self, _port: u16, _data: u16) -> bool {
        false
    }

    /// returns true if the interrupt was handled. the component may
    /// mutate registers, flags and memory to deliver results
    fn int(&mut self, _int: u8, _cpu: &mut CPU, _mmu: &mut MMU) -> bool {
        false
    }

    /// notified when the cpu executes HLT
    fn hlt(&mut self) {}
}

/// what to do when an opcode outside the executed map is fetched
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum InvalidOpcodePolicy {
    /// report on the trace channel and stop execution
    Fatal,

    /// raise interrupt 6
    Interrupt,
}

pub struct Machine {
    pub cpu: CPU,
    pub mmu: MMU,

    /// base offset where the program was loaded
    pub rom_base: MemoryAddress,

    /// length of loaded program in bytes
    pub rom_length: usize,

    pub invalid_op: InvalidOpcodePolicy,

    /// if true, each instruction is written to trace_file (or the log)
    tracing: bool,
    trace_file: Option<File>,

    /// set from any thread or signal handler to end emulation at the
    /// next instruction boundary
    abort: Arc<AtomicBool>,

    /// handlers for i/o ports and interrupts
    components: Vec<Box<dyn Component>>,
}

impl Machine {
    pub fn default() -> Self {
        Machine {
            cpu: CPU::default(),
            mmu: MMU::default(),
            rom_base: MemoryAddress::default_real(),
            rom_length: 0,
            invalid_op: InvalidOpcodePolicy::Fatal,
            tracing: false,
            trace_file: None,
            abort: Arc::new(AtomicBool::new(false)),
            components: Vec::new(),
        }
    }

    /// registers a host component servicing ports and interrupts
    pub fn add_component(&mut self, component: Box<dyn Component>) {
        self.components.push(component);
    }

    /// load a .com program into CS:0100 and set IP to program start
    pub fn load_com(&mut self, data: &[u8]) -> Result<(), Error> {
        if data.len() > 0xFF00 {
            return Err(Error::BinaryTooLarge(data.len()));
        }

        // CS, DS, ES, SS = PSP segment
        self.cpu.set_r16(R::CS, PSP_SEGMENT);
        self.cpu.set_r16(R::DS, PSP_SEGMENT);
        self.cpu.set_r16(R::ES, PSP_SEGMENT);
        self.cpu.set_r16(R::SS, PSP_SEGMENT);

        // offset of last word available in the first 64k segment
        self.cpu.set_r16(R::SP, 0xFFFE);
        self.cpu.set_r16(R::BP, 0x091C);

        self.cpu.set_r16(R::CX, 0x00FF);
        self.cpu.set_r16(R::DX, PSP_SEGMENT);
        self.cpu.set_r16(R::SI, 0x0100);
        self.cpu.set_r16(R::DI, 0xFFFE);

        self.cpu.regs.flags.interrupt = true;

        self.cpu.regs.ip = 0x0100;
        self.rom_base = MemoryAddress::RealSegmentOffset(PSP_SEGMENT, 0x0100);
        self.rom_length = data.len();

        self.mmu.write(PSP_SEGMENT, 0x0100, data);
        Ok(())
    }

    /// enables or disables the per-instruction trace, effective from
    /// the next instruction
    pub fn trace_instructions(&mut self, on: bool) {
        self.tracing = on;
    }

    /// directs the per-instruction trace to a file and enables it
    pub fn write_trace_to<P: AsRef<Path>>(&mut self, filename: P) -> Result<(), Error> {
        self.trace_file = Some(File::create(filename)?);
        self.tracing = true;
        Ok(())
    }

    /// requests termination of a running `emulate` call. idempotent,
    /// callable from another thread or a signal handler
    pub fn end_emulation(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    /// a handle that ends emulation when set, for hosts that run the
    /// loop in a worker thread
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// runs up to `max_instructions` instructions, returning the number
    /// actually executed. exits early on HLT, an end_emulation request
    /// or a fatal decode error
    pub fn emulate(&mut self, max_instructions: usize) -> usize {
        let start = self.cpu.instruction_count;
        self.cpu.halted = false;
        while self.cpu.instruction_count.wrapping_sub(start) < max_instructions {
            if self.abort.swap(false, Ordering::SeqCst) {
                break;
            }
            self.execute_instruction();
            if self.cpu.halted || self.cpu.fatal_error {
                break;
            }
        }
        self.cpu.instruction_count.wrapping_sub(start)
    }

    /// executes n instructions of the cpu
    pub fn execute_instructions(&mut self, count: usize) {
        for _ in 0..count {
            self.execute_instruction();
            if self.cpu.fatal_error {
                break;
            }
        }
    }

    pub fn execute_instruction(&mut self) {
        let cs = self.cpu.get_r16(R::CS);
        let ip = self.cpu.regs.ip;
        let op = self.cpu.decoder.get_instruction(&self.mmu, cs, ip);

        if self.tracing {
            self.trace_instruction(&op, cs, ip);
        }

        match op.command {
            Op::Uninitialized => {
                self.cpu.fatal_error = true;
                error!("[{:04X}:{:04X}] ERROR: uninitialized op. {} instructions executed",
                       cs, ip, self.cpu.instruction_count);
            }
            Op::Invalid(ref bytes, ref reason) => {
                let hex = hex_bytes(bytes);
                match *reason {
                    Invalid::Op => {
                        error!("[{:04X}:{:04X}] {} ERROR: unhandled opcode", cs, ip, hex);
                    }
                    Invalid::Reg(reg) => {
                        error!("[{:04X}:{:04X}] {} ERROR: unhandled reg value {:02X}", cs, ip, hex, reg);
                    }
                }
                match self.invalid_op {
                    InvalidOpcodePolicy::Fatal => {
                        self.cpu.fatal_error = true;
                        error!("{} instructions executed", self.cpu.instruction_count);
                    }
                    InvalidOpcodePolicy::Interrupt => {
                        // the pushed return address points at the bad opcode
                        self.execute_interrupt(6);
                    }
                }
            }
            _ => self.execute(&op),
        }
    }

    /// transfers control to the interrupt vector
    pub fn execute_interrupt(&mut self, int: u8) {
        self.cpu.execute_interrupt(&mut self.mmu, int);
    }

    /// asks the host components to service an interrupt vector
    fn handle_interrupt(&mut self, int: u8) {
        for component in &mut self.components {
            if component.int(int, &mut self.cpu, &mut self.mmu) {
                return;
            }
        }
        warn!("int: unhandled interrupt {:02X}, AX={:04X}, BX={:04X}",
              int,
              self.cpu.get_r16(R::AX),
              self.cpu.get_r16(R::BX));
    }

    /// read byte from I/O port
    pub fn in_u8(&mut self, port: u16) -> u8 {
        for component in &mut self.components {
            if let Some(v) = component.in_u8(port) {
                return v;
            }
        }
        warn!("in_u8: unhandled port {:04X}", port);
        0
    }

    /// read word from I/O port
    pub fn in_u16(&mut self, port: u16) -> u16 {
        for component in &mut self.components {
            if let Some(v) = component.in_u16(port) {
                return v;
            }
        }
        warn!("in_u16: unhandled port {:04X}", port);
        0
    }

    /// write byte to I/O port
    pub fn out_u8(&mut self, port: u16, data: u8) {
        for component in &mut self.components {
            if component.out_u8(port, data) {
                return;
            }
        }
        warn!("out_u8: unhandled port {:04X} = {:02X}", port, data);
    }

    /// write word to I/O port
    pub fn out_u16(&mut self, port: u16, data: u16) {
        for component in &mut self.components {
            if component.out_u16(port, data) {
                return;
            }
        }
        warn!("out_u16: unhandled port {:04X} = {:04X}", port, data);
    }

    fn trace_instruction(&mut self, op: &Instruction, cs: u16, ip: u16) {
        let bytes = self.mmu.read(cs, ip, op.length as usize);
        let r = &self.cpu.regs;
        let line = format!(
            "{:04X}:{:04X}  {:16} {:30}  ax:{:04X} bx:{:04X} cx:{:04X} dx:{:04X} si:{:04X} di:{:04X} bp:{:04X} sp:{:04X} ds:{:04X} es:{:04X} ss:{:04X} C{} Z{} S{} O{} I{}",
            cs, ip,
            hex_bytes(&bytes),
            format!("{}", op),
            r.get_r16(R::AX), r.get_r16(R::BX), r.get_r16(R::CX), r.get_r16(R::DX),
            r.get_r16(R::SI), r.get_r16(R::DI), r.get_r16(R::BP), r.get_r16(R::SP),
            r.get_r16(R::DS), r.get_r16(R::ES), r.get_r16(R::SS),
            r.flags.carry_numeric(), r.flags.zero_numeric(), r.flags.sign_numeric(),
            r.flags.overflow_numeric(), r.flags.interrupt_numeric());

        if let Some(file) = &self.trace_file {
            let mut writer = BufWriter::new(file);
            let _ = writeln!(&mut writer, "{}", line);
        } else {
            debug!("{}", line);
        }
    }

    /// advances SI by the string element size, honoring the direction flag
    fn advance_si(&mut self, n: u16) {
        let si = self.cpu.get_r16(R::SI);
        let si = if self.cpu.regs.flags.direction {
            si.wrapping_sub(n)
        } else {
            si.wrapping_add(n)
        };
        self.cpu.set_r16(R::SI, si);
    }

    /// advances DI by the string element size, honoring the direction flag
    fn advance_di(&mut self, n: u16) {
        let di = self.cpu.get_r16(R::DI);
        let di = if self.cpu.regs.flags.direction {
            di.wrapping_sub(n)
        } else {
            di.wrapping_add(n)
        };
        self.cpu.set_r16(R::DI, di);
    }

    fn execute(&mut self, op: &Instruction) {
        let start_ip = self.cpu.regs.ip;
        self.cpu.regs.ip = (Wrapping(self.cpu.regs.ip) + Wrapping(u16::from(op.length))).0;
        self.cpu.instruction_count += 1;

        // a repeated string op with an exhausted count executes no iterations
        if op.repeat != RepeatMode::None && self.cpu.get_r16(R::CX) == 0 {
            return;
        }

        match op.command {
            Op::Aaa => {
                let v = if self.cpu.get_r8(R::AL) > 0xF9 {
                    2
                } else {
                    1
                };
                self.cpu.adjb(6, v);
            }
            Op::Aad => {
                let imm = self.cpu.read_parameter_imm(&op.params.dst) as u16;
                let mut ax = u16::from(self.cpu.get_r8(R::AH)) * imm;
                ax = ax.wrapping_add(u16::from(self.cpu.get_r8(R::AL)));
                let al = ax as u8;
                self.cpu.set_r8(R::AL, al);
                self.cpu.set_r8(R::AH, 0);
                // modification of flags A, C, O is undocumented
                self.cpu.regs.flags.carry = false;
                self.cpu.regs.flags.overflow = false;
                self.cpu.regs.flags.adjust = false;
                self.cpu.regs.flags.sign = al & 0x80 != 0;
                self.cpu.regs.flags.zero = al == 0;
                self.cpu.regs.flags.set_parity(al as usize);
            }
            Op::Aam => {
                // AH = AL / imm8, AL = AL % imm8. undefined for a zero
                // immediate, state is left untouched
                let imm8 = self.cpu.read_parameter_imm(&op.params.dst) as u8;
                if imm8 != 0 {
                    let al = self.cpu.get_r8(R::AL);
                    self.cpu.set_r8(R::AH, al / imm8);
                    self.cpu.set_r8(R::AL, al % imm8);
                    let al = self.cpu.get_r8(R::AL);
                    self.cpu.regs.flags.sign = al & 0x80 != 0;
                    self.cpu.regs.flags.zero = al == 0;
                    self.cpu.regs.flags.set_parity(al as usize);
                }
            }
            Op::Aas => {
                let v = if self.cpu.get_r8(R::AL) < 6 {
                    -2
                } else {
                    -1
                };
                self.cpu.adjb(-6, v);
            }
            Op::Adc8 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u8 as usize;
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u8 as usize;
                let carry = self.cpu.regs.flags.carry_val();
                let res = dst + src + carry;

                // The OF, SF, ZF, AF, CF, and PF flags are set according to the result.
                self.cpu.regs.flags.set_carry_u8(res);
                self.cpu.regs.flags.set_parity(res);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_zero_u8(res);
                self.cpu.regs.flags.set_sign_u8(res);
                self.cpu.regs.flags.set_overflow_add_u8(res, src, dst);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
            }
            Op::Adc16 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u16 as usize;
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16 as usize;
                let carry = self.cpu.regs.flags.carry_val();
                let res = dst + src + carry;

                self.cpu.regs.flags.set_carry_u16(res);
                self.cpu.regs.flags.set_parity(res);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_zero_u16(res);
                self.cpu.regs.flags.set_sign_u16(res);
                self.cpu.regs.flags.set_overflow_add_u16(res, src, dst);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
            }
            Op::Add8 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u8 as usize;
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u8 as usize;
                let res = dst + src;

                // The OF, SF, ZF, AF, CF, and PF flags are set according to the result.
                self.cpu.regs.flags.set_carry_u8(res);
                self.cpu.regs.flags.set_parity(res);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_zero_u8(res);
                self.cpu.regs.flags.set_sign_u8(res);
                self.cpu.regs.flags.set_overflow_add_u8(res, src, dst);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
            }
            Op::Add16 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u16 as usize;
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16 as usize;
                let res = dst + src;

                self.cpu.regs.flags.set_carry_u16(res);
                self.cpu.regs.flags.set_parity(res);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_zero_u16(res);
                self.cpu.regs.flags.set_sign_u16(res);
                self.cpu.regs.flags.set_overflow_add_u16(res, src, dst);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
            }
            Op::And8 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = dst & src;

                // The OF and CF flags are cleared; the SF, ZF, and PF flags
                // are set according to the result.
                self.cpu.regs.flags.overflow = false;
                self.cpu.regs.flags.carry = false;
                self.cpu.regs.flags.set_sign_u8(res);
                self.cpu.regs.flags.set_zero_u8(res);
                self.cpu.regs.flags.set_parity(res);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
            }
            Op::And16 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = dst & src;

                self.cpu.regs.flags.overflow = false;
                self.cpu.regs.flags.carry = false;
                self.cpu.regs.flags.set_sign_u16(res);
                self.cpu.regs.flags.set_zero_u16(res);
                self.cpu.regs.flags.set_parity(res);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
            }
            Op::CallNear => {
                // push the return address, then transfer
                let old_ip = self.cpu.regs.ip;
                let temp_ip = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                self.cpu.push16(&mut self.mmu, old_ip);
                self.cpu.regs.ip = temp_ip;
            }
            Op::CallFar => {
                let old_seg = self.cpu.get_r16(R::CS);
                let old_ip = self.cpu.regs.ip;
                self.cpu.push16(&mut self.mmu, old_seg);
                self.cpu.push16(&mut self.mmu, old_ip);
                match op.params.dst {
                    Parameter::Ptr16Imm(seg, offs) => {
                        self.cpu.set_r16(R::CS, seg);
                        self.cpu.regs.ip = offs;
                    }
                    _ => {
                        let (seg, offs) = self.cpu.read_segment_selector(&self.mmu, &op.params.dst);
                        self.cpu.set_r16(R::CS, seg);
                        self.cpu.regs.ip = offs;
                    }
                }
            }
            Op::Cbw => {
                let ah = if self.cpu.get_r8(R::AL) & 0x80 != 0 {
                    0xFF
                } else {
                    0x00
                };
                self.cpu.set_r8(R::AH, ah);
            }
            Op::Clc => {
                self.cpu.regs.flags.carry = false;
            }
            Op::Cld => {
                self.cpu.regs.flags.direction = false;
            }
            Op::Cli => {
                self.cpu.regs.flags.interrupt = false;
            }
            Op::Cmc => {
                self.cpu.regs.flags.carry = !self.cpu.regs.flags.carry;
            }
            Op::Cmp8 => {
                // Modify status flags in the same manner as the SUB instruction
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u8 as usize;
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u8 as usize;
                self.cpu.cmp8(dst, src);
            }
            Op::Cmp16 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u16 as usize;
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16 as usize;
                self.cpu.cmp16(dst, src);
            }
            Op::Cmpsb => {
                // compare byte at DS:SI with byte at ES:DI. the source segment
                // may be overridden, the destination segment cannot
                let lhs = self.mmu.read_u8(self.cpu.segment(op.segment_prefix), self.cpu.get_r16(R::SI)) as usize;
                let rhs = self.mmu.read_u8(self.cpu.get_r16(R::ES), self.cpu.get_r16(R::DI)) as usize;
                self.cpu.cmp8(lhs, rhs);
                self.advance_si(1);
                self.advance_di(1);
            }
            Op::Cmpsw => {
                let lhs = self.mmu.read_u16(self.cpu.segment(op.segment_prefix), self.cpu.get_r16(R::SI)) as usize;
                let rhs = self.mmu.read_u16(self.cpu.get_r16(R::ES), self.cpu.get_r16(R::DI)) as usize;
                self.cpu.cmp16(lhs, rhs);
                self.advance_si(2);
                self.advance_di(2);
            }
            Op::Cwd => {
                // DX:AX = sign-extend of AX
                let dx = if self.cpu.get_r16(R::AX) & 0x8000 != 0 {
                    0xFFFF
                } else {
                    0
                };
                self.cpu.set_r16(R::DX, dx);
            }
            Op::Daa => {
                self.cpu.adj4(6, 0x60);
            }
            Op::Das => {
                self.cpu.adj4(-6, -0x60);
            }
            Op::Dec8 => {
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u8 as usize;
                let src = 1;
                let res = (Wrapping(dst) - Wrapping(src)).0;

                // The CF flag is not affected. The OF, SF, ZF, AF,
                // and PF flags are set according to the result.
                self.cpu.regs.flags.set_overflow_sub_u8(res, src, dst);
                self.cpu.regs.flags.set_sign_u8(res);
                self.cpu.regs.flags.set_zero_u8(res);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_parity(res);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
            }
            Op::Dec16 => {
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16 as usize;
                let src = 1;
                let res = (Wrapping(dst) - Wrapping(src)).0;

                self.cpu.regs.flags.set_overflow_sub_u16(res, src, dst);
                self.cpu.regs.flags.set_sign_u16(res);
                self.cpu.regs.flags.set_zero_u16(res);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_parity(res);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
            }
            Op::Div8 => {
                // unsigned divide AX by r/m8: AL = quotient, AH = remainder
                let ax = self.cpu.get_r16(R::AX);
                let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                if op1 == 0 {
                    return self.execute_interrupt(0);
                }
                let quotient = ax / op1;
                if quotient > 0xFF {
                    return self.execute_interrupt(0);
                }
                let remainder = (ax % op1) as u8;
                self.cpu.set_r8(R::AL, quotient as u8);
                self.cpu.set_r8(R::AH, remainder);
                // P, Z and S are architecturally undefined, set from the quotient
                self.cpu.regs.flags.set_sign_u8(quotient as usize);
                self.cpu.regs.flags.set_zero_u8(quotient as usize);
                self.cpu.regs.flags.set_parity(quotient as usize);
            }
            Op::Div16 => {
                // unsigned divide DX:AX by r/m16: AX = quotient, DX = remainder
                let num = (u32::from(self.cpu.get_r16(R::DX)) << 16) | u32::from(self.cpu.get_r16(R::AX));
                let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u32;
                if op1 == 0 {
                    return self.execute_interrupt(0);
                }
                let quotient = num / op1;
                if quotient > 0xFFFF {
                    return self.execute_interrupt(0);
                }
                let remainder = (num % op1) as u16;
                self.cpu.set_r16(R::AX, quotient as u16);
                self.cpu.set_r16(R::DX, remainder);
                self.cpu.regs.flags.set_sign_u16(quotient as usize);
                self.cpu.regs.flags.set_zero_u16(quotient as usize);
                self.cpu.regs.flags.set_parity(quotient as usize);
            }
            Op::Hlt => {
                self.cpu.halted = true;
                for component in &mut self.components {
                    component.hlt();
                }
            }
            Op::HostInterrupt => {
                // stub installed by the host at an interrupt vector target,
                // hands the vector back to the host components
                let int = self.cpu.last_interrupt;
                self.handle_interrupt(int);
            }
            Op::Idiv8 => {
                let dividend = self.cpu.get_r16(R::AX) as i16;
                let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u8 as i8;
                if op1 == 0 {
                    return self.execute_interrupt(0);
                }
                let quo = dividend / i16::from(op1);
                let rem = (dividend % i16::from(op1)) as i8;
                if quo != i16::from(quo as i8) {
                    return self.execute_interrupt(0);
                }
                self.cpu.set_r8(R::AL, quo as u8);
                self.cpu.set_r8(R::AH, rem as u8);
                self.cpu.regs.flags.set_sign_u8(quo as u8 as usize);
                self.cpu.regs.flags.set_zero_u8(quo as u8 as usize);
                self.cpu.regs.flags.set_parity(quo as u8 as usize);
            }
            Op::Idiv16 => {
                let dividend = ((u32::from(self.cpu.get_r16(R::DX)) << 16) | u32::from(self.cpu.get_r16(R::AX))) as i32;
                let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16 as i16;
                if op1 == 0 {
                    return self.execute_interrupt(0);
                }
                let quo = dividend / i32::from(op1);
                let rem = (dividend % i32::from(op1)) as i16;
                if quo != i32::from(quo as i16) {
                    return self.execute_interrupt(0);
                }
                self.cpu.set_r16(R::AX, quo as u16);
                self.cpu.set_r16(R::DX, rem as u16);
                self.cpu.regs.flags.set_sign_u16(quo as u16 as usize);
                self.cpu.regs.flags.set_zero_u16(quo as u16 as usize);
                self.cpu.regs.flags.set_parity(quo as u16 as usize);
            }
            Op::Imul8 => {
                // AX = AL * r/m8, signed
                let f1 = self.cpu.get_r8(R::AL) as i8;
                let f2 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u8 as i8;
                let ax = (i16::from(f1) * i16::from(f2)) as u16;
                self.cpu.set_r16(R::AX, ax);

                // CF and OF are set when AH is not a pure sign extension of AL
                if (ax & 0xFF80) == 0xFF80 || (ax & 0xFF80) == 0x0000 {
                    self.cpu.regs.flags.carry = false;
                    self.cpu.regs.flags.overflow = false;
                } else {
                    self.cpu.regs.flags.carry = true;
                    self.cpu.regs.flags.overflow = true;
                }
                self.cpu.regs.flags.set_sign_u16(ax as usize);
                self.cpu.regs.flags.set_zero_u16(ax as usize);
                self.cpu.regs.flags.set_parity(ax as usize);
            }
            Op::Imul16 => {
                // DX:AX = AX * r/m16, signed
                let f1 = self.cpu.get_r16(R::AX) as i16;
                let f2 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16 as i16;
                let res = i32::from(f1) * i32::from(f2);
                let ax = res as u16;
                self.cpu.set_r16(R::AX, ax);
                self.cpu.set_r16(R::DX, (res >> 16) as u16);

                // CF and OF are set when DX is not a pure sign extension of AX
                let upper = res as u32 & 0xFFFF_8000;
                let wide = upper != 0 && upper != 0xFFFF_8000;
                self.cpu.regs.flags.carry = wide;
                self.cpu.regs.flags.overflow = wide;
                self.cpu.regs.flags.set_sign_u16(ax as usize);
                self.cpu.regs.flags.set_zero_u16(ax as usize);
                self.cpu.regs.flags.set_parity(ax as usize);
            }
            Op::In8 => {
                let port = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u16;
                let data = self.in_u8(port);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, data);
            }
            Op::In16 => {
                let port = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u16;
                let data = self.in_u16(port);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, data);
            }
            Op::Inc8 => {
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u8 as usize;
                let src = 1;
                let res = dst + src;

                // The CF flag is not affected. The OF, SF, ZF, AF,
                // and PF flags are set according to the result.
                self.cpu.regs.flags.set_overflow_add_u8(res, src, dst);
                self.cpu.regs.flags.set_sign_u8(res);
                self.cpu.regs.flags.set_zero_u8(res);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_parity(res);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
            }
            Op::Inc16 => {
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16 as usize;
                let src = 1;
                let res = dst + src;

                self.cpu.regs.flags.set_overflow_add_u16(res, src, dst);
                self.cpu.regs.flags.set_sign_u16(res);
                self.cpu.regs.flags.set_zero_u16(res);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_parity(res);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
            }
            Op::Int => {
                let int = self.cpu.read_parameter_imm(&op.params.dst) as u8;
                self.execute_interrupt(int);
            }
            Op::Into => {
                if self.cpu.regs.flags.overflow {
                    self.execute_interrupt(4);
                }
            }
            Op::Iret => {
                self.cpu.regs.ip = self.cpu.pop16(&mut self.mmu);
                let cs = self.cpu.pop16(&mut self.mmu);
                self.cpu.set_r16(R::CS, cs);
                let flags = self.cpu.pop16(&mut self.mmu);
                self.cpu.regs.flags.set_u16(flags);
            }
            Op::Ja => {
                if !self.cpu.regs.flags.carry && !self.cpu.regs.flags.zero {
                    self.cpu.regs.ip = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                }
            }
            Op::Jc => {
                if self.cpu.regs.flags.carry {
                    self.cpu.regs.ip = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                }
            }
            Op::Jcxz => {
                if self.cpu.get_r16(R::CX) == 0 {
                    self.cpu.regs.ip = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                }
            }
            Op::Jg => {
                if !self.cpu.regs.flags.zero && self.cpu.regs.flags.sign == self.cpu.regs.flags.overflow {
                    self.cpu.regs.ip = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                }
            }
            Op::Jl => {
                if self.cpu.regs.flags.sign != self.cpu.regs.flags.overflow {
                    self.cpu.regs.ip = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                }
            }
            Op::JmpFar => {
                match op.params.dst {
                    Parameter::Ptr16Imm(seg, offs) => {
                        self.cpu.set_r16(R::CS, seg);
                        self.cpu.regs.ip = offs;
                    }
                    _ => {
                        let (seg, offs) = self.cpu.read_segment_selector(&self.mmu, &op.params.dst);
                        self.cpu.set_r16(R::CS, seg);
                        self.cpu.regs.ip = offs;
                    }
                }
            }
            Op::JmpNear | Op::JmpShort => {
                self.cpu.regs.ip = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
            }
            Op::Jna => {
                if self.cpu.regs.flags.carry || self.cpu.regs.flags.zero {
                    self.cpu.regs.ip = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                }
            }
            Op::Jnc => {
                if !self.cpu.regs.flags.carry {
                    self.cpu.regs.ip = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                }
            }
            Op::Jng => {
                if self.cpu.regs.flags.zero || self.cpu.regs.flags.sign != self.cpu.regs.flags.overflow {
                    self.cpu.regs.ip = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                }
            }
            Op::Jnl => {
                if self.cpu.regs.flags.sign == self.cpu.regs.flags.overflow {
                    self.cpu.regs.ip = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                }
            }
            Op::Jno => {
                if !self.cpu.regs.flags.overflow {
                    self.cpu.regs.ip = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                }
            }
            Op::Jns => {
                if !self.cpu.regs.flags.sign {
                    self.cpu.regs.ip = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                }
            }
            Op::Jnz => {
                if !self.cpu.regs.flags.zero {
                    self.cpu.regs.ip = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                }
            }
            Op::Jo => {
                if self.cpu.regs.flags.overflow {
                    self.cpu.regs.ip = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                }
            }
            Op::Jpe => {
                if self.cpu.regs.flags.parity {
                    self.cpu.regs.ip = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                }
            }
            Op::Jpo => {
                if !self.cpu.regs.flags.parity {
                    self.cpu.regs.ip = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                }
            }
            Op::Js => {
                if self.cpu.regs.flags.sign {
                    self.cpu.regs.ip = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                }
            }
            Op::Jz => {
                if self.cpu.regs.flags.zero {
                    self.cpu.regs.ip = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                }
            }
            Op::Lahf => {
                // AH = SF:ZF:0:AF:0:PF:1:CF
                let mut val = 0x02 as u8;
                if self.cpu.regs.flags.carry {
                    val |= 0x01;
                }
                if self.cpu.regs.flags.parity {
                    val |= 0x04;
                }
                if self.cpu.regs.flags.adjust {
                    val |= 0x10;
                }
                if self.cpu.regs.flags.zero {
                    val |= 0x40;
                }
                if self.cpu.regs.flags.sign {
                    val |= 0x80;
                }
                self.cpu.set_r8(R::AH, val);
            }
            Op::Lds => {
                // load DS:r16 with far pointer from memory
                let (segment, offset) = self.cpu.read_segment_selector(&self.mmu, &op.params.src);
                self.cpu.set_r16(R::DS, segment);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, offset);
            }
            Op::Lea16 => {
                let src = self.cpu.read_parameter_address(&op.params.src);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, src);
            }
            Op::Les => {
                // load ES:r16 with far pointer from memory
                let (segment, offset) = self.cpu.read_segment_selector(&self.mmu, &op.params.src);
                self.cpu.set_r16(R::ES, segment);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, offset);
            }
            Op::Lodsb => {
                // load byte at DS:SI into AL. the source segment may be overridden
                let val = self.mmu.read_u8(self.cpu.segment(op.segment_prefix), self.cpu.get_r16(R::SI));
                self.cpu.set_r8(R::AL, val);
                self.advance_si(1);
            }
            Op::Lodsw => {
                let val = self.mmu.read_u16(self.cpu.segment(op.segment_prefix), self.cpu.get_r16(R::SI));
                self.cpu.set_r16(R::AX, val);
                self.advance_si(2);
            }
            Op::Loop => {
                // decrement CX, jump if it did not reach zero
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                let cx = self.cpu.get_r16(R::CX).wrapping_sub(1);
                self.cpu.set_r16(R::CX, cx);
                if cx != 0 {
                    self.cpu.regs.ip = dst;
                }
            }
            Op::Loope => {
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                let cx = self.cpu.get_r16(R::CX).wrapping_sub(1);
                self.cpu.set_r16(R::CX, cx);
                if cx != 0 && self.cpu.regs.flags.zero {
                    self.cpu.regs.ip = dst;
                }
            }
            Op::Loopne => {
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                let cx = self.cpu.get_r16(R::CX).wrapping_sub(1);
                self.cpu.set_r16(R::CX, cx);
                if cx != 0 && !self.cpu.regs.flags.zero {
                    self.cpu.regs.ip = dst;
                }
            }
            Op::Mov8 => {
                let data = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u8;
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, data);
            }
            Op::Mov16 => {
                let data = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u16;
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, data);
            }
            Op::Movsb => {
                // move byte from DS:SI to ES:DI. the source segment may be
                // overridden, the destination segment cannot
                let val = self.mmu.read_u8(self.cpu.segment(op.segment_prefix), self.cpu.get_r16(R::SI));
                let es = self.cpu.get_r16(R::ES);
                let di = self.cpu.get_r16(R::DI);
                self.mmu.write_u8(es, di, val);
                self.advance_si(1);
                self.advance_di(1);
            }
            Op::Movsw => {
                let val = self.mmu.read_u16(self.cpu.segment(op.segment_prefix), self.cpu.get_r16(R::SI));
                let es = self.cpu.get_r16(R::ES);
                let di = self.cpu.get_r16(R::DI);
                self.mmu.write_u16(es, di, val);
                self.advance_si(2);
                self.advance_di(2);
            }
            Op::Mul8 => {
                // AX = AL * r/m8, unsigned
                let al = self.cpu.get_r8(R::AL) as usize;
                let rhs = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u8 as usize;
                let ax = (al * rhs) as u16;
                self.cpu.set_r16(R::AX, ax);

                // CF and OF are set when the upper half of the result is nonzero
                let wide = ax & 0xFF00 != 0;
                self.cpu.regs.flags.carry = wide;
                self.cpu.regs.flags.overflow = wide;
                self.cpu.regs.flags.set_sign_u16(ax as usize);
                self.cpu.regs.flags.set_zero_u16(ax as usize);
                self.cpu.regs.flags.set_parity(ax as usize);
            }
            Op::Mul16 => {
                // DX:AX = AX * r/m16, unsigned
                let lhs = self.cpu.get_r16(R::AX) as u32;
                let rhs = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u32;
                let res = lhs * rhs;
                let dx = (res >> 16) as u16;
                self.cpu.set_r16(R::AX, res as u16);
                self.cpu.set_r16(R::DX, dx);

                self.cpu.regs.flags.carry = dx != 0;
                self.cpu.regs.flags.overflow = dx != 0;
                self.cpu.regs.flags.set_sign_u16(res as u16 as usize);
                self.cpu.regs.flags.set_zero_u16(res as u16 as usize);
                self.cpu.regs.flags.set_parity(res as usize);
            }
            Op::Neg8 => {
                // subtract from 0
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u8 as usize;
                self.cpu.cmp8(0, dst);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, (dst as u8).wrapping_neg());
            }
            Op::Neg16 => {
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16 as usize;
                self.cpu.cmp16(0, dst);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, (dst as u16).wrapping_neg());
            }
            Op::Nop => {}
            Op::Not8 => {
                // Flags Affected: None
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, !dst as u8);
            }
            Op::Not16 => {
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, !dst as u16);
            }
            Op::Or8 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = dst | src;

                // The OF and CF flags are cleared; the SF, ZF, and PF flags
                // are set according to the result.
                self.cpu.regs.flags.overflow = false;
                self.cpu.regs.flags.carry = false;
                self.cpu.regs.flags.set_sign_u8(res);
                self.cpu.regs.flags.set_zero_u8(res);
                self.cpu.regs.flags.set_parity(res);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
            }
            Op::Or16 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = dst | src;

                self.cpu.regs.flags.overflow = false;
                self.cpu.regs.flags.carry = false;
                self.cpu.regs.flags.set_sign_u16(res);
                self.cpu.regs.flags.set_zero_u16(res);
                self.cpu.regs.flags.set_parity(res);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
            }
            Op::Out8 => {
                let port = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                let data = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u8;
                self.out_u8(port, data);
            }
            Op::Out16 => {
                let port = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                let data = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u16;
                self.out_u16(port, data);
            }
            Op::Pop16 => {
                let data = self.cpu.pop16(&mut self.mmu);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, data);
            }
            Op::Popf => {
                let data = self.cpu.pop16(&mut self.mmu);
                self.cpu.regs.flags.set_u16(data);
            }
            Op::Push16 => {
                let data = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                self.cpu.push16(&mut self.mmu, data);
            }
            Op::Pushf => {
                let data = self.cpu.regs.flags.u16();
                self.cpu.push16(&mut self.mmu, data);
            }
            Op::Rcl8 => {
                // rotate 9 bits (CF, r/m8) left `count` times
                let count = (self.cpu.read_parameter_value(&self.mmu, &op.params.src) & 0x1F) % 9;
                if count > 0 {
                    let cf = self.cpu.regs.flags.carry_val() as u16;
                    let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                    let res = ((op1 << count) | (cf << (count - 1)) | (op1 >> (9 - count))) as u8;
                    self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res);
                    self.cpu.regs.flags.carry = (op1 >> (8 - count)) & 1 != 0;
                    if count == 1 {
                        // OF = CF after the rotate, XOR the new top bit
                        self.cpu.regs.flags.overflow = self.cpu.regs.flags.carry != (res & 0x80 != 0);
                    }
                }
            }
            Op::Rcl16 => {
                // rotate 17 bits (CF, r/m16) left `count` times
                let count = (self.cpu.read_parameter_value(&self.mmu, &op.params.src) & 0x1F) % 17;
                if count > 0 {
                    let cf = self.cpu.regs.flags.carry_val() as u32;
                    let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u32;
                    let res = ((op1 << count) | (cf << (count - 1)) | (op1 >> (17 - count))) as u16;
                    self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res);
                    self.cpu.regs.flags.carry = (op1 >> (16 - count)) & 1 != 0;
                    if count == 1 {
                        self.cpu.regs.flags.overflow = self.cpu.regs.flags.carry != (res & 0x8000 != 0);
                    }
                }
            }
            Op::Rcr8 => {
                // rotate 9 bits (CF, r/m8) right `count` times
                let count = (self.cpu.read_parameter_value(&self.mmu, &op.params.src) & 0x1F) % 9;
                if count > 0 {
                    let cf = self.cpu.regs.flags.carry_val() as u16;
                    let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                    let res = ((op1 >> count) | (cf << (8 - count)) | (op1 << (9 - count))) as u8;
                    self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res);
                    self.cpu.regs.flags.carry = (op1 >> (count - 1)) & 1 != 0;
                    if count == 1 {
                        // OF = XOR of the two most significant bits of the result
                        self.cpu.regs.flags.overflow = ((res >> 7) ^ (res >> 6)) & 1 != 0;
                    }
                }
            }
            Op::Rcr16 => {
                // rotate 17 bits (CF, r/m16) right `count` times
                let count = (self.cpu.read_parameter_value(&self.mmu, &op.params.src) & 0x1F) % 17;
                if count > 0 {
                    let cf = self.cpu.regs.flags.carry_val() as u32;
                    let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u32;
                    let res = ((op1 >> count) | (cf << (16 - count)) | (op1 << (17 - count))) as u16;
                    self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res);
                    self.cpu.regs.flags.carry = (op1 >> (count - 1)) & 1 != 0;
                    if count == 1 {
                        self.cpu.regs.flags.overflow = ((res >> 15) ^ (res >> 14)) & 1 != 0;
                    }
                }
            }
            Op::Retf => {
                self.cpu.regs.ip = self.cpu.pop16(&mut self.mmu);
                let cs = self.cpu.pop16(&mut self.mmu);
                self.cpu.set_r16(R::CS, cs);
                if op.params.count() == 1 {
                    // pop imm16 bytes of arguments off the stack
                    let imm16 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                    let sp = self.cpu.get_r16(R::SP).wrapping_add(imm16);
                    self.cpu.set_r16(R::SP, sp);
                }
            }
            Op::Retn => {
                self.cpu.regs.ip = self.cpu.pop16(&mut self.mmu);
                if op.params.count() == 1 {
                    // pop imm16 bytes of arguments off the stack
                    let imm16 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                    let sp = self.cpu.get_r16(R::SP).wrapping_add(imm16);
                    self.cpu.set_r16(R::SP, sp);
                }
            }
            Op::Rol8 => {
                // rotate 8 bits of `dst` left `count` times
                let count = self.cpu.read_parameter_value(&self.mmu, &op.params.src) & 0x1F;
                if count > 0 {
                    let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u8;
                    let res = op1.rotate_left((count % 8) as u32);
                    self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res);
                    self.cpu.regs.flags.carry = res & 1 != 0;
                    if count == 1 {
                        // OF = the new top bit XOR CF
                        self.cpu.regs.flags.overflow = ((res >> 7) ^ res) & 1 != 0;
                    }
                }
            }
            Op::Rol16 => {
                let count = self.cpu.read_parameter_value(&self.mmu, &op.params.src) & 0x1F;
                if count > 0 {
                    let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                    let res = op1.rotate_left((count % 16) as u32);
                    self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res);
                    self.cpu.regs.flags.carry = res & 1 != 0;
                    if count == 1 {
                        self.cpu.regs.flags.overflow = ((res >> 15) ^ res) & 1 != 0;
                    }
                }
            }
            Op::Ror8 => {
                // rotate 8 bits of `dst` right `count` times
                let count = self.cpu.read_parameter_value(&self.mmu, &op.params.src) & 0x1F;
                if count > 0 {
                    let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u8;
                    let res = op1.rotate_right((count % 8) as u32);
                    self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res);
                    self.cpu.regs.flags.carry = res & 0x80 != 0;
                    if count == 1 {
                        // OF = XOR of the two most significant bits of the result
                        self.cpu.regs.flags.overflow = ((res >> 7) ^ (res >> 6)) & 1 != 0;
                    }
                }
            }
            Op::Ror16 => {
                let count = self.cpu.read_parameter_value(&self.mmu, &op.params.src) & 0x1F;
                if count > 0 {
                    let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                    let res = op1.rotate_right((count % 16) as u32);
                    self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res);
                    self.cpu.regs.flags.carry = res & 0x8000 != 0;
                    if count == 1 {
                        self.cpu.regs.flags.overflow = ((res >> 15) ^ (res >> 14)) & 1 != 0;
                    }
                }
            }
            Op::Sahf => {
                // loads SF, ZF, AF, PF and CF from AH
                let ah = self.cpu.get_r8(R::AH);
                self.cpu.regs.flags.carry = ah & 0x01 != 0;
                self.cpu.regs.flags.parity = ah & 0x04 != 0;
                self.cpu.regs.flags.adjust = ah & 0x10 != 0;
                self.cpu.regs.flags.zero = ah & 0x40 != 0;
                self.cpu.regs.flags.sign = ah & 0x80 != 0;
            }
            Op::Salc => {
                let al = if self.cpu.regs.flags.carry {
                    0xFF
                } else {
                    0
                };
                self.cpu.set_r8(R::AL, al);
            }
            Op::Sar8 => {
                // signed divide r/m8 by 2, `count` times
                let count = self.cpu.read_parameter_value(&self.mmu, &op.params.src) & 0x1F;
                if count > 0 {
                    let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u8;
                    let val = i32::from(op1 as i8);
                    let res = (val >> count) as u8;
                    self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res);
                    self.cpu.regs.flags.carry = (val >> (count - 1)) & 1 != 0;
                    if count == 1 {
                        self.cpu.regs.flags.overflow = false;
                    }
                    self.cpu.regs.flags.set_sign_u8(res as usize);
                    self.cpu.regs.flags.set_zero_u8(res as usize);
                    self.cpu.regs.flags.set_parity(res as usize);
                }
            }
            Op::Sar16 => {
                let count = self.cpu.read_parameter_value(&self.mmu, &op.params.src) & 0x1F;
                if count > 0 {
                    let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16;
                    let val = i32::from(op1 as i16);
                    let res = (val >> count) as u16;
                    self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res);
                    self.cpu.regs.flags.carry = (val >> (count - 1)) & 1 != 0;
                    if count == 1 {
                        self.cpu.regs.flags.overflow = false;
                    }
                    self.cpu.regs.flags.set_sign_u16(res as usize);
                    self.cpu.regs.flags.set_zero_u16(res as usize);
                    self.cpu.regs.flags.set_parity(res as usize);
                }
            }
            Op::Sbb8 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u8 as usize;
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u8 as usize;
                let carry = self.cpu.regs.flags.carry_val();
                let res = (Wrapping(dst) - (Wrapping(src) + Wrapping(carry))).0;

                // The OF, SF, ZF, AF, PF, and CF flags are set according to the result.
                self.cpu.regs.flags.set_carry_u8(res);
                self.cpu.regs.flags.set_overflow_sub_u8(res, src, dst);
                self.cpu.regs.flags.set_sign_u8(res);
                self.cpu.regs.flags.set_zero_u8(res);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_parity(res);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
            }
            Op::Sbb16 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u16 as usize;
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16 as usize;
                let carry = self.cpu.regs.flags.carry_val();
                let res = (Wrapping(dst) - (Wrapping(src) + Wrapping(carry))).0;

                self.cpu.regs.flags.set_carry_u16(res);
                self.cpu.regs.flags.set_overflow_sub_u16(res, src, dst);
                self.cpu.regs.flags.set_sign_u16(res);
                self.cpu.regs.flags.set_zero_u16(res);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_parity(res);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
            }
            Op::Scasb => {
                // compare AL with byte at ES:DI. ES cannot be overridden
                let lhs = self.cpu.get_r8(R::AL) as usize;
                let rhs = self.mmu.read_u8(self.cpu.get_r16(R::ES), self.cpu.get_r16(R::DI)) as usize;
                self.cpu.cmp8(lhs, rhs);
                self.advance_di(1);
            }
            Op::Scasw => {
                let lhs = self.cpu.get_r16(R::AX) as usize;
                let rhs = self.mmu.read_u16(self.cpu.get_r16(R::ES), self.cpu.get_r16(R::DI)) as usize;
                self.cpu.cmp16(lhs, rhs);
                self.advance_di(2);
            }
            Op::Shl8 => {
                // multiply `dst` by 2, `count` times (alias: sal)
                let count = self.cpu.read_parameter_value(&self.mmu, &op.params.src) & 0x1F;
                if count > 0 {
                    let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u8 as usize;
                    let res = op1 << count;
                    let cf = if count > 8 {
                        0
                    } else {
                        (op1 >> (8 - count)) & 1
                    };
                    self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
                    self.cpu.regs.flags.carry = cf != 0;
                    if count == 1 {
                        // OF = the new top bit XOR CF
                        self.cpu.regs.flags.overflow = (res >> 7) & 1 != cf;
                    }
                    self.cpu.regs.flags.set_sign_u8(res);
                    self.cpu.regs.flags.set_zero_u8(res);
                    self.cpu.regs.flags.set_parity(res);
                }
            }
            Op::Shl16 => {
                let count = self.cpu.read_parameter_value(&self.mmu, &op.params.src) & 0x1F;
                if count > 0 {
                    let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16 as usize;
                    let res = op1 << count;
                    let cf = if count > 16 {
                        0
                    } else {
                        (op1 >> (16 - count)) & 1
                    };
                    self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
                    self.cpu.regs.flags.carry = cf != 0;
                    if count == 1 {
                        self.cpu.regs.flags.overflow = (res >> 15) & 1 != cf;
                    }
                    self.cpu.regs.flags.set_sign_u16(res);
                    self.cpu.regs.flags.set_zero_u16(res);
                    self.cpu.regs.flags.set_parity(res);
                }
            }
            Op::Shr8 => {
                // unsigned divide r/m8 by 2, `count` times
                let count = self.cpu.read_parameter_value(&self.mmu, &op.params.src) & 0x1F;
                if count > 0 {
                    let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u8 as usize;
                    let res = op1 >> count;
                    self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
                    self.cpu.regs.flags.carry = (op1 >> (count - 1)) & 1 != 0;
                    if count == 1 {
                        // OF = the original top bit
                        self.cpu.regs.flags.overflow = op1 & 0x80 != 0;
                    }
                    self.cpu.regs.flags.set_sign_u8(res);
                    self.cpu.regs.flags.set_zero_u8(res);
                    self.cpu.regs.flags.set_parity(res);
                }
            }
            Op::Shr16 => {
                let count = self.cpu.read_parameter_value(&self.mmu, &op.params.src) & 0x1F;
                if count > 0 {
                    let op1 = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16 as usize;
                    let res = op1 >> count;
                    self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
                    self.cpu.regs.flags.carry = (op1 >> (count - 1)) & 1 != 0;
                    if count == 1 {
                        self.cpu.regs.flags.overflow = op1 & 0x8000 != 0;
                    }
                    self.cpu.regs.flags.set_sign_u16(res);
                    self.cpu.regs.flags.set_zero_u16(res);
                    self.cpu.regs.flags.set_parity(res);
                }
            }
            Op::Stc => {
                self.cpu.regs.flags.carry = true;
            }
            Op::Std => {
                self.cpu.regs.flags.direction = true;
            }
            Op::Sti => {
                self.cpu.regs.flags.interrupt = true;
            }
            Op::Stosb => {
                // store AL at ES:DI. ES cannot be overridden
                let al = self.cpu.get_r8(R::AL);
                let es = self.cpu.get_r16(R::ES);
                let di = self.cpu.get_r16(R::DI);
                self.mmu.write_u8(es, di, al);
                self.advance_di(1);
            }
            Op::Stosw => {
                let ax = self.cpu.get_r16(R::AX);
                let es = self.cpu.get_r16(R::ES);
                let di = self.cpu.get_r16(R::DI);
                self.mmu.write_u16(es, di, ax);
                self.advance_di(2);
            }
            Op::Sub8 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u8 as usize;
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u8 as usize;
                let res = (Wrapping(dst) - Wrapping(src)).0;

                // The OF, SF, ZF, AF, PF, and CF flags are set according to the result.
                self.cpu.regs.flags.set_carry_u8(res);
                self.cpu.regs.flags.set_overflow_sub_u8(res, src, dst);
                self.cpu.regs.flags.set_sign_u8(res);
                self.cpu.regs.flags.set_zero_u8(res);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_parity(res);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
            }
            Op::Sub16 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src) as u16 as usize;
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst) as u16 as usize;
                let res = (Wrapping(dst) - Wrapping(src)).0;

                self.cpu.regs.flags.set_carry_u16(res);
                self.cpu.regs.flags.set_overflow_sub_u16(res, src, dst);
                self.cpu.regs.flags.set_sign_u16(res);
                self.cpu.regs.flags.set_zero_u16(res);
                self.cpu.regs.flags.set_adjust(res, src, dst);
                self.cpu.regs.flags.set_parity(res);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
            }
            Op::Test8 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = dst & src;

                // The OF and CF flags are cleared; the SF, ZF, and PF flags
                // are set according to the result. the result is discarded
                self.cpu.regs.flags.overflow = false;
                self.cpu.regs.flags.carry = false;
                self.cpu.regs.flags.set_sign_u8(res);
                self.cpu.regs.flags.set_zero_u8(res);
                self.cpu.regs.flags.set_parity(res);
            }
            Op::Test16 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = dst & src;

                self.cpu.regs.flags.overflow = false;
                self.cpu.regs.flags.carry = false;
                self.cpu.regs.flags.set_sign_u16(res);
                self.cpu.regs.flags.set_zero_u16(res);
                self.cpu.regs.flags.set_parity(res);
            }
            Op::Wait => {
                // wait for pending floating point exceptions, nothing to do
            }
            Op::Xchg8 => {
                let mut src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let mut dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                mem::swap(&mut src, &mut dst);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, dst as u8);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.src, src as u8);
            }
            Op::Xchg16 => {
                let mut src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let mut dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                mem::swap(&mut src, &mut dst);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, dst as u16);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.src, src as u16);
            }
            Op::Xlatb => {
                // AL = memory byte [BX + unsigned AL]. the table segment
                // may be overridden
                let offset = self.cpu.get_r16(R::BX).wrapping_add(u16::from(self.cpu.get_r8(R::AL)));
                let al = self.mmu.read_u8(self.cpu.segment(op.segment_prefix), offset);
                self.cpu.set_r8(R::AL, al);
            }
            Op::Xor8 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = dst ^ src;

                // The OF and CF flags are cleared; the SF, ZF, and PF flags
                // are set according to the result.
                self.cpu.regs.flags.overflow = false;
                self.cpu.regs.flags.carry = false;
                self.cpu.regs.flags.set_sign_u8(res);
                self.cpu.regs.flags.set_zero_u8(res);
                self.cpu.regs.flags.set_parity(res);
                self.cpu.write_parameter_u8(&mut self.mmu, &op.params.dst, res as u8);
            }
            Op::Xor16 => {
                let src = self.cpu.read_parameter_value(&self.mmu, &op.params.src);
                let dst = self.cpu.read_parameter_value(&self.mmu, &op.params.dst);
                let res = dst ^ src;

                self.cpu.regs.flags.overflow = false;
                self.cpu.regs.flags.carry = false;
                self.cpu.regs.flags.set_sign_u16(res);
                self.cpu.regs.flags.set_zero_u16(res);
                self.cpu.regs.flags.set_parity(res);
                self.cpu.write_parameter_u16(&mut self.mmu, &op.params.dst, res as u16);
            }
            _ => {
                let (cs, ip) = self.cpu.get_address_pair();
                error!("execute error: unhandled '{}' at {:04X}:{:04X}", op, cs, ip);
                self.cpu.fatal_error = true;
            }
        }

        // a string op under a repeat prefix decrements CX and loops back
        // while the count (and for cmps/scas the zero flag) allows
        match op.repeat {
            RepeatMode::Rep => {
                let cx = self.cpu.get_r16(R::CX).wrapping_sub(1);
                self.cpu.set_r16(R::CX, cx);
                if cx != 0 {
                    self.cpu.regs.ip = start_ip;
                }
            }
            RepeatMode::Repe => {
                let cx = self.cpu.get_r16(R::CX).wrapping_sub(1);
                self.cpu.set_r16(R::CX, cx);
                if cx != 0 && self.cpu.regs.flags.zero {
                    self.cpu.regs.ip = start_ip;
                }
            }
            RepeatMode::Repne => {
                let cx = self.cpu.get_r16(R::CX).wrapping_sub(1);
                self.cpu.set_r16(R::CX, cx);
                if cx != 0 && !self.cpu.regs.flags.zero {
                    self.cpu.regs.ip = start_ip;
                }
            }
            RepeatMode::None => {}
        }

        if op.lock {
            // single-threaded, bus locking has no observable effect
        }
    }
}
