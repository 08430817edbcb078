#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    /// ASCII Adjust After Addition
    Aaa,

    /// ASCII Adjust AX Before Division
    Aad,

    /// ASCII Adjust AX After Multiply
    Aam,

    /// ASCII Adjust AL After Subtraction
    Aas,

    Adc8,
    Adc16,
    Add8,
    Add16,
    And8,
    And16,
    CallFar,
    CallNear,

    /// Convert Byte to Word
    Cbw,

    /// Clear Carry Flag
    Clc,

    /// Clear Direction Flag
    Cld,

    /// Clear Interrupt Flag
    Cli,

    /// Complement Carry Flag
    Cmc,

    Cmp8,
    Cmp16,
    Cmpsb,
    Cmpsw,

    /// Convert Word to Doubleword
    Cwd,

    /// Decimal Adjust AL after Addition
    Daa,

    /// Decimal Adjust AL after Subtraction
    Das,

    Dec8,
    Dec16,
    Div8,
    Div16,
    Hlt,

    /// dispatches the most recent interrupt vector to the host
    /// (synthetic stub opcode, not part of the 8086 map)
    HostInterrupt,

    Idiv8,
    Idiv16,
    Imul8,
    Imul16,

    /// Input from Port
    In8,
    In16,

    Inc8,
    Inc16,
    Int,
    Into,
    Iret,

    /// Jump if above (CF=0 and ZF=0).    (alias: jnbe)
    Ja,

    /// Jump if carry (CF=1).    (alias: jb, jnae)
    Jc,

    /// Jump if CX register is 0.
    Jcxz,

    /// Jump if greater (ZF=0 and SF=OF).    (alias: jnle)
    Jg,

    /// Jump if less (SF != OF).    (alias: jnge)
    Jl,

    JmpFar,
    JmpNear,
    JmpShort,

    /// Jump if not above (CF=1 or ZF=1).    (alias: jbe)
    Jna,

    /// Jump if not carry (CF=0).    (alias: jae, jnb)
    Jnc,

    /// Jump if not greater (ZF=1 or SF != OF).    (alias: jle)
    Jng,

    /// Jump if not less (SF=OF).    (alias: jge)
    Jnl,

    /// Jump if not overflow (OF=0).
    Jno,

    /// Jump if not sign (SF=0).
    Jns,

    /// Jump if not zero (ZF=0).    (alias: jne)
    Jnz,

    /// Jump if overflow (OF=1).
    Jo,

    /// Jump if parity even (PF=1).    (alias: jp)
    Jpe,

    /// Jump if parity odd (PF=0).    (alias: jnp)
    Jpo,

    /// Jump if sign (SF=1).
    Js,

    /// Jump if zero (ZF=1).    (alias: je)
    Jz,

    /// Load Status Flags into AH Register
    Lahf,

    /// Load DS:r16 with far pointer from memory
    Lds,

    /// Load Effective Address
    Lea16,

    /// Load ES:r16 with far pointer from memory
    Les,

    Lodsb,
    Lodsw,
    Loop,
    Loope,
    Loopne,
    Mov8,
    Mov16,
    Movsb,
    Movsw,
    Mul8,
    Mul16,
    Neg8,
    Neg16,
    Nop,
    Not8,
    Not16,
    Or8,
    Or16,

    /// Output to Port
    Out8,
    Out16,

    Pop16,
    Popf,
    Push16,
    Pushf,
    Rcl8,
    Rcl16,
    Rcr8,
    Rcr16,
    Retf,
    Retn,
    Rol8,
    Rol16,
    Ror8,
    Ror16,

    /// Store AH into Flags
    Sahf,

    /// Set AL on Carry (undocumented)
    Salc,

    Sar8,
    Sar16,
    Sbb8,
    Sbb16,
    Scasb,
    Scasw,
    Shl8,
    Shl16,
    Shr8,
    Shr16,

    /// Set Carry Flag
    Stc,

    /// Set Direction Flag
    Std,

    /// Set Interrupt Flag
    Sti,

    Stosb,
    Stosw,
    Sub8,
    Sub16,
    Test8,
    Test16,

    /// Wait for pending floating point exceptions (no-op here)
    Wait,

    Xchg8,
    Xchg16,

    /// Table Look-up Translation
    Xlatb,

    Xor8,
    Xor16,

    Uninitialized,
    Invalid(Vec<u8>, Invalid),
}

/// the reason why an instruction could not be decoded
#[derive(Clone, Debug, PartialEq)]
pub enum Invalid {
    /// the opcode byte itself is not part of the executed map
    Op,

    /// the group's reg field has no defined meaning
    Reg(u8),
}
