/// Instruction and interrupt forms with fixed cycle costs in the reference engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleCostKind {
    /// No-operation, also charged for each step spent halted.
    Nop,
    /// `HALT`.
    Halt,
    /// Register swaps (`EX AF,AF'`, `EXX`, `EX DE,HL`).
    Exchange,
    /// `EX (SP),HL`.
    ExchangeStack,
    /// `LD r,r'`.
    LoadRegister,
    /// `LD r,n`.
    LoadImmediate,
    /// Register-indirect load or store (`LD r,(HL)`, `LD (BC),A`, ...).
    LoadIndirect,
    /// `LD (HL),n`.
    StoreImmediateIndirect,
    /// `LD rr,nn`.
    LoadImmediate16,
    /// `LD (nn),A` / `LD A,(nn)`.
    LoadAbsolute,
    /// `LD (nn),HL` / `LD HL,(nn)`.
    LoadAbsolute16,
    /// `LD SP,HL`.
    LoadStackPointer,
    /// 8-bit register increment or decrement.
    Inc8,
    /// `INC (HL)` / `DEC (HL)`.
    IncIndirect,
    /// 16-bit register increment or decrement.
    Inc16,
    /// `ADD HL,rr`.
    Add16,
    /// Register-operand ALU instruction.
    Alu,
    /// Memory or immediate operand ALU instruction.
    AluOperand,
    /// Accumulator rotates and flag operations (`RLCA`, `CPL`, `SCF`, ...).
    Accumulator,
    /// `NEG`.
    Negate,
    /// `JP nn` and `JP cc,nn`.
    Jump,
    /// `JP (HL)`.
    JumpIndirect,
    /// `JR` taken.
    RelativeTaken,
    /// `JR cc` not taken.
    RelativeNotTaken,
    /// `DJNZ` taken.
    DjnzTaken,
    /// `DJNZ` falling through.
    DjnzNotTaken,
    /// `CALL` taken.
    CallTaken,
    /// `CALL cc` not taken.
    CallNotTaken,
    /// Unconditional `RET`.
    Ret,
    /// `RET cc` taken.
    RetTaken,
    /// `RET cc` not taken.
    RetNotTaken,
    /// `RETN` / `RETI`.
    InterruptReturn,
    /// `RST p`.
    Restart,
    /// `PUSH rr`.
    Push,
    /// `POP rr`.
    Pop,
    /// `IN A,(n)`.
    PortIn,
    /// `OUT (n),A`.
    PortOut,
    /// `DI` / `EI`.
    InterruptControl,
    /// `IM n`.
    InterruptMode,
    /// `LD I,A`.
    LoadInterruptVector,
    /// Opcode outside the supported subset.
    Unknown,
    /// `ED`-prefixed opcode outside the supported subset.
    UnknownExtended,
    /// Non-maskable interrupt acceptance.
    NmiAccept,
    /// Mode 0/1 maskable interrupt acceptance.
    InterruptAccept,
    /// Mode 2 maskable interrupt acceptance.
    VectoredInterruptAccept,
}

impl CycleCostKind {
    /// Cycle cost of this form.
    #[must_use]
    pub const fn cycles(self) -> u32 {
        match self {
            Self::Nop
            | Self::Halt
            | Self::Exchange
            | Self::LoadRegister
            | Self::Inc8
            | Self::Alu
            | Self::Accumulator
            | Self::JumpIndirect
            | Self::InterruptControl
            | Self::Unknown => 4,
            Self::RetNotTaken => 5,
            Self::Inc16 | Self::LoadStackPointer => 6,
            Self::LoadImmediate
            | Self::LoadIndirect
            | Self::AluOperand
            | Self::RelativeNotTaken => 7,
            Self::Negate | Self::InterruptMode | Self::DjnzNotTaken | Self::UnknownExtended => 8,
            Self::LoadInterruptVector => 9,
            Self::StoreImmediateIndirect
            | Self::LoadImmediate16
            | Self::Jump
            | Self::CallNotTaken
            | Self::Ret
            | Self::Pop => 10,
            Self::IncIndirect
            | Self::Add16
            | Self::RetTaken
            | Self::Restart
            | Self::Push
            | Self::PortIn
            | Self::PortOut
            | Self::NmiAccept => 11,
            Self::RelativeTaken => 12,
            Self::LoadAbsolute | Self::DjnzTaken | Self::InterruptAccept => 13,
            Self::InterruptReturn => 14,
            Self::LoadAbsolute16 => 16,
            Self::CallTaken => 17,
            Self::ExchangeStack | Self::VectoredInterruptAccept => 19,
        }
    }
}
