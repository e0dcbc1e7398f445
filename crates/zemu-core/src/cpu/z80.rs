//! Z80-subset interpreter.
//!
//! Covers loads, 8/16-bit arithmetic, the accumulator ALU group, jumps,
//! calls and returns with conditions, the stack, `IN A,(n)` / `OUT (n),A`,
//! interrupt control and `HALT`. Index registers and the `CB`, `DD` and `FD`
//! prefix groups are not implemented; those opcodes run as 4-cycle no-ops and
//! are logged at `warn`.

use log::{trace, warn};

use super::timing::CycleCostKind;
use super::CpuEngine;
use crate::bus::SystemBus;

/// Address the engine jumps to when it accepts a non-maskable interrupt.
pub const NMI_VECTOR: u16 = 0x0066;

/// Address the engine jumps to when it accepts a mode 0/1 maskable interrupt.
pub const RESTART_VECTOR: u16 = 0x0038;

const FLAG_C: u8 = 0x01;
const FLAG_N: u8 = 0x02;
const FLAG_PV: u8 = 0x04;
const FLAG_H: u8 = 0x10;
const FLAG_Z: u8 = 0x40;
const FLAG_S: u8 = 0x80;

/// Programmer-visible register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Registers {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    /// Shadow `AF'`.
    pub af_alt: u16,
    /// Shadow `BC'`.
    pub bc_alt: u16,
    /// Shadow `DE'`.
    pub de_alt: u16,
    /// Shadow `HL'`.
    pub hl_alt: u16,
    /// Interrupt vector base used in mode 2.
    pub i: u8,
    pub sp: u16,
    pub pc: u16,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            a: 0xFF,
            f: 0xFF,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            af_alt: 0,
            bc_alt: 0,
            de_alt: 0,
            hl_alt: 0,
            i: 0,
            sp: 0xFFFF,
            pc: 0,
        }
    }
}

impl Registers {
    /// `AF` pair.
    #[must_use]
    pub const fn af(&self) -> u16 {
        u16::from_be_bytes([self.a, self.f])
    }

    /// `BC` pair.
    #[must_use]
    pub const fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    /// `DE` pair.
    #[must_use]
    pub const fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    /// `HL` pair.
    #[must_use]
    pub const fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    /// Writes the `AF` pair.
    pub const fn set_af(&mut self, value: u16) {
        [self.a, self.f] = value.to_be_bytes();
    }

    /// Writes the `BC` pair.
    pub const fn set_bc(&mut self, value: u16) {
        [self.b, self.c] = value.to_be_bytes();
    }

    /// Writes the `DE` pair.
    pub const fn set_de(&mut self, value: u16) {
        [self.d, self.e] = value.to_be_bytes();
    }

    /// Writes the `HL` pair.
    pub const fn set_hl(&mut self, value: u16) {
        [self.h, self.l] = value.to_be_bytes();
    }

    /// Reads a register by assembler name (`a`, `hl`, `sp`, `bc'`, ...), ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<u16> {
        let value = match name.to_ascii_lowercase().as_str() {
            "a" => u16::from(self.a),
            "f" => u16::from(self.f),
            "b" => u16::from(self.b),
            "c" => u16::from(self.c),
            "d" => u16::from(self.d),
            "e" => u16::from(self.e),
            "h" => u16::from(self.h),
            "l" => u16::from(self.l),
            "i" => u16::from(self.i),
            "af" => self.af(),
            "bc" => self.bc(),
            "de" => self.de(),
            "hl" => self.hl(),
            "af'" => self.af_alt,
            "bc'" => self.bc_alt,
            "de'" => self.de_alt,
            "hl'" => self.hl_alt,
            "sp" => self.sp,
            "pc" => self.pc,
            _ => return None,
        };
        Some(value)
    }

    /// Writes a register by name; 8-bit registers keep the low byte.
    /// Returns `false` for unknown names.
    pub fn set(&mut self, name: &str, value: u16) -> bool {
        let [low, _] = value.to_le_bytes();
        match name.to_ascii_lowercase().as_str() {
            "a" => self.a = low,
            "f" => self.f = low,
            "b" => self.b = low,
            "c" => self.c = low,
            "d" => self.d = low,
            "e" => self.e = low,
            "h" => self.h = low,
            "l" => self.l = low,
            "i" => self.i = low,
            "af" => self.set_af(value),
            "bc" => self.set_bc(value),
            "de" => self.set_de(value),
            "hl" => self.set_hl(value),
            "af'" => self.af_alt = value,
            "bc'" => self.bc_alt = value,
            "de'" => self.de_alt = value,
            "hl'" => self.hl_alt = value,
            "sp" => self.sp = value,
            "pc" => self.pc = value,
            _ => return false,
        }
        true
    }
}

/// Reference [`CpuEngine`] implementing the Z80 subset described in the module docs.
///
/// NMI is edge-triggered: [`CpuEngine::raise_nmi`] reports the line as
/// asserted for the last step, and only a step where it was not asserted
/// before latches a new request.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Z80Core {
    regs: Registers,
    iff1: bool,
    iff2: bool,
    interrupt_mode: u8,
    halted: bool,
    nmi_pending: bool,
    nmi_line: bool,
    nmi_line_before: bool,
    interrupt_line: bool,
    ei_delay: bool,
}

impl Z80Core {
    /// Creates an engine in its power-on state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register file.
    #[must_use]
    pub const fn registers(&self) -> &Registers {
        &self.regs
    }

    /// Mutable register file.
    pub const fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    /// Whether maskable interrupts are enabled (`IFF1`).
    #[must_use]
    pub const fn interrupts_enabled(&self) -> bool {
        self.iff1
    }

    /// Current interrupt mode (0, 1 or 2).
    #[must_use]
    pub const fn interrupt_mode(&self) -> u8 {
        self.interrupt_mode
    }

    fn fetch(&mut self, bus: &mut dyn SystemBus) -> u8 {
        let value = bus.memory_read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    fn fetch_word(&mut self, bus: &mut dyn SystemBus) -> u16 {
        let low = self.fetch(bus);
        let high = self.fetch(bus);
        u16::from_le_bytes([low, high])
    }

    fn read_word(bus: &mut dyn SystemBus, addr: u16) -> u16 {
        let low = bus.memory_read(addr);
        let high = bus.memory_read(addr.wrapping_add(1));
        u16::from_le_bytes([low, high])
    }

    fn write_word(bus: &mut dyn SystemBus, addr: u16, value: u16) {
        let [low, high] = value.to_le_bytes();
        bus.memory_write(addr, low);
        bus.memory_write(addr.wrapping_add(1), high);
    }

    fn push(&mut self, bus: &mut dyn SystemBus, value: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(2);
        Self::write_word(bus, self.regs.sp, value);
    }

    fn pop(&mut self, bus: &mut dyn SystemBus) -> u16 {
        let value = Self::read_word(bus, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(2);
        value
    }

    fn reg8(&self, bus: &mut dyn SystemBus, index: u8) -> u8 {
        match index {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => self.regs.h,
            5 => self.regs.l,
            6 => bus.memory_read(self.regs.hl()),
            _ => self.regs.a,
        }
    }

    fn set_reg8(&mut self, bus: &mut dyn SystemBus, index: u8, value: u8) {
        match index {
            0 => self.regs.b = value,
            1 => self.regs.c = value,
            2 => self.regs.d = value,
            3 => self.regs.e = value,
            4 => self.regs.h = value,
            5 => self.regs.l = value,
            6 => bus.memory_write(self.regs.hl(), value),
            _ => self.regs.a = value,
        }
    }

    const fn pair(&self, index: u8) -> u16 {
        match index {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.regs.hl(),
            _ => self.regs.sp,
        }
    }

    const fn set_pair(&mut self, index: u8, value: u16) {
        match index {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.regs.set_hl(value),
            _ => self.regs.sp = value,
        }
    }

    const fn stack_pair(&self, index: u8) -> u16 {
        if index == 3 {
            self.regs.af()
        } else {
            self.pair(index)
        }
    }

    const fn set_stack_pair(&mut self, index: u8, value: u16) {
        if index == 3 {
            self.regs.set_af(value);
        } else {
            self.set_pair(index, value);
        }
    }

    /// Evaluates condition code `NZ, Z, NC, C, PO, PE, P, M` by index.
    const fn condition(&self, index: u8) -> bool {
        let f = self.regs.f;
        match index {
            0 => f & FLAG_Z == 0,
            1 => f & FLAG_Z != 0,
            2 => f & FLAG_C == 0,
            3 => f & FLAG_C != 0,
            4 => f & FLAG_PV == 0,
            5 => f & FLAG_PV != 0,
            6 => f & FLAG_S == 0,
            _ => f & FLAG_S != 0,
        }
    }

    fn jump_relative(&mut self, displacement: u8) {
        let offset = i16::from(i8::from_ne_bytes([displacement]));
        self.regs.pc = self.regs.pc.wrapping_add_signed(offset);
    }

    fn add8(&mut self, a: u8, value: u8, carry: u8) -> u8 {
        let wide = u16::from(a) + u16::from(value) + u16::from(carry);
        let [result, high] = wide.to_le_bytes();
        let mut f = sign_zero(result);
        if (a & 0x0F) + (value & 0x0F) + carry > 0x0F {
            f |= FLAG_H;
        }
        if (a ^ value) & 0x80 == 0 && (a ^ result) & 0x80 != 0 {
            f |= FLAG_PV;
        }
        if high != 0 {
            f |= FLAG_C;
        }
        self.regs.f = f;
        result
    }

    fn sub8(&mut self, a: u8, value: u8, carry: u8) -> u8 {
        let result = a.wrapping_sub(value).wrapping_sub(carry);
        let mut f = sign_zero(result) | FLAG_N;
        if (a & 0x0F) < (value & 0x0F) + carry {
            f |= FLAG_H;
        }
        if (a ^ value) & 0x80 != 0 && (a ^ result) & 0x80 != 0 {
            f |= FLAG_PV;
        }
        if u16::from(a) < u16::from(value) + u16::from(carry) {
            f |= FLAG_C;
        }
        self.regs.f = f;
        result
    }

    /// `ADD, ADC, SUB, SBC, AND, XOR, OR, CP` by index.
    fn alu(&mut self, op: u8, value: u8) {
        let a = self.regs.a;
        let carry = self.regs.f & FLAG_C;
        match op {
            0 => self.regs.a = self.add8(a, value, 0),
            1 => self.regs.a = self.add8(a, value, carry),
            2 => self.regs.a = self.sub8(a, value, 0),
            3 => self.regs.a = self.sub8(a, value, carry),
            4 => {
                self.regs.a = a & value;
                self.regs.f = sign_zero_parity(self.regs.a) | FLAG_H;
            }
            5 => {
                self.regs.a = a ^ value;
                self.regs.f = sign_zero_parity(self.regs.a);
            }
            6 => {
                self.regs.a = a | value;
                self.regs.f = sign_zero_parity(self.regs.a);
            }
            _ => {
                self.sub8(a, value, 0);
            }
        }
    }

    const fn inc8(&mut self, value: u8) -> u8 {
        let result = value.wrapping_add(1);
        let mut f = (self.regs.f & FLAG_C) | sign_zero(result);
        if value & 0x0F == 0x0F {
            f |= FLAG_H;
        }
        if value == 0x7F {
            f |= FLAG_PV;
        }
        self.regs.f = f;
        result
    }

    const fn dec8(&mut self, value: u8) -> u8 {
        let result = value.wrapping_sub(1);
        let mut f = (self.regs.f & FLAG_C) | sign_zero(result) | FLAG_N;
        if value & 0x0F == 0 {
            f |= FLAG_H;
        }
        if value == 0x80 {
            f |= FLAG_PV;
        }
        self.regs.f = f;
        result
    }

    const fn add16(&mut self, value: u16) {
        let hl = self.regs.hl();
        let mut f = self.regs.f & (FLAG_S | FLAG_Z | FLAG_PV);
        if (hl & 0x0FFF) + (value & 0x0FFF) > 0x0FFF {
            f |= FLAG_H;
        }
        if hl.checked_add(value).is_none() {
            f |= FLAG_C;
        }
        self.regs.f = f;
        self.regs.set_hl(hl.wrapping_add(value));
    }

    /// `RLCA, RRCA, RLA, RRA, DAA (unsupported), CPL, SCF, CCF` by index.
    fn accumulator_op(&mut self, op: u8) -> CycleCostKind {
        let a = self.regs.a;
        let kept = self.regs.f & (FLAG_S | FLAG_Z | FLAG_PV);
        let carry_in = self.regs.f & FLAG_C;
        match op {
            0 => {
                self.regs.a = a.rotate_left(1);
                self.regs.f = kept | (a >> 7);
            }
            1 => {
                self.regs.a = a.rotate_right(1);
                self.regs.f = kept | (a & FLAG_C);
            }
            2 => {
                self.regs.a = (a << 1) | carry_in;
                self.regs.f = kept | (a >> 7);
            }
            3 => {
                self.regs.a = (a >> 1) | (carry_in << 7);
                self.regs.f = kept | (a & FLAG_C);
            }
            5 => {
                self.regs.a = !a;
                self.regs.f |= FLAG_H | FLAG_N;
            }
            6 => self.regs.f = kept | FLAG_C,
            7 => {
                let flip = if carry_in == 0 { FLAG_C } else { FLAG_H };
                self.regs.f = kept | flip;
            }
            _ => return self.unknown(0x27),
        }
        CycleCostKind::Accumulator
    }

    fn unknown(&self, opcode: u8) -> CycleCostKind {
        warn!(
            "unsupported opcode {opcode:02X} at {:#06X}; executed as no-op",
            self.regs.pc.wrapping_sub(1)
        );
        CycleCostKind::Unknown
    }

    fn accept_nmi(&mut self, bus: &mut dyn SystemBus) -> CycleCostKind {
        trace!("nmi accepted at {:#06X}", self.regs.pc);
        self.nmi_pending = false;
        self.halted = false;
        self.iff2 = self.iff1;
        self.iff1 = false;
        self.push(bus, self.regs.pc);
        self.regs.pc = NMI_VECTOR;
        CycleCostKind::NmiAccept
    }

    fn accept_interrupt(&mut self, bus: &mut dyn SystemBus) -> CycleCostKind {
        trace!(
            "interrupt accepted at {:#06X} in mode {}",
            self.regs.pc,
            self.interrupt_mode
        );
        self.halted = false;
        self.iff1 = false;
        self.iff2 = false;
        self.push(bus, self.regs.pc);
        if self.interrupt_mode == 2 {
            let table = u16::from_be_bytes([self.regs.i, 0xFF]);
            self.regs.pc = Self::read_word(bus, table);
            CycleCostKind::VectoredInterruptAccept
        } else {
            self.regs.pc = RESTART_VECTOR;
            CycleCostKind::InterruptAccept
        }
    }

    #[allow(clippy::too_many_lines)]
    fn execute(&mut self, bus: &mut dyn SystemBus, opcode: u8) -> CycleCostKind {
        use CycleCostKind as Cost;

        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;
        let p = y >> 1;

        match opcode {
            0x00 => Cost::Nop,
            0x08 => {
                let af = self.regs.af();
                self.regs.set_af(self.regs.af_alt);
                self.regs.af_alt = af;
                Cost::Exchange
            }
            0x10 => {
                let displacement = self.fetch(bus);
                self.regs.b = self.regs.b.wrapping_sub(1);
                if self.regs.b == 0 {
                    Cost::DjnzNotTaken
                } else {
                    self.jump_relative(displacement);
                    Cost::DjnzTaken
                }
            }
            0x18 => {
                let displacement = self.fetch(bus);
                self.jump_relative(displacement);
                Cost::RelativeTaken
            }
            0x20 | 0x28 | 0x30 | 0x38 => {
                let displacement = self.fetch(bus);
                if self.condition(y - 4) {
                    self.jump_relative(displacement);
                    Cost::RelativeTaken
                } else {
                    Cost::RelativeNotTaken
                }
            }
            0x01 | 0x11 | 0x21 | 0x31 => {
                let value = self.fetch_word(bus);
                self.set_pair(p, value);
                Cost::LoadImmediate16
            }
            0x09 | 0x19 | 0x29 | 0x39 => {
                self.add16(self.pair(p));
                Cost::Add16
            }
            0x02 => {
                bus.memory_write(self.regs.bc(), self.regs.a);
                Cost::LoadIndirect
            }
            0x12 => {
                bus.memory_write(self.regs.de(), self.regs.a);
                Cost::LoadIndirect
            }
            0x0A => {
                self.regs.a = bus.memory_read(self.regs.bc());
                Cost::LoadIndirect
            }
            0x1A => {
                self.regs.a = bus.memory_read(self.regs.de());
                Cost::LoadIndirect
            }
            0x22 => {
                let addr = self.fetch_word(bus);
                Self::write_word(bus, addr, self.regs.hl());
                Cost::LoadAbsolute16
            }
            0x2A => {
                let addr = self.fetch_word(bus);
                let value = Self::read_word(bus, addr);
                self.regs.set_hl(value);
                Cost::LoadAbsolute16
            }
            0x32 => {
                let addr = self.fetch_word(bus);
                bus.memory_write(addr, self.regs.a);
                Cost::LoadAbsolute
            }
            0x3A => {
                let addr = self.fetch_word(bus);
                self.regs.a = bus.memory_read(addr);
                Cost::LoadAbsolute
            }
            0x03 | 0x13 | 0x23 | 0x33 => {
                self.set_pair(p, self.pair(p).wrapping_add(1));
                Cost::Inc16
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                self.set_pair(p, self.pair(p).wrapping_sub(1));
                Cost::Inc16
            }
            op if op & 0xC7 == 0x04 => {
                let value = self.reg8(bus, y);
                let result = self.inc8(value);
                self.set_reg8(bus, y, result);
                if y == 6 {
                    Cost::IncIndirect
                } else {
                    Cost::Inc8
                }
            }
            op if op & 0xC7 == 0x05 => {
                let value = self.reg8(bus, y);
                let result = self.dec8(value);
                self.set_reg8(bus, y, result);
                if y == 6 {
                    Cost::IncIndirect
                } else {
                    Cost::Inc8
                }
            }
            op if op & 0xC7 == 0x06 => {
                let value = self.fetch(bus);
                self.set_reg8(bus, y, value);
                if y == 6 {
                    Cost::StoreImmediateIndirect
                } else {
                    Cost::LoadImmediate
                }
            }
            op if op & 0xC7 == 0x07 => self.accumulator_op(y),
            0x76 => {
                self.halted = true;
                Cost::Halt
            }
            0x40..=0x7F => {
                let value = self.reg8(bus, z);
                self.set_reg8(bus, y, value);
                if y == 6 || z == 6 {
                    Cost::LoadIndirect
                } else {
                    Cost::LoadRegister
                }
            }
            0x80..=0xBF => {
                let value = self.reg8(bus, z);
                self.alu(y, value);
                if z == 6 {
                    Cost::AluOperand
                } else {
                    Cost::Alu
                }
            }
            0xC9 => {
                self.regs.pc = self.pop(bus);
                Cost::Ret
            }
            0xD9 => {
                let (bc, de, hl) = (self.regs.bc(), self.regs.de(), self.regs.hl());
                self.regs.set_bc(self.regs.bc_alt);
                self.regs.set_de(self.regs.de_alt);
                self.regs.set_hl(self.regs.hl_alt);
                self.regs.bc_alt = bc;
                self.regs.de_alt = de;
                self.regs.hl_alt = hl;
                Cost::Exchange
            }
            0xE9 => {
                self.regs.pc = self.regs.hl();
                Cost::JumpIndirect
            }
            0xF9 => {
                self.regs.sp = self.regs.hl();
                Cost::LoadStackPointer
            }
            0xC3 => {
                self.regs.pc = self.fetch_word(bus);
                Cost::Jump
            }
            0xCD => {
                let target = self.fetch_word(bus);
                self.push(bus, self.regs.pc);
                self.regs.pc = target;
                Cost::CallTaken
            }
            0xD3 => {
                let port = self.fetch(bus);
                bus.io_write(port, self.regs.a);
                Cost::PortOut
            }
            0xDB => {
                let port = self.fetch(bus);
                self.regs.a = bus.io_read(port);
                Cost::PortIn
            }
            0xE3 => {
                let top = Self::read_word(bus, self.regs.sp);
                Self::write_word(bus, self.regs.sp, self.regs.hl());
                self.regs.set_hl(top);
                Cost::ExchangeStack
            }
            0xEB => {
                let de = self.regs.de();
                self.regs.set_de(self.regs.hl());
                self.regs.set_hl(de);
                Cost::Exchange
            }
            0xF3 => {
                self.iff1 = false;
                self.iff2 = false;
                Cost::InterruptControl
            }
            0xFB => {
                self.iff1 = true;
                self.iff2 = true;
                self.ei_delay = true;
                Cost::InterruptControl
            }
            0xED => self.execute_extended(bus),
            op if op & 0xC7 == 0xC0 => {
                if self.condition(y) {
                    self.regs.pc = self.pop(bus);
                    Cost::RetTaken
                } else {
                    Cost::RetNotTaken
                }
            }
            op if op & 0xCF == 0xC1 => {
                let value = self.pop(bus);
                self.set_stack_pair(p, value);
                Cost::Pop
            }
            op if op & 0xC7 == 0xC2 => {
                let target = self.fetch_word(bus);
                if self.condition(y) {
                    self.regs.pc = target;
                }
                Cost::Jump
            }
            op if op & 0xC7 == 0xC4 => {
                let target = self.fetch_word(bus);
                if self.condition(y) {
                    self.push(bus, self.regs.pc);
                    self.regs.pc = target;
                    Cost::CallTaken
                } else {
                    Cost::CallNotTaken
                }
            }
            op if op & 0xCF == 0xC5 => {
                self.push(bus, self.stack_pair(p));
                Cost::Push
            }
            op if op & 0xC7 == 0xC6 => {
                let value = self.fetch(bus);
                self.alu(y, value);
                Cost::AluOperand
            }
            op if op & 0xC7 == 0xC7 => {
                self.push(bus, self.regs.pc);
                self.regs.pc = u16::from(y) * 8;
                Cost::Restart
            }
            _ => self.unknown(opcode),
        }
    }

    fn execute_extended(&mut self, bus: &mut dyn SystemBus) -> CycleCostKind {
        let opcode = self.fetch(bus);
        match opcode {
            0x44 => {
                self.regs.a = self.sub8(0, self.regs.a, 0);
                CycleCostKind::Negate
            }
            0x45 => {
                self.iff1 = self.iff2;
                self.regs.pc = self.pop(bus);
                CycleCostKind::InterruptReturn
            }
            0x4D => {
                self.regs.pc = self.pop(bus);
                CycleCostKind::InterruptReturn
            }
            0x46 => {
                self.interrupt_mode = 0;
                CycleCostKind::InterruptMode
            }
            0x56 => {
                self.interrupt_mode = 1;
                CycleCostKind::InterruptMode
            }
            0x5E => {
                self.interrupt_mode = 2;
                CycleCostKind::InterruptMode
            }
            0x47 => {
                self.regs.i = self.regs.a;
                CycleCostKind::LoadInterruptVector
            }
            _ => {
                warn!(
                    "unsupported opcode ED {opcode:02X} at {:#06X}; executed as no-op",
                    self.regs.pc.wrapping_sub(2)
                );
                CycleCostKind::UnknownExtended
            }
        }
    }
}

const fn sign_zero(value: u8) -> u8 {
    let zero = if value == 0 { FLAG_Z } else { 0 };
    (value & FLAG_S) | zero
}

const fn sign_zero_parity(value: u8) -> u8 {
    let parity = if value.count_ones() % 2 == 0 { FLAG_PV } else { 0 };
    sign_zero(value) | parity
}

impl CpuEngine for Z80Core {
    fn step(&mut self, bus: &mut dyn SystemBus) -> u32 {
        self.nmi_line_before = self.nmi_line;
        self.nmi_line = false;
        if self.nmi_pending {
            return self.accept_nmi(bus).cycles();
        }
        if self.interrupt_line && self.iff1 && !self.ei_delay {
            return self.accept_interrupt(bus).cycles();
        }
        self.ei_delay = false;
        if self.halted {
            return CycleCostKind::Nop.cycles();
        }
        let opcode = self.fetch(bus);
        self.execute(bus, opcode).cycles()
    }

    fn halted(&self) -> bool {
        self.halted
    }

    fn program_counter(&self) -> u16 {
        self.regs.pc
    }

    fn set_program_counter(&mut self, pc: u16) {
        self.regs.pc = pc;
    }

    fn register(&self, name: &str) -> Option<u16> {
        self.regs.get(name)
    }

    fn set_register(&mut self, name: &str, value: u16) -> bool {
        self.regs.set(name, value)
    }

    fn raise_nmi(&mut self) {
        if !self.nmi_line_before && !self.nmi_line {
            self.nmi_pending = true;
        }
        self.nmi_line = true;
    }

    fn set_interrupt(&mut self, active: bool) {
        self.interrupt_line = active;
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}
