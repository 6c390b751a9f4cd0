//! 2A03 (NMOS 6502 core, decimal mode absent) instruction execution.
//!
//! The core owns the architectural registers and drives one full
//! fetch/decode/execute/account transition per `step` call. Memory is
//! reached only through the [`CpuBus`] trait, injected per call, so the
//! core runs against the real bus or a flat test fake alike.

use bitflags::bitflags;

use crate::cpu::table::{AddressMode, Instruction, Operation};

pub mod table;

#[cfg(test)]
mod tests;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u8 {
        const CARRY = 0b0000_0001;
        const ZERO = 0b0000_0010;
        const INTERRUPT_DISABLE = 0b0000_0100;
        const DECIMAL = 0b0000_1000;
        const BREAK = 0b0001_0000;
        const UNUSED = 0b0010_0000;
        const OVERFLOW = 0b0100_0000;
        const NEGATIVE = 0b1000_0000;
    }
}

/// Minimal bus capability the core depends on. The core is the sole caller
/// during a step; reads and writes complete synchronously.
pub trait CpuBus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, data: u8);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuError {
    /// The fetched byte has no table entry. Execution must stop; continuing
    /// would dispatch undefined behavior.
    IllegalOpcode { opcode: u8, pc: u16 },
}

impl std::fmt::Display for CpuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CpuError::IllegalOpcode { opcode, pc } => {
                write!(f, "illegal opcode ${:02X} at ${:04X}", opcode, pc)
            }
        }
    }
}

impl std::error::Error for CpuError {}

const STACK_BASE: u16 = 0x0100;
const NMI_VECTOR: u16 = 0xFFFA;
const RESET_VECTOR: u16 = 0xFFFC;
const IRQ_VECTOR: u16 = 0xFFFE;

const RESET_CYCLES: u64 = 7;
const INTERRUPT_CYCLES: u64 = 7;

pub struct Cpu {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub status: StatusFlags,
    total_cycles: u64,

    // Transient decode state, valid only within one step.
    mode: AddressMode,
    operand_addr: u16,
    page_crossed: bool,
    step_cycles: u8,
}

impl Cpu {
    pub fn new() -> Self {
        Cpu {
            a: 0,
            x: 0,
            y: 0,
            sp: 0,
            pc: 0,
            status: StatusFlags::empty(),
            total_cycles: 0,
            mode: AddressMode::Implied,
            operand_addr: 0,
            page_crossed: false,
            step_cycles: 0,
        }
    }

    /// Lifetime cycle total, including reset and interrupt entry costs.
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    // Save state restore path only.
    pub fn set_total_cycles(&mut self, cycles: u64) {
        self.total_cycles = cycles;
    }

    /// Power-on sequence: clears the data registers, parks the stack
    /// pointer at $FD and jumps through the reset vector. Costs the fixed
    /// 7-cycle hardware startup.
    pub fn reset(&mut self, bus: &mut dyn CpuBus) {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.sp = 0xFD;
        self.status = StatusFlags::INTERRUPT_DISABLE | StatusFlags::UNUSED;
        self.pc = self.read_word_at(bus, RESET_VECTOR);
        self.total_cycles += RESET_CYCLES;
    }

    /// Executes exactly one instruction and returns the cycles it consumed.
    /// The call is atomic: every register, flag and bus mutation for the
    /// instruction happens before it returns.
    pub fn step(&mut self, bus: &mut dyn CpuBus) -> Result<u8, CpuError> {
        self.step_cycles = 0;
        self.page_crossed = false;

        let opcode = bus.read(self.pc);
        let Some(instruction) = table::lookup(opcode) else {
            log::error!(
                "halting: illegal opcode ${:02X} at PC ${:04X}",
                opcode,
                self.pc
            );
            return Err(CpuError::IllegalOpcode {
                opcode,
                pc: self.pc,
            });
        };
        self.pc = self.pc.wrapping_add(1);

        self.execute(instruction, bus);
        Ok(self.step_cycles)
    }

    /// Non-maskable interrupt entry. Nothing drives this line yet; the
    /// vector mechanism is exposed for a future PPU.
    #[allow(dead_code)]
    pub fn nmi(&mut self, bus: &mut dyn CpuBus) {
        self.interrupt(bus, NMI_VECTOR);
    }

    /// Maskable interrupt entry, suppressed while the disable flag is set.
    #[allow(dead_code)]
    pub fn irq(&mut self, bus: &mut dyn CpuBus) {
        if self.status.contains(StatusFlags::INTERRUPT_DISABLE) {
            return;
        }
        self.interrupt(bus, IRQ_VECTOR);
    }

    #[allow(dead_code)]
    fn interrupt(&mut self, bus: &mut dyn CpuBus, vector: u16) {
        self.push(bus, (self.pc >> 8) as u8);
        self.push(bus, self.pc as u8);
        // Hardware interrupts push the flags with BREAK clear.
        let flags =
            (self.status.bits() | StatusFlags::UNUSED.bits()) & !StatusFlags::BREAK.bits();
        self.push(bus, flags);
        self.status.insert(StatusFlags::INTERRUPT_DISABLE);
        self.pc = self.read_word_at(bus, vector);
        self.total_cycles += INTERRUPT_CYCLES;
    }

    fn execute(&mut self, instruction: &Instruction, bus: &mut dyn CpuBus) {
        self.mode = instruction.mode;
        self.operand_addr = self.resolve_address(instruction.mode, bus);
        self.run_op(instruction.op, bus);
        if instruction.page_cross && self.page_crossed {
            self.step_cycles += 1;
        }
        self.step_cycles += instruction.cycles;
        self.total_cycles += self.step_cycles as u64;
    }

    fn run_op(&mut self, op: Operation, bus: &mut dyn CpuBus) {
        match op {
            Operation::Adc => self.adc(bus),
            Operation::And => self.and(bus),
            Operation::Asl => self.asl(bus),
            Operation::Bcc => self.branch(bus, !self.status.contains(StatusFlags::CARRY)),
            Operation::Bcs => self.branch(bus, self.status.contains(StatusFlags::CARRY)),
            Operation::Beq => self.branch(bus, self.status.contains(StatusFlags::ZERO)),
            Operation::Bit => self.bit(bus),
            Operation::Bmi => self.branch(bus, self.status.contains(StatusFlags::NEGATIVE)),
            Operation::Bne => self.branch(bus, !self.status.contains(StatusFlags::ZERO)),
            Operation::Bpl => self.branch(bus, !self.status.contains(StatusFlags::NEGATIVE)),
            Operation::Brk => self.brk(bus),
            Operation::Bvc => self.branch(bus, !self.status.contains(StatusFlags::OVERFLOW)),
            Operation::Bvs => self.branch(bus, self.status.contains(StatusFlags::OVERFLOW)),
            Operation::Clc => self.status.remove(StatusFlags::CARRY),
            Operation::Cld => self.status.remove(StatusFlags::DECIMAL),
            Operation::Cli => self.status.remove(StatusFlags::INTERRUPT_DISABLE),
            Operation::Clv => self.status.remove(StatusFlags::OVERFLOW),
            Operation::Cmp => {
                let operand = self.operand(bus);
                self.compare(self.a, operand);
            }
            Operation::Cpx => {
                let operand = self.operand(bus);
                self.compare(self.x, operand);
            }
            Operation::Cpy => {
                let operand = self.operand(bus);
                self.compare(self.y, operand);
            }
            Operation::Dec => self.dec(bus),
            Operation::Dex => {
                self.x = self.x.wrapping_sub(1);
                self.set_zero_negative_flags(self.x);
            }
            Operation::Dey => {
                self.y = self.y.wrapping_sub(1);
                self.set_zero_negative_flags(self.y);
            }
            Operation::Eor => self.eor(bus),
            Operation::Inc => self.inc(bus),
            Operation::Inx => {
                self.x = self.x.wrapping_add(1);
                self.set_zero_negative_flags(self.x);
            }
            Operation::Iny => {
                self.y = self.y.wrapping_add(1);
                self.set_zero_negative_flags(self.y);
            }
            Operation::Jmp => self.pc = self.operand_addr,
            Operation::Jsr => self.jsr(bus),
            Operation::Lda => {
                self.a = self.operand(bus);
                self.set_zero_negative_flags(self.a);
            }
            Operation::Ldx => {
                self.x = self.operand(bus);
                self.set_zero_negative_flags(self.x);
            }
            Operation::Ldy => {
                self.y = self.operand(bus);
                self.set_zero_negative_flags(self.y);
            }
            Operation::Lsr => self.lsr(bus),
            Operation::Nop => {}
            Operation::Ora => self.ora(bus),
            Operation::Pha => self.push(bus, self.a),
            Operation::Php => {
                // PHP always pushes with BREAK set.
                self.push(bus, self.status.bits() | StatusFlags::BREAK.bits());
            }
            Operation::Pla => {
                self.a = self.pull(bus);
                self.set_zero_negative_flags(self.a);
            }
            Operation::Plp => {
                let bits = self.pull(bus);
                self.status = StatusFlags::from_bits_truncate(bits);
                self.status.remove(StatusFlags::BREAK);
                self.status.insert(StatusFlags::UNUSED);
            }
            Operation::Rol => self.rol(bus),
            Operation::Ror => self.ror(bus),
            Operation::Rti => self.rti(bus),
            Operation::Rts => self.rts(bus),
            Operation::Sbc => self.sbc(bus),
            Operation::Sec => self.status.insert(StatusFlags::CARRY),
            Operation::Sed => self.status.insert(StatusFlags::DECIMAL),
            Operation::Sei => self.status.insert(StatusFlags::INTERRUPT_DISABLE),
            Operation::Sta => self.store(bus, self.a),
            Operation::Stx => self.store(bus, self.x),
            Operation::Sty => self.store(bus, self.y),
            Operation::Tax => {
                self.x = self.a;
                self.set_zero_negative_flags(self.x);
            }
            Operation::Tay => {
                self.y = self.a;
                self.set_zero_negative_flags(self.y);
            }
            Operation::Tsx => {
                self.x = self.sp;
                self.set_zero_negative_flags(self.x);
            }
            Operation::Txa => {
                self.a = self.x;
                self.set_zero_negative_flags(self.a);
            }
            // TXS is the one transfer that leaves the flags alone.
            Operation::Txs => self.sp = self.x,
            Operation::Tya => {
                self.a = self.y;
                self.set_zero_negative_flags(self.a);
            }
        }
    }

    // --- addressing -------------------------------------------------------

    fn resolve_address(&mut self, mode: AddressMode, bus: &mut dyn CpuBus) -> u16 {
        match mode {
            AddressMode::Implied | AddressMode::Accumulator => 0,
            // The operand byte's own address; Relative defers the
            // displacement to the branch handler.
            AddressMode::Immediate | AddressMode::Relative => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                addr
            }
            AddressMode::ZeroPage => self.zero_page_addr(bus, 0),
            AddressMode::ZeroPageX => self.zero_page_addr(bus, self.x),
            AddressMode::ZeroPageY => self.zero_page_addr(bus, self.y),
            AddressMode::Absolute => self.absolute_addr(bus, 0),
            AddressMode::AbsoluteX => self.absolute_addr(bus, self.x),
            AddressMode::AbsoluteY => self.absolute_addr(bus, self.y),
            AddressMode::Indirect => {
                let ptr = self.read_word(bus);
                self.read_wrapped_page(bus, ptr)
            }
            AddressMode::IndirectX => {
                let ptr = self.read_byte(bus).wrapping_add(self.x) as u16;
                self.read_wrapped_page(bus, ptr)
            }
            AddressMode::IndirectY => {
                let ptr = self.read_byte(bus) as u16;
                let base = self.read_wrapped_page(bus, ptr);
                let addr = base.wrapping_add(self.y as u16);
                self.page_crossed = page_crossed(base, addr);
                addr
            }
        }
    }

    fn zero_page_addr(&mut self, bus: &mut dyn CpuBus, index: u8) -> u16 {
        self.read_byte(bus).wrapping_add(index) as u16
    }

    fn absolute_addr(&mut self, bus: &mut dyn CpuBus, index: u8) -> u16 {
        let base = self.read_word(bus);
        let addr = base.wrapping_add(index as u16);
        self.page_crossed = page_crossed(base, addr);
        addr
    }

    /// 16-bit pointer fetch that never leaves the page of its low byte: a
    /// pointer at $xxFF reads its high byte from $xx00. Hardware quirk,
    /// shared by JMP (indirect) and both zero-page indirect modes.
    fn read_wrapped_page(&mut self, bus: &mut dyn CpuBus, addr: u16) -> u16 {
        let lo = bus.read(addr) as u16;
        let hi_addr = if addr & 0x00FF == 0x00FF {
            addr & 0xFF00
        } else {
            addr.wrapping_add(1)
        };
        let hi = bus.read(hi_addr) as u16;
        (hi << 8) | lo
    }

    fn read_byte(&mut self, bus: &mut dyn CpuBus) -> u8 {
        let value = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    fn read_word(&mut self, bus: &mut dyn CpuBus) -> u16 {
        let lo = self.read_byte(bus) as u16;
        let hi = self.read_byte(bus) as u16;
        (hi << 8) | lo
    }

    fn read_word_at(&mut self, bus: &mut dyn CpuBus, addr: u16) -> u16 {
        let lo = bus.read(addr) as u16;
        let hi = bus.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    // --- operand access ---------------------------------------------------

    fn operand(&mut self, bus: &mut dyn CpuBus) -> u8 {
        match self.mode {
            AddressMode::Accumulator => self.a,
            _ => bus.read(self.operand_addr),
        }
    }

    fn store(&mut self, bus: &mut dyn CpuBus, value: u8) {
        match self.mode {
            AddressMode::Accumulator => self.a = value,
            _ => bus.write(self.operand_addr, value),
        }
    }

    // --- stack ------------------------------------------------------------

    fn push(&mut self, bus: &mut dyn CpuBus, value: u8) {
        bus.write(STACK_BASE | self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pull(&mut self, bus: &mut dyn CpuBus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read(STACK_BASE | self.sp as u16)
    }

    // --- flags ------------------------------------------------------------

    fn set_zero_negative_flags(&mut self, value: u8) {
        self.status.set(StatusFlags::ZERO, value == 0);
        self.status.set(StatusFlags::NEGATIVE, value & 0x80 != 0);
    }

    // --- arithmetic and logic ---------------------------------------------

    fn add_with_carry(&mut self, operand: u8) {
        let carry = self.status.contains(StatusFlags::CARRY) as u16;
        let sum = self.a as u16 + operand as u16 + carry;
        let result = sum as u8;
        self.status.set(StatusFlags::CARRY, sum > 0xFF);
        self.status.set(
            StatusFlags::OVERFLOW,
            (self.a ^ result) & (operand ^ result) & 0x80 != 0,
        );
        self.a = result;
        self.set_zero_negative_flags(result);
    }

    fn adc(&mut self, bus: &mut dyn CpuBus) {
        let operand = self.operand(bus);
        self.add_with_carry(operand);
    }

    // Subtraction is addition of the ones' complement; the incoming carry
    // doubles as "not borrow".
    fn sbc(&mut self, bus: &mut dyn CpuBus) {
        let operand = self.operand(bus);
        self.add_with_carry(operand ^ 0xFF);
    }

    fn and(&mut self, bus: &mut dyn CpuBus) {
        self.a &= self.operand(bus);
        self.set_zero_negative_flags(self.a);
    }

    fn ora(&mut self, bus: &mut dyn CpuBus) {
        self.a |= self.operand(bus);
        self.set_zero_negative_flags(self.a);
    }

    fn eor(&mut self, bus: &mut dyn CpuBus) {
        self.a ^= self.operand(bus);
        self.set_zero_negative_flags(self.a);
    }

    fn asl(&mut self, bus: &mut dyn CpuBus) {
        let operand = self.operand(bus);
        let result = operand << 1;
        self.status.set(StatusFlags::CARRY, operand & 0x80 != 0);
        self.set_zero_negative_flags(result);
        self.store(bus, result);
    }

    fn lsr(&mut self, bus: &mut dyn CpuBus) {
        let operand = self.operand(bus);
        let result = operand >> 1;
        self.status.set(StatusFlags::CARRY, operand & 0x01 != 0);
        self.set_zero_negative_flags(result);
        self.store(bus, result);
    }

    fn rol(&mut self, bus: &mut dyn CpuBus) {
        let operand = self.operand(bus);
        let carry_in = self.status.contains(StatusFlags::CARRY) as u8;
        let result = (operand << 1) | carry_in;
        self.status.set(StatusFlags::CARRY, operand & 0x80 != 0);
        self.set_zero_negative_flags(result);
        self.store(bus, result);
    }

    fn ror(&mut self, bus: &mut dyn CpuBus) {
        let operand = self.operand(bus);
        let carry_in = self.status.contains(StatusFlags::CARRY) as u8;
        let result = (operand >> 1) | (carry_in << 7);
        self.status.set(StatusFlags::CARRY, operand & 0x01 != 0);
        self.set_zero_negative_flags(result);
        self.store(bus, result);
    }

    fn bit(&mut self, bus: &mut dyn CpuBus) {
        let operand = self.operand(bus);
        self.status.set(StatusFlags::ZERO, self.a & operand == 0);
        self.status.set(StatusFlags::OVERFLOW, operand & 0x40 != 0);
        self.status.set(StatusFlags::NEGATIVE, operand & 0x80 != 0);
    }

    fn compare(&mut self, register: u8, operand: u8) {
        self.status.set(StatusFlags::CARRY, register >= operand);
        self.set_zero_negative_flags(register.wrapping_sub(operand));
    }

    fn inc(&mut self, bus: &mut dyn CpuBus) {
        let result = self.operand(bus).wrapping_add(1);
        self.set_zero_negative_flags(result);
        self.store(bus, result);
    }

    fn dec(&mut self, bus: &mut dyn CpuBus) {
        let result = self.operand(bus).wrapping_sub(1);
        self.set_zero_negative_flags(result);
        self.store(bus, result);
    }

    // --- control flow -----------------------------------------------------

    /// Shared conditional-branch tail. A taken branch costs one extra
    /// cycle, and one more when the target lands on a different page than
    /// the address of the following instruction. Both extras are folded in
    /// here so the page-cross latch cannot leak into the next step.
    fn branch(&mut self, bus: &mut dyn CpuBus, condition: bool) {
        if !condition {
            return;
        }
        self.step_cycles += 1;
        let offset = bus.read(self.operand_addr) as i8;
        let target = self.pc.wrapping_add(offset as u16);
        if page_crossed(self.pc, target) {
            self.step_cycles += 1;
        }
        self.pc = target;
    }

    fn jsr(&mut self, bus: &mut dyn CpuBus) {
        let return_addr = self.pc.wrapping_sub(1);
        self.push(bus, (return_addr >> 8) as u8);
        self.push(bus, return_addr as u8);
        self.pc = self.operand_addr;
    }

    fn rts(&mut self, bus: &mut dyn CpuBus) {
        let lo = self.pull(bus) as u16;
        let hi = self.pull(bus) as u16;
        self.pc = ((hi << 8) | lo).wrapping_add(1);
    }

    fn brk(&mut self, bus: &mut dyn CpuBus) {
        let return_addr = self.pc.wrapping_add(1);
        self.push(bus, (return_addr >> 8) as u8);
        self.push(bus, return_addr as u8);
        self.push(bus, self.status.bits() | StatusFlags::BREAK.bits());
        self.status.insert(StatusFlags::INTERRUPT_DISABLE);
        self.pc = self.read_word_at(bus, IRQ_VECTOR);
    }

    // Flags first, then PC low and high; the pop order is asymmetric to the
    // JSR push order on purpose.
    fn rti(&mut self, bus: &mut dyn CpuBus) {
        let bits = self.pull(bus);
        self.status = StatusFlags::from_bits_truncate(bits);
        self.status.insert(StatusFlags::UNUSED);
        let lo = self.pull(bus) as u16;
        let hi = self.pull(bus) as u16;
        self.pc = (hi << 8) | lo;
    }
}

fn page_crossed(a: u16, b: u16) -> bool {
    a & 0xFF00 != b & 0xFF00
}
