//! Emulation session: cartridge, bus and CPU wired together behind a
//! step-oriented surface for the driver.

use std::fmt;

use crate::bus::Bus;
use crate::cartridge::Cartridge;
use crate::cpu::table;
use crate::cpu::{Cpu, CpuBus, CpuError};

pub struct Emulator {
    cpu: Cpu,
    bus: Bus,
    steps: u64,
}

/// One executed instruction, captured for diagnostic output.
pub struct Trace {
    pub pc: u16,
    pub opcode: u8,
    pub mnemonic: &'static str,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub p: u8,
    pub sp: u8,
    pub cycles: u8,
    pub total_cycles: u64,
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04X} {:02X} {:>4} A={:02X} X={:02X} Y={:02X} P={:02X} SP={:02X} CYC={}",
            self.pc,
            self.opcode,
            self.mnemonic,
            self.a,
            self.x,
            self.y,
            self.p,
            self.sp,
            self.total_cycles
        )
    }
}

impl Emulator {
    pub fn new(cartridge: Cartridge) -> Self {
        let mut bus = Bus::new();
        bus.load_cartridge(cartridge);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        Emulator { cpu, bus, steps: 0 }
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    /// Instructions executed since construction or the last state restore.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn set_steps(&mut self, steps: u64) {
        self.steps = steps;
    }

    /// Executes one instruction, returning its cycle cost.
    pub fn step(&mut self) -> Result<u8, CpuError> {
        let cycles = self.cpu.step(&mut self.bus)?;
        self.steps += 1;
        Ok(cycles)
    }

    /// Runs `steps` instructions, stopping at the first decode failure.
    pub fn run(&mut self, steps: u64) -> Result<(), CpuError> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    /// Like [`step`](Self::step), but returns the executed instruction and
    /// resulting register file for trace output.
    pub fn trace_step(&mut self) -> Result<Trace, CpuError> {
        let pc = self.cpu.pc;
        let opcode = self.bus.read(pc);
        let mnemonic = table::lookup(opcode).map(|i| i.mnemonic).unwrap_or("???");
        let cycles = self.cpu.step(&mut self.bus)?;
        self.steps += 1;
        Ok(Trace {
            pc,
            opcode,
            mnemonic,
            a: self.cpu.a,
            x: self.cpu.x,
            y: self.cpu.y,
            p: self.cpu.status.bits(),
            sp: self.cpu.sp,
            cycles,
            total_cycles: self.cpu.total_cycles(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal NROM image: reset vector at $8000, program at the window
    // start, everything else NOP.
    fn test_cartridge(program: &[u8]) -> Cartridge {
        let mut prg = vec![0xEA; 0x4000];
        prg[..program.len()].copy_from_slice(program);
        // Reset vector lives at $FFFC, which mirrors to PRG offset $3FFC.
        prg[0x3FFC] = 0x00;
        prg[0x3FFD] = 0x80;

        let mut rom = Vec::new();
        rom.extend_from_slice(b"NES\x1A");
        rom.push(1);
        rom.push(1);
        rom.extend_from_slice(&[0; 10]);
        rom.extend_from_slice(&prg);
        rom.extend_from_slice(&[0; 0x2000]);
        Cartridge::from_bytes(&rom).unwrap()
    }

    #[test]
    fn boots_from_reset_vector() {
        let emulator = Emulator::new(test_cartridge(&[]));
        assert_eq!(emulator.cpu().pc, 0x8000);
    }

    #[test]
    fn runs_program_from_cartridge() {
        // LDA #$05; STA $10; LDA $10
        let mut emulator = Emulator::new(test_cartridge(&[0xA9, 0x05, 0x85, 0x10, 0xA5, 0x10]));
        emulator.run(3).unwrap();
        assert_eq!(emulator.cpu().a, 0x05);
        assert_eq!(emulator.bus().memory().read(0x0010), 0x05);
        assert_eq!(emulator.steps(), 3);
    }

    #[test]
    fn trace_reports_executed_instruction() {
        let mut emulator = Emulator::new(test_cartridge(&[0xA9, 0x42]));
        let trace = emulator.trace_step().unwrap();
        assert_eq!(trace.pc, 0x8000);
        assert_eq!(trace.opcode, 0xA9);
        assert_eq!(trace.mnemonic, "LDA");
        assert_eq!(trace.a, 0x42);
        assert_eq!(trace.cycles, 2);
    }
}
