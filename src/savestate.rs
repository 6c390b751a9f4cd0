//! Deterministic session snapshots.
//!
//! A snapshot covers everything `step` can mutate: the register file, the
//! working RAM and the step/cycle counters. Cartridge contents are ROM and
//! are not captured; restoring against a different ROM is the caller's
//! mistake to avoid.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::cpu::StatusFlags;
use crate::emulator::Emulator;
use crate::memory::RAM_SIZE;

#[derive(Debug)]
pub enum SaveStateError {
    Io(std::io::Error),
    Encode(String),
    VersionMismatch { found: u32, supported: u32 },
    Corrupt(&'static str),
}

impl fmt::Display for SaveStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveStateError::Io(err) => write!(f, "save state I/O error: {}", err),
            SaveStateError::Encode(msg) => write!(f, "save state encoding error: {}", msg),
            SaveStateError::VersionMismatch { found, supported } => write!(
                f,
                "save state version {} is not supported (current: {})",
                found, supported
            ),
            SaveStateError::Corrupt(msg) => write!(f, "corrupt save state: {}", msg),
        }
    }
}

impl std::error::Error for SaveStateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SaveStateError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SaveStateError {
    fn from(err: std::io::Error) -> Self {
        SaveStateError::Io(err)
    }
}

#[derive(Serialize, Deserialize)]
pub struct SaveState {
    pub version: u32,
    pub cpu: CpuSaveState,
    pub ram: Vec<u8>,
    pub steps: u64,
}

#[derive(Serialize, Deserialize)]
pub struct CpuSaveState {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub p: u8,
    pub total_cycles: u64,
}

impl SaveState {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn capture(emulator: &Emulator) -> Self {
        let cpu = emulator.cpu();
        SaveState {
            version: Self::CURRENT_VERSION,
            cpu: CpuSaveState {
                a: cpu.a,
                x: cpu.x,
                y: cpu.y,
                sp: cpu.sp,
                pc: cpu.pc,
                p: cpu.status.bits(),
                total_cycles: cpu.total_cycles(),
            },
            ram: emulator.bus().memory().snapshot().to_vec(),
            steps: emulator.steps(),
        }
    }

    pub fn restore(&self, emulator: &mut Emulator) -> Result<(), SaveStateError> {
        let ram: [u8; RAM_SIZE] = self
            .ram
            .as_slice()
            .try_into()
            .map_err(|_| SaveStateError::Corrupt("RAM image has the wrong size"))?;
        emulator.bus_mut().memory_mut().restore(ram);

        let cpu = emulator.cpu_mut();
        cpu.a = self.cpu.a;
        cpu.x = self.cpu.x;
        cpu.y = self.cpu.y;
        cpu.sp = self.cpu.sp;
        cpu.pc = self.cpu.pc;
        cpu.status = StatusFlags::from_bits_truncate(self.cpu.p);
        cpu.set_total_cycles(self.cpu.total_cycles);
        emulator.set_steps(self.steps);
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SaveStateError> {
        let encoded =
            bincode::serialize(self).map_err(|e| SaveStateError::Encode(e.to_string()))?;
        fs::write(path, encoded)?;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SaveStateError> {
        let data = fs::read(path)?;
        let state: SaveState =
            bincode::deserialize(&data).map_err(|e| SaveStateError::Encode(e.to_string()))?;
        if state.version > Self::CURRENT_VERSION {
            return Err(SaveStateError::VersionMismatch {
                found: state.version,
                supported: Self::CURRENT_VERSION,
            });
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::Cartridge;

    fn test_emulator() -> Emulator {
        let mut prg = vec![0xEA; 0x4000];
        prg[0x3FFC] = 0x00;
        prg[0x3FFD] = 0x80;
        let mut rom = Vec::new();
        rom.extend_from_slice(b"NES\x1A");
        rom.push(1);
        rom.push(1);
        rom.extend_from_slice(&[0; 10]);
        rom.extend_from_slice(&prg);
        rom.extend_from_slice(&[0; 0x2000]);
        Emulator::new(Cartridge::from_bytes(&rom).unwrap())
    }

    #[test]
    fn capture_restore_round_trip() {
        let mut emulator = test_emulator();
        emulator.cpu_mut().a = 0x5A;
        emulator.cpu_mut().pc = 0x8123;
        emulator.bus_mut().memory_mut().write(0x0042, 0x99);

        let state = SaveState::capture(&emulator);

        let mut fresh = test_emulator();
        state.restore(&mut fresh).unwrap();
        assert_eq!(fresh.cpu().a, 0x5A);
        assert_eq!(fresh.cpu().pc, 0x8123);
        assert_eq!(fresh.bus().memory().read(0x0042), 0x99);
    }

    #[test]
    fn rejects_wrong_ram_size() {
        let emulator = test_emulator();
        let mut state = SaveState::capture(&emulator);
        state.ram.truncate(16);

        let mut target = test_emulator();
        assert!(matches!(
            state.restore(&mut target),
            Err(SaveStateError::Corrupt(_))
        ));
    }

    #[test]
    fn file_round_trip() {
        let emulator = test_emulator();
        let state = SaveState::capture(&emulator);

        let path = std::env::temp_dir().join("famicore_savestate_test.bin");
        state.save_to_file(&path).unwrap();
        let loaded = SaveState::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.version, SaveState::CURRENT_VERSION);
        assert_eq!(loaded.cpu.pc, state.cpu.pc);
        assert_eq!(loaded.ram, state.ram);
    }

    #[test]
    fn rejects_future_version() {
        let emulator = test_emulator();
        let mut state = SaveState::capture(&emulator);
        state.version = SaveState::CURRENT_VERSION + 1;

        let path = std::env::temp_dir().join("famicore_savestate_version_test.bin");
        state.save_to_file(&path).unwrap();
        let result = SaveState::load_from_file(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(
            result,
            Err(SaveStateError::VersionMismatch { .. })
        ));
    }
}
