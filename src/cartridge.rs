//! iNES ROM container loading.
//!
//! Parses the 16-byte header, validates the image against the declared
//! bank counts and hands the PRG/CHR payload to the mapper. Every failure
//! is a typed, recoverable error; the caller decides whether to abort.

use std::fmt;
use std::fs;
use std::path::Path;

use crate::mapper::Mapper0;

const HEADER_SIZE: usize = 16;
const TRAINER_SIZE: usize = 512;
const PRG_BANK_SIZE: usize = 16 * 1024;
const CHR_BANK_SIZE: usize = 8 * 1024;
const MAGIC: &[u8; 4] = b"NES\x1A";

const FLAG6_MIRRORING: u8 = 1 << 0;
const FLAG6_BATTERY: u8 = 1 << 1;
const FLAG6_TRAINER: u8 = 1 << 2;
const FLAG6_IGNORE_MIRRORING: u8 = 1 << 3;

const FLAG7_CONSOLE_TYPE: u8 = 0x03;
const FLAG7_NES20_BITS: u8 = 0x0C;
const FLAG7_NES20_VALUE: u8 = 0x08;

const FLAG9_TV_SYSTEM: u8 = 1 << 0;

const FLAG10_TV_SYSTEM: u8 = 0x03;
const FLAG10_PRG_RAM: u8 = 1 << 4;
const FLAG10_BUS_CONFLICTS: u8 = 1 << 5;

#[derive(Debug)]
pub enum CartridgeError {
    Io(std::io::Error),
    MalformedRom(String),
    /// NES 2.0 images carry a different size encoding; refusing them beats
    /// misreading them as iNES.
    UnsupportedFormat(&'static str),
    UnsupportedMapper(u8),
}

impl fmt::Display for CartridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CartridgeError::Io(err) => write!(f, "failed to read ROM file: {}", err),
            CartridgeError::MalformedRom(msg) => write!(f, "malformed ROM: {}", msg),
            CartridgeError::UnsupportedFormat(fmt_name) => {
                write!(f, "unsupported ROM format: {}", fmt_name)
            }
            CartridgeError::UnsupportedMapper(number) => {
                write!(f, "unsupported mapper: {}", number)
            }
        }
    }
}

impl std::error::Error for CartridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CartridgeError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CartridgeError {
    fn from(err: std::io::Error) -> Self {
        CartridgeError::Io(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirroring {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleType {
    Family,
    VsSystem,
    Playchoice10,
    Extended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TvSystem {
    Ntsc,
    Pal,
}

#[allow(dead_code)]
pub struct Cartridge {
    mapper: Mapper0,
    pub mirroring: Mirroring,
    pub console_type: ConsoleType,
    pub tv_system: TvSystem,
    pub is_dual_tv_system: bool,
    pub has_battery_ram: bool,
    pub has_trainer: bool,
    pub ignore_mirroring: bool,
    pub has_prg_ram: bool,
    pub has_bus_conflicts: bool,
    pub prg_banks: u8,
    pub chr_banks: u8,
    pub prg_ram_banks: u8,
}

impl Cartridge {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CartridgeError> {
        let data = fs::read(path)?;
        Self::from_bytes(&data)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, CartridgeError> {
        if data.len() < HEADER_SIZE {
            return Err(CartridgeError::MalformedRom(format!(
                "{} bytes is smaller than the 16-byte header",
                data.len()
            )));
        }
        if &data[0..4] != MAGIC {
            return Err(CartridgeError::MalformedRom(format!(
                "bad magic {:02X?}",
                &data[0..4]
            )));
        }

        let prg_banks = data[4];
        let chr_banks = data[5];
        let flags6 = data[6];
        let flags7 = data[7];
        let prg_ram_banks = data[8];
        let flags9 = data[9];
        let flags10 = data[10];

        if flags7 & FLAG7_NES20_BITS == FLAG7_NES20_VALUE {
            return Err(CartridgeError::UnsupportedFormat("NES 2.0"));
        }

        if prg_banks == 0 {
            return Err(CartridgeError::MalformedRom(
                "header declares zero PRG banks".to_string(),
            ));
        }

        let has_trainer = flags6 & FLAG6_TRAINER != 0;
        let prg_size = PRG_BANK_SIZE * prg_banks as usize;
        let chr_size = CHR_BANK_SIZE * chr_banks as usize;
        let trainer_size = if has_trainer { TRAINER_SIZE } else { 0 };
        let expected = HEADER_SIZE + trainer_size + prg_size + chr_size;
        if data.len() != expected {
            return Err(CartridgeError::MalformedRom(format!(
                "file is {} bytes, header declares {}",
                data.len(),
                expected
            )));
        }

        let mapper_number = (flags6 >> 4) | (flags7 & 0xF0);
        if mapper_number != 0 {
            return Err(CartridgeError::UnsupportedMapper(mapper_number));
        }

        let mirroring = if flags6 & FLAG6_MIRRORING != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };
        let console_type = match flags7 & FLAG7_CONSOLE_TYPE {
            0 => ConsoleType::Family,
            1 => ConsoleType::VsSystem,
            2 => ConsoleType::Playchoice10,
            _ => ConsoleType::Extended,
        };
        let tv_system = if flags9 & FLAG9_TV_SYSTEM != 0 {
            TvSystem::Pal
        } else {
            TvSystem::Ntsc
        };
        let is_dual_tv_system = matches!(flags10 & FLAG10_TV_SYSTEM, 1 | 3);

        // Trainer payload is skipped, not loaded.
        let prg_start = HEADER_SIZE + trainer_size;
        let prg_rom = data[prg_start..prg_start + prg_size].to_vec();
        let chr_rom = if chr_size > 0 {
            data[prg_start + prg_size..prg_start + prg_size + chr_size].to_vec()
        } else {
            // CHR-less boards ship RAM in that slot.
            vec![0; CHR_BANK_SIZE]
        };

        log::info!(
            "cartridge loaded: mapper {}, PRG {}x16KB, CHR {}x8KB, {:?} mirroring",
            mapper_number,
            prg_banks,
            chr_banks,
            mirroring
        );

        Ok(Cartridge {
            mapper: Mapper0::new(prg_rom, chr_rom),
            mirroring,
            console_type,
            tv_system,
            is_dual_tv_system,
            has_battery_ram: flags6 & FLAG6_BATTERY != 0,
            has_trainer,
            ignore_mirroring: flags6 & FLAG6_IGNORE_MIRRORING != 0,
            has_prg_ram: flags10 & FLAG10_PRG_RAM != 0,
            has_bus_conflicts: flags10 & FLAG10_BUS_CONFLICTS != 0,
            prg_banks,
            chr_banks,
            prg_ram_banks,
        })
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.mapper.read(addr)
    }

    pub fn write(&mut self, addr: u16, data: u8) {
        self.mapper.write(addr, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_rom(prg_banks: u8, chr_banks: u8, flags6: u8, flags7: u8) -> Vec<u8> {
        let mut rom = Vec::new();
        rom.extend_from_slice(MAGIC);
        rom.push(prg_banks);
        rom.push(chr_banks);
        rom.push(flags6);
        rom.push(flags7);
        rom.extend_from_slice(&[0; 8]);
        if flags6 & FLAG6_TRAINER != 0 {
            rom.extend_from_slice(&[0; TRAINER_SIZE]);
        }
        rom.extend_from_slice(&vec![0xEA; PRG_BANK_SIZE * prg_banks as usize]);
        rom.extend_from_slice(&vec![0x00; CHR_BANK_SIZE * chr_banks as usize]);
        rom
    }

    #[test]
    fn loads_valid_image() {
        let cart = Cartridge::from_bytes(&build_rom(1, 1, 0, 0)).unwrap();
        assert_eq!(cart.prg_banks, 1);
        assert_eq!(cart.chr_banks, 1);
        assert_eq!(cart.mirroring, Mirroring::Horizontal);
        assert_eq!(cart.console_type, ConsoleType::Family);
        assert_eq!(cart.tv_system, TvSystem::Ntsc);
        assert_eq!(cart.read(0x8000), 0xEA);
    }

    #[test]
    fn decodes_flag_fields() {
        let cart =
            Cartridge::from_bytes(&build_rom(1, 1, FLAG6_MIRRORING | FLAG6_BATTERY, 0x01))
                .unwrap();
        assert_eq!(cart.mirroring, Mirroring::Vertical);
        assert!(cart.has_battery_ram);
        assert_eq!(cart.console_type, ConsoleType::VsSystem);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut rom = build_rom(1, 1, 0, 0);
        rom[0] = b'X';
        assert!(matches!(
            Cartridge::from_bytes(&rom),
            Err(CartridgeError::MalformedRom(_))
        ));
    }

    #[test]
    fn rejects_size_mismatch() {
        let mut rom = build_rom(1, 1, 0, 0);
        rom.pop();
        assert!(matches!(
            Cartridge::from_bytes(&rom),
            Err(CartridgeError::MalformedRom(_))
        ));
    }

    #[test]
    fn rejects_unsupported_mapper() {
        // Mapper 4 in the low nibble of flags6.
        let rom = build_rom(1, 1, 0x40, 0);
        assert!(matches!(
            Cartridge::from_bytes(&rom),
            Err(CartridgeError::UnsupportedMapper(4))
        ));
    }

    #[test]
    fn combines_mapper_nibbles() {
        let rom = build_rom(1, 1, 0x10, 0x40);
        assert!(matches!(
            Cartridge::from_bytes(&rom),
            Err(CartridgeError::UnsupportedMapper(0x41))
        ));
    }

    #[test]
    fn rejects_nes20() {
        let rom = build_rom(1, 1, 0, FLAG7_NES20_VALUE);
        assert!(matches!(
            Cartridge::from_bytes(&rom),
            Err(CartridgeError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn trainer_counts_toward_size_and_is_skipped() {
        let cart = Cartridge::from_bytes(&build_rom(1, 1, FLAG6_TRAINER, 0)).unwrap();
        assert!(cart.has_trainer);
        // PRG payload still starts with its own bytes, not trainer bytes.
        assert_eq!(cart.read(0x8000), 0xEA);
    }

    #[test]
    fn chr_less_rom_gets_chr_ram() {
        let cart = Cartridge::from_bytes(&build_rom(1, 0, 0, 0)).unwrap();
        assert_eq!(cart.read(0x0000), 0);
        assert_eq!(cart.read(0x1FFF), 0);
    }
}
