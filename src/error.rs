//! Error type shared by the loader, mappers and the console loop.

use thiserror::Error;

/// Everything that can go wrong while loading or running a cartridge.
#[derive(Debug, Error)]
pub enum NesError {
    /// The image is not a valid iNES / NES 2.0 file.
    #[error("invalid ROM image: {0}")]
    Format(String),

    /// The header names a mapper this crate does not implement.
    #[error("unsupported mapper {0}")]
    UnsupportedMapper(u16),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A KIL/JAM opcode locked up the CPU.
    #[error("CPU jammed by opcode ${opcode:02X} at ${addr:04X}")]
    Jam { opcode: u8, addr: u16 },

    /// A panic escaped from the emulation loop and was caught there.
    #[error("emulation panicked: {0}")]
    Panic(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, NesError>;
