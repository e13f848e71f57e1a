//! NES APU (Audio Processing Unit) emulation.
//!
//! - **Pulse** (×2): square waves with duty, envelope, sweep, length counter.
//! - **Triangle**: 32-step wave, linear counter, length counter.
//! - **Noise**: LFSR-based, envelope, length counter.
//! - **DMC**: 1-bit delta samples read from PRG through the bus.
//! - **Frame counter**: 4-step or 5-step mode; clocks envelope/linear/length/sweep.
//! - **Mixer**: NES-style non-linear mix, handed to a [`Player`] at the configured sample rate.

#[allow(clippy::module_inception)]
pub mod apu;
pub mod dmc;
pub mod noise;
pub mod player;
pub mod pulse;
pub mod triangle;
pub mod units;

pub use apu::APU;
pub use player::{NullPlayer, Player};
