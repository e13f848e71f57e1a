//! Runtime configuration handed to [`Console::new`](crate::console::Console::new).
//!
//! Nothing in the core reads environment variables or files; the host fills this in.

use crate::cartridge::{cartridge::TvSystem, mapper::Mirroring};
use crate::error::{NesError, Result};

/// Sample rates the host audio path is known to handle.
pub const SUPPORTED_SAMPLE_RATES: [u32; 5] = [11_025, 22_050, 44_100, 48_000, 96_000];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Target frames per second; `None` uses the region's native rate. 0 runs unthrottled.
    pub speed: Option<u32>,
    /// Overrides the header's nametable mirroring.
    pub mirroring: Option<Mirroring>,
    /// Overrides the header's TV system.
    pub region: Option<TvSystem>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            speed: None,
            mirroring: None,
            region: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(NesError::Config(format!(
                "sample rate {} Hz not one of {:?}",
                self.sample_rate, SUPPORTED_SAMPLE_RATES
            )));
        }
        Ok(())
    }

    /// Frame rate to pace at for a cartridge of the given region.
    pub fn frame_rate(&self, tv: TvSystem) -> u32 {
        self.speed.unwrap_or_else(|| tv.frame_rate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn odd_sample_rate_is_rejected() {
        let config = Config {
            sample_rate: 12_345,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(NesError::Config(_))));
    }

    #[test]
    fn frame_rate_follows_region_unless_overridden() {
        let config = Config::default();
        assert_eq!(config.frame_rate(TvSystem::Ntsc), 60);
        assert_eq!(config.frame_rate(TvSystem::Pal), 50);
        let fixed = Config {
            speed: Some(30),
            ..Config::default()
        };
        assert_eq!(fixed.frame_rate(TvSystem::Pal), 30);
    }
}
