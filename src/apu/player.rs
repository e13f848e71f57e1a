//! Audio sink the APU pushes mixed samples into.

/// Receives one mono sample in `0.0..=1.0` every `cpu_hz / sample_rate` CPU cycles.
///
/// Implementations own the audio device. The host binary batches samples into a `rodio` sink;
/// tests record them.
pub trait Player: Send {
    fn output(&mut self, sample: f32);

    /// Release the device. Called once when the console stops.
    fn stop(&mut self) {}

    /// Drop anything queued. Called on a soft reset.
    fn reset(&mut self) {}
}

/// Discards every sample. Used until a real player is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPlayer;

impl Player for NullPlayer {
    fn output(&mut self, _sample: f32) {}
}
