//! The console: owns the CPU (and through its bus the PPU, APU and mapper) and runs the
//! fetch-decode-execute loop.
//!
//! [`Console::run`] blocks the calling thread until stopped, so hosts usually move the console to
//! a worker thread and keep a [`ConsoleHandle`] to steer it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::{
    apu::{APU, Player},
    bus::{Bus, NesBus},
    cartridge::{
        cartridge::{Cartridge, TvSystem},
        mapper::new_mapper,
    },
    config::Config,
    controller::Button,
    cpu::{CPU, Interrupt},
    debugger::Debugger,
    error::{NesError, Result},
    ppu::{Frame, PPU, chr},
};

type FrameCallback = Box<dyn FnMut(&Frame) + Send>;
type ErrorCallback = Box<dyn FnMut(&NesError) + Send>;

/// Whether the loop is held by the debugger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
}

#[derive(Debug)]
struct Shared {
    stop: AtomicBool,
    reset: AtomicBool,
    /// Target frames per second; 0 is unthrottled.
    speed: AtomicU32,
    buttons: [AtomicU8; 2],
    state: Mutex<RunState>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until released or stopped.
    fn pause(&self) {
        let mut state = self.lock();
        *state = RunState::Paused;
        while *state == RunState::Paused && !self.stop.load(Ordering::SeqCst) {
            state = self.wake.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        *state = RunState::Running;
    }

    /// Sleep until `deadline`, waking early on stop.
    fn sleep_until(&self, deadline: Instant) {
        let mut state = self.lock();
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            state = match self.wake.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

/// Cloneable remote control for a [`Console`] running on another thread.
#[derive(Debug, Clone)]
pub struct ConsoleHandle {
    shared: Arc<Shared>,
}

impl ConsoleHandle {
    fn new(speed: u32) -> Self {
        Self {
            shared: Arc::new(Shared {
                stop: AtomicBool::new(false),
                reset: AtomicBool::new(false),
                speed: AtomicU32::new(speed),
                buttons: [AtomicU8::new(0), AtomicU8::new(0)],
                state: Mutex::new(RunState::Running),
                wake: Condvar::new(),
            }),
        }
    }

    /// Ask the loop to exit at the next instruction boundary.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        let _state = self.shared.lock();
        self.shared.wake.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stop.load(Ordering::SeqCst)
    }

    /// Request a soft reset; also releases a debugger pause.
    pub fn reset(&self) {
        self.shared.reset.store(true, Ordering::SeqCst);
        self.release();
    }

    /// Resume after a debugger pause.
    pub fn release(&self) {
        let mut state = self.shared.lock();
        *state = RunState::Running;
        self.shared.wake.notify_all();
    }

    pub fn run_state(&self) -> RunState {
        *self.shared.lock()
    }

    /// Adjust the target frame rate by `delta`, clamped at 0 (unthrottled). Returns the new rate.
    pub fn speed(&self, delta: i32) -> u32 {
        let update = |fps: u32| Some(fps.saturating_add_signed(delta));
        match self.shared.speed.fetch_update(Ordering::SeqCst, Ordering::SeqCst, update) {
            Ok(old) | Err(old) => old.saturating_add_signed(delta),
        }
    }

    pub fn frame_rate(&self) -> u32 {
        self.shared.speed.load(Ordering::SeqCst)
    }

    /// Press or release a button on controller `port` (0 or 1); applied at the next frame.
    pub fn set_button(&self, port: usize, button: Button, pressed: bool) {
        let Some(state) = self.shared.buttons.get(port) else {
            return;
        };
        if pressed {
            state.fetch_or(button.mask(), Ordering::SeqCst);
        } else {
            state.fetch_and(!button.mask(), Ordering::SeqCst);
        }
    }

    fn buttons(&self, port: usize) -> u8 {
        self.shared.buttons[port].load(Ordering::SeqCst)
    }

    fn take_reset(&self) -> bool {
        self.shared.reset.swap(false, Ordering::SeqCst)
    }
}

pub struct Console {
    cpu: CPU<NesBus>,
    tv_system: TvSystem,
    handle: ConsoleHandle,
    debugger: Option<Box<dyn Debugger>>,
    on_frame: Option<FrameCallback>,
    on_error: Option<ErrorCallback>,
    /// CPU cycles since the last reset, stalls included.
    cycles: u64,
    /// Value of `cycles` when the debugger last paused.
    pause_cycles: u64,
    deadline: Option<Instant>,
}

impl Console {
    pub fn new(cartridge: Cartridge, config: Config) -> Result<Self> {
        config.validate()?;

        let mut cartridge = cartridge;
        if let Some(mirroring) = config.mirroring {
            cartridge.mirroring = mirroring;
        }
        let tv_system = config.region.unwrap_or(cartridge.tv_system);

        let mapper = new_mapper(&cartridge)?;
        let apu = APU::new(config.sample_rate, tv_system.cpu_hz() as f64);
        let mut cpu = CPU::new(NesBus::new(mapper, apu));
        cpu.reset();

        info!(
            mapper = cartridge.mapper_id,
            region = ?tv_system,
            pc = format_args!("${:04X}", cpu.pc),
            "console powered on"
        );

        Ok(Self {
            cpu,
            tv_system,
            handle: ConsoleHandle::new(config.frame_rate(tv_system)),
            debugger: None,
            on_frame: None,
            on_error: None,
            cycles: 0,
            pause_cycles: 0,
            deadline: None,
        })
    }

    pub fn handle(&self) -> ConsoleHandle {
        self.handle.clone()
    }

    pub fn set_player(&mut self, player: Box<dyn Player>) {
        self.cpu.bus.apu.set_player(player);
    }

    /// Called with every completed frame.
    pub fn on_frame(&mut self, callback: impl FnMut(&Frame) + Send + 'static) {
        self.on_frame = Some(Box::new(callback));
    }

    /// Called with the error that ended [`Console::run`].
    pub fn on_error(&mut self, callback: impl FnMut(&NesError) + Send + 'static) {
        self.on_error = Some(Box::new(callback));
    }

    pub fn set_debugger(&mut self, mut debugger: Box<dyn Debugger>) {
        debugger.inject(self);
        debugger.buffer(self.cpu.bus.mapper.prg_rom());
        self.debugger = Some(debugger);
    }

    /// Run until stopped or until emulation fails. Panics inside the loop come back as
    /// [`NesError::Panic`]. Either way the error handler sees the error before it is returned.
    pub fn run(&mut self) -> Result<()> {
        info!("emulation started");
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.execute()))
            .unwrap_or_else(|payload| Err(NesError::Panic(panic_message(payload))));

        if let Err(err) = &result {
            error!(%err, pc = format_args!("${:04X}", self.cpu.pc), "emulation failed");
            if let Some(handler) = self.on_error.as_mut() {
                handler(err);
            }
            self.handle.stop();
        }
        self.cpu.bus.apu.stop();
        info!(cycles = self.cycles, "emulation stopped");
        result
    }

    /// The bare loop behind [`Console::run`].
    pub fn execute(&mut self) -> Result<()> {
        while !self.handle.is_stopped() {
            self.step()?;
        }
        Ok(())
    }

    /// One instruction boundary: a pending reset, an interrupt entry, or one instruction.
    /// Returns the CPU cycles consumed, DMA stalls included.
    pub fn step(&mut self) -> Result<u32> {
        if self.handle.take_reset() {
            self.soft_reset();
        }

        let mut cycles = self.dispatch_interrupt();
        if cycles == 0 {
            if !self.consult_debugger() {
                return Ok(0);
            }
            cycles = self.cpu.step()?;
        }

        self.cpu.bus.tick(cycles);
        loop {
            let stall = self.cpu.bus.take_stall();
            if stall == 0 {
                break;
            }
            self.cpu.bus.tick(stall);
            cycles += stall;
        }
        self.cycles += cycles as u64;

        if self.cpu.bus.ppu.take_frame() {
            self.finish_frame();
        }
        Ok(cycles)
    }

    fn dispatch_interrupt(&mut self) -> u32 {
        if self.cpu.halted {
            return 0;
        }
        if self.cpu.bus.poll_nmi() {
            return self.cpu.interrupt(Interrupt::Nmi);
        }
        if self.cpu.bus.irq() {
            return self.cpu.interrupt(Interrupt::Irq);
        }
        0
    }

    /// Returns `false` when the console was stopped while paused.
    fn consult_debugger(&mut self) -> bool {
        let Some(mut debugger) = self.debugger.take() else {
            return true;
        };
        let pause = debugger.hack(self);
        self.debugger = Some(debugger);
        if pause {
            debug!(
                pc = format_args!("${:04X}", self.cpu.pc),
                cycles = self.cycles_since_pause(),
                "paused"
            );
            self.pause_cycles = self.cycles;
            self.handle.shared.pause();
        }
        !self.handle.is_stopped()
    }

    fn finish_frame(&mut self) {
        if let Some(callback) = self.on_frame.as_mut() {
            callback(self.cpu.bus.ppu.frame());
        }
        for port in 0..2 {
            let state = self.handle.buttons(port);
            self.cpu.bus.controllers[port].set_state(state);
        }
        self.pace();
    }

    /// Hold the loop to the target frame rate.
    fn pace(&mut self) {
        let fps = self.handle.frame_rate();
        if fps == 0 {
            self.deadline = None;
            return;
        }
        let frame = Duration::from_secs_f64(1.0 / fps as f64);
        let now = Instant::now();
        let deadline = match self.deadline {
            // Fell more than a frame behind: drop the debt instead of racing to catch up.
            Some(last) if last + frame >= now => last + frame,
            _ => now + frame,
        };
        self.handle.shared.sleep_until(deadline);
        self.deadline = Some(deadline);
    }

    fn soft_reset(&mut self) {
        info!("soft reset");
        self.cpu.bus.reset();
        self.cpu.reset();
        self.cycles = 0;
        self.pause_cycles = 0;
        self.deadline = None;
    }

    /// Request a soft reset at the next instruction boundary.
    pub fn reset(&self) {
        self.handle.reset();
    }

    /// Stop the loop and release the audio device.
    pub fn stop(&mut self) {
        self.handle.stop();
        self.cpu.bus.apu.stop();
    }

    /// Adjust the target frame rate; see [`ConsoleHandle::speed`].
    pub fn speed(&self, delta: i32) -> u32 {
        self.handle.speed(delta)
    }

    /// Debug peek at a CPU address without triggering register side effects.
    pub fn read_memory(&self, addr: u16) -> u8 {
        self.cpu.bus.peek(addr)
    }

    /// Both pattern tables as currently banked in, 256×128 pixels coloured with `colours`.
    pub fn pattern_tables(&self, colours: [u32; 4]) -> Vec<u32> {
        chr::render(self.cpu.bus.mapper.as_ref(), colours)
    }

    pub fn cpu(&self) -> &CPU<NesBus> {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut CPU<NesBus> {
        &mut self.cpu
    }

    pub fn bus(&self) -> &NesBus {
        &self.cpu.bus
    }

    pub fn bus_mut(&mut self) -> &mut NesBus {
        &mut self.cpu.bus
    }

    pub fn ppu(&self) -> &PPU {
        &self.cpu.bus.ppu
    }

    pub fn apu(&self) -> &APU {
        &self.cpu.bus.apu
    }

    pub fn tv_system(&self) -> TvSystem {
        self.tv_system
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn cycles_since_pause(&self) -> u64 {
        self.cycles - self.pause_cycles
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
