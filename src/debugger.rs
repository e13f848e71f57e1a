//! Debugger hook consulted by the console before every instruction.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::console::Console;
use crate::cpu::disasm::{self, Line};

/// Implemented by anything that wants to inspect or pause execution.
///
/// The console owns the debugger; state shared with a UI thread has to live behind the
/// implementation's own synchronisation.
pub trait Debugger: Send {
    /// Called once when attached.
    fn inject(&mut self, _console: &Console) {}

    /// Called with the cartridge's PRG ROM when attached.
    fn buffer(&mut self, _prg: &[u8]) {}

    /// Called before each instruction. Returning `true` pauses the console until
    /// [`ConsoleHandle::release`](crate::console::ConsoleHandle::release).
    fn hack(&mut self, console: &Console) -> bool;
}

#[derive(Debug, Default)]
struct State {
    breakpoints: HashSet<u16>,
    stepping: bool,
    listing: Vec<Line>,
    paused_at: Option<u16>,
}

/// Pauses on breakpoint addresses, or on every instruction while stepping.
///
/// Clones share state, so a UI can keep one clone and hand the other to the console.
#[derive(Debug, Clone, Default)]
pub struct BreakpointDebugger {
    state: Arc<Mutex<State>>,
}

impl BreakpointDebugger {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_breakpoint(&self, addr: u16) {
        self.state().breakpoints.insert(addr);
    }

    /// Returns whether the breakpoint existed.
    pub fn remove_breakpoint(&self, addr: u16) -> bool {
        self.state().breakpoints.remove(&addr)
    }

    pub fn breakpoints(&self) -> Vec<u16> {
        let mut addrs: Vec<u16> = self.state().breakpoints.iter().copied().collect();
        addrs.sort_unstable();
        addrs
    }

    /// Pause before every instruction until [`BreakpointDebugger::resume`].
    pub fn step_into(&self) {
        self.state().stepping = true;
    }

    /// Stop single-stepping; breakpoints still apply.
    pub fn resume(&self) {
        self.state().stepping = false;
    }

    /// Address of the instruction the console is currently held at, if any.
    pub fn paused_at(&self) -> Option<u16> {
        self.state().paused_at
    }

    /// Disassembly of the PRG ROM as delivered by [`Debugger::buffer`].
    pub fn line_at(&self, addr: u16) -> Option<Line> {
        self.state().listing.iter().find(|line| line.addr == addr).cloned()
    }
}

impl Debugger for BreakpointDebugger {
    fn inject(&mut self, console: &Console) {
        self.state().paused_at = None;
        debug!(pc = format_args!("${:04X}", console.cpu().pc), "debugger attached");
    }

    fn buffer(&mut self, prg: &[u8]) {
        // A single 16 KiB bank shows up at $C000 as well; list it there so the vectors line up.
        let origin = if prg.len() <= 0x4000 { 0xC000 } else { 0x8000 };
        self.state().listing = disasm::disassemble(prg, origin);
    }

    fn hack(&mut self, console: &Console) -> bool {
        let pc = console.cpu().pc;
        let mut state = self.state();
        let hit = state.stepping || state.breakpoints.contains(&pc);
        if hit {
            state.paused_at = Some(pc);
            match state.listing.iter().find(|line| line.addr == pc) {
                Some(line) => info!("break at {line}"),
                None => info!(pc = format_args!("${pc:04X}"), "break"),
            }
        } else {
            state.paused_at = None;
        }
        hit
    }
}
