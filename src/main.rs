//! Desktop host for the emulator core.
//!
//! Opens a 256×240 window, plays audio through `rodio`, maps the keyboard to controller 1 and
//! runs the console on a worker thread. `--disassemble` prints the PRG ROM instead, and `--chr`
//! shows both pattern tables.
//!
//! Keys: arrows = D-pad, X = A, Z = B, Right Shift = Select, Enter = Start, F2 = reset,
//! F5 = continue, F10 = step (with `--break`), Esc = quit.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use ansi_term::Colour::{Fixed, Green, Red};
use clap::{Parser, ValueEnum};
use minifb::{Key, KeyRepeat, Scale, Window, WindowOptions};
use rodio::{OutputStream, Sink, buffer::SamplesBuffer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use kestrel::{
    Cartridge, Config, Console,
    apu::Player,
    cartridge::{
        cartridge::TvSystem,
        mapper::{Mirroring, new_mapper},
    },
    controller::Button,
    cpu::disasm,
    debugger::BreakpointDebugger,
    ppu::{HEIGHT, WIDTH, chr},
};

/// Samples handed to the audio device at a time.
const AUDIO_BATCH: usize = 1024;

/// Batches queued in the sink before new ones are dropped.
const MAX_QUEUED_BATCHES: usize = 8;

const KEYMAP: [(Key, Button); 8] = [
    (Key::X, Button::A),
    (Key::Z, Button::B),
    (Key::RightShift, Button::Select),
    (Key::Enter, Button::Start),
    (Key::Up, Button::Up),
    (Key::Down, Button::Down),
    (Key::Left, Button::Left),
    (Key::Right, Button::Right),
];

#[derive(Parser, Debug)]
#[command(name = "kestrel")]
#[command(about = "A NES emulator", long_about = None)]
struct Args {
    /// Path to the iNES / NES 2.0 ROM file
    rom: PathBuf,

    /// Print a colourised disassembly of the PRG ROM and exit
    #[arg(short, long)]
    disassemble: bool,

    /// Show the cartridge's pattern tables instead of running it
    #[arg(long)]
    chr: bool,

    /// Audio sample rate in Hz
    #[arg(long, default_value_t = 44_100)]
    sample_rate: u32,

    /// Target frames per second (0 = unthrottled); defaults to the cartridge's region
    #[arg(short, long)]
    speed: Option<u32>,

    /// Override the header's nametable mirroring
    #[arg(long, value_enum)]
    mirroring: Option<MirroringArg>,

    /// Override the header's TV system
    #[arg(long, value_enum)]
    region: Option<RegionArg>,

    /// Pause before the instruction at this hex address (repeatable)
    #[arg(short = 'b', long = "break", value_parser = parse_addr)]
    breakpoints: Vec<u16>,

    /// Run without audio
    #[arg(long)]
    mute: bool,

    /// More log output (-v info, -vv debug, -vvv CPU trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MirroringArg {
    Horizontal,
    Vertical,
    Lower,
    Upper,
    Four,
}

impl From<MirroringArg> for Mirroring {
    fn from(arg: MirroringArg) -> Self {
        match arg {
            MirroringArg::Horizontal => Mirroring::Horizontal,
            MirroringArg::Vertical => Mirroring::Vertical,
            MirroringArg::Lower => Mirroring::OneScreenLower,
            MirroringArg::Upper => Mirroring::OneScreenUpper,
            MirroringArg::Four => Mirroring::FourScreen,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RegionArg {
    Ntsc,
    Pal,
}

impl From<RegionArg> for TvSystem {
    fn from(arg: RegionArg) -> Self {
        match arg {
            RegionArg::Ntsc => TvSystem::Ntsc,
            RegionArg::Pal => TvSystem::Pal,
        }
    }
}

fn parse_addr(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches('$').trim_start_matches("0x");
    u16::from_str_radix(digits, 16).map_err(|e| format!("bad address {s:?}: {e}"))
}

/// Feeds APU samples to a `rodio` sink in fixed-size batches.
struct RodioPlayer {
    sink: Sink,
    sample_rate: u32,
    batch: Vec<f32>,
}

impl RodioPlayer {
    fn new(sink: Sink, sample_rate: u32) -> Self {
        Self {
            sink,
            sample_rate,
            batch: Vec::with_capacity(AUDIO_BATCH),
        }
    }
}

impl Player for RodioPlayer {
    fn output(&mut self, sample: f32) {
        self.batch.push(sample);
        if self.batch.len() < AUDIO_BATCH {
            return;
        }
        let batch = std::mem::replace(&mut self.batch, Vec::with_capacity(AUDIO_BATCH));
        // Unthrottled runs outpace the device; drop rather than build up latency.
        if self.sink.len() < MAX_QUEUED_BATCHES {
            self.sink.append(SamplesBuffer::new(1, self.sample_rate, batch));
        }
    }

    fn stop(&mut self) {
        self.sink.stop();
    }

    fn reset(&mut self) {
        self.batch.clear();
        self.sink.clear();
        self.sink.play();
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_disassembly(cart: &Cartridge) {
    let origin = if cart.prg_rom.len() <= 0x4000 { 0xC000 } else { 0x8000 };
    for line in disasm::disassemble(&cart.prg_rom, origin) {
        let bytes: Vec<String> = line.bytes.iter().map(|b| format!("{b:02X}")).collect();
        let mnemonic = if line.undocumented {
            Red.paint(format!("*{}", line.mnemonic))
        } else {
            Green.paint(format!(" {}", line.mnemonic))
        };
        println!(
            "{}  {:<8} {} {}",
            Fixed(244).paint(format!("{:04X}", line.addr)),
            bytes.join(" "),
            mnemonic,
            line.operand
        );
    }
}

/// Static viewer for the power-on CHR banks. CHR RAM carts show up blank.
fn show_pattern_tables(cart: &Cartridge) -> Result<(), Box<dyn Error>> {
    let mapper = new_mapper(cart)?;
    let pixels = chr::render(mapper.as_ref(), chr::GREYS);
    let (width, height) = (2 * chr::TABLE_SIDE, chr::TABLE_SIDE);
    let mut window = Window::new(
        "Kestrel CHR",
        width,
        height,
        WindowOptions {
            scale: Scale::X4,
            ..WindowOptions::default()
        },
    )?;
    window.set_target_fps(30);
    info!(bytes = cart.chr.len(), ram = cart.chr_is_ram, "showing pattern tables");
    while window.is_open() && !window.is_key_down(Key::Escape) {
        window.update_with_buffer(&pixels, width, height)?;
    }
    Ok(())
}

fn present(window: &mut Window, frames: &Receiver<Vec<u32>>) -> Result<bool, Box<dyn Error>> {
    match frames.recv_timeout(Duration::from_millis(20)) {
        Ok(frame) => window.update_with_buffer(&frame, WIDTH, HEIGHT)?,
        Err(RecvTimeoutError::Timeout) => window.update(),
        Err(RecvTimeoutError::Disconnected) => return Ok(false),
    }
    Ok(true)
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let cart = Cartridge::load(&args.rom)?;
    if args.disassemble {
        print_disassembly(&cart);
        return Ok(());
    }
    if args.chr {
        return show_pattern_tables(&cart);
    }

    let config = Config {
        sample_rate: args.sample_rate,
        speed: args.speed,
        mirroring: args.mirroring.map(Into::into),
        region: args.region.map(Into::into),
    };
    let mut console = Console::new(cart, config)?;
    let handle = console.handle();

    // The output stream has to stay on this thread; only the sink travels with the console.
    let _stream = if args.mute {
        None
    } else {
        match OutputStream::try_default() {
            Ok((stream, stream_handle)) => {
                let sink = Sink::try_new(&stream_handle)?;
                console.set_player(Box::new(RodioPlayer::new(sink, args.sample_rate)));
                Some(stream)
            }
            Err(err) => {
                warn!(%err, "no audio device, running muted");
                None
            }
        }
    };

    let debugger = BreakpointDebugger::new();
    if !args.breakpoints.is_empty() {
        for &addr in &args.breakpoints {
            debugger.add_breakpoint(addr);
        }
        console.set_debugger(Box::new(debugger.clone()));
    }

    let (frame_tx, frame_rx) = mpsc::sync_channel::<Vec<u32>>(1);
    console.on_frame(move |frame| {
        // The window may be behind; it only ever needs the newest frame.
        let _ = frame_tx.try_send(frame.to_vec());
    });

    let worker = thread::Builder::new()
        .name("console".into())
        .spawn(move || console.run())?;

    let mut window = Window::new(
        "Kestrel",
        WIDTH,
        HEIGHT,
        WindowOptions {
            resize: true,
            scale: Scale::X2,
            ..WindowOptions::default()
        },
    )?;

    while window.is_open() && !window.is_key_down(Key::Escape) && !handle.is_stopped() {
        for (key, button) in KEYMAP {
            handle.set_button(0, button, window.is_key_down(key));
        }
        if window.is_key_pressed(Key::F2, KeyRepeat::No) {
            handle.reset();
        }
        if window.is_key_pressed(Key::F5, KeyRepeat::No) {
            debugger.resume();
            handle.release();
        }
        if window.is_key_pressed(Key::F10, KeyRepeat::No) {
            debugger.step_into();
            handle.release();
        }
        if !present(&mut window, &frame_rx)? {
            break;
        }
    }

    handle.stop();
    match worker.join() {
        Ok(result) => result?,
        Err(_) => error!("console thread panicked outside the run loop"),
    }
    info!("bye");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("kestrel: {err}");
            ExitCode::FAILURE
        }
    }
}
