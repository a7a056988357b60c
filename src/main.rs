//! midistream CLI: play a Standard MIDI File through a MIDI output.
//!
//! Usage:
//!   midistream path/to/file.mid
//!   midistream path/to/file.mid --loop --volume 10 -v

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use ms_device::{DeviceError, SequencerDevice};
use ms_master::{Controller, PlayerConfig};

#[derive(Parser, Debug)]
#[command(name = "midistream", version, about = "Stream a MIDI file to an output port")]
struct Args {
    /// MIDI file to play
    file: PathBuf,

    /// Start over when the end is reached
    #[arg(long = "loop")]
    looping: bool,

    /// Volume level, 0 (silent) to 15
    #[arg(long)]
    volume: Option<u8>,

    /// Output port name (default: first available)
    #[arg(long)]
    port: Option<String>,

    /// Print available output ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => log::Level::Info,
        1 => log::Level::Debug,
        _ => log::Level::Trace,
    };
    if let Err(e) = simple_logger::init_with_level(level) {
        eprintln!("failed to initialise logging: {}", e);
    }

    if args.list_ports {
        return list_ports();
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(&args.file)?;

    let file = ms_formats::load_midi(&data)?;
    println!("File:     {}", args.file.display());
    println!("Format:   {}", file.format);
    println!("Tracks:   {}", file.num_tracks());
    println!("Events:   {}", file.num_events());
    println!("Division: {}", describe_division(file.time_division()));
    println!();

    let port = args.port.clone();
    let mut ctrl = Controller::open(PlayerConfig::default(), move |notifier| {
        open_device(port.as_deref(), notifier)
    })?;

    ctrl.register_score(&data)?;
    if let Some(level) = args.volume {
        ctrl.set_volume(level)?;
    }
    ctrl.play(args.looping)?;
    println!("Playing{}...", if args.looping { " (looping)" } else { "" });

    while !ctrl.is_finished() && !ctrl.is_aborted() {
        std::thread::sleep(Duration::from_millis(20));
    }
    if ctrl.is_aborted() {
        return Err("output device stopped accepting events".into());
    }

    ctrl.shutdown()?;
    println!("Done.");
    Ok(())
}

fn describe_division(division: u16) -> String {
    if division & 0x8000 != 0 {
        let fps = -i32::from((division >> 8) as u8 as i8);
        format!("SMPTE {} fps, {} ticks/frame", fps, division & 0xFF)
    } else {
        format!("{} ticks/quarter", division)
    }
}

#[cfg(feature = "midir")]
fn open_device(
    port: Option<&str>,
    notifier: ms_device::CompletionNotifier,
) -> Result<SequencerDevice<ms_device::MidirSink>, DeviceError> {
    let sink = ms_device::MidirSink::connect(port)?;
    SequencerDevice::open(sink, notifier)
}

#[cfg(not(feature = "midir"))]
fn open_device(
    port: Option<&str>,
    notifier: ms_device::CompletionNotifier,
) -> Result<SequencerDevice<ms_device::LogSink>, DeviceError> {
    if let Some(port) = port {
        log::warn!("built without MIDI port support; ignoring --port {}", port);
    }
    log::info!("no MIDI port support, messages go to the trace log");
    SequencerDevice::open(ms_device::LogSink::new(), notifier)
}

#[cfg(feature = "midir")]
fn list_ports() -> ExitCode {
    match ms_device::list_ports() {
        Ok(ports) if ports.is_empty() => {
            println!("No MIDI output ports.");
            ExitCode::SUCCESS
        }
        Ok(ports) => {
            for (i, name) in ports.iter().enumerate() {
                println!("{}: {}", i, name);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(not(feature = "midir"))]
fn list_ports() -> ExitCode {
    println!("Built without MIDI port support (enable the `midir` feature).");
    ExitCode::SUCCESS
}
