// src/bin/nwbconv/main.rs
use clap::{Args, Parser, Subcommand};
use nwbconv_rs::recording::Recording;
use nwbconv_rs::{
    Backend, ConversionOptions, DataInterface, Metadata, NwbConverter, NwbError,
    SpikeGlxNidqInterface, SpikeGlxRecording, SpikeGlxRecordingInterface, StreamKind,
};
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "nwbconv",
    version,
    about = "Convert extracellular neural recordings into NWB",
    long_about = "Convert SpikeGLX recordings (.ap/.lf/.nidq streams) into an \
                  NWB-shaped Zarr store."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Show stream information from a .meta file
    Info(InfoArgs),
    /// Convert one or more streams into an NWB store
    Convert(ConvertArgs),
}

#[derive(Args)]
struct InfoArgs {
    /// Path to a SpikeGLX .meta file
    meta: PathBuf,
}

#[derive(Args)]
struct ConvertArgs {
    /// Paths to SpikeGLX .meta files (one per stream)
    #[arg(required = true)]
    meta: Vec<PathBuf>,

    /// Output directory for the Zarr store
    #[arg(short, long)]
    output: PathBuf,

    /// Storage backend
    #[arg(long, default_value = "zarr")]
    backend: Backend,

    /// Convert only the first 100 frames of each stream
    #[arg(long)]
    stub: bool,

    /// Write float32 microvolt samples instead of raw counts
    #[arg(long)]
    scaled: bool,

    /// Zlib level for data chunks (0-9)
    #[arg(long, default_value_t = 4)]
    compression_level: u32,

    /// Worker threads for chunk writing (0 = all cores)
    #[arg(long, default_value_t = 0)]
    jobs: usize,

    /// Session description recorded in the file
    #[arg(long)]
    session_description: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Command::Info(args) => info(args),
        Command::Convert(args) => convert(args),
    };

    if let Err(err) = result {
        log::error!("{err}");
        std::process::exit(1);
    }
}

fn info(args: InfoArgs) -> Result<(), NwbError> {
    let recording = SpikeGlxRecording::open(&args.meta)?;
    let duration = recording.num_frames() as f64 / recording.sampling_frequency();

    println!("stream:          {}", recording.stream_kind());
    println!("channels:        {}", recording.num_channels());
    println!("frames:          {}", recording.num_frames());
    println!("sampling rate:   {} Hz", recording.sampling_frequency());
    println!("duration:        {duration:.3} s");
    println!(
        "uV per bit:      {:.6}",
        recording.microvolts_per_bit()
    );
    match recording.session_start_time() {
        Some(start) => println!("session start:   {}", start.format("%Y-%m-%dT%H:%M:%S")),
        None => println!("session start:   unknown"),
    }
    println!("channel ids:     {}", recording.channel_ids().join(", "));
    Ok(())
}

fn convert(args: ConvertArgs) -> Result<(), NwbError> {
    let mut interfaces: Vec<Box<dyn DataInterface>> = Vec::new();
    for meta in &args.meta {
        match StreamKind::from_path(meta)? {
            StreamKind::Nidq => {
                interfaces.push(Box::new(SpikeGlxNidqInterface::new(meta)?));
            }
            StreamKind::Ap | StreamKind::Lf => {
                interfaces.push(Box::new(SpikeGlxRecordingInterface::new(meta)?));
            }
        }
    }
    let converter = NwbConverter::new(interfaces);

    let user_metadata = args.session_description.map(|description| {
        let mut metadata = Metadata::new();
        metadata.set_path(&["NWBFile", "session_description"], json!(description));
        metadata
    });

    let options = ConversionOptions {
        stub_test: args.stub,
        write_scaled: args.scaled,
        compression_level: args.compression_level,
        number_of_jobs: args.jobs,
        ..Default::default()
    };
    let report = converter.run_conversion(&args.output, user_metadata, args.backend, &options)?;

    println!(
        "wrote {} ({} arrays, {} data chunks)",
        args.output.display(),
        report.arrays,
        report.chunks_written
    );
    Ok(())
}
