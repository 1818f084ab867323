use clap::{Parser, Subcommand};
use hound::{SampleFormat, WavSpec};
use log::{debug, info};
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tonelink_core::{AudioModemError, Configuration, Decoder, EccLevel, Encoder};

/// Silence written before and after the message, in seconds
const PADDING_TIME: f64 = 0.25;

#[derive(Debug, Error)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error(transparent)]
    Modem(#[from] AudioModemError),

    #[error("unsupported WAV format: {0} bits {1:?}")]
    UnsupportedFormat(u16, SampleFormat),

    #[error("no message found in {0}")]
    NoMessage(PathBuf),
}

#[derive(Parser)]
#[command(name = "tonelink")]
#[command(about = "Send bytes over sound with dual-tone symbols")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a file (at most 255 bytes) into a WAV file
    Encode {
        /// Input binary file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Error correction level: L, M, Q or H
        #[arg(short, long, default_value = "Q")]
        ecc: EccLevel,

        /// Append a CRC-8 of the payload
        #[arg(long)]
        crc: bool,

        /// Output sample rate in Hz
        #[arg(short, long, default_value_t = 44100)]
        sample_rate: u32,
    },

    /// Decode the first message of a WAV file
    Decode {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Output binary file
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Samples pushed to the decoder at a time
        #[arg(short, long, default_value_t = 4096)]
        chunk: usize,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Encode {
            input,
            output,
            ecc,
            crc,
            sample_rate,
        } => encode_command(&input, &output, ecc, crc, sample_rate),
        Commands::Decode {
            input,
            output,
            chunk,
        } => decode_command(&input, &output, chunk),
    }
}

fn encode_command(
    input_path: &Path,
    output_path: &Path,
    ecc: EccLevel,
    crc: bool,
    sample_rate: u32,
) -> Result<(), CliError> {
    let data = std::fs::read(input_path)?;
    println!("Read {} bytes from {}", data.len(), input_path.display());

    let config = Configuration::audible(sample_rate as f64)?;
    let encoder = Encoder::new(config);
    let samples = encoder.encode(&data, ecc, crc)?;
    println!("Encoded to {} audio samples (level {})", samples.len(), ecc);

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let file = File::create(output_path)?;
    let mut writer = hound::WavWriter::new(file, spec)?;

    let padding = (sample_rate as f64 * PADDING_TIME) as usize;
    let silence = std::iter::repeat(0.0f32).take(padding);
    for sample in silence.clone().chain(samples).chain(silence) {
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * 32767.0) as i16)?;
    }
    writer.finalize()?;

    println!("Wrote {}", output_path.display());
    Ok(())
}

fn decode_command(input_path: &Path, output_path: &Path, chunk: usize) -> Result<(), CliError> {
    let (samples, sample_rate) = read_wav(input_path)?;
    println!(
        "Read {} samples at {} Hz from {}",
        samples.len(),
        sample_rate,
        input_path.display()
    );

    let config = Configuration::audible(sample_rate as f64)?;
    let mut decoder = Decoder::new(config)?;

    for fragment in samples.chunks(chunk.max(1)) {
        if decoder.push_samples(fragment)? {
            if let Some(message) = decoder.pop_message() {
                let payload = message?;
                std::fs::write(output_path, &payload)?;
                println!("Decoded {} bytes to {}", payload.len(), output_path.display());
                return Ok(());
            }
        }
    }

    info!("stream ended at sample {}", decoder.position());
    Err(CliError::NoMessage(input_path.to_path_buf()))
}

/// Read the first channel of a WAV file as floats in [-1, 1]
fn read_wav(path: &Path) -> Result<(Vec<f32>, u32), CliError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    debug!(
        "WAV: {} Hz, {} channels, {} bits {:?}",
        spec.sample_rate, spec.channels, spec.bits_per_sample, spec.sample_format
    );
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|s| s as f32 / 32768.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|s| s as f32 / 8_388_608.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (format, bits) => return Err(CliError::UnsupportedFormat(bits, format)),
    };

    let mono = interleaved.into_iter().step_by(channels).collect();
    Ok((mono, spec.sample_rate))
}
