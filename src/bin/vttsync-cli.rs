use std::fs;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use vttsync::cli::AcquisitionArgs;
use vttsync::cue_encoder::{CueEncoder, write_cues};
use vttsync::json_array_encoder::JsonArrayEncoder;
use vttsync::output_type::OutputType;
use vttsync::sanitize::{clean, strip_preamble};
use vttsync::vtt_encoder::VttEncoder;
use vttsync::{Acquirer, locator, vtt_parser};

#[derive(Parser, Debug)]
#[command(name = "vttsync")]
#[command(about = "Acquire audio from video URLs and work with generated WebVTT captions")]
struct Params {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Strip code fences from generated caption text.
    Clean {
        /// Input file (reads stdin when omitted).
        #[arg(short = 'i', long = "input")]
        input: Option<PathBuf>,
    },

    /// Clean and parse a caption document, then re-emit its cues.
    Parse {
        #[arg(short = 'i', long = "input")]
        input: Option<PathBuf>,

        #[arg(
            short = 'o',
            long = "output-type",
            value_enum,
            default_value_t = OutputType::Vtt
        )]
        output_type: OutputType,

        /// Drop any text before the `WEBVTT` header.
        #[arg(long = "strip-preamble", default_value_t = false)]
        strip_preamble: bool,
    },

    /// Print the cue active at a playback position as JSON (`null` if none).
    Active {
        #[arg(short = 'i', long = "input")]
        input: Option<PathBuf>,

        /// Playback position in seconds.
        #[arg(short = 't', long = "at")]
        at: f64,
    },

    /// Download audio for a video URL.
    Acquire {
        /// Video URL.
        url: String,

        /// Write the decoded audio here and print only the artifact metadata.
        #[arg(long = "out")]
        out: Option<PathBuf>,

        #[command(flatten)]
        acquisition: AcquisitionArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    vttsync::init_logging();
    let params = Params::parse();

    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());

    match params.command {
        Command::Clean { input } => {
            let cleaned = clean(&read_input(input.as_ref())?);
            writeln!(writer, "{cleaned}")?;
        }
        Command::Parse {
            input,
            output_type,
            strip_preamble: strip,
        } => {
            let cleaned = clean(&read_input(input.as_ref())?);
            let document = if strip { strip_preamble(&cleaned) } else { &cleaned };
            let report = vtt_parser::parse_with_report(document);
            if report.malformed_blocks > 0 {
                warn!(malformed_blocks = report.malformed_blocks, "skipped malformed cue blocks");
            }

            let mut encoder: Box<dyn CueEncoder + '_> = match output_type {
                OutputType::Json => Box::new(JsonArrayEncoder::new(&mut writer)),
                OutputType::Vtt => Box::new(VttEncoder::new(&mut writer)),
            };
            write_cues(&mut *encoder, &report.cues)?;
        }
        Command::Active { input, at } => {
            let cues = vtt_parser::parse(&clean(&read_input(input.as_ref())?));
            let active = locator::locate(&cues, at);
            serde_json::to_writer(&mut writer, &active)?;
            writeln!(writer)?;
        }
        Command::Acquire {
            url,
            out,
            acquisition,
        } => {
            let acquirer = Acquirer::new(acquisition.to_opts());

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let mut artifact = acquirer
                .acquire(&url, &cancel)
                .await
                .map_err(|err| anyhow::anyhow!("{}: {err}", err.user_message()))?;

            if let Some(path) = out {
                let bytes = artifact.decode_payload()?;
                fs::write(&path, bytes)
                    .with_context(|| format!("failed to write '{}'", path.display()))?;
                artifact.base64_payload.clear();
            }
            serde_json::to_writer_pretty(&mut writer, &artifact)?;
            writeln!(writer)?;
        }
    }

    writer.flush()?;
    Ok(())
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read '{}'", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}
