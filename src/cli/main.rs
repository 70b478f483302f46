//! Offline CLI front-end for `murmur`, mirroring the teacher's
//! `cli/render.rs` offline WAV renderer: load resources, assemble a
//! voice, feed text, drive the scheduler to completion, write a WAV file.

use std::fs::File;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use hound::{SampleFormat, WavSpec, WavWriter};
use murmur::engine::DataType;
use murmur::{System, SystemConfig};

#[derive(Parser)]
#[command(name = "murmur")]
#[command(about = "Embedded text-to-speech pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Synthesize text to a WAV file.
    Synth {
        /// Voice name to assemble from the resource directory.
        #[arg(long)]
        voice: String,
        /// Directory of resource files to load.
        #[arg(long)]
        resources: PathBuf,
        /// Literal text, or `@path` to read text from a file.
        #[arg(long)]
        text: String,
        /// Output WAV path.
        #[arg(long)]
        out: PathBuf,
    },
    /// List the resource files found under a directory (candidate voice
    /// names, since this stand-in has no separate per-voice manifest).
    Voices {
        #[arg(long)]
        resources: PathBuf,
    },
    /// Dump one resource's knowledge-base directory without synthesizing.
    Info {
        #[arg(long)]
        resource: PathBuf,
    },
}

const SAMPLE_RATE: u32 = murmur::stages::signal_gen::SAMPLE_RATE;

fn read_text_arg(text: &str) -> std::io::Result<String> {
    match text.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path),
        None => Ok(text.to_string()),
    }
}

fn load_resources_dir(sys: &mut System, dir: &Path) -> Vec<String> {
    let mut names = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(%e, dir = %dir.display(), "could not read resources directory");
            return names;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = match path.file_stem().and_then(|s| s.to_str()) {
            Some(n) => n.to_string(),
            None => continue,
        };
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(%e, path = %path.display(), "could not open resource file");
                continue;
            }
        };
        match sys.load_resource(&name, &mut file) {
            Ok(()) => names.push(name),
            Err(e) => tracing::warn!(%e, path = %path.display(), "load_resource failed"),
        }
    }
    names
}

fn synth(voice: &str, resources: &Path, text: &str, out: &Path) {
    let text = match read_text_arg(text) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("failed to read --text: {e}");
            std::process::exit(1);
        }
    };

    let mut sys = System::initialize(SystemConfig::new()).expect("system initialize");
    let resource_names = load_resources_dir(&mut sys, resources);

    sys.create_voice_definition(voice).expect("create_voice_definition");
    for name in &resource_names {
        sys.add_resource_to_voice_definition(voice, name)
            .expect("add_resource_to_voice_definition");
    }
    sys.new_engine(voice).expect("new_engine");

    let mut bytes = text.into_bytes();
    if bytes.last() != Some(&0) {
        bytes.push(0);
    }
    let mut fed = 0;
    while fed < bytes.len() {
        fed += sys.feed_text(&bytes[fed..]).expect("feed_text");
    }

    let mut pcm = Vec::new();
    let mut dt = DataType::Pcm16Bit;
    loop {
        let mut buf = [0u8; 4096];
        let (status, n) = sys.get_data(&mut buf, &mut dt).expect("get_data");
        pcm.extend_from_slice(&buf[..n]);
        match status {
            murmur::Status::Idle => break,
            murmur::Status::Error => {
                eprintln!("synthesis error, aborting");
                std::process::exit(1);
            }
            murmur::Status::Busy => continue,
        }
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(out, spec).expect("failed to create WAV file");
    for chunk in pcm.chunks(2) {
        if chunk.len() < 2 {
            break;
        }
        let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
        writer.write_sample(sample).expect("failed to write sample");
    }
    writer.finalize().expect("failed to finalize WAV");

    println!(
        "Synthesized {} PCM bytes to {} ({} Hz, mono, 16-bit)",
        pcm.len(),
        out.display(),
        SAMPLE_RATE
    );
}

fn voices(resources: &Path) {
    let mut sys = System::initialize(SystemConfig::new()).expect("system initialize");
    let names = load_resources_dir(&mut sys, resources);
    for name in names {
        println!("{name}");
    }
}

fn info(resource: &Path) {
    let mut sys = System::initialize(SystemConfig::new()).expect("system initialize");
    let name = resource
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("resource")
        .to_string();
    let mut file = File::open(resource).expect("open resource file");
    sys.load_resource(&name, &mut file).expect("load_resource");

    let res = sys.find_resource(&name).expect("just-loaded resource must be present");
    println!("resource {name}: lock_count={}", res.lock_count());
    for kb in res.knowledge_bases() {
        println!(
            "  {:?}  offset={}  len={}",
            kb.id, kb.arena_off, kb.len
        );
    }
}

fn main() {
    murmur::logging::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Synth { voice, resources, text, out } => synth(&voice, &resources, &text, &out),
        Command::Voices { resources } => voices(&resources),
        Command::Info { resource } => info(&resource),
    }
}
