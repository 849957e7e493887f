//! run-pre matcher CLI.
//!
//! Loads a JSON manifest describing a set of pre-patch sections, their
//! relocations, a simulated pre-image, a simulated running image, and
//! the loaded modules visible to brute search, then runs the matcher
//! end to end. Meant for manual exploration and as executable
//! documentation; the library itself makes no promises about this
//! binary's input format.

use clap::{Parser, ValueEnum};
use runpre_matcher::formatter::{HumanFormatter, JsonFormatter, ReportFormatter, ShortFormatter};
use runpre_matcher::target::{Checkpoint, ModuleEnumerator, NullCheckpoint, PreImage, TargetMemory};
use runpre_matcher::{do_helper, MatchError, MatcherConfig, ModuleInfo, Relocation, RelocationTable, SectionDescriptor};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::ExitCode;

/// Match known pre-patch sections against their addresses in a
/// simulated running image.
#[derive(Parser, Debug)]
#[command(name = "runpre-match")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON manifest (see `Manifest` for the expected shape).
    manifest: PathBuf,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    format: OutputFormat,

    /// Matching mode.
    #[arg(short, long, default_value = "normal")]
    mode: MatchMode,

    /// Also print accumulated safety records (human format only).
    #[arg(short, long)]
    verbose: bool,
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output.
    Human,
    /// JSON output.
    Json,
    /// Compact single-line output.
    Short,
}

/// Matching mode options.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum MatchMode {
    /// Default bounds (`MatcherConfig::default`).
    Normal,
    /// Never brute-force scan (`MatcherConfig::strict`).
    Strict,
    /// Raised restart bound, always brute-force (`MatcherConfig::exhaustive`).
    Exhaustive,
}

/// On-disk manifest shape fed to the matcher.
#[derive(Debug, Deserialize)]
struct Manifest {
    sections: Vec<SectionDescriptor>,
    #[serde(default)]
    relocations: Vec<Relocation>,
    #[serde(default)]
    modules: Vec<ModuleInfo>,
    pre_image: Image,
    target_image: Image,
}

/// A flat byte image starting at `base`, hex-encoded for readability in
/// a JSON manifest.
#[derive(Debug, Deserialize)]
struct Image {
    base: u64,
    #[serde(deserialize_with = "deserialize_hex")]
    bytes: Vec<u8>,
}

fn deserialize_hex<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    hex::decode(s.trim()).map_err(serde::de::Error::custom)
}

/// A flat in-memory image serving as both [`TargetMemory`] and
/// [`PreImage`], backing the manifest's `pre_image`/`target_image`.
struct SimImage {
    base: u64,
    bytes: Vec<u8>,
}

impl SimImage {
    fn offset(&self, addr: u64) -> Option<usize> {
        addr.checked_sub(self.base).and_then(|o| {
            let o = o as usize;
            (o < self.bytes.len()).then_some(o)
        })
    }
}

impl TargetMemory for SimImage {
    fn is_mapped(&self, addr: u64) -> bool {
        self.offset(addr).is_some()
    }

    fn read_u8(&self, addr: u64) -> Option<u8> {
        self.offset(addr).map(|o| self.bytes[o])
    }

    fn read_i32(&self, addr: u64) -> Option<i32> {
        use byteorder::{ByteOrder, LittleEndian};
        let o = self.offset(addr)?;
        if o + 4 > self.bytes.len() {
            return None;
        }
        Some(LittleEndian::read_i32(&self.bytes[o..o + 4]))
    }
}

impl PreImage for SimImage {
    fn read_u8(&self, addr: u64) -> u8 {
        self.offset(addr)
            .map(|o| self.bytes[o])
            .unwrap_or_else(|| panic!("pre-image read out of range: {addr:#x}"))
    }
}

struct SimModules(Vec<ModuleInfo>);

impl ModuleEnumerator for SimModules {
    fn modules(&self) -> Vec<ModuleInfo> {
        self.0.clone()
    }
}

/// A checkpoint that counts ticks, standing in for a real scheduler or
/// Ctrl-C handler. Used under `--verbose` to report how much candidate
/// and brute-search work a run did.
#[derive(Default)]
struct CountingCheckpoint {
    ticks: u64,
}

impl Checkpoint for CountingCheckpoint {
    fn tick(&mut self) -> bool {
        self.ticks += 1;
        false
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("runpre_matcher=trace")
            .init();
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("runpre-match: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(&args.manifest)?;
    let manifest: Manifest = serde_json::from_slice(&data)?;

    let config = match args.mode {
        MatchMode::Normal => MatcherConfig::default(),
        MatchMode::Strict => MatcherConfig::strict(),
        MatchMode::Exhaustive => MatcherConfig::exhaustive(),
    };

    let pre = SimImage {
        base: manifest.pre_image.base,
        bytes: manifest.pre_image.bytes,
    };
    let target = SimImage {
        base: manifest.target_image.base,
        bytes: manifest.target_image.bytes,
    };
    let relocations = RelocationTable::new(manifest.relocations);
    let modules = SimModules(manifest.modules);

    let result = if args.verbose {
        let mut checkpoint = CountingCheckpoint::default();
        let result = do_helper(
            &manifest.sections,
            &config,
            &target,
            &pre,
            &relocations,
            &modules,
            &mut checkpoint,
        );
        eprintln!("runpre-match: {} checkpoint ticks", checkpoint.ticks);
        result
    } else {
        let mut checkpoint = NullCheckpoint;
        do_helper(
            &manifest.sections,
            &config,
            &target,
            &pre,
            &relocations,
            &modules,
            &mut checkpoint,
        )
    };

    let report = match result {
        Ok(report) => report,
        Err(MatchError::UnmatchedSections { remaining }) => {
            return Err(format!("could not match: {}", remaining.join(", ")).into());
        }
        Err(e) => return Err(e.into()),
    };

    match args.format {
        OutputFormat::Human => {
            let formatter = if args.verbose {
                HumanFormatter::verbose()
            } else {
                HumanFormatter::new()
            };
            print!("{}", formatter.format_report(&report));
        }
        OutputFormat::Json => print!("{}", JsonFormatter::new().format_report(&report)),
        OutputFormat::Short => print!("{}", ShortFormatter::new().format_report(&report)),
    }

    Ok(())
}
