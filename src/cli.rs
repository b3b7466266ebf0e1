// ============================================================================
// gifstamp CLI: stamp the current time onto animated GIFs
// ============================================================================
//
// Usage examples:
//   gifstamp -i background.gif -f Raleway-Black.ttf -o stamped.gif
//   gifstamp -i loop.gif                                (system font, loop_stamped.gif)
//   gifstamp -i "anims/*.gif" -f font.ttf --output-dir out/ --parallel
//   gifstamp -i a.gif --config overlay.toml --color ff0000 --anchor 0.5,1
//
// Every file is processed start to finish before the next one; an output file
// only appears when its animation encoded successfully.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use gifstamp::config::{parse_alignment, parse_color};
use gifstamp::ops::text::find_system_font;
use gifstamp::{FontResource, OverlayConfig, TimestampMode, stamp_file};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Stamp the current time onto every frame of an animated GIF.
#[derive(Parser, Debug)]
#[command(
    name = "gifstamp",
    about = "Overlay the current date and time on animated GIFs",
    long_about = "Draws the current time (default pattern \"%d.%m. %H:%M\") in the centre of\n\
                  every frame of an animated GIF and writes a new GIF with the original\n\
                  frame delays and loop count.\n\n\
                  Example:\n  \
                  gifstamp -i background.gif -f font.ttf -o stamped.gif\n  \
                  gifstamp -i \"*.gif\" --output-dir out/ --parallel"
)]
pub struct CliArgs {
    /// Input GIF file(s). Glob patterns accepted (e.g. "*.gif").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// TrueType/OpenType font file. When omitted, the first installed
    /// system .ttf that loads is used.
    #[arg(short, long, value_name = "FONT.ttf")]
    pub font: Option<PathBuf>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing; files keep their input name.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// TOML overlay configuration. Flags below override its values.
    #[arg(long, value_name = "FILE.toml")]
    pub config: Option<PathBuf>,

    /// Text size in pixels (default 16).
    #[arg(short = 's', long, value_name = "PX")]
    pub font_size: Option<f32>,

    /// Text colour as RRGGBB or RRGGBBAA (default 000000).
    #[arg(short, long, value_name = "RRGGBB[AA]")]
    pub color: Option<String>,

    /// chrono strftime pattern for the timestamp.
    #[arg(short, long, value_name = "FORMAT")]
    pub pattern: Option<String>,

    /// Point of the text box pinned to the frame centre, as AX,AY in [0, 1].
    #[arg(short, long, value_name = "AX,AY")]
    pub anchor: Option<String>,

    /// Sample the clock once for the whole animation instead of per frame.
    #[arg(long)]
    pub shared_timestamp: bool,

    /// Render frames in parallel.
    #[arg(long)]
    pub parallel: bool,

    /// Write a run log to this file (truncated on each run).
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Print per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    if let Some(path) = &args.log_file
        && let Err(e) = gifstamp::logger::init(path)
    {
        eprintln!("warning: could not open log file '{}': {}", path.display(), e);
    }

    let config = match build_config(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Resolve glob patterns / literal paths → concrete PathBufs
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if let Err(msg) = check_single_output(inputs.len(), args.output.as_deref()) {
        eprintln!("error: {}", msg);
        return ExitCode::FAILURE;
    }

    let font = match load_font(args.font.as_deref()) {
        Ok(f) => f,
        Err(msg) => {
            eprintln!("error: {}", msg);
            return ExitCode::FAILURE;
        }
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let Some(output_path) =
            build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref())
        else {
            eprintln!(
                "  error: cannot determine output path for '{}'.",
                input_path.display()
            );
            any_failure = true;
            continue;
        };

        match stamp_file(input_path, &output_path, &font, &config) {
            Ok(stats) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({} frames, {:.0}ms)",
                        output_path.display(),
                        stats.frames,
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                gifstamp::log_err!("{}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Helpers
// ============================================================================

/// Defaults, then the config file, then individual flags.
fn build_config(args: &CliArgs) -> gifstamp::Result<OverlayConfig> {
    let mut config = match &args.config {
        Some(path) => OverlayConfig::load(path)?,
        None => OverlayConfig::default(),
    };

    if let Some(size) = args.font_size {
        config.font_size = size;
    }
    if let Some(color) = &args.color {
        config.text_color = parse_color(color)?;
    }
    if let Some(pattern) = &args.pattern {
        config.timestamp_pattern = pattern.clone();
    }
    if let Some(anchor) = &args.anchor {
        config.anchor_alignment = parse_alignment(anchor)?;
    }
    if args.shared_timestamp {
        config.timestamp_mode = TimestampMode::Shared;
    }
    if args.parallel {
        config.parallel = true;
    }

    config.validate()?;
    Ok(config)
}

fn load_font(path: Option<&Path>) -> Result<FontResource, String> {
    match path {
        Some(p) => FontResource::open(p).map_err(|e| e.to_string()),
        None => match find_system_font() {
            Some((p, font)) => {
                gifstamp::log_info!("using system font {}", p.display());
                Ok(font)
            }
            None => Err("no --font given and no system font found".to_string()),
        },
    }
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            // Literal path, use directly
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        // Treat as glob pattern
        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Multiple inputs require --output-dir; --output names exactly one file.
fn check_single_output(input_count: usize, output: Option<&Path>) -> Result<(), String> {
    if input_count > 1 && output.is_some() {
        return Err(format!(
            "{} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            input_count
        ));
    }
    Ok(())
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, keeps the input file name)
/// 3. Fallback: next to the input as `<stem>_stamped.gif`
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.gif", stem)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}_stamped.gif", stem)))
}
