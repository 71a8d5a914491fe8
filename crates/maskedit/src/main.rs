//! maskedit: prompt-driven photo editing from the command line.
//!
//! Three ways in:
//!
//! - `mask` paints strokes onto an image and writes the resulting mask
//!   PNG. Needs no network.
//! - `edit` runs one generation through Gemini, optionally masked.
//! - `session` reads line commands from a script or stdin and drives a
//!   full editing session with undo/redo.
//!
//! # Usage
//!
//! ```text
//! cargo run --bin maskedit -- edit --image photo.jpg --prompt "Add a red scarf" --output out.png
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod backend;
mod script;
mod strokes;

use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand};
use maskedit_core::{EditSession, EditorConfig, Mask};
use maskedit_gemini::{GeminiClient, GeminiConfig};

use crate::backend::Backend;
use crate::script::Runner;
use crate::strokes::{Stroke, paint_strokes};

/// Prompt-driven photo editing with painted masks.
#[derive(Parser)]
#[command(name = "maskedit", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Initial brush size in pixels (clamped to 5-100).
    #[arg(long, global = true, default_value_t = EditorConfig::DEFAULT_BRUSH_SIZE)]
    brush_size: u32,

    /// Full editor config as a JSON string.
    ///
    /// When provided, `--brush-size` is ignored. Missing fields keep
    /// their defaults.
    #[arg(long, global = true)]
    config_json: Option<String>,

    /// Gemini client config as a JSON string.
    #[arg(long, global = true)]
    gemini_config_json: Option<String>,

    /// Gemini API key. Falls back to `GEMINI_API_KEY`, then `API_KEY`.
    #[arg(long, global = true)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Paint strokes onto an image and write the mask PNG.
    Mask {
        #[command(flatten)]
        canvas: CanvasArgs,

        /// Where to write the mask.
        #[arg(long)]
        output: PathBuf,
    },

    /// Run one edit through Gemini.
    Edit {
        #[command(flatten)]
        canvas: CanvasArgs,

        /// What to change.
        #[arg(long)]
        prompt: String,

        /// What to avoid.
        #[arg(long, default_value = "")]
        negative_prompt: String,

        /// On a safety-filter refusal, enhance the prompts and retry once.
        #[arg(long)]
        enhance_on_safety: bool,

        /// Where to write the edited image.
        #[arg(long)]
        output: PathBuf,
    },

    /// Drive a session from line commands.
    Session {
        /// Path to the input image (PNG, JPEG, BMP, WebP).
        #[arg(long)]
        image: Option<PathBuf>,

        /// Canvas width in pixels; defaults to the image width.
        #[arg(long)]
        surface_width: Option<u32>,

        /// Read commands from this file instead of stdin.
        #[arg(long)]
        script: Option<PathBuf>,
    },
}

#[derive(Args)]
struct CanvasArgs {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    #[arg(long)]
    image: PathBuf,

    /// A brush stroke as space-separated `x,y` points in canvas
    /// coordinates. Repeat for several strokes.
    #[arg(long = "stroke")]
    strokes: Vec<Stroke>,

    /// Canvas width in pixels; defaults to the image width.
    #[arg(long)]
    surface_width: Option<u32>,
}

/// Build an [`EditorConfig`] from CLI arguments.
///
/// If `--config-json` is provided it is parsed directly and
/// `--brush-size` is ignored.
fn editor_config_from_cli(cli: &Cli) -> Result<EditorConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }
    Ok(EditorConfig {
        brush_size: cli.brush_size,
        ..EditorConfig::default()
    })
}

fn gemini_config_from_cli(cli: &Cli) -> Result<GeminiConfig, String> {
    cli.gemini_config_json.as_ref().map_or_else(
        || Ok(GeminiConfig::default()),
        |json| {
            serde_json::from_str(json)
                .map_err(|e| format!("Error parsing --gemini-config-json: {e}"))
        },
    )
}

/// A Gemini client from `--api-key` or the environment.
fn gemini_client(cli: &Cli) -> Result<GeminiClient, String> {
    let config = gemini_config_from_cli(cli)?;
    let client = match &cli.api_key {
        Some(key) => GeminiClient::new(config, key.as_str()),
        None => GeminiClient::from_env(config),
    };
    client.map_err(|e| e.to_string())
}

fn load_session(config: EditorConfig, image: &Path) -> Result<EditSession, String> {
    let bytes = std::fs::read(image).map_err(|e| format!("reading {}: {e}", image.display()))?;
    let mut session = EditSession::new(config);
    session
        .upload(bytes, None)
        .map_err(|e| format!("{}: {e}", image.display()))?;
    log::info!("loaded {}", image.display());
    Ok(session)
}

/// Load the image and paint `canvas.strokes` onto it.
fn masked_session(config: EditorConfig, canvas: &CanvasArgs) -> Result<EditSession, String> {
    let mut session = load_session(config, &canvas.image)?;
    if !canvas.strokes.is_empty() {
        let width = canvas
            .surface_width
            .or_else(|| session.source().map(|s| s.dimensions().width))
            .unwrap_or_default();
        paint_strokes(&mut session, width, &canvas.strokes).map_err(|e| e.to_string())?;
        if session.is_masking() {
            session.toggle_masking(width).map_err(|e| e.to_string())?;
        }
    }
    Ok(session)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), String> {
    std::fs::write(path, bytes).map_err(|e| format!("writing {}: {e}", path.display()))?;
    eprintln!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

fn run_mask(config: EditorConfig, canvas: &CanvasArgs, output: &Path) -> Result<(), String> {
    let session = masked_session(config, canvas)?;
    let mask = match session.mask() {
        Some(mask) => mask.clone(),
        None => {
            eprintln!("No pixels were painted; writing an empty mask.");
            let dimensions = session
                .source()
                .map(maskedit_core::SourceImage::dimensions)
                .ok_or("no image loaded")?;
            Mask::empty(dimensions)
        }
    };
    let dimensions = mask.dimensions();
    eprintln!(
        "Mask: {}x{}, {} of {} pixel(s) selected",
        dimensions.width,
        dimensions.height,
        mask.selected_pixels(),
        dimensions.pixel_count()
    );
    let png = mask.to_png().map_err(|e| e.to_string())?;
    write_file(output, &png)
}

#[allow(clippy::future_not_send)] // driven on a single-threaded runtime
async fn run_edit(
    cli: &Cli,
    config: EditorConfig,
    canvas: &CanvasArgs,
    prompt: &str,
    negative_prompt: &str,
    enhance_on_safety: bool,
    output: &Path,
) -> Result<(), String> {
    let client = gemini_client(cli)?;
    let mut session = masked_session(config, canvas)?;
    session.set_prompt(prompt).map_err(|e| e.to_string())?;
    session
        .set_negative_prompt(negative_prompt)
        .map_err(|e| e.to_string())?;

    let outcome = match session.generate(&client).await {
        Err(e) if e.is_safety_filtered() && enhance_on_safety => {
            eprintln!("{e}");
            eprintln!("Enhancing the prompt and retrying...");
            session.enhance_and_retry(&client, &client).await
        }
        other => other,
    };
    outcome.map_err(|e| e.to_string())?;

    if let Some(text) = session.current_result().and_then(|r| r.text.as_deref()) {
        eprintln!("Model: {text}");
    }
    let download = session.download().map_err(|e| e.to_string())?;
    write_file(output, &download.bytes)
}

#[allow(clippy::future_not_send)] // driven on a single-threaded runtime
async fn run_session(
    cli: &Cli,
    config: EditorConfig,
    image: Option<&Path>,
    surface_width: Option<u32>,
    script: Option<&Path>,
) -> Result<usize, String> {
    let session = match image {
        Some(path) => load_session(config, path)?,
        None => EditSession::new(config),
    };
    let backend = Backend::new(
        gemini_client(cli)
            .inspect_err(|e| log::warn!("{e}; generate and enhance will fail"))
            .ok(),
    );
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    let mut runner = Runner::new(session, &backend, surface_width, seed);
    let mut stdout = std::io::stdout();

    let failures = match script {
        Some(path) => {
            let file = std::fs::File::open(path)
                .map_err(|e| format!("opening {}: {e}", path.display()))?;
            runner.run(BufReader::new(file), &mut stdout).await
        }
        None => runner.run(std::io::stdin().lock(), &mut stdout).await,
    };
    failures.map_err(|e| e.to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match editor_config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let result = match &cli.command {
        Command::Mask { canvas, output } => run_mask(config, canvas, output),
        Command::Edit {
            canvas,
            prompt,
            negative_prompt,
            enhance_on_safety,
            output,
        } => {
            run_edit(
                &cli,
                config,
                canvas,
                prompt,
                negative_prompt,
                *enhance_on_safety,
                output,
            )
            .await
        }
        Command::Session {
            image,
            surface_width,
            script,
        } => match run_session(
            &cli,
            config,
            image.as_deref(),
            *surface_width,
            script.as_deref(),
        )
        .await
        {
            Ok(0) => Ok(()),
            Ok(failures) => Err(format!("{failures} command(s) failed")),
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn brush_flag_feeds_editor_config() {
        let cli = Cli::parse_from([
            "maskedit",
            "mask",
            "--image",
            "in.png",
            "--output",
            "m.png",
            "--brush-size",
            "12",
            "--stroke",
            "1,1 5,5",
        ]);
        assert_eq!(editor_config_from_cli(&cli).unwrap().brush_size, 12);
        let Command::Mask { canvas, .. } = &cli.command else {
            unreachable!("parsed as mask");
        };
        assert_eq!(canvas.strokes.len(), 1);
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = Cli::parse_from([
            "maskedit",
            "session",
            "--brush-size",
            "12",
            "--config-json",
            r#"{"download_stem": "scarf"}"#,
            "--gemini-config-json",
            r#"{"timeout_secs": 9}"#,
        ]);
        let config = editor_config_from_cli(&cli).unwrap();
        assert_eq!(config.brush_size, EditorConfig::DEFAULT_BRUSH_SIZE);
        assert_eq!(config.download_stem, "scarf");
        assert_eq!(gemini_config_from_cli(&cli).unwrap().timeout_secs, 9);
    }

    #[test]
    fn bad_config_json_is_reported() {
        let cli = Cli::parse_from(["maskedit", "session", "--config-json", "{"]);
        assert!(
            editor_config_from_cli(&cli)
                .unwrap_err()
                .starts_with("Error parsing --config-json")
        );
    }
}
