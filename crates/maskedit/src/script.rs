//! Line-oriented session scripts.
//!
//! Each non-blank line that does not start with `#` is one command:
//!
//! ```text
//! prompt Add a red scarf
//! negative blurry
//! mask on
//! brush 20
//! down 10 40
//! move 60 40
//! up
//! generate
//! undo
//! download out.png
//! ```

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use maskedit_core::{EXAMPLE_PROMPTS, EditSession, ImageEditService, Point, PromptEnhancer};

use crate::strokes::parse_coordinate;

/// One script command.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptCommand {
    /// Replace the working prompt.
    Prompt(String),
    /// Replace the working negative prompt.
    Negative(String),
    /// Fill the prompt with a canned idea.
    Surprise,
    /// List the example prompts, numbered from 1.
    Examples,
    /// Use example prompt N as the prompt.
    Example(usize),
    /// Turn masking on or off.
    Mask(bool),
    /// Set the brush size.
    Brush(u32),
    /// Place the surface's top-left corner on screen.
    Origin(Point),
    /// Pointer pressed.
    Down(Point),
    /// Pointer moved.
    Move(Point),
    /// Pointer released.
    Up,
    /// Pointer left the canvas.
    Leave,
    /// Drop the working mask.
    ClearMask,
    /// Re-layout the canvas at a new width.
    Resize(u32),
    /// Run one generation.
    Generate,
    /// Enhance the prompts, then generate.
    Enhance,
    /// Step back in history.
    Undo,
    /// Step forward in history.
    Redo,
    /// Print the control state as JSON.
    Status,
    /// Write the current result image.
    Download(PathBuf),
    /// Forget everything.
    Reset,
    /// Load a new image.
    Upload(PathBuf),
    /// Stop reading commands.
    Quit,
}

/// Parse one line. Blank lines and `#` comments give `Ok(None)`.
///
/// # Errors
///
/// A message naming the problem if the line is not a valid command.
pub fn parse_line(line: &str) -> Result<Option<ScriptCommand>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(w, r)| (w, r.trim()));

    let command = match word {
        "prompt" => ScriptCommand::Prompt(rest.to_owned()),
        "negative" => ScriptCommand::Negative(rest.to_owned()),
        "surprise" => no_args(word, rest, ScriptCommand::Surprise)?,
        "examples" => no_args(word, rest, ScriptCommand::Examples)?,
        "example" => ScriptCommand::Example(parse_example(rest)?),
        "mask" => match rest {
            "on" => ScriptCommand::Mask(true),
            "off" => ScriptCommand::Mask(false),
            _ => return Err(format!("mask expects on or off, got {rest:?}")),
        },
        "brush" => ScriptCommand::Brush(parse_size(word, rest)?),
        "origin" => ScriptCommand::Origin(parse_xy(word, rest)?),
        "down" => ScriptCommand::Down(parse_xy(word, rest)?),
        "move" => ScriptCommand::Move(parse_xy(word, rest)?),
        "up" => no_args(word, rest, ScriptCommand::Up)?,
        "leave" => no_args(word, rest, ScriptCommand::Leave)?,
        "clear-mask" => no_args(word, rest, ScriptCommand::ClearMask)?,
        "resize" => ScriptCommand::Resize(parse_size(word, rest)?),
        "generate" => no_args(word, rest, ScriptCommand::Generate)?,
        "enhance" => no_args(word, rest, ScriptCommand::Enhance)?,
        "undo" => no_args(word, rest, ScriptCommand::Undo)?,
        "redo" => no_args(word, rest, ScriptCommand::Redo)?,
        "status" => no_args(word, rest, ScriptCommand::Status)?,
        "download" => ScriptCommand::Download(parse_path(word, rest)?),
        "reset" => no_args(word, rest, ScriptCommand::Reset)?,
        "upload" => ScriptCommand::Upload(parse_path(word, rest)?),
        "quit" | "exit" => no_args(word, rest, ScriptCommand::Quit)?,
        _ => return Err(format!("unknown command {word:?}")),
    };
    Ok(Some(command))
}

fn no_args(word: &str, rest: &str, command: ScriptCommand) -> Result<ScriptCommand, String> {
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(format!("{word} takes no arguments"))
    }
}

fn parse_size(word: &str, rest: &str) -> Result<u32, String> {
    rest.parse()
        .map_err(|_| format!("{word} expects a whole number of pixels, got {rest:?}"))
}

fn parse_example(rest: &str) -> Result<usize, String> {
    rest.parse()
        .ok()
        .filter(|n| (1..=EXAMPLE_PROMPTS.len()).contains(n))
        .ok_or_else(|| {
            format!(
                "example expects a number from 1 to {}, got {rest:?}",
                EXAMPLE_PROMPTS.len()
            )
        })
}

fn parse_xy(word: &str, rest: &str) -> Result<Point, String> {
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(x), Some(y), None) => Ok(Point::new(parse_coordinate(x)?, parse_coordinate(y)?)),
        _ => Err(format!("{word} expects X Y")),
    }
}

fn parse_path(word: &str, rest: &str) -> Result<PathBuf, String> {
    if rest.is_empty() {
        Err(format!("{word} expects a path"))
    } else {
        Ok(PathBuf::from(rest))
    }
}

/// What to do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next command.
    Continue,
    /// Stop.
    Quit,
}

/// Drives an [`EditSession`] from script commands.
pub struct Runner<'a, S> {
    session: EditSession,
    services: &'a S,
    surface_width: Option<u32>,
    surprise_seed: u64,
}

impl<'a, S> Runner<'a, S>
where
    S: ImageEditService + PromptEnhancer,
{
    /// Wrap `session`. The canvas is as wide as the image unless
    /// `surface_width` says otherwise.
    pub const fn new(
        session: EditSession,
        services: &'a S,
        surface_width: Option<u32>,
        surprise_seed: u64,
    ) -> Self {
        Self {
            session,
            services,
            surface_width,
            surprise_seed,
        }
    }

    /// The session being driven.
    pub const fn session(&self) -> &EditSession {
        &self.session
    }

    /// Run every command from `input`, reporting to `out`. Bad lines and
    /// failed commands are reported and skipped.
    ///
    /// Returns the number of lines that failed.
    ///
    /// # Errors
    ///
    /// Only I/O errors reading `input` or writing `out`.
    #[allow(clippy::future_not_send)] // driven on a single-threaded runtime
    pub async fn run<R: BufRead, W: Write>(
        &mut self,
        input: R,
        out: &mut W,
    ) -> std::io::Result<usize> {
        let mut failures = 0;
        for (number, line) in input.lines().enumerate() {
            let line = line?;
            let outcome = match parse_line(&line) {
                Ok(None) => continue,
                Ok(Some(command)) => self.execute(command, out).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(e) => {
                    failures += 1;
                    log::warn!("line {}: {e}", number + 1);
                    writeln!(out, "error (line {}): {e}", number + 1)?;
                }
            }
        }
        Ok(failures)
    }

    /// Run one command.
    ///
    /// # Errors
    ///
    /// The user-facing message if the command failed.
    #[allow(clippy::future_not_send)] // driven on a single-threaded runtime
    pub async fn execute<W: Write>(
        &mut self,
        command: ScriptCommand,
        out: &mut W,
    ) -> Result<Flow, String> {
        let session = &mut self.session;
        match command {
            ScriptCommand::Prompt(text) => session.set_prompt(text).map_err(display)?,
            ScriptCommand::Negative(text) => session.set_negative_prompt(text).map_err(display)?,
            ScriptCommand::Surprise => {
                let prompt = session.surprise(self.surprise_seed).map_err(display)?;
                self.surprise_seed = self.surprise_seed.wrapping_add(1);
                say(out, format_args!("prompt: {prompt}"))?;
            }
            ScriptCommand::Examples => {
                for (n, prompt) in EXAMPLE_PROMPTS.iter().enumerate() {
                    say(out, format_args!("{}. {prompt}", n + 1))?;
                }
            }
            ScriptCommand::Example(n) => {
                let prompt = EXAMPLE_PROMPTS
                    .get(n.wrapping_sub(1))
                    .ok_or_else(|| format!("no example {n}"))?;
                session.set_prompt(*prompt).map_err(display)?;
                say(out, format_args!("prompt: {prompt}"))?;
            }
            ScriptCommand::Mask(on) => {
                if session.is_masking() != on {
                    let width = self.surface_width.or_else(|| image_width(session));
                    session
                        .toggle_masking(width.unwrap_or(0))
                        .map_err(display)?;
                }
            }
            ScriptCommand::Brush(size) => {
                let brush = session.set_brush_size(size);
                say(out, format_args!("brush: {}px", brush.size_px()))?;
            }
            ScriptCommand::Origin(origin) => session.set_surface_origin(origin).map_err(display)?,
            ScriptCommand::Down(point) => session.pointer_down(point).map_err(display)?,
            ScriptCommand::Move(point) => session.pointer_move(point).map_err(display)?,
            ScriptCommand::Up => session.pointer_up().map_err(display)?,
            ScriptCommand::Leave => session.pointer_leave().map_err(display)?,
            ScriptCommand::ClearMask => session.clear_mask().map_err(display)?,
            ScriptCommand::Resize(width) => {
                session.resize_canvas(width).map_err(display)?;
                self.surface_width = Some(width);
            }
            ScriptCommand::Generate => {
                let index = session.generate(self.services).await.map_err(display)?;
                report_result(session, index, out)?;
            }
            ScriptCommand::Enhance => {
                let index = session
                    .enhance_and_retry(self.services, self.services)
                    .await
                    .map_err(display)?;
                say(out, format_args!("prompt: {}", session.prompt()))?;
                report_result(session, index, out)?;
            }
            ScriptCommand::Undo => session.undo().map_err(display)?,
            ScriptCommand::Redo => session.redo().map_err(display)?,
            ScriptCommand::Status => {
                let json = serde_json::to_string(&session.view()).map_err(display)?;
                say(out, format_args!("{json}"))?;
            }
            ScriptCommand::Download(path) => {
                let download = session.download().map_err(display)?;
                let path = download_path(&path, &download.filename);
                std::fs::write(&path, &download.bytes)
                    .map_err(|e| format!("writing {}: {e}", path.display()))?;
                say(out, format_args!("saved {}", path.display()))?;
            }
            ScriptCommand::Reset => session.reset().map_err(display)?,
            ScriptCommand::Upload(path) => {
                let bytes = std::fs::read(&path)
                    .map_err(|e| format!("reading {}: {e}", path.display()))?;
                session.upload(bytes, None).map_err(display)?;
                log::info!("uploaded {}", path.display());
            }
            ScriptCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }
}

fn display(e: impl std::fmt::Display) -> String {
    e.to_string()
}

fn say<W: Write>(out: &mut W, args: std::fmt::Arguments<'_>) -> Result<(), String> {
    writeln!(out, "{args}").map_err(display)
}

fn image_width(session: &EditSession) -> Option<u32> {
    session.source().map(|source| source.dimensions().width)
}

fn report_result<W: Write>(session: &EditSession, index: usize, out: &mut W) -> Result<(), String> {
    say(out, format_args!("generated snapshot {index}"))?;
    if let Some(text) = session.current_result().and_then(|r| r.text.as_deref()) {
        say(out, format_args!("model: {text}"))?;
    }
    Ok(())
}

/// `path` itself, or `path/filename` when `path` is a directory.
fn download_path(path: &Path, filename: &str) -> PathBuf {
    if path.is_dir() {
        path.join(filename)
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use maskedit_core::{
        DataUri, EditRequest, EditResult, EnhancedPrompts, ServiceError, encode_png,
    };

    use super::*;

    /// Refuses the first edit on safety grounds, then succeeds.
    #[derive(Default)]
    struct Flaky {
        edits: Cell<usize>,
    }

    impl ImageEditService for Flaky {
        async fn edit(&self, request: &EditRequest) -> Result<EditResult, ServiceError> {
            let n = self.edits.get();
            self.edits.set(n + 1);
            if n == 0 {
                return Err(ServiceError::new(
                    "Failed to edit image. The AI did not return a valid image. (Reason: IMAGE_SAFETY) Please try a different prompt.",
                ));
            }
            Ok(EditResult {
                image: Some(DataUri::new("image/png", vec![7; 4])),
                text: Some(format!("did {}", request.prompt)),
            })
        }
    }

    impl PromptEnhancer for Flaky {
        async fn enhance(
            &self,
            prompt: &str,
            _negative_prompt: &str,
        ) -> Result<EnhancedPrompts, ServiceError> {
            Ok(EnhancedPrompts {
                enhanced_prompt: format!("gently {prompt}"),
                enhanced_negative_prompt: "blurry".to_owned(),
            })
        }
    }

    fn loaded_session() -> EditSession {
        let image = image::RgbaImage::from_pixel(16, 12, image::Rgba([40, 90, 160, 255]));
        let mut session = EditSession::default();
        session.upload(encode_png(&image).unwrap(), None).unwrap();
        session
    }

    fn run(runner: &mut Runner<'_, Flaky>, script: &str) -> (usize, String) {
        let mut out = Vec::new();
        let failures = pollster::block_on(runner.run(script.as_bytes(), &mut out)).unwrap();
        (failures, String::from_utf8(out).unwrap())
    }

    #[test]
    fn parses_every_command() {
        let cases = [
            ("prompt  add a hat ", ScriptCommand::Prompt("add a hat".to_owned())),
            ("prompt", ScriptCommand::Prompt(String::new())),
            ("negative blur", ScriptCommand::Negative("blur".to_owned())),
            ("surprise", ScriptCommand::Surprise),
            ("examples", ScriptCommand::Examples),
            ("example 2", ScriptCommand::Example(2)),
            ("mask on", ScriptCommand::Mask(true)),
            ("mask off", ScriptCommand::Mask(false)),
            ("brush 12", ScriptCommand::Brush(12)),
            ("origin 5 6", ScriptCommand::Origin(Point::new(5.0, 6.0))),
            ("down 1 2", ScriptCommand::Down(Point::new(1.0, 2.0))),
            ("move 1.5 2", ScriptCommand::Move(Point::new(1.5, 2.0))),
            ("up", ScriptCommand::Up),
            ("leave", ScriptCommand::Leave),
            ("clear-mask", ScriptCommand::ClearMask),
            ("resize 300", ScriptCommand::Resize(300)),
            ("generate", ScriptCommand::Generate),
            ("enhance", ScriptCommand::Enhance),
            ("undo", ScriptCommand::Undo),
            ("redo", ScriptCommand::Redo),
            ("status", ScriptCommand::Status),
            ("download out/a b.png", ScriptCommand::Download("out/a b.png".into())),
            ("reset", ScriptCommand::Reset),
            ("upload in.jpg", ScriptCommand::Upload("in.jpg".into())),
            ("quit", ScriptCommand::Quit),
        ];
        for (line, expected) in cases {
            assert_eq!(parse_line(line).unwrap(), Some(expected), "{line}");
        }
    }

    #[test]
    fn blank_lines_and_comments_are_skipped() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   \t").unwrap(), None);
        assert_eq!(parse_line("  # generate").unwrap(), None);
    }

    #[test]
    fn malformed_lines_are_rejected() {
        for line in [
            "mask maybe",
            "example 0",
            "example 5",
            "brush big",
            "down 1",
            "down 1 2 3",
            "undo now",
            "download",
            "paint 1 2",
        ] {
            assert!(parse_line(line).is_err(), "{line}");
        }
    }

    #[test]
    fn script_masks_generates_and_walks_history() {
        let services = Flaky::default();
        services.edits.set(1);
        let mut runner = Runner::new(loaded_session(), &services, None, 0);

        let (failures, out) = run(
            &mut runner,
            "# paint then edit\n\
             brush 5\n\
             mask on\n\
             down 2 6\n\
             move 14 6\n\
             up\n\
             prompt add a hat\n\
             generate\n\
             undo\n\
             redo\n\
             status\n",
        );

        assert_eq!(failures, 0, "{out}");
        assert!(out.contains("generated snapshot 1"));
        assert!(out.contains("model: did add a hat"));
        let session = runner.session();
        assert_eq!(session.history().cursor(), Some(1));
        assert!(session.mask().is_some());
        assert!(!session.is_masking());
        assert!(out.contains("\"can_undo\":true"));
    }

    #[test]
    fn failed_commands_are_counted_and_skipped() {
        let services = Flaky::default();
        let mut runner = Runner::new(loaded_session(), &services, None, 0);

        let (failures, out) = run(&mut runner, "generate\nbogus\nredo\nquit\nundo\n");

        assert_eq!(failures, 3);
        assert!(out.contains("error (line 1)"));
        assert!(out.contains("error (line 2): unknown command"));
        assert!(!out.contains("line 5"));
    }

    #[test]
    fn enhance_recovers_from_a_safety_refusal() {
        let services = Flaky::default();
        let mut runner = Runner::new(loaded_session(), &services, None, 0);

        let (failures, out) = run(&mut runner, "prompt remove him\ngenerate\nenhance\n");

        assert_eq!(failures, 1);
        assert!(out.contains("prompt: gently remove him"));
        assert!(out.contains("generated snapshot 1"));
        assert_eq!(runner.session().negative_prompt(), "blurry");
    }

    #[test]
    fn example_prompts_are_listed_and_picked() {
        let services = Flaky::default();
        let mut runner = Runner::new(loaded_session(), &services, None, 0);

        let (failures, out) = run(&mut runner, "examples\nexample 1\n");

        assert_eq!(failures, 0, "{out}");
        assert!(out.contains(&format!("4. {}", EXAMPLE_PROMPTS[3])));
        assert_eq!(runner.session().prompt(), EXAMPLE_PROMPTS[0]);
    }

    #[test]
    fn download_writes_the_result() {
        let services = Flaky::default();
        services.edits.set(1);
        let mut runner = Runner::new(loaded_session(), &services, None, 0);
        let path = std::env::temp_dir().join(format!("maskedit-script-{}.png", std::process::id()));

        let (failures, _) = run(
            &mut runner,
            &format!("prompt x\ngenerate\ndownload {}\n", path.display()),
        );

        assert_eq!(failures, 0);
        assert_eq!(std::fs::read(&path).unwrap(), vec![7; 4]);
        std::fs::remove_file(&path).unwrap();
    }
}
