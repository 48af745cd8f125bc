use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use retouch_contracts::assets::ImageAsset;
use retouch_contracts::chat::{chat_help, parse_intent, Intent};
use retouch_contracts::hotspot::{parse_point, parse_size, HotspotPoint};
use retouch_contracts::instructions::EditInstruction;
use retouch_contracts::style::FrameStyle;
use retouch_engine::{CropRect, EditGateway, EditorSession, GatewayConfig};
use serde_json::Value;

#[derive(Debug, Parser)]
#[command(name = "retouch", version, about = "AI-assisted photo retouching")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Localized edit at one or more points.
    Edit(EditArgs),
    /// Global adjustment of the whole image.
    Adjust(PromptArgs),
    /// Stylistic filter of the whole image.
    Filter(PromptArgs),
    /// Decorative frame with optional captions.
    Frame(FrameArgs),
    /// Local crop, no model call.
    Crop(CropArgs),
    /// Blend several images; the style source sets the look.
    Composite(CompositeArgs),
    /// Frame every image with one style and zip the results.
    Batch(BatchArgs),
    /// Interactive session driven by slash commands.
    Chat(ChatArgs),
}

#[derive(Debug, Args)]
struct CommonArgs {
    /// Output directory.
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct EditArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    prompt: String,
    /// Edit location as `x,y`; repeatable.
    #[arg(long = "at", required = true)]
    at: Vec<String>,
    /// Size `WxH` the points were picked on; omit for natural pixels.
    #[arg(long)]
    view: Option<String>,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Parser)]
struct PromptArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    prompt: String,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Parser)]
struct FrameArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    style: String,
    #[arg(long, default_value = "")]
    top: String,
    #[arg(long, default_value = "")]
    bottom: String,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Parser)]
struct CropArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    x: u32,
    #[arg(long)]
    y: u32,
    #[arg(long)]
    width: u32,
    #[arg(long)]
    height: u32,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Parser)]
struct CompositeArgs {
    #[arg(long, num_args = 2.., required = true)]
    images: Vec<PathBuf>,
    #[arg(long, default_value_t = 0)]
    style_source: usize,
    #[arg(long, default_value = "")]
    prompt: String,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Parser)]
struct BatchArgs {
    #[arg(long, num_args = 1.., required = true)]
    images: Vec<PathBuf>,
    #[arg(long)]
    style: String,
    #[arg(long, default_value = "")]
    top: String,
    #[arg(long, default_value = "")]
    bottom: String,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[command(flatten)]
    common: CommonArgs,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("retouch error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Edit(args) => run_edit(args),
        Command::Adjust(args) => run_prompt_edit(args, |prompt| EditInstruction::Adjust { prompt }),
        Command::Filter(args) => run_prompt_edit(args, |prompt| EditInstruction::Filter { prompt }),
        Command::Frame(args) => run_frame(args),
        Command::Crop(args) => run_crop(args),
        Command::Composite(args) => run_composite(args),
        Command::Batch(args) => run_batch(args),
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
    }
}

fn open_session(common: &CommonArgs) -> Result<EditorSession> {
    std::fs::create_dir_all(&common.out)
        .with_context(|| format!("failed to create {}", common.out.display()))?;
    let config = GatewayConfig::from_env().with_model(common.model.clone());
    let gateway = EditGateway::from_config(&config)?;
    let events_path = common
        .events
        .clone()
        .unwrap_or_else(|| common.out.join("events.jsonl"));
    log::debug!(
        "session using {} via {}",
        gateway.model(),
        gateway.transport_name()
    );
    Ok(EditorSession::new(gateway, events_path))
}

fn load_image(path: &Path) -> Result<ImageAsset> {
    ImageAsset::from_path(path).with_context(|| format!("failed to read image {}", path.display()))
}

fn save_result(session: &mut EditorSession, out_dir: &Path) -> Result<i32> {
    let name = session
        .current()
        .map(|asset| asset.name().to_string())
        .context("no image to save")?;
    let path = session.save_current(&out_dir.join(name))?;
    println!("{}", path.display());
    Ok(0)
}

fn run_edit(args: EditArgs) -> Result<i32> {
    let mut session = open_session(&args.common)?;
    session.start(load_image(&args.image)?);
    let view = match args.view.as_deref() {
        Some(raw) => Some(parse_size(raw).with_context(|| format!("invalid --view {raw:?}"))?),
        None => None,
    };
    for raw in &args.at {
        let point = parse_point(raw).with_context(|| format!("invalid --at {raw:?}"))?;
        add_point(&mut session, point, view)?;
    }
    session.localized_edit(&args.prompt)?;
    save_result(&mut session, &args.common.out)
}

fn run_prompt_edit(args: PromptArgs, instruction: fn(String) -> EditInstruction) -> Result<i32> {
    let mut session = open_session(&args.common)?;
    session.start(load_image(&args.image)?);
    session.apply(instruction(args.prompt))?;
    save_result(&mut session, &args.common.out)
}

fn run_frame(args: FrameArgs) -> Result<i32> {
    let mut session = open_session(&args.common)?;
    session.start(load_image(&args.image)?);
    session.apply(EditInstruction::Frame(FrameStyle::new(
        args.style,
        args.top,
        args.bottom,
    )))?;
    save_result(&mut session, &args.common.out)
}

fn run_crop(args: CropArgs) -> Result<i32> {
    let mut session = open_session(&args.common)?;
    session.start(load_image(&args.image)?);
    session.crop(CropRect::new(args.x, args.y, args.width, args.height))?;
    save_result(&mut session, &args.common.out)
}

fn run_composite(args: CompositeArgs) -> Result<i32> {
    let mut session = open_session(&args.common)?;
    let images = args
        .images
        .iter()
        .map(|path| load_image(path))
        .collect::<Result<Vec<ImageAsset>>>()?;
    session.select_composite(images)?;
    session.set_style_source(args.style_source)?;
    session.generate_composite(&args.prompt)?;
    save_result(&mut session, &args.common.out)
}

fn run_batch(args: BatchArgs) -> Result<i32> {
    let mut session = open_session(&args.common)?;
    let sources = args
        .images
        .iter()
        .map(|path| load_image(path))
        .collect::<Result<Vec<ImageAsset>>>()?;
    session.toggle_pin(FrameStyle::new(args.style, args.top, args.bottom));
    let outcome = session.run_batch(sources)?;
    if outcome.succeeded.is_empty() {
        match outcome.error {
            Some(err) => bail!("batch failed on the first image: {err}"),
            None => bail!("batch produced no images"),
        }
    }
    let report = session.export_all(&args.common.out.join("batch.zip"))?;
    println!("{}", report.path.display());
    match (outcome.failed_index, outcome.error) {
        (Some(index), Some(err)) => {
            eprintln!(
                "batch stopped at image {} of {}: {err}",
                index + 1,
                args.images.len()
            );
            Ok(1)
        }
        _ => Ok(0),
    }
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let mut session = open_session(&args.common)?;
    let stdin = io::stdin();
    let mut line = String::new();

    println!("Retouch chat started. Type /help for commands.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        if intent.action == "noop" {
            continue;
        }
        match handle_intent(&mut session, &intent, &args.common.out) {
            Ok(reply) => println!("{reply}"),
            Err(err) => println!("Error: {err:#}"),
        }
    }
    Ok(())
}

/// Runs one chat intent against the session and returns the reply line.
fn handle_intent(session: &mut EditorSession, intent: &Intent, out_dir: &Path) -> Result<String> {
    let prompt = intent.prompt.clone().unwrap_or_default();
    match intent.action.as_str() {
        "help" => Ok(format!("Commands: {}", chat_help().join(" "))),
        "open" => {
            let path = required_path(intent, "/open")?;
            let asset = load_image(&path)?;
            let (width, height) = asset.dimensions()?;
            let name = asset.name().to_string();
            session.start(asset);
            Ok(format!("Opened {name} ({width}x{height})"))
        }
        "upload_new" => {
            session.upload_new();
            Ok("Cleared. Open a new image with /open.".to_string())
        }
        "add_hotspot" => {
            let x = arg_f64(intent, "x")?;
            let y = arg_f64(intent, "y")?;
            let view = intent
                .command_args
                .get("view")
                .and_then(Value::as_array)
                .and_then(|size| Some((size.first()?.as_f64()?, size.get(1)?.as_f64()?)));
            let point = add_point(session, (x, y), view)?;
            Ok(format!(
                "Point {} at ({}, {})",
                session.hotspots().len(),
                point.x,
                point.y
            ))
        }
        "pop_hotspot" => Ok(match session.pop_hotspot() {
            Some(point) => format!("Removed point ({}, {})", point.x, point.y),
            None => "No points to remove".to_string(),
        }),
        "localized_edit" => {
            let asset = session.localized_edit(&prompt)?;
            Ok(edited_reply(session, &asset))
        }
        "adjust" => {
            let asset = session.apply(EditInstruction::Adjust { prompt })?;
            Ok(edited_reply(session, &asset))
        }
        "filter" => {
            let asset = session.apply(EditInstruction::Filter { prompt })?;
            Ok(edited_reply(session, &asset))
        }
        "frame" => {
            let asset = session.apply(EditInstruction::Frame(FrameStyle::parse(&prompt)))?;
            Ok(edited_reply(session, &asset))
        }
        "toggle_pin" => {
            let form = FrameStyle::parse(&prompt);
            if !form.has_style() {
                bail!("/pin requires a frame style");
            }
            let label = form.style.clone();
            Ok(if session.toggle_pin(form) {
                format!("Pinned style {label:?}")
            } else {
                "Style unpinned".to_string()
            })
        }
        "clear_pin" => {
            session.clear_pin();
            Ok("Style unpinned".to_string())
        }
        "crop" => {
            let rect = CropRect::new(
                arg_u32(intent, "x")?,
                arg_u32(intent, "y")?,
                arg_u32(intent, "width")?,
                arg_u32(intent, "height")?,
            );
            let asset = session.crop(rect)?;
            Ok(edited_reply(session, &asset))
        }
        "undo" => {
            let moved = session.undo();
            Ok(navigation_reply(session, moved, "undo"))
        }
        "redo" => {
            let moved = session.redo();
            Ok(navigation_reply(session, moved, "redo"))
        }
        "reset" => {
            let moved = session.reset();
            Ok(navigation_reply(session, moved, "reset"))
        }
        "jump_to" => {
            let index = arg_index(intent)?;
            let moved = session.jump_to(index);
            if !moved && index >= session.history().len() {
                bail!("history has no entry {index}");
            }
            Ok(navigation_reply(session, true, "jump"))
        }
        "history" => Ok(history_listing(session)),
        "select_composite" => {
            let images = required_paths(intent, "/composite_select")?
                .iter()
                .map(|path| load_image(path))
                .collect::<Result<Vec<ImageAsset>>>()?;
            let count = images.len();
            session.select_composite(images)?;
            Ok(format!("Selected {count} images; style source is #0"))
        }
        "set_style_source" => {
            let index = arg_index(intent)?;
            session.set_style_source(index)?;
            Ok(format!("Style source is #{index}"))
        }
        "composite" => {
            let asset = session.generate_composite(&prompt)?;
            Ok(edited_reply(session, &asset))
        }
        "batch" => {
            let sources = required_paths(intent, "/batch")?
                .iter()
                .map(|path| load_image(path))
                .collect::<Result<Vec<ImageAsset>>>()?;
            if session.pinned_style().is_none() {
                bail!("pin a frame style with /pin before running a batch");
            }
            let requested = sources.len();
            let outcome = session.run_batch(sources)?;
            let done = outcome.succeeded.len();
            Ok(match outcome.error {
                Some(err) => format!("Framed {done} of {requested} images, then stopped: {err}"),
                None => format!("Framed {done} images"),
            })
        }
        "toggle_download" => {
            let index = arg_index(intent)?;
            let selected = session.toggle_download(index)?;
            Ok(format!(
                "Entry {index} {} ({} selected)",
                if selected { "selected" } else { "deselected" },
                session.downloads().len()
            ))
        }
        "export_selection" => {
            let path = optional_path(intent, out_dir, "selection.zip");
            let report = session.export_selection(&path)?;
            Ok(format!(
                "Exported {} images to {}",
                report.entries.len(),
                report.path.display()
            ))
        }
        "export_all" => {
            let path = optional_path(intent, out_dir, "history.zip");
            let report = session.export_all(&path)?;
            Ok(format!(
                "Exported {} images to {}",
                report.entries.len(),
                report.path.display()
            ))
        }
        "save_current" => {
            let default_name = session
                .current()
                .map(|asset| asset.name().to_string())
                .context("no image to save")?;
            let path = optional_path(intent, out_dir, &default_name);
            let written = session.save_current(&path)?;
            Ok(format!("Saved {}", written.display()))
        }
        "invalid" => {
            let reason = value_as_non_empty_string(intent.command_args.get("reason"))
                .unwrap_or_default();
            bail!("{:?}: {reason}", intent.raw.trim())
        }
        "unknown" => {
            let command = value_as_non_empty_string(intent.command_args.get("command"))
                .unwrap_or_default();
            bail!(
                "unknown command /{command} in {:?}. Type /help for commands.",
                intent.raw.trim()
            )
        }
        other => bail!("unsupported action {other}"),
    }
}

fn add_point(
    session: &mut EditorSession,
    (x, y): (f64, f64),
    view: Option<(f64, f64)>,
) -> Result<HotspotPoint> {
    if let Some(view) = view {
        return Ok(session.add_display_hotspot((x, y), view)?);
    }
    if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
        bail!("point ({x}, {y}) must be non-negative");
    }
    let point = HotspotPoint::new(x.round() as u32, y.round() as u32);
    session.add_hotspot(point)?;
    Ok(point)
}

fn edited_reply(session: &EditorSession, asset: &ImageAsset) -> String {
    format!(
        "{} ({}/{})",
        asset.name(),
        session.history().cursor().map(|cursor| cursor + 1).unwrap_or(0),
        session.history().len()
    )
}

fn navigation_reply(session: &EditorSession, moved: bool, action: &str) -> String {
    if !moved {
        return format!("Nothing to {action}");
    }
    match session.current() {
        Some(asset) => edited_reply(session, asset),
        None => "History is empty".to_string(),
    }
}

fn history_listing(session: &EditorSession) -> String {
    let history = session.history();
    if history.is_empty() {
        return "History is empty".to_string();
    }
    history
        .entries()
        .iter()
        .enumerate()
        .map(|(index, asset)| {
            let cursor = if history.cursor() == Some(index) { ">" } else { " " };
            let picked = if session.downloads().contains(index) { "*" } else { " " };
            format!("{cursor}{picked} {index:>3} {}", asset.name())
        })
        .collect::<Vec<String>>()
        .join("\n")
}

fn required_path(intent: &Intent, usage: &str) -> Result<PathBuf> {
    value_as_non_empty_string(intent.command_args.get("path"))
        .map(PathBuf::from)
        .with_context(|| format!("{usage} requires a path"))
}

fn required_paths(intent: &Intent, usage: &str) -> Result<Vec<PathBuf>> {
    let paths: Vec<PathBuf> = intent
        .command_args
        .get("paths")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|value| value_as_non_empty_string(Some(value)))
                .map(PathBuf::from)
                .collect()
        })
        .unwrap_or_default();
    if paths.is_empty() {
        bail!("{usage} requires at least one path");
    }
    Ok(paths)
}

fn optional_path(intent: &Intent, out_dir: &Path, default_name: &str) -> PathBuf {
    value_as_non_empty_string(intent.command_args.get("path"))
        .map(PathBuf::from)
        .unwrap_or_else(|| out_dir.join(default_name))
}

fn arg_f64(intent: &Intent, key: &str) -> Result<f64> {
    intent
        .command_args
        .get(key)
        .and_then(Value::as_f64)
        .with_context(|| format!("missing {key}"))
}

fn arg_u32(intent: &Intent, key: &str) -> Result<u32> {
    let value = intent
        .command_args
        .get(key)
        .and_then(Value::as_u64)
        .with_context(|| format!("missing {key}"))?;
    u32::try_from(value).with_context(|| format!("{key} is too large"))
}

fn arg_index(intent: &Intent) -> Result<usize> {
    let value = intent
        .command_args
        .get("index")
        .and_then(Value::as_u64)
        .context("missing index")?;
    usize::try_from(value).context("index is too large")
}

fn value_as_non_empty_string(value: Option<&Value>) -> Option<String> {
    let raw = value
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::Path;

    use image::{ImageFormat, RgbImage};
    use retouch_contracts::chat::parse_intent;
    use retouch_engine::transport::DryrunTransport;
    use retouch_engine::{EditGateway, EditorSession};

    use super::handle_intent;

    fn write_png(path: &Path, width: u32, height: u32) -> anyhow::Result<()> {
        let mut encoded = Vec::new();
        RgbImage::new(width, height).write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)?;
        std::fs::write(path, encoded)?;
        Ok(())
    }

    fn session(dir: &Path) -> EditorSession {
        EditorSession::new(
            EditGateway::new(DryrunTransport, "dryrun-image-1"),
            dir.join("events.jsonl"),
        )
    }

    fn say(session: &mut EditorSession, dir: &Path, line: &str) -> anyhow::Result<String> {
        handle_intent(session, &parse_intent(line), dir)
    }

    #[test]
    fn chat_edit_flow_saves_and_exports() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let dir = temp.path();
        write_png(&dir.join("beach.png"), 64, 48)?;
        let mut session = session(dir);

        let opened = say(&mut session, dir, &format!("/open {}", dir.join("beach.png").display()))?;
        assert_eq!(opened, "Opened beach.png (64x48)");

        say(&mut session, dir, "/point 32,24 128x96")?;
        assert_eq!(session.hotspots()[0].x, 16);
        let edited = say(&mut session, dir, "remove the umbrella")?;
        assert_eq!(edited, "edited_beach.png (2/2)");

        say(&mut session, dir, "/adjust warmer")?;
        assert_eq!(say(&mut session, dir, "/undo")?, "edited_beach.png (2/3)");
        say(&mut session, dir, "/toggle 0")?;
        say(&mut session, dir, "/toggle 1")?;
        let exported = say(&mut session, dir, "/export")?;
        assert!(exported.starts_with("Exported 2 images"));
        assert!(dir.join("selection.zip").exists());

        let saved = say(&mut session, dir, "/save")?;
        assert!(saved.ends_with("edited_beach.png"));
        assert!(dir.join("edited_beach.png").exists());
        Ok(())
    }

    #[test]
    fn chat_reports_precondition_errors() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let dir = temp.path();
        let mut session = session(dir);

        assert!(say(&mut session, dir, "/adjust brighter").is_err());
        assert!(say(&mut session, dir, "/jump nope").is_err());
        assert!(say(&mut session, dir, "/frobnicate").is_err());
        let invalid = say(&mut session, dir, "  /crop 1 2 3 ").err().map(|err| err.to_string());
        assert_eq!(invalid.as_deref(), Some("\"/crop 1 2 3\": expected x y width height"));
        let unknown = say(&mut session, dir, "/magic now").err().map(|err| err.to_string());
        assert_eq!(
            unknown.as_deref(),
            Some("unknown command /magic in \"/magic now\". Type /help for commands.")
        );
        assert!(say(&mut session, dir, "/batch a.png").is_err());
        assert_eq!(say(&mut session, dir, "/undo")?, "Nothing to undo");
        Ok(())
    }

    #[test]
    fn chat_pin_and_batch() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let dir = temp.path();
        write_png(&dir.join("a.png"), 8, 8)?;
        write_png(&dir.join("b.png"), 8, 8)?;
        let mut session = session(dir);

        assert_eq!(
            say(&mut session, dir, "/pin polaroid | Summer |")?,
            "Pinned style \"polaroid\""
        );
        let reply = say(
            &mut session,
            dir,
            &format!(
                "/batch {} {}",
                dir.join("a.png").display(),
                dir.join("b.png").display()
            ),
        )?;
        assert_eq!(reply, "Framed 2 images");
        assert_eq!(session.history().len(), 2);
        assert_eq!(say(&mut session, dir, "/pin polaroid | Summer |")?, "Style unpinned");
        Ok(())
    }

    #[test]
    fn chat_composite_uses_selected_style_source() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let dir = temp.path();
        write_png(&dir.join("a.png"), 8, 8)?;
        write_png(&dir.join("b.png"), 8, 8)?;
        let mut session = session(dir);

        say(
            &mut session,
            dir,
            &format!(
                "/composite_select {} {}",
                dir.join("a.png").display(),
                dir.join("b.png").display()
            ),
        )?;
        say(&mut session, dir, "/style_source 1")?;
        assert!(say(&mut session, dir, "/style_source 5").is_err());
        let reply = say(&mut session, dir, "/composite")?;
        assert_eq!(reply, "composite_b.png (1/1)");
        assert!(session.composite_set().is_empty());
        Ok(())
    }
}
