use std::collections::BTreeMap;

use serde_json::{json, Value};

use super::command_registry::{lookup, ArgShape, CommandSpec};
use crate::hotspot::{parse_point, parse_size};

/// A chat line resolved into an action name plus its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    /// The chat line as typed.
    pub raw: String,
    /// Set for free text and text-shaped commands.
    pub prompt: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn with_action(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            command_args: BTreeMap::new(),
        }
    }

    fn arg(mut self, key: &str, value: Value) -> Self {
        self.command_args.insert(key.to_string(), value);
        self
    }

    fn rejected(raw: &str, command: &str, reason: &str) -> Self {
        Self::with_action("invalid", raw)
            .arg("command", json!(command))
            .arg("reason", json!(reason))
    }
}

/// Splits `/name rest` into a lowercase command name and its trimmed
/// argument text. Returns `None` for lines that are not slash commands.
fn split_command(line: &str) -> Option<(String, &str)> {
    let tail = line.strip_prefix('/')?;
    let end = tail
        .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
        .unwrap_or(tail.len());
    if end == 0 {
        return None;
    }
    Some((tail[..end].to_ascii_lowercase(), tail[end..].trim()))
}

fn split_paths(arg: &str) -> Vec<String> {
    let words = shell_words::split(arg)
        .unwrap_or_else(|_| arg.split_whitespace().map(str::to_string).collect());
    words.into_iter().filter(|word| !word.is_empty()).collect()
}

fn point_intent(spec: &CommandSpec, raw: &str, arg: &str) -> Intent {
    let mut words = arg.split_whitespace();
    let Some((x, y)) = words.next().and_then(parse_point) else {
        return Intent::rejected(raw, spec.command, "expected x,y");
    };
    let intent = Intent::with_action(spec.action, raw)
        .arg("x", json!(x))
        .arg("y", json!(y));
    match words.next() {
        None => intent,
        Some(view) => match parse_size(view) {
            Some((width, height)) => intent.arg("view", json!([width, height])),
            None => Intent::rejected(raw, spec.command, "expected display size WxH"),
        },
    }
}

fn rect_intent(spec: &CommandSpec, raw: &str, arg: &str) -> Intent {
    let numbers: Option<Vec<u32>> = arg
        .split(|ch: char| ch.is_whitespace() || ch == ',')
        .filter(|word| !word.is_empty())
        .map(|word| word.parse::<u32>().ok())
        .collect();
    match numbers.as_deref() {
        Some(&[x, y, width, height]) => Intent::with_action(spec.action, raw)
            .arg("x", json!(x))
            .arg("y", json!(y))
            .arg("width", json!(width))
            .arg("height", json!(height)),
        _ => Intent::rejected(raw, spec.command, "expected x y width height"),
    }
}

fn command_intent(spec: &CommandSpec, raw: &str, arg: &str) -> Intent {
    match spec.shape {
        ArgShape::Text => {
            let mut intent = Intent::with_action(spec.action, raw);
            intent.prompt = Some(arg.to_string());
            intent
        }
        ArgShape::Path => {
            Intent::with_action(spec.action, raw).arg("path", json!(split_paths(arg).join(" ")))
        }
        ArgShape::Paths => Intent::with_action(spec.action, raw).arg("paths", json!(split_paths(arg))),
        ArgShape::Index => match arg.parse::<u64>() {
            Ok(index) => Intent::with_action(spec.action, raw).arg("index", json!(index)),
            Err(_) => Intent::rejected(raw, spec.command, "expected a non-negative index"),
        },
        ArgShape::Point => point_intent(spec, raw, arg),
        ArgShape::Rect => rect_intent(spec, raw, arg),
        ArgShape::Bare => Intent::with_action(spec.action, raw),
    }
}

/// Maps one chat line to an intent. Free text is a localized edit prompt.
pub fn parse_intent(text: &str) -> Intent {
    let line = text.trim();
    if line.is_empty() {
        return Intent::with_action("noop", text);
    }

    if let Some((command, arg)) = split_command(line) {
        return match lookup(&command) {
            Some(spec) => command_intent(spec, text, arg),
            None => Intent::with_action("unknown", text)
                .arg("command", json!(command))
                .arg("arg", json!(arg)),
        };
    }

    let mut intent = Intent::with_action("localized_edit", text);
    intent.prompt = Some(line.to_string());
    intent
}
