/// How the text after a slash command is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ArgShape {
    /// Remainder kept verbatim as the prompt.
    Text,
    /// One path; quoting follows shell rules.
    Path,
    /// Any number of shell-quoted paths.
    Paths,
    /// A non-negative integer.
    Index,
    /// `x,y` with an optional `WxH` display size.
    Point,
    /// Four integers: `x y width height`.
    Rect,
    Bare,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
    pub shape: ArgShape,
    pub usage: &'static str,
}

const fn spec(
    command: &'static str,
    action: &'static str,
    shape: ArgShape,
    usage: &'static str,
) -> CommandSpec {
    CommandSpec {
        command,
        action,
        shape,
        usage,
    }
}

/// Listed in the order `/help` prints them.
pub(crate) const COMMANDS: &[CommandSpec] = &[
    spec("open", "open", ArgShape::Path, "/open <path>"),
    spec("new", "upload_new", ArgShape::Bare, "/new"),
    spec("point", "add_hotspot", ArgShape::Point, "/point x,y [WxH]"),
    spec("unpoint", "pop_hotspot", ArgShape::Bare, "/unpoint"),
    spec("edit", "localized_edit", ArgShape::Text, "/edit <prompt>"),
    spec("adjust", "adjust", ArgShape::Text, "/adjust <prompt>"),
    spec("filter", "filter", ArgShape::Text, "/filter <prompt>"),
    spec("frame", "frame", ArgShape::Text, "/frame <style> | <top> | <bottom>"),
    spec("pin", "toggle_pin", ArgShape::Text, "/pin <style> | <top> | <bottom>"),
    spec("unpin", "clear_pin", ArgShape::Bare, "/unpin"),
    spec("crop", "crop", ArgShape::Rect, "/crop x y w h"),
    spec("undo", "undo", ArgShape::Bare, "/undo"),
    spec("redo", "redo", ArgShape::Bare, "/redo"),
    spec("reset", "reset", ArgShape::Bare, "/reset"),
    spec("jump", "jump_to", ArgShape::Index, "/jump <n>"),
    spec("history", "history", ArgShape::Bare, "/history"),
    spec(
        "composite_select",
        "select_composite",
        ArgShape::Paths,
        "/composite_select <paths...>",
    ),
    spec("style_source", "set_style_source", ArgShape::Index, "/style_source <n>"),
    spec("composite", "composite", ArgShape::Text, "/composite [prompt]"),
    spec("batch", "batch", ArgShape::Paths, "/batch <paths...>"),
    spec("toggle", "toggle_download", ArgShape::Index, "/toggle <n>"),
    spec("export", "export_selection", ArgShape::Path, "/export [archive.zip]"),
    spec("export_all", "export_all", ArgShape::Path, "/export_all [archive.zip]"),
    spec("save", "save_current", ArgShape::Path, "/save [path]"),
    spec("help", "help", ArgShape::Bare, "/help"),
];

pub(crate) fn lookup(command: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.command == command)
}

/// Usage line of every chat command.
pub fn chat_help() -> Vec<&'static str> {
    COMMANDS.iter().map(|spec| spec.usage).collect()
}
