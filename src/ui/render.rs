use super::theme::Theme;
use crate::models::chat::{ Role, Turn };
use chrono::{ DateTime, NaiveDateTime };
use crossterm::style::{ style, Color, Stylize };

const CONTENT_INDENT: &str = "   ";
const BACKEND_TIME_FORMAT: &str = "%Y-%m-%d-%H:%M:%S";

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    styled: bool,
    accent: Color,
    code: Color,
    muted: Color,
    error: Color,
}

impl Palette {
    pub fn new(theme: Theme, styled: bool) -> Self {
        match theme {
            Theme::Dark =>
                Self {
                    styled,
                    accent: Color::Cyan,
                    code: Color::Yellow,
                    muted: Color::DarkGrey,
                    error: Color::Red,
                },
            Theme::Light =>
                Self {
                    styled,
                    accent: Color::DarkBlue,
                    code: Color::DarkMagenta,
                    muted: Color::Grey,
                    error: Color::DarkRed,
                },
        }
    }

    pub fn plain() -> Self {
        Self::new(Theme::Dark, false)
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.styled {
            style(text).with(color).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn accent(&self, text: &str) -> String {
        self.paint(text, self.accent)
    }

    pub fn muted(&self, text: &str) -> String {
        self.paint(text, self.muted)
    }

    pub fn error(&self, text: &str) -> String {
        self.paint(text, self.error)
    }

    pub fn strong(&self, text: &str) -> String {
        if self.styled {
            style(text).bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn code(&self, text: &str) -> String {
        if self.styled {
            self.paint(text, self.code)
        } else {
            format!("`{}`", text)
        }
    }
}

pub fn role_icon(role: Role) -> &'static str {
    match role {
        Role::Assistant => "🤖",
        Role::User => "👤",
    }
}

/// Formats the backend's `created_at` as `HH:MM`, falling back to the raw
/// value when it is neither the backend's own format nor RFC 3339.
pub fn format_timestamp(raw: &str) -> String {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, BACKEND_TIME_FORMAT) {
        return naive.format("%H:%M").to_string();
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.format("%H:%M").to_string();
    }
    raw.to_string()
}

/// Renders one turn as a header line plus its content. Empty content yields
/// the header only.
pub fn render_turn(turn: &Turn, palette: &Palette) -> String {
    let mut header = format!("{} {}", role_icon(turn.role), turn.role);
    if let Some(created_at) = &turn.created_at {
        header.push_str(&format!(" · {}", format_timestamp(created_at)));
    }
    let header = match turn.role {
        Role::Assistant => palette.accent(&header),
        Role::User => palette.muted(&header),
    };

    let body = render_markdown(&turn.content, palette);
    if body.is_empty() {
        return header;
    }
    format!("{}\n{}", header, body)
}

/// Lightweight markdown: ATX headings, bullet lists, fenced code blocks,
/// `**bold**` and inline code. Everything else passes through.
pub fn render_markdown(content: &str, palette: &Palette) -> String {
    let mut lines = Vec::new();
    let mut in_fence = false;

    for line in content.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            lines.push(format!("{}  {}", CONTENT_INDENT, palette.paint(line, palette.code)));
            continue;
        }

        let rendered = if let Some(heading) = heading_text(trimmed) {
            palette.strong(&render_inline(heading, palette))
        } else if let Some(item) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
            format!("  • {}", render_inline(item, palette))
        } else {
            render_inline(line, palette)
        };
        lines.push(format!("{}{}", CONTENT_INDENT, rendered));
    }

    // Trailing blank lines carry no content.
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

fn heading_text(line: &str) -> Option<&str> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    line[hashes..].strip_prefix(' ').map(str::trim)
}

fn render_inline(text: &str, palette: &Palette) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("**") {
            if let Some(end) = after.find("**") {
                out.push_str(&palette.strong(&after[..end]));
                rest = &after[end + 2..];
                continue;
            }
        } else if let Some(after) = rest.strip_prefix('`') {
            if let Some(end) = after.find('`') {
                out.push_str(&palette.code(&after[..end]));
                rest = &after[end + 1..];
                continue;
            }
        }

        let next = rest
            .char_indices()
            .skip(1)
            .find(|(_, c)| *c == '*' || *c == '`')
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        out.push_str(&rest[..next]);
        rest = &rest[next..];
    }
    out
}
