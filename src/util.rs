use std::env;

use ratatui::{buffer::Buffer, layout::Rect, style::Color};
use unicode_width::UnicodeWidthStr;

pub fn fill_bg(buf: &mut Buffer, area: Rect, color: Color) {
    for x in area.left()..area.right() {
        for y in area.top()..area.bottom() {
            buf[(x, y)].set_bg(color);
        }
    }
}

pub fn pad<S: AsRef<str>>(s: S, pad: usize) -> String {
    let s = s.as_ref();
    let padding = " ".repeat(pad);
    format!("{padding}{s}{padding}")
}

/// Positive integer from the environment, if set and valid.
pub fn env_u32(name: &str) -> Option<u32> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<u32>() {
        Ok(0) | Err(_) => {
            tracing::warn!(env = name, value = %raw, "Ignoring invalid value");
            None
        }
        Ok(value) => Some(value),
    }
}

/// Cut `s` to at most `width` display columns, ending with an ellipsis when
/// something was dropped.
pub fn truncate(s: &str, width: usize) -> String {
    if s.width() <= width {
        return s.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in s.chars() {
        let ch_width = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + ch_width + 1 > width {
            break;
        }
        out.push(ch);
        used += ch_width;
    }
    out.push('…');
    out
}

/// A rect of at most `width` x `height`, centered in `area`.
pub fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
