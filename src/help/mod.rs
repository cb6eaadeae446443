use std::borrow::Cow;

use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
};
use unicode_width::UnicodeWidthStr;

mod widget;

pub use widget::Widget;

use crate::widgets::theme::Theme;

/// One key binding: the keys, a one-word label for the footer and a longer
/// description for the help popup.
#[derive(Clone, Debug)]
pub struct Entry<'a> {
    pub keys: Cow<'a, str>,
    pub short: Cow<'a, str>,
    pub long: Cow<'a, str>,
}

impl Entry<'_> {
    pub fn to_owned_entry(&self) -> Entry<'static> {
        Entry {
            keys: Cow::Owned(self.keys.as_ref().to_owned()),
            short: Cow::Owned(self.short.as_ref().to_owned()),
            long: Cow::Owned(self.long.as_ref().to_owned()),
        }
    }
}

/// Bindings handled by the app itself, shown after the active widget's.
pub const GLOBAL: &[Entry<'static>] = &[
    Entry {
        keys: Cow::Borrowed("?"),
        short: Cow::Borrowed("help"),
        long: Cow::Borrowed("Show all key bindings"),
    },
    Entry {
        keys: Cow::Borrowed("T"),
        short: Cow::Borrowed("theme"),
        long: Cow::Borrowed("Toggle dark/light theme"),
    },
    Entry {
        keys: Cow::Borrowed("q"),
        short: Cow::Borrowed("quit"),
        long: Cow::Borrowed("Quit"),
    },
];

fn make_spans<'a>(entries: &'a [&Entry<'a>], theme: &Theme) -> Vec<Span<'a>> {
    let mut spans: Vec<_> = entries
        .iter()
        .filter(|entry| !entry.keys.is_empty())
        .flat_map(|entry| {
            [
                Span::styled(
                    format!("[{}]", entry.keys),
                    Style::default()
                        .fg(theme.accent_alt())
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(" "),
                Span::styled(entry.short.as_ref(), Style::default().fg(theme.text())),
                Span::styled(" • ", Style::default().fg(theme.text_muted())),
            ]
        })
        .collect();
    // drop the trailing separator
    spans.pop();
    spans
}

/// Rows the footer needs to show every entry at this width.
pub fn height(entries: &[&Entry<'_>], area: Rect) -> u16 {
    let total_width: usize = entries
        .iter()
        .filter(|entry| !entry.keys.is_empty())
        .map(|entry| entry.keys.width() + 2 + 1 + entry.short.width() + 3)
        .sum::<usize>()
        .saturating_sub(3);
    let available_width = (area.width as usize).max(1);
    total_width.div_ceil(available_width).max(1) as u16
}

pub fn render<'a>(entries: &'a [&Entry<'a>], frame: &mut Frame, area: Rect, theme: &Theme) {
    let spans = make_spans(entries, theme);
    let footer = Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .style(Style::default().bg(theme.bg()))
        .wrap(Wrap { trim: true });

    frame.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footer_height_wraps_long_hint_lines() {
        let entries: Vec<&Entry<'_>> = GLOBAL.iter().collect();
        // "[?] help • [T] theme • [q] quit" is 31 columns wide
        assert_eq!(height(&entries, Rect::new(0, 0, 80, 1)), 1);
        assert_eq!(height(&entries, Rect::new(0, 0, 16, 1)), 2);
    }

    #[test]
    fn entries_without_keys_are_skipped() {
        let hidden = Entry {
            keys: Cow::Borrowed(""),
            short: Cow::Borrowed("nothing"),
            long: Cow::Borrowed("Nothing"),
        };
        let entries = vec![&hidden];
        assert_eq!(height(&entries, Rect::new(0, 0, 80, 1)), 1);
        let theme = Theme::dark();
        assert!(make_spans(&entries, &theme).is_empty());
    }
}
