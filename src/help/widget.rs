use crossterm::event::{Event, KeyCode};
use ratatui::{
    Frame,
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Clear, Padding, Row, Table},
};

use crate::{
    env::{WidgetCtx, WidgetId},
    help::Entry,
    util::{centered, fill_bg, pad},
    widgets::{Popup, WidgetInner, theme::Theme},
};

/// Popup listing every key binding available in the current context.
pub struct Widget {
    inner: WidgetInner,
    entries: Vec<Entry<'static>>,
}

impl Widget {
    pub fn new(entries: &[&Entry<'_>], parent: WidgetId) -> Self {
        Self {
            inner: WidgetInner::new::<Self>(parent),
            entries: entries.iter().map(|e| e.to_owned_entry()).collect(),
        }
    }
}

impl crate::widgets::Widget for Widget {
    fn inner(&self) -> &WidgetInner {
        &self.inner
    }

    fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        frame.render_widget(Clear, area);
        fill_bg(frame.buffer_mut(), area, theme.panel_bg());
        let title = Line::styled(
            pad("Help", 2),
            Style::default()
                .fg(theme.accent())
                .add_modifier(Modifier::BOLD),
        )
        .centered();
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .title(title)
            .border_style(Style::default().fg(theme.border()))
            .style(Style::default().bg(theme.panel_bg()).fg(theme.text()))
            .padding(Padding::new(2, 2, 1, 1));

        let visible: Vec<_> = self
            .entries
            .iter()
            .filter(|entry| !entry.keys.is_empty())
            .collect();

        let rows: Vec<_> = visible
            .chunks(2)
            .map(|chunk| {
                let mut cells = Vec::with_capacity(4);
                for entry in chunk {
                    cells.push(Line::from(display_key(entry, theme)));
                    cells.push(Line::from(Span::styled(
                        entry.long.as_ref(),
                        Style::default().fg(theme.text()),
                    )));
                }
                Row::new(cells)
            })
            .collect();

        let widths = [
            Constraint::Length(10),
            Constraint::Fill(1),
            Constraint::Length(10),
            Constraint::Fill(1),
        ];
        let table = Table::new(rows, widths)
            .block(block)
            .style(Style::default().fg(theme.text()));

        frame.render_widget(table, area);
    }

    fn handle_event(&self, ctx: WidgetCtx, event: &Event) -> bool {
        if let Some(key) = event.as_key_press_event()
            && matches!(key.code, KeyCode::Char('?') | KeyCode::Esc | KeyCode::Enter)
        {
            ctx.dismiss_popup();
        }
        // modal: swallow everything else too
        true
    }
}

impl Popup for Widget {
    fn rect(&self, area: Rect) -> Rect {
        let rows = self.entries.len().div_ceil(2) as u16;
        centered(area, (area.width * 2 / 3).max(60), rows + 4)
    }
}

fn display_key(entry: &Entry<'_>, theme: &Theme) -> Span<'static> {
    Span::styled(
        format!("[{}]", entry.keys),
        Style::default()
            .fg(theme.accent_alt())
            .add_modifier(Modifier::BOLD),
    )
}
