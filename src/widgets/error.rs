use std::borrow::Cow;

use crossterm::event::{Event, KeyCode};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Margin, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Clear, Paragraph, Wrap},
};

use crate::{
    env::{WidgetCtx, WidgetId},
    help,
    util::{centered, fill_bg, pad},
    widgets::{Popup, WidgetInner, theme::Theme},
};

pub struct ErrorPopup {
    inner: WidgetInner,
    title: String,
    message: String,
}

impl ErrorPopup {
    const HELP: &'static [help::Entry<'static>] = &[help::Entry {
        keys: Cow::Borrowed("⏎/esc"),
        short: Cow::Borrowed("dismiss"),
        long: Cow::Borrowed("Dismiss"),
    }];

    pub fn new(title: impl Into<String>, message: impl Into<String>, parent: WidgetId) -> Self {
        Self {
            inner: WidgetInner::new::<Self>(parent),
            title: title.into(),
            message: message.into(),
        }
    }
}

impl crate::widgets::Widget for ErrorPopup {
    fn inner(&self) -> &WidgetInner {
        &self.inner
    }

    fn help(&self) -> Option<&[help::Entry<'_>]> {
        Some(Self::HELP)
    }

    fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        frame.render_widget(Clear, area);
        fill_bg(frame.buffer_mut(), area, theme.panel_bg());
        let title = Line::styled(
            pad(self.title.as_str(), 1),
            Style::default()
                .fg(theme.error())
                .add_modifier(Modifier::BOLD),
        )
        .centered();
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .title(title)
            .border_style(Style::default().fg(theme.error()))
            .style(Style::default().bg(theme.panel_bg()).fg(theme.text()));
        frame.render_widget(block.clone(), area);

        let inner = block.inner(area).inner(Margin::new(1, 1));
        let [body_area, button_area] =
            inner.layout(&Layout::vertical([Constraint::Min(1), Constraint::Length(1)]));
        let body = Paragraph::new(self.message.as_str())
            .style(Style::default().fg(theme.text()))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(body, body_area);

        let button = Span::styled(
            "[ OK ]",
            Style::default()
                .bg(theme.selection_bg())
                .fg(theme.selection_fg())
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(
            Paragraph::new(Line::from(button)).alignment(Alignment::Center),
            button_area,
        );
    }

    fn handle_event(&self, ctx: WidgetCtx, event: &Event) -> bool {
        if let Some(key) = event.as_key_press_event()
            && matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char('q'))
        {
            ctx.dismiss_popup();
            ctx.invalidate();
        }
        true
    }
}

impl Popup for ErrorPopup {
    fn rect(&self, area: Rect) -> Rect {
        let width = (area.width / 2).max(40);
        let text_width = width.saturating_sub(4).max(1) as usize;
        let lines = self
            .message
            .lines()
            .map(|line| line.chars().count().div_ceil(text_width).max(1))
            .sum::<usize>() as u16;
        centered(area, width, lines + 5)
    }
}
