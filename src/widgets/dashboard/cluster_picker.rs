use crossterm::event::{Event, KeyCode};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Paragraph, Wrap},
};

use segscope::{model::ClusterSummary, view::ClusterCatalog};

use crate::{util::truncate, widgets::theme::Theme};

pub const HEIGHT: u16 = 7;
const CARD_WIDTH: u16 = 30;

const ALL_SEGMENTS: &str = "All Segments";
const ALL_SEGMENTS_BLURB: &str = "View customers across all segments";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerAction {
    None,
    Moved,
    /// `None` selects every segment.
    Select(Option<u32>),
    Retry,
}

/// Horizontal strip of segment cards. Card 0 is "All Segments", card `n`
/// is the `n-1`th cluster of the catalog.
#[derive(Debug, Default)]
pub struct ClusterPicker {
    highlighted: usize,
    focused: bool,
}

impl ClusterPicker {
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    fn card_count(catalog: &ClusterCatalog) -> usize {
        catalog.summaries().len() + 1
    }

    fn cluster_at(catalog: &ClusterCatalog, index: usize) -> Option<Option<u32>> {
        match index {
            0 => Some(None),
            n => catalog
                .summaries()
                .get(n - 1)
                .map(|summary| Some(summary.cluster_id)),
        }
    }

    /// Move the highlight onto the card for `selected`.
    pub fn highlight(&mut self, catalog: &ClusterCatalog, selected: Option<u32>) {
        self.highlighted = match selected {
            None => 0,
            Some(id) => catalog
                .summaries()
                .iter()
                .position(|summary| summary.cluster_id == id)
                .map_or(0, |pos| pos + 1),
        };
    }

    pub fn handle_event(&mut self, event: &Event, catalog: &ClusterCatalog) -> PickerAction {
        if !self.focused {
            return PickerAction::None;
        }
        let Some(key) = event.as_key_press_event() else {
            return PickerAction::None;
        };
        if catalog.error().is_some() && key.code == KeyCode::Char('r') {
            return PickerAction::Retry;
        }
        if catalog.is_loading() {
            return PickerAction::None;
        }
        let last = Self::card_count(catalog) - 1;
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => {
                self.highlighted = self.highlighted.saturating_sub(1);
                PickerAction::Moved
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.highlighted = (self.highlighted + 1).min(last);
                PickerAction::Moved
            }
            KeyCode::Home => {
                self.highlighted = 0;
                PickerAction::Moved
            }
            KeyCode::End => {
                self.highlighted = last;
                PickerAction::Moved
            }
            KeyCode::Enter | KeyCode::Char(' ') => Self::cluster_at(catalog, self.highlighted)
                .map_or(PickerAction::None, PickerAction::Select),
            _ => PickerAction::None,
        }
    }

    pub fn render(
        &self,
        frame: &mut Frame,
        area: Rect,
        theme: &Theme,
        catalog: &ClusterCatalog,
        applied: Option<Option<u32>>,
    ) {
        let border = if self.focused {
            theme.accent()
        } else {
            theme.border()
        };
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .title(Line::styled(
                " Customer Segments ",
                Style::default().fg(theme.accent()).add_modifier(Modifier::BOLD),
            ))
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(theme.panel_bg_alt()).fg(theme.text()));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if catalog.is_loading() || !catalog.has_loaded() {
            frame.render_widget(
                Paragraph::new("Loading clusters...").style(Style::default().fg(theme.warning())),
                inner,
            );
            return;
        }
        if let Some(err) = catalog.error() {
            frame.render_widget(
                Paragraph::new(format!("Error loading clusters: {err} (r to retry)"))
                    .style(Style::default().fg(theme.error()))
                    .wrap(Wrap { trim: true }),
                inner,
            );
            return;
        }

        let count = Self::card_count(catalog);
        let visible = ((inner.width / CARD_WIDTH) as usize).max(1);
        let first = (self.highlighted + 1).saturating_sub(visible);
        let shown: Vec<usize> = (first..count).take(visible).collect();
        let slots = Layout::horizontal(
            shown
                .iter()
                .map(|_| Constraint::Length(CARD_WIDTH))
                .collect::<Vec<_>>(),
        )
        .split(inner);

        for (slot, index) in slots.iter().zip(shown) {
            let cluster = Self::cluster_at(catalog, index).flatten();
            let summary = cluster.and_then(|id| catalog.find(id));
            let is_applied = applied == Some(cluster);
            let is_highlighted = self.focused && index == self.highlighted;
            self.render_card(frame, *slot, theme, summary, is_applied, is_highlighted);
        }
    }

    fn render_card(
        &self,
        frame: &mut Frame,
        area: Rect,
        theme: &Theme,
        summary: Option<&ClusterSummary>,
        applied: bool,
        highlighted: bool,
    ) {
        let width = area.width.saturating_sub(4) as usize;
        let name = summary.map_or(ALL_SEGMENTS, |summary| summary.cluster_name.as_str());
        let marker = if applied { "● " } else { "" };
        let border = if highlighted {
            Style::default().fg(theme.accent()).add_modifier(Modifier::BOLD)
        } else if applied {
            Style::default().fg(theme.accent_alt())
        } else {
            Style::default().fg(theme.border())
        };
        let background = if highlighted {
            theme.selection_bg()
        } else {
            theme.panel_bg()
        };
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .title(Span::styled(
                truncate(&format!(" {marker}{name} "), width + 2),
                Style::default().add_modifier(Modifier::BOLD),
            ))
            .border_style(border)
            .style(Style::default().bg(background).fg(theme.text()));

        let lines: Vec<Line> = match summary {
            None => vec![Line::styled(
                ALL_SEGMENTS_BLURB,
                Style::default().fg(theme.text_muted()),
            )],
            Some(summary) => card_stats(summary)
                .into_iter()
                .map(|(label, value)| {
                    Line::from(vec![
                        Span::styled(format!("{label}: "), Style::default().fg(theme.text_muted())),
                        Span::styled(value, Style::default().fg(theme.text())),
                    ])
                })
                .collect(),
        };
        frame.render_widget(
            Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
            area,
        );
    }
}

/// Label/value pairs shown on a segment card.
pub fn card_stats(summary: &ClusterSummary) -> Vec<(&'static str, String)> {
    vec![
        ("Customers", summary.customer_count.to_string()),
        ("Avg Age", summary.stats.avg_age_label()),
        ("Avg Premium", summary.stats.avg_premium_label()),
        ("Accidents", summary.stats.avg_accidents_label()),
    ]
}
