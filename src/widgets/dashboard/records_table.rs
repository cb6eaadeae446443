use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::Line,
    widgets::{Block, Paragraph},
};
use throbber_widgets_tui::{Throbber, ThrobberState};
use unicode_width::UnicodeWidthStr;

use segscope::{
    model::ShapeKind,
    view::{ResultSet, RowExpansion, ViewState},
};

use super::details::detail_lines;
use crate::{
    util::{pad, truncate},
    widgets::theme::Theme,
};

const MAX_COLUMN_WIDTH: usize = 40;
const COLUMN_GAP: &str = "  ";
const COLLAPSED: &str = "► ";
const EXPANDED: &str = "▼ ";

/// Placeholder text shown instead of the table, if any. Loading wins over
/// an error, and an error wins over an empty result. `error` is the failure
/// still on screen, see [`RecordsTable::visible_error`].
pub fn empty_message(state: &ViewState, error: Option<&str>) -> Option<String> {
    if state.is_loading() {
        Some("Loading customers...".to_string())
    } else if let Some(err) = error {
        Some(format!("Error: {err}"))
    } else if state.records().is_empty() {
        Some("No customers found".to_string())
    } else {
        None
    }
}

/// Width of each column: the widest of header and cells, capped.
pub fn column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            rows.iter()
                .filter_map(|row| row.get(col))
                .map(|cell| cell.width())
                .chain(std::iter::once(header.width()))
                .max()
                .unwrap_or(0)
                .min(MAX_COLUMN_WIDTH)
        })
        .collect()
}

fn format_row<S: AsRef<str>>(marker: &str, cells: &[S], widths: &[usize]) -> String {
    let mut out = String::from(marker);
    for (idx, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if idx > 0 {
            out.push_str(COLUMN_GAP);
        }
        let cell = truncate(cell.as_ref(), *width);
        let fill = width.saturating_sub(cell.width());
        out.push_str(&cell);
        out.push_str(&" ".repeat(fill));
    }
    out.trim_end().to_string()
}

/// Selection, scroll position and expanded rows of the result table.
#[derive(Debug, Default)]
pub struct RecordsTable {
    generation: u64,
    selected: usize,
    offset: usize,
    page: usize,
    expansion: RowExpansion,
    /// Request generation whose failure the user has dismissed.
    dismissed_error: Option<u64>,
}

impl RecordsTable {
    /// Start over when a new result set has been committed.
    pub fn sync(&mut self, records: &ResultSet) {
        if self.generation != records.generation() {
            self.generation = records.generation();
            self.selected = 0;
            self.offset = 0;
        }
        if self.selected >= records.len() {
            self.selected = records.len().saturating_sub(1);
        }
    }

    /// Hide the failure of request `generation` so the records kept from
    /// before it show again. Only possible when there are records to show.
    pub fn dismiss_error(&mut self, state: &ViewState, generation: u64) -> bool {
        if state.is_loading() || state.error().is_none() || state.records().is_empty() {
            return false;
        }
        self.dismissed_error = Some(generation);
        true
    }

    /// The failure of the latest request unless it has been dismissed.
    pub fn visible_error<'a>(&self, state: &'a ViewState, generation: u64) -> Option<&'a str> {
        state
            .error()
            .filter(|_| self.dismissed_error != Some(generation))
    }

    pub fn selected(&self, records: &ResultSet) -> Option<usize> {
        (!records.is_empty()).then_some(self.selected.min(records.len() - 1))
    }

    pub fn select_next(&mut self, len: usize) {
        if len > 0 {
            self.selected = (self.selected + 1).min(len - 1);
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self, len: usize) {
        self.selected = len.saturating_sub(1);
    }

    pub fn page_down(&mut self, len: usize) {
        if len > 0 {
            self.selected = (self.selected + self.page.max(1)).min(len - 1);
        }
    }

    pub fn page_up(&mut self) {
        self.selected = self.selected.saturating_sub(self.page.max(1));
    }

    /// Expand or collapse the selected row. Returns the new state.
    pub fn toggle_selected(&mut self, records: &ResultSet) -> Option<bool> {
        let index = self.selected(records)?;
        Some(self.expansion.toggle(records.generation(), index))
    }

    pub fn collapse_all(&mut self) {
        self.expansion.collapse_all();
    }

    pub fn is_expanded(&self, records: &ResultSet, index: usize) -> bool {
        self.expansion.is_expanded(records.generation(), index)
    }

    pub fn render(
        &mut self,
        frame: &mut Frame,
        area: Rect,
        theme: &Theme,
        state: &ViewState,
        generation: u64,
        throbber: &mut ThrobberState,
    ) {
        let records = state.records();
        self.sync(records);
        let error = self.visible_error(state, generation);
        let message = empty_message(state, error);

        let count_title = match message {
            Some(_) if state.is_loading() || error.is_some() => "Customers".to_string(),
            _ => format!("Customers ({})", records.len()),
        };
        let border = if error.is_some() && !state.is_loading() {
            theme.error()
        } else {
            theme.border()
        };
        let mut block = Block::bordered()
            .title_top(Line::styled(
                pad(count_title, 1),
                Style::default().fg(theme.text()).add_modifier(Modifier::BOLD),
            ))
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(theme.panel_bg_alt()).fg(theme.text()));
        if message.is_none() {
            block = block.title_bottom(
                Line::styled(
                    pad(
                        status_line(
                            self.selected + 1,
                            records.len(),
                            self.expansion.expanded_count(records.generation()),
                            records.shape().kind(),
                        ),
                        1,
                    ),
                    Style::default().fg(theme.text_muted()),
                )
                .right_aligned(),
            );
        }
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if let Some(message) = message {
            let [_, line_area, _] = inner.layout(&Layout::vertical([
                Constraint::Fill(1),
                Constraint::Length(1),
                Constraint::Fill(1),
            ]));
            if state.is_loading() {
                let width = (message.width() + 2) as u16;
                let [_, throbber_area, _] = line_area.layout(&Layout::horizontal([
                    Constraint::Fill(1),
                    Constraint::Length(width),
                    Constraint::Fill(1),
                ]));
                let throbber_widget = Throbber::default()
                    .label(message)
                    .style(Style::default().fg(theme.warning()))
                    .throbber_style(Style::default().fg(theme.accent()));
                frame.render_stateful_widget(throbber_widget, throbber_area, throbber);
            } else {
                let color = if error.is_some() {
                    theme.error()
                } else {
                    theme.text_muted()
                };
                frame.render_widget(
                    Paragraph::new(message)
                        .alignment(Alignment::Center)
                        .style(Style::default().fg(color)),
                    line_area,
                );
            }
            return;
        }

        let shape = records.shape();
        let headers = shape.headers();
        let rows: Vec<Vec<String>> = records.records().iter().map(|r| shape.row(r)).collect();
        let widths = column_widths(&headers, &rows);

        let [header_area, body_area] =
            inner.layout(&Layout::vertical([Constraint::Length(1), Constraint::Fill(1)]));
        frame.render_widget(
            Paragraph::new(format_row("  ", &headers, &widths)).style(
                Style::default()
                    .fg(theme.accent())
                    .add_modifier(Modifier::BOLD),
            ),
            header_area,
        );

        let selected = self.selected(records).unwrap_or(0);
        let mut lines: Vec<Line> = Vec::new();
        let mut selected_span = (0, 1);
        for (index, (record, cells)) in records.records().iter().zip(&rows).enumerate() {
            let expanded = self.is_expanded(records, index);
            let marker = if expanded { EXPANDED } else { COLLAPSED };
            let style = if index == selected {
                Style::default()
                    .bg(theme.selection_bg())
                    .fg(theme.selection_fg())
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(theme.text())
            };
            let start = lines.len();
            lines.push(Line::styled(format_row(marker, cells, &widths), style));
            if expanded {
                lines.extend(detail_lines(shape, record, body_area.width as usize, theme));
            }
            if index == selected {
                selected_span = (start, lines.len() - start);
            }
        }

        let height = body_area.height as usize;
        self.page = height.saturating_sub(1).max(1);
        self.offset = scroll_offset(self.offset, selected_span, height);
        frame.render_widget(
            Paragraph::new(lines).scroll((self.offset as u16, 0)),
            body_area,
        );
    }
}

/// Position, expansion count and result ordering shown under the table.
fn status_line(row: usize, total: usize, expanded: usize, kind: ShapeKind) -> String {
    let mut line = format!("row {row} of {total} · {expanded} expanded");
    if let Some(ordering) = kind.ordering() {
        line.push_str(" · ");
        line.push_str(ordering);
    }
    line
}

/// Keep the selected row, and as much of its detail panel as fits, in view.
fn scroll_offset(offset: usize, (start, len): (usize, usize), height: usize) -> usize {
    if height == 0 || start < offset {
        return start;
    }
    let end = start + len;
    if end > offset + height {
        end.saturating_sub(height).min(start)
    } else {
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segscope::{
        api::{ApiError, Operation},
        view::Controller,
    };
    use serde_json::json;

    fn committed(values: Vec<serde_json::Value>) -> Controller {
        let mut controller = Controller::default();
        let ticket = controller.begin_browse(None);
        let records = values
            .into_iter()
            .map(|value| serde_json::from_value(value).unwrap())
            .collect();
        controller.complete(ticket.generation, Ok(records));
        controller
    }

    fn message(controller: &Controller, table: &RecordsTable) -> Option<String> {
        let state = controller.state();
        empty_message(state, table.visible_error(state, controller.generation()))
    }

    fn fail_refresh(controller: &mut Controller) {
        let ticket = controller.begin_refresh();
        controller.complete(
            ticket.generation,
            Err(ApiError::Transport {
                operation: Operation::Browse,
                message: "connection refused".to_string(),
            }),
        );
    }

    #[test]
    fn empty_browse_shows_message_without_headers() {
        let controller = committed(vec![]);
        let table = RecordsTable::default();
        assert_eq!(
            message(&controller, &table).as_deref(),
            Some("No customers found")
        );
        assert!(controller.state().records().shape().headers().is_empty());
    }

    #[test]
    fn loading_beats_error_beats_empty() {
        let mut controller = committed(vec![json!({"customer_id": "a"})]);
        let table = RecordsTable::default();
        assert_eq!(message(&controller, &table), None);

        let ticket = controller.begin_refresh();
        assert_eq!(
            message(&controller, &table).as_deref(),
            Some("Loading customers...")
        );

        controller.complete(
            ticket.generation,
            Err(ApiError::Transport {
                operation: Operation::Browse,
                message: "connection refused".to_string(),
            }),
        );
        assert_eq!(
            message(&controller, &table).as_deref(),
            Some("Error: Failed to fetch customers: connection refused")
        );
    }

    #[test]
    fn dismissing_an_error_leaves_view_state_alone() {
        let mut controller = committed(vec![json!({"customer_id": "a"})]);
        let mut table = RecordsTable::default();
        fail_refresh(&mut controller);
        let generation = controller.generation();

        assert!(table.dismiss_error(controller.state(), generation));
        assert_eq!(message(&controller, &table), None);
        // the failure is still recorded, only hidden on screen
        assert_eq!(
            controller.state().error(),
            Some("Failed to fetch customers: connection refused")
        );
        assert_eq!(controller.state().records().len(), 1);

        // the next failed request is shown again
        fail_refresh(&mut controller);
        assert_eq!(
            message(&controller, &table).as_deref(),
            Some("Error: Failed to fetch customers: connection refused")
        );
    }

    #[test]
    fn errors_without_records_cannot_be_dismissed() {
        let mut controller = committed(vec![]);
        let mut table = RecordsTable::default();
        assert!(!table.dismiss_error(controller.state(), controller.generation()));

        fail_refresh(&mut controller);
        assert!(!table.dismiss_error(controller.state(), controller.generation()));
        assert!(message(&controller, &table).is_some_and(|m| m.starts_with("Error: ")));

        let _pending = controller.begin_refresh();
        assert!(!table.dismiss_error(controller.state(), controller.generation()));
    }

    #[test]
    fn widths_cover_header_and_cells() {
        let headers = ["ID", "Age"];
        let rows = vec![
            vec!["c-100".to_string(), "7".to_string()],
            vec!["c-1".to_string(), "100".to_string()],
        ];
        assert_eq!(column_widths(&headers, &rows), vec![5, 3]);
        assert_eq!(
            format_row("► ", &rows[1], &[5, 3]),
            "► c-1    100"
        );
    }

    #[test]
    fn expansion_resets_with_new_results() {
        let mut controller = committed(vec![json!({"customer_id": "a"}), json!({"customer_id": "b"})]);
        let mut table = RecordsTable::default();
        table.sync(controller.state().records());
        table.select_next(2);
        assert_eq!(table.toggle_selected(controller.state().records()), Some(true));
        assert!(table.is_expanded(controller.state().records(), 1));

        let ticket = controller.begin_refresh();
        controller.complete(ticket.generation, Ok(Vec::new()));
        let ticket = controller.begin_refresh();
        let record = serde_json::from_value(json!({"customer_id": "c"})).unwrap();
        controller.complete(ticket.generation, Ok(vec![record]));
        let records = controller.state().records();
        table.sync(records);
        assert_eq!(table.selected(records), Some(0));
        assert!(!table.is_expanded(records, 0));
        assert!(!table.is_expanded(records, 1));
    }

    #[test]
    fn status_line_names_result_ordering() {
        assert_eq!(status_line(2, 5, 0, ShapeKind::Browse), "row 2 of 5 · 0 expanded");
        assert_eq!(
            status_line(1, 10, 1, ShapeKind::Search),
            "row 1 of 10 · 1 expanded · ranked by similarity"
        );

        let controller = committed(vec![json!({"customer_id": "a", "cluster_name": "Commuters"})]);
        let kind = controller.state().records().shape().kind();
        assert_eq!(
            status_line(1, 1, 0, kind),
            "row 1 of 1 · 0 expanded · grouped by segment"
        );
    }

    #[test]
    fn scroll_keeps_selection_visible() {
        assert_eq!(scroll_offset(0, (3, 1), 10), 0);
        assert_eq!(scroll_offset(0, (12, 1), 10), 3);
        assert_eq!(scroll_offset(5, (2, 1), 10), 2);
        // a detail panel taller than the view keeps the row itself on top
        assert_eq!(scroll_offset(0, (4, 30), 10), 4);
    }
}
