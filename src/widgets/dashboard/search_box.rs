use crossterm::event::{Event, KeyCode, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Paragraph},
};
use unicode_width::UnicodeWidthStr;

use segscope::view::{MIN_QUERY_LEN, TopK, validate_query};

use crate::widgets::theme::Theme;

pub const HEIGHT: u16 = 4;

const PLACEHOLDER: &str = "Describe the customers you want to find...";
const DESCRIPTION: &str =
    "Describe the customers you're looking for in natural language (e.g., \"young drivers with high risk\")";

/// What a key press did to the search box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchAction {
    None,
    Edited,
    Submit { query: String, top_k: TopK },
    Blur,
}

#[derive(Debug, Default)]
pub struct SearchBox {
    value: String,
    // cursor position in chars, not bytes
    cursor: usize,
    top_k: TopK,
    active: bool,
}

impl SearchBox {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        if active {
            self.cursor = self.value.chars().count();
        }
    }

    pub fn can_submit(&self) -> bool {
        validate_query(&self.value).is_ok()
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_index)
            .map(|(idx, _)| idx)
            .unwrap_or(self.value.len())
    }

    fn insert(&mut self, ch: char) {
        let idx = self.byte_index(self.cursor);
        self.value.insert(idx, ch);
        self.cursor += 1;
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let idx = self.byte_index(self.cursor - 1);
        self.value.remove(idx);
        self.cursor -= 1;
    }

    fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let idx = self.byte_index(self.cursor);
            self.value.remove(idx);
        }
    }

    pub fn handle_event(&mut self, event: &Event) -> SearchAction {
        if !self.active {
            return SearchAction::None;
        }
        let Some(key) = event.as_key_press_event() else {
            return SearchAction::None;
        };
        let len = self.value.chars().count();
        match key.code {
            KeyCode::Enter => {
                return match validate_query(&self.value) {
                    Ok(query) => SearchAction::Submit {
                        query: query.to_string(),
                        top_k: self.top_k,
                    },
                    Err(_) => SearchAction::None,
                };
            }
            KeyCode::Esc => {
                self.active = false;
                return SearchAction::Blur;
            }
            KeyCode::Tab => self.top_k = self.top_k.next(),
            KeyCode::Char('a') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.cursor = 0;
            }
            KeyCode::Char('e') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.cursor = len;
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.value.clear();
                self.cursor = 0;
            }
            KeyCode::Char(ch) => self.insert(ch),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(len),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = len,
            _ => return SearchAction::None,
        }
        SearchAction::Edited
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme, loading: bool) {
        let [description_area, input_area] =
            area.layout(&Layout::vertical([Constraint::Length(1), Constraint::Length(3)]));
        frame.render_widget(
            Paragraph::new(DESCRIPTION).style(Style::default().fg(theme.text_muted())),
            description_area,
        );

        let border = if self.active {
            theme.accent()
        } else {
            theme.border()
        };
        let status = if loading {
            Span::styled(" Searching... ", Style::default().fg(theme.warning()))
        } else if self.can_submit() {
            Span::styled(" ⏎ search ", Style::default().fg(theme.success()))
        } else {
            Span::styled(
                format!(" min {MIN_QUERY_LEN} chars "),
                Style::default().fg(theme.text_muted()),
            )
        };
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .title(Line::styled(
                " Customer Semantic Search ",
                Style::default().fg(theme.accent()).add_modifier(Modifier::BOLD),
            ))
            .title_top(
                Line::from(vec![
                    Span::styled(" Results: ", Style::default().fg(theme.text_muted())),
                    Span::styled(
                        self.top_k.to_string(),
                        Style::default()
                            .fg(theme.accent_alt())
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(" (tab) ", Style::default().fg(theme.text_muted())),
                ])
                .right_aligned(),
            )
            .title_bottom(Line::from(status).right_aligned())
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(theme.panel_bg_alt()).fg(theme.text()));

        let inner_width = input_area.width.saturating_sub(2) as usize;
        let before_cursor: String = self.value.chars().take(self.cursor).collect();
        let cursor_col = before_cursor.width();
        let scroll = cursor_col.saturating_sub(inner_width.saturating_sub(1));
        let content = if self.value.is_empty() && !self.active {
            Paragraph::new(Span::styled(
                PLACEHOLDER,
                Style::default().fg(theme.text_muted()),
            ))
        } else {
            Paragraph::new(self.value.as_str())
                .style(Style::default().fg(theme.text()))
                .scroll((0, scroll as u16))
        };
        frame.render_widget(content.block(block), input_area);

        if self.active {
            frame.set_cursor_position(Position::new(
                input_area.x + 1 + (cursor_col - scroll) as u16,
                input_area.y + 1,
            ));
        }
    }
}
