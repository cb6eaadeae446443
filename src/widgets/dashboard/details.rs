use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};
use unicode_width::UnicodeWidthStr;

use segscope::model::{CustomerRecord, ResultShape, Section, detail_sections};

use crate::widgets::theme::Theme;

const SECTION_INDENT: &str = "    ";
const ENTRY_INDENT: &str = "      ";
const ENTRY_GAP: &str = "   ";

/// Lines of the expanded detail panel for one record, laid out for `width`
/// columns. Empty when the record has nothing to show.
pub fn detail_lines(
    shape: &ResultShape,
    record: &CustomerRecord,
    width: usize,
    theme: &Theme,
) -> Vec<Line<'static>> {
    let label_style = Style::default().fg(theme.text_muted());
    let value_style = Style::default().fg(theme.text());
    let heading_style = Style::default()
        .fg(theme.accent())
        .add_modifier(Modifier::BOLD);
    let body_width = width.saturating_sub(ENTRY_INDENT.len()).max(10);

    let mut lines = Vec::new();
    for section in detail_sections(shape, record) {
        lines.push(Line::from(vec![
            Span::raw(SECTION_INDENT),
            Span::styled(section.section.title(), heading_style),
        ]));
        if section.section == Section::Description {
            let options = wrap_options(body_width);
            for entry in &section.entries {
                for text in textwrap::wrap(&entry.value, &options) {
                    lines.push(Line::from(vec![
                        Span::raw(ENTRY_INDENT),
                        Span::styled(text.into_owned(), value_style),
                    ]));
                }
            }
            continue;
        }

        // entries flow left to right and wrap onto new lines
        let mut spans: Vec<Span<'static>> = vec![Span::raw(ENTRY_INDENT)];
        let mut used = 0;
        for entry in &section.entries {
            let label = format!("{}: ", entry.label);
            let entry_width = label.width() + entry.value.width();
            if used > 0 && used + ENTRY_GAP.len() + entry_width > body_width {
                lines.push(Line::from(std::mem::replace(
                    &mut spans,
                    vec![Span::raw(ENTRY_INDENT)],
                )));
                used = 0;
            }
            if used > 0 {
                spans.push(Span::raw(ENTRY_GAP));
                used += ENTRY_GAP.len();
            }
            spans.push(Span::styled(label, label_style));
            spans.push(Span::styled(entry.value.clone(), value_style));
            used += entry_width;
        }
        lines.push(Line::from(spans));
    }
    lines
}

/// Greedy wrapping on spaces. Words wider than the panel are split so
/// nothing gets clipped.
fn wrap_options(width: usize) -> textwrap::Options<'static> {
    textwrap::Options::new(width)
        .word_separator(textwrap::WordSeparator::AsciiSpace)
        .wrap_algorithm(textwrap::WrapAlgorithm::FirstFit)
}
