pub mod clusters;
pub mod customers;

use unicode_width::UnicodeWidthStr;

/// Left-aligned plain-text table with a two-space gutter.
pub(crate) fn print_table<H: AsRef<str>>(headers: &[H], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.as_ref().width()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }
    let line = |cells: Vec<&str>| {
        let mut out = String::new();
        for (idx, (cell, width)) in cells.iter().zip(&widths).enumerate() {
            if idx > 0 {
                out.push_str("  ");
            }
            out.push_str(cell);
            out.push_str(&" ".repeat(width.saturating_sub(cell.width())));
        }
        out.trim_end().to_string()
    };
    println!("{}", line(headers.iter().map(AsRef::as_ref).collect()));
    for row in rows {
        println!("{}", line(row.iter().map(String::as_str).collect()));
    }
}
