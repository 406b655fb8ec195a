use super::{Presenter, Table};

/// Plain-text table with aligned columns.
#[derive(Debug, Clone, Copy)]
pub struct TextTable {
    /// Spaces per depth step in the tree column
    pub indent: usize,
    /// Cells wider than this are cut with `…`
    pub max_width: usize,
}

impl Default for TextTable {
    fn default() -> Self {
        Self {
            indent: 2,
            max_width: 60,
        }
    }
}

impl TextTable {
    fn cell_text(&self, table: &Table, row_index: usize, col: usize) -> String {
        let row = &table.rows[row_index];
        let raw = row.cells.get(col).map(String::as_str).unwrap_or("");
        let text = if table.tree_column == Some(col) {
            format!(
                "{}{} {}",
                " ".repeat(row.depth * self.indent),
                row.marker.glyph(),
                raw
            )
        } else {
            raw.to_string()
        };
        clip(&text, self.max_width)
    }
}

impl Presenter for TextTable {
    fn render(&self, table: &Table) -> String {
        let cols = table.columns.len();
        let cells: Vec<Vec<String>> = (0..table.rows.len())
            .map(|r| (0..cols).map(|c| self.cell_text(table, r, c)).collect())
            .collect();

        let mut widths: Vec<usize> = table.columns.iter().map(|c| width(c)).collect();
        for row in &cells {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(width(cell));
            }
        }

        let mut out = String::new();
        push_line(&mut out, &table.columns, &widths);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        push_line(&mut out, &rule, &widths);

        if cells.is_empty() {
            if let Some(text) = &table.empty_text {
                out.push_str(text);
                out.push('\n');
            }
        }
        for row in &cells {
            push_line(&mut out, row, &widths);
        }
        out
    }
}

fn width(s: &str) -> usize {
    s.chars().count()
}

fn clip(s: &str, max: usize) -> String {
    if width(s) <= max {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(c, w)| format!("{}{}", c, " ".repeat(w - width(c))))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::present::{Marker, TableRow};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tree_column_indent_and_alignment() {
        let mut table = Table::new(["code", "name"]).tree_column(0);
        table.push(TableRow {
            marker: Marker::Expanded,
            cells: vec!["01".into(), "Трубы".into()],
            ..Default::default()
        });
        table.push(TableRow {
            depth: 1,
            cells: vec!["01.01".into(), "Стальные".into()],
            ..Default::default()
        });

        let out = TextTable::default().render(&table);
        assert_eq!(
            out,
            concat!(
                "code       name\n",
                "---------  --------\n",
                "▾ 01       Трубы\n",
                "    01.01  Стальные\n",
            )
        );
    }

    #[test]
    fn test_empty_text_and_clip() {
        let table = Table::new(["x"]).empty_text("no data");
        assert_eq!(TextTable::default().render(&table), "x\n-\nno data\n");
        assert_eq!(clip("abcdef", 4), "abc…");
    }
}
