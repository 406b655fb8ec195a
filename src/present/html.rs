use super::{Marker, Presenter, Table};

/// Escape text for HTML content and attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    out
}

/// `<tr>` fragment for a table body.
///
/// Tree rows carry `data-id`, `data-parent` and `data-level` so a page
/// script can find a row's children.
#[derive(Debug, Clone, Copy)]
pub struct HtmlRows {
    /// Left padding per depth step, in pixels
    pub indent_px: usize,
}

impl Default for HtmlRows {
    fn default() -> Self {
        Self { indent_px: 18 }
    }
}

impl Presenter for HtmlRows {
    fn render(&self, table: &Table) -> String {
        if table.rows.is_empty() {
            return format!(
                "<tr><td colspan=\"{}\" class=\"muted\">{}</td></tr>\n",
                table.columns.len().max(1),
                escape_html(table.empty_text.as_deref().unwrap_or(""))
            );
        }

        let mut out = String::new();
        for row in &table.rows {
            out.push_str("<tr");
            if let Some(id) = &row.id {
                out.push_str(&format!(" data-id=\"{}\"", escape_html(id)));
                out.push_str(&format!(
                    " data-parent=\"{}\"",
                    escape_html(row.parent.as_deref().unwrap_or(""))
                ));
            }
            if let Some(level) = row.level {
                out.push_str(&format!(" data-level=\"{}\"", level));
            }
            if let Some(class) = &row.class {
                out.push_str(&format!(" class=\"{}\"", escape_html(class)));
            }
            out.push('>');

            for (col, cell) in row.cells.iter().enumerate() {
                if table.tree_column == Some(col) {
                    out.push_str(&format!(
                        "<td><span style=\"padding-left:{}px\">{}</span>{}</td>",
                        row.depth * self.indent_px,
                        toggle_html(row.marker),
                        escape_html(cell)
                    ));
                } else {
                    out.push_str(&format!("<td>{}</td>", escape_html(cell)));
                }
            }
            out.push_str("</tr>\n");
        }
        out
    }
}

fn toggle_html(marker: Marker) -> String {
    match marker {
        Marker::None => String::new(),
        Marker::Collapsed | Marker::Expanded => format!(
            "<button data-tree-toggle=\"1\" aria-expanded=\"{}\">{}</button>",
            marker == Marker::Expanded,
            marker.glyph()
        ),
    }
}
