//! Presentation adapters.
//!
//! Pages describe what to show as a [`Table`]; adapters turn it into a
//! concrete surface. The tree column gets indentation and `▸`/`▾` markers.

mod html;
mod text;

use serde::Serialize;

pub use html::{escape_html, HtmlRows};
pub use text::TextTable;

/// Anything that can turn a table into output text.
pub trait Presenter {
    fn render(&self, table: &Table) -> String;
}

/// Open/closed marker of a tree row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    /// Not part of a tree, or a childless node
    #[default]
    None,
    Collapsed,
    Expanded,
}

impl Marker {
    pub fn from_flags(has_children: bool, expanded: bool) -> Self {
        match (has_children, expanded) {
            (false, _) => Marker::None,
            (true, false) => Marker::Collapsed,
            (true, true) => Marker::Expanded,
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            Marker::None => " ",
            Marker::Collapsed => "▸",
            Marker::Expanded => "▾",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    pub depth: usize,
    pub marker: Marker,
    /// Row state class (`dirty`, `saving`, `ok`, `err`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub cells: Vec<String>,
}

impl TableRow {
    pub fn new(cells: Vec<String>) -> Self {
        Self {
            cells,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    /// Column that carries tree indentation and markers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree_column: Option<usize>,
    pub rows: Vec<TableRow>,
    /// Shown instead of rows when there are none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_text: Option<String>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn tree_column(mut self, index: usize) -> Self {
        self.tree_column = Some(index);
        self
    }

    pub fn empty_text(mut self, text: impl Into<String>) -> Self {
        self.empty_text = Some(text.into());
        self
    }

    pub fn push(&mut self, row: TableRow) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// JSON adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTable {
    pub pretty: bool,
}

impl Presenter for JsonTable {
    fn render(&self, table: &Table) -> String {
        let result = if self.pretty {
            serde_json::to_string_pretty(table)
        } else {
            serde_json::to_string(table)
        };
        // Table holds only strings and integers
        result.unwrap_or_default()
    }
}
