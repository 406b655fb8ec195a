//! Flat hierarchy rows as served by the content API.
//!
//! A row carries its own level plus the codes and names of every ancestor
//! level, flattened into `l1_*` .. `l4_*` columns. Numeric columns are read
//! leniently: the API sometimes returns numbers as strings, and a missing or
//! unparseable value is treated as absent rather than failing the whole page.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Deepest level a classification row can have.
pub const MAX_LEVEL: u8 = 4;

/// Record identifier. Collections use integer or string primary keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Int(i64),
    Text(String),
}

impl RowId {
    /// Identifier of the synthetic root node.
    pub fn root() -> Self {
        RowId::Text("root".into())
    }
}

impl Default for RowId {
    fn default() -> Self {
        RowId::Text(String::new())
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Int(n) => write!(f, "{}", n),
            RowId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RowId {
    fn from(n: i64) -> Self {
        RowId::Int(n)
    }
}

impl From<&str> for RowId {
    fn from(s: &str) -> Self {
        RowId::Text(s.to_string())
    }
}

impl From<String> for RowId {
    fn from(s: String) -> Self {
        RowId::Text(s)
    }
}

/// One record of `class_tree_v1` / `class_tree_nomen_v1`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchyRow {
    pub id: RowId,

    #[serde(default, deserialize_with = "lenient_level")]
    pub level: Option<u8>,

    /// Explicit parent link (pre-built hierarchies only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<RowId>,

    #[serde(default)]
    pub l1_code: Option<String>,
    #[serde(default)]
    pub l1_name: Option<String>,
    #[serde(default)]
    pub l2_code: Option<String>,
    #[serde(default)]
    pub l2_name: Option<String>,
    #[serde(default)]
    pub l3_code: Option<String>,
    #[serde(default)]
    pub l3_name: Option<String>,
    #[serde(default)]
    pub l4_code: Option<String>,
    #[serde(default)]
    pub l4_name: Option<String>,

    // Sibling ordering keys. The builder never sorts; these only travel
    // through so callers can request `sort=l1_num,l2_num,l3_num,l4_num,level`.
    #[serde(default, deserialize_with = "lenient_int")]
    pub l1_num: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub l2_num: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub l3_num: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub l4_num: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dup_root_id: Option<RowId>,

    // Leaf (level 4) payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Count of leaf items awaiting approval under a branch.
    #[serde(default, deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub pending_cnt: Option<u64>,
}

impl HierarchyRow {
    /// Create a bare row with an id and level.
    pub fn new(id: impl Into<RowId>, level: u8) -> Self {
        Self {
            id: id.into(),
            level: Some(level),
            ..Default::default()
        }
    }

    /// Set the code and name columns of one level.
    pub fn with_code(mut self, level: u8, code: &str, name: &str) -> Self {
        let (c, n) = match level {
            1 => (&mut self.l1_code, &mut self.l1_name),
            2 => (&mut self.l2_code, &mut self.l2_name),
            3 => (&mut self.l3_code, &mut self.l3_name),
            _ => (&mut self.l4_code, &mut self.l4_name),
        };
        *c = Some(code.to_string());
        *n = Some(name.to_string());
        self
    }

    /// Set the explicit parent link.
    pub fn with_parent(mut self, parent: impl Into<RowId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    /// Effective level. Missing or zero levels read as 1.
    pub fn level(&self) -> u8 {
        match self.level {
            None | Some(0) => 1,
            Some(l) => l,
        }
    }

    pub fn is_leaf_level(&self) -> bool {
        self.level() >= MAX_LEVEL
    }

    /// Non-empty code column for `level`.
    pub fn code_at(&self, level: u8) -> Option<&str> {
        let col = match level {
            1 => &self.l1_code,
            2 => &self.l2_code,
            3 => &self.l3_code,
            4 => &self.l4_code,
            _ => return None,
        };
        col.as_deref().filter(|s| !s.is_empty())
    }

    /// Non-empty name column for `level`.
    pub fn name_at(&self, level: u8) -> Option<&str> {
        let col = match level {
            1 => &self.l1_name,
            2 => &self.l2_name,
            3 => &self.l3_name,
            4 => &self.l4_name,
            _ => return None,
        };
        col.as_deref().filter(|s| !s.is_empty())
    }

    /// Code of the row's own level.
    pub fn current_code(&self) -> &str {
        self.code_at(self.level().min(MAX_LEVEL)).unwrap_or("")
    }

    /// Name of the row's own level.
    pub fn current_name(&self) -> &str {
        self.name_at(self.level().min(MAX_LEVEL)).unwrap_or("")
    }

    /// Code of the enclosing level (`l{level-1}_code`), if the row has one.
    pub fn parent_code(&self) -> Option<&str> {
        match self.level() {
            0 | 1 => None,
            l => self.code_at(l - 1),
        }
    }

    /// Deepest non-empty code column, `l4` first.
    pub fn deepest_code(&self) -> &str {
        (1..=MAX_LEVEL)
            .rev()
            .find_map(|l| self.code_at(l))
            .unwrap_or("")
    }

    /// Deepest non-empty name column, `l4` first.
    pub fn deepest_name(&self) -> &str {
        (1..=MAX_LEVEL)
            .rev()
            .find_map(|l| self.name_at(l))
            .unwrap_or("")
    }
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_i64))
}

fn lenient_level<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_int(deserializer)?.and_then(|n| u8::try_from(n).ok()))
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_int(deserializer)?.and_then(|n| u64::try_from(n).ok()))
}
