//! Raw result rows and their conversion into text maps and typed records

use std::borrow::Cow;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::Result;

/// A single column value as returned by the driver
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Text(String),
    Bytes(Vec<u8>),
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    /// Textual view of the value; bytes are read as UTF-8, lossily.
    pub fn text(&self) -> Option<Cow<'_, str>> {
        match self {
            RawValue::Null => None,
            RawValue::Text(text) => Some(Cow::Borrowed(text.as_str())),
            RawValue::Bytes(bytes) => Some(String::from_utf8_lossy(bytes)),
        }
    }
}

impl From<&str> for RawValue {
    fn from(val: &str) -> Self {
        RawValue::Text(val.to_string())
    }
}

impl From<String> for RawValue {
    fn from(val: String) -> Self {
        RawValue::Text(val)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(RawValue::Null)
    }
}

/// The full result of a query: column names plus every row's raw values,
/// positionally aligned with the columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<RawValue>>,
}

impl RawRows {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row; builder style, mostly for drivers and tests
    pub fn with_row<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<RawValue>,
    {
        self.rows.push(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Untyped view: every row as an ordered column -> text mapping
    pub fn into_text_rows(self) -> Vec<TextRow> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| TextRow {
                entries: columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(|raw| raw.text().map(Cow::into_owned).unwrap_or_default()))
                    .collect(),
            })
            .collect()
    }

    /// Decode every row into a fresh `T` and append the results to `dest`.
    ///
    /// A decode failure returns immediately and leaves `dest` untouched.
    pub fn decode_into<T: FromRow>(&self, dest: &mut Vec<T>) -> Result<usize> {
        let mut decoded = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let mut item = T::default();
            for (column, raw) in self.columns.iter().zip(row) {
                item.apply_column(column, raw)?;
            }
            decoded.push(item);
        }
        let count = decoded.len();
        dest.extend(decoded);
        Ok(count)
    }
}

/// A result row as an ordered mapping from column name to its textual value.
///
/// NULL columns read as the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextRow {
    entries: Vec<(String, String)>,
}

impl TextRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for TextRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A type that can be built column by column from a result row.
///
/// Usually implemented through [`record!`](crate::record), which matches
/// columns against the same names the insert path writes.
pub trait FromRow: Default {
    /// Assign `raw` to every field whose column name is `column`.
    /// Columns with no matching field are ignored.
    fn apply_column(&mut self, column: &str, raw: &RawValue) -> Result<()>;
}
