//! Struct-to-column mapping through static field descriptors.
//!
//! A type opts in by registering its fields once with [`record!`]. Each
//! registered field may carry a tag: the first comma-separated token names the
//! column, and an `auto_increment` marker (any casing) keeps the field out of
//! INSERT / REPLACE column lists. Fields left out of the registration never
//! take part in mapping, in either direction.
//!
//! ```
//! use rowsmith_core::{record, Record};
//!
//! #[derive(Debug, Default)]
//! struct User {
//!     id: u64,
//!     name: String,
//!     age: i32,
//! }
//!
//! record!(User {
//!     id: "user_id,AUTO_INCREMENT",
//!     name,
//!     age: "user_age",
//! });
//!
//! let columns: Vec<&str> = User::fields().iter().map(|f| f.column()).collect();
//! assert_eq!(columns, ["user_id", "name", "user_age"]);
//! ```

use crate::Value;

/// One registered field: its declared name and optional column tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub tag: Option<&'static str>,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, tag: Option<&'static str>) -> Self {
        Self { name, tag }
    }

    /// Column name: the tag's first comma-separated token, or the declared
    /// field name when the tag is absent or that token is blank.
    pub fn column(&self) -> &'static str {
        self.tag
            .and_then(|tag| tag.split(',').next())
            .map(str::trim)
            .filter(|column| !column.is_empty())
            .unwrap_or(self.name)
    }

    /// The backend assigns this column's value; never written by inserts
    pub fn is_auto_generated(&self) -> bool {
        self.tag
            .map(|tag| tag.to_ascii_lowercase().contains("auto_increment"))
            .unwrap_or(false)
    }
}

/// A struct whose fields map onto table columns
pub trait Record {
    /// Registered fields, in declaration order
    fn fields() -> &'static [FieldDescriptor];

    /// Current field values, aligned with [`Record::fields`]
    fn values(&self) -> Vec<Value>;

    /// Every registered field as `(column, value)`; used by WHERE, HAVING and
    /// UPDATE shorthand.
    fn column_values(&self) -> Vec<(&'static str, Value)> {
        Self::fields()
            .iter()
            .map(FieldDescriptor::column)
            .zip(self.values())
            .collect()
    }

    /// Registered fields minus auto-generated ones; used by INSERT / REPLACE.
    fn insert_values(&self) -> Vec<(&'static str, Value)> {
        Self::fields()
            .iter()
            .zip(self.values())
            .filter(|(field, _)| !field.is_auto_generated())
            .map(|(field, value)| (field.column(), value))
            .collect()
    }
}

/// Conversion of a struct field into a bound parameter.
///
/// Separate from `Into<Value>` so that `Vec<u8>` fields bind as bytes rather
/// than as a value list.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

macro_rules! to_value_via_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::from(self.clone())
                }
            }
        )*
    };
}

to_value_via_from!(bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, String);

impl ToValue for isize {
    fn to_value(&self) -> Value {
        Value::I64(*self as i64)
    }
}

impl ToValue for usize {
    fn to_value(&self) -> Value {
        Value::U64(*self as u64)
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map(ToValue::to_value).unwrap_or(Value::Null)
    }
}

#[cfg(feature = "uuid-support")]
to_value_via_from!(uuid::Uuid);

#[cfg(feature = "datetime-support")]
to_value_via_from!(chrono::NaiveDateTime);

#[cfg(feature = "decimal-support")]
to_value_via_from!(rust_decimal::Decimal);

/// Register a struct's fields for column mapping.
///
/// Implements [`Record`] and [`FromRow`](crate::FromRow) from one field list.
/// Each entry is a field name, optionally followed by `: "tag"`. Field types
/// must implement [`ToValue`] and [`FromText`](crate::FromText), and the
/// struct must implement `Default`.
#[macro_export]
macro_rules! record {
    ($ty:ty { $($field:ident $(: $tag:literal)?),* $(,)? }) => {
        impl $crate::Record for $ty {
            fn fields() -> &'static [$crate::FieldDescriptor] {
                const FIELDS: &[$crate::FieldDescriptor] = &[
                    $($crate::FieldDescriptor::new(stringify!($field), $crate::__record_tag!($($tag)?)),)*
                ];
                FIELDS
            }

            fn values(&self) -> ::std::vec::Vec<$crate::Value> {
                ::std::vec![$($crate::ToValue::to_value(&self.$field)),*]
            }
        }

        impl $crate::FromRow for $ty {
            fn apply_column(&mut self, column: &str, raw: &$crate::RawValue) -> $crate::Result<()> {
                $(
                    if $crate::FieldDescriptor::new(stringify!($field), $crate::__record_tag!($($tag)?)).column() == column {
                        self.$field = $crate::FromText::from_text(column, raw)?;
                    }
                )*
                Ok(())
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __record_tag {
    () => {
        ::std::option::Option::None
    };
    ($tag:literal) => {
        ::std::option::Option::Some($tag)
    };
}
