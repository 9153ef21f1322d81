//! Text-to-type coercion for decoding row values into struct fields.
//!
//! Drivers hand back every column as a [`RawValue`]. The destination field's
//! type selects the parsing rule through its [`FromText`] implementation:
//! signed and unsigned integers parse base 10, floats parse at their own
//! width, booleans accept the `1/t/T/TRUE/true/True` and
//! `0/f/F/FALSE/false/False` spellings, and strings take the text as is.

use crate::row::RawValue;
use crate::{Error, Result};

#[cfg(feature = "datetime-support")]
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A type that can be populated from a raw column value
pub trait FromText: Sized {
    /// Name of the target kind, used in decode errors
    const KIND: &'static str;

    fn from_text(column: &str, raw: &RawValue) -> Result<Self>;
}

fn required_text<'a>(column: &str, raw: &'a RawValue, kind: &'static str) -> Result<std::borrow::Cow<'a, str>> {
    raw.text().ok_or_else(|| Error::decode(column, "NULL", kind))
}

macro_rules! parse_from_text {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromText for $ty {
                const KIND: &'static str = stringify!($ty);

                fn from_text(column: &str, raw: &RawValue) -> Result<Self> {
                    let text = required_text(column, raw, Self::KIND)?;
                    text.parse::<$ty>()
                        .map_err(|_| Error::decode(column, text.as_ref(), Self::KIND))
                }
            }
        )*
    };
}

parse_from_text!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl FromText for bool {
    const KIND: &'static str = "bool";

    fn from_text(column: &str, raw: &RawValue) -> Result<Self> {
        let text = required_text(column, raw, Self::KIND)?;
        match text.as_ref() {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
            other => Err(Error::decode(column, other, Self::KIND)),
        }
    }
}

impl FromText for String {
    const KIND: &'static str = "String";

    // NULL reads as the empty string, matching the textual row view.
    fn from_text(_column: &str, raw: &RawValue) -> Result<Self> {
        Ok(raw.text().map(|t| t.into_owned()).unwrap_or_default())
    }
}

impl FromText for Vec<u8> {
    const KIND: &'static str = "Vec<u8>";

    fn from_text(_column: &str, raw: &RawValue) -> Result<Self> {
        Ok(match raw {
            RawValue::Null => Vec::new(),
            RawValue::Text(text) => text.clone().into_bytes(),
            RawValue::Bytes(bytes) => bytes.clone(),
        })
    }
}

impl<T> FromText for Option<T>
where
    T: FromText,
{
    const KIND: &'static str = T::KIND;

    fn from_text(column: &str, raw: &RawValue) -> Result<Self> {
        if raw.is_null() {
            Ok(None)
        } else {
            T::from_text(column, raw).map(Some)
        }
    }
}

#[cfg(feature = "uuid-support")]
impl FromText for uuid::Uuid {
    const KIND: &'static str = "Uuid";

    fn from_text(column: &str, raw: &RawValue) -> Result<Self> {
        let text = required_text(column, raw, Self::KIND)?;
        uuid::Uuid::parse_str(&text).map_err(|_| Error::decode(column, text.as_ref(), Self::KIND))
    }
}

#[cfg(feature = "datetime-support")]
impl FromText for chrono::NaiveDateTime {
    const KIND: &'static str = "NaiveDateTime";

    fn from_text(column: &str, raw: &RawValue) -> Result<Self> {
        let text = required_text(column, raw, Self::KIND)?;
        chrono::NaiveDateTime::parse_from_str(&text, DATETIME_FORMAT)
            .map_err(|_| Error::decode(column, text.as_ref(), Self::KIND))
    }
}

#[cfg(feature = "decimal-support")]
impl FromText for rust_decimal::Decimal {
    const KIND: &'static str = "Decimal";

    fn from_text(column: &str, raw: &RawValue) -> Result<Self> {
        let text = required_text(column, raw, Self::KIND)?;
        text.parse::<rust_decimal::Decimal>()
            .map_err(|_| Error::decode(column, text.as_ref(), Self::KIND))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> RawValue {
        RawValue::Text(s.to_string())
    }

    #[test]
    fn test_integers() {
        assert_eq!(i64::from_text("id", &text("-42")).unwrap(), -42);
        assert_eq!(u8::from_text("id", &RawValue::Bytes(b"200".to_vec())).unwrap(), 200);
        assert!(u8::from_text("id", &text("-1")).is_err());
        assert!(i32::from_text("id", &text("12abc")).is_err());
    }

    #[test]
    fn test_floats() {
        assert_eq!(f64::from_text("score", &text("2.5")).unwrap(), 2.5);
        assert_eq!(f32::from_text("score", &text("1.25")).unwrap(), 1.25f32);
    }

    #[test]
    fn test_bool_spellings() {
        for yes in ["1", "t", "T", "TRUE", "true", "True"] {
            assert!(bool::from_text("active", &text(yes)).unwrap());
        }
        for no in ["0", "f", "F", "FALSE", "false", "False"] {
            assert!(!bool::from_text("active", &text(no)).unwrap());
        }
        let err = bool::from_text("active", &text("yes")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot decode column 'active' value \"yes\" as bool"
        );
    }

    #[test]
    fn test_null_handling() {
        assert_eq!(String::from_text("name", &RawValue::Null).unwrap(), "");
        assert_eq!(Option::<i32>::from_text("age", &RawValue::Null).unwrap(), None);
        assert_eq!(Option::<i32>::from_text("age", &text("7")).unwrap(), Some(7));
        assert!(matches!(
            i32::from_text("age", &RawValue::Null),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn test_bytes() {
        assert_eq!(Vec::<u8>::from_text("blob", &RawValue::Bytes(vec![0, 255])).unwrap(), vec![0, 255]);
        assert_eq!(Vec::<u8>::from_text("blob", &text("ab")).unwrap(), b"ab".to_vec());
    }
}
