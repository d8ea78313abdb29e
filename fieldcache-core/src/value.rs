//! Value kinds and the text codec used for stored field values.
//!
//! Stores only ever hold text. A field's Rust type implements [`FieldValue`]
//! to encode itself on write and to parse itself back on a cache hit.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of scalar kinds a cache field can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    Integer,
    Float,
    Boolean,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Rust type that can back a cache field.
///
/// `decode` returns the failure reason as text; the caller attaches the key
/// and raw value when it turns this into a `CoercionError`.
pub trait FieldValue: Sized {
    /// Kind recorded in the field schema.
    const KIND: ValueKind;

    /// Render the value as storable text.
    fn encode(&self) -> String;

    /// Parse a raw stored value.
    fn decode(raw: &str) -> Result<Self, String>;
}

impl FieldValue for String {
    const KIND: ValueKind = ValueKind::Text;

    fn encode(&self) -> String {
        self.clone()
    }

    fn decode(raw: &str) -> Result<Self, String> {
        Ok(raw.to_string())
    }
}

macro_rules! integer_field_value {
    ($($ty:ty),*) => {
        $(
            impl FieldValue for $ty {
                const KIND: ValueKind = ValueKind::Integer;

                fn encode(&self) -> String {
                    self.to_string()
                }

                fn decode(raw: &str) -> Result<Self, String> {
                    raw.trim().parse::<$ty>().map_err(|e| e.to_string())
                }
            }
        )*
    };
}

integer_field_value!(i32, i64, u32, u64, usize);

macro_rules! float_field_value {
    ($($ty:ty),*) => {
        $(
            impl FieldValue for $ty {
                const KIND: ValueKind = ValueKind::Float;

                fn encode(&self) -> String {
                    self.to_string()
                }

                fn decode(raw: &str) -> Result<Self, String> {
                    raw.trim().parse::<$ty>().map_err(|e| e.to_string())
                }
            }
        )*
    };
}

float_field_value!(f32, f64);

impl FieldValue for bool {
    const KIND: ValueKind = ValueKind::Boolean;

    fn encode(&self) -> String {
        self.to_string()
    }

    fn decode(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("true") || trimmed == "1" {
            Ok(true)
        } else if trimmed.eq_ignore_ascii_case("false") || trimmed == "0" {
            Ok(false)
        } else {
            Err(format!("expected true/false or 1/0, got {:?}", trimmed))
        }
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Property: finite floats survive the text codec bit-for-bit.
        #[test]
        fn prop_finite_float_text_is_lossless(value in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
            let decoded = f64::decode(&value.encode());
            prop_assert_eq!(decoded, Ok(value));
        }

        /// Property: integer decoding ignores surrounding whitespace.
        #[test]
        fn prop_integer_decode_trims(value in any::<i64>(), pad in "[ \t\n]{0,3}") {
            let raw = format!("{pad}{value}{pad}");
            prop_assert_eq!(i64::decode(&raw), Ok(value));
        }
    }
}
