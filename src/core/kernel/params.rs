use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use url::form_urlencoded::byte_serialize;

/// A single request parameter value
///
/// Every variant has exactly one textual form, so the same value always
/// encodes to the same bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F64(f64),
    Decimal(Decimal),
    Bool(bool),
    /// Encoded as a JSON array literal, e.g. `["BTCUSDT","ETHUSDT"]`
    List(Vec<String>),
    /// Any JSON-marshalable record, encoded as compact JSON
    Json(serde_json::Value),
}

impl ParamValue {
    /// Wrap any serializable record as a JSON parameter
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::Json)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::I32(v) => write!(f, "{}", v),
            Self::I64(v) => write!(f, "{}", v),
            Self::U8(v) => write!(f, "{}", v),
            Self::U16(v) => write!(f, "{}", v),
            Self::U32(v) => write!(f, "{}", v),
            Self::U64(v) => write!(f, "{}", v),
            // Display for f64 is the shortest round-trip form and never uses exponents
            Self::F64(v) => write!(f, "{}", v),
            Self::Decimal(v) => write!(f, "{}", v.normalize()),
            Self::Bool(v) => f.write_str(if *v { "true" } else { "false" }),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", serde_json::Value::String(item.clone()))?;
                }
                f.write_str("]")
            }
            Self::Json(value) => write!(f, "{}", value),
        }
    }
}

macro_rules! impl_from_param {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value.into())
                }
            }
        )*
    };
}

impl_from_param! {
    String => Str,
    &str => Str,
    &String => Str,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f64 => F64,
    Decimal => Decimal,
    bool => Bool,
    Vec<String> => List,
    serde_json::Value => Json,
}

impl From<&[&str]> for ParamValue {
    fn from(items: &[&str]) -> Self {
        Self::List(items.iter().map(|s| (*s).to_string()).collect())
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(items: Vec<&str>) -> Self {
        Self::from(items.as_slice())
    }
}

/// Insertion-ordered parameter mapping
///
/// Keys keep the position of their first insertion; setting an existing key
/// replaces its value in place. The encoded form is what gets signed, so the
/// order here is the order the exchange re-signs with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
    index: HashMap<String, usize>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter; the last write wins, the first position is kept
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        if let Some(&position) = self.index.get(&key) {
            self.entries[position].1 = value;
        } else {
            self.index.insert(key.clone(), self.entries.len());
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.index.get(key).map(|&position| &self.entries[position].1)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Encode as `application/x-www-form-urlencoded` in insertion order
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push('&');
            }
            out.extend(byte_serialize(key.as_bytes()));
            out.push('=');
            out.extend(byte_serialize(value.to_string().as_bytes()));
        }
        out
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.set(key, value);
        }
        params
    }
}
