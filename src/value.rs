//! Values accepted by [`InstrumentedCache::store`](crate::cache::InstrumentedCache::store).

use std::fmt;

use crate::error::{Error, Result};

/// A value written by a caller.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
  Text(String),
  Bytes(Vec<u8>),
  Int(i64),
  Float(f64),
}

impl StoredValue {
  /// Infer the kind of a command-line literal: integer, then float, else text.
  pub fn parse_literal(input: &str) -> Self {
    if let Ok(n) = input.parse::<i64>() {
      return Self::Int(n);
    }
    match input.parse::<f64>() {
      Ok(f) if f.is_finite() => Self::Float(f),
      _ => Self::Text(input.to_string()),
    }
  }

  /// Text persisted in the store. Blobs must be valid UTF-8.
  pub fn to_text(&self) -> Result<String> {
    match self {
      Self::Text(s) => Ok(s.clone()),
      Self::Bytes(b) => String::from_utf8(b.clone())
        .map_err(|e| Error::InvalidValue(format!("blob is not valid UTF-8: {}", e))),
      Self::Int(n) => Ok(n.to_string()),
      Self::Float(f) => Ok(format_float(*f)),
    }
  }

  /// Literal form used when recording call arguments: `'foo'`, `b'foo'`, `123`, `1.5`.
  pub fn literal(&self) -> String {
    match self {
      Self::Text(s) => quote(s.chars()),
      Self::Bytes(b) => {
        let mut out = String::from("b");
        out.push_str(&quote_bytes(b));
        out
      }
      Self::Int(n) => n.to_string(),
      Self::Float(f) => format_float(*f),
    }
  }
}

impl fmt::Display for StoredValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Text(s) => f.write_str(s),
      Self::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
      Self::Int(n) => write!(f, "{}", n),
      Self::Float(v) => f.write_str(&format_float(*v)),
    }
  }
}

impl From<&str> for StoredValue {
  fn from(s: &str) -> Self {
    Self::Text(s.to_string())
  }
}

impl From<String> for StoredValue {
  fn from(s: String) -> Self {
    Self::Text(s)
  }
}

impl From<&[u8]> for StoredValue {
  fn from(b: &[u8]) -> Self {
    Self::Bytes(b.to_vec())
  }
}

impl From<Vec<u8>> for StoredValue {
  fn from(b: Vec<u8>) -> Self {
    Self::Bytes(b)
  }
}

impl From<i64> for StoredValue {
  fn from(n: i64) -> Self {
    Self::Int(n)
  }
}

impl From<i32> for StoredValue {
  fn from(n: i32) -> Self {
    Self::Int(n.into())
  }
}

impl From<f64> for StoredValue {
  fn from(f: f64) -> Self {
    Self::Float(f)
  }
}

/// Floats always carry a fractional part so they read back as floats.
///
/// Exponents are written with a sign and at least two digits (`1e+20`,
/// `1e-07`), and NaN as `nan`.
fn format_float(f: f64) -> String {
  if f.is_nan() {
    return "nan".to_string();
  }

  // Debug keeps the shortest round-tripping form and prints `1.0` for whole numbers
  let shortest = format!("{:?}", f);
  let Some((mantissa, exponent)) = shortest.split_once('e') else {
    return shortest;
  };

  let (sign, digits) = match exponent.strip_prefix('-') {
    Some(digits) => ('-', digits),
    None => ('+', exponent),
  };
  format!("{}e{}{:0>2}", mantissa, sign, digits)
}

/// Render a tuple of literals: `()`, `('a',)`, `('a', 'b')`.
pub fn tuple_literal<I, S>(items: I) -> String
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  let items: Vec<String> = items
    .into_iter()
    .map(|item| item.as_ref().to_string())
    .collect();
  match items.as_slice() {
    [] => "()".to_string(),
    [only] => format!("({},)", only),
    many => format!("({})", many.join(", ")),
  }
}

/// Quote text, preferring single quotes unless the text contains one and no double quote.
pub(crate) fn quote(chars: impl Iterator<Item = char> + Clone) -> String {
  let has_single = chars.clone().any(|c| c == '\'');
  let has_double = chars.clone().any(|c| c == '"');
  let delim = if has_single && !has_double { '"' } else { '\'' };

  let mut out = String::new();
  out.push(delim);
  for c in chars {
    match c {
      '\\' => out.push_str("\\\\"),
      '\n' => out.push_str("\\n"),
      '\r' => out.push_str("\\r"),
      '\t' => out.push_str("\\t"),
      c if c == delim => {
        out.push('\\');
        out.push(c);
      }
      c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
      c => out.push(c),
    }
  }
  out.push(delim);
  out
}

fn quote_bytes(bytes: &[u8]) -> String {
  let has_single = bytes.contains(&b'\'');
  let has_double = bytes.contains(&b'"');
  let delim = if has_single && !has_double { b'"' } else { b'\'' };

  let mut out = String::new();
  out.push(delim as char);
  for &b in bytes {
    match b {
      b'\\' => out.push_str("\\\\"),
      b'\n' => out.push_str("\\n"),
      b'\r' => out.push_str("\\r"),
      b'\t' => out.push_str("\\t"),
      b if b == delim => {
        out.push('\\');
        out.push(b as char);
      }
      0x20..=0x7e => out.push(b as char),
      b => out.push_str(&format!("\\x{:02x}", b)),
    }
  }
  out.push(delim as char);
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_literal() {
    assert_eq!(StoredValue::parse_literal("123"), StoredValue::Int(123));
    assert_eq!(StoredValue::parse_literal("-7"), StoredValue::Int(-7));
    assert_eq!(StoredValue::parse_literal("1.5"), StoredValue::Float(1.5));
    assert_eq!(
      StoredValue::parse_literal("foo"),
      StoredValue::Text("foo".into())
    );
    // Not finite, keep as text
    assert_eq!(
      StoredValue::parse_literal("inf"),
      StoredValue::Text("inf".into())
    );
  }

  #[test]
  fn test_to_text() {
    assert_eq!(StoredValue::from("foo").to_text().unwrap(), "foo");
    assert_eq!(StoredValue::from(b"bar".to_vec()).to_text().unwrap(), "bar");
    assert_eq!(StoredValue::from(123).to_text().unwrap(), "123");
    assert_eq!(StoredValue::from(2.0).to_text().unwrap(), "2.0");
    assert_eq!(StoredValue::from(0.1).to_text().unwrap(), "0.1");
  }

  #[test]
  fn test_invalid_utf8_blob_is_rejected() {
    let value = StoredValue::from(vec![0xff, 0xfe]);
    assert!(matches!(value.to_text(), Err(Error::InvalidValue(_))));
  }

  #[test]
  fn test_literal() {
    assert_eq!(StoredValue::from("foo").literal(), "'foo'");
    assert_eq!(StoredValue::from("it's").literal(), "\"it's\"");
    assert_eq!(StoredValue::from("a\nb").literal(), "'a\\nb'");
    assert_eq!(StoredValue::from(b"bar".to_vec()).literal(), "b'bar'");
    assert_eq!(StoredValue::from(vec![0u8, 0x41]).literal(), "b'\\x00A'");
    assert_eq!(StoredValue::from(123).literal(), "123");
    assert_eq!(StoredValue::from(3.25).literal(), "3.25");
  }

  #[test]
  fn test_float_exponent_form() {
    assert_eq!(StoredValue::from(1e20).literal(), "1e+20");
    assert_eq!(StoredValue::from(1e-7).literal(), "1e-07");
    assert_eq!(StoredValue::from(-1.5e-10).literal(), "-1.5e-10");
    assert_eq!(StoredValue::from(f64::NAN).literal(), "nan");

    for f in [1e20, 1e-7, -1.5e-10] {
      let text = StoredValue::from(f).to_text().unwrap();
      assert_eq!(text.parse::<f64>().unwrap(), f);
    }
  }

  #[test]
  fn test_tuple_literal() {
    assert_eq!(tuple_literal(Vec::<String>::new()), "()");
    assert_eq!(tuple_literal(["'foo'"]), "('foo',)");
    assert_eq!(tuple_literal(["'a'", "2"]), "('a', 2)");
  }
}
