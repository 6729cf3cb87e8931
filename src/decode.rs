//! Decoders for [`InstrumentedCache::get_with`](crate::cache::InstrumentedCache::get_with).
//!
//! Values are persisted as text; these turn the raw bytes back into typed values.

use std::num::{ParseFloatError, ParseIntError};
use std::str::Utf8Error;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
  #[error("not valid UTF-8: {0}")]
  Utf8(#[from] Utf8Error),

  #[error("not an integer: {0}")]
  Int(#[from] ParseIntError),

  #[error("not a float: {0}")]
  Float(#[from] ParseFloatError),
}

pub fn utf8(raw: &[u8]) -> Result<String, DecodeError> {
  Ok(std::str::from_utf8(raw)?.to_string())
}

pub fn int(raw: &[u8]) -> Result<i64, DecodeError> {
  Ok(std::str::from_utf8(raw)?.trim().parse()?)
}

pub fn float(raw: &[u8]) -> Result<f64, DecodeError> {
  Ok(std::str::from_utf8(raw)?.trim().parse()?)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_decoders() {
    assert_eq!(utf8(b"foo").unwrap(), "foo");
    assert_eq!(int(b"123").unwrap(), 123);
    assert_eq!(float(b"1.5").unwrap(), 1.5);
    assert_eq!(float(b"3").unwrap(), 3.0);
  }

  #[test]
  fn test_decoder_failures() {
    assert!(matches!(utf8(&[0xff]), Err(DecodeError::Utf8(_))));
    assert!(matches!(int(b"12a"), Err(DecodeError::Int(_))));
    assert!(matches!(float(b"x"), Err(DecodeError::Float(_))));
  }
}
