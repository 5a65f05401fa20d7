//! Keyset pagination.
//!
//! A page token is the last-seen row's sort key, serialised as JSON and then
//! base64url-encoded. Tokens are opaque to callers; each listing defines its
//! own cursor type.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD as B64};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{Error, Result};

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 500;

/// A page request: where to resume, and how many rows to return.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
  pub token: Option<String>,
  /// `0` selects [`DEFAULT_PAGE_SIZE`]; larger values are capped at
  /// [`MAX_PAGE_SIZE`].
  pub size:  usize,
}

impl PageRequest {
  pub fn new(token: Option<String>, size: Option<usize>) -> Self {
    Self { token: token.filter(|t| !t.is_empty()), size: size.unwrap_or(0) }
  }

  pub fn first(size: usize) -> Self { Self { token: None, size } }

  pub fn effective_size(&self) -> usize {
    match self.size {
      0 => DEFAULT_PAGE_SIZE,
      n => n.min(MAX_PAGE_SIZE),
    }
  }

  /// Decode the resume cursor, if any.
  pub fn cursor<C: DeserializeOwned>(&self) -> Result<Option<C>> {
    self.token.as_deref().map(decode_cursor).transpose()
  }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
  pub items:           Vec<T>,
  /// Rows matching the filters across all pages.
  pub total_count:     u64,
  /// `None` on the last page.
  pub next_page_token: Option<String>,
}

impl<T> Page<T> {
  pub fn empty() -> Self { Self { items: Vec::new(), total_count: 0, next_page_token: None } }

  pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
    Page {
      items:           self.items.into_iter().map(f).collect(),
      total_count:     self.total_count,
      next_page_token: self.next_page_token,
    }
  }
}

pub fn encode_cursor<C: Serialize>(cursor: &C) -> Result<String> {
  Ok(B64.encode(serde_json::to_vec(cursor)?))
}

pub fn decode_cursor<C: DeserializeOwned>(token: &str) -> Result<C> {
  let raw = B64.decode(token).map_err(|_| Error::InvalidPageToken)?;
  serde_json::from_slice(&raw).map_err(|_| Error::InvalidPageToken)
}

#[cfg(test)]
mod tests {
  use serde::{Deserialize, Serialize};

  use super::*;

  #[derive(Debug, PartialEq, Serialize, Deserialize)]
  struct Cursor {
    created_at: String,
    version:    u32,
  }

  #[test]
  fn cursor_survives_token_encoding() {
    let c = Cursor { created_at: "2024-05-01T10:00:00.000000Z".into(), version: 3 };
    let token = encode_cursor(&c).unwrap();
    let req = PageRequest::new(Some(token), Some(10));
    assert_eq!(req.cursor::<Cursor>().unwrap(), Some(c));
  }

  #[test]
  fn garbage_token_is_rejected() {
    let req = PageRequest::new(Some("not*base64!".into()), None);
    assert!(matches!(req.cursor::<Cursor>(), Err(Error::InvalidPageToken)));

    let wrong_shape = B64.encode(b"[1,2,3]");
    let req = PageRequest::new(Some(wrong_shape), None);
    assert!(matches!(req.cursor::<Cursor>(), Err(Error::InvalidPageToken)));
  }

  #[test]
  fn empty_token_means_first_page() {
    let req = PageRequest::new(Some(String::new()), None);
    assert!(req.token.is_none());
    assert_eq!(req.cursor::<Cursor>().unwrap(), None);
  }

  #[test]
  fn page_size_defaults_and_caps() {
    assert_eq!(PageRequest::first(0).effective_size(), DEFAULT_PAGE_SIZE);
    assert_eq!(PageRequest::first(7).effective_size(), 7);
    assert_eq!(PageRequest::first(10_000).effective_size(), MAX_PAGE_SIZE);
  }
}
