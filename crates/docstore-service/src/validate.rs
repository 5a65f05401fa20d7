//! Required-field checks run before any storage access.

use docstore_core::{Error, Result, document::NewDocument};

pub fn require(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::Validation(format!("{field} is required")));
  }
  Ok(())
}

pub fn require_version(version: u32) -> Result<()> {
  if version == 0 {
    return Err(Error::Validation("version must be a positive integer".into()));
  }
  Ok(())
}

pub fn new_document(doc: &NewDocument) -> Result<()> {
  require("document_id", &doc.document_id)?;
  require("type", &doc.doc_type)?;
  require("namespace", &doc.namespace)?;
  require("body", &doc.body)?;
  for tag in &doc.tags {
    require("tag", tag)?;
  }
  Ok(())
}
