use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotebookId(String);
impl NotebookId {
	pub fn parse(raw: &str) -> Result<Self> {
		non_blank("notebook_id", raw).map(Self)
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Display for NotebookId {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_str(&self.0)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);
impl UserId {
	pub fn parse(raw: &str) -> Result<Self> {
		non_blank("user_id", raw).map(Self)
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Display for UserId {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Identifies one conversation thread: a user talking to a notebook.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
	pub user_id: UserId,
	pub notebook_id: NotebookId,
}
impl SessionKey {
	pub fn new(user_id: UserId, notebook_id: NotebookId) -> Self {
		Self { user_id, notebook_id }
	}

	pub fn parse(user_id: &str, notebook_id: &str) -> Result<Self> {
		Ok(Self { user_id: UserId::parse(user_id)?, notebook_id: NotebookId::parse(notebook_id)? })
	}
}
impl Display for SessionKey {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		write!(f, "{}:{}", self.user_id, self.notebook_id)
	}
}

fn non_blank(field: &'static str, raw: &str) -> Result<String> {
	let trimmed = raw.trim();

	if trimmed.is_empty() {
		return Err(Error::InvalidArgument { field, message: "must be non-empty.".to_string() });
	}

	Ok(trimmed.to_string())
}
