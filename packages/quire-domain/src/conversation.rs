use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	User,
	Assistant,
}
impl Role {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::User => "user",
			Self::Assistant => "assistant",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
	role: Role,
	content: String,
	#[serde(with = "crate::time_serde")]
	created_at: OffsetDateTime,
}
impl ConversationTurn {
	pub fn new(role: Role, content: impl Into<String>, created_at: OffsetDateTime) -> Self {
		Self { role, content: content.into(), created_at }
	}

	pub fn user(content: impl Into<String>, created_at: OffsetDateTime) -> Self {
		Self::new(Role::User, content, created_at)
	}

	pub fn assistant(content: impl Into<String>, created_at: OffsetDateTime) -> Self {
		Self::new(Role::Assistant, content, created_at)
	}

	pub fn role(&self) -> Role {
		self.role
	}

	pub fn content(&self) -> &str {
		&self.content
	}

	pub fn created_at(&self) -> OffsetDateTime {
		self.created_at
	}
}
