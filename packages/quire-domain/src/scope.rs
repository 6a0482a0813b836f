use std::{
	collections::BTreeSet,
	fmt::{Display, Formatter, Result as FmtResult},
};

use serde::{Deserialize, Serialize};

use crate::NotebookId;

/// The notebook filter an engine is built for.
///
/// `None` means no notebook is selected and the engine answers without retrieval. The set is
/// ordered, so `[a, b]` and `[b, a]` describe the same scope and never force a rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineScope(Option<BTreeSet<NotebookId>>);
impl EngineScope {
	pub fn none() -> Self {
		Self(None)
	}

	pub fn notebook(notebook_id: NotebookId) -> Self {
		Self(Some(BTreeSet::from([notebook_id])))
	}

	/// An empty iterator yields [`EngineScope::none`].
	pub fn from_notebooks<I>(notebooks: I) -> Self
	where
		I: IntoIterator<Item = NotebookId>,
	{
		let set = notebooks.into_iter().collect::<BTreeSet<_>>();

		if set.is_empty() { Self(None) } else { Self(Some(set)) }
	}

	pub fn is_none(&self) -> bool {
		self.0.is_none()
	}

	pub fn notebooks(&self) -> Vec<NotebookId> {
		self.0.as_ref().map(|set| set.iter().cloned().collect()).unwrap_or_default()
	}

	pub fn contains(&self, notebook_id: &NotebookId) -> bool {
		self.0.as_ref().map(|set| set.contains(notebook_id)).unwrap_or(false)
	}

	/// The notebook when the filter names exactly one.
	pub fn single_notebook(&self) -> Option<&NotebookId> {
		match self.0.as_ref() {
			Some(set) if set.len() == 1 => set.iter().next(),
			_ => None,
		}
	}
}
impl Display for EngineScope {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		match self.0.as_ref() {
			None => f.write_str("none"),
			Some(set) => {
				f.write_str("[")?;

				for (idx, notebook_id) in set.iter().enumerate() {
					if idx > 0 {
						f.write_str(",")?;
					}

					f.write_str(notebook_id.as_str())?;
				}

				f.write_str("]")
			},
		}
	}
}
