pub mod candidate;
pub mod clock;
pub mod conversation;
pub mod ids;
pub mod retrieval;
pub mod scope;
pub mod time_serde;
pub mod ttl;

mod error;

pub use candidate::{CandidateKind, CandidateRef, DocumentNode, ScoredCandidate, TaggedCandidate};
pub use clock::{Clock, SystemClock};
pub use conversation::{ConversationTurn, Role};
pub use error::{Error, Result};
pub use ids::{NotebookId, SessionKey, UserId};
pub use retrieval::{RetrievalRequest, RetrievalResult, RetrievalStage, RetrievalStrategy};
pub use scope::EngineScope;
