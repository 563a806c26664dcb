//! Synthesis session repository port.
//!
//! Persistence boundary for [`SynthesisSession`] aggregates. The dialogue
//! engine itself never persists anything; the submit-message handler loads a
//! session, runs a turn and saves the result through this port.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, SessionId};
use crate::domain::synthesis::SynthesisSession;

/// Repository port for SynthesisSession persistence.
#[async_trait]
pub trait SynthesisSessionRepository: Send + Sync {
    /// Insert or replace a session.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn save(&self, session: &SynthesisSession) -> Result<(), DomainError>;

    /// Find a session by its ID.
    ///
    /// Returns `None` if not found.
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<SynthesisSession>, DomainError>;
}
