//! Session admission against a shared presence roster.
//!
//! A display name may hold at most `max_sessions` live sessions, compared
//! case-insensitively. Admission is check-then-register and the two steps
//! are not atomic: clients that check concurrently can all see room and all
//! register, leaving more holders than the cap. This is tolerated; the
//! overshoot is detected after registering and logged, never rolled back.

use std::cell::RefCell;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use tracing::{debug, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::models::presence::normalize_key;
use crate::models::PresenceRecord;
use crate::remote::RemoteResult;

/// Shared ephemeral roster of live sessions.
pub trait PresenceRoster {
    fn snapshot(&self) -> LocalBoxFuture<'_, RemoteResult<Vec<PresenceRecord>>>;

    fn track(&self, record: PresenceRecord) -> LocalBoxFuture<'_, RemoteResult<()>>;

    fn leave(&self, session_id: &str) -> LocalBoxFuture<'_, RemoteResult<()>>;
}

/// In-process roster. Clones share the same sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryRoster {
    sessions: Rc<RefCell<Vec<PresenceRecord>>>,
}

impl MemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions(&self) -> Vec<PresenceRecord> {
        self.sessions.borrow().clone()
    }
}

impl PresenceRoster for MemoryRoster {
    fn snapshot(&self) -> LocalBoxFuture<'_, RemoteResult<Vec<PresenceRecord>>> {
        async move {
            tokio::task::yield_now().await;
            Ok(self.sessions.borrow().clone())
        }
        .boxed_local()
    }

    fn track(&self, record: PresenceRecord) -> LocalBoxFuture<'_, RemoteResult<()>> {
        async move {
            tokio::task::yield_now().await;
            let mut sessions = self.sessions.borrow_mut();
            sessions.retain(|s| s.session_id != record.session_id);
            sessions.push(record);
            Ok(())
        }
        .boxed_local()
    }

    fn leave(&self, session_id: &str) -> LocalBoxFuture<'_, RemoteResult<()>> {
        let session_id = session_id.to_string();
        async move {
            tokio::task::yield_now().await;
            self.sessions.borrow_mut().retain(|s| s.session_id != session_id);
            Ok(())
        }
        .boxed_local()
    }
}

/// Where an admission attempt stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionState {
    Pending,
    /// Roster counted; there was room.
    Checked { holders: usize },
    Admitted(PresenceRecord),
    Rejected { holders: usize },
}

impl AdmissionState {
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionState::Admitted(_))
    }
}

pub struct PresenceArbiter {
    roster: Rc<dyn PresenceRoster>,
    max_sessions: usize,
}

impl PresenceArbiter {
    pub fn new(roster: Rc<dyn PresenceRoster>, max_sessions: usize) -> Self {
        Self { roster, max_sessions }
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Live sessions holding `name`.
    pub async fn holders(&self, name: &str) -> CoreResult<usize> {
        let sessions = self.roster.snapshot().await?;
        Ok(sessions.iter().filter(|s| s.matches(name)).count())
    }

    /// Pending -> Checked or Rejected.
    pub async fn check(&self, name: &str) -> CoreResult<AdmissionState> {
        if normalize_key(name).is_empty() {
            return Err(CoreError::InvalidInput("display name is empty".to_string()));
        }
        let holders = self.holders(name).await?;
        if holders >= self.max_sessions {
            info!(name, holders, "session cap reached, rejecting");
            return Ok(AdmissionState::Rejected { holders });
        }
        debug!(name, holders, "room on roster");
        Ok(AdmissionState::Checked { holders })
    }

    /// Checked -> Admitted. Any other state is returned unchanged, except
    /// Pending which must be checked first.
    pub async fn register(&self, name: &str, state: AdmissionState) -> CoreResult<AdmissionState> {
        match state {
            AdmissionState::Checked { .. } => {}
            AdmissionState::Pending => {
                return Err(CoreError::InvalidInput(
                    "admission must be checked before registering".to_string(),
                ))
            }
            other => return Ok(other),
        }

        let record = PresenceRecord::new(name.trim(), uuid::Uuid::new_v4().to_string());
        self.roster.track(record.clone()).await?;

        let holders = self.holders(name).await?;
        if holders > self.max_sessions {
            warn!(
                name,
                holders,
                max = self.max_sessions,
                "concurrent admissions exceeded session cap"
            );
        }
        info!(name, session_id = %record.session_id, "session admitted");
        Ok(AdmissionState::Admitted(record))
    }

    /// Check and register in one go.
    pub async fn admit(&self, name: &str) -> CoreResult<AdmissionState> {
        let checked = self.check(name).await?;
        self.register(name, checked).await
    }

    pub async fn release(&self, record: &PresenceRecord) -> CoreResult<()> {
        self.roster.leave(&record.session_id).await?;
        debug!(name = %record.session_key, "session released");
        Ok(())
    }
}
