//! The most recently issued upload ticket per lesson.
//!
//! Issuing a ticket supersedes any earlier one for the same lesson, so only
//! the latest object key can ever be finalized. A successful finalize consumes
//! the ticket.

use chrono::{DateTime, Duration, Utc};
use lessoncast_core::LessonId;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
struct IssuedTicket {
    object_key: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TicketCheckError {
    #[error("No upload ticket is outstanding for this lesson")]
    Missing,

    #[error("objectKey does not match the latest upload ticket")]
    Mismatch,

    #[error("Upload ticket has expired")]
    Expired,
}

#[derive(Debug, Default)]
pub struct TicketRegistry {
    tickets: Mutex<HashMap<LessonId, IssuedTicket>>,
}

impl TicketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `object_key` as the only finalizable key for the lesson.
    pub fn issue(&self, lesson_id: LessonId, object_key: &str, ttl: Duration) -> DateTime<Utc> {
        let expires_at = Utc::now() + ttl;
        let previous = self.lock().insert(
            lesson_id,
            IssuedTicket {
                object_key: object_key.to_string(),
                expires_at,
            },
        );
        if let Some(previous) = previous {
            tracing::debug!(
                lesson_id = lesson_id,
                superseded_key = %previous.object_key,
                "Upload ticket superseded"
            );
        }
        expires_at
    }

    pub fn check(&self, lesson_id: LessonId, object_key: &str) -> Result<(), TicketCheckError> {
        self.check_at(lesson_id, object_key, Utc::now())
    }

    pub fn check_at(
        &self,
        lesson_id: LessonId,
        object_key: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TicketCheckError> {
        let tickets = self.lock();
        let ticket = tickets.get(&lesson_id).ok_or(TicketCheckError::Missing)?;
        if ticket.object_key != object_key {
            return Err(TicketCheckError::Mismatch);
        }
        if ticket.expires_at <= now {
            return Err(TicketCheckError::Expired);
        }
        Ok(())
    }

    /// Remove the ticket if it still names `object_key`.
    pub fn consume(&self, lesson_id: LessonId, object_key: &str) -> bool {
        let mut tickets = self.lock();
        match tickets.get(&lesson_id) {
            Some(ticket) if ticket.object_key == object_key => {
                tickets.remove(&lesson_id);
                true
            }
            _ => false,
        }
    }

    pub fn invalidate(&self, lesson_id: LessonId) {
        self.lock().remove(&lesson_id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<LessonId, IssuedTicket>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.tickets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
