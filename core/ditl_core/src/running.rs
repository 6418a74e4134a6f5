use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::activity::{whole_minutes, Activity, ActivityUpdate};
use crate::error::StoreError;
use crate::store::ActivityStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunningState {
    Idle,
    Running { activity: Activity },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started(Activity),
    /// Something was already running; it is left untouched.
    Rejected(Activity),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndOutcome {
    Ended(Activity),
    NotRunning,
}

pub struct RunningActivityGuard<'a> {
    store: &'a mut ActivityStore,
}

impl<'a> RunningActivityGuard<'a> {
    pub fn new(store: &'a mut ActivityStore) -> Self {
        Self { store }
    }

    pub fn state(&self) -> Result<RunningState, StoreError> {
        Ok(match self.store.current()? {
            Some(activity) => RunningState::Running { activity },
            None => RunningState::Idle,
        })
    }

    pub fn start(&mut self, title: &str, now: OffsetDateTime) -> Result<StartOutcome, StoreError> {
        if let Some(running) = self.store.current()? {
            warn!(id = running.id, "start rejected: an activity is already running");
            return Ok(StartOutcome::Rejected(running));
        }

        let id = match self.store.create(title, now, None, None) {
            Ok(id) => id,
            Err(StoreError::AlreadyRunning(id)) => {
                let running = self.store.read(id)?.ok_or(StoreError::NotFound(id))?;
                return Ok(StartOutcome::Rejected(running));
            }
            Err(err) => return Err(err),
        };
        let started = self.store.read(id)?.ok_or(StoreError::NotFound(id))?;
        info!(id, title = %started.title, "activity started");
        Ok(StartOutcome::Started(started))
    }

    /// Closes the running activity at `now`. A start in the future (clock
    /// skew) is closed at its own start with zero minutes.
    pub fn end(&mut self, now: OffsetDateTime) -> Result<EndOutcome, StoreError> {
        let Some(running) = self.store.current()? else {
            return Ok(EndOutcome::NotRunning);
        };

        let end = now.max(running.start_time);
        let minutes = whole_minutes(running.start_time, end);
        self.store.update(
            running.id,
            &ActivityUpdate {
                end_time: Some(end),
                duration_minutes: Some(minutes),
                ..Default::default()
            },
        )?;

        let ended = self
            .store
            .read(running.id)?
            .ok_or(StoreError::NotFound(running.id))?;
        info!(id = ended.id, minutes, "activity ended");
        Ok(EndOutcome::Ended(ended))
    }
}
