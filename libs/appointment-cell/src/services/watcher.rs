// libs/appointment-cell/src/services/watcher.rs
use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use shared_database::{Snapshot, Subscription};

use crate::models::{AppointmentError, AppointmentStatus};
use crate::services::counters::pending_delta;

/// A status change seen on a live appointment query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedTransition {
    pub appointment_id: String,
    /// `None` for appointments that appeared after the first snapshot.
    pub from: Option<AppointmentStatus>,
    pub to: AppointmentStatus,
    /// The change moved the appointment out of `requested`.
    pub released_pending: bool,
}

/// Remembers the last status of every appointment on a subscription.
///
/// Purely observational: the store is never written from here. The first
/// snapshot only seeds memory, and re-delivered snapshots report nothing.
#[derive(Debug, Default)]
pub struct StatusWatcher {
    last_seen: HashMap<String, AppointmentStatus>,
    seeded: bool,
}

impl StatusWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_seen(&self, appointment_id: &str) -> Option<AppointmentStatus> {
        self.last_seen.get(appointment_id).copied()
    }

    pub fn observe(&mut self, snapshot: &Snapshot) -> Vec<ObservedTransition> {
        let mut changes = Vec::new();

        for doc in &snapshot.documents {
            let status = match doc.get_str("status").map(str::parse::<AppointmentStatus>) {
                Some(Ok(status)) => status,
                _ => {
                    warn!("Skipping appointment {} with unreadable status", doc.id);
                    continue;
                }
            };

            let previous = self.last_seen.insert(doc.id.clone(), status);
            if !self.seeded || previous == Some(status) {
                continue;
            }

            changes.push(ObservedTransition {
                appointment_id: doc.id.clone(),
                from: previous,
                to: status,
                released_pending: previous.is_some() && pending_delta(previous, status) < 0,
            });
        }

        if !self.seeded {
            debug!("Status watcher seeded with {} appointments", self.last_seen.len());
            self.seeded = true;
        }

        changes
    }
}

/// A subscription paired with its watcher.
#[derive(Debug)]
pub struct AppointmentWatch {
    subscription: Subscription,
    watcher: StatusWatcher,
}

impl AppointmentWatch {
    pub fn new(subscription: Subscription) -> Self {
        Self {
            subscription,
            watcher: StatusWatcher::new(),
        }
    }

    pub fn watcher(&self) -> &StatusWatcher {
        &self.watcher
    }

    /// Next batch of transitions; the batch for the first snapshot is empty.
    /// `None` once the subscription has ended.
    pub async fn next_changes(&mut self) -> Option<Result<Vec<ObservedTransition>, AppointmentError>> {
        let snapshot = self.subscription.next().await?;
        Some(
            snapshot
                .map(|snapshot| self.watcher.observe(&snapshot))
                .map_err(AppointmentError::from),
        )
    }
}
