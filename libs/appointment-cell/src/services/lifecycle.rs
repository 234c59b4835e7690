// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use shared_config::WithdrawalPolicy;

use crate::models::{AppointmentError, AppointmentStatus};

/// The appointment state machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentLifecycleService {
    withdrawal_policy: WithdrawalPolicy,
}

impl AppointmentLifecycleService {
    pub fn new(withdrawal_policy: WithdrawalPolicy) -> Self {
        Self { withdrawal_policy }
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: &AppointmentStatus,
        new_status: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidTransition {
                from: *current_status,
                to: *new_status,
            });
        }

        Ok(())
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Requested => vec![
                AppointmentStatus::Approved,
                AppointmentStatus::Rejected,
                AppointmentStatus::Withdrawn,
            ],
            AppointmentStatus::Approved => match self.withdrawal_policy {
                WithdrawalPolicy::RequestedOnly => vec![AppointmentStatus::Completed],
                WithdrawalPolicy::RequestedOrApproved => vec![
                    AppointmentStatus::Completed,
                    AppointmentStatus::Withdrawn,
                ],
            },
            // Terminal states - no transitions allowed
            AppointmentStatus::Rejected => vec![],
            AppointmentStatus::Withdrawn => vec![],
            AppointmentStatus::Completed => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn requested_fans_out() {
        let lifecycle = AppointmentLifecycleService::default();
        for next in [AppointmentStatus::Approved, AppointmentStatus::Rejected, AppointmentStatus::Withdrawn] {
            assert!(lifecycle.validate_status_transition(&AppointmentStatus::Requested, &next).is_ok());
        }
        assert_matches!(
            lifecycle.validate_status_transition(&AppointmentStatus::Requested, &AppointmentStatus::Completed),
            Err(AppointmentError::InvalidTransition { .. })
        );
    }

    #[test]
    fn terminal_states_never_move() {
        let lifecycle = AppointmentLifecycleService::new(WithdrawalPolicy::RequestedOrApproved);
        for from in [AppointmentStatus::Rejected, AppointmentStatus::Withdrawn, AppointmentStatus::Completed] {
            assert!(lifecycle.get_valid_transitions(&from).is_empty());
            for to in AppointmentStatus::ALL {
                assert!(lifecycle.validate_status_transition(&from, &to).is_err());
            }
        }
    }

    #[test]
    fn no_self_transitions() {
        let lifecycle = AppointmentLifecycleService::new(WithdrawalPolicy::RequestedOrApproved);
        for status in AppointmentStatus::ALL {
            assert!(!lifecycle.get_valid_transitions(&status).contains(&status));
        }
    }

    #[test]
    fn withdrawal_from_approved_follows_policy() {
        let strict = AppointmentLifecycleService::new(WithdrawalPolicy::RequestedOnly);
        assert_matches!(
            strict.validate_status_transition(&AppointmentStatus::Approved, &AppointmentStatus::Withdrawn),
            Err(AppointmentError::InvalidTransition {
                from: AppointmentStatus::Approved,
                to: AppointmentStatus::Withdrawn
            })
        );

        let lenient = AppointmentLifecycleService::new(WithdrawalPolicy::RequestedOrApproved);
        assert!(lenient
            .validate_status_transition(&AppointmentStatus::Approved, &AppointmentStatus::Withdrawn)
            .is_ok());
        assert!(lenient
            .validate_status_transition(&AppointmentStatus::Approved, &AppointmentStatus::Completed)
            .is_ok());
    }
}
