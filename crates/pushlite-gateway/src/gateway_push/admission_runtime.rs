//! Admission counters for the push gateway status report.
use std::collections::VecDeque;

use serde::Serialize;

const RECENT_REJECTION_CODES_LIMIT: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PushAdmissionRejection {
    Auth,
    Validation(&'static str),
    Capacity(&'static str),
}

impl PushAdmissionRejection {
    fn code(self) -> &'static str {
        match self {
            Self::Auth => "invalid_token",
            Self::Validation(code) | Self::Capacity(code) => code,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(super) struct PushAdmissionRuntimeState {
    accepted_requests: u64,
    auth_failures: u64,
    validation_failures: u64,
    capacity_rejections: u64,
    recent_rejection_codes: VecDeque<&'static str>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(super) struct PushAdmissionStatusReport {
    pub(super) accepted_requests: u64,
    pub(super) auth_failures: u64,
    pub(super) validation_failures: u64,
    pub(super) capacity_rejections: u64,
    pub(super) recent_rejection_codes: Vec<&'static str>,
}

impl PushAdmissionRuntimeState {
    pub(super) fn record_accepted(&mut self) {
        self.accepted_requests = self.accepted_requests.saturating_add(1);
    }

    pub(super) fn record_rejection(&mut self, rejection: PushAdmissionRejection) {
        let counter = match rejection {
            PushAdmissionRejection::Auth => &mut self.auth_failures,
            PushAdmissionRejection::Validation(_) => &mut self.validation_failures,
            PushAdmissionRejection::Capacity(_) => &mut self.capacity_rejections,
        };
        *counter = counter.saturating_add(1);
        if self.recent_rejection_codes.len() == RECENT_REJECTION_CODES_LIMIT {
            self.recent_rejection_codes.pop_front();
        }
        self.recent_rejection_codes.push_back(rejection.code());
    }

    pub(super) fn report(&self) -> PushAdmissionStatusReport {
        PushAdmissionStatusReport {
            accepted_requests: self.accepted_requests,
            auth_failures: self.auth_failures,
            validation_failures: self.validation_failures,
            capacity_rejections: self.capacity_rejections,
            recent_rejection_codes: self.recent_rejection_codes.iter().copied().collect(),
        }
    }
}
