use tracing::{debug, warn};

use crate::error::ReferralError;
use crate::models::{
    Appointment, AppointmentStatus, CreateReferralRequest, RecordOutcomeRequest, Referral,
    ReferralStage, ReferralStatus, TestResult, VisitSequence,
};

pub const MAX_GESTATIONAL_WEEKS: u32 = 45;
pub const MAX_GESTATIONAL_DAYS: u32 = 6;
pub const DISPLAY_NUMBER_PREFIX: &str = "COR-";

/// What recording an outcome will write, computed before any store access.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomePlan {
    pub outcome: AppointmentStatus,
    /// Visit record to create, only for ATTENDED.
    pub visit: Option<PlannedVisit>,
    /// Sequence and slot of the follow-up appointment, if the pathway continues.
    pub next: Option<(VisitSequence, String)>,
    pub closes_referral: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedVisit {
    pub result: TestResult,
    pub teleconsultation: bool,
    pub notes: String,
    pub closing: bool,
    /// Specialty key for a REFERRED result.
    pub specialty: Option<String>,
}

pub fn validate_create_request(request: &CreateReferralRequest) -> Result<(), ReferralError> {
    let mut missing = Vec::new();
    if request.national_id.trim().is_empty() {
        missing.push("national_id");
    }
    if request.full_name.trim().is_empty() {
        missing.push("full_name");
    }
    if request.reason.trim().is_empty() {
        missing.push("reason");
    }
    if request.slot_id.trim().is_empty() {
        missing.push("slot_id");
    }
    if !missing.is_empty() {
        return Err(ReferralError::ValidationError(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    if request.gestational_weeks > MAX_GESTATIONAL_WEEKS {
        return Err(ReferralError::ValidationError(format!(
            "Gestational weeks must be between 0 and {}",
            MAX_GESTATIONAL_WEEKS
        )));
    }
    if request.gestational_days > MAX_GESTATIONAL_DAYS {
        return Err(ReferralError::ValidationError(format!(
            "Gestational days must be between 0 and {}",
            MAX_GESTATIONAL_DAYS
        )));
    }
    Ok(())
}

/// An outcome can only be recorded on a SCHEDULED appointment of an ACTIVE referral.
pub fn ensure_open(appointment: &Appointment, referral: &Referral) -> Result<(), ReferralError> {
    if referral.status == ReferralStatus::Closed {
        warn!("Referral {} is closed", referral.id);
        return Err(ReferralError::InvalidTransition(format!(
            "Referral {} is already closed",
            referral.id
        )));
    }
    if appointment.status != AppointmentStatus::Scheduled {
        warn!("Appointment {} is {}", appointment.id, appointment.status);
        return Err(ReferralError::InvalidTransition(format!(
            "Appointment {} is {} and no longer scheduled",
            appointment.id, appointment.status
        )));
    }
    Ok(())
}

/// Sequence of the appointment that follows `sequence` resolved as `outcome`.
/// `None` means the pathway is complete.
pub fn next_sequence(sequence: VisitSequence, outcome: AppointmentStatus) -> Option<VisitSequence> {
    match (outcome, sequence) {
        (AppointmentStatus::Attended, VisitSequence::First) => Some(VisitSequence::Second),
        (AppointmentStatus::Attended, VisitSequence::Second) => None,
        _ => Some(sequence),
    }
}

pub fn plan_outcome(
    appointment: &Appointment,
    request: &RecordOutcomeRequest,
) -> Result<OutcomePlan, ReferralError> {
    let outcome = request.outcome;
    if outcome == AppointmentStatus::Scheduled {
        return Err(ReferralError::ValidationError(
            "Outcome must be ATTENDED, MISSED or RESCHEDULED".to_string(),
        ));
    }

    let next_slot = request
        .next_slot_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());
    let next = match next_sequence(appointment.sequence, outcome) {
        Some(sequence) => {
            let slot_id = next_slot.ok_or_else(|| {
                ReferralError::ValidationError(format!(
                    "A slot for the next {} appointment is required",
                    sequence
                ))
            })?;
            Some((sequence, slot_id.to_string()))
        }
        None => {
            if next_slot.is_some() {
                debug!("Ignoring next slot on the closing visit of {}", appointment.referral_id);
            }
            None
        }
    };

    let visit = if outcome == AppointmentStatus::Attended {
        let result = request.result.ok_or_else(|| {
            ReferralError::ValidationError("A test result is required for an attended visit".to_string())
        })?;
        let specialty = match result {
            TestResult::Referred => Some(
                request
                    .specialty
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        ReferralError::ValidationError(
                            "A specialty is required when the result is REFERRED".to_string(),
                        )
                    })?
                    .to_string(),
            ),
            _ => None,
        };
        Some(PlannedVisit {
            result,
            teleconsultation: request.teleconsultation,
            notes: request.notes.trim().to_string(),
            closing: next.is_none(),
            specialty,
        })
    } else {
        if request.result == Some(TestResult::Referred) {
            return Err(ReferralError::ValidationError(
                "A specialist referral needs an attended visit".to_string(),
            ));
        }
        None
    };

    Ok(OutcomePlan {
        outcome,
        closes_referral: next.is_none(),
        visit,
        next,
    })
}

/// The most recently created SCHEDULED appointment of `referral_id`.
/// Ties on creation time go to the later row.
pub fn current_open_appointment<'a>(
    appointments: &'a [Appointment],
    referral_id: &str,
) -> Option<&'a Appointment> {
    appointments
        .iter()
        .enumerate()
        .filter(|(_, a)| a.referral_id == referral_id && a.status == AppointmentStatus::Scheduled)
        .max_by_key(|(row, a)| (a.created_at, *row))
        .map(|(_, a)| a)
}

pub fn derive_stage(referral: &Referral, appointments: &[Appointment]) -> ReferralStage {
    if referral.status == ReferralStatus::Closed {
        return ReferralStage::Closed;
    }
    match current_open_appointment(appointments, &referral.id) {
        Some(a) if a.sequence == VisitSequence::First => ReferralStage::AwaitingFirstVisit,
        Some(_) => ReferralStage::AwaitingSecondVisit,
        None => ReferralStage::New,
    }
}

/// Origin establishments may edit a referral until the patient has attended a visit.
pub fn can_modify(referral: &Referral, appointments: &[Appointment]) -> bool {
    referral.status == ReferralStatus::Active
        && !appointments
            .iter()
            .any(|a| a.referral_id == referral.id && a.status == AppointmentStatus::Attended)
}

/// `COR-000001` style number following the highest one in use.
pub fn next_display_number(referrals: &[Referral]) -> String {
    let highest = referrals
        .iter()
        .filter_map(|r| r.display_number.trim().strip_prefix(DISPLAY_NUMBER_PREFIX))
        .filter_map(|n| n.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("{}{:06}", DISPLAY_NUMBER_PREFIX, highest.saturating_add(1))
}
