use std::cmp::Reverse;
use std::sync::Arc;

use tracing::debug;

use patient_cell::models::Patient;
use shared_database::{typed, RecordStore, Sheet};
use shared_models::{
    establishment::{establishment_name, same_establishment},
    Establishment, Session,
};

use crate::error::ReferralError;
use crate::models::{
    Appointment, HistoryEntry, InboxEntry, OpenAppointment, Referral, ReferralStatus,
};
use crate::services::lifecycle;

/// Read-only referral listings for the hospital and the originating establishments.
pub struct InboxService {
    store: Arc<dyn RecordStore>,
}

impl InboxService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Active referrals with their open appointment, soonest first.
    pub async fn hospital_inbox(&self) -> Result<Vec<InboxEntry>, ReferralError> {
        let store = self.store.as_ref();
        let (referrals, appointments, patients, establishments) = futures::try_join!(
            typed::fetch_all::<Referral>(store, Sheet::Referrals),
            typed::fetch_all::<Appointment>(store, Sheet::Appointments),
            typed::fetch_all::<Patient>(store, Sheet::Patients),
            typed::fetch_all::<Establishment>(store, Sheet::Establishments),
        )?;

        let mut entries: Vec<InboxEntry> = referrals
            .into_iter()
            .filter(|r| r.status == ReferralStatus::Active)
            .map(|referral| {
                let patient = patients.iter().find(|p| p.id == referral.patient_id);
                InboxEntry {
                    current_appointment: lifecycle::current_open_appointment(&appointments, &referral.id)
                        .map(OpenAppointment::from),
                    patient_name: patient.map(|p| p.full_name.clone()).unwrap_or_default(),
                    patient_national_id: patient.map(|p| p.national_id.clone()).unwrap_or_default(),
                    origin_establishment_name: establishment_name(
                        &establishments,
                        &referral.origin_establishment_id,
                    )
                    .map(str::to_string),
                    referral_id: referral.id,
                    display_number: referral.display_number,
                    origin_establishment_id: referral.origin_establishment_id,
                    reason: referral.reason,
                }
            })
            .collect();

        // Referrals without an open appointment go last.
        entries.sort_by_key(|e| {
            (
                e.current_appointment.is_none(),
                e.current_appointment.as_ref().map(|a| (a.date, a.time)),
            )
        });
        debug!("Hospital inbox has {} active referral(s)", entries.len());
        Ok(entries)
    }

    /// Every referral sent by the session's establishment, newest first.
    pub async fn establishment_history(&self, session: &Session) -> Result<Vec<HistoryEntry>, ReferralError> {
        let store = self.store.as_ref();
        let (referrals, appointments, patients) = futures::try_join!(
            typed::fetch_all::<Referral>(store, Sheet::Referrals),
            typed::fetch_all::<Appointment>(store, Sheet::Appointments),
            typed::fetch_all::<Patient>(store, Sheet::Patients),
        )?;

        let mut entries: Vec<HistoryEntry> = referrals
            .into_iter()
            .filter(|r| same_establishment(&r.origin_establishment_id, &session.establishment_id))
            .map(|referral| {
                let patient = patients.iter().find(|p| p.id == referral.patient_id);
                HistoryEntry {
                    current_appointment: lifecycle::current_open_appointment(&appointments, &referral.id)
                        .map(OpenAppointment::from),
                    stage: lifecycle::derive_stage(&referral, &appointments),
                    can_modify: lifecycle::can_modify(&referral, &appointments),
                    patient_name: patient.map(|p| p.full_name.clone()).unwrap_or_default(),
                    patient_national_id: patient.map(|p| p.national_id.clone()).unwrap_or_default(),
                    referral_id: referral.id,
                    display_number: referral.display_number,
                    registered_on: referral.registered_on,
                    reason: referral.reason,
                    status: referral.status,
                }
            })
            .collect();

        entries.sort_by_key(|e| Reverse((e.registered_on, e.display_number.clone())));
        debug!(
            "Establishment {} has {} referral(s)",
            session.establishment_id,
            entries.len()
        );
        Ok(entries)
    }
}
