use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use catalog_cell::models::Specialty;
use catalog_cell::services::SpecialtyService;
use patient_cell::models::{IdentifyPatientRequest, Patient};
use patient_cell::services::{patient::validate_national_id, PatientService};
use shared_database::{typed, Record, RecordStore, Sheet};
use shared_models::{
    establishment::{normalize_establishment_id, same_establishment},
    Session,
};
use shared_utils::ids::{self, new_id};

use crate::error::ReferralError;
use crate::models::{
    columns, Appointment, AppointmentStatus, CreateReferralRequest, NewReferral, RecordOutcomeRequest,
    Referral, ReferralDetail, ReferralStatus, SpecialistReferral, VisitOutcome, VisitRecord,
    VisitSequence,
};
use crate::services::lifecycle::{self, OutcomePlan};
use crate::services::saga::{Compensation, Saga};
use crate::services::slots::SlotAllocator;

/// Hospital staff see every referral; establishment staff only their own.
pub fn authorize(session: &Session, referral: &Referral) -> Result<(), ReferralError> {
    if session.is_hospital()
        || same_establishment(&session.establishment_id, &referral.origin_establishment_id)
    {
        Ok(())
    } else {
        Err(ReferralError::Forbidden(format!(
            "Referral {} belongs to another establishment",
            referral.display_number
        )))
    }
}

fn cell_patch(column: &str, value: &str) -> Value {
    let mut fields = Record::new();
    fields.insert(column.to_string(), Value::String(value.to_string()));
    Value::Object(fields)
}

fn slot_fields(slot_id: &str, date: NaiveDate, time: NaiveTime) -> Record {
    let mut fields = Record::new();
    fields.insert("horario_id".to_string(), Value::String(slot_id.to_string()));
    fields.insert("fecha".to_string(), Value::String(date.format("%Y-%m-%d").to_string()));
    fields.insert("hora".to_string(), Value::String(time.format("%H:%M").to_string()));
    fields
}

pub struct ReferralService {
    store: Arc<dyn RecordStore>,
    slots: SlotAllocator,
    patients: PatientService,
    specialties: SpecialtyService,
}

impl ReferralService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            slots: SlotAllocator::new(store.clone()),
            patients: PatientService::new(store.clone()),
            specialties: SpecialtyService::new(store.clone()),
            store,
        }
    }

    async fn load_referral(&self, referral_id: &str) -> Result<Referral, ReferralError> {
        typed::fetch_one(self.store.as_ref(), Sheet::Referrals, referral_id)
            .await?
            .ok_or_else(|| ReferralError::NotFound(format!("Referral {}", referral_id)))
    }

    async fn load_appointment(&self, appointment_id: &str) -> Result<(Appointment, Referral), ReferralError> {
        let appointment: Appointment =
            typed::fetch_one(self.store.as_ref(), Sheet::Appointments, appointment_id)
                .await?
                .ok_or_else(|| ReferralError::NotFound(format!("Appointment {}", appointment_id)))?;
        let referral = self.load_referral(&appointment.referral_id).await?;
        Ok((appointment, referral))
    }

    // ==========================================================================
    // CREATE
    // ==========================================================================

    /// Books the first visit of a new referral on `request.slot_id`.
    ///
    /// The slot is claimed before anything else is written, so a taken slot
    /// fails with `SlotUnavailable` and leaves the store untouched.
    #[instrument(skip(self, session, request), fields(user = %session.user_id, slot = %request.slot_id))]
    pub async fn create_referral(
        &self,
        session: &Session,
        request: CreateReferralRequest,
    ) -> Result<NewReferral, ReferralError> {
        lifecycle::validate_create_request(&request)?;
        validate_national_id(&request.national_id)?;
        debug!("Creating referral for patient {}", request.national_id.trim());

        let mut saga = Saga::new(self.store.as_ref(), "create_referral");
        match self.create_referral_steps(session, request, &mut saga).await {
            Ok(created) => Ok(created),
            Err(e) => Err(saga.abort(e).await),
        }
    }

    async fn create_referral_steps(
        &self,
        session: &Session,
        request: CreateReferralRequest,
        saga: &mut Saga<'_>,
    ) -> Result<NewReferral, ReferralError> {
        let store = self.store.as_ref();

        let slot = self.slots.claim(request.slot_id.trim()).await?;
        saga.record(Compensation::release_slot(&slot.id));

        let identification = self
            .patients
            .find_or_create(IdentifyPatientRequest {
                national_id: request.national_id.clone(),
                full_name: request.full_name.clone(),
                phone: request.phone.clone(),
            })
            .await?;
        let patient = identification.patient;
        if identification.created {
            saga.record(Compensation::Delete { sheet: Sheet::Patients, id: patient.id.clone() });
        }

        let existing: Vec<Referral> = typed::fetch_all(store, Sheet::Referrals).await?;
        let referral_id = new_id(ids::REFERRAL);

        let appointment = Appointment {
            id: new_id(ids::APPOINTMENT),
            referral_id: referral_id.clone(),
            slot_id: slot.id.clone(),
            date: slot.date,
            time: slot.time,
            sequence: VisitSequence::First,
            status: AppointmentStatus::Scheduled,
            created_at: Some(Utc::now()),
        };
        typed::insert(store, Sheet::Appointments, &appointment).await?;
        saga.record(Compensation::Delete { sheet: Sheet::Appointments, id: appointment.id.clone() });

        let referral = Referral {
            id: referral_id,
            display_number: lifecycle::next_display_number(&existing),
            registered_on: Utc::now().date_naive(),
            patient_id: patient.id.clone(),
            origin_establishment_id: normalize_establishment_id(&session.establishment_id),
            reason: request.reason.trim().to_string(),
            gestational_weeks: request.gestational_weeks,
            gestational_days: request.gestational_days,
            status: ReferralStatus::Active,
        };
        typed::insert(store, Sheet::Referrals, &referral).await?;

        info!(
            "Referral {} ({}) created for patient {} on slot {}",
            referral.display_number, referral.id, patient.national_id, slot.id
        );
        Ok(NewReferral { referral, patient, appointment })
    }

    // ==========================================================================
    // OUTCOMES
    // ==========================================================================

    /// Resolves a SCHEDULED appointment and moves the referral along its pathway.
    #[instrument(skip(self, session, request), fields(user = %session.user_id, outcome = %request.outcome))]
    pub async fn record_visit_outcome(
        &self,
        session: &Session,
        appointment_id: &str,
        request: RecordOutcomeRequest,
    ) -> Result<VisitOutcome, ReferralError> {
        let (appointment, referral) = self.load_appointment(appointment_id).await?;
        authorize(session, &referral)?;
        lifecycle::ensure_open(&appointment, &referral)?;
        let plan = lifecycle::plan_outcome(&appointment, &request)?;

        let specialty = match plan.visit.as_ref().and_then(|v| v.specialty.as_deref()) {
            Some(key) => Some(self.specialties.resolve(key).await?.ok_or_else(|| {
                ReferralError::ValidationError(format!("Unknown specialty '{}'", key))
            })?),
            None => None,
        };

        let mut saga = Saga::new(self.store.as_ref(), "record_visit_outcome");
        match self.apply_outcome(&appointment, &referral, plan, specialty, &mut saga).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => Err(saga.abort(e).await),
        }
    }

    async fn apply_outcome(
        &self,
        appointment: &Appointment,
        referral: &Referral,
        plan: OutcomePlan,
        specialty: Option<Specialty>,
        saga: &mut Saga<'_>,
    ) -> Result<VisitOutcome, ReferralError> {
        let store = self.store.as_ref();

        let next_slot = match &plan.next {
            Some((_, slot_id)) => {
                let slot = self.slots.claim(slot_id).await?;
                saga.record(Compensation::release_slot(&slot.id));
                Some(slot)
            }
            None => None,
        };

        let mut status = Record::new();
        status.insert(
            columns::APPOINTMENT_STATUS.to_string(),
            Value::String(plan.outcome.as_cell().to_string()),
        );
        let applied = store
            .compare_and_update(
                Sheet::Appointments,
                &appointment.id,
                columns::APPOINTMENT_STATUS,
                AppointmentStatus::Scheduled.as_cell(),
                status,
            )
            .await?;
        if !applied {
            warn!("Appointment {} was resolved concurrently", appointment.id);
            return Err(ReferralError::InvalidTransition(format!(
                "Appointment {} is no longer scheduled",
                appointment.id
            )));
        }
        saga.record(Compensation::revert(
            Sheet::Appointments,
            &appointment.id,
            columns::APPOINTMENT_STATUS,
            AppointmentStatus::Scheduled.as_cell(),
        ));

        let visit_record = match &plan.visit {
            Some(visit) => {
                let record = VisitRecord {
                    id: new_id(ids::VISIT),
                    appointment_id: appointment.id.clone(),
                    result: visit.result,
                    attended: true,
                    teleconsultation: visit.teleconsultation,
                    notes: visit.notes.clone(),
                    closing: visit.closing,
                };
                typed::insert(store, Sheet::Visits, &record).await?;
                saga.record(Compensation::Delete { sheet: Sheet::Visits, id: record.id.clone() });
                Some(record)
            }
            None => None,
        };

        let specialist_referral = match (&visit_record, specialty) {
            (Some(visit), Some(specialty)) => {
                let derivation = SpecialistReferral {
                    id: new_id(ids::SPECIALIST_REFERRAL),
                    visit_id: visit.id.clone(),
                    specialty_id: specialty.id,
                };
                typed::insert(store, Sheet::SpecialistReferrals, &derivation).await?;
                saga.record(Compensation::Delete {
                    sheet: Sheet::SpecialistReferrals,
                    id: derivation.id.clone(),
                });
                info!("Specialist referral to {} for visit {}", specialty.name, visit.id);
                Some(derivation)
            }
            _ => None,
        };

        let referral_status = if plan.closes_referral {
            typed::patch(
                store,
                Sheet::Referrals,
                &referral.id,
                cell_patch(columns::REFERRAL_STATUS, ReferralStatus::Closed.as_cell()),
            )
            .await?;
            saga.record(Compensation::revert(
                Sheet::Referrals,
                &referral.id,
                columns::REFERRAL_STATUS,
                ReferralStatus::Active.as_cell(),
            ));
            ReferralStatus::Closed
        } else {
            referral.status
        };

        let next_appointment = match (plan.next, next_slot) {
            (Some((sequence, _)), Some(slot)) => {
                let next = Appointment {
                    id: new_id(ids::APPOINTMENT),
                    referral_id: referral.id.clone(),
                    slot_id: slot.id,
                    date: slot.date,
                    time: slot.time,
                    sequence,
                    status: AppointmentStatus::Scheduled,
                    created_at: Some(Utc::now()),
                };
                typed::insert(store, Sheet::Appointments, &next).await?;
                saga.record(Compensation::Delete { sheet: Sheet::Appointments, id: next.id.clone() });
                Some(next)
            }
            _ => None,
        };

        self.slots.release(&appointment.slot_id).await?;

        info!(
            "Appointment {} of referral {} resolved as {}; referral is {:?}",
            appointment.id, referral.display_number, plan.outcome, referral_status
        );
        Ok(VisitOutcome {
            referral_status,
            resolved_appointment: Appointment { status: plan.outcome, ..appointment.clone() },
            visit_record,
            specialist_referral,
            next_appointment,
        })
    }

    // ==========================================================================
    // RESCHEDULE
    // ==========================================================================

    /// Moves a SCHEDULED appointment to another slot; sequence and status stay.
    #[instrument(skip(self, session), fields(user = %session.user_id))]
    pub async fn reschedule_appointment(
        &self,
        session: &Session,
        appointment_id: &str,
        new_slot_id: &str,
    ) -> Result<Appointment, ReferralError> {
        let new_slot_id = new_slot_id.trim();
        if new_slot_id.is_empty() {
            return Err(ReferralError::ValidationError("A new slot is required".to_string()));
        }

        let (appointment, referral) = self.load_appointment(appointment_id).await?;
        authorize(session, &referral)?;
        lifecycle::ensure_open(&appointment, &referral)?;
        if appointment.slot_id == new_slot_id {
            return Err(ReferralError::ValidationError(format!(
                "Appointment {} is already on slot {}",
                appointment.id, new_slot_id
            )));
        }

        let mut saga = Saga::new(self.store.as_ref(), "reschedule_appointment");
        match self.reschedule_steps(&appointment, new_slot_id, &mut saga).await {
            Ok(moved) => Ok(moved),
            Err(e) => Err(saga.abort(e).await),
        }
    }

    async fn reschedule_steps(
        &self,
        appointment: &Appointment,
        new_slot_id: &str,
        saga: &mut Saga<'_>,
    ) -> Result<Appointment, ReferralError> {
        let slot = self.slots.claim(new_slot_id).await?;
        saga.record(Compensation::release_slot(&slot.id));

        typed::patch(
            self.store.as_ref(),
            Sheet::Appointments,
            &appointment.id,
            Value::Object(slot_fields(&slot.id, slot.date, slot.time)),
        )
        .await?;
        saga.record(Compensation::Revert {
            sheet: Sheet::Appointments,
            id: appointment.id.clone(),
            fields: slot_fields(&appointment.slot_id, appointment.date, appointment.time),
        });

        self.slots.release(&appointment.slot_id).await?;

        info!(
            "Appointment {} moved from slot {} to {}",
            appointment.id, appointment.slot_id, slot.id
        );
        Ok(Appointment {
            slot_id: slot.id,
            date: slot.date,
            time: slot.time,
            ..appointment.clone()
        })
    }

    // ==========================================================================
    // CANCEL
    // ==========================================================================

    /// Deletes a referral and everything hanging off it, freeing its open slot.
    ///
    /// Establishment staff may only cancel referrals whose patient has not yet
    /// attended a visit.
    #[instrument(skip(self, session), fields(user = %session.user_id))]
    pub async fn cancel_referral(&self, session: &Session, referral_id: &str) -> Result<(), ReferralError> {
        let store = self.store.as_ref();
        let (referrals, appointments, visits, derivations) = futures::try_join!(
            typed::fetch_all::<Referral>(store, Sheet::Referrals),
            typed::fetch_all::<Appointment>(store, Sheet::Appointments),
            typed::fetch_all::<VisitRecord>(store, Sheet::Visits),
            typed::fetch_all::<SpecialistReferral>(store, Sheet::SpecialistReferrals),
        )?;

        let referral = referrals
            .into_iter()
            .find(|r| r.id == referral_id)
            .ok_or_else(|| ReferralError::NotFound(format!("Referral {}", referral_id)))?;
        authorize(session, &referral)?;
        if !session.is_hospital() && !lifecycle::can_modify(&referral, &appointments) {
            return Err(ReferralError::InvalidTransition(format!(
                "Referral {} already has attended visits",
                referral.display_number
            )));
        }

        let appointments: Vec<Appointment> = appointments
            .into_iter()
            .filter(|a| a.referral_id == referral.id)
            .collect();
        let appointment_ids: HashSet<&str> = appointments.iter().map(|a| a.id.as_str()).collect();
        let visits: Vec<VisitRecord> = visits
            .into_iter()
            .filter(|v| appointment_ids.contains(v.appointment_id.as_str()))
            .collect();
        let visit_ids: HashSet<&str> = visits.iter().map(|v| v.id.as_str()).collect();
        let derivations: Vec<SpecialistReferral> = derivations
            .into_iter()
            .filter(|d| visit_ids.contains(d.visit_id.as_str()))
            .collect();

        let mut saga = Saga::new(store, "cancel_referral");
        let result = self
            .cancel_steps(&referral, &appointments, &visits, &derivations, &mut saga)
            .await;
        match result {
            Ok(()) => {
                info!(
                    "Referral {} cancelled: {} appointment(s), {} visit(s), {} specialist referral(s) removed",
                    referral.display_number,
                    appointments.len(),
                    visits.len(),
                    derivations.len()
                );
                Ok(())
            }
            Err(e) => Err(saga.abort(e).await),
        }
    }

    async fn cancel_steps(
        &self,
        referral: &Referral,
        appointments: &[Appointment],
        visits: &[VisitRecord],
        derivations: &[SpecialistReferral],
        saga: &mut Saga<'_>,
    ) -> Result<(), ReferralError> {
        let store = self.store.as_ref();

        for appointment in appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Scheduled && !a.slot_id.is_empty())
        {
            match self.slots.release(&appointment.slot_id).await {
                Ok(()) => saga.record(Compensation::occupy_slot(&appointment.slot_id)),
                Err(ReferralError::NotFound(_)) => {
                    warn!("Slot {} of appointment {} no longer exists", appointment.slot_id, appointment.id)
                }
                Err(e) => return Err(e),
            }
        }

        for derivation in derivations {
            store.delete(Sheet::SpecialistReferrals, &derivation.id).await?;
            saga.record(Compensation::Recreate {
                sheet: Sheet::SpecialistReferrals,
                record: typed::encode(Sheet::SpecialistReferrals, derivation)?,
            });
        }
        for visit in visits {
            store.delete(Sheet::Visits, &visit.id).await?;
            saga.record(Compensation::Recreate {
                sheet: Sheet::Visits,
                record: typed::encode(Sheet::Visits, visit)?,
            });
        }
        for appointment in appointments {
            store.delete(Sheet::Appointments, &appointment.id).await?;
            saga.record(Compensation::Recreate {
                sheet: Sheet::Appointments,
                record: typed::encode(Sheet::Appointments, appointment)?,
            });
        }

        store.delete(Sheet::Referrals, &referral.id).await?;
        Ok(())
    }

    // ==========================================================================
    // QUERIES
    // ==========================================================================

    pub async fn get_referral(&self, session: &Session, referral_id: &str) -> Result<ReferralDetail, ReferralError> {
        let referral = self.load_referral(referral_id).await?;
        authorize(session, &referral)?;

        let store = self.store.as_ref();
        let (appointments, visits, derivations, patients) = futures::try_join!(
            typed::fetch_all::<Appointment>(store, Sheet::Appointments),
            typed::fetch_all::<VisitRecord>(store, Sheet::Visits),
            typed::fetch_all::<SpecialistReferral>(store, Sheet::SpecialistReferrals),
            typed::fetch_all::<Patient>(store, Sheet::Patients),
        )?;

        let appointments: Vec<Appointment> = appointments
            .into_iter()
            .filter(|a| a.referral_id == referral.id)
            .collect();
        let appointment_ids: HashSet<&str> = appointments.iter().map(|a| a.id.as_str()).collect();
        let visit_records: Vec<VisitRecord> = visits
            .into_iter()
            .filter(|v| appointment_ids.contains(v.appointment_id.as_str()))
            .collect();
        let visit_ids: HashSet<&str> = visit_records.iter().map(|v| v.id.as_str()).collect();
        let specialist_referrals: Vec<SpecialistReferral> = derivations
            .into_iter()
            .filter(|d| visit_ids.contains(d.visit_id.as_str()))
            .collect();

        Ok(ReferralDetail {
            patient: patients.into_iter().find(|p| p.id == referral.patient_id),
            stage: lifecycle::derive_stage(&referral, &appointments),
            current_appointment: lifecycle::current_open_appointment(&appointments, &referral.id).cloned(),
            can_modify: lifecycle::can_modify(&referral, &appointments),
            referral,
            appointments,
            visit_records,
            specialist_referrals,
        })
    }
}
