use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use patient_cell::models::Patient;
use shared_models::cells;

// ==============================================================================
// CELL ENUMERATIONS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReferralStatus {
    #[serde(rename = "ACTIVA", alias = "activa")]
    Active,
    #[serde(rename = "CERRADA", alias = "cerrada")]
    Closed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SlotStatus {
    #[serde(rename = "libre", alias = "LIBRE")]
    Free,
    #[serde(rename = "copado", alias = "COPADO")]
    Occupied,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VisitSequence {
    #[serde(rename = "PRIMERA", alias = "primera")]
    First,
    #[serde(rename = "SEGUNDA", alias = "segunda")]
    Second,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AppointmentStatus {
    #[serde(rename = "PROGRAMADA", alias = "programada")]
    Scheduled,
    #[serde(rename = "ASISTIO", alias = "asistio")]
    Attended,
    #[serde(rename = "NO_ASISTIO", alias = "no_asistio")]
    Missed,
    #[serde(rename = "REPROGRAMADA", alias = "reprogramada")]
    Rescheduled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TestResult {
    #[serde(rename = "REACTIVO")]
    Reactive,
    #[serde(rename = "NO_REACTIVO")]
    NonReactive,
    #[serde(rename = "PATOLOGICO")]
    Pathologic,
    #[serde(rename = "DERIVADO")]
    Referred,
}

impl ReferralStatus {
    pub fn as_cell(&self) -> &'static str {
        match self {
            ReferralStatus::Active => "ACTIVA",
            ReferralStatus::Closed => "CERRADA",
        }
    }
}

impl SlotStatus {
    pub fn as_cell(&self) -> &'static str {
        match self {
            SlotStatus::Free => "libre",
            SlotStatus::Occupied => "copado",
        }
    }
}

impl AppointmentStatus {
    pub fn as_cell(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "PROGRAMADA",
            AppointmentStatus::Attended => "ASISTIO",
            AppointmentStatus::Missed => "NO_ASISTIO",
            AppointmentStatus::Rescheduled => "REPROGRAMADA",
        }
    }
}

impl fmt::Display for VisitSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisitSequence::First => write!(f, "first"),
            VisitSequence::Second => write!(f, "second"),
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_cell())
    }
}

/// Column headers whose names carry the allowed values, as the workbook has them.
pub mod columns {
    pub const REFERRAL_STATUS: &str = "estado (ACTIVA/CERRADA)";
    pub const SLOT_STATUS: &str = "estado";
    pub const APPOINTMENT_SEQUENCE: &str = "tipo (PRIMERA/SEGUNDA)";
    pub const APPOINTMENT_STATUS: &str = "estado (PROGRAMADA/ASISTIO/NO_ASISTIO/REPROGRAMADA)";
    pub const VISIT_RESULT: &str = "resultado (REACTIVO/NO_REACTIVO/PATOLOGICO/DERIVADO)";
    pub const VISIT_ATTENDED: &str = "acude (TRUE/FALSE)";
    pub const VISIT_TELECONSULTATION: &str = "teleorientacion (TRUE/FALSE)";
    pub const VISIT_CLOSING: &str = "cerrada (TRUE/FALSE)";
}

// ==============================================================================
// SHEET ROWS
// ==============================================================================

/// A row of the `referencias` sheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Referral {
    pub id: String,
    #[serde(rename = "numero_correlativo", with = "cells::text")]
    pub display_number: String,
    #[serde(rename = "fecha_registro", with = "cells::date")]
    pub registered_on: NaiveDate,
    #[serde(rename = "gestante_id", with = "cells::text")]
    pub patient_id: String,
    #[serde(rename = "establecimiento_origen_id", with = "cells::text")]
    pub origin_establishment_id: String,
    #[serde(rename = "motivo_referencia", with = "cells::text")]
    pub reason: String,
    #[serde(rename = "edad_gestacional_semanas", with = "cells::count")]
    pub gestational_weeks: u32,
    #[serde(rename = "edad_gestacional_dias", with = "cells::count")]
    pub gestational_days: u32,
    #[serde(rename = "estado (ACTIVA/CERRADA)", alias = "estado")]
    pub status: ReferralStatus,
}

/// A row of the `horario` sheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    pub id: String,
    #[serde(rename = "fecha", with = "cells::date")]
    pub date: NaiveDate,
    #[serde(rename = "hora", with = "cells::time")]
    pub time: NaiveTime,
    #[serde(rename = "estado")]
    pub status: SlotStatus,
}

/// A row of the `citas` sheet. Date and time are copied from the slot at booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: String,
    #[serde(rename = "referencia_id", with = "cells::text")]
    pub referral_id: String,
    /// Empty on rows booked before slots were linked by id.
    #[serde(rename = "horario_id", with = "cells::text", default)]
    pub slot_id: String,
    #[serde(rename = "fecha", with = "cells::date")]
    pub date: NaiveDate,
    #[serde(rename = "hora", with = "cells::time")]
    pub time: NaiveTime,
    #[serde(rename = "tipo (PRIMERA/SEGUNDA)", alias = "tipo")]
    pub sequence: VisitSequence,
    #[serde(rename = "estado (PROGRAMADA/ASISTIO/NO_ASISTIO/REPROGRAMADA)", alias = "estado")]
    pub status: AppointmentStatus,
    #[serde(rename = "creado_en", with = "cells::timestamp", default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A row of the `atenciones` sheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitRecord {
    pub id: String,
    #[serde(rename = "cita_id", with = "cells::text")]
    pub appointment_id: String,
    #[serde(rename = "resultado (REACTIVO/NO_REACTIVO/PATOLOGICO/DERIVADO)", alias = "resultado")]
    pub result: TestResult,
    #[serde(rename = "acude (TRUE/FALSE)", alias = "acude", with = "cells::bool_flag")]
    pub attended: bool,
    #[serde(
        rename = "teleorientacion (TRUE/FALSE)",
        alias = "teleorientacion",
        with = "cells::bool_flag",
        default
    )]
    pub teleconsultation: bool,
    #[serde(rename = "observaciones", with = "cells::text", default)]
    pub notes: String,
    #[serde(rename = "cerrada (TRUE/FALSE)", alias = "cerrada", with = "cells::bool_flag", default)]
    pub closing: bool,
}

/// A row of the `derivaciones` sheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpecialistReferral {
    pub id: String,
    #[serde(rename = "atencion_id", with = "cells::text")]
    pub visit_id: String,
    #[serde(rename = "especialidad_id", with = "cells::text")]
    pub specialty_id: String,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReferralRequest {
    pub national_id: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
    pub reason: String,
    pub gestational_weeks: u32,
    pub gestational_days: u32,
    pub slot_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordOutcomeRequest {
    /// ATTENDED, MISSED or RESCHEDULED.
    pub outcome: AppointmentStatus,
    pub result: Option<TestResult>,
    #[serde(default)]
    pub teleconsultation: bool,
    #[serde(default)]
    pub notes: String,
    /// Slot for the follow-up appointment.
    pub next_slot_id: Option<String>,
    /// Specialty id or name, required when the result is REFERRED.
    pub specialty: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub new_slot_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSlotRequest {
    #[serde(with = "cells::date")]
    pub date: NaiveDate,
    #[serde(with = "cells::time")]
    pub time: NaiveTime,
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

/// Combined state of a referral and its open appointment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStage {
    New,
    AwaitingFirstVisit,
    AwaitingSecondVisit,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReferral {
    pub referral: Referral,
    pub patient: Patient,
    pub appointment: Appointment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitOutcome {
    pub referral_status: ReferralStatus,
    pub resolved_appointment: Appointment,
    pub visit_record: Option<VisitRecord>,
    pub specialist_referral: Option<SpecialistReferral>,
    pub next_appointment: Option<Appointment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralDetail {
    pub referral: Referral,
    pub patient: Option<Patient>,
    pub stage: ReferralStage,
    pub current_appointment: Option<Appointment>,
    pub appointments: Vec<Appointment>,
    pub visit_records: Vec<VisitRecord>,
    pub specialist_referrals: Vec<SpecialistReferral>,
    pub can_modify: bool,
}

/// Appointment summary shown in the inbox and history lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenAppointment {
    pub appointment_id: String,
    pub sequence: VisitSequence,
    #[serde(with = "cells::date")]
    pub date: NaiveDate,
    #[serde(with = "cells::time")]
    pub time: NaiveTime,
}

impl From<&Appointment> for OpenAppointment {
    fn from(appointment: &Appointment) -> Self {
        Self {
            appointment_id: appointment.id.clone(),
            sequence: appointment.sequence,
            date: appointment.date,
            time: appointment.time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxEntry {
    pub referral_id: String,
    pub display_number: String,
    pub patient_name: String,
    pub patient_national_id: String,
    pub origin_establishment_id: String,
    pub origin_establishment_name: Option<String>,
    pub reason: String,
    pub current_appointment: Option<OpenAppointment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub referral_id: String,
    pub display_number: String,
    #[serde(with = "cells::date")]
    pub registered_on: NaiveDate,
    pub patient_name: String,
    pub patient_national_id: String,
    pub reason: String,
    pub status: ReferralStatus,
    pub stage: ReferralStage,
    pub current_appointment: Option<OpenAppointment>,
    pub can_modify: bool,
}
