use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use serde_json::{json, Value};

use referral_cell::models::*;
use referral_cell::services::{InboxService, ReferralService, SlotAllocator};
use referral_cell::ReferralError;
use shared_database::{typed, MemoryStore, Record, RecordStore, Sheet, StoreError, StoreOp};
use shared_models::Session;
use shared_utils::test_utils::{SheetFixtures, TestSession};

struct Harness {
    store: Arc<MemoryStore>,
    service: ReferralService,
    establishment: Session,
    hospital: Session,
}

impl Harness {
    async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        SheetFixtures::seed_default(&store).await;
        Self {
            service: ReferralService::new(store.clone()),
            store,
            establishment: TestSession::establishment(),
            hospital: TestSession::hospital(),
        }
    }

    fn request(slot_id: &str) -> CreateReferralRequest {
        CreateReferralRequest {
            national_id: "42327868".to_string(),
            full_name: "María Huamán".to_string(),
            phone: "987654321".to_string(),
            reason: "Anemia severa".to_string(),
            gestational_weeks: 24,
            gestational_days: 2,
            slot_id: slot_id.to_string(),
        }
    }

    async fn create(&self, slot_id: &str) -> NewReferral {
        self.service
            .create_referral(&self.establishment, Self::request(slot_id))
            .await
            .unwrap()
    }

    async fn outcome(
        &self,
        appointment_id: &str,
        outcome: AppointmentStatus,
        result: Option<TestResult>,
        next_slot: Option<&str>,
        specialty: Option<&str>,
    ) -> Result<VisitOutcome, ReferralError> {
        self.service
            .record_visit_outcome(
                &self.hospital,
                appointment_id,
                RecordOutcomeRequest {
                    outcome,
                    result,
                    teleconsultation: false,
                    notes: "Control".to_string(),
                    next_slot_id: next_slot.map(str::to_string),
                    specialty: specialty.map(str::to_string),
                },
            )
            .await
    }

    async fn slot_status(&self, slot_id: &str) -> String {
        self.store.row(Sheet::Slots, slot_id).await.unwrap()["estado"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn appointments(&self) -> Vec<Appointment> {
        typed::fetch_all(self.store.as_ref(), Sheet::Appointments).await.unwrap()
    }

    async fn snapshot(&self) -> Vec<Vec<Record>> {
        let mut sheets = Vec::new();
        for sheet in Sheet::ALL {
            sheets.push(self.store.rows(sheet).await);
        }
        sheets
    }

    async fn referral(&self, id: &str) -> Referral {
        typed::fetch_one(self.store.as_ref(), Sheet::Referrals, id).await.unwrap().unwrap()
    }

    /// A slot is occupied iff exactly one scheduled appointment is bound to it,
    /// and no referral has two scheduled appointments.
    async fn assert_invariants(&self) {
        let slots: Vec<Slot> = typed::fetch_all(self.store.as_ref(), Sheet::Slots).await.unwrap();
        let appointments = self.appointments().await;

        let mut bound: HashMap<&str, usize> = HashMap::new();
        let mut per_referral: HashMap<&str, usize> = HashMap::new();
        for a in appointments.iter().filter(|a| a.status == AppointmentStatus::Scheduled) {
            *bound.entry(a.slot_id.as_str()).or_default() += 1;
            *per_referral.entry(a.referral_id.as_str()).or_default() += 1;
        }

        for slot in &slots {
            let count = bound.get(slot.id.as_str()).copied().unwrap_or(0);
            // S3 is seeded occupied without an appointment.
            if slot.id == "S3" {
                continue;
            }
            assert_eq!(
                slot.status == SlotStatus::Occupied,
                count == 1,
                "slot {} is {:?} with {} scheduled appointment(s)",
                slot.id,
                slot.status,
                count
            );
            assert!(count <= 1);
        }
        assert!(per_referral.values().all(|n| *n <= 1));
    }
}

#[tokio::test]
async fn test_scenario_a_create_referral() {
    let h = Harness::new().await;
    let created = h.create("S1").await;

    assert_eq!(created.referral.status, ReferralStatus::Active);
    assert_eq!(created.referral.origin_establishment_id, "000001001");
    assert_eq!(created.referral.display_number, "COR-000001");
    assert_eq!(created.patient.national_id, "42327868");
    assert_eq!(created.appointment.sequence, VisitSequence::First);
    assert_eq!(created.appointment.status, AppointmentStatus::Scheduled);
    assert_eq!(created.appointment.slot_id, "S1");
    assert_eq!(created.appointment.date.to_string(), "2024-05-10");
    assert_eq!(created.appointment.time.format("%H:%M").to_string(), "09:00");
    assert_eq!(h.slot_status("S1").await, "copado");
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_scenarios_b_and_c_full_pathway() {
    let h = Harness::new().await;
    let created = h.create("S1").await;

    let b = h
        .outcome(&created.appointment.id, AppointmentStatus::Attended, Some(TestResult::NonReactive), Some("S2"), None)
        .await
        .unwrap();
    let visit = b.visit_record.unwrap();
    assert!(!visit.closing);
    assert!(visit.attended);
    assert_eq!(b.referral_status, ReferralStatus::Active);
    let second = b.next_appointment.unwrap();
    assert_eq!(second.sequence, VisitSequence::Second);
    assert_eq!(second.status, AppointmentStatus::Scheduled);
    assert_eq!(h.slot_status("S1").await, "libre");
    assert_eq!(h.slot_status("S2").await, "copado");
    h.assert_invariants().await;

    let c = h
        .outcome(&second.id, AppointmentStatus::Attended, Some(TestResult::Reactive), None, None)
        .await
        .unwrap();
    assert!(c.visit_record.unwrap().closing);
    assert_eq!(c.referral_status, ReferralStatus::Closed);
    assert!(c.next_appointment.is_none());
    assert_eq!(h.referral(&created.referral.id).await.status, ReferralStatus::Closed);
    assert_eq!(h.slot_status("S2").await, "libre");
    assert_eq!(h.appointments().await.len(), 2);
    h.assert_invariants().await;

    // Closed is terminal.
    assert_matches!(
        h.outcome(&second.id, AppointmentStatus::Attended, Some(TestResult::Reactive), None, None).await,
        Err(ReferralError::InvalidTransition(_))
    );
}

#[tokio::test]
async fn test_scenario_d_specialist_referral() {
    let h = Harness::new().await;
    let created = h.create("S1").await;

    let d = h
        .outcome(&created.appointment.id, AppointmentStatus::Attended, Some(TestResult::Referred), Some("S2"), Some("Cardiology"))
        .await
        .unwrap();

    let visit = d.visit_record.unwrap();
    let derivation = d.specialist_referral.unwrap();
    assert_eq!(derivation.specialty_id, "ESP-CARD");
    assert_eq!(derivation.visit_id, visit.id);
    assert_eq!(h.store.rows(Sheet::SpecialistReferrals).await.len(), 1);
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_missed_reopens_same_sequence_without_visit() {
    let h = Harness::new().await;
    let created = h.create("S1").await;

    let missed = h
        .outcome(&created.appointment.id, AppointmentStatus::Missed, None, Some("S2"), None)
        .await
        .unwrap();

    assert!(missed.visit_record.is_none());
    let next = missed.next_appointment.unwrap();
    assert_eq!(next.sequence, VisitSequence::First);
    assert_eq!(next.slot_id, "S2");
    assert_eq!(missed.resolved_appointment.status, AppointmentStatus::Missed);
    assert_eq!(h.slot_status("S1").await, "libre");
    assert!(h.store.rows(Sheet::Visits).await.is_empty());
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_validation_errors_write_nothing() {
    let h = Harness::new().await;
    let created = h.create("S1").await;
    let appointments_before = h.store.rows(Sheet::Appointments).await;

    assert_matches!(
        h.outcome(&created.appointment.id, AppointmentStatus::Missed, None, None, None).await,
        Err(ReferralError::ValidationError(_))
    );
    assert_matches!(
        h.outcome(&created.appointment.id, AppointmentStatus::Attended, Some(TestResult::Referred), Some("S2"), None).await,
        Err(ReferralError::ValidationError(_))
    );
    assert_matches!(
        h.outcome(&created.appointment.id, AppointmentStatus::Attended, Some(TestResult::Referred), Some("S2"), Some("Dermatology")).await,
        Err(ReferralError::ValidationError(_))
    );

    assert_eq!(h.store.rows(Sheet::Appointments).await, appointments_before);
    assert_eq!(h.slot_status("S2").await, "libre");
}

#[tokio::test]
async fn test_create_on_occupied_slot_writes_nothing() {
    let h = Harness::new().await;

    let result = h.service.create_referral(&h.establishment, Harness::request("S3")).await;

    assert_matches!(result, Err(ReferralError::SlotUnavailable(_)));
    assert!(h.store.rows(Sheet::Appointments).await.is_empty());
    assert!(h.store.rows(Sheet::Referrals).await.is_empty());
    assert!(h.store.rows(Sheet::Patients).await.is_empty());
}

#[tokio::test]
async fn test_outcome_with_taken_next_slot_is_compensated() {
    let h = Harness::new().await;
    let created = h.create("S1").await;

    let result = h
        .outcome(&created.appointment.id, AppointmentStatus::Attended, Some(TestResult::NonReactive), Some("S3"), None)
        .await;

    assert_matches!(result, Err(ReferralError::SlotUnavailable(_)));
    assert_eq!(h.appointments().await[0].status, AppointmentStatus::Scheduled);
    assert_eq!(h.slot_status("S1").await, "copado");
    assert!(h.store.rows(Sheet::Visits).await.is_empty());
}

#[tokio::test]
async fn test_failed_referral_insert_rolls_back() {
    let h = Harness::new().await;
    h.store
        .fail_next(StoreOp::Create, Sheet::Referrals, StoreError::NetworkUnavailable("timeout".into()))
        .await;

    let result = h.service.create_referral(&h.establishment, Harness::request("S1")).await;

    assert_matches!(result, Err(ReferralError::Store(StoreError::NetworkUnavailable(_))));
    assert_eq!(h.slot_status("S1").await, "libre");
    assert!(h.store.rows(Sheet::Appointments).await.is_empty());
    assert!(h.store.rows(Sheet::Patients).await.is_empty());
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_failed_status_write_releases_claimed_slot() {
    let h = Harness::new().await;
    let created = h.create("S1").await;
    h.store
        .fail_next(StoreOp::Update, Sheet::Appointments, StoreError::StoreUnavailable("locked".into()))
        .await;

    let result = h
        .outcome(&created.appointment.id, AppointmentStatus::Attended, Some(TestResult::NonReactive), Some("S2"), None)
        .await;

    assert_matches!(result, Err(ReferralError::Store(StoreError::StoreUnavailable(_))));
    assert_eq!(h.slot_status("S2").await, "libre");
    assert_eq!(h.slot_status("S1").await, "copado");
    assert_eq!(h.appointments().await.len(), 1);
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_failed_follow_up_insert_reverts_outcome() {
    let h = Harness::new().await;
    let created = h.create("S1").await;
    h.store
        .fail_next(StoreOp::Create, Sheet::Appointments, StoreError::NetworkUnavailable("timeout".into()))
        .await;

    let result = h
        .outcome(&created.appointment.id, AppointmentStatus::Attended, Some(TestResult::NonReactive), Some("S2"), None)
        .await;

    assert_matches!(result, Err(ReferralError::Store(StoreError::NetworkUnavailable(_))));
    let appointments = h.appointments().await;
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0].status, AppointmentStatus::Scheduled);
    assert!(h.store.rows(Sheet::Visits).await.is_empty());
    assert_eq!(h.slot_status("S2").await, "libre");
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_reschedule_moves_slot() {
    let h = Harness::new().await;
    let created = h.create("S1").await;

    let moved = h
        .service
        .reschedule_appointment(&h.hospital, &created.appointment.id, "S2")
        .await
        .unwrap();

    assert_eq!(moved.slot_id, "S2");
    assert_eq!(moved.date.to_string(), "2024-06-14");
    assert_eq!(moved.sequence, VisitSequence::First);
    assert_eq!(moved.status, AppointmentStatus::Scheduled);
    assert_eq!(h.appointments().await[0].slot_id, "S2");
    assert_eq!(h.slot_status("S1").await, "libre");
    assert_eq!(h.slot_status("S2").await, "copado");
    h.assert_invariants().await;

    assert_matches!(
        h.service.reschedule_appointment(&h.hospital, &created.appointment.id, "S3").await,
        Err(ReferralError::SlotUnavailable(_))
    );
    assert_eq!(h.appointments().await[0].slot_id, "S2");
}

#[tokio::test]
async fn test_cancel_referral_cascades() {
    let h = Harness::new().await;
    let created = h.create("S1").await;
    h.outcome(&created.appointment.id, AppointmentStatus::Attended, Some(TestResult::Referred), Some("S2"), Some("ESP-OBST"))
        .await
        .unwrap();

    // Attended visits lock the referral for the origin establishment.
    assert_matches!(
        h.service.cancel_referral(&h.establishment, &created.referral.id).await,
        Err(ReferralError::InvalidTransition(_))
    );

    h.service.cancel_referral(&h.hospital, &created.referral.id).await.unwrap();

    for sheet in [Sheet::Referrals, Sheet::Appointments, Sheet::Visits, Sheet::SpecialistReferrals] {
        assert!(h.store.rows(sheet).await.is_empty(), "{} not emptied", sheet);
    }
    assert_eq!(h.slot_status("S1").await, "libre");
    assert_eq!(h.slot_status("S2").await, "libre");
    assert_eq!(h.store.rows(Sheet::Patients).await.len(), 1);
}

#[tokio::test]
async fn test_other_establishment_cannot_touch_referral() {
    let h = Harness::new().await;
    let created = h.create("S1").await;
    let stranger = TestSession::establishment_with_id("000001002");

    assert_matches!(
        h.service.get_referral(&stranger, &created.referral.id).await,
        Err(ReferralError::Forbidden(_))
    );
    assert_matches!(
        h.service.reschedule_appointment(&stranger, &created.appointment.id, "S2").await,
        Err(ReferralError::Forbidden(_))
    );
}

#[tokio::test]
async fn test_referral_detail_and_numbering() {
    let h = Harness::new().await;
    let first = h.create("S1").await;
    let second = h.create("S2").await;

    assert_eq!(second.referral.display_number, "COR-000002");
    assert_eq!(second.patient.id, first.patient.id);

    let detail = h.service.get_referral(&h.establishment, &first.referral.id).await.unwrap();
    assert_eq!(detail.stage, ReferralStage::AwaitingFirstVisit);
    assert_eq!(detail.appointments.len(), 1);
    assert!(detail.can_modify);
    assert_eq!(detail.patient.unwrap().full_name, "María Huamán");
}

#[tokio::test]
async fn test_release_twice_keeps_slot_free() {
    let h = Harness::new().await;
    let allocator = SlotAllocator::new(h.store.clone());

    allocator.claim("S1").await.unwrap();
    allocator.release("S1").await.unwrap();
    allocator.release("S1").await.unwrap();

    assert_eq!(h.slot_status("S1").await, "libre");
}

#[tokio::test]
async fn test_numeric_cells_from_sheet_decode() {
    let h = Harness::new().await;
    h.store
        .seed(
            Sheet::Referrals,
            vec![json!({
                "id": "REF-X",
                "numero_correlativo": "COR-000041",
                "fecha_registro": "2024-04-30T05:00:00.000Z",
                "gestante_id": "G-X",
                "establecimiento_origen_id": 1001,
                "motivo_referencia": "Hipertensión",
                "edad_gestacional_semanas": "30",
                "edad_gestacional_dias": 1,
                "estado": "ACTIVA"
            })],
        )
        .await;

    let created = h.create("S1").await;
    assert_eq!(created.referral.display_number, "COR-000042");

    let history = h.service.get_referral(&h.establishment, "REF-X").await.unwrap();
    assert_eq!(history.referral.gestational_weeks, 30);
    assert_eq!(history.stage, ReferralStage::New);
}

#[tokio::test]
async fn test_outcome_on_resolved_appointment_writes_nothing() {
    let h = Harness::new().await;
    let created = h.create("S1").await;
    h.outcome(&created.appointment.id, AppointmentStatus::Missed, None, Some("S2"), None)
        .await
        .unwrap();
    let before = h.snapshot().await;

    let result = h
        .outcome(&created.appointment.id, AppointmentStatus::Attended, Some(TestResult::NonReactive), Some("S1"), None)
        .await;

    assert_matches!(result, Err(ReferralError::InvalidTransition(_)));
    assert_eq!(h.snapshot().await, before);
    assert_eq!(h.slot_status("S1").await, "libre");
    h.assert_invariants().await;
}

/// Marks one appointment as attended right before its conditional status write,
/// as a second user resolving it at the same time would.
struct ResolvedElsewhere {
    inner: Arc<MemoryStore>,
    appointment_id: String,
    fired: AtomicBool,
}

#[async_trait]
impl RecordStore for ResolvedElsewhere {
    async fn read(&self, sheet: Sheet) -> Result<Vec<Record>, StoreError> {
        self.inner.read(sheet).await
    }

    async fn create(&self, sheet: Sheet, record: Record) -> Result<(), StoreError> {
        self.inner.create(sheet, record).await
    }

    async fn update(&self, sheet: Sheet, record: Record) -> Result<(), StoreError> {
        self.inner.update(sheet, record).await
    }

    async fn delete(&self, sheet: Sheet, id: &str) -> Result<(), StoreError> {
        self.inner.delete(sheet, id).await
    }

    async fn compare_and_update(
        &self,
        sheet: Sheet,
        id: &str,
        field: &str,
        expected: &str,
        record: Record,
    ) -> Result<bool, StoreError> {
        if sheet == Sheet::Appointments && id == self.appointment_id && !self.fired.swap(true, Ordering::SeqCst) {
            let mut resolved = Record::new();
            resolved.insert("id".to_string(), Value::String(id.to_string()));
            resolved.insert(
                columns::APPOINTMENT_STATUS.to_string(),
                Value::String(AppointmentStatus::Attended.as_cell().to_string()),
            );
            self.inner.update(sheet, resolved).await?;
        }
        self.inner.compare_and_update(sheet, id, field, expected, record).await
    }
}

#[tokio::test]
async fn test_concurrently_resolved_appointment_releases_claimed_slot() {
    let h = Harness::new().await;
    let created = h.create("S1").await;
    let racing = ReferralService::new(Arc::new(ResolvedElsewhere {
        inner: h.store.clone(),
        appointment_id: created.appointment.id.clone(),
        fired: AtomicBool::new(false),
    }));

    let result = racing
        .record_visit_outcome(
            &h.hospital,
            &created.appointment.id,
            RecordOutcomeRequest {
                outcome: AppointmentStatus::Attended,
                result: Some(TestResult::NonReactive),
                teleconsultation: false,
                notes: String::new(),
                next_slot_id: Some("S2".to_string()),
                specialty: None,
            },
        )
        .await;

    assert_matches!(result, Err(ReferralError::InvalidTransition(_)));
    assert_eq!(h.slot_status("S2").await, "libre");
    assert_eq!(h.appointments().await.len(), 1);
    assert!(h.store.rows(Sheet::Visits).await.is_empty());
}

#[tokio::test]
async fn test_rows_written_by_the_web_app_decode() {
    let h = Harness::new().await;
    h.store
        .seed(
            Sheet::Patients,
            vec![SheetFixtures::patient("G-1714567890123", "40404040", "Rosa Legado")],
        )
        .await;
    h.store
        .seed(
            Sheet::Referrals,
            vec![json!({
                "id": "REF-1714567890123",
                "numero_correlativo": "COR-4821",
                "fecha_registro": "5/1/2024",
                "gestante_id": "G-1714567890123",
                "establecimiento_origen_id": "000001001",
                "edad_gestacional_semanas": "28",
                "edad_gestacional_dias": "3",
                "motivo_referencia": "Preeclampsia",
                "horario_id": "S9",
                "estado (ACTIVA/CERRADA)": "ACTIVA"
            })],
        )
        .await;
    h.store
        .seed(
            Sheet::Appointments,
            vec![json!({
                "id": "CITA-1714567890456",
                "referencia_id": "REF-1714567890123",
                "fecha": "2024-05-20T05:00:00.000Z",
                "hora": "1899-12-30T14:00:00.000Z",
                "tipo (PRIMERA/SEGUNDA)": "PRIMERA",
                "estado (PROGRAMADA/ASISTIO/NO_ASISTIO/REPROGRAMADA)": "PROGRAMADA"
            })],
        )
        .await;
    h.store
        .seed(
            Sheet::Visits,
            vec![json!({
                "id": "AT-1714567890789",
                "cita_id": "CITA-OLD",
                "resultado (REACTIVO/NO_REACTIVO/PATOLOGICO/DERIVADO)": "NO_REACTIVO",
                "acude (TRUE/FALSE)": "TRUE",
                "teleorientacion (TRUE/FALSE)": "FALSE",
                "observaciones": "",
                "cerrada (TRUE/FALSE)": "FALSE"
            })],
        )
        .await;

    let detail = h.service.get_referral(&h.establishment, "REF-1714567890123").await.unwrap();
    assert_eq!(detail.referral.registered_on.to_string(), "2024-01-05");
    assert_eq!(detail.stage, ReferralStage::AwaitingFirstVisit);
    assert_eq!(detail.appointments[0].slot_id, "");

    let inbox = InboxService::new(h.store.clone()).hospital_inbox().await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].patient_name, "Rosa Legado");

    let created = h.create("S1").await;
    assert_eq!(created.referral.display_number, "COR-004822");
    let row = h.store.row(Sheet::Referrals, &created.referral.id).await.unwrap();
    assert_eq!(row[columns::REFERRAL_STATUS], "ACTIVA");
    let row = h.store.row(Sheet::Appointments, &created.appointment.id).await.unwrap();
    assert_eq!(row[columns::APPOINTMENT_SEQUENCE], "PRIMERA");
    assert_eq!(row[columns::APPOINTMENT_STATUS], "PROGRAMADA");

    // The legacy appointment has no linked slot; resolving it only claims the next one.
    let missed = h
        .outcome("CITA-1714567890456", AppointmentStatus::Missed, None, Some("S2"), None)
        .await
        .unwrap();
    assert_eq!(missed.next_appointment.unwrap().slot_id, "S2");
    let row = h.store.row(Sheet::Appointments, "CITA-1714567890456").await.unwrap();
    assert_eq!(row[columns::APPOINTMENT_STATUS], "NO_ASISTIO");
    assert_eq!(h.slot_status("S2").await, "copado");
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_cancel_referral_without_linked_slot() {
    let h = Harness::new().await;
    h.store
        .seed(
            Sheet::Referrals,
            vec![json!({
                "id": "REF-OLD",
                "numero_correlativo": "COR-77",
                "fecha_registro": "15/10/2024",
                "gestante_id": "G-OLD",
                "establecimiento_origen_id": "000001001",
                "motivo_referencia": "Anemia",
                "edad_gestacional_semanas": 20,
                "edad_gestacional_dias": 0,
                "estado (ACTIVA/CERRADA)": "ACTIVA"
            })],
        )
        .await;
    h.store
        .seed(
            Sheet::Appointments,
            vec![json!({
                "id": "CITA-OLD",
                "referencia_id": "REF-OLD",
                "fecha": "2024-10-20",
                "hora": "08:30",
                "tipo (PRIMERA/SEGUNDA)": "PRIMERA",
                "estado (PROGRAMADA/ASISTIO/NO_ASISTIO/REPROGRAMADA)": "PROGRAMADA"
            })],
        )
        .await;
    let slots_before = h.store.rows(Sheet::Slots).await;

    h.service.cancel_referral(&h.establishment, "REF-OLD").await.unwrap();

    assert!(h.store.rows(Sheet::Referrals).await.is_empty());
    assert!(h.store.rows(Sheet::Appointments).await.is_empty());
    assert_eq!(h.store.rows(Sheet::Slots).await, slots_before);
}
