use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use shared_database::{typed, RecordStore, Sheet};
use shared_utils::ids::{self, new_id};

use crate::error::ReferralError;
use crate::models::{columns, Slot, SlotStatus};

/// Hands out hospital slots. Claims go through the store's conditional write,
/// so two claims on the same FREE slot cannot both succeed.
pub struct SlotAllocator {
    store: Arc<dyn RecordStore>,
}

impl SlotAllocator {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Every slot, ordered by date and time.
    pub async fn list_all(&self) -> Result<Vec<Slot>, ReferralError> {
        let mut slots: Vec<Slot> = typed::fetch_all(self.store.as_ref(), Sheet::Slots).await?;
        slots.sort_by_key(|s| (s.date, s.time));
        Ok(slots)
    }

    pub async fn list_free(&self) -> Result<Vec<Slot>, ReferralError> {
        let slots = self.list_all().await?;
        Ok(slots.into_iter().filter(|s| s.status == SlotStatus::Free).collect())
    }

    pub async fn get(&self, slot_id: &str) -> Result<Slot, ReferralError> {
        typed::fetch_one(self.store.as_ref(), Sheet::Slots, slot_id)
            .await?
            .ok_or_else(|| ReferralError::NotFound(format!("Slot {}", slot_id)))
    }

    /// Flips a FREE slot to OCCUPIED. Nothing is written when the slot is taken.
    pub async fn claim(&self, slot_id: &str) -> Result<Slot, ReferralError> {
        let slot = self.get(slot_id).await?;
        if slot.status == SlotStatus::Occupied {
            warn!("Slot {} is already occupied", slot_id);
            return Err(ReferralError::SlotUnavailable(slot_id.to_string()));
        }

        let applied = self
            .store
            .compare_and_update(
                Sheet::Slots,
                slot_id,
                columns::SLOT_STATUS,
                SlotStatus::Free.as_cell(),
                status_patch(SlotStatus::Occupied),
            )
            .await?;
        if !applied {
            warn!("Slot {} was claimed concurrently", slot_id);
            return Err(ReferralError::SlotUnavailable(slot_id.to_string()));
        }

        info!("Claimed slot {} ({} {})", slot_id, slot.date, slot.time.format("%H:%M"));
        Ok(Slot { status: SlotStatus::Occupied, ..slot })
    }

    /// Flips a slot back to FREE; a FREE slot is left as is.
    pub async fn release(&self, slot_id: &str) -> Result<(), ReferralError> {
        if slot_id.trim().is_empty() {
            debug!("Appointment has no linked slot, nothing to release");
            return Ok(());
        }
        let slot = self.get(slot_id).await?;
        if slot.status == SlotStatus::Free {
            debug!("Slot {} already free", slot_id);
            return Ok(());
        }

        typed::patch(
            self.store.as_ref(),
            Sheet::Slots,
            slot_id,
            Value::Object(status_patch(SlotStatus::Free)),
        )
        .await?;
        info!("Released slot {}", slot_id);
        Ok(())
    }

    pub async fn create_slot(&self, date: NaiveDate, time: NaiveTime) -> Result<Slot, ReferralError> {
        let existing = self.list_all().await?;
        if existing.iter().any(|s| s.date == date && s.time == time) {
            return Err(ReferralError::ValidationError(format!(
                "A slot already exists on {} at {}",
                date,
                time.format("%H:%M")
            )));
        }

        let slot = Slot {
            id: new_id(ids::SLOT),
            date,
            time,
            status: SlotStatus::Free,
        };
        typed::insert(self.store.as_ref(), Sheet::Slots, &slot).await?;

        info!("Created slot {} for {} {}", slot.id, date, time.format("%H:%M"));
        Ok(slot)
    }

    /// Removes a FREE slot. Occupied slots are bound to an appointment and stay.
    pub async fn delete_slot(&self, slot_id: &str) -> Result<(), ReferralError> {
        let slot = self.get(slot_id).await?;
        if slot.status == SlotStatus::Occupied {
            return Err(ReferralError::InvalidTransition(format!(
                "Slot {} is occupied and cannot be deleted",
                slot_id
            )));
        }

        self.store.delete(Sheet::Slots, slot_id).await?;
        info!("Deleted slot {}", slot_id);
        Ok(())
    }
}

fn status_patch(status: SlotStatus) -> Map<String, Value> {
    let mut record = Map::new();
    record.insert(columns::SLOT_STATUS.to_string(), Value::String(status.as_cell().to_string()));
    record
}
