use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use referral_cell::models::{Appointment, Referral, VisitRecord, VisitSequence};
use shared_database::{typed, RecordStore, Sheet};
use shared_models::{establishment::normalize_establishment_id, Establishment};

use crate::models::{EstablishmentCount, Period, ReportingError, Summary};

#[derive(Default, Clone, Copy)]
struct Tally {
    first: u32,
    second: u32,
}

impl Tally {
    fn add(&mut self, sequence: VisitSequence) {
        match sequence {
            VisitSequence::First => self.first += 1,
            VisitSequence::Second => self.second += 1,
        }
    }
}

pub struct ReportingService {
    store: Arc<dyn RecordStore>,
}

impl ReportingService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Counts visits by sequence over the period, in total and per origin
    /// establishment. Establishments without visits are left out.
    pub async fn summarize(&self, period: Period) -> Result<Summary, ReportingError> {
        let store = self.store.as_ref();
        let (visits, appointments, referrals, establishments) = futures::try_join!(
            typed::fetch_all::<VisitRecord>(store, Sheet::Visits),
            typed::fetch_all::<Appointment>(store, Sheet::Appointments),
            typed::fetch_all::<Referral>(store, Sheet::Referrals),
            typed::fetch_all::<Establishment>(store, Sheet::Establishments),
        )?;
        debug!("Summarizing {} visit record(s) for {:?}", visits.len(), period);

        let appointments: HashMap<&str, &Appointment> =
            appointments.iter().map(|a| (a.id.as_str(), a)).collect();
        let origins: HashMap<&str, String> = referrals
            .iter()
            .map(|r| (r.id.as_str(), normalize_establishment_id(&r.origin_establishment_id)))
            .collect();

        let mut total = Tally::default();
        let mut by_establishment: HashMap<String, Tally> = HashMap::new();
        for visit in &visits {
            let Some(appointment) = appointments.get(visit.appointment_id.as_str()) else {
                debug!("Visit {} has no appointment", visit.id);
                continue;
            };
            if !period.contains(appointment.date) {
                continue;
            }

            total.add(appointment.sequence);
            if let Some(origin) = origins.get(appointment.referral_id.as_str()) {
                by_establishment.entry(origin.clone()).or_default().add(appointment.sequence);
            }
        }

        let per_establishment: Vec<EstablishmentCount> = establishments
            .iter()
            .filter_map(|e| {
                let tally = by_establishment.get(&e.normalized_id())?;
                Some(EstablishmentCount {
                    establishment_id: e.normalized_id(),
                    name: e.name.clone(),
                    first_visit_count: tally.first,
                    second_visit_count: tally.second,
                })
            })
            .collect();

        info!(
            "Summary for {:?}: {} first, {} second visit(s) across {} establishment(s)",
            period,
            total.first,
            total.second,
            per_establishment.len()
        );
        Ok(Summary {
            period,
            first_visit_count: total.first,
            second_visit_count: total.second,
            per_establishment,
        })
    }
}
