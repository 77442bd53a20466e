use uuid::Uuid;

pub const PATIENT: &str = "G";
pub const REFERRAL: &str = "REF";
pub const APPOINTMENT: &str = "CITA";
pub const VISIT: &str = "AT";
pub const SPECIALIST_REFERRAL: &str = "DER";
pub const SLOT: &str = "SLOT";
pub const SPECIALTY: &str = "ESP";
pub const USER: &str = "USU";

/// Opaque row identifier, e.g. `REF-3f2a...`.
pub fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}
