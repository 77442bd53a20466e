use std::sync::Arc;

use tracing::{debug, info, warn};

use shared_database::{typed, RecordStore, Sheet};
use shared_models::{
    establishment::{establishment_name, normalize_establishment_id},
    Establishment, Role, Session,
};

use crate::models::{AuthError, LoginRequest, User};

pub struct LoginService {
    store: Arc<dyn RecordStore>,
    hospital_establishment_id: String,
}

impl LoginService {
    pub fn new(store: Arc<dyn RecordStore>, hospital_establishment_id: &str) -> Self {
        Self {
            store,
            hospital_establishment_id: normalize_establishment_id(hospital_establishment_id),
        }
    }

    /// Plain lookup of email and national ID against the user sheet.
    pub async fn login(&self, request: &LoginRequest) -> Result<Session, AuthError> {
        if request.email.trim().is_empty() || request.national_id.trim().is_empty() {
            return Err(AuthError::ValidationError(
                "Email and national ID are required".to_string(),
            ));
        }
        debug!("Login attempt for {}", request.email.trim());

        let store = self.store.as_ref();
        let (users, establishments) = futures::try_join!(
            typed::fetch_all::<User>(store, Sheet::Users),
            typed::fetch_all::<Establishment>(store, Sheet::Establishments),
        )?;

        let user = users
            .into_iter()
            .find(|u| u.matches_credentials(&request.email, &request.national_id))
            .ok_or_else(|| {
                warn!("Rejected login for {}", request.email.trim());
                AuthError::InvalidCredentials
            })?;

        let session = self.session_for(user, &establishments);
        info!("User {} signed in as {}", session.user_id, session.role);
        Ok(session)
    }

    fn session_for(&self, user: User, establishments: &[Establishment]) -> Session {
        let establishment_id = normalize_establishment_id(&user.establishment_id);
        let role = if establishment_id == self.hospital_establishment_id {
            Role::Hospital
        } else {
            Role::Establishment
        };

        Session {
            user_id: user.id,
            name: user.full_name,
            email: user.email.trim().to_string(),
            establishment_name: establishment_name(establishments, &establishment_id)
                .map(str::to_string),
            establishment_id,
            role,
        }
    }
}
