use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info};

use auth_cell::models::User;
use shared_database::{typed, RecordStore, Sheet};
use shared_models::{
    establishment::{establishment_name, normalize_establishment_id},
    Establishment,
};
use shared_utils::ids::{self, new_id};

use crate::models::{CatalogError, CreateUserRequest, UserView};

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

pub struct UserService {
    store: Arc<dyn RecordStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<UserView>, CatalogError> {
        let store = self.store.as_ref();
        let (users, establishments) = futures::try_join!(
            typed::fetch_all::<User>(store, Sheet::Users),
            typed::fetch_all::<Establishment>(store, Sheet::Establishments),
        )?;

        Ok(users
            .into_iter()
            .map(|user| {
                let establishment_id = normalize_establishment_id(&user.establishment_id);
                UserView {
                    establishment_name: establishment_name(&establishments, &establishment_id)
                        .map(str::to_string),
                    id: user.id,
                    full_name: user.full_name,
                    email: user.email,
                    national_id: user.national_id,
                    establishment_id,
                }
            })
            .collect())
    }

    pub async fn create(&self, request: CreateUserRequest) -> Result<User, CatalogError> {
        let user = User {
            id: new_id(ids::USER),
            full_name: request.full_name.trim().to_string(),
            email: request.email.trim().to_lowercase(),
            national_id: request.national_id.trim().to_string(),
            establishment_id: normalize_establishment_id(&request.establishment_id),
        };

        if user.full_name.is_empty()
            || user.national_id.is_empty()
            || request.establishment_id.trim().is_empty()
        {
            return Err(CatalogError::ValidationError(
                "Name, email, national ID and establishment are required".to_string(),
            ));
        }
        if !EMAIL.is_match(&user.email) {
            return Err(CatalogError::ValidationError(format!("Invalid email '{}'", user.email)));
        }

        debug!("Creating user {}", user.email);
        let existing: Vec<User> = typed::fetch_all(self.store.as_ref(), Sheet::Users).await?;
        if existing.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(CatalogError::ValidationError(format!(
                "User {} already exists",
                user.email
            )));
        }

        typed::insert(self.store.as_ref(), Sheet::Users, &user).await?;
        info!("Created user {} for establishment {}", user.id, user.establishment_id);
        Ok(user)
    }

    pub async fn delete(&self, user_id: &str) -> Result<(), CatalogError> {
        let users: Vec<User> = typed::fetch_all(self.store.as_ref(), Sheet::Users).await?;
        if !users.iter().any(|u| u.id == user_id) {
            return Err(CatalogError::NotFound(format!("User {}", user_id)));
        }

        self.store.delete(Sheet::Users, user_id).await?;
        info!("Deleted user {}", user_id);
        Ok(())
    }
}
