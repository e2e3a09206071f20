use std::sync::Arc;
use chrono::{Duration, Local, NaiveDateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{InMemoryStore, Repositories};
use shared_models::auth::{Principal, Role, User};
use shared_models::scheduling::{Account, Professional, Service};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "USER".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn professional(email: &str) -> Self {
        Self::new(email, "PROFESSIONAL")
    }

    pub fn customer(email: &str) -> Self {
        Self::new(email, "USER")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "ADMIN")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            roles: vec![self.role.clone()],
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": "authenticated",
            "app_metadata": { "roles": [user.role] },
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

// ==============================================================================
// SCHEDULING FIXTURES
// ==============================================================================

/// A naive local timestamp `days` from today at `hour:minute`.
pub fn future_slot(days: i64, hour: u32, minute: u32) -> NaiveDateTime {
    (Local::now().date_naive() + Duration::days(days))
        .and_hms_opt(hour, minute, 0)
        .expect("valid wall-clock time")
}

pub fn account(name: &str, email: &str, roles: &[Role]) -> Account {
    Account {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: email.to_string(),
        phone: None,
        roles: roles.to_vec(),
    }
}

pub fn principal_for(account: &Account) -> Principal {
    Principal::new(account.id.to_string(), Some(account.email.clone()), account.roles.clone())
}

/// An in-memory store seeded with one admin, two customers, one
/// professional owning a "30 min" service, and an unowned "1 hora" service.
pub struct SchedulingFixture {
    pub store: Arc<InMemoryStore>,
    pub repositories: Repositories,
    pub admin: Account,
    pub customer: Account,
    pub other_customer: Account,
    pub professional_account: Account,
    pub professional: Professional,
    pub service: Service,
    pub global_service: Service,
}

impl SchedulingFixture {
    pub async fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());

        let admin = account("Admin", "admin@citas.test", &[Role::Admin]);
        let customer = account("Carla Cliente", "carla@citas.test", &[Role::User]);
        let other_customer = account("Otto Otro", "otto@citas.test", &[Role::User]);
        let professional_account = account("Pablo Pro", "pablo@citas.test", &[Role::Professional]);

        for acc in [&admin, &customer, &other_customer, &professional_account] {
            store.insert_account(acc.clone()).await.expect("fixture account");
        }

        let professional = Professional {
            id: Uuid::new_v4(),
            account_id: professional_account.id,
            specialty: Some("Fisioterapia".to_string()),
            available_hours: Some("L-V 08:00-18:00".to_string()),
        };
        store.insert_professional(professional.clone()).await.expect("fixture professional");

        let service = Service {
            id: Uuid::new_v4(),
            name: "Masaje descontracturante".to_string(),
            description: None,
            duration: Some("30 min".to_string()),
            price: Some(35.0),
            professional_id: Some(professional.id),
        };
        let global_service = Service {
            id: Uuid::new_v4(),
            name: "Evaluación general".to_string(),
            description: Some("Primera visita".to_string()),
            duration: Some("1 hora".to_string()),
            price: None,
            professional_id: None,
        };
        store.insert_service(service.clone()).await;
        store.insert_service(global_service.clone()).await;

        let repositories = Repositories::from_store(store.clone());

        Self {
            store,
            repositories,
            admin,
            customer,
            other_customer,
            professional_account,
            professional,
            service,
            global_service,
        }
    }

    pub fn admin_principal(&self) -> Principal {
        principal_for(&self.admin)
    }

    pub fn customer_principal(&self) -> Principal {
        principal_for(&self.customer)
    }

    pub fn other_customer_principal(&self) -> Principal {
        principal_for(&self.other_customer)
    }

    pub fn professional_principal(&self) -> Principal {
        principal_for(&self.professional_account)
    }

    /// A principal whose email has no backing account.
    pub fn unknown_principal(&self) -> Principal {
        Principal::new("ghost", Some("ghost@citas.test".to_string()), [Role::User])
    }

    /// Mirror of the token a fixture account would present.
    pub fn test_user_for(&self, account: &Account) -> TestUser {
        let role = account.roles.first().copied().unwrap_or(Role::User);
        TestUser {
            id: account.id.to_string(),
            email: account.email.clone(),
            role: role.to_string(),
        }
    }
}
