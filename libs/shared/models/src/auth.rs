use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

impl JwtClaims {
    /// Role names carried by the token: the `role` claim plus any
    /// `app_metadata.roles` array entries.
    pub fn role_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.role.iter().cloned().collect();

        if let Some(roles) = self
            .app_metadata
            .as_ref()
            .and_then(|meta| meta.get("roles"))
            .and_then(|roles| roles.as_array())
        {
            names.extend(roles.iter().filter_map(|r| r.as_str()).map(str::to_string));
        }

        names
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

// ==============================================================================
// ROLES AND PRINCIPALS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Professional,
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "ADMIN"),
            Role::Professional => write!(f, "PROFESSIONAL"),
            Role::User => write!(f, "USER"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        match normalized.trim_start_matches("ROLE_") {
            "ADMIN" => Ok(Role::Admin),
            "PROFESSIONAL" | "PROFESIONAL" => Ok(Role::Professional),
            "USER" | "USUARIO" | "AUTHENTICATED" => Ok(Role::User),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// The acting identity for an operation. Always passed explicitly; nothing
/// in the scheduling core reads an ambient security context.
#[derive(Debug, Clone, Default)]
pub struct Principal {
    pub subject: String,
    pub email: Option<String>,
    pub roles: BTreeSet<Role>,
    professional_id: OnceLock<Option<Uuid>>,
}

impl Principal {
    pub fn new(
        subject: impl Into<String>,
        email: Option<String>,
        roles: impl IntoIterator<Item = Role>,
    ) -> Self {
        Self {
            subject: subject.into(),
            email,
            roles: roles.into_iter().collect(),
            professional_id: OnceLock::new(),
        }
    }

    /// Build a principal from a validated token user. Unknown role names are
    /// ignored; every authenticated principal holds at least `USER`.
    pub fn from_user(user: &User) -> Self {
        let mut roles: BTreeSet<Role> = user
            .role
            .iter()
            .chain(user.roles.iter())
            .flat_map(|names| names.split(','))
            .filter_map(|name| name.parse().ok())
            .collect();

        if roles.is_empty() {
            roles.insert(Role::User);
        }

        Self {
            subject: user.id.clone(),
            email: user.email.clone(),
            roles,
            professional_id: OnceLock::new(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn is_professional(&self) -> bool {
        self.has_role(Role::Professional)
    }

    /// `None` until the owned professional profile has been looked up.
    pub fn cached_professional_id(&self) -> Option<Option<Uuid>> {
        self.professional_id.get().copied()
    }

    /// Memoise the professional profile lookup; the first value wins.
    pub fn remember_professional_id(&self, professional_id: Option<Uuid>) -> Option<Uuid> {
        *self.professional_id.get_or_init(|| professional_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_with(role: Option<&str>, roles: &[&str]) -> User {
        User {
            id: "sub-1".to_string(),
            email: Some("ana@example.com".to_string()),
            role: role.map(str::to_string),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            metadata: None,
            created_at: None,
        }
    }

    #[test]
    fn test_role_parsing_accepts_prefixed_and_localized_names() {
        assert_eq!("ROLE_ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("profesional".parse::<Role>(), Ok(Role::Professional));
        assert_eq!("authenticated".parse::<Role>(), Ok(Role::User));
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_principal_from_user_defaults_to_user_role() {
        let principal = Principal::from_user(&user_with(Some("service_role"), &[]));
        assert!(principal.has_role(Role::User));
        assert!(!principal.is_admin());
    }

    #[test]
    fn test_principal_from_user_merges_roles() {
        let principal = Principal::from_user(&user_with(Some("USER"), &["PROFESSIONAL,ADMIN"]));
        assert!(principal.is_admin());
        assert!(principal.is_professional());
        assert_eq!(principal.roles.len(), 3);
    }

    #[test]
    fn test_professional_id_is_memoised_once() {
        let principal = Principal::new("sub", None, [Role::Professional]);
        assert_eq!(principal.cached_professional_id(), None);

        let first = Uuid::new_v4();
        assert_eq!(principal.remember_professional_id(Some(first)), Some(first));
        assert_eq!(principal.remember_professional_id(None), Some(first));
        assert_eq!(principal.cached_professional_id(), Some(Some(first)));
    }

    #[test]
    fn test_claims_role_names_include_app_metadata() {
        let claims: JwtClaims = serde_json::from_value(json!({
            "sub": "abc",
            "role": "authenticated",
            "app_metadata": { "roles": ["ADMIN"] }
        }))
        .unwrap();

        assert_eq!(claims.role_names(), vec!["authenticated".to_string(), "ADMIN".to_string()]);
    }
}
