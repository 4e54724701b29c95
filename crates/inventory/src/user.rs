use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kitroom_core::{DomainError, Entity, UserId, ValueObject};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Employee,
    Manager,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Employee => "employee",
            UserRole::Manager => "manager",
            UserRole::Admin => "admin",
        }
    }
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Employee
    }
}

impl core::str::FromStr for UserRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "employee" => Ok(UserRole::Employee),
            "manager" => Ok(UserRole::Manager),
            "admin" => Ok(UserRole::Admin),
            other => Err(DomainError::validation(format!(
                "role must be one of: employee, manager, admin (got '{other}')"
            ))),
        }
    }
}

/// A borrower. `ldap` is the unique, immutable directory identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub ldap: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: UserRole,
    pub department: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// How a caller names a user.
///
/// Lookup by ldap only matches active users; lookup by id matches regardless
/// of the active flag (history must stay resolvable after deactivation).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserLookup {
    Id(UserId),
    Ldap(String),
}

impl UserLookup {
    pub fn matches(&self, user: &User) -> bool {
        match self {
            UserLookup::Id(id) => user.id == *id,
            UserLookup::Ldap(ldap) => user.active && user.ldap == *ldap,
        }
    }
}

impl core::fmt::Display for UserLookup {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UserLookup::Id(id) => write!(f, "id {id}"),
            UserLookup::Ldap(ldap) => write!(f, "ldap '{ldap}'"),
        }
    }
}

impl From<UserId> for UserLookup {
    fn from(value: UserId) -> Self {
        UserLookup::Id(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub ldap: String,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub department: Option<String>,
}

impl NewUser {
    pub fn new(ldap: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            ldap: ldap.into(),
            full_name: full_name.into(),
            email: None,
            role: None,
            department: None,
        }
    }

    pub fn into_user(self, id: UserId, now: DateTime<Utc>) -> Result<User, DomainError> {
        let ldap = self.ldap.trim();
        if ldap.is_empty() {
            return Err(DomainError::validation("ldap cannot be empty"));
        }
        if ldap.chars().any(char::is_whitespace) {
            return Err(DomainError::validation("ldap cannot contain whitespace"));
        }
        if self.full_name.trim().is_empty() {
            return Err(DomainError::validation("full_name cannot be empty"));
        }
        validate_email(self.email.as_deref())?;

        Ok(User {
            id,
            ldap: ldap.to_string(),
            full_name: self.full_name.trim().to_string(),
            email: self.email,
            role: self.role.unwrap_or_default(),
            department: self.department,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Mutable profile fields of a user. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl ValueObject for UserUpdate {}

impl UserUpdate {
    pub fn deactivate() -> Self {
        Self {
            active: Some(false),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &UserUpdate::default()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.is_empty() {
            return Err(DomainError::validation("update contains no fields"));
        }
        if self.full_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DomainError::validation("full_name cannot be empty"));
        }
        validate_email(self.email.as_deref())
    }

    pub fn apply_to(&self, user: &mut User, now: DateTime<Utc>) {
        if let Some(name) = &self.full_name {
            user.full_name = name.trim().to_string();
        }
        if let Some(email) = &self.email {
            user.email = Some(email.clone());
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(department) = &self.department {
            user.department = Some(department.clone());
        }
        if let Some(active) = self.active {
            user.active = active;
        }
        user.updated_at = now;
    }
}

fn validate_email(email: Option<&str>) -> Result<(), DomainError> {
    match email {
        Some(e) if !e.contains('@') => Err(DomainError::validation("email must contain '@'")),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        NewUser::new("ahuang", "Alice Huang")
            .into_user(UserId::new(), Utc::now())
            .unwrap()
    }

    #[test]
    fn new_user_is_active_employee() {
        let user = alice();
        assert!(user.active);
        assert_eq!(user.role, UserRole::Employee);
    }

    #[test]
    fn ldap_lookup_skips_inactive_users() {
        let mut user = alice();
        let by_ldap = UserLookup::Ldap("ahuang".into());
        let by_id = UserLookup::Id(user.id);
        assert!(by_ldap.matches(&user));

        UserUpdate::deactivate().apply_to(&mut user, Utc::now());
        assert!(!by_ldap.matches(&user));
        assert!(by_id.matches(&user));
    }

    #[test]
    fn invalid_profiles_are_rejected() {
        assert!(NewUser::new("", "Nobody").into_user(UserId::new(), Utc::now()).is_err());
        assert!(NewUser::new("a b", "Spaced").into_user(UserId::new(), Utc::now()).is_err());

        let update = UserUpdate {
            email: Some("not-an-email".into()),
            ..UserUpdate::default()
        };
        assert!(update.validate().is_err());
        assert!(UserUpdate::default().validate().is_err());
    }
}
