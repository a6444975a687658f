use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// The signed-in user as returned by login, register and the user endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserSummary {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(rename = "firstName", default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName", default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl UserSummary {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// "First Last" when both names are known, otherwise the username.
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => {
                format!("{} {}", first, last)
            }
            (Some(first), _) if !first.is_empty() => first.to_string(),
            _ => self.username.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: Option<&str>, last: Option<&str>) -> UserSummary {
        UserSummary {
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            role: Role::User,
            first_name: first.map(String::from),
            last_name: last.map(String::from),
        }
    }

    #[test]
    fn test_display_name() {
        assert_eq!(user(Some("Ada"), Some("Lovelace")).display_name(), "Ada Lovelace");
        assert_eq!(user(Some("Ada"), None).display_name(), "Ada");
        assert_eq!(user(None, Some("Lovelace")).display_name(), "ada");
        assert_eq!(user(Some(""), Some("")).display_name(), "ada");
    }

    #[test]
    fn test_user_summary_from_api_json() {
        let json = r#"{"username":"grace","email":"grace@example.com","role":"admin","firstName":"Grace"}"#;
        let parsed: UserSummary = serde_json::from_str(json).unwrap();
        assert!(parsed.is_admin());
        assert_eq!(parsed.first_name.as_deref(), Some("Grace"));
        assert_eq!(parsed.last_name, None);
    }

    #[test]
    fn test_role_defaults_to_user() {
        let json = r#"{"username":"bob","email":"bob@example.com"}"#;
        let parsed: UserSummary = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.role, Role::User);
        assert_eq!(parsed.role.to_string(), "user");
    }
}
