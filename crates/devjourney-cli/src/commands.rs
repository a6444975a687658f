use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use devjourney_core::api::Method;
use devjourney_core::{
    ApiError, ApiRequest, Config, FileStore, ProfileUpdate, RegisterRequest, SessionGateway,
    UserSummary,
};

use crate::Command;

/// Read instead of prompting when set (for scripts)
const ENV_PASSWORD: &str = "DEVJOURNEY_PASSWORD";

pub async fn run(
    command: Command,
    gateway: &SessionGateway,
    store: &FileStore,
    config: &mut Config,
) -> Result<()> {
    match command {
        Command::Login { email } => {
            let email = match email.or_else(|| config.last_email.clone()) {
                Some(email) => email,
                None => anyhow::bail!("No email given; pass --email"),
            };
            let password = read_password()?;
            let bundle = gateway.login(&email, &password).await.map_err(explain)?;

            config.last_email = Some(email);
            config.save().context("Failed to save config")?;
            println!("Signed in as {}", describe(&bundle.user));
        }
        Command::Register {
            username,
            email,
            first_name,
            last_name,
        } => {
            let request = RegisterRequest {
                username,
                email: email.clone(),
                password: read_password()?,
                first_name,
                last_name,
            };
            let bundle = gateway.register(&request).await.map_err(explain)?;

            config.last_email = Some(email);
            config.save().context("Failed to save config")?;
            println!("Welcome, {}", describe(&bundle.user));
        }
        Command::Logout => {
            let outcome = gateway.logout().await;
            if outcome.is_confirmed() {
                println!("Signed out");
            } else {
                println!("Signed out locally (server did not confirm)");
            }
        }
        Command::Whoami { require_admin } => {
            let fetched = if require_admin {
                gateway.require_admin().await
            } else {
                gateway.current_user().await
            };
            match fetched {
                Ok(user) => println!("{}", describe(&user)),
                Err(e) if e.is_session_expired() => {
                    println!("Not signed in");
                    return Ok(());
                }
                Err(e @ ApiError::AccessDenied(_)) => return Err(e.into()),
                Err(e) => match gateway.session().user() {
                    Some(user) => {
                        warn!(error = %e, "Could not fetch current user, showing stored copy");
                        println!("{} (cached)", describe(&user));
                    }
                    None => return Err(explain(e)),
                },
            }
            if let Some(updated_at) = store.updated_at() {
                println!("Session updated {}", age_display(updated_at, Utc::now()));
            }
        }
        Command::Profile {
            username,
            email,
            first_name,
            last_name,
            password,
        } => {
            let update = ProfileUpdate {
                username,
                email,
                first_name,
                last_name,
                password: if password { Some(read_password()?) } else { None },
            };
            if update.is_empty() {
                anyhow::bail!("Nothing to update; pass at least one field");
            }
            let user = gateway.update_profile(&update).await.map_err(explain)?;
            println!("Profile updated: {}", describe(&user));
        }
        Command::Refresh => {
            gateway.refresh().await.map_err(explain)?;
            println!("Access token refreshed");
        }
        Command::Request { method, path, data } => {
            let method = Method::from_str(&method.to_uppercase())
                .with_context(|| format!("Invalid HTTP method: {}", method))?;
            let mut request = ApiRequest::new(method, path);
            if let Some(data) = data {
                let body: serde_json::Value =
                    serde_json::from_str(&data).context("--data must be valid JSON")?;
                request = request.with_body(body);
            }

            let response = gateway.send(request).await.map_err(explain)?;
            debug!(status = %response.status, bytes = response.body.len(), "Request complete");
            if !response.is_empty() {
                print_body(&response.text());
            }
        }
    }
    Ok(())
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(ENV_PASSWORD) {
        return Ok(password);
    }
    rpassword::prompt_password("Password: ").context("Failed to read password")
}

fn describe(user: &UserSummary) -> String {
    format!("{} <{}> ({})", user.display_name(), user.email, user.role)
}

/// Pretty-print JSON bodies, pass anything else through
fn print_body(body: &str) {
    if body.is_empty() {
        return;
    }
    match serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
    {
        Some(pretty) => println!("{}", pretty),
        None => println!("{}", body),
    }
}

/// Turn field-level validation errors into one line per field
fn explain(error: ApiError) -> anyhow::Error {
    match error {
        ApiError::Validation(errors) => {
            let mut lines = vec![errors
                .message
                .clone()
                .unwrap_or_else(|| "Request rejected".to_string())];
            for field in &errors.fields {
                lines.push(format!("  {}: {}", field.field, field.message));
            }
            anyhow::anyhow!(lines.join("\n"))
        }
        other => other.into(),
    }
}

fn age_display(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - then).num_minutes();
    if minutes < 1 {
        // Also covers clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        format!("{}h ago", minutes / 60)
    } else {
        format!("{}d ago", minutes / 1440)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use devjourney_core::api::{FieldError, ValidationErrors};

    #[test]
    fn test_age_display() {
        let now = Utc::now();
        assert_eq!(age_display(now, now), "just now");
        assert_eq!(age_display(now + Duration::minutes(5), now), "just now");
        assert_eq!(age_display(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(age_display(now - Duration::minutes(150), now), "2h ago");
        assert_eq!(age_display(now - Duration::days(3), now), "3d ago");
    }

    #[test]
    fn test_explain_validation_lists_fields() {
        let error = ApiError::Validation(ValidationErrors {
            message: None,
            fields: vec![FieldError {
                field: "email".to_string(),
                message: "Email already in use".to_string(),
            }],
        });
        assert_eq!(
            explain(error).to_string(),
            "Request rejected\n  email: Email already in use"
        );
    }

    #[test]
    fn test_explain_passes_other_errors_through() {
        assert_eq!(
            explain(ApiError::RateLimited).to_string(),
            "Rate limited - please wait before retrying"
        );
    }
}
