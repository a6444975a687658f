use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "devjourney";

/// OS keychain storage for the refresh-token cookie.
///
/// The cookie jar only lives as long as the process; the CLI parks the
/// cookie here between runs, keyed by API host.
pub struct CredentialStore;

impl CredentialStore {
    /// Store the cookie header for an API host in the OS keychain
    pub fn store(api_host: &str, cookie_header: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, api_host)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(cookie_header)
            .context("Failed to store refresh cookie in keychain")?;
        Ok(())
    }

    /// Retrieve the cookie header for an API host, if one was stored
    pub fn get(api_host: &str) -> Result<Option<String>> {
        let entry = Entry::new(SERVICE_NAME, api_host)
            .context("Failed to create keyring entry")?;
        match entry.get_password() {
            Ok(cookie) => Ok(Some(cookie)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve refresh cookie from keychain"),
        }
    }

    /// Delete the stored cookie for an API host
    pub fn delete(api_host: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, api_host)
            .context("Failed to create keyring entry")?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete refresh cookie from keychain"),
        }
    }
}
