//! Camera password lookup: environment first, then a hidden interactive prompt.

use anyhow::{bail, Context, Result};
use inquire::Password;

pub const PASSWORD_ENV: &str = "RECFETCH_PASSWORD";

/// `RECFETCH_PASSWORD` if set and non-empty, else prompt without echo.
pub fn resolve_password(username: &str) -> Result<String> {
    password_from(std::env::var(PASSWORD_ENV).ok(), username, prompt_hidden)
}

fn prompt_hidden(username: &str) -> Result<String> {
    Password::new(&format!("Password for {}:", username))
        .without_confirmation()
        .prompt()
        .with_context(|| format!("reading password (no terminal? set {})", PASSWORD_ENV))
}

pub(crate) fn password_from(
    env: Option<String>,
    username: &str,
    prompt: impl FnOnce(&str) -> Result<String>,
) -> Result<String> {
    if let Some(p) = env.filter(|p| !p.is_empty()) {
        return Ok(p);
    }
    let password = prompt(username)?;
    if password.is_empty() {
        bail!("empty password");
    }
    Ok(password)
}
