//! Interactive prompt utilities for CLI commands.

use dialoguer::{theme::ColorfulTheme, Confirm, Password};
use std::io::{self, IsTerminal};

use paywright_keystore::SessionPromptCache;

use crate::error::{CliError, CliResult};

/// Environment variable consulted before prompting for a wallet password.
pub const PASSWORD_ENV: &str = "PAYWRIGHT_PASSWORD";

/// Check if we're running in an interactive terminal.
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal()
}

/// Prompt for confirmation with a yes/no question.
pub fn confirm(prompt: &str) -> io::Result<bool> {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| io::Error::other(e.to_string()))
}

/// Prompt for a password (hidden input).
pub fn password(prompt: &str) -> io::Result<String> {
    Password::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .interact()
        .map_err(|e| io::Error::other(e.to_string()))
}

/// Prompt for a password with confirmation.
pub fn password_with_confirm(prompt: &str) -> io::Result<String> {
    Password::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()
        .map_err(|e| io::Error::other(e.to_string()))
}

/// Resolve the wallet password: environment variable, then the session
/// cache, then an interactive prompt. The prompted value is remembered for
/// the rest of the process.
pub fn get_wallet_password(cache: &SessionPromptCache, address: &str) -> CliResult<String> {
    if let Ok(pwd) = std::env::var(PASSWORD_ENV) {
        return Ok(pwd);
    }
    if let Some(pwd) = cache.get(address) {
        return Ok(pwd);
    }
    if !is_interactive() {
        return Err(CliError::user(format!(
            "Wallet password required: set {PASSWORD_ENV} or run interactively."
        )));
    }
    let pwd = password("Enter wallet password")
        .map_err(|e| CliError::user(format!("Failed to read password: {}", e)))?;
    cache.insert(address, &pwd);
    Ok(pwd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_interactive() {
        // In test environment, stdin is typically not a terminal
        let _ = is_interactive();
    }
}
