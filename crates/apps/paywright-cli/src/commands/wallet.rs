//! Wallet management commands.

use paywright_keystore::EncryptionMode;
use paywright_x402::chain_for;

use crate::context::CliContext;
use crate::error::{CliError, CliResult};
use crate::output::{MessageOutput, OutputFormat, Render, WalletOutput};
use crate::prompt;

/// Resolve a network alias or CAIP-2 id to its canonical CAIP-2 form.
fn resolve_network(network: &str) -> CliResult<String> {
    chain_for(network)
        .map(|chain| chain.caip2.to_string())
        .ok_or_else(|| {
            CliError::user(format!(
                "Unknown network '{network}'. Supported: base, base-sepolia."
            ))
        })
}

/// Obtain the password for a new password-encrypted wallet.
fn new_wallet_password() -> CliResult<String> {
    if let Ok(pwd) = std::env::var(prompt::PASSWORD_ENV) {
        return Ok(pwd);
    }
    if !prompt::is_interactive() {
        return Err(CliError::user(format!(
            "Password encryption needs a password: set {} or run interactively.",
            prompt::PASSWORD_ENV
        )));
    }
    prompt::password_with_confirm("Choose a wallet password")
        .map_err(|e| CliError::user(format!("Failed to read password: {}", e)))
}

/// Password for the wallet's current backend, when it needs one.
fn current_password(ctx: &CliContext) -> CliResult<Option<String>> {
    let record = ctx.wallet.load_record()?;
    if record.mode() != EncryptionMode::Password {
        return Ok(None);
    }
    Ok(Some(prompt::get_wallet_password(
        &ctx.prompts,
        &record.address,
    )?))
}

/// Execute `wallet create`.
pub fn create(
    ctx: &CliContext,
    format: OutputFormat,
    network: &str,
    mode: EncryptionMode,
) -> CliResult<String> {
    let network = resolve_network(network)?;
    let password = if mode == EncryptionMode::Password {
        Some(new_wallet_password()?)
    } else {
        None
    };
    let record = ctx.wallet.create(&network, mode, password.as_deref())?;

    let output = WalletOutput {
        address: record.address,
        network: record.network_id,
        encryption: mode.to_string(),
    };
    Ok(output.render(format))
}

/// Execute `wallet import`.
pub fn import(
    ctx: &CliContext,
    format: OutputFormat,
    network: &str,
    mode: EncryptionMode,
    key: Option<&str>,
) -> CliResult<String> {
    let network = resolve_network(network)?;
    let key = match key {
        Some(key) => key.to_string(),
        None => {
            if !prompt::is_interactive() {
                return Err(CliError::user(
                    "Private key required: pass --key or run interactively.",
                ));
            }
            prompt::password("Private key (64 hex chars)")
                .map_err(|e| CliError::user(format!("Failed to read key: {}", e)))?
        }
    };
    let password = if mode == EncryptionMode::Password {
        Some(new_wallet_password()?)
    } else {
        None
    };
    let record = ctx.wallet.import(&key, &network, mode, password.as_deref())?;

    let output = WalletOutput {
        address: record.address,
        network: record.network_id,
        encryption: mode.to_string(),
    };
    Ok(output.render(format))
}

/// Execute `wallet show`.
pub fn show(ctx: &CliContext, format: OutputFormat) -> CliResult<String> {
    let record = ctx.wallet.load_record()?;
    let output = WalletOutput {
        address: record.address.clone(),
        network: record.network_id.clone(),
        encryption: record.mode().to_string(),
    };
    Ok(output.render(format))
}

/// Execute `wallet migrate`.
pub async fn migrate(
    ctx: &CliContext,
    format: OutputFormat,
    new_mode: EncryptionMode,
) -> CliResult<String> {
    let current = current_password(ctx)?;
    let new_password = if new_mode == EncryptionMode::Password {
        Some(new_wallet_password()?)
    } else {
        None
    };
    let record = ctx
        .wallet
        .migrate(new_mode, current.as_deref(), new_password.as_deref())
        .await?;

    let output = WalletOutput {
        address: record.address,
        network: record.network_id,
        encryption: new_mode.to_string(),
    };
    Ok(output.render(format))
}

/// Execute `wallet delete`.
pub async fn delete(ctx: &CliContext, format: OutputFormat, force: bool) -> CliResult<String> {
    let record = ctx.wallet.load_record()?;
    if !force {
        if !prompt::is_interactive() {
            return Err(CliError::user(
                "Refusing to delete without confirmation; pass --force.",
            ));
        }
        let confirmed = prompt::confirm(&format!(
            "Delete wallet {}? The key is unrecoverable.",
            record.address
        ))?;
        if !confirmed {
            return Err(CliError::user("Aborted."));
        }
    }
    ctx.wallet.delete().await?;

    let output = MessageOutput {
        message: format!("Wallet {} deleted.", record.address),
    };
    Ok(output.render(format))
}
