use anyhow::{Result, bail};
use rpassword::read_password;
use std::io::{self, Write};

/// Prompt the user for the account password securely.
/// Input is hidden and not echoed to the terminal.
///
/// For non-interactive use, pass `--password` or set `BCDECRYPT_PASSWORD`.
pub fn prompt_password() -> Result<String> {
    eprint!("Account password: ");
    io::stderr().flush()?;

    let password = read_password()?;

    if password.is_empty() {
        bail!("Password cannot be empty");
    }

    Ok(password)
}
