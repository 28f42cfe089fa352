#![deny(unsafe_code)]

mod auth;
mod exit_code;
mod output;

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use bcdecrypt_core::{CryptoError, DecryptError, DecryptOptions, Decryptor, Progress, ProgressFn};

use crate::output::ProgressPrinter;

/// Decrypt a bc01 encrypted file with its .bckey key file
#[derive(Parser)]
#[command(name = "bcdecrypt")]
#[command(author, version)]
#[command(after_help = "EXAMPLES:
    # Decrypt to report.pdf next to the input
    bcdecrypt account.bckey report.pdf.bc

    # Pipe the password from a secret manager
    echo \"$SECRET\" | bcdecrypt --password-stdin account.bckey notes.txt.bc notes.txt
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    /// Account password (insecure, prefer --password-stdin or BCDECRYPT_PASSWORD)
    #[arg(long, env = "BCDECRYPT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Read password from stdin (single line)
    #[arg(long)]
    password_stdin: bool,

    /// Decrypt blocks on the current thread only
    #[arg(long)]
    sequential: bool,

    /// Overwrite OUTPUT if it already exists
    #[arg(short, long)]
    force: bool,

    /// The .bckey key file of the account
    #[arg(value_name = "KEY_FILE")]
    key_file: PathBuf,

    /// The encrypted .bc file
    #[arg(value_name = "ENCRYPTED_FILE")]
    encrypted_file: PathBuf,

    /// Where to write the plaintext [default: ENCRYPTED_FILE without its extension]
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(if e.use_stderr() {
                exit_code::USAGE_ERROR
            } else {
                exit_code::SUCCESS
            });
        }
    };

    let quiet = cli.quiet;
    match run(cli) {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            let code = categorize_error(&e);
            if !quiet {
                eprintln!("Error: {e:#}");
            }
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if !cli.quiet {
        setup_tracing(cli.verbose);
    }

    output::warn_on_extension_mismatch(&cli.key_file, "bckey");
    output::warn_on_extension_mismatch(&cli.encrypted_file, "bc");

    let output_path = match cli.output.clone() {
        Some(path) => path,
        None => output::default_output_path(&cli.encrypted_file).with_context(|| {
            format!(
                "Cannot derive an output path from '{}', pass OUTPUT explicitly",
                cli.encrypted_file.display()
            )
        })?,
    };
    if output_path == cli.encrypted_file {
        bail!("Output path must differ from the encrypted file");
    }
    if output_path.exists() && !cli.force {
        bail!(
            "Output file '{}' already exists (use --force to overwrite)",
            output_path.display()
        );
    }

    let password = get_password(&cli)?;

    let decryptor = Decryptor::default().options(DecryptOptions {
        parallel: !cli.sequential,
    });

    debug!(key_file = %cli.key_file.display(), "Unlocking key file");
    let account = decryptor.unlock_path(&cli.key_file, &password)?;

    let printer = ProgressPrinter::default();
    let report = |p: Progress| printer.report(p);
    let progress: Option<ProgressFn<'_>> = if cli.quiet { None } else { Some(&report) };

    let plaintext = account.decrypt_path(&cli.encrypted_file, progress)?;

    output::write_atomic(&output_path, &plaintext, cli.force)
        .with_context(|| format!("Failed to write '{}'", output_path.display()))?;

    info!(bytes = plaintext.len(), "Plaintext written");
    if !cli.quiet {
        println!(
            "Decrypted '{}' to '{}'",
            cli.encrypted_file.display(),
            output_path.display()
        );
    }
    Ok(())
}

/// Get the password using the priority chain:
/// 1. --password-stdin
/// 2. --password / BCDECRYPT_PASSWORD
/// 3. Interactive prompt
fn get_password(cli: &Cli) -> Result<String> {
    if cli.password_stdin {
        read_password_from_stdin()
    } else if let Some(ref password) = cli.password {
        if password.is_empty() {
            bail!("Password cannot be empty");
        }
        Ok(password.clone())
    } else {
        auth::prompt_password()
    }
}

/// Read password from stdin (first line only)
fn read_password_from_stdin() -> Result<String> {
    if io::stdin().is_terminal() {
        bail!(
            "--password-stdin requires password to be piped in.\n\
             Example: echo \"$SECRET\" | bcdecrypt --password-stdin account.bckey file.bc"
        );
    }

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;

    let password = password.trim_end_matches('\n').trim_end_matches('\r');

    if password.is_empty() {
        bail!("Password from stdin is empty");
    }

    Ok(password.to_string())
}

/// Set up tracing/logging based on verbosity level
fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

/// Categorize an error into an exit code using typed error downcasting
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<DecryptError>() {
            if err.is_authentication_failure() {
                return exit_code::AUTH_FAILED;
            }
            match err {
                DecryptError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                    return exit_code::NOT_FOUND;
                }
                DecryptError::Header { .. } | DecryptError::KeyContainer(_) => {
                    return exit_code::INVALID_CONTAINER;
                }
                DecryptError::Unlock(CryptoError::InvalidParameters(_)) => {
                    return exit_code::INVALID_CONTAINER;
                }
                _ => {}
            }
        }

        if let Some(io_err) = cause.downcast_ref::<io::Error>()
            && io_err.kind() == io::ErrorKind::NotFound
        {
            return exit_code::NOT_FOUND;
        }
    }

    exit_code::GENERAL_ERROR
}

#[cfg(test)]
mod tests {
    use super::*;
    use bcdecrypt_core::{FileContext, HeaderError};

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_categorize_authentication_failure() {
        let err = anyhow::Error::new(DecryptError::Unlock(CryptoError::IntegrityCheckFailed));
        assert_eq!(categorize_error(&err), exit_code::AUTH_FAILED);
    }

    #[test]
    fn test_categorize_header_error() {
        let err = anyhow::Error::new(DecryptError::Header {
            source: HeaderError::UnsupportedFormatVersion { found: *b"zip!" },
            context: FileContext::new(),
        });
        assert_eq!(categorize_error(&err), exit_code::INVALID_CONTAINER);
    }

    #[test]
    fn test_categorize_not_found() {
        let err = anyhow::Error::new(DecryptError::Io {
            source: io::Error::from(io::ErrorKind::NotFound),
            context: FileContext::new().with_path("missing.bc"),
        });
        assert_eq!(categorize_error(&err), exit_code::NOT_FOUND);
    }

    #[test]
    fn test_categorize_other_errors_as_general() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(categorize_error(&err), exit_code::GENERAL_ERROR);
    }
}
