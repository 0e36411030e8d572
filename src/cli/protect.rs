use crate::bundle::write_bundle_file;
use crate::config::ShroudConfig;
use crate::error::{Result, ShroudError};
use crate::protect::protect;
use std::path::{Path, PathBuf};

/// Options for the protect command
#[derive(Debug, Clone)]
pub struct ProtectOptions {
    pub password_file: PathBuf,
    pub config: ShroudConfig,
}

/// What was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectSummary {
    pub fragment_counts: Vec<usize>,
    pub bytes_written: usize,
}

/// Read the password from a file, trimming surrounding whitespace
pub fn read_password(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)?;
    let password = text.trim().to_string();
    if password.is_empty() {
        return Err(ShroudError::EmptyPassword);
    }
    Ok(password)
}

/// Protect `input_path` into a bundle at `output_path`
pub fn protect_file(
    input_path: &Path,
    output_path: &Path,
    options: &ProtectOptions,
) -> Result<ProtectSummary> {
    let payload = std::fs::read(input_path)?;
    let password = read_password(&options.password_file)?;

    let bundle = protect(&payload, &password, &options.config)?;
    let bytes_written = write_bundle_file(output_path, &bundle)?;

    Ok(ProtectSummary {
        fragment_counts: bundle.header.fragment_counts.clone(),
        bytes_written,
    })
}
