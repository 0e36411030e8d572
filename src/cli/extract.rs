use crate::bundle::read_bundle_file;
use crate::clock::SystemClock;
use crate::error::Result;
use crate::reassemble::RecoveryContext;
use std::path::Path;

/// Recover a bundle's payload into a file without executing it.
/// Unlike `run`, any failure is reported.
/// Returns the number of payload bytes written.
pub fn extract_bundle(input_path: &Path, output_path: &Path) -> Result<usize> {
    let bundle = read_bundle_file(input_path)?;
    let keys = bundle.key_material()?;
    let table = bundle.open(&keys)?;

    let ctx = RecoveryContext::new(&bundle.header, &keys, &SystemClock);
    let payload = ctx.recover(&table)?;

    std::fs::write(output_path, &payload)?;
    Ok(payload.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::write_bundle_file;
    use crate::config::ShroudConfig;
    use crate::protect::protect;
    use tempfile::tempdir;

    #[test]
    fn test_extract_roundtrip() {
        let dir = tempdir().unwrap();
        let bundle_path = dir.path().join("payload.shr");
        let output_path = dir.path().join("payload.txt");

        let original = b"Hello, World! This is a test.";
        let bundle = protect(original, "my_secret", &ShroudConfig::default()).unwrap();
        write_bundle_file(&bundle_path, &bundle).unwrap();

        let written = extract_bundle(&bundle_path, &output_path).unwrap();
        assert_eq!(written, original.len());
        assert_eq!(std::fs::read(&output_path).unwrap(), original);
    }

    #[test]
    fn test_extract_rejects_non_bundle() {
        let dir = tempdir().unwrap();
        let bogus = dir.path().join("bogus.shr");
        std::fs::write(&bogus, b"not a bundle").unwrap();
        assert!(extract_bundle(&bogus, &dir.path().join("out")).is_err());
    }
}
