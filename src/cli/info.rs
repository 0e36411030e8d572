use crate::bundle::read_bundle_file;
use crate::error::Result;
use std::fmt::Write;
use std::path::Path;

/// Describe a bundle from its header. Needs no password and decrypts nothing.
pub fn show_info(path: &Path) -> Result<String> {
    let bundle = read_bundle_file(path)?;
    let header = &bundle.header;

    let mut output = String::new();
    let _ = writeln!(output, "Shroud Bundle Information");
    let _ = writeln!(output, "=========================\n");

    let _ = writeln!(output, "File: {}", path.display());
    let _ = writeln!(output, "Version: {}", header.version);
    let _ = writeln!(output);

    let _ = writeln!(output, "Transform Stack:");
    let _ = writeln!(output, "  Layers: {}", header.layers);
    let _ = writeln!(output, "  Tag hash: {:?}", header.tag_hash);
    let _ = writeln!(output, "  Compression: {:?}", header.compression);
    let _ = writeln!(output, "  Tolerance: {} s", header.tolerance_secs);
    let _ = writeln!(output);

    let _ = writeln!(output, "Partitions: {}", header.partitions());
    for (partition, count) in header.fragment_counts.iter().enumerate() {
        let _ = writeln!(output, "  Partition {}: {} fragments", partition, count);
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "Storage:");
    let _ = writeln!(output, "  Salts: {}", header.markers.salts.len());
    let _ = writeln!(output, "  Envelope size: {}", format_size(bundle.envelope.len() as u64));
    let _ = writeln!(output, "  Protected at: {}", header.markers.clock);

    Ok(output)
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::write_bundle_file;
    use crate::config::ShroudConfig;
    use crate::protect::protect;
    use tempfile::tempdir;

    #[test]
    fn test_show_info() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.shr");
        let bundle = protect(b"Test data", "secret", &ShroudConfig::default()).unwrap();
        write_bundle_file(&path, &bundle).unwrap();

        let info = show_info(&path).unwrap();

        assert!(info.contains("Version: 1"));
        assert!(info.contains("Layers: 3"));
        assert!(info.contains("Partition 0: 8 fragments"));
        assert!(info.contains("Partition 1: 4 fragments"));
        assert!(!info.contains("secret"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1048576), "1.0 MB");
    }
}
