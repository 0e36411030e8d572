use crate::executor::{CommandExecutor, Executor, WriterExecutor};
use crate::supervisor::{execute_bundle, RecoveryReport};
use std::path::Path;
use tracing::warn;

/// Interpreter that receives the recovered payload on stdin
#[derive(Debug, Clone)]
pub struct Interpreter {
    pub program: String,
    pub args: Vec<String>,
}

/// Recover and execute a bundle. Never fails: an unreadable file is treated
/// like any other unrecoverable bundle.
pub fn run_bundle(path: &Path, interpreter: Option<&Interpreter>) -> RecoveryReport {
    let bytes = std::fs::read(path).unwrap_or_else(|e| {
        warn!(path = %path.display(), "cannot read bundle: {}", e);
        Vec::new()
    });

    let mut executor: Box<dyn Executor> = match interpreter {
        Some(interp) => Box::new(CommandExecutor::new(&interp.program, interp.args.clone())),
        None => Box::new(WriterExecutor::new(std::io::stdout())),
    };

    execute_bundle(&bytes, executor.as_mut())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::RecoveryOutcome;
    use tempfile::tempdir;

    #[test]
    fn test_missing_bundle_is_quiet() {
        let dir = tempdir().unwrap();
        let report = run_bundle(&dir.path().join("absent.shr"), None);
        assert_eq!(report.outcome, RecoveryOutcome::Quiet);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_with_interpreter() {
        use crate::bundle::write_bundle_file;
        use crate::config::ShroudConfig;
        use crate::protect::protect;

        let dir = tempdir().unwrap();
        let path = dir.path().join("script.shr");
        let bundle = protect(b"exit 0", "pw123", &ShroudConfig::default()).unwrap();
        write_bundle_file(&path, &bundle).unwrap();

        let interpreter = Interpreter {
            program: "sh".into(),
            args: Vec::new(),
        };
        let report = run_bundle(&path, Some(&interpreter));
        assert_eq!(report.outcome, RecoveryOutcome::Executed);
    }
}
