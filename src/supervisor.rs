//! Recovery supervisor.
//!
//! ```text
//! START → DECRYPT_OUTER → REASSEMBLE_PARTITIONS → UNPACK_STRUCTURE → EXECUTE → DONE
//!              │                  │                      │             │
//!              └──────────────────┴──────────┬───────────┴─────────────┘
//!                                            ▼
//!                                   FALLBACK_EXTRACTION ──→ FINAL_FALLBACK
//! ```
//!
//! Recovery never surfaces an error to the caller. Whatever goes wrong, the
//! supervisor degrades through the fallback states and reports how far it got.

use crate::bundle::{Bundle, PartitionTable};
use crate::clock::{Clock, SystemClock};
use crate::embed;
use crate::error::{Result, ShroudError};
use crate::executor::Executor;
use crate::keys::KeyMaterial;
use crate::pipeline::record::FragmentRecord;
use crate::reassemble::RecoveryContext;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    Start,
    DecryptOuter,
    ReassemblePartitions,
    UnpackStructure,
    Execute,
    Done,
    FallbackExtraction,
    FinalFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The full payload was recovered and executed
    Executed,
    /// A fallback slice was executed
    FallbackExecuted,
    /// Nothing was executed
    Quiet,
}

#[derive(Debug, Clone)]
pub struct RecoveryReport {
    pub outcome: RecoveryOutcome,
    /// Every state visited, in order
    pub trail: Vec<RecoveryState>,
    /// Errors that forced a transition, in order
    pub errors: Vec<String>,
}

impl RecoveryReport {
    pub fn visited(&self, state: RecoveryState) -> bool {
        self.trail.contains(&state)
    }
}

/// Recover and execute a bundle with the system clock
pub fn execute_bundle(bytes: &[u8], executor: &mut dyn Executor) -> RecoveryReport {
    Supervisor::new(&SystemClock).run(bytes, executor)
}

/// What the outer decryption yields
struct Opened {
    bundle: Bundle,
    keys: KeyMaterial,
    table: PartitionTable,
}

pub struct Supervisor<'a> {
    clock: &'a dyn Clock,
}

impl<'a> Supervisor<'a> {
    pub fn new(clock: &'a dyn Clock) -> Self {
        Self { clock }
    }

    pub fn run(&self, bytes: &[u8], executor: &mut dyn Executor) -> RecoveryReport {
        let mut trail = Vec::new();
        let mut errors = Vec::new();
        let mut opened: Option<Opened> = None;
        let mut serialized = Vec::new();
        let mut payload = Vec::new();
        let mut state = RecoveryState::Start;

        loop {
            trail.push(state);
            debug!(?state, "recovery state");

            let step: Result<RecoveryState> = match state {
                RecoveryState::Start => Ok(RecoveryState::DecryptOuter),

                RecoveryState::DecryptOuter => decrypt_outer(bytes).map(|o| {
                    opened = Some(o);
                    RecoveryState::ReassemblePartitions
                }),

                RecoveryState::ReassemblePartitions => match opened.as_ref() {
                    Some(o) => RecoveryContext::new(&o.bundle.header, &o.keys, self.clock)
                        .reassemble(&o.table)
                        .map(|data| {
                            serialized = data;
                            RecoveryState::UnpackStructure
                        }),
                    None => Err(ShroudError::NoValidPayload),
                },

                RecoveryState::UnpackStructure => embed::unpack(&serialized).map(|data| {
                    payload = data;
                    RecoveryState::Execute
                }),

                RecoveryState::Execute => executor
                    .execute(&payload)
                    .map(|()| RecoveryState::Done),

                RecoveryState::Done => {
                    info!(bytes = payload.len(), "payload executed");
                    return finish(RecoveryOutcome::Executed, trail, errors);
                }

                RecoveryState::FallbackExtraction => {
                    let extracted = opened
                        .as_ref()
                        .ok_or(ShroudError::FallbackExhausted)
                        .and_then(|o| self.fallback_extract(o));
                    match extracted.and_then(|data| executor.execute(&data)) {
                        Ok(()) => {
                            warn!("executed fallback extraction");
                            return finish(RecoveryOutcome::FallbackExecuted, trail, errors);
                        }
                        Err(e) => Err(e),
                    }
                }

                RecoveryState::FinalFallback => {
                    info!("initialization completed");
                    return finish(RecoveryOutcome::Quiet, trail, errors);
                }
            };

            state = match step {
                Ok(next) => next,
                Err(e) => {
                    warn!(?state, "recovery step failed: {}", e);
                    errors.push(e.to_string());
                    match state {
                        RecoveryState::FallbackExtraction => RecoveryState::FinalFallback,
                        _ => RecoveryState::FallbackExtraction,
                    }
                }
            };
        }
    }

    /// First strategy: the data of the first fragment anywhere that opens,
    /// parses, and carries a non-empty slice. Second strategy: the slice of
    /// the very first fragment, reversed and parsed without any coherence
    /// check.
    fn fallback_extract(&self, opened: &Opened) -> Result<Vec<u8>> {
        let ctx = RecoveryContext::new(&opened.bundle.header, &opened.keys, self.clock);

        for (partition, fragments) in opened.table.partitions.iter().enumerate() {
            for fragment in fragments {
                if let Ok(record) = ctx.open_fragment(fragment, partition) {
                    if !record.data.is_empty() {
                        debug!(partition, index = record.index, "fallback found record");
                        return Ok(record.data);
                    }
                }
            }
        }

        let first = opened
            .table
            .partitions
            .first()
            .and_then(|fragments| fragments.first())
            .ok_or(ShroudError::FallbackExhausted)?;
        let raw = opened
            .bundle
            .header
            .stack()
            .reverse(first.as_bytes(), 0, &opened.keys)
            .map_err(|_| ShroudError::FallbackExhausted)?;
        let record = FragmentRecord::parse(&raw).map_err(|_| ShroudError::FallbackExhausted)?;

        if record.data.is_empty() {
            return Err(ShroudError::FallbackExhausted);
        }
        Ok(record.data)
    }
}

fn decrypt_outer(bytes: &[u8]) -> Result<Opened> {
    let bundle = Bundle::from_bytes(bytes)?;
    let keys = bundle.key_material()?;
    let table = bundle.open(&keys)?;
    Ok(Opened {
        bundle,
        keys,
        table,
    })
}

fn finish(
    outcome: RecoveryOutcome,
    trail: Vec<RecoveryState>,
    errors: Vec<String>,
) -> RecoveryReport {
    RecoveryReport {
        outcome,
        trail,
        errors,
    }
}
