//! Reassembly: partition table → serialized embedding index → payload.
//!
//! Every partition is rebuilt independently. A fragment that fails to
//! decrypt, parse, or verify is dropped and the rest of its partition is still
//! used. The longest rebuilt candidate wins; on a tie the earlier partition is
//! kept.

use crate::bundle::{BundleHeader, EncryptedFragment, PartitionTable};
use crate::clock::Clock;
use crate::embed;
use crate::error::{Result, ShroudError};
use crate::keys::KeyMaterial;
use crate::pipeline::fragment::unfragment;
use crate::pipeline::record::FragmentRecord;
use crate::pipeline::stack::TransformStack;
use std::collections::BTreeMap;
use tracing::{debug, error, warn};

/// Request-scoped recovery state
pub struct RecoveryContext<'a> {
    stack: TransformStack,
    keys: &'a KeyMaterial,
    clock: &'a dyn Clock,
    tolerance_secs: f64,
}

impl<'a> RecoveryContext<'a> {
    pub fn new(header: &BundleHeader, keys: &'a KeyMaterial, clock: &'a dyn Clock) -> Self {
        Self {
            stack: header.stack(),
            keys,
            clock,
            tolerance_secs: header.tolerance_secs,
        }
    }

    /// Reverse the stack and parse the record, without any coherence check
    pub fn open_fragment(&self, fragment: &EncryptedFragment, partition: usize) -> Result<FragmentRecord> {
        let plain = self.stack.reverse(fragment.as_bytes(), partition, self.keys)?;
        FragmentRecord::parse(&plain)
    }

    /// Open a fragment and check it belongs where it was found
    pub fn accept(&self, fragment: &EncryptedFragment, partition: usize) -> Result<FragmentRecord> {
        let record = self.open_fragment(fragment, partition)?;
        if record.partition != partition {
            return Err(ShroudError::CoherenceViolation {
                partition,
                index: record.index,
            });
        }
        record.verify(self.clock.now(), self.tolerance_secs)?;
        Ok(record)
    }

    /// Concatenate the accepted slices of one partition by ordinal index
    pub fn reassemble_partition(&self, partition: usize, fragments: &[EncryptedFragment]) -> Vec<u8> {
        let mut slices = BTreeMap::new();

        for (position, fragment) in fragments.iter().enumerate() {
            match self.accept(fragment, partition) {
                Ok(record) => {
                    slices.insert(record.index, record.data);
                }
                Err(e) if e.is_fragment_local() => {
                    warn!(partition, position, "dropping fragment: {}", e)
                }
                Err(e) => error!(partition, position, "unexpected fragment error: {}", e),
            }
        }

        debug!(
            partition,
            accepted = slices.len(),
            listed = fragments.len(),
            "reassembled partition"
        );
        let ordered: Vec<Vec<u8>> = slices.into_values().collect();
        unfragment(&ordered)
    }

    /// Rebuild every partition and return the longest candidate
    pub fn reassemble(&self, table: &PartitionTable) -> Result<Vec<u8>> {
        let candidates: Vec<Vec<u8>> = table
            .partitions
            .iter()
            .enumerate()
            .map(|(partition, fragments)| self.reassemble_partition(partition, fragments))
            .collect();

        let winner = select_longest(&candidates).ok_or(ShroudError::NoValidPayload)?;
        debug!(partition = winner, len = candidates[winner].len(), "selected candidate");
        Ok(candidates.into_iter().nth(winner).unwrap_or_default())
    }

    /// Reassemble and unpack the payload
    pub fn recover(&self, table: &PartitionTable) -> Result<Vec<u8>> {
        let serialized = self.reassemble(table)?;
        embed::unpack(&serialized)
    }
}

/// Index of the longest non-empty candidate. Ties keep the earliest.
pub fn select_longest<S: AsRef<[u8]>>(candidates: &[S]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (i, candidate) in candidates.iter().enumerate() {
        let len = candidate.as_ref().len();
        if len > 0 && best.map_or(true, |(_, best_len)| len > best_len) {
            best = Some((i, len));
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::ShroudConfig;
    use crate::protect::protect_with_clock;

    const PROTECTED_AT: f64 = 1_700_000_000.0;

    fn protected(payload: &[u8]) -> (BundleHeader, PartitionTable, KeyMaterial) {
        let bundle = protect_with_clock(
            payload,
            "pw123",
            &ShroudConfig::default(),
            &FixedClock(PROTECTED_AT),
        )
        .unwrap();
        let keys = bundle.key_material().unwrap();
        let table = bundle.open(&keys).unwrap();
        (bundle.header, table, keys)
    }

    #[test]
    fn test_select_longest() {
        assert_eq!(select_longest(&[vec![0u8; 10], vec![0u8; 50]]), Some(1));
        assert_eq!(select_longest(&[vec![0u8; 50], vec![0u8; 10]]), Some(0));
        assert_eq!(select_longest(&[vec![1u8; 7], vec![2u8; 7]]), Some(0));
        assert_eq!(select_longest(&[Vec::<u8>::new(), Vec::new()]), None);
        assert_eq!(select_longest::<Vec<u8>>(&[]), None);
    }

    #[test]
    fn test_recover_roundtrip() {
        let (header, table, keys) = protected(b"hello-world");
        let clock = FixedClock(PROTECTED_AT + 3600.0);
        let ctx = RecoveryContext::new(&header, &keys, &clock);
        assert_eq!(ctx.recover(&table).unwrap(), b"hello-world");
    }

    #[test]
    fn test_partitions_rebuild_identically() {
        let (header, table, keys) = protected(b"hello-world");
        let clock = FixedClock(PROTECTED_AT);
        let ctx = RecoveryContext::new(&header, &keys, &clock);

        let a = ctx.reassemble_partition(0, &table.partitions[0]);
        let b = ctx.reassemble_partition(1, &table.partitions[1]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_corrupt_fragment_dropped_other_partition_wins() {
        let (header, mut table, keys) = protected(b"hello-world");
        table.partitions[0][2].0[30] ^= 0x01;

        let clock = FixedClock(PROTECTED_AT);
        let ctx = RecoveryContext::new(&header, &keys, &clock);
        let short = ctx.reassemble_partition(0, &table.partitions[0]);
        let full = ctx.reassemble_partition(1, &table.partitions[1]);
        assert!(short.len() < full.len());

        assert_eq!(ctx.recover(&table).unwrap(), b"hello-world");
    }

    #[test]
    fn test_rejections_are_fragment_local() {
        let (header, mut table, keys) = protected(b"hello-world");
        table.partitions[1][0].0[40] ^= 0x80;
        table.partitions[1][1].0.truncate(8);

        let clock = FixedClock(PROTECTED_AT);
        let ctx = RecoveryContext::new(&header, &keys, &clock);
        for fragment in &table.partitions[1][..2] {
            assert!(ctx.accept(fragment, 1).unwrap_err().is_fragment_local());
        }
        assert!(ctx.accept(&table.partitions[0][0], 1).unwrap_err().is_fragment_local());
    }

    #[test]
    fn test_misplaced_fragment_is_rejected() {
        let (header, table, keys) = protected(b"hello-world");
        let clock = FixedClock(PROTECTED_AT);
        let ctx = RecoveryContext::new(&header, &keys, &clock);

        // A partition-0 fragment listed under partition 1 cannot open there
        assert!(ctx.accept(&table.partitions[0][0], 1).is_err());
    }

    #[test]
    fn test_all_corrupt_is_no_valid_payload() {
        let (header, mut table, keys) = protected(b"hello-world");
        for fragment in table.partitions.iter_mut().flatten() {
            fragment.0.iter_mut().for_each(|b| *b = 0);
        }
        let clock = FixedClock(PROTECTED_AT);
        let ctx = RecoveryContext::new(&header, &keys, &clock);
        assert!(matches!(
            ctx.reassemble(&table),
            Err(ShroudError::NoValidPayload)
        ));
    }
}
