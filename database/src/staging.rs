use crate::db::{KvEngine, ScanDirection, ScanRange, WriteOp};
use crate::errors::{StoreError, StoreResult};
use crate::key::{prefix_successor, split_height_suffix, successor, DbKey, HEIGHT_SUFFIX_LEN};
use echomint_types::Height;
use log::warn;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

/// The pending mutation set of one in-flight block. Ordered by physical key;
/// last write per key wins.
struct Stage {
    height: Height,
    pending: BTreeMap<Vec<u8>, Vec<u8>>,
}

/// Staged view over a [`KvEngine`]: between `open(height)` and `flush()` all
/// writes accumulate in memory, tagged with the stage's write height, and
/// reads merge the pending overlay over the durable engine (read-your-writes).
/// `flush` applies the whole overlay as one atomic engine write.
///
/// At most one stage may be open at a time; this is the storage-level half of
/// the single-writer invariant.
pub struct StagedDb {
    engine: Arc<dyn KvEngine>,
    stage: RwLock<Option<Stage>>,
    read_audit: bool,
}

impl StagedDb {
    pub fn new(engine: Arc<dyn KvEngine>) -> Self {
        Self { engine, stage: RwLock::new(None), read_audit: false }
    }

    /// Enables logging of unbounded reads issued while a stage is open.
    /// Such reads can observe the in-flight height and usually indicate a
    /// query path that bypassed the committed-height bound.
    pub fn with_read_audit(mut self) -> Self {
        self.read_audit = true;
        self
    }

    pub fn engine(&self) -> &Arc<dyn KvEngine> {
        &self.engine
    }

    pub fn open(&self, height: Height) -> StoreResult<()> {
        let mut guard = self.stage.write();
        if let Some(stage) = guard.as_ref() {
            return Err(StoreError::BatchAlreadyOpen(stage.height));
        }
        *guard = Some(Stage { height, pending: BTreeMap::new() });
        Ok(())
    }

    /// The active write height, if a stage is open
    pub fn write_height(&self) -> Option<Height> {
        self.stage.read().as_ref().map(|stage| stage.height)
    }

    pub fn is_open(&self) -> bool {
        self.stage.read().is_some()
    }

    /// Stages a physical-key mutation into the open batch
    pub fn stage_put(&self, key: Vec<u8>, value: Vec<u8>) -> StoreResult<()> {
        let mut guard = self.stage.write();
        let stage = guard.as_mut().ok_or(StoreError::NoActiveWriteHeight)?;
        stage.pending.insert(key, value);
        Ok(())
    }

    /// Commits the open stage to the engine as one atomic write and clears
    /// it. Any engine failure is `FlushFailed` and must be treated as fatal:
    /// the stage is gone either way, recovery is restart-and-replay.
    pub fn flush(&self) -> StoreResult<Height> {
        let stage = self.stage.write().take().ok_or(StoreError::NoActiveWriteHeight)?;
        let height = stage.height;
        let ops: Vec<WriteOp> = stage.pending.into_iter().map(|(key, value)| WriteOp::Put { key, value }).collect();
        self.engine
            .write_atomically(ops)
            .map_err(|err| StoreError::FlushFailed { height, reason: err.to_string() })?;
        Ok(height)
    }

    /// Drops the open stage without writing anything. Returns its height.
    pub fn discard(&self) -> Option<Height> {
        self.stage.write().take().map(|stage| stage.height)
    }

    /// Snapshot of the open stage's pending mutations, in physical key order
    pub fn staged_entries(&self) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let guard = self.stage.read();
        let stage = guard.as_ref().ok_or(StoreError::NoActiveWriteHeight)?;
        Ok(stage.pending.iter().map(|(key, value)| (key.clone(), value.clone())).collect())
    }

    /// Exact read of a flat (un-heighted) key, overlay first
    pub fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        if let Some(stage) = self.stage.read().as_ref() {
            if let Some(value) = stage.pending.get(key) {
                return Ok(Some(value.clone()));
            }
        }
        self.engine.get(key)
    }

    /// The most recent versioned entry for `entry_prefix` (a full logical
    /// key path, without height suffix) at or below `ceiling`, merged over
    /// overlay and engine. Returns the raw stored value; tombstone handling
    /// belongs to the typed access layer.
    pub fn latest_at_or_below(&self, entry_prefix: &[u8], ceiling: Height) -> StoreResult<Option<(Height, Vec<u8>)>> {
        self.audit_unbounded(entry_prefix, ceiling);

        let from = DbKey::heighted(entry_prefix, [], 0).into_vec();
        let to = successor(DbKey::heighted(entry_prefix, [], ceiling).into_vec());
        let expected_len = entry_prefix.len() + HEIGHT_SUFFIX_LEN;

        let overlay_hit = {
            let guard = self.stage.read();
            guard.as_ref().and_then(|stage| {
                stage
                    .pending
                    .range::<[u8], _>((Bound::Included(from.as_slice()), Bound::Excluded(to.as_slice())))
                    .rev()
                    .find(|(key, _)| key.len() == expected_len)
                    .map(|(key, value)| {
                        let (_, height) = split_height_suffix(key).expect("length checked above");
                        (height, value.clone())
                    })
            })
        };

        let mut engine_hit = None;
        for item in self.engine.scan(ScanRange::new(from, to), ScanDirection::Reverse) {
            let (key, value) = item?;
            if key.len() == expected_len {
                let (_, height) = split_height_suffix(&key).expect("length checked above");
                engine_hit = Some((height, value.into_vec()));
                break;
            }
        }

        Ok(match (overlay_hit, engine_hit) {
            (Some(overlay), Some(engine)) => Some(if overlay.0 >= engine.0 { overlay } else { engine }),
            (hit, None) | (None, hit) => hit,
        })
    }

    /// Ordered iteration over a bucket: yields, per logical key, the most
    /// recent raw entry at or below `ceiling`, merged over overlay and
    /// engine. Logical keys are returned with the bucket prefix stripped.
    pub fn iterate_latest(
        &self,
        bucket: &[u8],
        seek_from: Option<&[u8]>,
        ceiling: Height,
    ) -> StoreResult<Vec<(Vec<u8>, Height, Vec<u8>)>> {
        self.audit_unbounded(bucket, ceiling);

        let from = match seek_from {
            Some(key) => DbKey::new(bucket, key).into_vec(),
            None => bucket.to_vec(),
        };
        let to = prefix_successor(bucket)
            .ok_or_else(|| StoreError::DataInconsistency("bucket prefix has no upper bound".into()))?;

        let overlay: Vec<(Vec<u8>, Vec<u8>)> = {
            let guard = self.stage.read();
            guard
                .as_ref()
                .map(|stage| {
                    stage
                        .pending
                        .range::<[u8], _>((Bound::Included(from.as_slice()), Bound::Excluded(to.as_slice())))
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut out: Vec<(Vec<u8>, Height, Vec<u8>)> = Vec::new();
        // current logical key (bucket stripped) and its best entry so far
        let mut current: Option<(Vec<u8>, Height, Vec<u8>)> = None;

        let mut engine_iter = self.engine.scan(ScanRange::new(from, to), ScanDirection::Forward);
        let mut overlay_iter = overlay.into_iter().peekable();
        let mut engine_next = engine_iter.next().transpose()?;

        enum Pick {
            Engine,
            Overlay,
            // equal physical keys: the staged overlay wins, the engine copy
            // is consumed and discarded
            OverlayShadowingEngine,
        }

        loop {
            let pick = match (&engine_next, overlay_iter.peek()) {
                (Some((engine_key, _)), Some((overlay_key, _))) => {
                    if engine_key.as_ref() < overlay_key.as_slice() {
                        Pick::Engine
                    } else if engine_key.as_ref() == overlay_key.as_slice() {
                        Pick::OverlayShadowingEngine
                    } else {
                        Pick::Overlay
                    }
                }
                (Some(_), None) => Pick::Engine,
                (None, Some(_)) => Pick::Overlay,
                (None, None) => break,
            };
            match pick {
                Pick::Engine => {
                    let (key, value) = engine_next.take().expect("picked only when present");
                    fold_entry(bucket.len(), ceiling, &mut current, &mut out, &key, value.into_vec());
                    engine_next = engine_iter.next().transpose()?;
                }
                Pick::Overlay => {
                    let (key, value) = overlay_iter.next().expect("picked only when present");
                    fold_entry(bucket.len(), ceiling, &mut current, &mut out, &key, value);
                }
                Pick::OverlayShadowingEngine => {
                    let (key, value) = overlay_iter.next().expect("picked only when present");
                    fold_entry(bucket.len(), ceiling, &mut current, &mut out, &key, value);
                    engine_next = engine_iter.next().transpose()?;
                }
            }
        }
        if let Some(done) = current.take() {
            out.push(done);
        }
        Ok(out)
    }

    fn audit_unbounded(&self, path: &[u8], ceiling: Height) {
        if self.read_audit && ceiling == Height::MAX {
            if let Some(height) = self.write_height() {
                warn!(
                    "unbounded read of {} while batch at height {} is open; in-flight writes are observable",
                    faster_hex::hex_string(path),
                    height
                );
            }
        }
    }
}

/// Folds one merged scan entry into the per-logical-key accumulator. Keys
/// arrive in ascending physical order, so within one logical key a later
/// qualifying entry supersedes the previous one.
fn fold_entry(
    bucket_len: usize,
    ceiling: Height,
    current: &mut Option<(Vec<u8>, Height, Vec<u8>)>,
    out: &mut Vec<(Vec<u8>, Height, Vec<u8>)>,
    full_key: &[u8],
    value: Vec<u8>,
) {
    let Some((logical, height)) = split_height_suffix(full_key) else {
        return;
    };
    if logical.len() <= bucket_len {
        return;
    }
    let logical_key = &logical[bucket_len..];
    match current {
        Some((cur, best_height, best_value)) if cur.as_slice() == logical_key => {
            if height <= ceiling {
                *best_height = height;
                *best_value = value;
            }
        }
        _ => {
            if let Some(done) = current.take() {
                out.push(done);
            }
            if height <= ceiling {
                *current = Some((logical_key.to_vec(), height, value));
            }
        }
    }
}
