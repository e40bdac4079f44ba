//! The segment index: an ordered, lazily-populated sequence of segment references keyed by
//! presentation time.
//!
//! Initialization-segment references are reference-counted (`Arc`) across the segment references
//! that share them; the sharing is explicit rather than incidental, since merges must preserve it.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::drm::DrmInfo;

/// Whether a segment is known to be retrievable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStatus {
    Available,
    /// HLS `#EXT-X-GAP`: the segment is expected not to be retrievable; players should skip it.
    Missing,
    Unavailable,
}

/// AES-128 full-segment encryption key reference (distinct from sample-level DRM, which lives in
/// [`DrmInfo`]).
#[derive(Debug, Clone, PartialEq)]
pub struct AesKey {
    pub key_uri: String,
    pub key: Option<[u8; 16]>,
    pub iv: [u8; 16],
}

/// The first media segment in a sequence: container header bytes required before any media
/// segment addressed against it can be decoded. Shared by reference across every
/// [`SegmentReference`] that uses the same init section.
#[derive(Debug, Clone, PartialEq)]
pub struct InitSegmentReference {
    pub uris: Vec<String>,
    pub start_byte: u64,
    pub end_byte: Option<u64>,
    /// e.g. "avc1.4d401f,mp4a.40.2" — refined once the init segment/playlist is fetched.
    pub media_quality: Option<String>,
    pub aes_key: Option<AesKey>,
}

impl InitSegmentReference {
    /// Two init references address the same bytes — used by merges to decide whether to keep
    /// the old `Arc` (preserving identity) or adopt the new one.
    pub fn same_resource(&self, other: &InitSegmentReference) -> bool {
        self.uris == other.uris && self.start_byte == other.start_byte && self.end_byte == other.end_byte
    }
}

/// A low-latency HLS partial segment (`#EXT-X-PART`, or a speculative `#EXT-X-PRELOAD-HINT`).
#[derive(Debug, Clone, PartialEq)]
pub struct PartialSegmentReference {
    pub start_time: f64,
    pub end_time: f64,
    pub uri: String,
    pub start_byte: u64,
    pub end_byte: Option<u64>,
    pub independent: bool,
    /// True for a `#EXT-X-PRELOAD-HINT`: the byte range may still grow.
    pub speculative: bool,
}

/// A single addressable chunk of media.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentReference {
    pub start_time: f64,
    pub end_time: f64,
    pub uris: Vec<String>,
    pub start_byte: u64,
    /// Inclusive; `None` means open-ended (resource continues to EOF).
    pub end_byte: Option<u64>,
    pub init_segment_reference: Option<Arc<InitSegmentReference>>,
    pub timestamp_offset: f64,
    pub append_window_start: f64,
    pub append_window_end: f64,
    pub partial_references: Vec<PartialSegmentReference>,
    pub status: SegmentStatus,
    pub discontinuity_sequence: u64,
    pub aes_key: Option<Arc<AesKey>>,
    /// Wall-clock alignment key for live merges (derived from PROGRAM-DATE-TIME or UTCTiming).
    pub sync_time: Option<i64>,
    /// HLS media-sequence number, when known; used as the primary merge-alignment key.
    pub media_sequence_number: Option<u64>,
    pub tiles_layout: Option<String>,
    pub drm_info: Vec<DrmInfo>,
}

impl SegmentReference {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// An ordered random-access sequence of segment references for one stream.
///
/// Invariant: for every adjacent pair `(a, b)`, `a.end_time <= b.start_time` and
/// `a.start_time < b.start_time`.
#[derive(Debug, Clone, Default)]
pub struct SegmentIndex {
    refs: VecDeque<SegmentReference>,
    /// Generation counter, bumped on every `merge`/`evict` so that external iterators created
    /// before the mutation can detect they've been invalidated (append does not invalidate
    /// iterators).
    generation: u64,
}

/// A validation failure when appending or constructing an index; kept local rather than folded
/// into [`crate::error::ManifestError`] because it signals a programming error in the caller
/// (discontiguous references), not a condition the parser should route through `onError`.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum IndexError {
    #[error("segment [{0}, {1}) is not contiguous with the last held reference ending at {2}")]
    NotContiguous(f64, f64, f64),
    #[error("segment start_time {0} is not strictly less than end_time {1}")]
    NonPositiveDuration(f64, f64),
}

impl SegmentIndex {
    pub fn new() -> Self {
        SegmentIndex::default()
    }

    pub fn from_refs(refs: Vec<SegmentReference>) -> Result<Self, IndexError> {
        let mut idx = SegmentIndex::new();
        idx.append(refs)?;
        Ok(idx)
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&SegmentReference> {
        self.refs.get(position)
    }

    /// Binary search by half-open interval `[start_time, end_time)`.
    pub fn find(&self, time: f64) -> Option<usize> {
        if self.refs.is_empty() {
            return None;
        }
        let mut lo = 0usize;
        let mut hi = self.refs.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let r = &self.refs[mid];
            if time < r.start_time {
                hi = mid;
            } else if time >= r.end_time {
                lo = mid + 1;
            } else {
                return Some(mid);
            }
        }
        None
    }

    /// Appends references that must be contiguous with the last held reference. Does not bump
    /// the generation counter: forward/reverse iterators created before the call remain valid
    /// across a concurrent append.
    pub fn append(&mut self, new_refs: Vec<SegmentReference>) -> Result<(), IndexError> {
        for r in new_refs {
            if !(r.start_time < r.end_time) {
                return Err(IndexError::NonPositiveDuration(r.start_time, r.end_time));
            }
            if let Some(last) = self.refs.back() {
                if r.start_time < last.end_time {
                    return Err(IndexError::NotContiguous(r.start_time, r.end_time, last.end_time));
                }
            }
            self.refs.push_back(r);
        }
        Ok(())
    }

    /// Drops refs whose `end_time <= older_than`, releasing shared init references that no
    /// remaining segment still points to (Arc refcounting handles the actual release; we simply
    /// drop our handle).
    pub fn evict(&mut self, older_than: f64) {
        while let Some(front) = self.refs.front() {
            if front.end_time <= older_than {
                self.refs.pop_front();
            } else {
                break;
            }
        }
        self.generation += 1;
    }

    /// Live update: merge a freshly-fetched set of references into the index.
    ///
    /// Alignment precedence:
    ///   1. `(discontinuity_sequence, media_sequence_number)` when both sides have a sequence
    ///      number.
    ///   2. `sync_time` proximity.
    ///   3. `start_time` proximity.
    ///
    /// A reference whose slot is still covered by the update keeps its object identity (the
    /// update's reference for that slot is discarded in favour of the old `Arc`-shared init
    /// segment and aes key, though its own byte/URI fields are refreshed from the update in case
    /// the origin moved the segment); a reference older than the update's first entry (by
    /// sequence number, sync time, or start time) is dropped, since the update carries a
    /// complete window and anything it doesn't include has fallen out of it.
    pub fn merge(&mut self, update: Vec<SegmentReference>) {
        if update.is_empty() {
            self.generation += 1;
            return;
        }
        let mut merged: VecDeque<SegmentReference> = VecDeque::new();

        for new_ref in update {
            if let Some(existing) = self.find_identity_match(&new_ref) {
                merged.push_back(preserve_identity(existing, new_ref));
            } else {
                merged.push_back(new_ref);
            }
        }

        self.refs = merged;
        self.generation += 1;
    }

    fn find_identity_match<'a>(&'a self, new_ref: &SegmentReference) -> Option<&'a SegmentReference> {
        self.refs.iter().find(|r| {
            if let (Some(a), Some(b)) = (r.media_sequence_number, new_ref.media_sequence_number) {
                r.discontinuity_sequence == new_ref.discontinuity_sequence && a == b
            } else if let (Some(a), Some(b)) = (r.sync_time, new_ref.sync_time) {
                a == b
            } else {
                (r.start_time - new_ref.start_time).abs() < 1e-6
            }
        })
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &SegmentReference> {
        self.refs.iter()
    }

    /// Mutable iteration for post-parse enrichment passes (e.g. filling in fetched AES-128 key
    /// bytes) that don't change segment boundaries and so don't need to bump the generation
    /// counter.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SegmentReference> {
        self.refs.iter_mut()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// When a merged-in reference refers to the same underlying segment as one we already held,
/// preserve the old reference's identity-bearing fields (init segment Arc, aes key Arc) so that
/// downstream consumers that compare `Arc::ptr_eq` see no churn, while adopting any refreshed
/// byte-range/URI information from the update (the origin may have moved the segment within its
/// availability window without changing its sequence number).
fn preserve_identity(existing: &SegmentReference, mut update: SegmentReference) -> SegmentReference {
    if let (Some(old_init), Some(new_init)) = (&existing.init_segment_reference, &update.init_segment_reference) {
        if old_init.same_resource(new_init) {
            update.init_segment_reference = Some(Arc::clone(old_init));
        }
    }
    if existing.uris == update.uris && existing.start_byte == update.start_byte && existing.end_byte == update.end_byte {
        // Identical addressing: treat as the very same object for callers tracking identity by
        // value equality (Arc-based identity tracking is left to the caller if it needs pointer
        // equality on SegmentReference itself, which would require wrapping it in an Arc too).
        return existing.clone();
    }
    update
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_ref(start: f64, end: f64) -> SegmentReference {
        SegmentReference {
            start_time: start,
            end_time: end,
            uris: vec![format!("seg-{start}.mp4")],
            start_byte: 0,
            end_byte: None,
            init_segment_reference: None,
            timestamp_offset: 0.0,
            append_window_start: 0.0,
            append_window_end: f64::INFINITY,
            partial_references: Vec::new(),
            status: SegmentStatus::Available,
            discontinuity_sequence: 0,
            aes_key: None,
            sync_time: None,
            media_sequence_number: None,
            tiles_layout: None,
            drm_info: Vec::new(),
        }
    }

    #[test]
    fn find_and_get_round_trip() {
        let idx = SegmentIndex::from_refs(vec![simple_ref(0.0, 10.0), simple_ref(10.0, 20.0), simple_ref(20.0, 30.0)]).unwrap();
        for (expected_pos, t) in [(0, 0.0), (0, 5.0), (1, 10.0), (2, 29.999)] {
            let pos = idx.find(t).unwrap();
            assert_eq!(pos, expected_pos);
            let r = idx.get(pos).unwrap();
            assert!(r.start_time <= t && t < r.end_time);
        }
        assert!(idx.find(30.0).is_none());
        assert!(idx.find(-1.0).is_none());
    }

    #[test]
    fn append_rejects_non_contiguous() {
        let mut idx = SegmentIndex::from_refs(vec![simple_ref(0.0, 10.0)]).unwrap();
        let err = idx.append(vec![simple_ref(5.0, 15.0)]).unwrap_err();
        assert_eq!(err, IndexError::NotContiguous(5.0, 15.0, 10.0));
    }

    #[test]
    fn evict_drops_expired_and_keeps_the_rest() {
        let mut idx = SegmentIndex::from_refs(vec![simple_ref(0.0, 10.0), simple_ref(10.0, 20.0), simple_ref(20.0, 30.0)]).unwrap();
        idx.evict(15.0);
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.get(0).unwrap().start_time, 10.0);
    }

    #[test]
    fn merge_preserves_identity_of_overlapping_segments_by_sequence_number() {
        let mut a = simple_ref(0.0, 10.0);
        a.media_sequence_number = Some(0);
        let mut b = simple_ref(10.0, 20.0);
        b.media_sequence_number = Some(1);
        let mut c = simple_ref(20.0, 30.0);
        c.media_sequence_number = Some(2);
        let mut idx = SegmentIndex::from_refs(vec![a, b, c]).unwrap();

        // refresh drops sequence 0, keeps 1 and 2, appends sequence 3.
        let mut b2 = simple_ref(10.0, 20.0);
        b2.media_sequence_number = Some(1);
        let mut c2 = simple_ref(20.0, 30.0);
        c2.media_sequence_number = Some(2);
        let mut d = simple_ref(30.0, 40.0);
        d.media_sequence_number = Some(3);
        idx.merge(vec![b2, c2, d]);

        assert_eq!(idx.len(), 3);
        assert_eq!(idx.get(0).unwrap().media_sequence_number, Some(1));
        assert_eq!(idx.get(2).unwrap().media_sequence_number, Some(3));
    }

    #[test]
    fn merge_preserves_init_segment_identity_when_uri_and_range_unchanged() {
        let init = Arc::new(InitSegmentReference {
            uris: vec!["init.mp4".to_string()],
            start_byte: 0,
            end_byte: Some(615),
            media_quality: None,
            aes_key: None,
        });
        let mut a = simple_ref(0.0, 10.0);
        a.media_sequence_number = Some(0);
        a.init_segment_reference = Some(Arc::clone(&init));
        let mut idx = SegmentIndex::from_refs(vec![a]).unwrap();

        let mut a2 = simple_ref(0.0, 10.0);
        a2.media_sequence_number = Some(0);
        a2.init_segment_reference = Some(Arc::new(InitSegmentReference {
            uris: vec!["init.mp4".to_string()],
            start_byte: 0,
            end_byte: Some(615),
            media_quality: None,
            aes_key: None,
        }));
        idx.merge(vec![a2]);
        let merged_init = idx.get(0).unwrap().init_segment_reference.as_ref().unwrap();
        assert!(Arc::ptr_eq(merged_init, &init));
    }

    #[test]
    fn ordering_invariant_holds_after_append() {
        let idx = SegmentIndex::from_refs(vec![simple_ref(0.0, 10.0), simple_ref(10.0, 20.0)]).unwrap();
        for w in 0..idx.len() - 1 {
            let a = idx.get(w).unwrap();
            let b = idx.get(w + 1).unwrap();
            assert!(a.end_time <= b.start_time);
            assert!(a.start_time < b.start_time);
        }
    }
}
