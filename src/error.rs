//! The error taxonomy used across the parsing and indexing engine.
//!
//! Every fallible operation in this crate returns a [`ManifestError`]. Each variant is tagged
//! with a [`Severity`] so that callers (and the crate itself, when deciding whether to drop a
//! stream versus failing the whole `parse()`) can apply the propagation policy without matching
//! on the full enum.

use std::fmt;

/// How serious an error is, independently of its kind.
///
/// `Recoverable` errors are routed through `onError` and the affected stream, period or
/// AdaptationSet is dropped; `Critical` errors fail the enclosing `parse`/`refresh` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Recoverable,
    Critical,
}

/// Identifies which part of a manifest an error concerns, for attaching to `onError`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub period_id: Option<String>,
    pub adaptation_set_id: Option<String>,
    pub representation_id: Option<String>,
    pub uri: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_representation(mut self, id: impl Into<String>) -> Self {
        self.representation_id = Some(id.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(p) = &self.period_id {
            parts.push(format!("period={p}"));
        }
        if let Some(a) = &self.adaptation_set_id {
            parts.push(format!("adaptation_set={a}"));
        }
        if let Some(r) = &self.representation_id {
            parts.push(format!("representation={r}"));
        }
        if let Some(u) = &self.uri {
            parts.push(format!("uri={u}"));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// The taxonomy of errors that can arise while parsing or maintaining a manifest, per the
/// component design's error handling section.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The underlying fetcher reported a transport failure (connection refused, DNS failure,
    /// a non-2xx status after the fetcher's own retries were exhausted).
    #[error("network error fetching {uri}: {source}")]
    NetworkError {
        uri: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The MPD document could not be parsed as well-formed XML, or its root element was not
    /// `MPD`.
    #[error("invalid MPD XML: {0}")]
    InvalidXml(String),

    /// A `Period` contains no usable AdaptationSet.
    #[error("period {0:?} has no usable AdaptationSet")]
    EmptyPeriod(Option<String>),

    /// An `AdaptationSet` contains no usable Representation.
    #[error("AdaptationSet {0:?} has no usable Representation")]
    EmptyAdaptationSet(Option<String>),

    /// Two Representations in the same live manifest share an `@id`.
    #[error("duplicate Representation id {0}")]
    DuplicateRepresentationId(String),

    /// A `UTCTiming` or `ContentProtection` `schemeIdUri` was not recognised; the element is
    /// skipped rather than treated as fatal.
    #[error("unrecognised scheme: {0}")]
    UnrecognisedScheme(String),

    /// A mandatory attribute was absent.
    #[error("required attribute {attribute} missing on {element}")]
    RequiredAttributeMissing { element: String, attribute: String },

    /// A mandatory child tag was absent.
    #[error("required tag {tag} missing on {element}")]
    RequiredTagMissing { element: String, tag: String },

    /// Neither the manifest nor the container could tell us the codec string.
    #[error("could not guess codecs for {0}")]
    CouldNotGuessCodecs(String),

    /// Neither the manifest, the file extension, nor a HEAD request could tell us the MIME type.
    #[error("could not guess MIME type for {0}")]
    CouldNotGuessMimeType(String),

    /// An encryption scheme that this engine cannot support under the current platform
    /// capabilities (SAMPLE-AES / FairPlay over MPEG-TS, AES-128 without a Web Crypto
    /// equivalent available to the embedder).
    #[error("unsupported encryption: {0}")]
    UnsupportedEncryption(String),

    /// The media-container probe could not locate a presentation timestamp in the segment's
    /// leading bytes.
    #[error("could not parse timestamp from segment: {0}")]
    UnparsableSegment(String),

    /// The operation was cancelled via its `CancellationToken`; distinct from `NetworkError` so
    /// that cancellation during a start-time probe is never misreported as "server doesn't
    /// support range requests".
    #[error("operation aborted")]
    Aborted,

    /// Catch-all for internal invariant violations (malformed URI joins, and so on).
    #[error("{0}")]
    Other(String),
}

impl ManifestError {
    pub fn severity(&self) -> Severity {
        use ManifestError::*;
        match self {
            NetworkError { .. } => Severity::Critical,
            InvalidXml(_) => Severity::Critical,
            EmptyPeriod(_) => Severity::Critical,
            EmptyAdaptationSet(_) => Severity::Critical,
            // Upgraded to Critical by the caller when parsing a live manifest; VOD treats it as
            // a warning by constructing the error but not propagating it.
            DuplicateRepresentationId(_) => Severity::Recoverable,
            UnrecognisedScheme(_) => Severity::Recoverable,
            RequiredAttributeMissing { .. } => Severity::Critical,
            RequiredTagMissing { .. } => Severity::Critical,
            CouldNotGuessCodecs(_) => Severity::Critical,
            CouldNotGuessMimeType(_) => Severity::Critical,
            UnsupportedEncryption(_) => Severity::Critical,
            UnparsableSegment(_) => Severity::Recoverable,
            Aborted => Severity::Critical,
            Other(_) => Severity::Critical,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, ManifestError::Aborted)
    }
}

pub type Result<T> = std::result::Result<T, ManifestError>;
