//! The extractor contract.

use parking_lot::Mutex;

use crate::error::ExtractorError;
use crate::storage::TrackStub;

/// A metadata source that enriches track stubs.
///
/// Extractors are selected by capability tags. For format-specific
/// extractors the tag is the file extension (e.g. `"flac"`); other
/// extractors advertise a feature name. Implementations need not be
/// reentrant: the pipeline never calls `update` concurrently on one
/// extractor.
pub trait Extractor: Send {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Capability tags this extractor serves.
    fn capabilities(&self) -> Vec<String>;

    /// Enrich `track` in place.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing could be contributed. The pipeline
    /// logs it and moves on to the next extractor.
    fn update(&mut self, track: &mut TrackStub) -> Result<(), ExtractorError>;
}

/// A registered extractor behind its own exclusive lock.
pub struct ExtractorHandle {
    name: String,
    capabilities: Vec<String>,
    inner: Mutex<Box<dyn Extractor>>,
}

impl ExtractorHandle {
    pub(crate) fn new(extractor: Box<dyn Extractor>) -> Self {
        Self {
            name: extractor.name().to_string(),
            capabilities: extractor.capabilities(),
            inner: Mutex::new(extractor),
        }
    }

    /// Extractor name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capabilities advertised at registration.
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Run the extractor while holding its lock.
    ///
    /// Blocks while another track is being enriched by the same extractor.
    ///
    /// # Errors
    ///
    /// Propagates the extractor's own failure.
    pub fn enrich(&self, track: &mut TrackStub) -> Result<(), ExtractorError> {
        let mut extractor = self.inner.lock();
        extractor.update(track)
    }
}

impl std::fmt::Debug for ExtractorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorHandle")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}
