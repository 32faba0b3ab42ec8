use super::FetchError;

/// One logical connection to the data source.
///
/// A session carries at most one request at a time. It is owned by the
/// caller and handed to every [`PageFetcher`](super::PageFetcher) call,
/// which reuses the underlying handle while it stays usable and drops it
/// on any transport failure so the next call reconnects.
pub struct Session<H> {
    handle: Option<H>,
    busy: bool,
    requests: u64,
}

impl<H> Default for Session<H> {
    fn default() -> Self {
        Session {
            handle: None,
            busy: false,
            requests: 0,
        }
    }
}

impl<H> Session<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// true when a handle is available for a follow-up request
    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// number of requests sent through this session object
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Forget the underlying handle; the next request opens a new one.
    pub fn discard(&mut self) {
        self.handle = None;
        self.busy = false;
    }

    pub(super) fn begin(&mut self) -> Result<(), FetchError> {
        if self.busy {
            return Err(FetchError::SessionBusy);
        }
        self.busy = true;
        self.requests += 1;
        Ok(())
    }

    pub(super) fn release(&mut self) {
        self.busy = false;
    }

    pub(super) fn handle_mut(&mut self) -> Option<&mut H> {
        self.handle.as_mut()
    }

    pub(super) fn install(&mut self, handle: H) {
        self.handle = Some(handle);
    }

    pub(super) fn drop_handle(&mut self) {
        self.handle = None;
    }
}
