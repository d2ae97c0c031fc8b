use crate::models::HostKeyFingerprints;
use crate::utils::error::ForwardError;

/// Callbacks from a forwarding run back into the embedding app.
///
/// `verify_host_key` may block (it usually waits on the user), so the
/// forwarder calls it from a blocking thread. Exactly one of
/// `forwarding_ready` and `forwarding_failed` is called per run.
pub trait ForwardObserver: Send + Sync {
    /// One formatted log line
    fn log(&self, _line: &str) {}

    /// Return `true` to trust the server and continue to authentication
    fn verify_host_key(&self, fingerprints: &HostKeyFingerprints) -> bool;

    /// Every channel is open and every worker is waiting for a connection
    fn forwarding_ready(&self) {}

    fn forwarding_failed(&self, _error: &ForwardError) {}
}

type LogFn = Box<dyn Fn(&str) + Send + Sync>;
type VerifyFn = Box<dyn Fn(&HostKeyFingerprints) -> bool + Send + Sync>;
type ReadyFn = Box<dyn Fn() + Send + Sync>;
type FailedFn = Box<dyn Fn(&ForwardError) + Send + Sync>;

/// [`ForwardObserver`] assembled from closures
pub struct CallbackObserver {
    verify: VerifyFn,
    log: Option<LogFn>,
    ready: Option<ReadyFn>,
    failed: Option<FailedFn>,
}

impl CallbackObserver {
    pub fn new(verify: impl Fn(&HostKeyFingerprints) -> bool + Send + Sync + 'static) -> Self {
        Self {
            verify: Box::new(verify),
            log: None,
            ready: None,
            failed: None,
        }
    }

    /// Trust every host key. Only for tests and pinned-key setups.
    pub fn trusting() -> Self {
        Self::new(|_| true)
    }

    pub fn on_log(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.log = Some(Box::new(f));
        self
    }

    pub fn on_ready(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.ready = Some(Box::new(f));
        self
    }

    pub fn on_failed(mut self, f: impl Fn(&ForwardError) + Send + Sync + 'static) -> Self {
        self.failed = Some(Box::new(f));
        self
    }
}

impl ForwardObserver for CallbackObserver {
    fn log(&self, line: &str) {
        if let Some(f) = &self.log {
            f(line);
        }
    }

    fn verify_host_key(&self, fingerprints: &HostKeyFingerprints) -> bool {
        (self.verify)(fingerprints)
    }

    fn forwarding_ready(&self) {
        if let Some(f) = &self.ready {
            f();
        }
    }

    fn forwarding_failed(&self, error: &ForwardError) {
        if let Some(f) = &self.failed {
            f(error);
        }
    }
}
