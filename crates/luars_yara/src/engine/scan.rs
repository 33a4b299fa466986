use std::time::Duration;

/// Upper bound on a single scan. Not configurable from scripts.
pub const SCAN_TIMEOUT: Duration = Duration::from_secs(3000);

/// Memory a scan runs over.
#[derive(Debug, Clone, Copy)]
pub enum ScanTarget<'a> {
    /// Bytes owned by the caller, e.g. a Lua string.
    Bytes(&'a [u8]),
    /// A span the caller handed over by address. Only built through
    /// [`ScanTarget::from_raw_parts`].
    RawSpan(&'a [u8]),
}

impl<'a> ScanTarget<'a> {
    /// Scan `len` bytes starting at `addr`.
    ///
    /// # Safety
    ///
    /// `addr` must be non-null and `addr..addr + len` must stay readable and
    /// unmodified for `'a`, i.e. until the scan that uses this target returns.
    pub unsafe fn from_raw_parts(addr: usize, len: usize) -> Self {
        debug_assert!(addr != 0, "raw scan target at null address");
        // SAFETY: upheld by the caller.
        ScanTarget::RawSpan(unsafe { std::slice::from_raw_parts(addr as *const u8, len) })
    }

    pub fn bytes(&self) -> &'a [u8] {
        match *self {
            ScanTarget::Bytes(bytes) | ScanTarget::RawSpan(bytes) => bytes,
        }
    }
}

/// One report handed to the scan callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent<'a> {
    /// One occurrence of one of the rule's string patterns.
    Pattern {
        rule: &'a str,
        offset: usize,
        length: usize,
    },
    /// A rule without string patterns whose condition held.
    Condition { rule: &'a str },
}

impl<'a> MatchEvent<'a> {
    pub fn rule(&self) -> &'a str {
        match *self {
            MatchEvent::Pattern { rule, .. } | MatchEvent::Condition { rule } => rule,
        }
    }
}

/// What the callback wants the scan to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanFlow {
    Continue,
    Abort,
}
