/// Classification for retry policy.
///
/// Used by the caching layer to decide how to react to a provider failure.
///
/// | Class | Back off? | Degrade to cached data? |
/// |-------|-----------|-------------------------|
/// | `Never` | No | Yes (nothing to fetch) |
/// | `WithBackoff` | Yes, feed the rate-limit protector | Yes |
/// | `Fallback` | No | Yes |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// The request is fundamentally unanswerable; retrying won't help.
    Never,

    /// The provider throttled the call. The protector must be told so the
    /// next permitted call is pushed out.
    WithBackoff,

    /// Transient failure (timeout, transport, bad payload). Move on to the
    /// next fallback tier without penalising the call cadence.
    Fallback,
}
