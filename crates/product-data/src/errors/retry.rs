/// Classification for retry policy.
///
/// Used to decide how the source chain treats an error from a source.
///
/// # Behavior Summary
///
/// | Class | Retried? | Next Source? | Outcome |
/// |-------|----------|--------------|---------|
/// | `Never` | No | Yes | `NotFound` |
/// | `WithBackoff` | Yes, up to `max_attempts` | Yes, once exhausted | `TransientError` |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Definitive answer from the source - retrying won't change it.
    Never,

    /// Transient failure (timeout, 5xx, rate limiting, broken connection).
    ///
    /// Retried with exponential backoff. Once retries are exhausted the chain
    /// moves on to the next source.
    WithBackoff,
}
