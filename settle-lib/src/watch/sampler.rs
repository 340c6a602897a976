use core::fmt::{Debug, Formatter};

/// Read-only view into a container that some other subsystem fills.
///
/// Both accessors are called once per poll tick from the watcher's task; they must
/// only read. Implementations that cannot find the container should report 0.
pub trait Sampler: Send + Sync {
    /// Number of items currently in the container. Negative values are treated as 0.
    fn count(&self) -> i64;

    /// Whether the input that triggered the operation has been consumed.
    fn input_cleared(&self) -> bool;
}

/// A [`Sampler`] built from two closures.
pub struct FnSampler<C, I> {
    count: C,
    input_cleared: I,
}

impl<C, I> FnSampler<C, I>
where
    C: Fn() -> i64 + Send + Sync,
    I: Fn() -> bool + Send + Sync,
{
    pub const fn new(count: C, input_cleared: I) -> Self {
        Self { count, input_cleared }
    }
}

impl<C, I> Sampler for FnSampler<C, I>
where
    C: Fn() -> i64 + Send + Sync,
    I: Fn() -> bool + Send + Sync,
{
    fn count(&self) -> i64 {
        (self.count)()
    }

    fn input_cleared(&self) -> bool {
        (self.input_cleared)()
    }
}

impl<C, I> Debug for FnSampler<C, I> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FnSampler")
            .field("count", &"<fn>")
            .field("input_cleared", &"<fn>")
            .finish()
    }
}

/// Clamp a raw sample to a usable count.
pub(crate) fn clamp_count(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or(0)
}
