//! Fork-join over sibling subtrees

/// Run `a` and `b`, in parallel while `depth < cutoff`
///
/// Below the cutoff the two closures run one after the other on the calling
/// thread, so small subtrees do not pay for task creation.
pub(crate) fn join_if<A, B, RA, RB>(depth: usize, cutoff: usize, a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    if depth < cutoff {
        rayon::join(a, b)
    } else {
        (a(), b())
    }
}
