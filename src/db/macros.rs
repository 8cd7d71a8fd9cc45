/// Read-through helper for the on-disk lookup caches.
///
/// Returns the cached value for `$key` when present (a cached "nothing" counts
/// as present). Otherwise awaits `$block`, stores whatever it produced, runs
/// `$persist` so the new entry survives a crash, and returns the value.
///
/// # Arguments
/// * `$map`: map holding cached values, keyed by `$key`'s type.
/// * `$key`: the key to look up and store under.
/// * `$persist`: expression evaluated after a miss has been stored.
/// * `$block`: future computing the value on a miss. It must not fail; fetch
///   errors are expected to be folded into the value beforehand.
///
/// # Example
/// ```rust,ignore
/// let id = cached!(self.ids, title.to_string(), self.save(), self.fetch_id(title));
/// ```
#[macro_export]
macro_rules! cached {
    ($map:expr, $key:expr, $persist:expr, $block:expr) => {{
        if let Some(hit) = $map.get(&$key).cloned() {
            hit
        } else {
            let value = $block.await;
            $map.insert($key, value.clone());
            $persist;
            value
        }
    }};
}
