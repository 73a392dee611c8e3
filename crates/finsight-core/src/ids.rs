//! Sequential record ids such as `cand-00042`

/// Next free sequence number for ids shaped `{prefix}-{n}`: one past the
/// highest number in use, so ids freed by a delete are never handed out again
pub fn next_sequence<'a>(ids: impl IntoIterator<Item = &'a str>, prefix: &str) -> u64 {
    ids.into_iter()
        .filter_map(|id| id.strip_prefix(prefix)?.strip_prefix('-')?.parse::<u64>().ok())
        .max()
        .map_or(1, |n| n + 1)
}
