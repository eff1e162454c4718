/// Bounds how many terminal records are retained per destination.
///
/// Spec §9 documents the baseline as unbounded retention; this is an
/// optional addition (default: [`RetentionConfig::unbounded`]). When
/// configured, eviction only ever removes *terminal* records, ordered by
/// completion time — a `Running` record is never evicted.
#[derive(Clone, Copy, Debug)]
pub struct RetentionConfig {
    pub(crate) per_destination_cap: Option<usize>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl RetentionConfig {
    pub fn unbounded() -> Self {
        Self {
            per_destination_cap: None,
        }
    }

    pub fn bounded(per_destination_cap: usize) -> Self {
        Self {
            per_destination_cap: Some(per_destination_cap),
        }
    }
}
