use ahash::{AHashMap, AHashSet};
use tracing::trace;

/// Generates flat-graph node ids of the form `<process id without underscores><n>`.
///
/// Counters are kept per process id and start at 1, so a fresh generator always
/// yields `loadcollection1`, `loadcollection2`, ... Every issued or reserved id
/// is remembered and never handed out twice, which also covers process ids that
/// only differ by underscores (`foo_bar` / `foobar`).
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    counters: AHashMap<String, u32>,
    issued: AHashSet<String>,
}

impl IdGenerator {
    /// A generator with no ids issued.
    pub fn new() -> Self {
        Self::default()
    }

    /// A generator that will not issue any of `ids`.
    pub fn reserving<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let mut generator = Self::new();
        for id in ids {
            generator.reserve(id);
        }
        generator
    }

    /// Next free id for `process_id`: underscores dropped, lowercased, numbered from 1.
    pub fn generate(&mut self, process_id: &str) -> String {
        let prefix = process_id.replace('_', "").to_lowercase();
        let counter = self.counters.entry(process_id.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let id = format!("{}{}", prefix, counter);
            if self.issued.insert(id.clone()) {
                trace!(process_id, id = %id, "generated node id");
                return id;
            }
        }
    }

    /// Marks `id` as taken.
    pub fn reserve(&mut self, id: impl Into<String>) {
        self.issued.insert(id.into());
    }

    /// Whether `id` was generated or reserved.
    pub fn is_issued(&self, id: &str) -> bool {
        self.issued.contains(id)
    }
}
