use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::record::DayOffsetRecord;
use crate::storage::{PINNED_DAYS_KEY, SharedStorage};

/// Pinned records in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinnedCollection(Vec<DayOffsetRecord>);

impl PinnedCollection {
    pub fn new(records: Vec<DayOffsetRecord>) -> Self {
        Self(records)
    }

    pub fn records(&self) -> &[DayOffsetRecord] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DayOffsetRecord> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, days: u32, include_first_day: bool) -> bool {
        self.0
            .iter()
            .any(|record| record.matches(days, include_first_day))
    }
}

impl<'a> IntoIterator for &'a PinnedCollection {
    type Item = &'a DayOffsetRecord;
    type IntoIter = std::slice::Iter<'a, DayOffsetRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug)]
pub struct PinnedStore<S> {
    storage: S,
}

impl<S: SharedStorage> PinnedStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Missing, unreadable or malformed data reads as an empty collection.
    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> PinnedCollection {
        let value = match self.storage.read(PINNED_DAYS_KEY) {
            Ok(Some(value)) => value,
            Ok(None) => return PinnedCollection::default(),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed reading pinned days; treating as empty");
                return PinnedCollection::default();
            }
        };

        match serde_json::from_value::<PinnedCollection>(value) {
            Ok(collection) => {
                debug!(count = collection.len(), "loaded pinned days");
                collection
            }
            Err(err) => {
                warn!(error = %err, "malformed pinned days; treating as empty");
                PinnedCollection::default()
            }
        }
    }

    #[tracing::instrument(skip(self, collection), fields(count = collection.len()))]
    pub fn save(&self, collection: &PinnedCollection) -> anyhow::Result<()> {
        let value = serde_json::to_value(collection)?;
        self.storage.write(PINNED_DAYS_KEY, &value)
    }

    pub fn exists(&self, days: u32, include_first_day: bool) -> bool {
        self.load().contains(days, include_first_day)
    }

    /// Appends without a duplicate check; pair with [`Self::exists`] or use
    /// [`Self::add_if_absent`].
    #[tracing::instrument(skip(self))]
    pub fn add(&self, days: u32, include_first_day: bool) -> anyhow::Result<PinnedCollection> {
        let mut collection = self.load();
        collection
            .0
            .push(DayOffsetRecord::new(days, include_first_day));
        self.save(&collection)?;
        info!(count = collection.len(), "pinned day offset");
        Ok(collection)
    }

    #[tracing::instrument(skip(self))]
    pub fn add_if_absent(
        &self,
        days: u32,
        include_first_day: bool,
    ) -> anyhow::Result<(PinnedCollection, bool)> {
        let mut collection = self.load();
        if collection.contains(days, include_first_day) {
            debug!("day offset already pinned");
            return Ok((collection, false));
        }
        collection
            .0
            .push(DayOffsetRecord::new(days, include_first_day));
        self.save(&collection)?;
        info!(count = collection.len(), "pinned day offset");
        Ok((collection, true))
    }

    /// Removes every record equal to the given offset.
    #[tracing::instrument(skip(self))]
    pub fn remove(&self, days: u32, include_first_day: bool) -> anyhow::Result<PinnedCollection> {
        let mut collection = self.load();
        let before = collection.len();
        collection
            .0
            .retain(|record| !record.matches(days, include_first_day));
        self.save(&collection)?;
        info!(
            before,
            after = collection.len(),
            "removed pinned day offsets"
        );
        Ok(collection)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::PinnedStore;
    use crate::record::DayOffsetRecord;
    use crate::storage::{MemoryStorage, PINNED_DAYS_KEY, SharedStorage};

    #[test]
    fn add_then_remove() {
        let storage = MemoryStorage::new();
        let store = PinnedStore::new(&storage);

        let pinned = store.add(5, true).expect("add");
        assert_eq!(pinned.len(), 1);
        assert!(
            store
                .load()
                .records()
                .contains(&DayOffsetRecord::new(5, true))
        );
        assert!(store.exists(5, true));
        assert!(!store.exists(5, false));

        let pinned = store.remove(5, true).expect("remove");
        assert!(pinned.is_empty());
        assert!(!store.exists(5, true));
    }

    #[test]
    fn plain_add_allows_duplicates_and_remove_clears_all() {
        let storage = MemoryStorage::new();
        let store = PinnedStore::new(&storage);
        store.add(3, false).expect("add");
        store.add(10, true).expect("add");
        let pinned = store.add(3, false).expect("add again");
        assert_eq!(pinned.len(), 3);

        let pinned = store.remove(3, false).expect("remove");
        assert_eq!(pinned.len(), 1);
        assert_eq!(pinned.records()[0].days(), 10);
    }

    #[test]
    fn add_if_absent_rejects_duplicates() {
        let storage = MemoryStorage::new();
        let store = PinnedStore::new(&storage);

        let (first, added) = store.add_if_absent(7, true).expect("add");
        assert!(added);
        let (second, added) = store.add_if_absent(7, true).expect("add again");
        assert!(!added);
        assert_eq!(first, second);
        assert_eq!(store.load().len(), 1);
    }

    #[test]
    fn preserves_insertion_order() {
        let storage = MemoryStorage::new();
        let store = PinnedStore::new(&storage);
        for days in [30, 1, 14] {
            store.add(days, false).expect("add");
        }
        let days: Vec<u32> = store.load().iter().map(|r| r.days()).collect();
        assert_eq!(days, vec![30, 1, 14]);
    }

    #[test]
    fn malformed_blob_reads_as_empty() {
        let storage = MemoryStorage::new();
        storage
            .write(PINNED_DAYS_KEY, &json!({"days": "nope"}))
            .expect("seed");
        let store = PinnedStore::new(&storage);
        assert!(store.load().is_empty());

        let pinned = store.add(2, false).expect("add over malformed");
        assert_eq!(pinned.len(), 1);
    }
}
