use std::fmt;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::record::DayOffsetRecord;
use crate::storage::{
    LEGACY_DAYS_TO_ADD_KEY, LEGACY_INCLUDE_FIRST_DAY_KEY, SLOT_DAY_INFOS_KEY, SharedStorage,
};

pub const SLOT_COUNT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("slot number must be between 1 and 3, got {0}")]
    OutOfRange(i64),
}

/// A complication slot number, 1 through 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotIndex(u8);

impl SlotIndex {
    pub const ALL: [SlotIndex; SLOT_COUNT] = [SlotIndex(1), SlotIndex(2), SlotIndex(3)];

    pub fn new(number: i64) -> Result<Self, SlotError> {
        match u8::try_from(number) {
            Ok(n) if (1..=SLOT_COUNT as u8).contains(&n) => Ok(Self(n)),
            _ => Err(SlotError::OutOfRange(number)),
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }

    fn position(self) -> usize {
        usize::from(self.0) - 1
    }
}

impl TryFrom<u32> for SlotIndex {
    type Error = SlotError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(i64::from(value))
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed array of records rendered by widget surfaces. Slots hold copies;
/// nothing here refers back to the pinned collection.
#[derive(Debug)]
pub struct SlotStore<S> {
    storage: S,
}

impl<S: SharedStorage> SlotStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    #[tracing::instrument(skip(self, record), fields(slot = %index, days = record.days()))]
    pub fn register_slot(&self, index: SlotIndex, record: &DayOffsetRecord) -> anyhow::Result<()> {
        let mut slots = self.load_stored().unwrap_or_default();
        if slots.len() < SLOT_COUNT {
            debug!(stored = slots.len(), "backfilling complication slots");
            slots.resize_with(SLOT_COUNT, DayOffsetRecord::slot_default);
        }
        slots.truncate(SLOT_COUNT);
        slots[index.position()] = record.clone();

        let value = serde_json::to_value(&slots)?;
        self.storage.write(SLOT_DAY_INFOS_KEY, &value)?;
        info!("registered complication slot");
        Ok(())
    }

    /// Untyped entry point; an out-of-range number leaves storage untouched.
    pub fn register_slot_number(&self, number: i64, record: &DayOffsetRecord) -> anyhow::Result<()> {
        let index = SlotIndex::new(number)?;
        self.register_slot(index, record)
    }

    pub fn read_slot(&self, index: SlotIndex) -> DayOffsetRecord {
        let [first, second, third] = self.read_all_slots();
        match index.position() {
            0 => first,
            1 => second,
            _ => third,
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn read_all_slots(&self) -> [DayOffsetRecord; SLOT_COUNT] {
        let stored = self
            .load_stored()
            .unwrap_or_else(|| self.load_legacy().into_iter().collect());
        let mut stored = stored.into_iter();
        std::array::from_fn(|_| stored.next().unwrap_or_else(DayOffsetRecord::slot_default))
    }

    fn load_stored(&self) -> Option<Vec<DayOffsetRecord>> {
        let value = match self.storage.read(SLOT_DAY_INFOS_KEY) {
            Ok(value) => value?,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed reading complication slots");
                return None;
            }
        };

        match serde_json::from_value::<Vec<DayOffsetRecord>>(value) {
            Ok(slots) => Some(slots),
            Err(err) => {
                warn!(error = %err, "malformed complication slots; using defaults");
                None
            }
        }
    }

    /// Single-slot layout from before the slot array existed.
    fn load_legacy(&self) -> Option<DayOffsetRecord> {
        let days = self
            .read_quiet(LEGACY_DAYS_TO_ADD_KEY)?
            .as_u64()
            .and_then(|days| u32::try_from(days).ok())?;
        let include_first_day = self
            .read_quiet(LEGACY_INCLUDE_FIRST_DAY_KEY)
            .and_then(|value| value.as_bool())
            .unwrap_or(false);
        debug!(days, include_first_day, "using legacy complication value");
        Some(DayOffsetRecord::new(days, include_first_day))
    }

    fn read_quiet(&self, key: &str) -> Option<Value> {
        self.storage.read(key).ok().flatten()
    }
}
