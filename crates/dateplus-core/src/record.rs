use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A saved day offset. Equality ignores `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayOffsetRecord {
    id: Uuid,
    days: u32,
    include_first_day: bool,
}

impl DayOffsetRecord {
    pub fn new(days: u32, include_first_day: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            days,
            include_first_day,
        }
    }

    /// Value of a complication slot nobody has registered yet.
    pub fn slot_default() -> Self {
        Self::new(1, true)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    pub fn include_first_day(&self) -> bool {
        self.include_first_day
    }

    pub fn matches(&self, days: u32, include_first_day: bool) -> bool {
        self.days == days && self.include_first_day == include_first_day
    }
}

impl PartialEq for DayOffsetRecord {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other.days, other.include_first_day)
    }
}

impl Eq for DayOffsetRecord {}

#[cfg(test)]
mod tests {
    use super::DayOffsetRecord;

    #[test]
    fn equality_ignores_id() {
        let a = DayOffsetRecord::new(5, true);
        let b = DayOffsetRecord::new(5, true);
        assert_ne!(a.id(), b.id());
        assert_eq!(a, b);
        assert_ne!(a, DayOffsetRecord::new(5, false));
        assert_ne!(a, DayOffsetRecord::new(6, true));
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let record = DayOffsetRecord::new(3, false);
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["days"], 3);
        assert_eq!(value["includeFirstDay"], false);
        assert_eq!(value["id"], record.id().to_string());
    }

    #[test]
    fn reads_uppercase_uuid() {
        let raw = r#"{"id":"E621E1F8-C36C-495A-93FC-0C247A3E6E5F","days":7,"includeFirstDay":true}"#;
        let record: DayOffsetRecord = serde_json::from_str(raw).expect("deserialize");
        assert_eq!(record.days(), 7);
        assert!(record.include_first_day());
    }
}
