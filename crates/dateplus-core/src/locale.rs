//! Localized strings keyed by a closed set of semantic keys.
//!
//! A [`LocaleTable`] is built once per process and handed out by reference.
//! Lookups never fail: a missing locale or key falls back to the key's raw
//! English text.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, anyhow};
use tracing::{debug, info, warn};

pub const DEFAULT_LOCALE: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LocalizedKey {
    LocaleCode,
    Day,
    DaysLater,
    FromToday,
    Pinned,
    AlreadyRegistered,
    PinnedNothing,
    PinnedTip,
    ConfirmDelete,
    Delete,
    Cancel,
    ConfirmComplication,
    Update,
    WidgetDay,
    WidgetDaysLater,
    AddWatchFace,
    SelectWidgetNumber,
    PinList,
}

impl LocalizedKey {
    pub const ALL: [LocalizedKey; 18] = [
        LocalizedKey::LocaleCode,
        LocalizedKey::Day,
        LocalizedKey::DaysLater,
        LocalizedKey::FromToday,
        LocalizedKey::Pinned,
        LocalizedKey::AlreadyRegistered,
        LocalizedKey::PinnedNothing,
        LocalizedKey::PinnedTip,
        LocalizedKey::ConfirmDelete,
        LocalizedKey::Delete,
        LocalizedKey::Cancel,
        LocalizedKey::ConfirmComplication,
        LocalizedKey::Update,
        LocalizedKey::WidgetDay,
        LocalizedKey::WidgetDaysLater,
        LocalizedKey::AddWatchFace,
        LocalizedKey::SelectWidgetNumber,
        LocalizedKey::PinList,
    ];

    /// Identifier used in locale override files.
    pub fn name(self) -> &'static str {
        match self {
            LocalizedKey::LocaleCode => "localeCode",
            LocalizedKey::Day => "day",
            LocalizedKey::DaysLater => "daysLater",
            LocalizedKey::FromToday => "fromToday",
            LocalizedKey::Pinned => "pinned",
            LocalizedKey::AlreadyRegistered => "alreadyRegistered",
            LocalizedKey::PinnedNothing => "pinnedNothing",
            LocalizedKey::PinnedTip => "pinnedTip",
            LocalizedKey::ConfirmDelete => "confirmDelete",
            LocalizedKey::Delete => "delete",
            LocalizedKey::Cancel => "cancel",
            LocalizedKey::ConfirmComplication => "confirmComplication",
            LocalizedKey::Update => "update",
            LocalizedKey::WidgetDay => "widgetDay",
            LocalizedKey::WidgetDaysLater => "widgetDaysLater",
            LocalizedKey::AddWatchFace => "addWatchFace",
            LocalizedKey::SelectWidgetNumber => "selectWidgetNumber",
            LocalizedKey::PinList => "pinList",
        }
    }

    /// Text returned when no table has an entry for this key.
    pub fn raw_value(self) -> &'static str {
        match self {
            LocalizedKey::LocaleCode => DEFAULT_LOCALE,
            LocalizedKey::Day => "day",
            LocalizedKey::DaysLater => "days later",
            LocalizedKey::FromToday => "From Today",
            LocalizedKey::Pinned => "Pinned.",
            LocalizedKey::AlreadyRegistered => "Already registered.",
            LocalizedKey::PinnedNothing => "There are no days pinned.",
            LocalizedKey::PinnedTip => {
                "Tip: pin a day count from the main screen to list several dates together here."
            }
            LocalizedKey::ConfirmDelete => "Are you sure you want to delete?",
            LocalizedKey::Delete => "Delete",
            LocalizedKey::Cancel => "Cancel",
            LocalizedKey::ConfirmComplication => "Do you want to update the Complication?",
            LocalizedKey::Update => "Update",
            LocalizedKey::WidgetDay => "D",
            LocalizedKey::WidgetDaysLater => "D L",
            LocalizedKey::AddWatchFace => "Add to watchface",
            LocalizedKey::SelectWidgetNumber => "Select widget number.",
            LocalizedKey::PinList => "Pin list",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.name() == name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LocaleTable {
    locales: HashMap<String, HashMap<LocalizedKey, String>>,
}

impl LocaleTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut table = Self::empty();
        table.insert_locale("en", english_strings());
        table.insert_locale("ja", japanese_strings());
        debug!(locales = table.locales.len(), "loaded builtin locale table");
        table
    }

    /// Builtin table with overrides from an optional TOML file.
    #[tracing::instrument(skip(path))]
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut table = Self::builtin();
        if let Some(path) = path {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read locale file {}", path.display()))?;
            table
                .merge_toml(&raw)
                .with_context(|| format!("failed to parse locale file {}", path.display()))?;
            info!(file = %path.display(), "merged locale overrides");
        }
        Ok(table)
    }

    pub fn insert_locale<I, S>(&mut self, code: &str, entries: I)
    where
        I: IntoIterator<Item = (LocalizedKey, S)>,
        S: Into<String>,
    {
        let strings = self.locales.entry(code.to_string()).or_default();
        for (key, value) in entries {
            strings.insert(key, value.into());
        }
    }

    /// Merges `[<locale>]` tables of `key = "text"` pairs.
    pub fn merge_toml(&mut self, raw: &str) -> anyhow::Result<()> {
        let parsed: HashMap<String, HashMap<String, String>> = toml::from_str(raw)?;
        for (code, entries) in parsed {
            let mut resolved = Vec::with_capacity(entries.len());
            for (name, value) in entries {
                match LocalizedKey::from_name(&name) {
                    Some(key) => resolved.push((key, value)),
                    None => warn!(locale = %code, key = %name, "unknown locale key; ignoring"),
                }
            }
            if resolved.is_empty() {
                return Err(anyhow!("locale section [{code}] has no known keys"));
            }
            self.insert_locale(&code, resolved);
        }
        Ok(())
    }

    pub fn lookup(&self, locale_code: &str, key: LocalizedKey) -> &str {
        self.locales
            .get(locale_code)
            .and_then(|strings| strings.get(&key))
            .map(String::as_str)
            .unwrap_or(key.raw_value())
    }

    pub fn localizer<'a>(&'a self, locale_code: &str) -> Localizer<'a> {
        Localizer {
            table: self,
            locale_code: locale_code.to_string(),
        }
    }

    pub fn locale_codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.locales.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }
}

/// Lookup capability bound to one locale.
#[derive(Debug, Clone)]
pub struct Localizer<'a> {
    table: &'a LocaleTable,
    locale_code: String,
}

impl Localizer<'_> {
    pub fn localize(&self, key: LocalizedKey) -> &str {
        self.table.lookup(&self.locale_code, key)
    }

    /// The locale the table claims for itself; unknown locales resolve to
    /// the English fallback.
    pub fn effective_locale(&self) -> &str {
        self.localize(LocalizedKey::LocaleCode)
    }

    pub fn requested_locale(&self) -> &str {
        &self.locale_code
    }
}

fn english_strings() -> Vec<(LocalizedKey, &'static str)> {
    vec![
        (LocalizedKey::LocaleCode, "en"),
        (LocalizedKey::Day, "day"),
        (LocalizedKey::DaysLater, "days later"),
        (LocalizedKey::FromToday, "From Today"),
        (LocalizedKey::Pinned, "Pinned."),
        (LocalizedKey::AlreadyRegistered, "Already registered."),
        (LocalizedKey::PinnedNothing, "There are no days pinned."),
        (
            LocalizedKey::PinnedTip,
            "Tip: pin a day count from the main screen to list several dates together here.",
        ),
        (LocalizedKey::ConfirmDelete, "Are you sure you want to delete?"),
        (LocalizedKey::Delete, "Delete"),
        (LocalizedKey::Cancel, "Cancel"),
        (
            LocalizedKey::ConfirmComplication,
            "Do you want to update the Complication?",
        ),
        (LocalizedKey::Update, "Update"),
        (LocalizedKey::WidgetDay, "D"),
        (LocalizedKey::WidgetDaysLater, "D L"),
        (LocalizedKey::AddWatchFace, "Add to watchface."),
        (LocalizedKey::SelectWidgetNumber, "Select widget number."),
        (LocalizedKey::PinList, "Pin list"),
    ]
}

fn japanese_strings() -> Vec<(LocalizedKey, &'static str)> {
    vec![
        (LocalizedKey::LocaleCode, "ja"),
        (LocalizedKey::Day, "日目"),
        (LocalizedKey::DaysLater, "日後"),
        (LocalizedKey::FromToday, "本日起算"),
        (LocalizedKey::Pinned, "ピン留めしました。"),
        (LocalizedKey::AlreadyRegistered, "既に登録されています。"),
        (LocalizedKey::PinnedNothing, "ピン留めされた日数がありません。"),
        (
            LocalizedKey::PinnedTip,
            "ヒント: メイン画面でピン留めすると、この画面で複数の日付をまとめて表示できます。",
        ),
        (LocalizedKey::ConfirmDelete, "削除してもよろしいですか？"),
        (LocalizedKey::Delete, "削除"),
        (LocalizedKey::Cancel, "キャンセル"),
        (
            LocalizedKey::ConfirmComplication,
            "コンプリケーションを更新しますか？",
        ),
        (LocalizedKey::Update, "更新"),
        (LocalizedKey::WidgetDay, "日目"),
        (LocalizedKey::WidgetDaysLater, "日後"),
        (LocalizedKey::AddWatchFace, "文字盤に登録"),
        (LocalizedKey::SelectWidgetNumber, "ウィジェットの番号を選択"),
        (LocalizedKey::PinList, "ピン留め一覧"),
    ]
}
