use tracing::debug;

pub const SCHEME: &str = "dateplus";
pub const HOST: &str = "deeplink";

/// Navigation hint carried by a widget tap. It never carries record data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeepLink {
    PinnedList,
}

impl DeepLink {
    /// `dateplus://deeplink?from=widget` opens the pinned list. Anything
    /// else is ignored.
    pub fn parse(url: &str) -> Option<Self> {
        let (scheme, rest) = url.trim().split_once("://")?;
        if !scheme.eq_ignore_ascii_case(SCHEME) {
            debug!(scheme, "ignoring deep link with foreign scheme");
            return None;
        }

        let rest = rest.split('#').next().unwrap_or_default();
        let (authority, query) = match rest.split_once('?') {
            Some((authority, query)) => (authority, query),
            None => (rest, ""),
        };
        let host = authority.trim_end_matches('/');
        if !host.eq_ignore_ascii_case(HOST) {
            debug!(host, "ignoring deep link with unknown host");
            return None;
        }

        let from = query
            .split('&')
            .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
            .find(|(name, _)| *name == "from")
            .map(|(_, value)| value)?;

        if from == "widget" {
            Some(DeepLink::PinnedList)
        } else {
            debug!(from, "ignoring deep link from unknown source");
            None
        }
    }
}
