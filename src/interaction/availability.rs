//! Slot availability of the shared group accounts.

use std::{collections::BTreeMap, sync::OnceLock};

use regex::{Captures, Regex};
use serde::Serialize;

use crate::base::types::{GroupAccount, SubscriptionRecord};

/// Slots assumed for a group that does not declare any.
const DEFAULT_MAX_SLOTS: i64 = 5;

/// Shorthand customers use for products, keyed by a fragment of the group name.
const ALIASES: &[(&str, &[&str])] = &[
    ("disney", &["disney", "disney+", "hotstar"]),
    ("netflix", &["netflix", "nf"]),
    ("youtube", &["youtube", "yt", "ytb"]),
    ("spotify", &["spotify"]),
    ("hbo", &["hbo", "hbomax", "hbo max"]),
    ("prime", &["prime", "amazon"]),
    ("canva", &["canva"]),
    ("microsoft", &["microsoft", "ms365", "office"]),
    ("capcut", &["capcut"]),
    ("vpn", &["vpn"]),
    ("apple", &["apple music"]),
];

/// Occupancy of one group account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupAvailability {
    pub available: bool,
    pub reason: String,
    pub free_slots: i64,
    pub filled: i64,
    pub max_slots: i64,
}

/// Availability keyed by group name.
pub type AvailabilityMap = BTreeMap<String, GroupAvailability>;

/// Counts the subscriptions referencing each group against its capacity.
pub fn compute_availability(groups: &[GroupAccount], subscriptions: &[SubscriptionRecord]) -> AvailabilityMap {
    let mut filled_per_group: BTreeMap<&str, i64> = BTreeMap::new();
    for subscription in subscriptions {
        let name = subscription.subscription.trim();
        if !name.is_empty() {
            *filled_per_group.entry(name).or_default() += 1;
        }
    }

    groups
        .iter()
        .map(|group| {
            let max_slots = if group.max_slots > 0 { group.max_slots } else { DEFAULT_MAX_SLOTS };
            let filled = filled_per_group.get(group.subscription.trim()).copied().unwrap_or_default();
            let free_slots = max_slots - filled;
            let available = free_slots > 0;

            let reason = if available { format!("{free_slots} slot tersedia ({filled}/{max_slots})") } else { format!("FULL ({filled}/{max_slots})") };

            (group.subscription.clone(), GroupAvailability { available, reason, free_slots, filled, max_slots })
        })
        .collect()
}

/// Groups the message refers to, available ones first and then by free slots.
pub fn detect_products(message: &str, availability: &AvailabilityMap) -> Vec<String> {
    let message = strip_marks(&message.to_lowercase());

    let mut matches: Vec<(&String, &GroupAvailability)> = availability
        .iter()
        .filter(|(name, info)| {
            let name_lower = strip_marks(&name.to_lowercase());

            let direct = name_lower.split(' ').any(|word| word.chars().count() > 3 && message.contains(word));
            let alias = ALIASES
                .iter()
                .any(|(key, aliases)| name_lower.contains(key) && aliases.iter().any(|alias| message.contains(&strip_marks(alias))));

            let has_variant = name.chars().any(|c| c.is_ascii_digit());

            (direct || alias) && (has_variant || info.free_slots > 0)
        })
        .collect();

    matches.sort_by(|(_, a), (_, b)| b.available.cmp(&a.available).then(b.free_slots.cmp(&a.free_slots)));

    matches.into_iter().map(|(name, _)| name.clone()).collect()
}

fn strip_marks(text: &str) -> String {
    text.chars().filter(|c| *c != '+' && *c != '.').collect()
}

/// Customer-facing product name for an internal group name.
///
/// `"#Spotify Premium 10"` becomes `"Spotify Premium"`, `"HBO MAX 01 JUSTICE LEAGUE"` becomes `"HBO Max"`.
pub fn display_name(group: &str) -> String {
    struct Patterns {
        group_suffix: Regex,
        numbered_label: Regex,
        subtitle: Regex,
        trailing_number: Regex,
        word: Regex,
        abbreviation: Regex,
    }

    static PATTERNS: OnceLock<Patterns> = OnceLock::new();

    let p = PATTERNS.get_or_init(|| Patterns {
        group_suffix: Regex::new(r"(?i)\s+Group\s+\d+.*$").expect("static regex"),
        numbered_label: Regex::new(r"\s+\d{2}\s+[A-Z][A-Z\s]+$").expect("static regex"),
        subtitle: Regex::new(r"\s*-\s*.*$").expect("static regex"),
        trailing_number: Regex::new(r"\s+\d{1,2}$").expect("static regex"),
        word: Regex::new(r"\b\w+").expect("static regex"),
        abbreviation: Regex::new(r"(?i)\b(Hbo|Tv|Vpn|Otp|Uhd|4k)\b").expect("static regex"),
    });

    let name = group.strip_prefix('#').unwrap_or(group);
    let name = p.group_suffix.replace(name, "");
    let name = p.numbered_label.replace(&name, "");
    let name = p.subtitle.replace(&name, "");
    let name = p.trailing_number.replace(&name, "");

    let titled = p.word.replace_all(name.trim(), |caps: &Captures| {
        let mut chars = caps[0].chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
            None => String::new(),
        }
    });

    p.abbreviation.replace_all(&titled, |caps: &Captures| caps[0].to_uppercase()).into_owned()
}

/// Plain-text summary for the availability endpoint.
pub fn format_summary(availability: &AvailabilityMap) -> String {
    let available: Vec<&String> = availability.iter().filter(|(_, info)| info.available).map(|(name, _)| name).collect();
    let unavailable: Vec<(&String, &GroupAvailability)> = availability.iter().filter(|(_, info)| !info.available).collect();

    let mut summary = String::new();

    if !available.is_empty() {
        summary.push_str("✅ **Produk Tersedia:**\n");
        for name in available {
            summary.push_str(&format!("• {name}\n"));
        }
    }

    if !unavailable.is_empty() {
        summary.push_str("\n❌ **Produk Tidak Tersedia:**\n");
        for (name, info) in unavailable {
            summary.push_str(&format!("• {name} ({})\n", info.reason));
        }
    }

    if summary.is_empty() { "Tidak ada data ketersediaan produk".to_string() } else { summary }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str, max_slots: i64) -> GroupAccount {
        GroupAccount {
            subscription: name.to_string(),
            code: String::new(),
            email: format!("{}@mail.test", name.to_lowercase().replace(' ', "")),
            password: "secret".to_string(),
            max_slots,
        }
    }

    fn member(group: &str) -> SubscriptionRecord {
        SubscriptionRecord {
            subscription: group.to_string(),
            ..Default::default()
        }
    }

    fn sample() -> AvailabilityMap {
        let groups = vec![group("Netflix Premium Group 1", 2), group("Netflix Premium Group 2", 5), group("#Spotify Premium 10", 0)];
        let subscriptions = vec![member("Netflix Premium Group 1"), member("Netflix Premium Group 1"), member("Netflix Premium Group 2"), member("")];

        compute_availability(&groups, &subscriptions)
    }

    #[test]
    fn availability_counts_slots() {
        let availability = sample();

        let full = &availability["Netflix Premium Group 1"];
        assert!(!full.available);
        assert_eq!(full.reason, "FULL (2/2)");

        let open = &availability["Netflix Premium Group 2"];
        assert_eq!(open.free_slots, 4);
        assert_eq!(open.reason, "4 slot tersedia (1/5)");

        assert_eq!(availability["#Spotify Premium 10"].max_slots, 5);
    }

    #[test]
    fn detection_prefers_available_groups() {
        let availability = sample();

        assert_eq!(detect_products("nf masih ada?", &availability), vec!["Netflix Premium Group 2".to_string(), "Netflix Premium Group 1".to_string()]);
        assert_eq!(detect_products("spotify ready kak?", &availability), vec!["#Spotify Premium 10".to_string()]);
        assert!(detect_products("halo kak", &availability).is_empty());
    }

    #[test]
    fn display_names_drop_internal_decorations() {
        assert_eq!(display_name("#Spotify Premium 10"), "Spotify Premium");
        assert_eq!(display_name("Disney+ Hotstar Group 4"), "Disney+ Hotstar");
        assert_eq!(display_name("HBO MAX 01 JUSTICE LEAGUE"), "HBO Max");
        assert_eq!(display_name("MICROSOFT 365 - PERSONAL"), "Microsoft 365");
        assert_eq!(display_name("NETFLIX TV SHARED"), "Netflix TV Shared");
    }

    #[test]
    fn summary_lists_both_sides() {
        let summary = format_summary(&sample());

        assert!(summary.starts_with("✅ **Produk Tersedia:**\n• #Spotify Premium 10\n• Netflix Premium Group 2\n"));
        assert!(summary.contains("\n❌ **Produk Tidak Tersedia:**\n• Netflix Premium Group 1 (FULL (2/2))\n"));
        assert_eq!(format_summary(&AvailabilityMap::new()), "Tidak ada data ketersediaan produk");
    }
}
