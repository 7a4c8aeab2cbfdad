///! Helpers shared by everything that consumes scraped match records
///!
///! Kickoff parsing, file naming for generated documents, and
///! de-duplication by (home, guest, date).

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::types::MatchRecord;

const UNKNOWN_TEAM: &str = "Unbekannt";
const FALLBACK_FILE_DATE: &str = "01-01-2000";
const FALLBACK_ISO_DATE: &str = "1900-01-01";

/// `None` only if the pattern fails to compile, which makes every kickoff
/// date unknown instead of panicking
fn date_regex() -> Option<&'static Regex> {
    static DATE_RE: OnceLock<Option<Regex>> = OnceLock::new();
    DATE_RE
        .get_or_init(|| Regex::new(r"(\d{2})\.(\d{2})\.(\d{4})").ok())
        .as_ref()
}

/// Split a kickoff string into (date, time).
///
/// `"Samstag · 08.11.2025 · 13:00 Uhr"` becomes `("08.11.2025", "13:00")`.
/// Anything without three "·"-separated parts comes back as `(raw, "")`.
pub fn parse_anpfiff(raw: &str) -> (String, String) {
    let parts: Vec<&str> = raw.split('·').collect();
    if parts.len() >= 3 {
        let date = parts[1].trim().to_string();
        let time = parts[2].replace("Uhr", "").trim().to_string();
        return (date, time);
    }
    (raw.to_string(), String::new())
}

/// The calendar date inside a kickoff string, if there is a valid one
pub fn kickoff_date(raw: &str) -> Option<NaiveDate> {
    let caps = date_regex()?.captures(raw)?;
    let day = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let year = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// "YYYY-MM-DD" for sorting, "1900-01-01" when the string carries no date
pub fn iso_date(raw: &str) -> String {
    kickoff_date(raw)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| FALLBACK_ISO_DATE.to_string())
}

/// Make a team name safe for file systems
pub fn sanitize_team_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter_map(|c| match c {
            '/' | '\\' | ':' | '|' => Some('-'),
            '*' | '?' | '"' | '<' | '>' => None,
            other => Some(other),
        })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        UNKNOWN_TEAM.to_string()
    } else {
        cleaned.to_string()
    }
}

/// File name of the expense document generated for a match:
/// `Spesen_{heim}_vs_{gast}_{DD-MM-YYYY}.docx`
pub fn document_file_name(record: &MatchRecord) -> String {
    let info = &record.spiel_info;
    let heim = sanitize_team_name(info.heim_team.as_deref().unwrap_or(UNKNOWN_TEAM));
    let gast = sanitize_team_name(info.gast_team.as_deref().unwrap_or(UNKNOWN_TEAM));
    let date = info
        .anpfiff
        .as_deref()
        .and_then(kickoff_date)
        .map(|d| d.format("%d-%m-%Y").to_string())
        .unwrap_or_else(|| FALLBACK_FILE_DATE.to_string());

    format!("Spesen_{}_vs_{}_{}.docx", heim, gast, date)
}

/// Identity of a match for de-duplication across runs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchKey {
    pub heim: String,
    pub gast: String,
    pub date: NaiveDate,
}

impl MatchKey {
    /// `None` unless both teams and a valid kickoff date are known
    pub fn of(record: &MatchRecord) -> Option<Self> {
        let info = &record.spiel_info;
        let team = |name: &Option<String>| {
            name.as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
        };
        Some(Self {
            heim: team(&info.heim_team)?,
            gast: team(&info.gast_team)?,
            date: info.anpfiff.as_deref().and_then(kickoff_date)?,
        })
    }
}

/// Drop repeated matches, keeping the first occurrence and the input order.
/// Records without a complete key are always kept.
pub fn dedupe_matches(records: Vec<MatchRecord>) -> Vec<MatchRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| MatchKey::of(r).is_none_or(|key| seen.insert(key)))
        .collect()
}

/// Stable sort by kickoff date; records without a date go first
pub fn sort_by_kickoff(records: &mut [MatchRecord]) {
    records.sort_by_key(|r| r.spiel_info.anpfiff.as_deref().map(iso_date).unwrap_or_default());
}
