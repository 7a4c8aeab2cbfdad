use serde::{Deserialize, Serialize};

/// Portal login, owned by the caller and never persisted by the scraper
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Referee role as printed in the contact modal header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RefereeRole {
    /// Schiedsrichter
    Sr,
    /// Schiedsrichter-Assistent, numbered
    Sra(u8),
    /// Beobachter
    Beo,
}

impl RefereeRole {
    pub fn is_assistant(&self) -> bool {
        matches!(self, RefereeRole::Sra(_))
    }
}

impl std::fmt::Display for RefereeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefereeRole::Sr => write!(f, "SR"),
            RefereeRole::Sra(n) => write!(f, "SRA {}", n),
            RefereeRole::Beo => write!(f, "Beo"),
        }
    }
}

impl std::str::FromStr for RefereeRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some("SR"), None, _) => Ok(RefereeRole::Sr),
            (Some("Beo"), None, _) => Ok(RefereeRole::Beo),
            (Some("SRA"), Some(n), None) => n
                .parse::<u8>()
                .map(RefereeRole::Sra)
                .map_err(|_| format!("Invalid assistant number in role: {}", s)),
            _ => Err(format!("Unknown referee role: {}", s)),
        }
    }
}

impl From<RefereeRole> for String {
    fn from(role: RefereeRole) -> Self {
        role.to_string()
    }
}

impl TryFrom<String> for RefereeRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Fields from the "Mehr Info" modal. Every field is absent when the portal
/// did not render it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpielInfo {
    /// Raw kickoff string, e.g. "Samstag · 08.11.2025 · 13:00 Uhr"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anpfiff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heim_team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gast_team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mannschaftsart: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spielklasse: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staffel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spieltag: Option<String>,
}

impl SpielInfo {
    pub fn is_empty(&self) -> bool {
        *self == SpielInfo::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefereeContact {
    pub rolle: RefereeRole,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telefon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strasse: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plz_ort: Option<String>,
}

impl RefereeContact {
    pub fn new(rolle: RefereeRole, name: impl Into<String>) -> Self {
        Self {
            rolle,
            name: name.into(),
            telefon: None,
            email: None,
            strasse: None,
            plz_ort: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adresse: Option<String>,
    /// "Rasenplatz", "Kunstrasen" or "Hartplatz"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platz_typ: Option<String>,
}

impl VenueInfo {
    pub fn is_empty(&self) -> bool {
        *self == VenueInfo::default()
    }
}

/// One scraped assignment. Built fresh per match and never mutated after the
/// scrape pass hands it out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(default)]
    pub spiel_info: SpielInfo,
    #[serde(default)]
    pub schiedsrichter: Vec<RefereeContact>,
    #[serde(default)]
    pub spielstaette: VenueInfo,
}

impl MatchRecord {
    /// Nothing was read from any of the three dialogs
    pub fn is_empty(&self) -> bool {
        self.spiel_info.is_empty() && self.schiedsrichter.is_empty() && self.spielstaette.is_empty()
    }

    /// The main referee, if the contact modal listed one
    pub fn referee(&self) -> Option<&RefereeContact> {
        self.schiedsrichter.iter().find(|r| r.rolle == RefereeRole::Sr)
    }

    pub fn assistants(&self) -> impl Iterator<Item = &RefereeContact> {
        self.schiedsrichter.iter().filter(|r| r.rolle.is_assistant())
    }
}

/// Progress of a running scrape pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeProgress {
    pub current: usize,
    pub total: usize,
    pub step: String,
}

impl ScrapeProgress {
    pub fn new(current: usize, total: usize, step: impl Into<String>) -> Self {
        Self {
            current,
            total,
            step: step.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> MatchRecord {
        let mut sr = RefereeContact::new(RefereeRole::Sr, "Louis Gaudes");
        sr.telefon = Some("0151 1234567".to_string());
        sr.email = Some("louis@example.org".to_string());
        let mut sra = RefereeContact::new(RefereeRole::Sra(1), "Jan Vogt");
        sra.plz_ort = Some("85049 Ingolstadt".to_string());

        MatchRecord {
            spiel_info: SpielInfo {
                anpfiff: Some("Samstag · 08.11.2025 · 13:00 Uhr".to_string()),
                heim_team: Some("FC Heimstetten".to_string()),
                gast_team: Some("TSV Gast".to_string()),
                mannschaftsart: Some("Herren".to_string()),
                spielklasse: Some("Kreisliga".to_string()),
                staffel: None,
                spieltag: Some("12".to_string()),
            },
            schiedsrichter: vec![sr, sra],
            spielstaette: VenueInfo {
                name: Some("BSA Ingolstadt Süd-Ost, Stadion".to_string()),
                adresse: Some("Musterstraße 1, 85049 Ingolstadt".to_string()),
                platz_typ: None,
            },
        }
    }

    #[test]
    fn test_role_display_and_parse() {
        assert_eq!(RefereeRole::Sr.to_string(), "SR");
        assert_eq!(RefereeRole::Sra(2).to_string(), "SRA 2");
        assert_eq!(RefereeRole::Beo.to_string(), "Beo");
        assert_eq!("SRA 1".parse::<RefereeRole>(), Ok(RefereeRole::Sra(1)));
        assert_eq!("Beo".parse::<RefereeRole>(), Ok(RefereeRole::Beo));
        assert!("SRA".parse::<RefereeRole>().is_err());
        assert!("Trainer".parse::<RefereeRole>().is_err());
    }

    #[test]
    fn test_record_json_round_trip() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        let back: MatchRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_json_uses_snake_case_field_names() {
        let value = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(value["spiel_info"]["heim_team"], "FC Heimstetten");
        assert_eq!(value["spiel_info"]["gast_team"], "TSV Gast");
        assert_eq!(value["spiel_info"]["anpfiff"], "Samstag · 08.11.2025 · 13:00 Uhr");
        assert_eq!(value["schiedsrichter"][1]["rolle"], "SRA 1");
        assert!(value["spiel_info"].get("staffel").is_none());
        assert!(value["spielstaette"].get("platz_typ").is_none());
    }

    #[test]
    fn test_partial_json_parses_with_absent_fields() {
        let json = r#"{"spiel_info":{"heim_team":"A"},"schiedsrichter":[],"spielstaette":{}}"#;
        let record: MatchRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.spiel_info.heim_team.as_deref(), Some("A"));
        assert!(record.spiel_info.gast_team.is_none());
        assert!(record.spielstaette.is_empty());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("schiri", "geheim");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("schiri"));
        assert!(!debug.contains("geheim"));
        assert!(creds.is_complete());
        assert!(!Credentials::new("", "x").is_complete());
    }

    #[test]
    fn test_record_role_helpers() {
        let record = sample_record();
        assert_eq!(record.referee().map(|r| r.name.as_str()), Some("Louis Gaudes"));
        assert_eq!(record.assistants().count(), 1);
        assert!(!record.is_empty());
        assert!(MatchRecord::default().is_empty());
    }
}
