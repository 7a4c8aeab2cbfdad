///! Field extraction from an open modal
///!
///! Every field is read on its own with a short bounded wait. A field that is
///! not there stays `None`; it never fails the record.

use std::time::Duration;

use spesen_common::{RefereeContact, RefereeRole, SpielInfo, VenueInfo};
use tracing::{debug, info, warn};

use super::selectors;
use crate::browser::wait::text_within;
use crate::browser::{PageDriver, Target};
use crate::config::PortalTimeouts;

/// Split a referee header such as "SRA 1 Jan Vogt" into role and name.
///
/// Assistants carry their number as a separate token, so the role can span
/// two tokens. Unknown roles and headers without a name yield `None`.
pub fn parse_referee_header(header: &str) -> Option<(RefereeRole, String)> {
    let tokens: Vec<&str> = header.split_whitespace().collect();
    let (role, rest) = match tokens.as_slice() {
        ["SR", rest @ ..] => (RefereeRole::Sr, rest),
        ["Beo", rest @ ..] => (RefereeRole::Beo, rest),
        ["SRA", number, rest @ ..] => match number.parse::<u8>() {
            Ok(n) => (RefereeRole::Sra(n), rest),
            Err(_) => {
                debug!("Assistant header without number: {}", header);
                return None;
            }
        },
        _ => return None,
    };

    if rest.is_empty() {
        return None;
    }
    Some((role, rest.join(" ")))
}

pub struct FieldReader<'a, D: PageDriver + ?Sized> {
    page: &'a D,
    root: &'a Target,
    field: Duration,
    referee_field: Duration,
}

impl<'a, D: PageDriver + ?Sized> FieldReader<'a, D> {
    pub fn new(page: &'a D, root: &'a Target, timeouts: &PortalTimeouts) -> Self {
        Self {
            page,
            root,
            field: PortalTimeouts::ms(timeouts.field),
            referee_field: PortalTimeouts::ms(timeouts.referee_field),
        }
    }

    fn text(&self, target: &Target, timeout: Duration) -> Option<String> {
        let value = text_within(self.page, target, timeout);
        if value.is_none() {
            debug!("Field not found: {}", target);
        }
        value
    }

    pub fn spiel_info(&self) -> SpielInfo {
        info!("Extracting match info...");
        let labelled = |label: &str| self.text(&selectors::labelled_value(self.root, label), self.field);

        let info = SpielInfo {
            anpfiff: self.text(&selectors::kickoff(self.root), self.field),
            heim_team: labelled("Heim"),
            gast_team: labelled("Gast"),
            mannschaftsart: labelled("Mannschaftsart"),
            spielklasse: labelled("Spielklasse"),
            staffel: labelled("Staffel"),
            spieltag: labelled("Spieltag"),
        };

        if info.is_empty() {
            warn!("Match info modal yielded no fields");
        }
        info
    }

    pub fn referees(&self) -> Vec<RefereeContact> {
        info!("Extracting referee contacts...");
        let count = match self.page.count(&selectors::referee_items(self.root)) {
            Ok(n) => n,
            Err(e) => {
                warn!("Could not count referee entries: {}", e);
                0
            }
        };

        let referees: Vec<RefereeContact> = (0..count)
            .filter_map(|i| self.referee(&selectors::referee_item(self.root, i)))
            .collect();

        info!("Extracted {} referees", referees.len());
        referees
    }

    fn referee(&self, item: &Target) -> Option<RefereeContact> {
        let header = self.text(&selectors::referee_header(item), self.referee_field)?;
        let Some((rolle, name)) = parse_referee_header(&header) else {
            warn!("Skipping referee entry with unrecognised header '{}'", header);
            return None;
        };

        let row = |label: &str| selectors::contact_row(item, label);
        Some(RefereeContact {
            rolle,
            name,
            telefon: self.text(&selectors::contact_link(&row(selectors::PHONE_LABEL)), self.referee_field),
            email: self.text(&selectors::contact_link(&row(selectors::EMAIL_LABEL)), self.referee_field),
            strasse: self.text(&selectors::contact_value(&row(selectors::STREET_LABEL)), self.referee_field),
            plz_ort: self.text(&selectors::contact_value(&row(selectors::ZIP_CITY_LABEL)), self.referee_field),
        })
    }

    pub fn venue(&self) -> VenueInfo {
        info!("Extracting venue info...");
        let name = self
            .text(&selectors::venue_subtitle(self.root), self.field)
            .or_else(|| self.text(&selectors::venue_name_fallback(self.root), self.field));

        let adresse = self
            .text(&selectors::venue_address(self.root), self.field)
            .or_else(|| self.address_from_zip_line());

        VenueInfo {
            name,
            adresse,
            platz_typ: self.text(&selectors::venue_pitch_type(self.root), self.referee_field),
        }
    }

    /// First line containing a postcode that is more than just the postcode
    fn address_from_zip_line(&self) -> Option<String> {
        let lines = match self.page.all_texts(&selectors::venue_zip_lines(self.root)) {
            Ok(lines) => lines,
            Err(e) => {
                debug!("Could not read address lines: {}", e);
                return None;
            }
        };
        lines
            .into_iter()
            .map(|line| line.trim().to_string())
            .find(|line| line.chars().count() > 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakePage;

    fn root() -> Target {
        selectors::modal_root()
    }

    #[test]
    fn test_parse_referee_header() {
        assert_eq!(
            parse_referee_header("SRA 1 Jan Vogt"),
            Some((RefereeRole::Sra(1), "Jan Vogt".to_string()))
        );
        assert_eq!(
            parse_referee_header("SR Louis Gaudes"),
            Some((RefereeRole::Sr, "Louis Gaudes".to_string()))
        );
        assert_eq!(
            parse_referee_header("  Beo   Karl  Heinz Meier "),
            Some((RefereeRole::Beo, "Karl Heinz Meier".to_string()))
        );
    }

    #[test]
    fn test_parse_referee_header_rejects_unknown() {
        assert_eq!(parse_referee_header("SR"), None);
        assert_eq!(parse_referee_header("SRA 2"), None);
        assert_eq!(parse_referee_header("SRA Jan Vogt"), None);
        assert_eq!(parse_referee_header("4.OFF Max Muster"), None);
        assert_eq!(parse_referee_header(""), None);
    }

    #[test]
    fn test_spiel_info_from_labels() {
        let mut page = FakePage::new("https://www.dfbnet.org/sria");
        let root = root();
        page.show(&selectors::kickoff(&root), "Samstag · 08.11.2025 · 13:00 Uhr");
        page.show(&selectors::labelled_value(&root, "Heim"), " TSV Etting ");
        page.show(&selectors::labelled_value(&root, "Gast"), "FC Gerolfing");
        page.show(&selectors::labelled_value(&root, "Spielklasse"), "Kreisliga");

        let info = FieldReader::new(&page, &root, &PortalTimeouts::default()).spiel_info();
        assert_eq!(info.anpfiff.as_deref(), Some("Samstag · 08.11.2025 · 13:00 Uhr"));
        assert_eq!(info.heim_team.as_deref(), Some("TSV Etting"));
        assert_eq!(info.gast_team.as_deref(), Some("FC Gerolfing"));
        assert_eq!(info.spielklasse.as_deref(), Some("Kreisliga"));
        assert_eq!(info.staffel, None);
        assert_eq!(info.spieltag, None);
    }

    #[test]
    fn test_referees_with_partial_contacts() {
        let mut page = FakePage::new("https://www.dfbnet.org/sria");
        let root = root();
        page.set_count(&selectors::referee_items(&root), 3);

        let sr = selectors::referee_item(&root, 0);
        page.show(&selectors::referee_header(&sr), "SR Louis Gaudes");
        let phone_row = selectors::contact_row(&sr, selectors::PHONE_LABEL);
        page.show(&selectors::contact_link(&phone_row), "0170 1234567");
        let zip_row = selectors::contact_row(&sr, selectors::ZIP_CITY_LABEL);
        page.show(&selectors::contact_value(&zip_row), "85049 Ingolstadt");

        let sra = selectors::referee_item(&root, 1);
        page.show(&selectors::referee_header(&sra), "SRA 1 Jan Vogt");
        let mail_row = selectors::contact_row(&sra, selectors::EMAIL_LABEL);
        page.show(&selectors::contact_link(&mail_row), "jan.vogt@example.org");

        // Third entry has no readable header
        let referees = FieldReader::new(&page, &root, &PortalTimeouts::default()).referees();
        assert_eq!(referees.len(), 2);

        assert_eq!(referees[0].rolle, RefereeRole::Sr);
        assert_eq!(referees[0].telefon.as_deref(), Some("0170 1234567"));
        assert_eq!(referees[0].plz_ort.as_deref(), Some("85049 Ingolstadt"));
        assert_eq!(referees[0].email, None);

        assert_eq!(referees[1].rolle, RefereeRole::Sra(1));
        assert_eq!(referees[1].name, "Jan Vogt");
        assert_eq!(referees[1].email.as_deref(), Some("jan.vogt@example.org"));
        assert_eq!(referees[1].telefon, None);
    }

    #[test]
    fn test_venue_without_pitch_type() {
        let mut page = FakePage::new("https://www.dfbnet.org/sria");
        let root = root();
        page.show(&selectors::venue_subtitle(&root), "BSA Ingolstadt Süd-Ost, Stadion");
        page.show(&selectors::venue_address(&root), "Südliche Ringstraße 12");

        let venue = FieldReader::new(&page, &root, &PortalTimeouts::default()).venue();
        assert_eq!(venue.name.as_deref(), Some("BSA Ingolstadt Süd-Ost, Stadion"));
        assert_eq!(venue.adresse.as_deref(), Some("Südliche Ringstraße 12"));
        assert_eq!(venue.platz_typ, None);

        let json = serde_json::to_value(&venue).unwrap();
        assert!(json.get("platz_typ").is_none());
        assert_eq!(json["name"], "BSA Ingolstadt Süd-Ost, Stadion");
    }

    #[test]
    fn test_venue_fallbacks() {
        let mut page = FakePage::new("https://www.dfbnet.org/sria");
        let root = root();
        page.show(&selectors::venue_name_fallback(&root), "Sportpark Nord");
        page.set_texts(&selectors::venue_zip_lines(&root), &["85049", "85049 Ingolstadt, Am Sportpark 3"]);
        page.show(&selectors::venue_pitch_type(&root), "Kunstrasen");

        let venue = FieldReader::new(&page, &root, &PortalTimeouts::default()).venue();
        assert_eq!(venue.name.as_deref(), Some("Sportpark Nord"));
        assert_eq!(venue.adresse.as_deref(), Some("85049 Ingolstadt, Am Sportpark 3"));
        assert_eq!(venue.platz_typ.as_deref(), Some("Kunstrasen"));
    }
}
