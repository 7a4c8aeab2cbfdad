///! Locators for the referee-assignment portal
///!
///! The portal markup carries no stable ids for most data, so several of these
///! anchor on visible German labels. Everything that lives inside a modal is
///! built relative to the modal root.

use crate::browser::{Target, xpath_has_text};

pub const WEEKDAY_PATTERN: &str = "Montag|Dienstag|Mittwoch|Donnerstag|Freitag|Samstag|Sonntag";
pub const PITCH_TYPE_PATTERN: &str = "Rasenplatz|Kunstrasen|Hartplatz";
pub const STREET_PATTERN: &str = "Str|straße|platz";
pub const ZIP_PATTERN: &str = r"\d{5}";

// ============ Login ============

pub fn consent_accept() -> Target {
    Target::xpath(xpath_has_text("button", "Alle akzeptieren"))
}

/// Named login-entry strategies in the order they are tried
pub fn login_entry_strategies() -> Vec<(&'static str, Target)> {
    vec![
        ("button text", Target::xpath(xpath_has_text("button", "Anmelden"))),
        ("link text", Target::xpath(xpath_has_text("a", "Anmelden"))),
        ("login href", Target::css(r#"[href*="login"]"#)),
        ("exact text", Target::own_text(r"^Anmelden$")),
        ("login class", Target::css(".login")),
        ("login id", Target::css("#login")),
    ]
}

pub fn username_input() -> Target {
    Target::css(r#"input[placeholder*="Benutzerkennung"], input[name*="username"]"#)
}

pub fn password_input() -> Target {
    Target::css(r#"input[placeholder*="Passwort"], input[type="password"]"#)
}

/// Submit button of the credential form; the landing page's entry button
/// carries the same caption, so this one is scoped to the form.
pub fn login_submit() -> Target {
    Target::css(r#"form button[type="submit"]"#).with_text("ANMELDEN|Anmelden")
}

pub fn login_error() -> Target {
    Target::css(r#".alert-error, .error, [class*="error"]"#)
}

pub fn visible_password_field() -> Target {
    Target::css(r#"input[type="password"]"#)
}

// ============ Navigation ============

pub fn menu_toggle() -> Target {
    Target::css(r#"#dfb-Menu-toggle, button[ng-click*="menuBtnClicked"]"#)
}

pub fn assignments_menu() -> Target {
    Target::own_text(r"^Schiriansetzung$")
}

pub fn own_data_entry() -> Target {
    Target::own_text(r"^Eigene Daten$")
}

// ============ Match list ============

pub fn match_items() -> Target {
    Target::css("sria-matches-match-list-item")
}

pub fn match_item(index: usize) -> Target {
    match_items().nth(index)
}

// ============ Modals ============

/// The topmost open dialog
pub fn modal_root() -> Target {
    Target::css(r#"ngb-modal-window, .modal.show, [role="dialog"]"#).last()
}

pub fn modal_close_button(root: &Target) -> Target {
    root.child_css(r#"button[aria-label="Close"], .modal-close, [class*="close"]"#)
}

pub fn game_details_trigger(index: usize) -> Target {
    match_item(index).child_css("sria-matches-game-details-modal")
}

pub fn referees_trigger(index: usize) -> Target {
    match_item(index).child_css("sria-matches-referees-contact-details-modal")
}

pub fn venue_trigger(index: usize) -> Target {
    match_item(index).child_css("sria-matches-venue-details-modal")
}

// ============ Match info modal ============

pub fn kickoff(root: &Target) -> Target {
    root.child_own_text(WEEKDAY_PATTERN)
}

/// Bold value next to a text label, e.g. the league next to "Spielklasse"
pub fn labelled_value(root: &Target, label: &str) -> Target {
    root.child_own_text(format!("^{}", label))
        .parent_element()
        .child_css(".fw-700")
}

// ============ Referee modal ============

pub fn referee_items(root: &Target) -> Target {
    root.child_css("sria-matches-referee-contact-details-list-item")
}

pub fn referee_item(root: &Target, index: usize) -> Target {
    referee_items(root).nth(index)
}

pub fn referee_header(item: &Target) -> Target {
    item.child_css(".mb-2.fw-700")
}

/// The row a contact label sits in
pub fn contact_row(item: &Target, label_pattern: &str) -> Target {
    item.child_own_text(label_pattern).parent_element()
}

pub fn contact_value(row: &Target) -> Target {
    row.child_css(".col-7, .col-sm-6").last()
}

pub fn contact_link(row: &Target) -> Target {
    contact_value(row).child_css("a")
}

pub const PHONE_LABEL: &str = r"Telefon \(mobil\)|Telefon \(privat\)";
pub const EMAIL_LABEL: &str = r"^E-Mail";
pub const STREET_LABEL: &str = r"^Straße, Nr\.";
pub const ZIP_CITY_LABEL: &str = r"^PLZ, Ort";

// ============ Venue modal ============

pub fn venue_subtitle(root: &Target) -> Target {
    root.child_css("#modal-subtitle, .subtitle")
}

fn geotag_block(root: &Target) -> Target {
    root.child_css("dfb-geotag-icon").parent_element().parent_element()
}

pub fn venue_geotag(root: &Target) -> Target {
    root.child_css("dfb-geotag-icon")
}

pub fn venue_name_fallback(root: &Target) -> Target {
    geotag_block(root).child_css("span")
}

pub fn venue_address(root: &Target) -> Target {
    geotag_block(root).child_css("div").with_text(STREET_PATTERN)
}

pub fn venue_zip_lines(root: &Target) -> Target {
    root.child_own_text(ZIP_PATTERN)
}

pub fn venue_pitch_type(root: &Target) -> Target {
    root.child_own_text(PITCH_TYPE_PATTERN)
}
