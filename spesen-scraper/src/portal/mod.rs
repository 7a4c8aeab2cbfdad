///! Referee-assignment portal flows
///!
///! Login, menu navigation, match list and the three match dialogs, written
///! against `PageDriver` so they run the same on Chrome and in tests.

pub mod auth;
pub mod extract;
pub mod match_list;
pub mod modal;
pub mod navigation;
pub mod orchestrator;
pub mod selectors;

pub use auth::{AuthFlow, ConsentOutcome, LoginSignal};
pub use extract::{parse_referee_header, FieldReader};
pub use match_list::MatchList;
pub use modal::{CloseMethod, ModalController, ModalKind, ModalOutcome, ModalState};
pub use navigation::NavigationFlow;
pub use orchestrator::{
    run_scrape, scrape_all, scrape_portal, MatchFailure, MatchSource, PortalMatches, ProgressFn,
    ScrapeReport,
};
