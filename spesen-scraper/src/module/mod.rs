pub mod batch;
pub mod gate;
pub mod scheduled;
pub mod session_store;

pub use batch::{AccountRunResult, BatchRunner, BatchSummary, ChromeScrapeJob, ScrapeJob};
pub use gate::ScrapeGate;
pub use scheduled::NightlyScheduler;
pub use session_store::{MetadataUpdate, OutputSession, SessionMetadata, SessionStatus, SessionStore};
