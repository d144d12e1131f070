pub mod groups;
pub mod selection;
pub mod sync;

pub use groups::GroupService;
pub use selection::{CatalogSnapshots, SelectionService};
pub use sync::{SyncOutcome, SyncService};
