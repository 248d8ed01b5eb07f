//! Use cases: the operations UI layers call into.

pub mod catalog;
pub mod completion;
pub mod export;
pub mod migration;
pub mod profiles;

pub use catalog::{CatalogService, TaskCatalog};
pub use completion::CompletionTracker;
pub use export::{AllProfilesExport, ExportError, ExportService, ProfileData, ProfileExport};
pub use migration::MigrationRunner;
pub use profiles::ProfileManager;
