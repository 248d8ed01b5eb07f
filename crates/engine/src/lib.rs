//! Questlog Engine library.
//!
//! All effectful code for the quest-progress core: the upstream fetch
//! client, the freshness cache, profile-scoped persistence, one-time data
//! migrations, and the use cases the UI layers call into. Rendering lives
//! elsewhere; the two entry points a UI needs are
//! [`use_cases::CompletionTracker::toggle`] and [`App::switch_profile`].
//!
//! ## Structure
//!
//! - `infrastructure/` - ports + adapters (HTTP, cache file, SQLite stores)
//! - `use_cases/` - catalog loading, completion tracking, profiles,
//!   migrations, export/import
//! - `config` - environment-driven configuration
//! - `app` - application composition

pub mod app;
pub mod config;
pub mod infrastructure;
pub mod use_cases;

pub use app::App;
