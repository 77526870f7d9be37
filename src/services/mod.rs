pub mod database;
pub mod import;
pub mod legacy_history;
pub mod relay;

pub use database::Database;
pub use legacy_history::{HistoriesFile, LegacyHistory};
pub use relay::{GenerateRequest, RelayFrame, RelayService};
