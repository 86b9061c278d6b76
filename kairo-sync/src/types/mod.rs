pub mod events;
pub mod report;
pub mod scope;

pub use events::SyncEvent;
pub use report::{ReconcileReport, TenantInspection};
pub use scope::ScopeKey;
