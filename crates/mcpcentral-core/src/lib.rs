pub mod adapter;
pub mod doctor;
pub mod drivers;
pub mod error;
pub mod fsio;
pub mod models;
pub mod paths;
pub mod reconcile;
pub mod registry;
pub mod target;
pub mod templates;
pub mod validate;

pub use adapter::project;
pub use doctor::build_doctor_report;
pub use error::CentralError;
pub use models::{
    ApplyOutcome, CentralDocument, DoctorReport, DoctorStatus, ServerDefinition, ServerOverride,
    StatusReport, TargetOutcome, TargetReport, TargetServerInfo,
};
pub use reconcile::Reconciler;
pub use registry::{parse_kv_pairs, RegistryStore, UpdateSpec};
pub use target::{StoreKind, Target};

use std::sync::{Mutex, MutexGuard};

static WRITE_LOCK: Mutex<()> = Mutex::new(());

/// Every mutating write — registry and target stores alike — funnels
/// through this process-wide lock, so an embedding caller (an admin UI,
/// for instance) cannot race two toggles onto the same file.
pub(crate) fn write_lock() -> MutexGuard<'static, ()> {
    WRITE_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
