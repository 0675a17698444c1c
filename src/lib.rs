pub mod balance;
pub mod capture;
pub mod config;
pub mod events;
pub mod gate;
pub mod ledger;
pub mod service;
mod utils;

pub use balance::{Report, ReportKind};
pub use config::{ConfigStore, StorageKind, SystemConfig};
pub use events::GateEvent;
pub use gate::{AttendanceGate, CaptureDirective, GateAction, Observation};
pub use ledger::{AttendanceLedger, AttendanceRecord, StorageMode};
pub use service::AttendanceService;
