//! Background services: the recovery scan loop and the auxiliary process
//! registry.

pub mod process_registry;
pub mod recovery_scanner;

pub use process_registry::{
    ProcessKind, ProcessRegistry, RegistryError, TerminationReport, TrackedProcess,
};
pub use recovery_scanner::{
    HealthStatus, RecoveryScanner, RecoveryStats, ScannerError, StuckTask,
};
