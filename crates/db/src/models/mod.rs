//! Database models and DTOs.

pub mod operation;

pub use operation::{
    CreateOperation, Operation, OperationFilters, OperationKind, OperationStats, OperationStatus,
};
