//! Result wrappers for CRUD-like operations

pub mod push_status;
pub mod tariff;

pub use push_status::{PushStatusResult, PushStatusResultType};
pub use tariff::{
    DeleteTariffResult, DeleteTariffResultType, UpdateTariffResult, UpdateTariffResultType,
};
