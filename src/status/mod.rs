pub mod mega_status;
pub mod registry;
pub mod snapshot;
