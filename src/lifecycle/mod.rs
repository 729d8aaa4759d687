//! Job lifecycle: posting, applications, approval, work plans and invoices

pub mod manager;
pub mod transitions;

pub use manager::LifecycleManager;
