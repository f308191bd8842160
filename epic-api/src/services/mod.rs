//! Service Layer
//!
//! Business rules that sit between the routes and the store: access
//! scoping of answers and users, progress, reports, imports, linkages
//! generation and user management. Routes stay thin DTO adapters.

mod answer_service;
mod import_service;
mod linkage_service;
mod progress_service;
mod report_service;
mod user_service;

pub use answer_service::*;
pub use import_service::*;
pub use linkage_service::*;
pub use progress_service::*;
pub use report_service::*;
pub use user_service::*;
