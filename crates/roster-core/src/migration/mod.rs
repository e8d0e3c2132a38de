//! SuperAdmin > Admin > Teacher/Student hierarchy migration.
//!
//! A run resolves the SuperAdmin by email, snapshots users and quizzes, and
//! then plans three passes over the snapshot:
//!
//! 1. Admins are linked to the SuperAdmin and claim their email domain.
//! 2. Teachers and students are linked to the Admin owning their domain, or
//!    to the SuperAdmin when none does.
//! 3. Quizzes inherit the Admin of their creator.
//!
//! Only fields that differ from the desired value are written, so a second
//! run over a migrated store commits nothing.

mod config;
mod domain;
mod migrator;
mod model;
mod report;
mod snapshot;

pub use config::{
    MigrationConfig, DEFAULT_QUIZ_KEYWORDS, DEFAULT_QUIZ_TARGET_CLASS, DEFAULT_SUPER_ADMIN_EMAIL,
    DEFAULT_TARGET_CLASS, DEFAULT_TARGET_DOMAIN,
};
pub use domain::{AmbiguousDomainOwner, DomainOwnershipMap};
pub use migrator::{HierarchyMigrator, MigrationPlan};
pub use model::{email_domain, Quiz, Role, User};
pub use report::MigrationReport;
pub use snapshot::HierarchySnapshot;
