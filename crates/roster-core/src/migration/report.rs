//! Summary of a migration run.

use serde::Serialize;

use crate::writer::WriteStats;

use super::domain::AmbiguousDomainOwner;

/// What a migration run looked at and changed.
///
/// Counts are planned updates; in a dry run nothing is committed but the
/// counts match what a live run would write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub super_admin_id: String,
    pub dry_run: bool,
    pub admins_scanned: usize,
    pub admins_updated: usize,
    pub members_scanned: usize,
    pub members_updated: usize,
    /// Teachers and students with no Admin for their domain.
    pub orphaned_members: usize,
    pub students_reclassified: usize,
    pub quizzes_scanned: usize,
    pub quizzes_updated: usize,
    pub quizzes_reclassified: usize,
    /// Quizzes whose `createdByUid` matched no user.
    pub unknown_creators: usize,
    pub ambiguous_domains: Vec<AmbiguousDomainOwner>,
    #[serde(skip)]
    pub writes: WriteStats,
}

impl MigrationReport {
    /// Updates planned across all passes.
    pub fn planned_updates(&self) -> usize {
        self.admins_updated + self.members_updated + self.quizzes_updated
    }
}
