//! The three-pass hierarchy migration.

use std::time::Instant;

use crate::document::{Document, Value};
use crate::error::{Error, Result};
use crate::store::{DocRef, DocumentStore, PendingWrite};
use crate::writer::{check_batch_size, BatchWriter};

use super::config::MigrationConfig;
use super::domain::DomainOwnershipMap;
use super::model::{
    Role, FIELD_ADMIN_ID, FIELD_CLASS_LEVEL, FIELD_CREATED_BY, FIELD_EMAIL,
    FIELD_METADATA_CLASS_LEVEL,
};
use super::report::MigrationReport;
use super::snapshot::HierarchySnapshot;

/// Updates computed for one run, grouped by pass.
#[derive(Debug, Clone, Default)]
pub struct MigrationPlan {
    pub admin_writes: Vec<PendingWrite>,
    pub member_writes: Vec<PendingWrite>,
    pub quiz_writes: Vec<PendingWrite>,
    pub report: MigrationReport,
}

impl MigrationPlan {
    /// All planned writes.
    pub fn len(&self) -> usize {
        self.admin_writes.len() + self.member_writes.len() + self.quiz_writes.len()
    }

    /// Whether the run has nothing to write.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Rewrites ownership links so every account and quiz sits under
/// SuperAdmin > Admin > Teacher/Student.
pub struct HierarchyMigrator<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    config: MigrationConfig,
    deadline: Option<Instant>,
}

impl<'a, S: DocumentStore + ?Sized> HierarchyMigrator<'a, S> {
    /// Create a migrator over `store`.
    pub fn new(store: &'a S, config: MigrationConfig) -> Self {
        Self {
            store,
            config,
            deadline: None,
        }
    }

    /// Stop committing once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Resolve the root, snapshot the store and compute every pass.
    pub fn plan(&self) -> Result<MigrationPlan> {
        self.config.validate()?;
        check_batch_size(self.store, self.config.batch_size)?;

        let super_admin_id = self.resolve_root()?;
        let snapshot = HierarchySnapshot::load(
            self.store,
            &self.config.users_collection,
            &self.config.quizzes_collection,
        )?;

        Ok(self.plan_from_snapshot(super_admin_id, &snapshot))
    }

    /// Compute and, unless dry-running, apply the migration.
    pub fn run(&self) -> Result<MigrationReport> {
        let plan = self.plan()?;
        let mut report = plan.report;
        report.dry_run = self.config.dry_run;

        if self.config.dry_run {
            tracing::info!(
                planned = report.planned_updates(),
                "dry run, no writes committed"
            );
            return Ok(report);
        }

        let mut writer = BatchWriter::new(self.store, self.config.batch_size)?
            .with_deadline(self.deadline);
        let passes = [
            ("migrate:pass1", plan.admin_writes),
            ("migrate:pass2", plan.member_writes),
            ("migrate:pass3", plan.quiz_writes),
        ];
        for (stage, writes) in passes {
            writer.set_stage(stage);
            for write in writes {
                writer.enqueue(write)?;
            }
        }
        report.writes = writer.flush()?;

        tracing::info!(
            commits = report.writes.commits,
            operations = report.writes.operations,
            "migration complete"
        );
        Ok(report)
    }

    fn resolve_root(&self) -> Result<String> {
        let email = self.config.super_admin_email.trim();
        let matches = self.store.query_by_field(
            &self.config.users_collection,
            FIELD_EMAIL,
            &Value::from(email),
            1,
        )?;
        match matches.into_iter().next() {
            Some((id, _)) => {
                tracing::info!(super_admin_id = %id, "resolved super admin");
                Ok(id)
            }
            None => Err(Error::RootNotFound {
                email: email.to_string(),
            }),
        }
    }

    /// Run all passes against an already captured snapshot.
    pub fn plan_from_snapshot(
        &self,
        super_admin_id: String,
        snapshot: &HierarchySnapshot,
    ) -> MigrationPlan {
        let mut plan = MigrationPlan {
            report: MigrationReport {
                super_admin_id,
                dry_run: self.config.dry_run,
                ..MigrationReport::default()
            },
            ..MigrationPlan::default()
        };

        let owners = self.plan_admins(snapshot, &mut plan);
        self.plan_members(snapshot, &owners, &mut plan);
        self.plan_quizzes(snapshot, &owners, &mut plan);
        plan
    }

    fn plan_admins(
        &self,
        snapshot: &HierarchySnapshot,
        plan: &mut MigrationPlan,
    ) -> DomainOwnershipMap {
        let root = plan.report.super_admin_id.clone();
        let mut owners = DomainOwnershipMap::new();

        for admin in snapshot.users().filter(|u| u.role == Some(Role::Admin)) {
            plan.report.admins_scanned += 1;

            match admin.domain() {
                Some(domain) => {
                    if let Some(conflict) = owners.insert(domain, admin.id.as_str()) {
                        tracing::warn!(
                            domain = %conflict.domain,
                            previous = %conflict.previous,
                            winner = %conflict.winner,
                            "domain claimed by more than one admin"
                        );
                        plan.report.ambiguous_domains.push(conflict);
                    }
                }
                None => {
                    tracing::warn!(
                        admin = %admin.id,
                        email = %admin.email,
                        "admin email has no domain"
                    );
                }
            }

            let mut patch = Document::new();
            if admin.created_by.as_deref() != Some(root.as_str()) {
                patch.insert(FIELD_CREATED_BY, root.as_str());
            }
            if admin.admin_id.as_deref() != Some(admin.id.as_str()) {
                patch.insert(FIELD_ADMIN_ID, admin.id.as_str());
            }
            if !patch.is_empty() {
                plan.report.admins_updated += 1;
                plan.admin_writes.push(PendingWrite::update(
                    DocRef::new(&self.config.users_collection, &admin.id),
                    patch,
                ));
            }
        }

        tracing::info!(
            admins = plan.report.admins_scanned,
            domains = owners.len(),
            "admin pass planned"
        );
        owners
    }

    fn plan_members(
        &self,
        snapshot: &HierarchySnapshot,
        owners: &DomainOwnershipMap,
        plan: &mut MigrationPlan,
    ) {
        let root = plan.report.super_admin_id.clone();
        let target_class = Value::from(self.config.target_class.as_str());

        let members = snapshot
            .users()
            .filter(|u| matches!(u.role, Some(Role::Teacher) | Some(Role::Student)));
        for member in members {
            plan.report.members_scanned += 1;
            let domain = member.domain().filter(|d| !d.is_empty());

            let owner = match domain.and_then(|d| owners.owner(d)) {
                Some(owner) => owner,
                None => {
                    tracing::warn!(
                        user = %member.id,
                        email = %member.email,
                        "no admin for domain, assigning to super admin"
                    );
                    plan.report.orphaned_members += 1;
                    root.as_str()
                }
            };

            let mut patch = Document::new();
            if member.created_by.as_deref() != Some(owner) {
                patch.insert(FIELD_CREATED_BY, owner);
            }
            if member.admin_id.as_deref() != Some(owner) {
                patch.insert(FIELD_ADMIN_ID, owner);
            }

            if member.role == Some(Role::Student)
                && domain == Some(self.config.target_domain.as_str())
                && member.class_level.as_ref() != Some(&target_class)
            {
                patch.insert(FIELD_METADATA_CLASS_LEVEL, target_class.clone());
                plan.report.students_reclassified += 1;
            }

            if !patch.is_empty() {
                plan.report.members_updated += 1;
                plan.member_writes.push(PendingWrite::update(
                    DocRef::new(&self.config.users_collection, &member.id),
                    patch,
                ));
            }
        }

        tracing::info!(
            members = plan.report.members_scanned,
            orphaned = plan.report.orphaned_members,
            "member pass planned"
        );
    }

    fn plan_quizzes(
        &self,
        snapshot: &HierarchySnapshot,
        owners: &DomainOwnershipMap,
        plan: &mut MigrationPlan,
    ) {
        let root = plan.report.super_admin_id.clone();
        let quiz_class = Value::from(self.config.quiz_target_class.as_str());

        for quiz in snapshot.quizzes() {
            plan.report.quizzes_scanned += 1;
            let mut patch = Document::new();

            let creator = quiz.created_by_uid.as_deref().and_then(|uid| snapshot.user(uid));
            match creator {
                Some(creator) => {
                    let owner = creator
                        .domain()
                        .and_then(|d| owners.owner(d))
                        .unwrap_or(root.as_str());
                    if quiz.admin_id.as_deref() != Some(owner) {
                        patch.insert(FIELD_ADMIN_ID, owner);
                    }
                }
                None => {
                    tracing::warn!(
                        quiz = %quiz.id,
                        creator = quiz.created_by_uid.as_deref().unwrap_or(""),
                        "quiz creator not found, ownership left unchanged"
                    );
                    plan.report.unknown_creators += 1;
                }
            }

            if self.config.title_matches(&quiz.title)
                && quiz.class_level.as_ref() != Some(&quiz_class)
            {
                patch.insert(FIELD_CLASS_LEVEL, quiz_class.clone());
                plan.report.quizzes_reclassified += 1;
            }

            if !patch.is_empty() {
                plan.report.quizzes_updated += 1;
                plan.quiz_writes.push(PendingWrite::update(
                    DocRef::new(&self.config.quizzes_collection, &quiz.id),
                    patch,
                ));
            }
        }

        tracing::info!(
            quizzes = plan.report.quizzes_scanned,
            unknown_creators = plan.report.unknown_creators,
            "quiz pass planned"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::model::{Quiz, User};

    fn user(id: &str, email: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            email: email.to_string(),
            role: Some(role),
            created_by: None,
            admin_id: None,
            class_level: None,
        }
    }

    fn quiz(id: &str, title: &str, creator: Option<&str>) -> Quiz {
        Quiz {
            id: id.to_string(),
            title: title.to_string(),
            created_by_uid: creator.map(str::to_string),
            admin_id: None,
            class_level: None,
        }
    }

    struct NoStore;

    impl DocumentStore for NoStore {
        fn stream_collection(&self, _collection: &str) -> crate::store::DocumentStream<'_> {
            Box::new(std::iter::empty())
        }

        fn batch_commit(&self, _writes: &[PendingWrite]) -> Result<()> {
            Ok(())
        }

        fn query_by_field(
            &self,
            _collection: &str,
            _field: &str,
            _value: &Value,
            _limit: usize,
        ) -> Result<Vec<(String, Document)>> {
            Ok(Vec::new())
        }
    }

    fn patch_for<'p>(writes: &'p [PendingWrite], id: &str) -> Option<&'p Document> {
        writes.iter().find(|w| w.target.id == id).map(|w| &w.payload)
    }

    #[test]
    fn test_members_follow_domain_owner() {
        let snapshot = HierarchySnapshot::from_records(
            vec![
                user("root", "super@lgite.com", Role::SuperAdmin),
                user("a1", "a1@foo.com", Role::Admin),
                user("a2", "a2@bar.com", Role::Admin),
                user("s1", "s1@foo.com", Role::Student),
                user("s2", "s2@baz.com", Role::Student),
            ],
            vec![],
        );
        let config = MigrationConfig::default().with_student_rule("baz.com", "11");
        let migrator = HierarchyMigrator::new(&NoStore, config);
        let plan = migrator.plan_from_snapshot("root".to_string(), &snapshot);

        let s1 = patch_for(&plan.member_writes, "s1").unwrap();
        assert_eq!(s1.get_str("adminId"), Some("a1"));
        assert_eq!(s1.get_str("createdBy"), Some("a1"));

        let s2 = patch_for(&plan.member_writes, "s2").unwrap();
        assert_eq!(s2.get_str("adminId"), Some("root"));
        assert_eq!(s2.get_str("metadata.classLevel"), Some("11"));

        assert_eq!(plan.report.orphaned_members, 1);
        assert_eq!(plan.report.students_reclassified, 1);
        assert_eq!(plan.admin_writes.len(), 2);
    }

    #[test]
    fn test_converged_records_produce_no_writes() {
        let mut admin = user("a1", "a1@foo.com", Role::Admin);
        admin.created_by = Some("root".to_string());
        admin.admin_id = Some("a1".to_string());
        let mut teacher = user("t1", "t1@foo.com", Role::Teacher);
        teacher.created_by = Some("a1".to_string());
        teacher.admin_id = Some("a1".to_string());

        let snapshot = HierarchySnapshot::from_records(vec![admin, teacher], vec![]);
        let migrator = HierarchyMigrator::new(&NoStore, MigrationConfig::default());
        let plan = migrator.plan_from_snapshot("root".to_string(), &snapshot);

        assert!(plan.is_empty());
        assert_eq!(plan.report.members_scanned, 1);
    }

    #[test]
    fn test_ambiguous_domain_last_id_wins() {
        let snapshot = HierarchySnapshot::from_records(
            vec![
                user("a2", "second@foo.com", Role::Admin),
                user("a1", "first@foo.com", Role::Admin),
                user("t1", "t1@foo.com", Role::Teacher),
            ],
            vec![],
        );
        let migrator = HierarchyMigrator::new(&NoStore, MigrationConfig::default());
        let plan = migrator.plan_from_snapshot("root".to_string(), &snapshot);

        assert_eq!(plan.report.ambiguous_domains.len(), 1);
        assert_eq!(plan.report.ambiguous_domains[0].previous, "a1");
        assert_eq!(plan.report.ambiguous_domains[0].winner, "a2");
        let t1 = patch_for(&plan.member_writes, "t1").unwrap();
        assert_eq!(t1.get_str("adminId"), Some("a2"));
    }

    #[test]
    fn test_admin_without_domain_claims_nothing() {
        let snapshot = HierarchySnapshot::from_records(
            vec![
                user("a1", "nodomain", Role::Admin),
                user("t1", "nodomain", Role::Teacher),
                user("t2", "t2@nodomain", Role::Teacher),
            ],
            vec![],
        );
        let migrator = HierarchyMigrator::new(&NoStore, MigrationConfig::default());
        let mut plan = MigrationPlan {
            report: MigrationReport {
                super_admin_id: "root".to_string(),
                ..MigrationReport::default()
            },
            ..MigrationPlan::default()
        };

        let owners = migrator.plan_admins(&snapshot, &mut plan);
        assert!(owners.is_empty());
        let a1 = patch_for(&plan.admin_writes, "a1").unwrap();
        assert_eq!(a1.get_str("createdBy"), Some("root"));
        assert_eq!(a1.get_str("adminId"), Some("a1"));

        migrator.plan_members(&snapshot, &owners, &mut plan);
        for id in ["t1", "t2"] {
            let patch = patch_for(&plan.member_writes, id).unwrap();
            assert_eq!(patch.get_str("adminId"), Some("root"));
            assert_eq!(patch.get_str("createdBy"), Some("root"));
        }
        assert_eq!(plan.report.orphaned_members, 2);
    }

    #[test]
    fn test_empty_member_domain_falls_back_to_root() {
        let snapshot = HierarchySnapshot::from_records(
            vec![
                user("a1", "a1@", Role::Admin),
                user("s1", "s1@", Role::Student),
                user("t1", "t1@", Role::Teacher),
            ],
            vec![],
        );
        let config = MigrationConfig::default().with_student_rule("", "11");
        let migrator = HierarchyMigrator::new(&NoStore, config);
        let plan = migrator.plan_from_snapshot("root".to_string(), &snapshot);

        for id in ["s1", "t1"] {
            let patch = patch_for(&plan.member_writes, id).unwrap();
            assert_eq!(patch.get_str("adminId"), Some("root"));
        }
        let s1 = patch_for(&plan.member_writes, "s1").unwrap();
        assert!(s1.get("metadata.classLevel").is_none());
        assert_eq!(plan.report.orphaned_members, 2);
        assert_eq!(plan.report.students_reclassified, 0);
    }

    #[test]
    fn test_dry_run_rejects_batch_size_above_ceiling() {
        let config = MigrationConfig::default()
            .with_batch_size(900)
            .with_dry_run(true);
        let migrator = HierarchyMigrator::new(&NoStore, config);
        assert!(matches!(
            migrator.run(),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_quiz_rules() {
        let snapshot = HierarchySnapshot::from_records(
            vec![
                user("a1", "a1@foo.com", Role::Admin),
                user("t1", "t1@foo.com", Role::Teacher),
                user("t2", "t2@nowhere.com", Role::Teacher),
            ],
            vec![
                quiz("q1", "Flutter Basics Quiz", Some("t1")),
                quiz("q2", "General Knowledge Round 2", Some("t2")),
                quiz("q3", "Lost quiz", Some("ghost")),
            ],
        );
        let config = MigrationConfig::default().with_quiz_rule(["General Knowledge"], "11");
        let migrator = HierarchyMigrator::new(&NoStore, config);
        let plan = migrator.plan_from_snapshot("root".to_string(), &snapshot);

        let q1 = patch_for(&plan.quiz_writes, "q1").unwrap();
        assert_eq!(q1.get_str("adminId"), Some("a1"));
        assert!(q1.get("classLevel").is_none());

        let q2 = patch_for(&plan.quiz_writes, "q2").unwrap();
        assert_eq!(q2.get_str("adminId"), Some("root"));
        assert_eq!(q2.get_str("classLevel"), Some("11"));

        assert!(patch_for(&plan.quiz_writes, "q3").is_none());
        assert_eq!(plan.report.unknown_creators, 1);
        assert_eq!(plan.report.quizzes_reclassified, 1);
    }

    #[test]
    fn test_root_not_found() {
        let migrator = HierarchyMigrator::new(&NoStore, MigrationConfig::default());
        let err = migrator.run().unwrap_err();
        assert!(matches!(err, Error::RootNotFound { ref email } if email == "super@lgite.com"));
    }

    #[test]
    fn test_invalid_config_fails_before_store_access() {
        let config = MigrationConfig::default().with_super_admin_email("");
        let migrator = HierarchyMigrator::new(&NoStore, config);
        assert!(matches!(
            migrator.run(),
            Err(Error::ConfigurationMissing { .. })
        ));
    }
}
