//! Point-in-time view of users and quizzes taken once per run.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::store::DocumentStore;

use super::model::{Quiz, User};

/// All users and quizzes as they were when the run started.
///
/// Passes read from the snapshot only; the store is never re-read mid-run.
#[derive(Debug, Clone, Default)]
pub struct HierarchySnapshot {
    users: BTreeMap<String, User>,
    quizzes: BTreeMap<String, Quiz>,
}

impl HierarchySnapshot {
    /// Stream both collections into memory.
    pub fn load<S: DocumentStore + ?Sized>(
        store: &S,
        users_collection: &str,
        quizzes_collection: &str,
    ) -> Result<Self> {
        let mut users = BTreeMap::new();
        for item in store.stream_collection(users_collection) {
            let (id, doc) = item?;
            let user = User::from_document(id.clone(), &doc);
            users.insert(id, user);
        }

        let mut quizzes = BTreeMap::new();
        for item in store.stream_collection(quizzes_collection) {
            let (id, doc) = item?;
            let quiz = Quiz::from_document(id.clone(), &doc);
            quizzes.insert(id, quiz);
        }

        let snapshot = Self { users, quizzes };
        tracing::info!(
            users = snapshot.user_count(),
            quizzes = snapshot.quiz_count(),
            "snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Build a snapshot from already-loaded records.
    pub fn from_records(
        users: impl IntoIterator<Item = User>,
        quizzes: impl IntoIterator<Item = Quiz>,
    ) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.id.clone(), u)).collect(),
            quizzes: quizzes.into_iter().map(|q| (q.id.clone(), q)).collect(),
        }
    }

    /// Look up a user by id.
    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    /// Users in ascending id order.
    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    /// Quizzes in ascending id order.
    pub fn quizzes(&self) -> impl Iterator<Item = &Quiz> {
        self.quizzes.values()
    }

    /// Number of users.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Number of quizzes.
    pub fn quiz_count(&self) -> usize {
        self.quizzes.len()
    }
}
