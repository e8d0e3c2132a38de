//! Migration configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::writer::DEFAULT_BATCH_SIZE;

/// Default SuperAdmin email.
pub const DEFAULT_SUPER_ADMIN_EMAIL: &str = "super@lgite.com";

/// Default domain whose students are reclassified.
pub const DEFAULT_TARGET_DOMAIN: &str = "lgite.com";

/// Default class assigned to students of the target domain.
pub const DEFAULT_TARGET_CLASS: &str = "11";

/// Default quiz title keywords.
pub const DEFAULT_QUIZ_KEYWORDS: &[&str] = &["Flutter", "General Knowledge"];

/// Default class assigned to matching quizzes.
pub const DEFAULT_QUIZ_TARGET_CLASS: &str = "11";

/// Hierarchy migration settings.
///
/// Can be loaded from a JSON rules file; missing keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Email of the root user.
    pub super_admin_email: String,
    /// Students with this email domain get `target_class`. Empty disables it.
    pub target_domain: String,
    /// Class written to `metadata.classLevel` of matching students.
    pub target_class: String,
    /// Case-insensitive title keywords selecting quizzes to reclassify.
    pub quiz_keywords: Vec<String>,
    /// Class written to `classLevel` of matching quizzes.
    pub quiz_target_class: String,
    /// Writes per batch commit.
    pub batch_size: usize,
    /// Collection holding users.
    pub users_collection: String,
    /// Collection holding quizzes.
    pub quizzes_collection: String,
    /// Plan and report without writing.
    pub dry_run: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            super_admin_email: DEFAULT_SUPER_ADMIN_EMAIL.to_string(),
            target_domain: DEFAULT_TARGET_DOMAIN.to_string(),
            target_class: DEFAULT_TARGET_CLASS.to_string(),
            quiz_keywords: DEFAULT_QUIZ_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            quiz_target_class: DEFAULT_QUIZ_TARGET_CLASS.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            users_collection: "users".to_string(),
            quizzes_collection: "quizzes".to_string(),
            dry_run: false,
        }
    }
}

impl MigrationConfig {
    /// Load settings from a JSON rules file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::missing(format!("rules file {}", path.display())));
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Set the SuperAdmin email.
    pub fn with_super_admin_email(mut self, email: impl Into<String>) -> Self {
        self.super_admin_email = email.into();
        self
    }

    /// Set the student target domain and class.
    pub fn with_student_rule(
        mut self,
        domain: impl Into<String>,
        class: impl Into<String>,
    ) -> Self {
        self.target_domain = domain.into();
        self.target_class = class.into();
        self
    }

    /// Set the quiz keywords and class.
    pub fn with_quiz_rule<I, K>(mut self, keywords: I, class: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.quiz_keywords = keywords.into_iter().map(Into::into).collect();
        self.quiz_target_class = class.into();
        self
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Plan only.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Check required settings before touching the store.
    pub fn validate(&self) -> Result<()> {
        if self.super_admin_email.trim().is_empty() {
            return Err(Error::missing("super admin email"));
        }
        if self.users_collection.is_empty() {
            return Err(Error::missing("users collection name"));
        }
        if self.quizzes_collection.is_empty() {
            return Err(Error::missing("quizzes collection name"));
        }
        if !self.target_domain.is_empty() && self.target_class.is_empty() {
            return Err(Error::missing("target class for the student rule"));
        }
        if !self.quiz_keywords.is_empty() && self.quiz_target_class.is_empty() {
            return Err(Error::missing("target class for the quiz rule"));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfiguration(
                "batch size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a quiz title selects the quiz rule.
    pub fn title_matches(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.quiz_keywords
            .iter()
            .filter(|k| !k.is_empty())
            .any(|k| title.contains(&k.to_lowercase()))
    }
}
