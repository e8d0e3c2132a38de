//! Typed views of the user and quiz documents the migration touches.

use std::fmt;

use crate::document::{Document, Value};

pub(crate) const FIELD_EMAIL: &str = "email";
pub(crate) const FIELD_ROLE: &str = "role";
pub(crate) const FIELD_CREATED_BY: &str = "createdBy";
pub(crate) const FIELD_ADMIN_ID: &str = "adminId";
pub(crate) const FIELD_CLASS_LEVEL: &str = "classLevel";
pub(crate) const FIELD_METADATA_CLASS_LEVEL: &str = "metadata.classLevel";
pub(crate) const FIELD_TITLE: &str = "title";
pub(crate) const FIELD_CREATED_BY_UID: &str = "createdByUid";

/// Position of a user in the ownership hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Root identity.
    SuperAdmin,
    /// Owner of a silo.
    Admin,
    /// Silo member.
    Teacher,
    /// Silo member.
    Student,
}

impl Role {
    /// Parse a stored role string. Unknown roles yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "superadmin" | "super_admin" => Some(Role::SuperAdmin),
            "admin" => Some(Role::Admin),
            "teacher" => Some(Role::Teacher),
            "student" => Some(Role::Student),
            _ => None,
        }
    }

    /// Stored form of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "superadmin",
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain part of an email: the text after the first `@`, up to any
/// following `@`. `None` when there is no `@`.
pub fn email_domain(email: &str) -> Option<&str> {
    email.split('@').nth(1)
}

/// A user as loaded at the start of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// Document id.
    pub id: String,
    /// Email, empty when absent.
    pub email: String,
    /// Parsed role.
    pub role: Option<Role>,
    /// Current `createdBy`.
    pub created_by: Option<String>,
    /// Current `adminId`.
    pub admin_id: Option<String>,
    /// Current `metadata.classLevel`.
    pub class_level: Option<Value>,
}

impl User {
    /// Build from a stored document.
    pub fn from_document(id: impl Into<String>, doc: &Document) -> Self {
        Self {
            id: id.into(),
            email: doc.get_str(FIELD_EMAIL).unwrap_or_default().to_string(),
            role: doc.get_str(FIELD_ROLE).and_then(Role::parse),
            created_by: doc.get_str(FIELD_CREATED_BY).map(str::to_string),
            admin_id: doc.get_str(FIELD_ADMIN_ID).map(str::to_string),
            class_level: doc.get_path(FIELD_METADATA_CLASS_LEVEL).cloned(),
        }
    }

    /// Email domain of the user.
    pub fn domain(&self) -> Option<&str> {
        email_domain(&self.email)
    }
}

/// A quiz as loaded at the start of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Quiz {
    /// Document id.
    pub id: String,
    /// Title, empty when absent.
    pub title: String,
    /// Author user id.
    pub created_by_uid: Option<String>,
    /// Current `adminId`.
    pub admin_id: Option<String>,
    /// Current `classLevel`.
    pub class_level: Option<Value>,
}

impl Quiz {
    /// Build from a stored document.
    pub fn from_document(id: impl Into<String>, doc: &Document) -> Self {
        Self {
            id: id.into(),
            title: doc.get_str(FIELD_TITLE).unwrap_or_default().to_string(),
            created_by_uid: doc
                .get_str(FIELD_CREATED_BY_UID)
                .filter(|uid| !uid.is_empty())
                .map(str::to_string),
            admin_id: doc.get_str(FIELD_ADMIN_ID).map(str::to_string),
            class_level: doc.get(FIELD_CLASS_LEVEL).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("Teacher"), Some(Role::Teacher));
        assert_eq!(Role::parse("superadmin"), Some(Role::SuperAdmin));
        assert_eq!(Role::parse("parent"), None);
        assert_eq!(Role::Student.to_string(), "student");
    }

    #[test]
    fn test_email_domain() {
        assert_eq!(email_domain("a1@foo.com"), Some("foo.com"));
        assert_eq!(email_domain("no-at-sign"), None);
        assert_eq!(email_domain("a@b@c"), Some("b"));
        assert_eq!(email_domain("trailing@"), Some(""));
    }

    #[test]
    fn test_user_from_document() {
        let mut metadata = BTreeMap::new();
        metadata.insert("classLevel".to_string(), Value::from("10"));
        let doc = Document::new()
            .with("email", "s1@foo.com")
            .with("role", "student")
            .with("adminId", "a1")
            .with("metadata", Value::Map(metadata));

        let user = User::from_document("s1", &doc);
        assert_eq!(user.role, Some(Role::Student));
        assert_eq!(user.domain(), Some("foo.com"));
        assert_eq!(user.admin_id.as_deref(), Some("a1"));
        assert!(user.created_by.is_none());
        assert_eq!(user.class_level, Some(Value::from("10")));
    }

    #[test]
    fn test_quiz_from_document_ignores_empty_creator() {
        let doc = Document::new()
            .with("title", "Flutter Basics Quiz")
            .with("createdByUid", "");
        let quiz = Quiz::from_document("q1", &doc);
        assert!(quiz.created_by_uid.is_none());
        assert!(quiz.class_level.is_none());
    }
}
