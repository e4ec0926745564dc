use lessoncast_core::LessonInfo;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallerRole {
    Admin,
    Instructor,
    Student,
}

impl std::str::FromStr for CallerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(CallerRole::Admin),
            "instructor" => Ok(CallerRole::Instructor),
            "student" => Ok(CallerRole::Student),
            other => Err(format!("Invalid user role: {}", other)),
        }
    }
}

/// The authenticated user behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: CallerRole,
}

impl Caller {
    pub fn new(user_id: Uuid, role: CallerRole) -> Self {
        Self { user_id, role }
    }

    /// Owners manage their lessons' videos; admins manage all of them.
    pub fn can_manage(&self, lesson: &LessonInfo) -> bool {
        self.role == CallerRole::Admin || lesson.is_owned_by(self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessoncast_core::LessonKind;

    #[test]
    fn test_only_owner_or_admin_manages() {
        let owner = Uuid::new_v4();
        let lesson = LessonInfo {
            id: 1,
            owner_id: owner,
            kind: LessonKind::Video,
        };

        assert!(Caller::new(owner, CallerRole::Instructor).can_manage(&lesson));
        assert!(Caller::new(Uuid::new_v4(), CallerRole::Admin).can_manage(&lesson));
        assert!(!Caller::new(Uuid::new_v4(), CallerRole::Instructor).can_manage(&lesson));
        assert!(!Caller::new(Uuid::new_v4(), CallerRole::Student).can_manage(&lesson));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("instructor".parse::<CallerRole>(), Ok(CallerRole::Instructor));
        assert!("owner".parse::<CallerRole>().is_err());
    }
}
