//! Caller identity and the capabilities derived from it.
//!
//! The authorization collaborator hands us an [`Identity`]. Every write on the
//! ledger takes one of the capability types below, and those can only be
//! obtained by checking the identity's role here.

use core::fmt::{self, Display};
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::model::{StudentId, UnknownVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Rector,
    Inspector,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "STUDENT",
            Self::Rector => "RECTOR",
            Self::Inspector => "INSPECTOR",
            Self::Admin => "ADMIN",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STUDENT" => Ok(Self::Student),
            "RECTOR" => Ok(Self::Rector),
            "INSPECTOR" => Ok(Self::Inspector),
            "ADMIN" => Ok(Self::Admin),
            other => Err(UnknownVariant {
                kind: "role",
                value: other.to_owned(),
            }),
        }
    }
}

/// Who is calling. User ids and student ids share one id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user: StudentId,
    pub role: Role,
}

impl Identity {
    #[must_use]
    pub const fn new(user: StudentId, role: Role) -> Self {
        Self { user, role }
    }

    pub fn rector(&self) -> Result<RectorAuthority, LedgerError> {
        if self.role == Role::Rector {
            Ok(RectorAuthority { rector: self.user })
        } else {
            Err(LedgerError::Unauthorized)
        }
    }

    /// Students may only act on themselves.
    pub fn student_self(&self, student: StudentId) -> Result<StudentAuthority, LedgerError> {
        if self.role == Role::Student && self.user == student {
            Ok(StudentAuthority { student })
        } else {
            Err(LedgerError::Unauthorized)
        }
    }

    pub fn student(&self) -> Result<StudentAuthority, LedgerError> {
        self.student_self(self.user)
    }

    #[must_use]
    pub fn may_read_profile(&self, student: StudentId) -> bool {
        match self.role {
            Role::Rector | Role::Inspector | Role::Admin => true,
            Role::Student => self.user == student,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RectorAuthority {
    rector: StudentId,
}

impl RectorAuthority {
    #[must_use]
    pub const fn rector(&self) -> StudentId {
        self.rector
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudentAuthority {
    student: StudentId,
}

impl StudentAuthority {
    #[must_use]
    pub const fn student(&self) -> StudentId {
        self.student
    }
}
