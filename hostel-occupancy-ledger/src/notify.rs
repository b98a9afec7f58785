use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{DecidedRequest, Decision, StudentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Success,
    Error,
}

impl NotificationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub user: StudentId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
}

impl Notification {
    /// The message a student gets once their room change request was decided.
    #[must_use]
    pub fn for_decision(decided: &DecidedRequest, decision: Decision) -> Self {
        let request = &decided.request;
        let (title, verb, kind) = match decision {
            Decision::Approve => ("Accepted", "approved", NotificationKind::Success),
            Decision::Reject => ("Rejected", "rejected", NotificationKind::Error),
        };
        let message = request
            .rector_message
            .clone()
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| {
                format!(
                    "Your request for Room {} has been {verb}.",
                    decided.room_number
                )
            });
        Self {
            user: request.student,
            title: format!("Room Change Request {title}"),
            message,
            kind,
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("failed to deliver notification: {0}")]
pub struct NotifyError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

/// Best effort delivery of a message to a user.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}
