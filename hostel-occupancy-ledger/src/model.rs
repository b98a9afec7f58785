use core::fmt::{self, Display};
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i32);

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                Display::fmt(&self.0, f)
            }
        }
    };
}

id_type!(RoomId);
id_type!(StudentId);
id_type!(RequestId);

/// Text form of an enum column could not be mapped back.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} `{value}`")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomType {
    Single,
    TwoSharing,
    ThreeSharing,
    FourSharing,
}

impl RoomType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "SINGLE",
            Self::TwoSharing => "TWO_SHARING",
            Self::ThreeSharing => "THREE_SHARING",
            Self::FourSharing => "FOUR_SHARING",
        }
    }
}

impl Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SINGLE" => Ok(Self::Single),
            "TWO_SHARING" => Ok(Self::TwoSharing),
            "THREE_SHARING" => Ok(Self::ThreeSharing),
            "FOUR_SHARING" => Ok(Self::FourSharing),
            other => Err(UnknownVariant {
                kind: "room type",
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    /// Human readable and unique, e.g. `A-101`.
    pub number: String,
    pub room_type: RoomType,
    pub capacity: u32,
    pub price: f64,
}

/// A room together with the number of profiles currently pointing at it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomOccupancy {
    pub room: Room,
    pub occupants: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vacancy {
    pub room: Room,
    pub occupants: u32,
    pub remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub student: StudentId,
    pub room: Option<RoomId>,
    /// Denormalized copy of the room number, written together with `room`.
    pub room_number: Option<String>,
    pub hostel_name: String,
    pub yearly_fee: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(UnknownVariant {
                kind: "request status",
                value: other.to_owned(),
            }),
        }
    }
}

/// What a rector decides about a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    #[serde(rename = "APPROVED")]
    Approve,
    #[serde(rename = "REJECTED")]
    Reject,
}

impl Decision {
    #[must_use]
    pub const fn status(self) -> RequestStatus {
        match self {
            Self::Approve => RequestStatus::Approved,
            Self::Reject => RequestStatus::Rejected,
        }
    }
}

impl FromStr for Decision {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPROVED" => Ok(Self::Approve),
            "REJECTED" => Ok(Self::Reject),
            other => Err(UnknownVariant {
                kind: "decision",
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomChangeRequest {
    pub id: RequestId,
    pub student: StudentId,
    pub requested_room: RoomId,
    pub reason: String,
    pub status: RequestStatus,
    pub rector_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoomChangeRequest {
    pub student: StudentId,
    pub requested_room: RoomId,
    pub reason: String,
}

/// A request after its single transition out of `PENDING`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecidedRequest {
    pub request: RoomChangeRequest,
    pub room_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub student: StudentId,
    pub room: RoomId,
    pub room_number: String,
    /// `false` when the student already lived in the room.
    pub changed: bool,
}
