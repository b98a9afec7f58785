use crate::model::{RequestId, RequestStatus, RoomId, StudentId};

pub type StoreFault = Box<dyn std::error::Error + Send + Sync>;

#[allow(clippy::module_name_repetitions)]
#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Room {0} not found")]
    RoomNotFound(RoomId),
    #[error("Student {0} not found")]
    StudentNotFound(StudentId),
    #[error("Room change request {0} not found")]
    RequestNotFound(RequestId),
    #[error("Room {room} is full (capacity {capacity})")]
    RoomFull { room: String, capacity: u32 },
    #[error("Room change request {request} was already {status}")]
    RequestNotPending {
        request: RequestId,
        status: RequestStatus,
    },
    #[error("A reason is required")]
    EmptyReason,
    #[error("Amount must be a non-negative number")]
    InvalidAmount,
    #[error("Capacity must be at least one")]
    InvalidCapacity,
    #[error("Room {room} already has {occupants} occupants")]
    CapacityBelowOccupancy { room: String, occupants: u32 },
    #[error("backing store failed: {0}")]
    Store(#[source] StoreFault),
}

impl LedgerError {
    pub fn store(error: impl Into<StoreFault>) -> Self {
        Self::Store(error.into())
    }
}
