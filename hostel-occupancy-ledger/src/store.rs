use async_trait::async_trait;

use crate::error::LedgerError;
use crate::model::{
    Assignment, DecidedRequest, Decision, NewRoomChangeRequest, RequestId, Room,
    RoomChangeRequest, RoomId, RoomOccupancy, StudentId, StudentProfile,
};

/// Persistence behind the ledger.
///
/// Every method is one unit of work: either it commits completely or it leaves
/// rooms, profiles and requests untouched. Methods that check capacity must do
/// the check and the write atomically with respect to every other method that
/// changes the occupancy of the same room.
#[async_trait]
pub trait OccupancyStore: Send + Sync {
    /// All rooms with their current occupant count, ordered by room number.
    async fn rooms_with_occupancy(&self) -> Result<Vec<RoomOccupancy>, LedgerError>;

    /// Points the student's profile at `room` if the room has a free slot.
    ///
    /// Creates the profile with `default_hostel_name` when it does not exist.
    /// Re-assigning a student to the room they already occupy succeeds without
    /// counting them twice.
    async fn assign_room(
        &self,
        student: StudentId,
        room: RoomId,
        default_hostel_name: &str,
    ) -> Result<Assignment, LedgerError>;

    /// Stores a new `PENDING` request. Only checks that the room exists.
    async fn create_request(
        &self,
        request: NewRoomChangeRequest,
    ) -> Result<RoomChangeRequest, LedgerError>;

    /// Moves a `PENDING` request to its terminal status.
    ///
    /// Approval re-checks capacity exactly like [`OccupancyStore::assign_room`]
    /// and moves the student in the same unit of work.
    async fn decide_request(
        &self,
        request: RequestId,
        decision: Decision,
        rector_message: Option<String>,
        default_hostel_name: &str,
    ) -> Result<DecidedRequest, LedgerError>;

    /// Pending requests, newest first.
    async fn pending_requests(&self) -> Result<Vec<RoomChangeRequest>, LedgerError>;

    /// Decided requests, newest first.
    async fn decided_requests(&self, limit: usize)
        -> Result<Vec<RoomChangeRequest>, LedgerError>;

    async fn requests_for_student(
        &self,
        student: StudentId,
    ) -> Result<Vec<RoomChangeRequest>, LedgerError>;

    async fn profile(&self, student: StudentId) -> Result<Option<StudentProfile>, LedgerError>;

    async fn set_room_price(&self, room: RoomId, price: f64) -> Result<Room, LedgerError>;

    /// Fails when `capacity` is below the room's current occupancy.
    async fn set_room_capacity(&self, room: RoomId, capacity: u32) -> Result<Room, LedgerError>;

    async fn set_yearly_fee(
        &self,
        student: StudentId,
        yearly_fee: f64,
        default_hostel_name: &str,
    ) -> Result<StudentProfile, LedgerError>;
}
