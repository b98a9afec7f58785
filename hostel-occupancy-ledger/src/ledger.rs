use std::sync::Arc;

use tracing::{info, warn};

use crate::authority::{Identity, RectorAuthority, StudentAuthority};
use crate::error::LedgerError;
use crate::model::{
    Assignment, DecidedRequest, Decision, NewRoomChangeRequest, RequestId, Room,
    RoomChangeRequest, RoomId, RoomOccupancy, StudentId, StudentProfile, Vacancy,
};
use crate::notify::{Notification, Notifier};
use crate::store::OccupancyStore;
use crate::vacancy::compute_vacancy;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Mediates every change of which student lives in which room.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn OccupancyStore>,
    notifier: Arc<dyn Notifier>,
    default_hostel_name: String,
}

impl Ledger {
    pub fn new(
        store: Arc<dyn OccupancyStore>,
        notifier: Arc<dyn Notifier>,
        default_hostel_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            default_hostel_name: default_hostel_name.into(),
        }
    }

    #[must_use]
    pub fn default_hostel_name(&self) -> &str {
        &self.default_hostel_name
    }

    /// Any authenticated caller may look at the vacant rooms.
    pub async fn vacant_rooms(&self, _caller: &Identity) -> Result<Vec<Vacancy>, LedgerError> {
        let rooms = self.store.rooms_with_occupancy().await?;
        Ok(compute_vacancy(&rooms))
    }

    pub async fn rooms(
        &self,
        _rector: &RectorAuthority,
    ) -> Result<Vec<RoomOccupancy>, LedgerError> {
        self.store.rooms_with_occupancy().await
    }

    pub async fn allocate_room(
        &self,
        rector: &RectorAuthority,
        student: StudentId,
        room: RoomId,
    ) -> Result<Assignment, LedgerError> {
        info!(rector = %rector.rector(), %student, %room, "allocating room");
        let assignment = self
            .store
            .assign_room(student, room, &self.default_hostel_name)
            .await
            .inspect_err(|error| warn!(%student, %room, "allocation failed: {error}"))?;
        if !assignment.changed {
            info!(%student, room = %assignment.room_number, "student already lives in this room");
        }
        Ok(assignment)
    }

    pub async fn submit_room_change_request(
        &self,
        student: &StudentAuthority,
        requested_room: RoomId,
        reason: &str,
    ) -> Result<RoomChangeRequest, LedgerError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LedgerError::EmptyReason);
        }
        // capacity is checked when the request is decided, not here
        let request = self
            .store
            .create_request(NewRoomChangeRequest {
                student: student.student(),
                requested_room,
                reason: reason.to_owned(),
            })
            .await?;
        info!(request = %request.id, student = %request.student, room = %requested_room, "room change requested");
        Ok(request)
    }

    pub async fn decide_room_change_request(
        &self,
        rector: &RectorAuthority,
        request: RequestId,
        decision: Decision,
        rector_message: Option<String>,
    ) -> Result<DecidedRequest, LedgerError> {
        let rector_message = rector_message
            .map(|message| message.trim().to_owned())
            .filter(|message| !message.is_empty());
        let decided = self
            .store
            .decide_request(request, decision, rector_message, &self.default_hostel_name)
            .await
            .inspect_err(|error| warn!(%request, "deciding room change request failed: {error}"))?;
        info!(
            rector = %rector.rector(),
            %request,
            status = %decided.request.status,
            room = %decided.room_number,
            "room change request decided"
        );

        // the decision is committed, delivery is best effort
        if let Err(error) = self
            .notifier
            .notify(Notification::for_decision(&decided, decision))
            .await
        {
            warn!(%request, "{error}");
        }
        Ok(decided)
    }

    pub async fn pending_requests(
        &self,
        _rector: &RectorAuthority,
    ) -> Result<Vec<RoomChangeRequest>, LedgerError> {
        self.store.pending_requests().await
    }

    pub async fn recent_decisions(
        &self,
        _rector: &RectorAuthority,
        limit: usize,
    ) -> Result<Vec<RoomChangeRequest>, LedgerError> {
        self.store.decided_requests(limit).await
    }

    pub async fn requests_for(
        &self,
        student: &StudentAuthority,
    ) -> Result<Vec<RoomChangeRequest>, LedgerError> {
        self.store.requests_for_student(student.student()).await
    }

    pub async fn profile(
        &self,
        caller: &Identity,
        student: StudentId,
    ) -> Result<Option<StudentProfile>, LedgerError> {
        if !caller.may_read_profile(student) {
            return Err(LedgerError::Unauthorized);
        }
        self.store.profile(student).await
    }

    pub async fn set_room_price(
        &self,
        rector: &RectorAuthority,
        room: RoomId,
        price: f64,
    ) -> Result<Room, LedgerError> {
        check_amount(price)?;
        info!(rector = %rector.rector(), %room, price, "setting room price");
        self.store.set_room_price(room, price).await
    }

    pub async fn set_room_capacity(
        &self,
        rector: &RectorAuthority,
        room: RoomId,
        capacity: u32,
    ) -> Result<Room, LedgerError> {
        if capacity == 0 {
            return Err(LedgerError::InvalidCapacity);
        }
        info!(rector = %rector.rector(), %room, capacity, "setting room capacity");
        self.store.set_room_capacity(room, capacity).await
    }

    pub async fn set_yearly_fee(
        &self,
        rector: &RectorAuthority,
        student: StudentId,
        yearly_fee: f64,
    ) -> Result<StudentProfile, LedgerError> {
        check_amount(yearly_fee)?;
        info!(rector = %rector.rector(), %student, yearly_fee, "setting yearly fee");
        self.store
            .set_yearly_fee(student, yearly_fee, &self.default_hostel_name)
            .await
    }
}

fn check_amount(amount: f64) -> Result<(), LedgerError> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(LedgerError::InvalidAmount)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::authority::Role;
    use crate::memory::{InMemoryStore, RecordingNotifier};
    use crate::model::{RequestStatus, RoomType};
    use crate::notify::{NotificationKind, NotifyError};

    const RECTOR: Identity = Identity::new(StudentId(1), Role::Rector);

    struct Fixture {
        ledger: Ledger,
        store: Arc<InMemoryStore>,
        notifier: Arc<RecordingNotifier>,
        room: RoomId,
    }

    async fn fixture(capacity: u32) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let room = store
            .add_room("A-101", RoomType::TwoSharing, capacity, 5000.0)
            .await;
        for student in 10..15 {
            store.add_student(StudentId(student)).await;
        }
        let notifier = Arc::new(RecordingNotifier::default());
        let ledger = Ledger::new(store.clone(), notifier.clone(), "Main Hostel");
        Fixture {
            ledger,
            store,
            notifier,
            room,
        }
    }

    fn student(id: i32) -> Identity {
        Identity::new(StudentId(id), Role::Student)
    }

    async fn occupants(store: &InMemoryStore, room: RoomId) -> u32 {
        store
            .rooms_with_occupancy()
            .await
            .unwrap()
            .into_iter()
            .find(|entry| entry.room.id == room)
            .unwrap()
            .occupants
    }

    #[tokio::test]
    async fn fills_a_room_up_to_capacity() -> Result<(), LedgerError> {
        let Fixture {
            ledger, store, room, ..
        } = fixture(2).await;
        let rector = RECTOR.rector()?;

        ledger.allocate_room(&rector, StudentId(10), room).await?;
        assert_eq!(occupants(&store, room).await, 1);
        ledger.allocate_room(&rector, StudentId(11), room).await?;
        assert_eq!(occupants(&store, room).await, 2);

        let error = ledger
            .allocate_room(&rector, StudentId(12), room)
            .await
            .unwrap_err();
        assert!(matches!(error, LedgerError::RoomFull { capacity: 2, .. }));
        assert_eq!(occupants(&store, room).await, 2);
        assert_eq!(store.profile(StudentId(12)).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn reallocating_to_the_same_room_is_a_no_op() -> Result<(), LedgerError> {
        let Fixture {
            ledger, store, room, ..
        } = fixture(1).await;
        let rector = RECTOR.rector()?;

        let first = ledger.allocate_room(&rector, StudentId(10), room).await?;
        assert!(first.changed);
        // the room is full now, but the student is already in it
        let second = ledger.allocate_room(&rector, StudentId(10), room).await?;
        assert!(!second.changed);
        assert_eq!(occupants(&store, room).await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn first_allocation_creates_profile_with_default_hostel() -> Result<(), LedgerError> {
        let Fixture {
            ledger, store, room, ..
        } = fixture(2).await;
        ledger
            .allocate_room(&RECTOR.rector()?, StudentId(10), room)
            .await?;

        let profile = store.profile(StudentId(10)).await?.unwrap();
        assert_eq!(profile.room, Some(room));
        assert_eq!(profile.room_number.as_deref(), Some("A-101"));
        assert_eq!(profile.hostel_name, "Main Hostel");
        Ok(())
    }

    #[tokio::test]
    async fn allocation_to_unknown_room_fails() -> Result<(), LedgerError> {
        let Fixture { ledger, .. } = fixture(2).await;
        let error = ledger
            .allocate_room(&RECTOR.rector()?, StudentId(10), RoomId(404))
            .await
            .unwrap_err();
        assert!(matches!(error, LedgerError::RoomNotFound(RoomId(404))));
        Ok(())
    }

    #[tokio::test]
    async fn approved_request_moves_the_student() -> Result<(), LedgerError> {
        let Fixture {
            ledger,
            store,
            notifier,
            room,
        } = fixture(2).await;
        let student = student(10).student()?;

        let request = ledger
            .submit_room_change_request(&student, room, "prefer quieter block")
            .await?;
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(store.profile(StudentId(10)).await?, None);

        let decided = ledger
            .decide_room_change_request(&RECTOR.rector()?, request.id, Decision::Approve, None)
            .await?;
        assert_eq!(decided.request.status, RequestStatus::Approved);
        assert_eq!(store.profile(StudentId(10)).await?.unwrap().room, Some(room));

        let delivered = notifier.delivered().await;
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].user, StudentId(10));
        assert_eq!(delivered[0].kind, NotificationKind::Success);
        Ok(())
    }

    #[tokio::test]
    async fn approval_fails_when_room_filled_up_meanwhile() -> Result<(), LedgerError> {
        let Fixture {
            ledger,
            store,
            notifier,
            room,
        } = fixture(1).await;
        let rector = RECTOR.rector()?;

        let request = ledger
            .submit_room_change_request(&student(10).student()?, room, "prefer quieter block")
            .await?;
        ledger.allocate_room(&rector, StudentId(11), room).await?;

        let error = ledger
            .decide_room_change_request(&rector, request.id, Decision::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(error, LedgerError::RoomFull { .. }));

        let pending = ledger.pending_requests(&rector).await?;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, RequestStatus::Pending);
        assert_eq!(store.profile(StudentId(10)).await?, None);
        assert!(notifier.delivered().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn decided_requests_are_terminal() -> Result<(), LedgerError> {
        let Fixture {
            ledger, store, room, ..
        } = fixture(2).await;
        let rector = RECTOR.rector()?;
        let request = ledger
            .submit_room_change_request(&student(10).student()?, room, "closer to the library")
            .await?;

        ledger
            .decide_room_change_request(
                &rector,
                request.id,
                Decision::Reject,
                Some("no transfers this term".to_owned()),
            )
            .await?;

        for decision in [Decision::Approve, Decision::Reject] {
            let error = ledger
                .decide_room_change_request(&rector, request.id, decision, None)
                .await
                .unwrap_err();
            assert!(matches!(
                error,
                LedgerError::RequestNotPending {
                    status: RequestStatus::Rejected,
                    ..
                }
            ));
        }
        assert_eq!(store.profile(StudentId(10)).await?, None);

        let history = ledger
            .recent_decisions(&rector, DEFAULT_HISTORY_LIMIT)
            .await?;
        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0].rector_message.as_deref(),
            Some("no transfers this term")
        );
        Ok(())
    }

    #[tokio::test]
    async fn deciding_unknown_request_fails() -> Result<(), LedgerError> {
        let Fixture { ledger, .. } = fixture(2).await;
        let error = ledger
            .decide_room_change_request(&RECTOR.rector()?, RequestId(77), Decision::Reject, None)
            .await
            .unwrap_err();
        assert!(matches!(error, LedgerError::RequestNotFound(RequestId(77))));
        Ok(())
    }

    #[tokio::test]
    async fn request_needs_reason_and_existing_room() -> Result<(), LedgerError> {
        let Fixture { ledger, room, .. } = fixture(2).await;
        let student = student(10).student()?;

        let error = ledger
            .submit_room_change_request(&student, room, "   ")
            .await
            .unwrap_err();
        assert!(matches!(error, LedgerError::EmptyReason));

        let error = ledger
            .submit_room_change_request(&student, RoomId(404), "bigger room")
            .await
            .unwrap_err();
        assert!(matches!(error, LedgerError::RoomNotFound(RoomId(404))));
        Ok(())
    }

    #[tokio::test]
    async fn request_on_full_room_is_accepted() -> Result<(), LedgerError> {
        let Fixture { ledger, room, .. } = fixture(1).await;
        ledger
            .allocate_room(&RECTOR.rector()?, StudentId(11), room)
            .await?;

        let request = ledger
            .submit_room_change_request(&student(10).student()?, room, "friends live there")
            .await?;
        assert_eq!(request.status, RequestStatus::Pending);
        Ok(())
    }

    struct BrokenNotifier;

    #[async_trait]
    impl Notifier for BrokenNotifier {
        async fn notify(&self, _notification: Notification) -> Result<(), NotifyError> {
            Err(NotifyError("mail server down".into()))
        }
    }

    #[tokio::test]
    async fn notification_failure_keeps_the_decision() -> Result<(), LedgerError> {
        let store = Arc::new(InMemoryStore::new());
        let room = store.add_room("B-201", RoomType::ThreeSharing, 3, 3500.0).await;
        store.add_student(StudentId(10)).await;
        let ledger = Ledger::new(store.clone(), Arc::new(BrokenNotifier), "Main Hostel");

        let request = ledger
            .submit_room_change_request(&student(10).student()?, room, "quieter")
            .await?;
        let decided = ledger
            .decide_room_change_request(&RECTOR.rector()?, request.id, Decision::Approve, None)
            .await?;
        assert_eq!(decided.request.status, RequestStatus::Approved);
        assert_eq!(store.profile(StudentId(10)).await?.unwrap().room, Some(room));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_allocations_never_overbook() -> Result<(), LedgerError> {
        for _ in 0..20 {
            let Fixture {
                ledger, store, room, ..
            } = fixture(1).await;
            let rector = RECTOR.rector()?;

            let first = tokio::spawn({
                let ledger = ledger.clone();
                async move { ledger.allocate_room(&rector, StudentId(10), room).await }
            });
            let second = tokio::spawn({
                let ledger = ledger.clone();
                async move { ledger.allocate_room(&rector, StudentId(11), room).await }
            });
            let results = [first.await.unwrap(), second.await.unwrap()];

            let successes = results.iter().filter(|result| result.is_ok()).count();
            let full = results
                .iter()
                .filter(|result| matches!(result, Err(LedgerError::RoomFull { .. })))
                .count();
            assert_eq!((successes, full), (1, 1));
            assert_eq!(occupants(&store, room).await, 1);
        }
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn approval_racing_direct_allocation_never_overbooks() -> Result<(), LedgerError> {
        for _ in 0..20 {
            let Fixture {
                ledger, store, room, ..
            } = fixture(1).await;
            let rector = RECTOR.rector()?;
            let request = ledger
                .submit_room_change_request(&student(10).student()?, room, "closer to the lab")
                .await?;

            let approve = tokio::spawn({
                let ledger = ledger.clone();
                async move {
                    ledger
                        .decide_room_change_request(&rector, request.id, Decision::Approve, None)
                        .await
                        .map(|_| ())
                }
            });
            let allocate = tokio::spawn({
                let ledger = ledger.clone();
                async move {
                    ledger
                        .allocate_room(&rector, StudentId(11), room)
                        .await
                        .map(|_| ())
                }
            });
            let results = [approve.await.unwrap(), allocate.await.unwrap()];

            let successes = results.iter().filter(|result| result.is_ok()).count();
            let full = results
                .iter()
                .filter(|result| matches!(result, Err(LedgerError::RoomFull { .. })))
                .count();
            assert_eq!((successes, full), (1, 1));
            assert_eq!(occupants(&store, room).await, 1);

            let still_pending = ledger
                .pending_requests(&rector)
                .await?
                .iter()
                .any(|pending| pending.id == request.id);
            assert_eq!(still_pending, results[0].is_err());
        }
        Ok(())
    }

    #[tokio::test]
    async fn capacity_cannot_drop_below_occupancy() -> Result<(), LedgerError> {
        let Fixture {
            ledger, store, room, ..
        } = fixture(3).await;
        let rector = RECTOR.rector()?;
        ledger.allocate_room(&rector, StudentId(10), room).await?;
        ledger.allocate_room(&rector, StudentId(11), room).await?;

        let error = ledger.set_room_capacity(&rector, room, 1).await.unwrap_err();
        assert!(matches!(
            error,
            LedgerError::CapacityBelowOccupancy { occupants: 2, .. }
        ));
        assert!(matches!(
            ledger.set_room_capacity(&rector, room, 0).await,
            Err(LedgerError::InvalidCapacity)
        ));

        let updated = ledger.set_room_capacity(&rector, room, 2).await?;
        assert_eq!(updated.capacity, 2);
        assert!(ledger.vacant_rooms(&RECTOR).await?.is_empty());
        assert_eq!(occupants(&store, room).await, 2);
        Ok(())
    }

    #[tokio::test]
    async fn price_and_fee_updates() -> Result<(), LedgerError> {
        let Fixture { ledger, room, .. } = fixture(2).await;
        let rector = RECTOR.rector()?;

        assert_eq!(ledger.set_room_price(&rector, room, 5500.0).await?.price, 5500.0);
        assert!(matches!(
            ledger.set_room_price(&rector, room, f64::NAN).await,
            Err(LedgerError::InvalidAmount)
        ));

        let profile = ledger.set_yearly_fee(&rector, StudentId(10), 60000.0).await?;
        assert_eq!(profile.yearly_fee, Some(60000.0));
        assert_eq!(profile.hostel_name, "Main Hostel");
        assert_eq!(profile.room, None);
        assert!(matches!(
            ledger.set_yearly_fee(&rector, StudentId(10), -1.0).await,
            Err(LedgerError::InvalidAmount)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn profiles_are_private_to_their_student() -> Result<(), LedgerError> {
        let Fixture { ledger, room, .. } = fixture(2).await;
        ledger
            .allocate_room(&RECTOR.rector()?, StudentId(10), room)
            .await?;

        assert!(ledger.profile(&student(10), StudentId(10)).await?.is_some());
        assert!(matches!(
            ledger.profile(&student(11), StudentId(10)).await,
            Err(LedgerError::Unauthorized)
        ));
        Ok(())
    }
}
