//! In-process store, used by the tests and when the server runs without a
//! database. One mutex guards all state, so every trait method is atomic.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::LedgerError;
use crate::model::{
    Assignment, DecidedRequest, Decision, NewRoomChangeRequest, RequestId, RequestStatus, Room,
    RoomChangeRequest, RoomId, RoomOccupancy, RoomType, StudentId, StudentProfile,
};
use crate::notify::{Notification, Notifier, NotifyError};
use crate::store::OccupancyStore;

#[derive(Default)]
struct State {
    rooms: BTreeMap<RoomId, Room>,
    students: BTreeSet<StudentId>,
    profiles: BTreeMap<StudentId, StudentProfile>,
    requests: BTreeMap<RequestId, RoomChangeRequest>,
    next_room: i32,
    next_request: i32,
    /// Unknown students are registered on first use.
    open_registration: bool,
}

impl State {
    fn occupants(&self, room: RoomId) -> u32 {
        let count = self
            .profiles
            .values()
            .filter(|profile| profile.room == Some(room))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    fn room(&self, room: RoomId) -> Result<&Room, LedgerError> {
        self.rooms.get(&room).ok_or(LedgerError::RoomNotFound(room))
    }

    fn known_student(&self, student: StudentId) -> Result<(), LedgerError> {
        if self.open_registration || self.students.contains(&student) {
            Ok(())
        } else {
            Err(LedgerError::StudentNotFound(student))
        }
    }

    /// Only called once every check of the operation has passed.
    fn register(&mut self, student: StudentId) {
        if self.open_registration {
            self.students.insert(student);
        }
    }

    fn profile_mut(&mut self, student: StudentId, default_hostel_name: &str) -> &mut StudentProfile {
        self.profiles
            .entry(student)
            .or_insert_with(|| StudentProfile {
                student,
                room: None,
                room_number: None,
                hostel_name: default_hostel_name.to_owned(),
                yearly_fee: None,
            })
    }

    /// Capacity check and write, done while the caller holds the lock.
    fn assign(
        &mut self,
        student: StudentId,
        room: RoomId,
        default_hostel_name: &str,
    ) -> Result<Assignment, LedgerError> {
        self.known_student(student)?;
        let target = self.room(room)?.clone();
        let already_there = self
            .profiles
            .get(&student)
            .is_some_and(|profile| profile.room == Some(room));
        if !already_there && self.occupants(room) >= target.capacity {
            return Err(LedgerError::RoomFull {
                room: target.number,
                capacity: target.capacity,
            });
        }
        self.register(student);
        let profile = self.profile_mut(student, default_hostel_name);
        profile.room = Some(room);
        profile.room_number = Some(target.number.clone());
        Ok(Assignment {
            student,
            room,
            room_number: target.number,
            changed: !already_there,
        })
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that accepts any student id, for running without an account
    /// database.
    #[must_use]
    pub fn with_open_registration() -> Self {
        Self {
            state: Mutex::new(State {
                open_registration: true,
                ..State::default()
            }),
        }
    }

    pub async fn add_room(
        &self,
        number: &str,
        room_type: RoomType,
        capacity: u32,
        price: f64,
    ) -> RoomId {
        let mut state = self.state.lock().await;
        state.next_room += 1;
        let id = RoomId(state.next_room);
        state.rooms.insert(
            id,
            Room {
                id,
                number: number.to_owned(),
                room_type,
                capacity,
                price,
            },
        );
        id
    }

    /// Registers a student account. Profiles are only created by the ledger.
    pub async fn add_student(&self, student: StudentId) {
        self.state.lock().await.students.insert(student);
    }

    /// The rooms the portal seeds on a fresh install.
    pub async fn seed_rooms(&self) {
        for number in 101..=105 {
            self.add_room(&format!("A-{number}"), RoomType::TwoSharing, 2, 5000.0)
                .await;
        }
        for number in 201..=205 {
            self.add_room(&format!("B-{number}"), RoomType::ThreeSharing, 3, 3500.0)
                .await;
        }
    }
}

fn newest_first(mut requests: Vec<RoomChangeRequest>) -> Vec<RoomChangeRequest> {
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    requests
}

#[async_trait]
impl OccupancyStore for InMemoryStore {
    async fn rooms_with_occupancy(&self) -> Result<Vec<RoomOccupancy>, LedgerError> {
        let state = self.state.lock().await;
        let mut rooms: Vec<_> = state
            .rooms
            .values()
            .map(|room| RoomOccupancy {
                room: room.clone(),
                occupants: state.occupants(room.id),
            })
            .collect();
        rooms.sort_by(|a, b| a.room.number.cmp(&b.room.number));
        Ok(rooms)
    }

    async fn assign_room(
        &self,
        student: StudentId,
        room: RoomId,
        default_hostel_name: &str,
    ) -> Result<Assignment, LedgerError> {
        self.state
            .lock()
            .await
            .assign(student, room, default_hostel_name)
    }

    async fn create_request(
        &self,
        request: NewRoomChangeRequest,
    ) -> Result<RoomChangeRequest, LedgerError> {
        let mut state = self.state.lock().await;
        state.known_student(request.student)?;
        state.room(request.requested_room)?;
        state.register(request.student);
        state.next_request += 1;
        let stored = RoomChangeRequest {
            id: RequestId(state.next_request),
            student: request.student,
            requested_room: request.requested_room,
            reason: request.reason,
            status: RequestStatus::Pending,
            rector_message: None,
            created_at: Utc::now(),
        };
        state.requests.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn decide_request(
        &self,
        request: RequestId,
        decision: Decision,
        rector_message: Option<String>,
        default_hostel_name: &str,
    ) -> Result<DecidedRequest, LedgerError> {
        let mut state = self.state.lock().await;
        let current = state
            .requests
            .get(&request)
            .ok_or(LedgerError::RequestNotFound(request))?
            .clone();
        if current.status.is_terminal() {
            return Err(LedgerError::RequestNotPending {
                request,
                status: current.status,
            });
        }
        let room_number = match decision {
            Decision::Approve => {
                state
                    .assign(current.student, current.requested_room, default_hostel_name)?
                    .room_number
            }
            Decision::Reject => state.room(current.requested_room)?.number.clone(),
        };
        let decided = RoomChangeRequest {
            status: decision.status(),
            rector_message,
            ..current
        };
        state.requests.insert(request, decided.clone());
        Ok(DecidedRequest {
            request: decided,
            room_number,
        })
    }

    async fn pending_requests(&self) -> Result<Vec<RoomChangeRequest>, LedgerError> {
        let state = self.state.lock().await;
        Ok(newest_first(
            state
                .requests
                .values()
                .filter(|request| request.status == RequestStatus::Pending)
                .cloned()
                .collect(),
        ))
    }

    async fn decided_requests(
        &self,
        limit: usize,
    ) -> Result<Vec<RoomChangeRequest>, LedgerError> {
        let state = self.state.lock().await;
        let mut decided = newest_first(
            state
                .requests
                .values()
                .filter(|request| request.status.is_terminal())
                .cloned()
                .collect(),
        );
        decided.truncate(limit);
        Ok(decided)
    }

    async fn requests_for_student(
        &self,
        student: StudentId,
    ) -> Result<Vec<RoomChangeRequest>, LedgerError> {
        let state = self.state.lock().await;
        Ok(newest_first(
            state
                .requests
                .values()
                .filter(|request| request.student == student)
                .cloned()
                .collect(),
        ))
    }

    async fn profile(&self, student: StudentId) -> Result<Option<StudentProfile>, LedgerError> {
        Ok(self.state.lock().await.profiles.get(&student).cloned())
    }

    async fn set_room_price(&self, room: RoomId, price: f64) -> Result<Room, LedgerError> {
        let mut state = self.state.lock().await;
        let room = state
            .rooms
            .get_mut(&room)
            .ok_or(LedgerError::RoomNotFound(room))?;
        room.price = price;
        Ok(room.clone())
    }

    async fn set_room_capacity(&self, room: RoomId, capacity: u32) -> Result<Room, LedgerError> {
        let mut state = self.state.lock().await;
        let occupants = state.occupants(room);
        let room = state
            .rooms
            .get_mut(&room)
            .ok_or(LedgerError::RoomNotFound(room))?;
        if capacity < occupants {
            return Err(LedgerError::CapacityBelowOccupancy {
                room: room.number.clone(),
                occupants,
            });
        }
        room.capacity = capacity;
        Ok(room.clone())
    }

    async fn set_yearly_fee(
        &self,
        student: StudentId,
        yearly_fee: f64,
        default_hostel_name: &str,
    ) -> Result<StudentProfile, LedgerError> {
        let mut state = self.state.lock().await;
        state.known_student(student)?;
        state.register(student);
        let profile = state.profile_mut(student, default_hostel_name);
        profile.yearly_fee = Some(yearly_fee);
        Ok(profile.clone())
    }
}

/// Keeps every notification instead of delivering it.
#[derive(Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub async fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.delivered.lock().await.push(notification);
        Ok(())
    }
}
