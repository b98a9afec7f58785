//! Postgres implementation of the occupancy store.
//!
//! Every operation that checks capacity locks the target room row with
//! `SELECT ... FOR UPDATE` before counting its occupants and keeps the lock
//! until the assignment is committed. Requests are locked the same way before
//! their status is inspected, always before the room, so the lock order is
//! request -> room everywhere.

use std::collections::HashMap;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, AsyncPgConnection, RunQueryDsl};
use hostel_occupancy_ledger::model::{
    Assignment, DecidedRequest, Decision, NewRoomChangeRequest, RequestId, RequestStatus, Room,
    RoomChangeRequest, RoomId, RoomOccupancy, StudentId, StudentProfile,
};
use hostel_occupancy_ledger::{LedgerError, OccupancyStore, Role};
use tracing::debug;

use crate::error::DatabaseError;
use crate::models::{convert_all, NewRequestRow, ProfileRow, RequestRow, RoomRow};
use crate::schema::{room_change_requests, rooms, student_profiles, users};
use crate::Pool;

#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    #[must_use]
    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn count_to_u32(count: i64) -> Result<u32, DatabaseError> {
    u32::try_from(count).map_err(|_| DatabaseError::OutOfRange {
        column: "occupant count",
        value: count,
    })
}

/// Only accounts with the student role can hold a bed or a fee.
async fn ensure_student(
    connection: &mut AsyncPgConnection,
    student: StudentId,
) -> Result<(), DatabaseError> {
    users::table
        .find(student.0)
        .filter(users::role.eq(Role::Student.as_str()))
        .select(users::id)
        .first::<i32>(connection)
        .await
        .optional()?
        .ok_or(LedgerError::StudentNotFound(student))?;
    Ok(())
}

async fn lock_room(
    connection: &mut AsyncPgConnection,
    room: RoomId,
) -> Result<RoomRow, DatabaseError> {
    Ok(rooms::table
        .find(room.0)
        .select(RoomRow::as_select())
        .for_update()
        .first(connection)
        .await
        .optional()?
        .ok_or(LedgerError::RoomNotFound(room))?)
}

async fn occupants(connection: &mut AsyncPgConnection, room: RoomId) -> Result<u32, DatabaseError> {
    let count: i64 = student_profiles::table
        .filter(student_profiles::room_id.eq(room.0))
        .count()
        .get_result(connection)
        .await?;
    count_to_u32(count)
}

/// Capacity check and profile write. Must run inside a transaction.
async fn assign_locked(
    connection: &mut AsyncPgConnection,
    student: StudentId,
    room: RoomId,
    default_hostel_name: &str,
) -> Result<Assignment, DatabaseError> {
    ensure_student(connection, student).await?;
    let target = Room::try_from(lock_room(connection, room).await?)?;

    let current_room = student_profiles::table
        .find(student.0)
        .select(student_profiles::room_id)
        .first::<Option<i32>>(connection)
        .await
        .optional()?
        .flatten();
    if current_room == Some(room.0) {
        return Ok(Assignment {
            student,
            room,
            room_number: target.number,
            changed: false,
        });
    }

    let occupants = occupants(connection, room).await?;
    debug!(room = %target.number, occupants, capacity = target.capacity, "checked capacity");
    if occupants >= target.capacity {
        return Err(LedgerError::RoomFull {
            room: target.number,
            capacity: target.capacity,
        }
        .into());
    }

    diesel::insert_into(student_profiles::table)
        .values(ProfileRow {
            student_id: student.0,
            room_id: Some(room.0),
            room_number: Some(target.number.clone()),
            hostel_name: default_hostel_name.to_owned(),
            yearly_fee: None,
        })
        .on_conflict(student_profiles::student_id)
        .do_update()
        .set((
            student_profiles::room_id.eq(room.0),
            student_profiles::room_number.eq(&target.number),
        ))
        .execute(connection)
        .await?;

    Ok(Assignment {
        student,
        room,
        room_number: target.number,
        changed: true,
    })
}

impl PostgresStore {
    async fn load_rooms(&self) -> Result<Vec<RoomOccupancy>, DatabaseError> {
        let mut connection = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut connection;

        let rooms: Vec<Room> = convert_all(
            rooms::table
                .order(rooms::number.asc())
                .select(RoomRow::as_select())
                .load(connection)
                .await?,
        )?;
        let counts: HashMap<i32, i64> = student_profiles::table
            .filter(student_profiles::room_id.is_not_null())
            .group_by(student_profiles::room_id)
            .select((student_profiles::room_id, diesel::dsl::count_star()))
            .load::<(Option<i32>, i64)>(connection)
            .await?
            .into_iter()
            .filter_map(|(room, count)| room.map(|room| (room, count)))
            .collect();

        rooms
            .into_iter()
            .map(|room| -> Result<RoomOccupancy, DatabaseError> {
                let occupants = count_to_u32(counts.get(&room.id.0).copied().unwrap_or(0))?;
                Ok(RoomOccupancy { room, occupants })
            })
            .collect()
    }

    async fn assign(
        &self,
        student: StudentId,
        room: RoomId,
        default_hostel_name: &str,
    ) -> Result<Assignment, DatabaseError> {
        let mut connection = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        connection
            .transaction::<_, DatabaseError, _>(move |connection| {
                async move { assign_locked(connection, student, room, default_hostel_name).await }
                    .scope_boxed()
            })
            .await
    }

    async fn insert_request(
        &self,
        request: NewRoomChangeRequest,
    ) -> Result<RoomChangeRequest, DatabaseError> {
        let mut connection = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut connection;

        ensure_student(connection, request.student).await?;
        rooms::table
            .find(request.requested_room.0)
            .select(rooms::id)
            .first::<i32>(connection)
            .await
            .optional()?
            .ok_or(LedgerError::RoomNotFound(request.requested_room))?;

        let row = diesel::insert_into(room_change_requests::table)
            .values(NewRequestRow {
                student_id: request.student.0,
                requested_room_id: request.requested_room.0,
                reason: &request.reason,
                status: RequestStatus::Pending.as_str(),
            })
            .returning(RequestRow::as_returning())
            .get_result(connection)
            .await?;
        row.try_into()
    }

    async fn decide(
        &self,
        request: RequestId,
        decision: Decision,
        rector_message: Option<String>,
        default_hostel_name: &str,
    ) -> Result<DecidedRequest, DatabaseError> {
        let mut connection = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        connection
            .transaction::<_, DatabaseError, _>(move |connection| {
                async move {
                    let current = RoomChangeRequest::try_from(
                        room_change_requests::table
                            .find(request.0)
                            .select(RequestRow::as_select())
                            .for_update()
                            .first(connection)
                            .await
                            .optional()?
                            .ok_or(LedgerError::RequestNotFound(request))?,
                    )?;
                    if current.status.is_terminal() {
                        return Err(LedgerError::RequestNotPending {
                            request,
                            status: current.status,
                        }
                        .into());
                    }

                    let room_number = match decision {
                        Decision::Approve => {
                            assign_locked(
                                connection,
                                current.student,
                                current.requested_room,
                                default_hostel_name,
                            )
                            .await?
                            .room_number
                        }
                        Decision::Reject => {
                            rooms::table
                                .find(current.requested_room.0)
                                .select(rooms::number)
                                .first::<String>(connection)
                                .await?
                        }
                    };

                    let updated = diesel::update(room_change_requests::table.find(request.0))
                        .set((
                            room_change_requests::status.eq(decision.status().as_str()),
                            room_change_requests::rector_message.eq(rector_message),
                        ))
                        .returning(RequestRow::as_returning())
                        .get_result(connection)
                        .await?;
                    Ok(DecidedRequest {
                        request: updated.try_into()?,
                        room_number,
                    })
                }
                .scope_boxed()
            })
            .await
    }

    async fn load_requests(
        &self,
        filter: RequestFilter,
    ) -> Result<Vec<RoomChangeRequest>, DatabaseError> {
        let mut connection = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut connection;

        let query = room_change_requests::table
            .select(RequestRow::as_select())
            .order((
                room_change_requests::created_at.desc(),
                room_change_requests::id.desc(),
            ))
            .into_boxed();
        let pending = RequestStatus::Pending.as_str();
        let query = match filter {
            RequestFilter::Pending => query.filter(room_change_requests::status.eq(pending)),
            RequestFilter::Decided(limit) => query
                .filter(room_change_requests::status.ne(pending))
                .limit(i64::try_from(limit).unwrap_or(i64::MAX)),
            RequestFilter::Student(student) => {
                query.filter(room_change_requests::student_id.eq(student.0))
            }
        };
        convert_all(query.load(connection).await?)
    }

    async fn load_profile(
        &self,
        student: StudentId,
    ) -> Result<Option<StudentProfile>, DatabaseError> {
        let mut connection = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        Ok(student_profiles::table
            .find(student.0)
            .select(ProfileRow::as_select())
            .first(connection)
            .await
            .optional()?
            .map(StudentProfile::from))
    }

    async fn update_price(&self, room: RoomId, price: f64) -> Result<Room, DatabaseError> {
        let mut connection = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        diesel::update(rooms::table.find(room.0))
            .set(rooms::price.eq(price))
            .returning(RoomRow::as_returning())
            .get_result(connection)
            .await
            .optional()?
            .ok_or(LedgerError::RoomNotFound(room))?
            .try_into()
    }

    async fn update_capacity(&self, room: RoomId, capacity: u32) -> Result<Room, DatabaseError> {
        let capacity = i32::try_from(capacity).map_err(|_| LedgerError::InvalidCapacity)?;
        let mut connection = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        connection
            .transaction::<_, DatabaseError, _>(move |connection| {
                async move {
                    let locked = lock_room(connection, room).await?;
                    let occupants = occupants(connection, room).await?;
                    if i64::from(capacity) < i64::from(occupants) {
                        return Err(LedgerError::CapacityBelowOccupancy {
                            room: locked.number,
                            occupants,
                        }
                        .into());
                    }
                    let updated: RoomRow = diesel::update(rooms::table.find(room.0))
                        .set(rooms::capacity.eq(capacity))
                        .returning(RoomRow::as_returning())
                        .get_result(connection)
                        .await?;
                    Room::try_from(updated)
                }
                .scope_boxed()
            })
            .await
    }

    async fn upsert_fee(
        &self,
        student: StudentId,
        yearly_fee: f64,
        default_hostel_name: &str,
    ) -> Result<StudentProfile, DatabaseError> {
        let mut connection = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut connection;

        ensure_student(connection, student).await?;
        let row = diesel::insert_into(student_profiles::table)
            .values(ProfileRow {
                student_id: student.0,
                room_id: None,
                room_number: None,
                hostel_name: default_hostel_name.to_owned(),
                yearly_fee: Some(yearly_fee),
            })
            .on_conflict(student_profiles::student_id)
            .do_update()
            .set(student_profiles::yearly_fee.eq(yearly_fee))
            .returning(ProfileRow::as_returning())
            .get_result(connection)
            .await?;
        Ok(row.into())
    }
}

enum RequestFilter {
    Pending,
    Decided(usize),
    Student(StudentId),
}

#[async_trait]
impl OccupancyStore for PostgresStore {
    async fn rooms_with_occupancy(&self) -> Result<Vec<RoomOccupancy>, LedgerError> {
        Ok(self.load_rooms().await?)
    }

    async fn assign_room(
        &self,
        student: StudentId,
        room: RoomId,
        default_hostel_name: &str,
    ) -> Result<Assignment, LedgerError> {
        Ok(self.assign(student, room, default_hostel_name).await?)
    }

    async fn create_request(
        &self,
        request: NewRoomChangeRequest,
    ) -> Result<RoomChangeRequest, LedgerError> {
        Ok(self.insert_request(request).await?)
    }

    async fn decide_request(
        &self,
        request: RequestId,
        decision: Decision,
        rector_message: Option<String>,
        default_hostel_name: &str,
    ) -> Result<DecidedRequest, LedgerError> {
        Ok(self
            .decide(request, decision, rector_message, default_hostel_name)
            .await?)
    }

    async fn pending_requests(&self) -> Result<Vec<RoomChangeRequest>, LedgerError> {
        Ok(self.load_requests(RequestFilter::Pending).await?)
    }

    async fn decided_requests(
        &self,
        limit: usize,
    ) -> Result<Vec<RoomChangeRequest>, LedgerError> {
        Ok(self.load_requests(RequestFilter::Decided(limit)).await?)
    }

    async fn requests_for_student(
        &self,
        student: StudentId,
    ) -> Result<Vec<RoomChangeRequest>, LedgerError> {
        Ok(self.load_requests(RequestFilter::Student(student)).await?)
    }

    async fn profile(&self, student: StudentId) -> Result<Option<StudentProfile>, LedgerError> {
        Ok(self.load_profile(student).await?)
    }

    async fn set_room_price(&self, room: RoomId, price: f64) -> Result<Room, LedgerError> {
        Ok(self.update_price(room, price).await?)
    }

    async fn set_room_capacity(&self, room: RoomId, capacity: u32) -> Result<Room, LedgerError> {
        Ok(self.update_capacity(room, capacity).await?)
    }

    async fn set_yearly_fee(
        &self,
        student: StudentId,
        yearly_fee: f64,
        default_hostel_name: &str,
    ) -> Result<StudentProfile, LedgerError> {
        Ok(self
            .upsert_fee(student, yearly_fee, default_hostel_name)
            .await?)
    }
}
