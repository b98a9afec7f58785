use chrono::{DateTime, Utc};
use diesel::prelude::*;
use hostel_occupancy_ledger::model::{
    RequestId, Room, RoomChangeRequest, RoomId, StudentId, StudentProfile,
};

use crate::error::DatabaseError;
use crate::schema::{notifications, room_change_requests, rooms, student_profiles, users};

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = rooms)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RoomRow {
    pub id: i32,
    pub number: String,
    pub room_type: String,
    pub capacity: i32,
    pub price: f64,
}

impl TryFrom<RoomRow> for Room {
    type Error = DatabaseError;

    fn try_from(row: RoomRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: RoomId(row.id),
            room_type: row.room_type.parse()?,
            capacity: u32::try_from(row.capacity).map_err(|_| DatabaseError::OutOfRange {
                column: "rooms.capacity",
                value: row.capacity.into(),
            })?,
            number: row.number,
            price: row.price,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = rooms)]
pub struct NewRoom<'a> {
    pub number: &'a str,
    pub room_type: &'a str,
    pub capacity: i32,
    pub price: f64,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub role: &'a str,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = student_profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProfileRow {
    pub student_id: i32,
    pub room_id: Option<i32>,
    pub room_number: Option<String>,
    pub hostel_name: String,
    pub yearly_fee: Option<f64>,
}

impl From<ProfileRow> for StudentProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            student: StudentId(row.student_id),
            room: row.room_id.map(RoomId),
            room_number: row.room_number,
            hostel_name: row.hostel_name,
            yearly_fee: row.yearly_fee,
        }
    }
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = room_change_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RequestRow {
    pub id: i32,
    pub student_id: i32,
    pub requested_room_id: i32,
    pub reason: String,
    pub status: String,
    pub rector_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for RoomChangeRequest {
    type Error = DatabaseError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: RequestId(row.id),
            student: StudentId(row.student_id),
            requested_room: RoomId(row.requested_room_id),
            reason: row.reason,
            status: row.status.parse()?,
            rector_message: row.rector_message,
            created_at: row.created_at,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = room_change_requests)]
pub struct NewRequestRow<'a> {
    pub student_id: i32,
    pub requested_room_id: i32,
    pub reason: &'a str,
    pub status: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotificationRow<'a> {
    pub user_id: i32,
    pub title: &'a str,
    pub message: &'a str,
    pub kind: &'a str,
    pub read: bool,
}

pub fn convert_all<Row, Model>(rows: Vec<Row>) -> Result<Vec<Model>, DatabaseError>
where
    Model: TryFrom<Row, Error = DatabaseError>,
{
    rows.into_iter().map(Model::try_from).collect()
}
