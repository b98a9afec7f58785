use bytes::Bytes;
use hostel_occupancy_ledger::model::{RoomId, StudentId};
use hostel_occupancy_ledger::{Identity, Ledger};
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use serde::Deserialize;

use super::{json, read_form};
use crate::error::{AppError, BoxError};

#[derive(Deserialize)]
pub struct AllocatePayload {
    student_id: StudentId,
    room_id: RoomId,
}

#[derive(Deserialize)]
pub struct PricePayload {
    room_id: RoomId,
    price: f64,
}

#[derive(Deserialize)]
pub struct CapacityPayload {
    room_id: RoomId,
    capacity: u32,
}

#[derive(Deserialize)]
pub struct FeePayload {
    student_id: StudentId,
    yearly_fee: f64,
}

pub async fn vacant(ledger: &Ledger, caller: Identity) -> Result<Response<Full<Bytes>>, AppError> {
    json(StatusCode::OK, &ledger.vacant_rooms(&caller).await?)
}

pub async fn list(ledger: &Ledger, caller: Identity) -> Result<Response<Full<Bytes>>, AppError> {
    let rector = caller.rector()?;
    json(StatusCode::OK, &ledger.rooms(&rector).await?)
}

pub async fn allocate(
    request: Request<impl http_body::Body<Data = Bytes, Error = impl Into<BoxError>>>,
    ledger: &Ledger,
    caller: Identity,
) -> Result<Response<Full<Bytes>>, AppError> {
    let rector = caller.rector()?;
    let form: AllocatePayload = read_form(request).await?;
    let assignment = ledger
        .allocate_room(&rector, form.student_id, form.room_id)
        .await?;
    json(StatusCode::OK, &assignment)
}

pub async fn price(
    request: Request<impl http_body::Body<Data = Bytes, Error = impl Into<BoxError>>>,
    ledger: &Ledger,
    caller: Identity,
) -> Result<Response<Full<Bytes>>, AppError> {
    let rector = caller.rector()?;
    let form: PricePayload = read_form(request).await?;
    json(
        StatusCode::OK,
        &ledger.set_room_price(&rector, form.room_id, form.price).await?,
    )
}

pub async fn capacity(
    request: Request<impl http_body::Body<Data = Bytes, Error = impl Into<BoxError>>>,
    ledger: &Ledger,
    caller: Identity,
) -> Result<Response<Full<Bytes>>, AppError> {
    let rector = caller.rector()?;
    let form: CapacityPayload = read_form(request).await?;
    json(
        StatusCode::OK,
        &ledger
            .set_room_capacity(&rector, form.room_id, form.capacity)
            .await?,
    )
}

pub async fn fee(
    request: Request<impl http_body::Body<Data = Bytes, Error = impl Into<BoxError>>>,
    ledger: &Ledger,
    caller: Identity,
) -> Result<Response<Full<Bytes>>, AppError> {
    let rector = caller.rector()?;
    let form: FeePayload = read_form(request).await?;
    json(
        StatusCode::OK,
        &ledger
            .set_yearly_fee(&rector, form.student_id, form.yearly_fee)
            .await?,
    )
}
