use bytes::Bytes;
use hostel_occupancy_ledger::model::{Decision, RequestId, RoomChangeRequest, RoomId};
use hostel_occupancy_ledger::{Identity, Ledger, DEFAULT_HISTORY_LIMIT};
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use serde::{Deserialize, Serialize};

use super::{json, read_form};
use crate::error::{AppError, BoxError};

#[derive(Deserialize)]
pub struct SubmitPayload {
    requested_room_id: RoomId,
    reason: String,
}

#[derive(Deserialize)]
pub struct DecidePayload {
    request_id: RequestId,
    status: Decision,
    #[serde(default)]
    rector_message: Option<String>,
}

#[derive(Serialize)]
pub struct RectorOverview {
    pending: Vec<RoomChangeRequest>,
    history: Vec<RoomChangeRequest>,
}

/// Pending requests plus the most recent decisions.
pub async fn overview(
    ledger: &Ledger,
    caller: Identity,
) -> Result<Response<Full<Bytes>>, AppError> {
    let rector = caller.rector()?;
    let pending = ledger.pending_requests(&rector).await?;
    let history = ledger
        .recent_decisions(&rector, DEFAULT_HISTORY_LIMIT)
        .await?;
    json(StatusCode::OK, &RectorOverview { pending, history })
}

pub async fn decide(
    request: Request<impl http_body::Body<Data = Bytes, Error = impl Into<BoxError>>>,
    ledger: &Ledger,
    caller: Identity,
) -> Result<Response<Full<Bytes>>, AppError> {
    let rector = caller.rector()?;
    let form: DecidePayload = read_form(request).await?;
    let decided = ledger
        .decide_room_change_request(&rector, form.request_id, form.status, form.rector_message)
        .await?;
    json(StatusCode::OK, &decided)
}

pub async fn mine(ledger: &Ledger, caller: Identity) -> Result<Response<Full<Bytes>>, AppError> {
    let student = caller.student()?;
    json(StatusCode::OK, &ledger.requests_for(&student).await?)
}

pub async fn submit(
    request: Request<impl http_body::Body<Data = Bytes, Error = impl Into<BoxError>>>,
    ledger: &Ledger,
    caller: Identity,
) -> Result<Response<Full<Bytes>>, AppError> {
    let student = caller.student()?;
    let form: SubmitPayload = read_form(request).await?;
    let created = ledger
        .submit_room_change_request(&student, form.requested_room_id, &form.reason)
        .await?;
    json(StatusCode::CREATED, &created)
}
