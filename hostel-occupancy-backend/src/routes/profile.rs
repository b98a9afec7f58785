use bytes::Bytes;
use hostel_occupancy_ledger::model::StudentId;
use hostel_occupancy_ledger::{Identity, Ledger};
use http::{Response, StatusCode};
use http_body_util::Full;

use crate::error::AppError;

use super::json;

/// `/profile/{student_id}`. A student without a profile yet gets `null`.
pub async fn show(
    ledger: &Ledger,
    caller: Identity,
    student: &str,
) -> Result<Response<Full<Bytes>>, AppError> {
    let student = student
        .parse::<i32>()
        .map(StudentId)
        .map_err(|_| AppError::NotFound)?;
    json(StatusCode::OK, &ledger.profile(&caller, student).await?)
}
