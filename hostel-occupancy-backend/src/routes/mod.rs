pub mod profile;
pub mod requests;
pub mod rooms;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request, Response, StatusCode};
use http_body_util::{BodyExt as _, Full, Limited};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{AppError, BoxError};

/// Forms are a handful of short fields.
const FORM_LIMIT: usize = 16 * 1024;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

pub async fn read_form<T: DeserializeOwned>(
    request: Request<impl http_body::Body<Data = Bytes, Error = impl Into<BoxError>>>,
) -> Result<T, AppError> {
    if let Some(content_type) = request.headers().get(CONTENT_TYPE) {
        let is_form = content_type.to_str().is_ok_and(|value| {
            let essence = value.split(';').next().unwrap_or_default().trim();
            essence.eq_ignore_ascii_case(FORM_CONTENT_TYPE)
        });
        if !is_form {
            return Err(AppError::UnsupportedMediaType);
        }
    }
    let body = Limited::new(request.into_body(), FORM_LIMIT)
        .collect()
        .await
        .map_err(AppError::Body)?
        .to_bytes();
    Ok(serde_urlencoded::from_bytes(&body)?)
}

pub fn json(status: StatusCode, value: &impl Serialize) -> Result<Response<Full<Bytes>>, AppError> {
    let body = serde_json::to_vec(value)?;
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize, Debug, PartialEq)]
    struct Form {
        room_id: i32,
        reason: String,
    }

    fn request(content_type: &'static str, body: &'static str) -> Request<Full<Bytes>> {
        Request::builder()
            .header(CONTENT_TYPE, content_type)
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap()
    }

    #[tokio::test]
    async fn decodes_urlencoded_bodies() {
        let form: Form = read_form(request(FORM_CONTENT_TYPE, "room_id=3&reason=too+noisy"))
            .await
            .unwrap();
        assert_eq!(
            form,
            Form {
                room_id: 3,
                reason: "too noisy".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn media_type_is_case_insensitive_and_may_carry_parameters() {
        for content_type in [
            "Application/X-WWW-Form-Urlencoded",
            "application/x-www-form-urlencoded; charset=UTF-8",
        ] {
            let form: Form = read_form(request(content_type, "room_id=3&reason=light"))
                .await
                .unwrap();
            assert_eq!(form.room_id, 3);
        }
        let result =
            read_form::<Form>(request("application/x-www-form-urlencodedx", "room_id=3")).await;
        assert!(matches!(result, Err(AppError::UnsupportedMediaType)));
    }

    #[tokio::test]
    async fn rejects_other_content_types() {
        let result = read_form::<Form>(request("application/json", "{}")).await;
        assert!(matches!(result, Err(AppError::UnsupportedMediaType)));
    }

    #[tokio::test]
    async fn rejects_oversized_bodies() {
        let huge = "a".repeat(FORM_LIMIT + 1);
        let request = Request::builder()
            .body(Full::new(Bytes::from(huge)))
            .unwrap();
        let result = read_form::<Form>(request).await;
        assert!(matches!(result, Err(AppError::Body(_))));
    }
}
