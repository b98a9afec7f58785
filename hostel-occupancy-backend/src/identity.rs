//! The authenticating proxy in front of the server sets these headers.

use hostel_occupancy_ledger::model::StudentId;
use hostel_occupancy_ledger::{Identity, Role};
use http::HeaderMap;

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-hostel-user-id";
pub const ROLE_HEADER: &str = "x-hostel-role";

pub fn identity_from_headers(headers: &HeaderMap) -> Result<Identity, AppError> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .ok_or(AppError::MissingIdentity)
    };
    let user = header(USER_ID_HEADER)?
        .parse::<i32>()
        .map_err(|_| AppError::MissingIdentity)?;
    let role = header(ROLE_HEADER)?
        .to_ascii_uppercase()
        .parse::<Role>()
        .map_err(|_| AppError::MissingIdentity)?;
    Ok(Identity::new(StudentId(user), role))
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    fn headers(user: &'static str, role: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static(user));
        headers.insert(ROLE_HEADER, HeaderValue::from_static(role));
        headers
    }

    #[test]
    fn reads_both_headers() {
        let identity = identity_from_headers(&headers("7", "rector")).unwrap();
        assert_eq!(identity, Identity::new(StudentId(7), Role::Rector));
    }

    #[test]
    fn rejects_missing_or_malformed_values() {
        assert!(matches!(
            identity_from_headers(&HeaderMap::new()),
            Err(AppError::MissingIdentity)
        ));
        assert!(matches!(
            identity_from_headers(&headers("seven", "STUDENT")),
            Err(AppError::MissingIdentity)
        ));
        assert!(matches!(
            identity_from_headers(&headers("7", "WARDEN")),
            Err(AppError::MissingIdentity)
        ));
    }
}
