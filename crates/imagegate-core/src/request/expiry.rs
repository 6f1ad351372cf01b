use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{ImageHandlerError, CODE_REQUEST_EXPIRED, CODE_REQUEST_EXPIRY_FORMAT};

const EXPIRY_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Validate an `expires` query value of the form `YYYYMMDDTHHmmssZ`.
pub fn check_expiry(value: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ImageHandlerError> {
    let well_formed = value.len() == 16
        && value.as_bytes()[8] == b'T'
        && value.ends_with('Z')
        && value[..8].bytes().all(|b| b.is_ascii_digit())
        && value[9..15].bytes().all(|b| b.is_ascii_digit());

    let expires = well_formed
        .then(|| NaiveDateTime::parse_from_str(value, EXPIRY_FORMAT).ok())
        .flatten()
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            ImageHandlerError::invalid_request(
                CODE_REQUEST_EXPIRY_FORMAT,
                "Request has invalid expiry date.",
            )
        })?;

    if now > expires {
        return Err(ImageHandlerError::invalid_request(
            CODE_REQUEST_EXPIRED,
            "Request has expired.",
        ));
    }

    Ok(expires)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_future_expiry_is_accepted() {
        let expires = check_expiry("20300101T000000Z", now()).unwrap();
        assert_eq!(expires, Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_past_expiry_is_rejected() {
        let err = check_expiry("20200101T000000Z", now()).unwrap_err();
        assert!(matches!(
            err,
            ImageHandlerError::InvalidRequest { code: CODE_REQUEST_EXPIRED, .. }
        ));
    }

    #[test]
    fn test_malformed_expiry_is_rejected() {
        for value in ["2030-01-01", "20301301T000000Z", "20300101T000000", "ab300101T000000Z"] {
            let err = check_expiry(value, now()).unwrap_err();
            assert!(matches!(
                err,
                ImageHandlerError::InvalidRequest { code: CODE_REQUEST_EXPIRY_FORMAT, .. }
            ));
        }
    }
}
