//! Session persistence for UTM attribution.
//!
//! Records are stored as [`UtmRecord`] JSON under one session key. A record
//! that fails to parse or has expired is removed and read as empty.

use axum::{extract::Request, middleware::Next, response::Response};
use chrono::{DateTime, Utc};
use julie_core::tracking::{UtmParams, UtmRecord};
use thiserror::Error;
use tower_sessions::Session;
use tracing::{debug, warn};
use url::form_urlencoded;

/// Session key holding the current [`UtmRecord`].
pub const UTM_SESSION_KEY: &str = "utm_params";

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

/// Recognised tracking parameters from a raw query string.
#[must_use]
pub fn capture_from_query(query: Option<&str>) -> UtmParams {
    query.map_or_else(UtmParams::new, |q| {
        UtmParams::from_pairs(form_urlencoded::parse(q.as_bytes()))
    })
}

/// Store `params` with a fresh 30 day window. Empty params are not stored.
///
/// # Errors
///
/// Returns `TrackingError::Session` if the session cannot be written.
pub async fn persist(
    session: &Session,
    params: &UtmParams,
    now: DateTime<Utc>,
) -> Result<(), TrackingError> {
    if params.is_empty() {
        return Ok(());
    }
    session
        .insert(UTM_SESSION_KEY, UtmRecord::new(params.clone(), now))
        .await?;
    Ok(())
}

/// The stored params if the record is still valid at `now`.
///
/// # Errors
///
/// Returns `TrackingError::Session` if the session cannot be read.
pub async fn read_valid(session: &Session, now: DateTime<Utc>) -> Result<UtmParams, TrackingError> {
    let Some(raw) = session.get_value(UTM_SESSION_KEY).await? else {
        return Ok(UtmParams::new());
    };

    match serde_json::from_value::<UtmRecord>(raw) {
        Ok(record) if record.is_valid_at(now) => Ok(record.params),
        Ok(record) => {
            debug!(expiry = %record.expiry, "Tracking record expired");
            clear(session).await?;
            Ok(UtmParams::new())
        }
        Err(e) => {
            warn!(error = %e, "Discarding unreadable tracking record");
            clear(session).await?;
            Ok(UtmParams::new())
        }
    }
}

/// Stored params overlaid with params from `query`; the query wins.
///
/// # Errors
///
/// Returns `TrackingError::Session` if the session cannot be read.
pub async fn get_all(
    session: &Session,
    query: Option<&str>,
    now: DateTime<Utc>,
) -> Result<UtmParams, TrackingError> {
    let stored = read_valid(session, now).await?;
    Ok(stored.merged_with(&capture_from_query(query)))
}

/// # Errors
///
/// Returns `TrackingError::Session` if the session cannot be written.
pub async fn clear(session: &Session) -> Result<(), TrackingError> {
    session.remove_value(UTM_SESSION_KEY).await?;
    Ok(())
}

/// Capture tracking parameters from every request URL.
///
/// When the URL carries any, the stored record is replaced by the merged set
/// so attribution from earlier landings is kept.
pub async fn capture_tracking_middleware(
    session: Session,
    request: Request,
    next: Next,
) -> Response {
    let captured = capture_from_query(request.uri().query());

    if !captured.is_empty() {
        let now = Utc::now();
        let result = match read_valid(&session, now).await {
            Ok(stored) => persist(&session, &stored.merged_with(&captured), now).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist tracking parameters");
        }
    }

    next.run(request).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone};
    use julie_core::tracking::TrackingKey;
    use tower_sessions::MemoryStore;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_capture_known_non_empty_only() {
        let params = capture_from_query(Some("utm_source=ig&utm_medium=&ref=abc&gclid=G%201"));
        assert_eq!(params.len(), 2);
        assert_eq!(params.get(TrackingKey::UtmSource), Some("ig"));
        assert_eq!(params.get(TrackingKey::Gclid), Some("G 1"));
        assert!(capture_from_query(None).is_empty());
    }

    #[tokio::test]
    async fn test_persist_then_read_within_window() {
        let session = session();
        let params = capture_from_query(Some("utm_source=ig&utm_campaign=fall"));
        persist(&session, &params, t0()).await.unwrap();

        let read = read_valid(&session, t0() + Duration::days(29)).await.unwrap();
        assert_eq!(read, params);
    }

    #[tokio::test]
    async fn test_expired_record_is_removed() {
        let session = session();
        persist(&session, &capture_from_query(Some("utm_source=ig")), t0())
            .await
            .unwrap();

        let read = read_valid(&session, t0() + Duration::days(30)).await.unwrap();
        assert!(read.is_empty());
        assert!(session.get_value(UTM_SESSION_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_record_reads_empty() {
        let session = session();
        session.insert(UTM_SESSION_KEY, "not a record").await.unwrap();

        assert!(read_valid(&session, t0()).await.unwrap().is_empty());
        assert!(session.get_value(UTM_SESSION_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_all_prefers_url_values() {
        let session = session();
        persist(
            &session,
            &capture_from_query(Some("utm_source=email&utm_medium=newsletter")),
            t0(),
        )
        .await
        .unwrap();

        let all = get_all(&session, Some("utm_source=ig"), t0() + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(all.get(TrackingKey::UtmSource), Some("ig"));
        assert_eq!(all.get(TrackingKey::UtmMedium), Some("newsletter"));
    }

    #[tokio::test]
    async fn test_url_merges_with_stored_campaign() {
        let session = session();
        persist(&session, &capture_from_query(Some("utm_campaign=old")), t0())
            .await
            .unwrap();

        let all = get_all(&session, Some("utm_source=email"), t0()).await.unwrap();
        let expected = capture_from_query(Some("utm_source=email&utm_campaign=old"));
        assert_eq!(all, expected);
    }

    #[tokio::test]
    async fn test_empty_params_are_not_stored() {
        let session = session();
        persist(&session, &UtmParams::new(), t0()).await.unwrap();
        assert!(session.get_value(UTM_SESSION_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let session = session();
        persist(&session, &capture_from_query(Some("utm_term=linen")), t0())
            .await
            .unwrap();
        clear(&session).await.unwrap();
        assert!(read_valid(&session, t0()).await.unwrap().is_empty());
    }
}
