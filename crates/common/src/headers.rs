//! HTTP header names shared by every service.

/// Header a replica or coordinator sets on peer-originated writes.
///
/// A write carrying this marker is applied locally only: the receiving replica
/// neither invalidates the frontend cache nor fans the change out again.
pub const SYNC_MARKER_HEADER: &str = "x-catalog-sync";

/// The only accepted value for [`SYNC_MARKER_HEADER`].
pub const SYNC_MARKER_VALUE: &str = "peer";

/// Response header identifying the instance that served a request.
pub const SERVICE_ID_HEADER: &str = "x-service-id";

/// Returns true if the given header value is a valid peer-sync marker.
pub fn is_sync_marker(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim() == SYNC_MARKER_VALUE)
}
