//! Request-scoped values carried in `http::Extensions`.
//!
//! Middleware inserts these newtypes into the request extensions; handlers
//! and the logger's context extractors read them back.

use axum::http::Extensions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Username(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

pub fn with_user_id(ext: &mut Extensions, user_id: impl Into<String>) {
    ext.insert(UserId(user_id.into()));
}

pub fn with_username(ext: &mut Extensions, username: impl Into<String>) {
    ext.insert(Username(username.into()));
}

pub fn with_request_id(ext: &mut Extensions, request_id: impl Into<String>) {
    ext.insert(RequestId(request_id.into()));
}

#[must_use]
pub fn user_id(ext: &Extensions) -> Option<&str> {
    ext.get::<UserId>().map(|v| v.0.as_str())
}

#[must_use]
pub fn username(ext: &Extensions) -> Option<&str> {
    ext.get::<Username>().map(|v| v.0.as_str())
}

#[must_use]
pub fn request_id(ext: &Extensions) -> Option<&str> {
    ext.get::<RequestId>().map(|v| v.0.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_round_trip_through_extensions() {
        let mut ext = Extensions::new();
        assert_eq!(user_id(&ext), None);
        with_user_id(&mut ext, "user-1");
        with_username(&mut ext, "alice");
        assert_eq!(user_id(&ext), Some("user-1"));
        assert_eq!(username(&ext), Some("alice"));
        assert_eq!(request_id(&ext), None);
    }
}
