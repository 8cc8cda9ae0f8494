//! Endpoint wrappers over [`ApiClient`]
//!
//! Each service borrows the client, so they all share its credentials and
//! refresh state.

mod auth;
mod bookings;
mod users;

pub use auth::{AuthService, Credentials, LoginResponse};
pub use bookings::{Booking, BookingService, NewBooking};
pub use users::{User, UserService};

use crate::ApiClient;
use serde::Deserialize;

/// Response body, either `{ "data": ... }` or the value itself
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    pub(crate) fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

impl ApiClient {
    pub const fn auth(&self) -> AuthService<'_> {
        AuthService::new(self)
    }

    pub const fn users(&self) -> UserService<'_> {
        UserService::new(self)
    }

    pub const fn bookings(&self) -> BookingService<'_> {
        BookingService::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_accepts_both_shapes() {
        let wrapped: Envelope<Vec<u32>> = serde_json::from_value(json!({"data": [1, 2]})).unwrap();
        assert_eq!(wrapped.into_inner(), vec![1, 2]);

        let bare: Envelope<Vec<u32>> = serde_json::from_value(json!([3])).unwrap();
        assert_eq!(bare.into_inner(), vec![3]);
    }
}
