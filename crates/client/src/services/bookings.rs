//! Appointment bookings

use super::Envelope;
use crate::error::ClientError;
use crate::request::ApiRequest;
use crate::ApiClient;
use serde::{Deserialize, Serialize};

const BOOKINGS_PATH: &str = "/api/v1/bookings";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: u64,
    pub service_id: u64,
    #[serde(default)]
    pub specialist_id: Option<u64>,
    pub customer_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Booking as submitted by a customer
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub service_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialist_id: Option<u64>,
    pub customer_name: String,
    pub phone: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    pub time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl NewBooking {
    /// First required field that is missing or blank
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.service_id.is_none() {
            return Some("serviceId");
        }
        [
            ("customerName", &self.customer_name),
            ("phone", &self.phone),
            ("date", &self.date),
            ("time", &self.time),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

pub struct BookingService<'a> {
    client: &'a ApiClient,
}

impl<'a> BookingService<'a> {
    pub(crate) const fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<Booking>, ClientError> {
        let bookings: Envelope<Vec<Booking>> = self.client.get(BOOKINGS_PATH).await?;
        Ok(bookings.into_inner())
    }

    pub async fn get(&self, id: u64) -> Result<Booking, ClientError> {
        let booking: Envelope<Booking> = self.client.get(&format!("{BOOKINGS_PATH}/{id}")).await?;
        Ok(booking.into_inner())
    }

    /// Submit a booking; nothing is sent when a required field is missing
    pub async fn create(&self, booking: &NewBooking) -> Result<Booking, ClientError> {
        if let Some(field) = booking.missing_field() {
            return Err(ClientError::missing_field(field));
        }
        let created: Envelope<Booking> = self.client.post(BOOKINGS_PATH, booking).await?;
        Ok(created.into_inner())
    }

    pub async fn cancel(&self, id: u64) -> Result<(), ClientError> {
        let request = ApiRequest::delete(format!("{BOOKINGS_PATH}/{id}"))
            .timeout(self.client.config().admin_timeout());
        self.client.send(request).await?;
        Ok(())
    }
}
