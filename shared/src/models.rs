use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::{FareBreakdown, TransferError};

// ============================================================================
// Vehicles and rates
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VehicleType {
    Saloon,
    Estate,
    Executive,
    PeopleCarrier,
    Minibus,
}

impl VehicleType {
    pub const ALL: [VehicleType; 5] = [
        VehicleType::Saloon,
        VehicleType::Estate,
        VehicleType::Executive,
        VehicleType::PeopleCarrier,
        VehicleType::Minibus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Saloon => "saloon",
            VehicleType::Estate => "estate",
            VehicleType::Executive => "executive",
            VehicleType::PeopleCarrier => "people-carrier",
            VehicleType::Minibus => "minibus",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleType {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VehicleType::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TransferError::ValidationError(format!("Unknown vehicle type: {}", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRate {
    pub vehicle_type: VehicleType,
    pub display_name: String,
    pub base_fare_pence: u32,
    pub per_mile_pence: u32,
    pub per_minute_pence: u32,
    pub minimum_fare_pence: u32,
    pub max_passengers: u8,
    pub max_luggage: u8,
}

impl VehicleRate {
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.display_name.trim().is_empty() {
            return Err(TransferError::ValidationError(
                "displayName cannot be empty".to_string(),
            ));
        }
        if self.max_passengers == 0 {
            return Err(TransferError::ValidationError(
                "maxPassengers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Built-in rate card used until the back office stores its own
pub fn default_rates() -> Vec<VehicleRate> {
    vec![
        VehicleRate {
            vehicle_type: VehicleType::Saloon,
            display_name: "Saloon".to_string(),
            base_fare_pence: 350,
            per_mile_pence: 180,
            per_minute_pence: 20,
            minimum_fare_pence: 800,
            max_passengers: 4,
            max_luggage: 2,
        },
        VehicleRate {
            vehicle_type: VehicleType::Estate,
            display_name: "Estate".to_string(),
            base_fare_pence: 400,
            per_mile_pence: 200,
            per_minute_pence: 20,
            minimum_fare_pence: 900,
            max_passengers: 4,
            max_luggage: 4,
        },
        VehicleRate {
            vehicle_type: VehicleType::Executive,
            display_name: "Executive".to_string(),
            base_fare_pence: 600,
            per_mile_pence: 260,
            per_minute_pence: 30,
            minimum_fare_pence: 1500,
            max_passengers: 3,
            max_luggage: 3,
        },
        VehicleRate {
            vehicle_type: VehicleType::PeopleCarrier,
            display_name: "People Carrier".to_string(),
            base_fare_pence: 500,
            per_mile_pence: 240,
            per_minute_pence: 25,
            minimum_fare_pence: 1200,
            max_passengers: 7,
            max_luggage: 6,
        },
        VehicleRate {
            vehicle_type: VehicleType::Minibus,
            display_name: "Minibus".to_string(),
            base_fare_pence: 800,
            per_mile_pence: 320,
            per_minute_pence: 35,
            minimum_fare_pence: 2000,
            max_passengers: 16,
            max_luggage: 16,
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedRoute {
    /// Taken from the URL when the body omits it
    #[serde(default)]
    pub id: String,
    pub from_area: String,
    pub to_area: String,
    #[serde(default)]
    pub bidirectional: bool,
    pub prices: HashMap<VehicleType, u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyMetrics {
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

// ============================================================================
// Quotes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
    Booked,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Pending => "PENDING",
            QuoteStatus::Accepted => "ACCEPTED",
            QuoteStatus::Declined => "DECLINED",
            QuoteStatus::Expired => "EXPIRED",
            QuoteStatus::Booked => "BOOKED",
        }
    }

    pub fn can_transition_to(&self, next: QuoteStatus) -> bool {
        matches!(
            (self, next),
            (QuoteStatus::Pending, QuoteStatus::Accepted)
                | (QuoteStatus::Pending, QuoteStatus::Declined)
                | (QuoteStatus::Pending, QuoteStatus::Expired)
                | (QuoteStatus::Accepted, QuoteStatus::Booked)
                | (QuoteStatus::Accepted, QuoteStatus::Expired)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QuoteStatus::Declined | QuoteStatus::Expired | QuoteStatus::Booked
        )
    }

    /// Customers may answer their own quote; everything else is back office
    pub fn is_customer_response(&self) -> bool {
        matches!(self, QuoteStatus::Accepted | QuoteStatus::Declined)
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuoteStatus {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(QuoteStatus::Pending),
            "ACCEPTED" => Ok(QuoteStatus::Accepted),
            "DECLINED" => Ok(QuoteStatus::Declined),
            "EXPIRED" => Ok(QuoteStatus::Expired),
            "BOOKED" => Ok(QuoteStatus::Booked),
            _ => Err(TransferError::ValidationError(format!("Invalid quote status: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub quote_id: String,
    pub tenant_id: String,
    pub pickup: String,
    pub dropoff: String,
    pub pickup_time: DateTime<Utc>,
    pub vehicle_type: VehicleType,
    pub passengers: u8,
    pub return_journey: bool,
    pub fare: FareBreakdown,
    pub customer_email: Option<String>,
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Expired quotes stay queryable for a week before DynamoDB TTL removes them
pub const QUOTE_RETENTION_DAYS: i64 = 7;
pub const DEFAULT_QUOTE_TTL_HOURS: i64 = 72;

impl Quote {
    /// Stored status, except that live quotes past `expires_at` read as expired
    pub fn effective_status(&self, now: DateTime<Utc>) -> QuoteStatus {
        match self.status {
            QuoteStatus::Pending | QuoteStatus::Accepted if now > self.expires_at => {
                QuoteStatus::Expired
            }
            status => status,
        }
    }

    /// Epoch seconds for the DynamoDB `ttl` attribute
    pub fn ttl(&self) -> i64 {
        (self.expires_at + Duration::days(QUOTE_RETENTION_DAYS)).timestamp()
    }

    pub fn is_bookable(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.effective_status(now),
            QuoteStatus::Pending | QuoteStatus::Accepted
        )
    }
}

// ============================================================================
// Bookings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Assigned,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Assigned => "ASSIGNED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Assigned)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
                | (BookingStatus::Assigned, BookingStatus::Completed)
                | (BookingStatus::Assigned, BookingStatus::Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "ASSIGNED" => Ok(BookingStatus::Assigned),
            "COMPLETED" => Ok(BookingStatus::Completed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            _ => Err(TransferError::ValidationError(format!(
                "Invalid booking status: {}",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl CustomerDetails {
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.name.trim().is_empty() {
            return Err(TransferError::ValidationError(
                "Customer name is required".to_string(),
            ));
        }
        if !crate::is_valid_email(self.email.trim()) {
            return Err(TransferError::ValidationError(
                "Invalid customer email".to_string(),
            ));
        }
        if !crate::is_valid_phone(&self.phone) {
            return Err(TransferError::ValidationError(
                "Invalid customer phone number".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub booking_id: String,
    pub tenant_id: String,
    pub quote_id: String,
    pub customer: CustomerDetails,
    pub pickup: String,
    pub dropoff: String,
    pub pickup_time: DateTime<Utc>,
    pub vehicle_type: VehicleType,
    pub passengers: u8,
    pub return_journey: bool,
    pub total_pence: u32,
    pub notes: Option<String>,
    pub flight_number: Option<String>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Document comments
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub comment_id: String,
    pub document_id: String,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

pub const MAX_COMMENT_LENGTH: usize = 2000;

// ============================================================================
// Storage and company lookup
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    pub path: String,
    pub size_bytes: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrl {
    pub path: String,
    pub url: String,
    pub expires_in_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyAddress {
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub locality: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    pub company_number: String,
    pub company_name: String,
    pub company_status: Option<String>,
    pub company_type: Option<String>,
    pub date_of_creation: Option<String>,
    pub registered_office_address: Option<CompanyAddress>,
}

// ============================================================================
// Email notifications
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRequest {
    /// Base template name; resolved to the deployed SES template by EmailService
    pub template_name: String,
    pub recipient: String,
    pub template_data: HashMap<String, String>,
    pub priority: EmailPriority,
    pub reply_to: Option<String>,
    pub from_address: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmailPriority {
    /// Customer-facing booking mail
    High,
    #[default]
    Normal,
    Low,
}

impl EmailPriority {
    pub fn queue_value(&self) -> &'static str {
        match self {
            EmailPriority::High => "1",
            EmailPriority::Normal => "2",
            EmailPriority::Low => "3",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailResponse {
    pub message_id: String,
    pub success: bool,
    pub error: Option<String>,
}

pub struct EmailTemplates;

impl EmailTemplates {
    pub const BOOKING_CONFIRMATION: &'static str = "booking-confirmation";
    pub const BOOKING_STATUS_UPDATE: &'static str = "booking-status-update";
    pub const ADMIN_NEW_BOOKING: &'static str = "admin-new-booking";

    pub const ALL: [&'static str; 3] = [
        Self::BOOKING_CONFIRMATION,
        Self::BOOKING_STATUS_UPDATE,
        Self::ADMIN_NEW_BOOKING,
    ];

    /// Environment variable the deployment uses to pass the full template name
    pub fn env_var(template: &str) -> String {
        format!("{}_TEMPLATE_NAME", template.to_uppercase().replace('-', "_"))
    }
}

fn booking_template_data(booking: &Booking) -> HashMap<String, String> {
    let mut data = HashMap::new();
    data.insert("bookingId".to_string(), booking.booking_id.clone());
    data.insert("customerName".to_string(), booking.customer.name.clone());
    data.insert("pickup".to_string(), booking.pickup.clone());
    data.insert("dropoff".to_string(), booking.dropoff.clone());
    data.insert(
        "pickupTime".to_string(),
        booking.pickup_time.format("%d/%m/%Y %H:%M").to_string(),
    );
    data.insert("vehicle".to_string(), booking.vehicle_type.to_string());
    data.insert("total".to_string(), crate::format_gbp(booking.total_pence));
    data.insert("status".to_string(), booking.status.to_string());
    data
}

impl EmailRequest {
    pub fn booking_confirmation(booking: &Booking) -> Self {
        Self {
            template_name: EmailTemplates::BOOKING_CONFIRMATION.to_string(),
            recipient: booking.customer.email.clone(),
            template_data: booking_template_data(booking),
            priority: EmailPriority::High,
            reply_to: None,
            from_address: None,
        }
    }

    pub fn admin_new_booking(booking: &Booking, admin_email: String) -> Self {
        let mut template_data = booking_template_data(booking);
        template_data.insert("customerEmail".to_string(), booking.customer.email.clone());
        template_data.insert("customerPhone".to_string(), booking.customer.phone.clone());
        if let Some(notes) = &booking.notes {
            template_data.insert("notes".to_string(), notes.clone());
        }
        if let Some(flight) = &booking.flight_number {
            template_data.insert("flightNumber".to_string(), flight.clone());
        }

        Self {
            template_name: EmailTemplates::ADMIN_NEW_BOOKING.to_string(),
            recipient: admin_email,
            template_data,
            priority: EmailPriority::Normal,
            reply_to: Some(booking.customer.email.clone()),
            from_address: None,
        }
    }

    pub fn booking_status_update(booking: &Booking) -> Self {
        Self {
            template_name: EmailTemplates::BOOKING_STATUS_UPDATE.to_string(),
            recipient: booking.customer.email.clone(),
            template_data: booking_template_data(booking),
            priority: EmailPriority::High,
            reply_to: None,
            from_address: None,
        }
    }
}
