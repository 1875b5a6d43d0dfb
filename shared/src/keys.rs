//! Single-table key layout.
//!
//! | Entity      | PK                               | SK                             | GSI1PK / GSI1SK                          | GSI2PK / GSI2SK                      |
//! |-------------|----------------------------------|--------------------------------|------------------------------------------|--------------------------------------|
//! | Quote       | TENANT#001                       | QUOTE#{id}                     | TENANT#001#QUOTE#{STATUS} / created_at   |                                      |
//! | Booking     | TENANT#001                       | BOOKING#{id}                   | TENANT#001#BOOKING#{STATUS} / pickup_time| TENANT#001#BOOKING_DAY#{ddmmyy} / id |
//! | Vehicle     | TENANT#001                       | VEHICLE#{type}                 |                                          |                                      |
//! | Fixed route | TENANT#001                       | FIXED_ROUTE#{id}               |                                          |                                      |
//! | Comment     | TENANT#001#DOCUMENT#{documentId} | COMMENT#{created_at}#{id}      |                                          |                                      |

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{BookingStatus, QuoteStatus, Tenant, VehicleType};

pub const PK: &str = "PK";
pub const SK: &str = "SK";
pub const GSI1: &str = "GSI1";
pub const GSI1PK: &str = "GSI1PK";
pub const GSI1SK: &str = "GSI1SK";
pub const GSI2: &str = "GSI2";
pub const GSI2PK: &str = "GSI2PK";
pub const GSI2SK: &str = "GSI2SK";

pub const QUOTE_SK_PREFIX: &str = "QUOTE#";
pub const BOOKING_SK_PREFIX: &str = "BOOKING#";
pub const VEHICLE_SK_PREFIX: &str = "VEHICLE#";
pub const FIXED_ROUTE_SK_PREFIX: &str = "FIXED_ROUTE#";
pub const COMMENT_SK_PREFIX: &str = "COMMENT#";

/// Sortable timestamp used inside sort keys
pub fn sort_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn tenant_pk(tenant: &Tenant) -> String {
    tenant.key_prefix()
}

pub fn quote_sk(quote_id: &str) -> String {
    format!("{}{}", QUOTE_SK_PREFIX, quote_id)
}

pub fn quote_status_pk(tenant: &Tenant, status: QuoteStatus) -> String {
    format!("{}#QUOTE#{}", tenant.key_prefix(), status)
}

pub fn booking_sk(booking_id: &str) -> String {
    format!("{}{}", BOOKING_SK_PREFIX, booking_id)
}

pub fn booking_status_pk(tenant: &Tenant, status: BookingStatus) -> String {
    format!("{}#BOOKING#{}", tenant.key_prefix(), status)
}

pub fn booking_day_pk(tenant: &Tenant, day_key: &str) -> String {
    format!("{}#BOOKING_DAY#{}", tenant.key_prefix(), day_key)
}

pub fn vehicle_sk(vehicle_type: VehicleType) -> String {
    format!("{}{}", VEHICLE_SK_PREFIX, vehicle_type)
}

pub fn fixed_route_sk(route_id: &str) -> String {
    format!("{}{}", FIXED_ROUTE_SK_PREFIX, route_id)
}

pub fn document_pk(tenant: &Tenant, document_id: &str) -> String {
    format!("{}#DOCUMENT#{}", tenant.key_prefix(), document_id)
}

pub fn comment_sk(created_at: DateTime<Utc>, comment_id: &str) -> String {
    format!("{}{}#{}", COMMENT_SK_PREFIX, sort_timestamp(created_at), comment_id)
}
