use async_trait::async_trait;
use aws_sdk_dynamodb::{types::AttributeValue, Client as DynamoClient};
use chrono::{DateTime, NaiveDate, Utc};

use super::items::{self, ConditionalWrite, Item};
use crate::keys;
use crate::{
    day_key, env_or_resource, next_booking_id, Booking, BookingId, BookingStatus, CustomerDetails,
    Quote, Tenant, TransferError, TransferResult,
};

/// Attempts at claiming a fresh booking ID before giving up
pub const MAX_ID_ATTEMPTS: usize = 5;

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub customer: CustomerDetails,
    pub notes: Option<String>,
    pub flight_number: Option<String>,
}

pub struct BookingService {
    client: DynamoClient,
    table_name: String,
    tenant: Tenant,
}

impl BookingService {
    pub fn new(client: DynamoClient, table_name: String, tenant: Tenant) -> Self {
        Self {
            client,
            table_name,
            tenant,
        }
    }

    pub fn from_env(client: DynamoClient) -> TransferResult<Self> {
        let table_name = env_or_resource("TABLE_NAME", "main")?;
        tracing::info!("BookingService initialized with table: {}", table_name);
        Ok(Self::new(client, table_name, Tenant::current()))
    }

    /// Booking for `quote` under `booking_id`, before it is stored
    pub fn build_booking(
        &self,
        booking_id: String,
        quote: &Quote,
        details: &NewBooking,
        now: DateTime<Utc>,
    ) -> Booking {
        Booking {
            booking_id,
            tenant_id: self.tenant.id.clone(),
            quote_id: quote.quote_id.clone(),
            customer: CustomerDetails {
                name: details.customer.name.trim().to_string(),
                email: details.customer.email.trim().to_lowercase(),
                phone: details.customer.phone.trim().to_string(),
            },
            pickup: quote.pickup.clone(),
            dropoff: quote.dropoff.clone(),
            pickup_time: quote.pickup_time,
            vehicle_type: quote.vehicle_type,
            passengers: quote.passengers,
            return_journey: quote.return_journey,
            total_pence: quote.fare.total_pence,
            notes: details
                .notes
                .as_ref()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            flight_number: details
                .flight_number
                .as_ref()
                .map(|f| f.trim().to_uppercase())
                .filter(|f| !f.is_empty()),
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// IDs already issued on `date`, from GSI2
    pub async fn booking_ids_for_day(&self, date: NaiveDate) -> TransferResult<Vec<String>> {
        let mut ids = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(keys::GSI2)
                .key_condition_expression("GSI2PK = :pk")
                .expression_attribute_values(
                    ":pk",
                    AttributeValue::S(keys::booking_day_pk(&self.tenant, &day_key(date))),
                )
                .projection_expression("booking_id")
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| TransferError::DynamoDBError(e.to_string()))?;

            for item in result.items.unwrap_or_default() {
                if let Some(id) = items::get_opt_s(&item, "booking_id") {
                    ids.push(id);
                }
            }

            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(ids)
    }

    /// Store a booking under the next free `DTC-{ddmmyy}{seq}` ID
    pub async fn create_booking(&self, quote: &Quote, details: &NewBooking) -> TransferResult<Booking> {
        details.customer.validate()?;

        let now = Utc::now();
        let booking = store_with_fresh_id(self, now.date_naive(), |booking_id| {
            self.build_booking(booking_id.to_string(), quote, details, now)
        })
        .await?;

        tracing::info!(
            "Created booking {} from quote {}",
            booking.booking_id,
            quote.quote_id
        );
        Ok(booking)
    }

    pub async fn get_booking(&self, booking_id: &str) -> TransferResult<Option<Booking>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(keys::PK, AttributeValue::S(keys::tenant_pk(&self.tenant)))
            .key(keys::SK, AttributeValue::S(keys::booking_sk(booking_id)))
            .send()
            .await
            .map_err(|e| TransferError::DynamoDBError(e.to_string()))?;

        result.item.as_ref().map(item_to_booking).transpose()
    }

    pub async fn require_booking(&self, booking_id: &str) -> TransferResult<Booking> {
        self.get_booking(booking_id)
            .await?
            .ok_or_else(|| TransferError::NotFound(format!("Booking {}", booking_id)))
    }

    /// Ordered by pickup time, via GSI1
    pub async fn list_bookings_by_status(&self, status: BookingStatus) -> TransferResult<Vec<Booking>> {
        self.query_bookings(
            keys::GSI1,
            "GSI1PK = :pk",
            keys::booking_status_pk(&self.tenant, status),
        )
        .await
    }

    /// Bookings created on `date`, in ID order, via GSI2
    pub async fn list_bookings_for_day(&self, date: NaiveDate) -> TransferResult<Vec<Booking>> {
        self.query_bookings(
            keys::GSI2,
            "GSI2PK = :pk",
            keys::booking_day_pk(&self.tenant, &day_key(date)),
        )
        .await
    }

    async fn query_bookings(
        &self,
        index: &str,
        condition: &str,
        partition: String,
    ) -> TransferResult<Vec<Booking>> {
        let mut bookings = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(index)
                .key_condition_expression(condition)
                .expression_attribute_values(":pk", AttributeValue::S(partition.clone()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| TransferError::DynamoDBError(e.to_string()))?;

            for item in result.items.unwrap_or_default() {
                bookings.push(item_to_booking(&item)?);
            }

            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(bookings)
    }

    pub async fn transition_booking(
        &self,
        booking_id: &str,
        to: BookingStatus,
    ) -> TransferResult<Booking> {
        let mut booking = self.require_booking(booking_id).await?;

        if !booking.status.can_transition_to(to) {
            return Err(TransferError::InvalidTransition {
                from: booking.status.to_string(),
                to: to.to_string(),
            });
        }

        let now = Utc::now();
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key(keys::PK, AttributeValue::S(keys::tenant_pk(&self.tenant)))
            .key(keys::SK, AttributeValue::S(keys::booking_sk(booking_id)))
            .update_expression("SET #status = :to, GSI1PK = :gsi1pk, updated_at = :now")
            .condition_expression("#status = :expected")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":to", AttributeValue::S(to.to_string()))
            .expression_attribute_values(
                ":gsi1pk",
                AttributeValue::S(keys::booking_status_pk(&self.tenant, to)),
            )
            .expression_attribute_values(":now", AttributeValue::S(now.to_rfc3339()))
            .expression_attribute_values(
                ":expected",
                AttributeValue::S(booking.status.to_string()),
            )
            .send()
            .await;

        let outcome = ConditionalWrite::from_result(result);
        if outcome == ConditionalWrite::ConditionFailed {
            tracing::warn!("Booking {} changed during transition to {}", booking_id, to);
        }
        outcome.or_conflict(|| format!("Booking {} was modified concurrently", booking_id))?;

        tracing::info!("Booking {} moved {} -> {}", booking_id, booking.status, to);
        booking.status = to;
        booking.updated_at = now;
        Ok(booking)
    }
}

#[async_trait]
impl BookingLedger for BookingService {
    async fn issued_ids(&self, date: NaiveDate) -> TransferResult<Vec<String>> {
        self.booking_ids_for_day(date).await
    }

    async fn insert_new(&self, booking: &Booking) -> TransferResult<bool> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(booking_to_item(&self.tenant, booking)))
            .condition_expression("attribute_not_exists(SK)")
            .send()
            .await;

        match ConditionalWrite::from_result(result) {
            ConditionalWrite::Applied => Ok(true),
            ConditionalWrite::ConditionFailed => Ok(false),
            ConditionalWrite::Failed(e) => Err(TransferError::DynamoDBError(e)),
        }
    }
}

/// Where booking IDs are issued and claimed
#[async_trait]
pub trait BookingLedger: Send + Sync {
    /// IDs already issued on `date`. May lag behind recent writes.
    async fn issued_ids(&self, date: NaiveDate) -> TransferResult<Vec<String>>;

    /// Store `booking` unless its ID is taken; `Ok(false)` when it is
    async fn insert_new(&self, booking: &Booking) -> TransferResult<bool>;
}

/// Claim the next free ID for `date` and store the booking `build` makes for it.
///
/// A concurrent writer can take our candidate, and the issued-ID listing may
/// not show that write yet, so each retry starts past the ID that just lost.
pub async fn store_with_fresh_id<F>(
    ledger: &dyn BookingLedger,
    date: NaiveDate,
    mut build: F,
) -> TransferResult<Booking>
where
    F: FnMut(BookingId) -> Booking + Send,
{
    let mut lost: Option<BookingId> = None;

    for attempt in 1..=MAX_ID_ATTEMPTS {
        let issued = ledger.issued_ids(date).await?;
        let mut candidate = next_booking_id(date, issued.iter().map(String::as_str))?;
        if let Some(lost) = lost {
            candidate = candidate.max(lost.successor()?);
        }

        let booking = build(candidate);
        if ledger.insert_new(&booking).await? {
            return Ok(booking);
        }

        tracing::warn!(
            "Booking ID {} already taken, retrying ({}/{})",
            candidate,
            attempt,
            MAX_ID_ATTEMPTS
        );
        lost = Some(candidate);
    }

    Err(TransferError::Conflict(format!(
        "Could not allocate a booking ID after {} attempts",
        MAX_ID_ATTEMPTS
    )))
}

pub fn booking_to_item(tenant: &Tenant, booking: &Booking) -> Item {
    let mut item = Item::new();
    items::put_s(&mut item, keys::PK, keys::tenant_pk(tenant));
    items::put_s(&mut item, keys::SK, keys::booking_sk(&booking.booking_id));
    items::put_s(&mut item, keys::GSI1PK, keys::booking_status_pk(tenant, booking.status));
    items::put_s(&mut item, keys::GSI1SK, keys::sort_timestamp(booking.pickup_time));
    items::put_s(
        &mut item,
        keys::GSI2PK,
        keys::booking_day_pk(tenant, &day_key(booking.created_at.date_naive())),
    );
    items::put_s(&mut item, keys::GSI2SK, booking.booking_id.clone());
    items::put_s(&mut item, "entity_type", "BOOKING");

    items::put_s(&mut item, "booking_id", booking.booking_id.clone());
    items::put_s(&mut item, "tenant_id", booking.tenant_id.clone());
    items::put_s(&mut item, "quote_id", booking.quote_id.clone());
    items::put_s(&mut item, "customer_name", booking.customer.name.clone());
    items::put_s(&mut item, "customer_email", booking.customer.email.clone());
    items::put_s(&mut item, "customer_phone", booking.customer.phone.clone());
    items::put_s(&mut item, "pickup", booking.pickup.clone());
    items::put_s(&mut item, "dropoff", booking.dropoff.clone());
    items::put_s(&mut item, "pickup_time", booking.pickup_time.to_rfc3339());
    items::put_s(&mut item, "vehicle_type", booking.vehicle_type.to_string());
    items::put_n(&mut item, "passengers", booking.passengers);
    items::put_bool(&mut item, "return_journey", booking.return_journey);
    items::put_n(&mut item, "total_pence", booking.total_pence);
    items::put_opt_s(&mut item, "notes", booking.notes.as_ref());
    items::put_opt_s(&mut item, "flight_number", booking.flight_number.as_ref());
    items::put_s(&mut item, "status", booking.status.to_string());
    items::put_s(&mut item, "created_at", booking.created_at.to_rfc3339());
    items::put_s(&mut item, "updated_at", booking.updated_at.to_rfc3339());

    item
}

pub fn item_to_booking(item: &Item) -> TransferResult<Booking> {
    Ok(Booking {
        booking_id: items::get_s(item, "booking_id")?,
        tenant_id: items::get_s(item, "tenant_id")?,
        quote_id: items::get_s(item, "quote_id")?,
        customer: CustomerDetails {
            name: items::get_s(item, "customer_name")?,
            email: items::get_s(item, "customer_email")?,
            phone: items::get_s(item, "customer_phone")?,
        },
        pickup: items::get_s(item, "pickup")?,
        dropoff: items::get_s(item, "dropoff")?,
        pickup_time: items::get_datetime(item, "pickup_time")?,
        vehicle_type: items::get_parsed(item, "vehicle_type")?,
        passengers: items::get_n(item, "passengers")?,
        return_journey: items::get_bool(item, "return_journey")?,
        total_pence: items::get_n(item, "total_pence")?,
        notes: items::get_opt_s(item, "notes"),
        flight_number: items::get_opt_s(item, "flight_number"),
        status: items::get_parsed(item, "status")?,
        created_at: items::get_datetime(item, "created_at")?,
        updated_at: items::get_datetime(item, "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::dynamo_client;
    use crate::{default_rates, quote_all, JourneyMetrics, QuoteStatus};
    use chrono::{Duration, TimeZone};
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn quote() -> Quote {
        let fare = quote_all(
            JourneyMetrics {
                distance_meters: 40000.0,
                duration_seconds: 2700.0,
            },
            &default_rates(),
            &[],
            "Dartford",
            "Heathrow T5",
            true,
            2,
        )
        .unwrap()
        .remove(0);
        let now = Utc::now();
        Quote {
            quote_id: "q-1".to_string(),
            tenant_id: "001".to_string(),
            pickup: "Dartford".to_string(),
            dropoff: "Heathrow T5".to_string(),
            pickup_time: now + Duration::days(3),
            vehicle_type: fare.vehicle_type,
            passengers: 2,
            return_journey: true,
            fare,
            customer_email: None,
            status: QuoteStatus::Accepted,
            created_at: now,
            updated_at: now,
            expires_at: now + Duration::hours(72),
        }
    }

    fn details() -> NewBooking {
        NewBooking {
            customer: CustomerDetails {
                name: "  Sam Rider ".to_string(),
                email: "Sam.Rider@Example.com".to_string(),
                phone: "07700 900123".to_string(),
            },
            notes: Some("   ".to_string()),
            flight_number: Some(" ba123 ".to_string()),
        }
    }

    #[test]
    fn test_build_booking_copies_quote_and_normalizes_customer() {
        let service = BookingService::new(dynamo_client(), "t".to_string(), Tenant::current());
        let quote = quote();
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let booking = service.build_booking("DTC-181026001".to_string(), &quote, &details(), now);

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.total_pence, quote.fare.total_pence);
        assert!(booking.return_journey);
        assert_eq!(booking.customer.name, "Sam Rider");
        assert_eq!(booking.customer.email, "sam.rider@example.com");
        assert_eq!(booking.notes, None);
        assert_eq!(booking.flight_number.as_deref(), Some("BA123"));
    }

    #[test]
    fn test_booking_item_keys_and_round_trip() {
        let service = BookingService::new(dynamo_client(), "t".to_string(), Tenant::current());
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let booking = service.build_booking("DTC-181026004".to_string(), &quote(), &details(), now);
        let item = booking_to_item(&Tenant::current(), &booking);

        assert_eq!(items::get_s(&item, keys::SK).unwrap(), "BOOKING#DTC-181026004");
        assert_eq!(
            items::get_s(&item, keys::GSI1PK).unwrap(),
            "TENANT#001#BOOKING#PENDING"
        );
        assert_eq!(
            items::get_s(&item, keys::GSI2PK).unwrap(),
            "TENANT#001#BOOKING_DAY#181026"
        );

        let parsed = item_to_booking(&item).unwrap();
        assert_eq!(parsed.booking_id, booking.booking_id);
        assert_eq!(parsed.customer, booking.customer);
        assert_eq!(parsed.flight_number, booking.flight_number);
        assert_eq!(parsed.vehicle_type, booking.vehicle_type);
    }

    /// Ledger whose issued-ID listing never catches up with writes
    struct StaleLedger {
        listed: Vec<String>,
        taken: Mutex<HashSet<String>>,
        attempts: Mutex<Vec<String>>,
    }

    impl StaleLedger {
        fn new(listed: &[&str], taken: &[&str]) -> Self {
            Self {
                listed: listed.iter().map(|id| id.to_string()).collect(),
                taken: Mutex::new(taken.iter().map(|id| id.to_string()).collect()),
                attempts: Mutex::new(Vec::new()),
            }
        }

        fn attempts(&self) -> Vec<String> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BookingLedger for StaleLedger {
        async fn issued_ids(&self, _date: NaiveDate) -> TransferResult<Vec<String>> {
            Ok(self.listed.clone())
        }

        async fn insert_new(&self, booking: &Booking) -> TransferResult<bool> {
            self.attempts.lock().unwrap().push(booking.booking_id.clone());
            Ok(self.taken.lock().unwrap().insert(booking.booking_id.clone()))
        }
    }

    struct BrokenLedger;

    #[async_trait]
    impl BookingLedger for BrokenLedger {
        async fn issued_ids(&self, _date: NaiveDate) -> TransferResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn insert_new(&self, _booking: &Booking) -> TransferResult<bool> {
            Err(TransferError::DynamoDBError("throttled".to_string()))
        }
    }

    async fn store(ledger: &dyn BookingLedger) -> TransferResult<Booking> {
        let service = BookingService::new(dynamo_client(), "t".to_string(), Tenant::current());
        let quote = quote();
        let details = details();
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();

        store_with_fresh_id(ledger, now.date_naive(), |id| {
            service.build_booking(id.to_string(), &quote, &details, now)
        })
        .await
    }

    #[tokio::test]
    async fn test_first_booking_of_the_day_gets_001() {
        let ledger = StaleLedger::new(&[], &[]);
        assert_eq!(store(&ledger).await.unwrap().booking_id, "DTC-181026001");
    }

    #[tokio::test]
    async fn test_lost_id_carries_forward_past_stale_listing() {
        let listed = ["DTC-181026004", "DTC-181026005"];
        let ledger = StaleLedger::new(&listed, &["DTC-181026006", "DTC-181026007"]);

        let booking = store(&ledger).await.unwrap();
        assert_eq!(booking.booking_id, "DTC-181026008");
        assert_eq!(
            ledger.attempts(),
            vec!["DTC-181026006", "DTC-181026007", "DTC-181026008"]
        );
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let taken: Vec<String> = (1..=MAX_ID_ATTEMPTS)
            .map(|seq| format!("DTC-181026{:03}", seq))
            .collect();
        let taken: Vec<&str> = taken.iter().map(String::as_str).collect();
        let ledger = StaleLedger::new(&[], &taken);

        let err = store(&ledger).await.unwrap_err();
        assert!(matches!(err, TransferError::Conflict(_)));
        assert_eq!(ledger.attempts().len(), MAX_ID_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_storage_failure_is_not_retried() {
        let err = store(&BrokenLedger).await.unwrap_err();
        assert!(matches!(err, TransferError::DynamoDBError(_)));
    }
}
