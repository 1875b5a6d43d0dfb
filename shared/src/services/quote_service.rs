use aws_sdk_dynamodb::{types::AttributeValue, Client as DynamoClient};
use chrono::{Duration, Utc};

use super::items::{self, ConditionalWrite, Item};
use crate::keys;
use crate::{
    env_or_resource, generate_id, FareBreakdown, Quote, QuoteStatus, Tenant, TransferError,
    TransferResult, VehicleType, DEFAULT_QUOTE_TTL_HOURS,
};

/// Everything needed to store a freshly priced quote
#[derive(Debug, Clone)]
pub struct NewQuote {
    pub pickup: String,
    pub dropoff: String,
    pub pickup_time: chrono::DateTime<Utc>,
    pub vehicle_type: VehicleType,
    pub passengers: u8,
    pub return_journey: bool,
    pub fare: FareBreakdown,
    pub customer_email: Option<String>,
}

pub struct QuoteService {
    client: DynamoClient,
    table_name: String,
    tenant: Tenant,
    ttl_hours: i64,
}

impl QuoteService {
    pub fn new(client: DynamoClient, table_name: String, tenant: Tenant) -> Self {
        Self {
            client,
            table_name,
            tenant,
            ttl_hours: DEFAULT_QUOTE_TTL_HOURS,
        }
    }

    pub fn with_ttl_hours(mut self, ttl_hours: i64) -> Self {
        self.ttl_hours = ttl_hours;
        self
    }

    /// Table from TABLE_NAME, quote lifetime from QUOTE_TTL_HOURS
    pub fn from_env(client: DynamoClient) -> TransferResult<Self> {
        let table_name = env_or_resource("TABLE_NAME", "main")?;
        let ttl_hours = std::env::var("QUOTE_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|h: &i64| *h > 0)
            .unwrap_or(DEFAULT_QUOTE_TTL_HOURS);

        tracing::info!("QuoteService initialized with table: {}, ttl: {}h", table_name, ttl_hours);
        Ok(Self::new(client, table_name, Tenant::current()).with_ttl_hours(ttl_hours))
    }

    pub fn build_quote(&self, new_quote: NewQuote) -> Quote {
        let now = Utc::now();
        Quote {
            quote_id: generate_id(),
            tenant_id: self.tenant.id.clone(),
            pickup: new_quote.pickup,
            dropoff: new_quote.dropoff,
            pickup_time: new_quote.pickup_time,
            vehicle_type: new_quote.vehicle_type,
            passengers: new_quote.passengers,
            return_journey: new_quote.return_journey,
            fare: new_quote.fare,
            customer_email: new_quote.customer_email,
            status: QuoteStatus::Pending,
            created_at: now,
            updated_at: now,
            expires_at: now + Duration::hours(self.ttl_hours),
        }
    }

    pub async fn create_quote(&self, new_quote: NewQuote) -> TransferResult<Quote> {
        let quote = self.build_quote(new_quote);
        let item = quote_to_item(&self.tenant, &quote)?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(SK)")
            .send()
            .await
            .map_err(|e| TransferError::DynamoDBError(e.to_string()))?;

        tracing::info!(
            "Stored quote {} for {} ({})",
            quote.quote_id,
            quote.vehicle_type,
            quote.fare.display_total
        );
        Ok(quote)
    }

    pub async fn get_quote(&self, quote_id: &str) -> TransferResult<Option<Quote>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(keys::PK, AttributeValue::S(keys::tenant_pk(&self.tenant)))
            .key(keys::SK, AttributeValue::S(keys::quote_sk(quote_id)))
            .send()
            .await
            .map_err(|e| TransferError::DynamoDBError(e.to_string()))?;

        result.item.as_ref().map(item_to_quote).transpose()
    }

    pub async fn require_quote(&self, quote_id: &str) -> TransferResult<Quote> {
        self.get_quote(quote_id)
            .await?
            .ok_or_else(|| TransferError::NotFound(format!("Quote {}", quote_id)))
    }

    /// Newest first, via GSI1
    pub async fn list_quotes_by_status(&self, status: QuoteStatus) -> TransferResult<Vec<Quote>> {
        let mut quotes = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(keys::GSI1)
                .key_condition_expression("GSI1PK = :pk")
                .expression_attribute_values(
                    ":pk",
                    AttributeValue::S(keys::quote_status_pk(&self.tenant, status)),
                )
                .scan_index_forward(false)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| TransferError::DynamoDBError(e.to_string()))?;

            for item in result.items.unwrap_or_default() {
                quotes.push(item_to_quote(&item)?);
            }

            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(quotes)
    }

    /// Apply a state machine transition with a conditional write so a
    /// concurrent change to the same quote is reported, not overwritten
    pub async fn transition_quote(&self, quote_id: &str, to: QuoteStatus) -> TransferResult<Quote> {
        let mut quote = self.require_quote(quote_id).await?;
        let now = Utc::now();
        let current = quote.effective_status(now);

        if !current.can_transition_to(to) {
            return Err(TransferError::InvalidTransition {
                from: current.to_string(),
                to: to.to_string(),
            });
        }

        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key(keys::PK, AttributeValue::S(keys::tenant_pk(&self.tenant)))
            .key(keys::SK, AttributeValue::S(keys::quote_sk(quote_id)))
            .update_expression("SET #status = :to, GSI1PK = :gsi1pk, updated_at = :now")
            .condition_expression("#status = :expected")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":to", AttributeValue::S(to.to_string()))
            .expression_attribute_values(
                ":gsi1pk",
                AttributeValue::S(keys::quote_status_pk(&self.tenant, to)),
            )
            .expression_attribute_values(":now", AttributeValue::S(now.to_rfc3339()))
            .expression_attribute_values(":expected", AttributeValue::S(quote.status.to_string()))
            .send()
            .await;

        let outcome = ConditionalWrite::from_result(result);
        if outcome == ConditionalWrite::ConditionFailed {
            tracing::warn!("Quote {} changed during transition to {}", quote_id, to);
        }
        outcome.or_conflict(|| format!("Quote {} was modified concurrently", quote_id))?;

        tracing::info!("Quote {} moved {} -> {}", quote_id, current, to);
        quote.status = to;
        quote.updated_at = now;
        Ok(quote)
    }
}

pub fn quote_to_item(tenant: &Tenant, quote: &Quote) -> TransferResult<Item> {
    let mut item = Item::new();
    items::put_s(&mut item, keys::PK, keys::tenant_pk(tenant));
    items::put_s(&mut item, keys::SK, keys::quote_sk(&quote.quote_id));
    items::put_s(&mut item, keys::GSI1PK, keys::quote_status_pk(tenant, quote.status));
    items::put_s(&mut item, keys::GSI1SK, keys::sort_timestamp(quote.created_at));
    items::put_s(&mut item, "entity_type", "QUOTE");

    items::put_s(&mut item, "quote_id", quote.quote_id.clone());
    items::put_s(&mut item, "tenant_id", quote.tenant_id.clone());
    items::put_s(&mut item, "pickup", quote.pickup.clone());
    items::put_s(&mut item, "dropoff", quote.dropoff.clone());
    items::put_s(&mut item, "pickup_time", quote.pickup_time.to_rfc3339());
    items::put_s(&mut item, "vehicle_type", quote.vehicle_type.to_string());
    items::put_n(&mut item, "passengers", quote.passengers);
    items::put_bool(&mut item, "return_journey", quote.return_journey);
    items::put_json(&mut item, "fare", &quote.fare)?;
    items::put_n(&mut item, "total_pence", quote.fare.total_pence);
    items::put_opt_s(&mut item, "customer_email", quote.customer_email.as_ref());
    items::put_s(&mut item, "status", quote.status.to_string());
    items::put_s(&mut item, "created_at", quote.created_at.to_rfc3339());
    items::put_s(&mut item, "updated_at", quote.updated_at.to_rfc3339());
    items::put_s(&mut item, "expires_at", quote.expires_at.to_rfc3339());
    items::put_n(&mut item, "ttl", quote.ttl());

    Ok(item)
}

pub fn item_to_quote(item: &Item) -> TransferResult<Quote> {
    Ok(Quote {
        quote_id: items::get_s(item, "quote_id")?,
        tenant_id: items::get_s(item, "tenant_id")?,
        pickup: items::get_s(item, "pickup")?,
        dropoff: items::get_s(item, "dropoff")?,
        pickup_time: items::get_datetime(item, "pickup_time")?,
        vehicle_type: items::get_parsed(item, "vehicle_type")?,
        passengers: items::get_n(item, "passengers")?,
        return_journey: items::get_bool(item, "return_journey")?,
        fare: items::get_json(item, "fare")?,
        customer_email: items::get_opt_s(item, "customer_email"),
        status: items::get_parsed(item, "status")?,
        created_at: items::get_datetime(item, "created_at")?,
        updated_at: items::get_datetime(item, "updated_at")?,
        expires_at: items::get_datetime(item, "expires_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::dynamo_client as test_client;
    use crate::{calculate_fare, default_rates, FareRequest, JourneyMetrics};

    fn new_quote() -> NewQuote {
        let rate = default_rates().remove(0);
        let fare = calculate_fare(
            &FareRequest {
                pickup: "Dartford".to_string(),
                dropoff: "Bluewater".to_string(),
                vehicle_type: rate.vehicle_type,
                metrics: JourneyMetrics {
                    distance_meters: 8000.0,
                    duration_seconds: 900.0,
                },
                return_journey: false,
                passengers: 1,
            },
            &rate,
            &[],
        )
        .unwrap();

        NewQuote {
            pickup: "Dartford".to_string(),
            dropoff: "Bluewater".to_string(),
            pickup_time: Utc::now() + Duration::days(2),
            vehicle_type: rate.vehicle_type,
            passengers: 1,
            return_journey: false,
            fare,
            customer_email: Some("rider@example.com".to_string()),
        }
    }

    #[test]
    fn test_build_quote_sets_pending_and_expiry() {
        let service = QuoteService::new(test_client(), "transfers-test-main".to_string(), Tenant::current())
            .with_ttl_hours(24);
        let quote = service.build_quote(new_quote());

        assert_eq!(quote.status, QuoteStatus::Pending);
        assert_eq!(quote.tenant_id, "001");
        assert_eq!((quote.expires_at - quote.created_at).num_hours(), 24);
        assert_eq!(quote.ttl(), (quote.expires_at + Duration::days(7)).timestamp());
    }

    #[test]
    fn test_quote_item_conversion() {
        let service = QuoteService::new(test_client(), "t".to_string(), Tenant::current());
        let quote = service.build_quote(new_quote());
        let item = quote_to_item(&Tenant::current(), &quote).unwrap();

        assert_eq!(items::get_s(&item, keys::PK).unwrap(), "TENANT#001");
        assert_eq!(items::get_s(&item, keys::SK).unwrap(), format!("QUOTE#{}", quote.quote_id));
        assert_eq!(items::get_s(&item, keys::GSI1PK).unwrap(), "TENANT#001#QUOTE#PENDING");

        let parsed = item_to_quote(&item).unwrap();
        assert_eq!(parsed.quote_id, quote.quote_id);
        assert_eq!(parsed.fare, quote.fare);
        assert_eq!(parsed.status, QuoteStatus::Pending);
        assert_eq!(parsed.customer_email.as_deref(), Some("rider@example.com"));
    }

    #[test]
    fn test_effective_status_reports_expiry() {
        let service = QuoteService::new(test_client(), "t".to_string(), Tenant::current());
        let mut quote = service.build_quote(new_quote());
        let later = quote.expires_at + Duration::minutes(1);

        assert_eq!(quote.effective_status(Utc::now()), QuoteStatus::Pending);
        assert_eq!(quote.effective_status(later), QuoteStatus::Expired);
        assert!(!quote.is_bookable(later));

        quote.status = QuoteStatus::Booked;
        assert_eq!(quote.effective_status(later), QuoteStatus::Booked);
    }
}
