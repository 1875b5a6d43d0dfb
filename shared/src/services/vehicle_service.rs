use aws_sdk_dynamodb::{types::AttributeValue, Client as DynamoClient};

use super::items::{self, Item};
use crate::keys;
use crate::{
    default_rates, env_or_resource, FixedRoute, Tenant, TransferError, TransferResult,
    VehicleRate,
};

pub struct VehicleService {
    client: DynamoClient,
    table_name: String,
    tenant: Tenant,
}

impl VehicleService {
    pub fn new(client: DynamoClient, table_name: String, tenant: Tenant) -> Self {
        Self {
            client,
            table_name,
            tenant,
        }
    }

    pub fn from_env(client: DynamoClient) -> TransferResult<Self> {
        let table_name = env_or_resource("TABLE_NAME", "main")?;
        tracing::info!("VehicleService initialized with table: {}", table_name);
        Ok(Self::new(client, table_name, Tenant::current()))
    }

    async fn query_prefix(&self, prefix: &str) -> TransferResult<Vec<Item>> {
        let mut found = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("PK = :pk AND begins_with(SK, :prefix)")
                .expression_attribute_values(":pk", AttributeValue::S(keys::tenant_pk(&self.tenant)))
                .expression_attribute_values(":prefix", AttributeValue::S(prefix.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| TransferError::DynamoDBError(e.to_string()))?;

            found.extend(result.items.unwrap_or_default());

            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(found)
    }

    /// Stored rate card, or the built-in defaults when nothing is stored yet
    pub async fn list_rates(&self) -> TransferResult<Vec<VehicleRate>> {
        let stored = self
            .query_prefix(keys::VEHICLE_SK_PREFIX)
            .await?
            .iter()
            .map(item_to_rate)
            .collect::<TransferResult<Vec<_>>>()?;

        Ok(stored_or_defaults(stored))
    }

    pub async fn put_rate(&self, rate: &VehicleRate) -> TransferResult<()> {
        rate.validate()?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(rate_to_item(&self.tenant, rate)))
            .send()
            .await
            .map_err(|e| TransferError::DynamoDBError(e.to_string()))?;

        tracing::info!("Updated rate for {}", rate.vehicle_type);
        Ok(())
    }

    pub async fn list_fixed_routes(&self) -> TransferResult<Vec<FixedRoute>> {
        let mut routes = self
            .query_prefix(keys::FIXED_ROUTE_SK_PREFIX)
            .await?
            .iter()
            .map(item_to_fixed_route)
            .collect::<TransferResult<Vec<_>>>()?;
        // Route matching is first-wins, so keep a stable order
        routes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(routes)
    }

    pub async fn put_fixed_route(&self, route: &FixedRoute) -> TransferResult<()> {
        route.validate()?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(fixed_route_to_item(&self.tenant, route)?))
            .send()
            .await
            .map_err(|e| TransferError::DynamoDBError(e.to_string()))?;

        tracing::info!("Stored fixed route {}", route.id);
        Ok(())
    }

    pub async fn delete_fixed_route(&self, route_id: &str) -> TransferResult<()> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key(keys::PK, AttributeValue::S(keys::tenant_pk(&self.tenant)))
            .key(keys::SK, AttributeValue::S(keys::fixed_route_sk(route_id)))
            .condition_expression("attribute_exists(SK)")
            .send()
            .await;

        match result {
            Ok(_) => {
                tracing::info!("Deleted fixed route {}", route_id);
                Ok(())
            }
            Err(e) if items::is_conditional_check_failure(&e) => {
                Err(TransferError::NotFound(format!("Fixed route {}", route_id)))
            }
            Err(e) => Err(TransferError::DynamoDBError(e.to_string())),
        }
    }
}

/// The stored rate card as-is; the built-in catalogue only when nothing is stored
pub fn stored_or_defaults(mut stored: Vec<VehicleRate>) -> Vec<VehicleRate> {
    if stored.is_empty() {
        stored = default_rates();
    }
    stored.sort_by_key(|rate| rate.vehicle_type);
    stored
}

pub fn rate_to_item(tenant: &Tenant, rate: &VehicleRate) -> Item {
    let mut item = Item::new();
    items::put_s(&mut item, keys::PK, keys::tenant_pk(tenant));
    items::put_s(&mut item, keys::SK, keys::vehicle_sk(rate.vehicle_type));
    items::put_s(&mut item, "entity_type", "VEHICLE");
    items::put_s(&mut item, "vehicle_type", rate.vehicle_type.to_string());
    items::put_s(&mut item, "display_name", rate.display_name.clone());
    items::put_n(&mut item, "base_fare_pence", rate.base_fare_pence);
    items::put_n(&mut item, "per_mile_pence", rate.per_mile_pence);
    items::put_n(&mut item, "per_minute_pence", rate.per_minute_pence);
    items::put_n(&mut item, "minimum_fare_pence", rate.minimum_fare_pence);
    items::put_n(&mut item, "max_passengers", rate.max_passengers);
    items::put_n(&mut item, "max_luggage", rate.max_luggage);
    item
}

pub fn item_to_rate(item: &Item) -> TransferResult<VehicleRate> {
    Ok(VehicleRate {
        vehicle_type: items::get_parsed(item, "vehicle_type")?,
        display_name: items::get_s(item, "display_name")?,
        base_fare_pence: items::get_n(item, "base_fare_pence")?,
        per_mile_pence: items::get_n(item, "per_mile_pence")?,
        per_minute_pence: items::get_n(item, "per_minute_pence")?,
        minimum_fare_pence: items::get_n(item, "minimum_fare_pence")?,
        max_passengers: items::get_n(item, "max_passengers")?,
        max_luggage: items::get_n(item, "max_luggage")?,
    })
}

pub fn fixed_route_to_item(tenant: &Tenant, route: &FixedRoute) -> TransferResult<Item> {
    let mut item = Item::new();
    items::put_s(&mut item, keys::PK, keys::tenant_pk(tenant));
    items::put_s(&mut item, keys::SK, keys::fixed_route_sk(&route.id));
    items::put_s(&mut item, "entity_type", "FIXED_ROUTE");
    items::put_s(&mut item, "route_id", route.id.clone());
    items::put_s(&mut item, "from_area", route.from_area.clone());
    items::put_s(&mut item, "to_area", route.to_area.clone());
    items::put_bool(&mut item, "bidirectional", route.bidirectional);
    items::put_json(&mut item, "prices", &route.prices)?;
    Ok(item)
}

pub fn item_to_fixed_route(item: &Item) -> TransferResult<FixedRoute> {
    Ok(FixedRoute {
        id: items::get_s(item, "route_id")?,
        from_area: items::get_s(item, "from_area")?,
        to_area: items::get_s(item, "to_area")?,
        bidirectional: items::get_bool(item, "bidirectional").unwrap_or(false),
        prices: items::get_json(item, "prices")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VehicleType;
    use std::collections::HashMap;

    #[test]
    fn test_stored_rates_replace_catalogue() {
        let mut custom = default_rates().remove(0);
        custom.per_mile_pence = 999;
        let rates = stored_or_defaults(vec![custom.clone()]);

        // Vehicles without a stored rate are not offered
        assert_eq!(rates, vec![custom]);
    }

    #[test]
    fn test_stored_rates_sorted_by_vehicle() {
        let mut stored = default_rates();
        stored.reverse();
        stored.truncate(2);
        let rates = stored_or_defaults(stored);

        assert_eq!(rates.len(), 2);
        assert!(rates[0].vehicle_type < rates[1].vehicle_type);
    }

    #[test]
    fn test_no_stored_rates_is_defaults() {
        assert_eq!(stored_or_defaults(Vec::new()), {
            let mut d = default_rates();
            d.sort_by_key(|r| r.vehicle_type);
            d
        });
    }

    #[test]
    fn test_rate_item_round_trip() {
        let rate = default_rates().remove(3);
        let item = rate_to_item(&Tenant::current(), &rate);
        assert_eq!(items::get_s(&item, keys::SK).unwrap(), "VEHICLE#people-carrier");
        assert_eq!(item_to_rate(&item).unwrap(), rate);
    }

    #[test]
    fn test_fixed_route_item_round_trip() {
        let mut prices = HashMap::new();
        prices.insert(VehicleType::Saloon, 5500);
        prices.insert(VehicleType::Minibus, 11000);
        let route = FixedRoute {
            id: "dartford-lhr".to_string(),
            from_area: "Dartford".to_string(),
            to_area: "Heathrow".to_string(),
            bidirectional: true,
            prices,
        };
        let item = fixed_route_to_item(&Tenant::current(), &route).unwrap();
        assert_eq!(item_to_fixed_route(&item).unwrap(), route);
    }
}
