//! Built-in routers

use contracts::{ChangeNotificationRecord, ContractError, OutboundRoute, Router, StageConfig};

use super::is_older_than;

/// Routes every record to one configured route
#[derive(Debug, Clone)]
pub struct StaticRouter {
    route: OutboundRoute,
}

impl StaticRouter {
    pub fn new(route: OutboundRoute) -> Self {
        Self { route }
    }

    pub fn from_config(config: &StageConfig) -> Result<Self, ContractError> {
        Ok(Self::new(config.route("route")?))
    }
}

impl Router for StaticRouter {
    fn route(&self, _record: &ChangeNotificationRecord) -> Result<OutboundRoute, ContractError> {
        Ok(self.route.clone())
    }
}

/// Routes on the value of one bin
///
/// `bin == value` goes to `match-route`, anything else (including a
/// missing bin) to `default-route`.
#[derive(Debug, Clone)]
pub struct BinValueRouter {
    bin: String,
    value: String,
    match_route: OutboundRoute,
    default_route: OutboundRoute,
}

impl BinValueRouter {
    pub fn new(
        bin: impl Into<String>,
        value: impl Into<String>,
        match_route: OutboundRoute,
        default_route: OutboundRoute,
    ) -> Self {
        Self {
            bin: bin.into(),
            value: value.into(),
            match_route,
            default_route,
        }
    }

    pub fn from_config(config: &StageConfig) -> Result<Self, ContractError> {
        Ok(Self::new(
            config.require_str("bin")?,
            config.require_str("value")?,
            config.route("match-route")?,
            config.route("default-route")?,
        ))
    }
}

impl Router for BinValueRouter {
    fn route(&self, record: &ChangeNotificationRecord) -> Result<OutboundRoute, ContractError> {
        let matched = record
            .bin(&self.bin)
            .is_some_and(|v| v.to_display_string() == self.value);
        Ok(if matched {
            self.match_route.clone()
        } else {
            self.default_route.clone()
        })
    }
}

/// Splits records by generation
#[derive(Debug, Clone)]
pub struct GenerationRouter {
    gen_number: u64,
    old_route: OutboundRoute,
    young_route: OutboundRoute,
}

impl GenerationRouter {
    pub fn from_config(config: &StageConfig) -> Result<Self, ContractError> {
        Ok(Self {
            gen_number: config.require_u64("gen-number")?,
            old_route: config.route("old-route")?,
            young_route: config.route("young-route")?,
        })
    }
}

impl Router for GenerationRouter {
    fn route(&self, record: &ChangeNotificationRecord) -> Result<OutboundRoute, ContractError> {
        Ok(if is_older_than(record.generation(), self.gen_number) {
            self.old_route.clone()
        } else {
            self.young_route.clone()
        })
    }
}

/// Skips records above a generation threshold
#[derive(Debug, Clone)]
pub struct GenerationSkipRouter {
    gen_number: u64,
    route: OutboundRoute,
}

impl GenerationSkipRouter {
    pub fn from_config(config: &StageConfig) -> Result<Self, ContractError> {
        Ok(Self {
            gen_number: config.require_u64("gen-number")?,
            route: config.route("route")?,
        })
    }
}

impl Router for GenerationSkipRouter {
    fn route(&self, record: &ChangeNotificationRecord) -> Result<OutboundRoute, ContractError> {
        Ok(if is_older_than(record.generation(), self.gen_number) {
            OutboundRoute::skip()
        } else {
            self.route.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        BinValue, ChangeNotificationMetadata, DestinationKind, Digest, Key, Operation, RouteType,
    };
    use serde_json::{json, Value};

    fn config(destination: DestinationKind, params: Value) -> StageConfig {
        let Value::Object(params) = params else {
            panic!("params must be an object");
        };
        StageConfig::new(destination, params)
    }

    fn record(region: &str, generation: Option<u32>) -> ChangeNotificationRecord {
        let key = Key::new("test", None, Digest::new([0u8; 20]));
        let mut metadata = ChangeNotificationMetadata::new(key, Operation::Write);
        metadata.generation = generation;
        ChangeNotificationRecord::new(metadata, [("region", BinValue::from(region))])
    }

    #[test]
    fn test_bin_value_router_region_scenario() {
        let router = BinValueRouter::from_config(&config(
            DestinationKind::Esp,
            json!({
                "bin": "region",
                "value": "internal",
                "match-route": "internal",
                "default-route": "external"
            }),
        ))
        .unwrap();

        let internal = router.route(&record("internal", None)).unwrap();
        assert_eq!(internal.route_type, RouteType::Other);
        assert_eq!(internal.name(), "internal");

        let west = router.route(&record("west", None)).unwrap();
        assert_eq!(west, OutboundRoute::esp("external"));
    }

    #[test]
    fn test_generation_router() {
        let router = GenerationRouter::from_config(&config(
            DestinationKind::Kafka,
            json!({"gen-number": 5, "old-route": "old", "young-route": "young"}),
        ))
        .unwrap();

        assert_eq!(router.route(&record("x", Some(6))).unwrap().name(), "old");
        assert_eq!(router.route(&record("x", Some(5))).unwrap().name(), "young");
        assert_eq!(router.route(&record("x", None)).unwrap().name(), "young");
    }

    #[test]
    fn test_generation_skip_router() {
        let router = GenerationSkipRouter::from_config(&config(
            DestinationKind::Kafka,
            json!({"gen-number": 1, "route": "t"}),
        ))
        .unwrap();

        assert!(router.route(&record("x", Some(2))).unwrap().is_skip());
        assert!(!router.route(&record("x", Some(1))).unwrap().is_skip());
    }

    #[test]
    fn test_missing_params_fail_construction() {
        let err = StaticRouter::from_config(&config(DestinationKind::Kafka, json!({})))
            .unwrap_err()
            .to_string();
        assert!(err.contains("params.route"), "got: {err}");

        let err = GenerationRouter::from_config(&config(
            DestinationKind::Kafka,
            json!({"gen-number": "five", "old-route": "a", "young-route": "b"}),
        ))
        .unwrap_err()
        .to_string();
        assert!(err.contains("non-negative integer"), "got: {err}");
    }
}
