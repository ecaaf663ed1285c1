//! Proxy unit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use watchstore::FleetRecord;

/// One ephemeral network-egress endpoint and its backing cloud service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyUnit {
    /// Region the backing service runs in
    pub region: String,

    /// Proxy endpoint, `scheme://ip:port`
    pub endpoint: String,

    /// Opaque cloud service identifier
    pub service_id: String,

    /// Public address resolved from the running network attachment
    pub public_address: String,

    /// When the unit was provisioned
    pub created_at: DateTime<Utc>,
}

impl ProxyUnit {
    /// Finalize a unit from a ready service
    pub fn new(
        region: impl Into<String>,
        service_id: impl Into<String>,
        public_address: impl Into<String>,
        proxy_port: u16,
        created_at: DateTime<Utc>,
    ) -> Self {
        let public_address = public_address.into();
        Self {
            region: region.into(),
            endpoint: format!("http://{public_address}:{proxy_port}"),
            service_id: service_id.into(),
            public_address,
            created_at,
        }
    }

    /// Unit identifier, derived from region and creation time
    pub fn id(&self) -> String {
        format!("{}-{}", self.region, self.created_at.timestamp_millis())
    }

    /// Rehydrate from a persisted record
    pub fn from_record(record: FleetRecord) -> Self {
        Self {
            region: record.region,
            endpoint: record.endpoint,
            service_id: record.service_id,
            public_address: record.public_address,
            created_at: record.created_at,
        }
    }

    /// Convert to the persisted record shape
    pub fn to_record(&self) -> FleetRecord {
        FleetRecord {
            endpoint: self.endpoint.clone(),
            region: self.region.clone(),
            service_id: self.service_id.clone(),
            public_address: self.public_address.clone(),
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_uses_public_address() {
        let unit = ProxyUnit::new("us-east-1", "svc-1", "203.0.113.9", 3128, Utc::now());
        assert_eq!(unit.endpoint, "http://203.0.113.9:3128");
        assert_eq!(unit.public_address, "203.0.113.9");
    }

    #[test]
    fn test_id_is_region_and_timestamp_derived() {
        let created = Utc::now();
        let unit = ProxyUnit::new("eu-west-1", "svc-2", "203.0.113.10", 3128, created);
        assert_eq!(unit.id(), format!("eu-west-1-{}", created.timestamp_millis()));
    }

    #[test]
    fn test_record_round_trip() {
        let unit = ProxyUnit::new("us-west-2", "svc-3", "203.0.113.11", 8080, Utc::now());
        let back = ProxyUnit::from_record(unit.to_record());
        assert_eq!(back, unit);
    }
}
