pub mod allocation_service;
pub mod ip_address_service;
pub mod network_service;
pub mod topology_service;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use sea_orm::Value;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    use crate::db::models::{ip_address, network};

    /// `PaginatorTrait::count` 读取的结果行
    pub fn count_row(n: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("num_items", Value::from(n))])
    }

    pub fn network_model(cidr: &str) -> network::Model {
        let now = Utc::now();
        network::Model {
            id: Uuid::new_v4(),
            location_id: None,
            network_name: "office".to_string(),
            network_address: Some(cidr.to_string()),
            vlan_id: None,
            network_type: Some("lan".to_string()),
            gateway: None,
            dns_servers: None,
            dhcp_enabled: false,
            dhcp_range_start: None,
            dhcp_range_end: None,
            description: None,
            notes: None,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    pub fn ip_model(address: &str, network_id: Option<Uuid>) -> ip_address::Model {
        let now = Utc::now();
        ip_address::Model {
            id: Uuid::new_v4(),
            io_id: None,
            network_id,
            ip_address: address.to_string(),
            ip_version: Some("v4".to_string()),
            ip_type: Some("static".to_string()),
            dns_name: None,
            assignment_date: None,
            notes: None,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }
}
