/// 网络拓扑图构建
///
/// 输入为设备与接口记录，输出供前端可视化的节点/边图。
/// 接口的 connected_to 指针视为无向物理链路：同一对接口无论单向还是双向记录，
/// 都只生成一条边。

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use tracing::debug;
use uuid::Uuid;

use crate::models::TopologyNodeStatus;

/// 设备邻居展开的最大跳数
pub const MAX_NEIGHBOR_DEPTH: u8 = 3;

/// 设备记录
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub id: Uuid,
    pub hostname: Option<String>,
    pub device_type: String,
    pub location_id: Option<Uuid>,
    pub location_name: Option<String>,
    pub status: String,
}

/// 接口记录
#[derive(Debug, Clone)]
pub struct InterfaceRecord {
    pub id: Uuid,
    pub device_id: Option<Uuid>,
    pub interface_name: String,
    pub interface_type: String,
    pub speed: Option<String>,
    pub trunk_mode: Option<String>,
    pub native_network_id: Option<Uuid>,
    pub network_name: Option<String>,
    pub connected_to: Option<Uuid>,
}

/// 构图所需的全部数据
#[derive(Debug, Clone, Default)]
pub struct TopologySource {
    pub devices: Vec<DeviceRecord>,
    pub interfaces: Vec<InterfaceRecord>,
    /// 每台设备的接口总数，缺省时按 `interfaces` 中的记录计数
    pub io_counts: HashMap<Uuid, u64>,
}

/// 过滤条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologyFilter {
    pub location_id: Option<Uuid>,
    pub device_id: Option<Uuid>,
    pub network_id: Option<Uuid>,
    /// 指定设备时的邻居展开跳数 (1-3)
    pub depth: u8,
}

impl Default for TopologyFilter {
    fn default() -> Self {
        Self {
            location_id: None,
            device_id: None,
            network_id: None,
            depth: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopologyNode {
    pub id: Uuid,
    pub label: String,
    pub device_type: String,
    pub location_id: Option<Uuid>,
    pub location_name: Option<String>,
    pub io_count: u64,
    pub status: TopologyNodeStatus,
    pub connection_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopologyEdge {
    pub id: Uuid,
    pub source: Uuid,
    pub target: Uuid,
    pub label: String,
    pub interface_type: String,
    pub speed: Option<String>,
    pub source_io_id: Uuid,
    pub target_io_id: Uuid,
    pub trunk_mode: Option<String>,
    pub native_network_id: Option<Uuid>,
    pub network_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopologyMetadata {
    pub total_devices: usize,
    pub total_connections: usize,
    pub location_id: Option<Uuid>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopologyGraph {
    pub nodes: Vec<TopologyNode>,
    pub edges: Vec<TopologyEdge>,
    pub metadata: TopologyMetadata,
}

impl TopologyGraph {
    pub fn empty(filter: &TopologyFilter, generated_at: DateTime<Utc>) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            metadata: TopologyMetadata {
                total_devices: 0,
                total_connections: 0,
                location_id: filter.location_id,
                generated_at,
            },
        }
    }
}

/// 一条物理链路，source 为声明 connected_to 的一端
#[derive(Debug, Clone, Copy)]
struct Link<'a> {
    source: &'a InterfaceRecord,
    target: &'a InterfaceRecord,
    source_device: Uuid,
    target_device: Uuid,
}

/// 从接口指针中提取去重后的链路
///
/// 跳过自环指针、悬空指针以及任一端不属于已知设备的接口。
/// 两端互相指向时保留 id 较小一端声明的那条。
fn collect_links<'a>(
    interfaces: &'a [InterfaceRecord],
    devices: &HashMap<Uuid, &'a DeviceRecord>,
) -> Vec<Link<'a>> {
    let by_id: HashMap<Uuid, &InterfaceRecord> = interfaces.iter().map(|i| (i.id, i)).collect();

    let mut ordered: Vec<&InterfaceRecord> = interfaces.iter().collect();
    ordered.sort_by_key(|i| i.id);

    let mut links: BTreeMap<(Uuid, Uuid), Link<'a>> = BTreeMap::new();
    for iface in ordered {
        let Some(peer_id) = iface.connected_to else {
            continue;
        };
        if peer_id == iface.id {
            continue;
        }
        let Some(peer) = by_id.get(&peer_id).copied() else {
            debug!("接口 {} 指向不存在的接口 {}", iface.id, peer_id);
            continue;
        };
        let (Some(source_device), Some(target_device)) = (iface.device_id, peer.device_id) else {
            continue;
        };
        if !devices.contains_key(&source_device) || !devices.contains_key(&target_device) {
            continue;
        }

        let key = (iface.id.min(peer_id), iface.id.max(peer_id));
        links.entry(key).or_insert(Link {
            source: iface,
            target: peer,
            source_device,
            target_device,
        });
    }

    links.into_values().collect()
}

/// 从 root 出发，在 depth 跳以内可达的设备（包含 root 自身）
fn neighborhood(root: Uuid, links: &[Link<'_>], depth: u8) -> HashSet<Uuid> {
    let mut adjacency: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for link in links {
        adjacency.entry(link.source_device).or_default().push(link.target_device);
        adjacency.entry(link.target_device).or_default().push(link.source_device);
    }

    let mut reached = HashSet::from([root]);
    let mut queue = VecDeque::from([(root, 0u8)]);

    while let Some((device, distance)) = queue.pop_front() {
        if distance >= depth {
            continue;
        }
        for neighbor in adjacency.get(&device).into_iter().flatten() {
            if reached.insert(*neighbor) {
                queue.push_back((*neighbor, distance + 1));
            }
        }
    }

    reached
}

/// 构建拓扑图
pub fn build_topology(
    source: &TopologySource,
    filter: &TopologyFilter,
    generated_at: DateTime<Utc>,
) -> TopologyGraph {
    let devices: HashMap<Uuid, &DeviceRecord> = source.devices.iter().map(|d| (d.id, d)).collect();
    let links = collect_links(&source.interfaces, &devices);

    // 位置与网络条件作用在接口上，链路任一端满足即保留
    let endpoint_matches = |iface: &InterfaceRecord| {
        let location_ok = filter.location_id.map_or(true, |location| {
            iface
                .device_id
                .and_then(|id| devices.get(&id))
                .and_then(|device| device.location_id)
                == Some(location)
        });
        let network_ok = filter
            .network_id
            .map_or(true, |network| iface.native_network_id == Some(network));
        location_ok && network_ok
    };

    // 邻域按完整链路计算，位置与网络条件只决定最终保留哪些链路
    let reached = filter
        .device_id
        .map(|root| neighborhood(root, &links, filter.depth.clamp(1, MAX_NEIGHBOR_DEPTH)));

    let kept: Vec<Link<'_>> = links
        .into_iter()
        .filter(|link| endpoint_matches(link.source) || endpoint_matches(link.target))
        .filter(|link| {
            reached.as_ref().map_or(true, |reached| {
                reached.contains(&link.source_device) && reached.contains(&link.target_device)
            })
        })
        .collect();

    if kept.is_empty() {
        return TopologyGraph::empty(filter, generated_at);
    }

    let mut connection_counts: HashMap<Uuid, u64> = HashMap::new();
    for link in &kept {
        *connection_counts.entry(link.source_device).or_default() += 1;
        if link.target_device != link.source_device {
            *connection_counts.entry(link.target_device).or_default() += 1;
        }
    }

    let mut nodes: Vec<TopologyNode> = connection_counts
        .iter()
        .filter_map(|(id, connections)| {
            let device = devices.get(id)?;
            let io_count = source.io_counts.get(id).copied().unwrap_or_else(|| {
                source.interfaces.iter().filter(|i| i.device_id == Some(*id)).count() as u64
            });
            Some(TopologyNode {
                id: *id,
                label: device
                    .hostname
                    .clone()
                    .unwrap_or_else(|| "Unknown Device".to_string()),
                device_type: device.device_type.clone(),
                location_id: device.location_id,
                location_name: device.location_name.clone(),
                io_count,
                status: TopologyNodeStatus::from(device.status.as_str()),
                connection_count: *connections,
            })
        })
        .collect();
    nodes.sort_by(|a, b| a.label.cmp(&b.label).then(a.id.cmp(&b.id)));

    let edges: Vec<TopologyEdge> = kept
        .iter()
        .map(|link| TopologyEdge {
            id: link.source.id,
            source: link.source_device,
            target: link.target_device,
            label: format!("{} <-> {}", link.source.interface_name, link.target.interface_name),
            interface_type: link.source.interface_type.clone(),
            speed: link.source.speed.clone(),
            source_io_id: link.source.id,
            target_io_id: link.target.id,
            trunk_mode: link.source.trunk_mode.clone(),
            native_network_id: link.source.native_network_id,
            network_name: link.source.network_name.clone(),
        })
        .collect();

    TopologyGraph {
        metadata: TopologyMetadata {
            total_devices: nodes.len(),
            total_connections: edges.len(),
            location_id: filter.location_id,
            generated_at,
        },
        nodes,
        edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn device(n: u128, location: Option<u128>) -> DeviceRecord {
        DeviceRecord {
            id: id(n),
            hostname: Some(format!("dev-{}", n)),
            device_type: "switch".to_string(),
            location_id: location.map(id),
            location_name: location.map(|l| format!("loc-{}", l)),
            status: "active".to_string(),
        }
    }

    fn iface(n: u128, device: u128, connected_to: Option<u128>) -> InterfaceRecord {
        InterfaceRecord {
            id: id(n),
            device_id: Some(id(device)),
            interface_name: format!("eth{}", n),
            interface_type: "ethernet".to_string(),
            speed: Some("1G".to_string()),
            trunk_mode: None,
            native_network_id: None,
            network_name: None,
            connected_to: connected_to.map(id),
        }
    }

    /// 链式拓扑: 设备 1 - 2 - 3 - 4
    fn chain() -> TopologySource {
        TopologySource {
            devices: vec![device(1, None), device(2, None), device(3, None), device(4, None)],
            interfaces: vec![
                iface(101, 1, Some(201)),
                iface(201, 2, None),
                iface(202, 2, Some(301)),
                iface(301, 3, None),
                iface(302, 3, Some(401)),
                iface(401, 4, None),
            ],
            io_counts: HashMap::new(),
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_empty_source() {
        let graph = build_topology(&TopologySource::default(), &TopologyFilter::default(), now());
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());
        assert_eq!(graph.metadata.total_devices, 0);
        assert_eq!(graph.metadata.total_connections, 0);
        assert_eq!(graph.metadata.generated_at, now());
    }

    #[test]
    fn test_single_direction_link() {
        let source = TopologySource {
            devices: vec![device(1, None), device(2, None)],
            interfaces: vec![iface(10, 1, Some(20)), iface(20, 2, None)],
            io_counts: HashMap::new(),
        };
        let graph = build_topology(&source, &TopologyFilter::default(), now());

        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
        let edge = &graph.edges[0];
        assert_eq!(edge.source, id(1));
        assert_eq!(edge.target, id(2));
        assert_eq!(edge.label, "eth10 <-> eth20");
        assert_eq!(edge.source_io_id, id(10));
        assert_eq!(edge.target_io_id, id(20));
    }

    #[test]
    fn test_mirrored_link_collapses() {
        let source = TopologySource {
            devices: vec![device(1, None), device(2, None)],
            interfaces: vec![iface(20, 2, Some(10)), iface(10, 1, Some(20))],
            io_counts: HashMap::new(),
        };
        let graph = build_topology(&source, &TopologyFilter::default(), now());

        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].source_io_id, id(10));
        assert!(graph.nodes.iter().all(|n| n.connection_count == 1));
    }

    #[test]
    fn test_skips_broken_pointers() {
        let mut orphan = iface(40, 9, None);
        orphan.device_id = None;
        let source = TopologySource {
            devices: vec![device(1, None), device(2, None)],
            interfaces: vec![
                iface(10, 1, Some(10)),
                iface(11, 1, Some(999)),
                iface(12, 1, Some(40)),
                orphan,
                iface(13, 1, Some(30)),
                iface(30, 7, None),
            ],
            io_counts: HashMap::new(),
        };
        let graph = build_topology(&source, &TopologyFilter::default(), now());
        assert!(graph.edges.is_empty());
        assert!(graph.nodes.is_empty());
    }

    #[test]
    fn test_location_filter() {
        let source = TopologySource {
            devices: vec![device(1, Some(50)), device(2, Some(60)), device(3, Some(60)), device(4, Some(60))],
            interfaces: vec![
                iface(10, 1, Some(20)),
                iface(20, 2, None),
                iface(30, 3, Some(40)),
                iface(40, 4, None),
            ],
            io_counts: HashMap::new(),
        };
        let filter = TopologyFilter {
            location_id: Some(id(50)),
            ..Default::default()
        };
        let graph = build_topology(&source, &filter, now());

        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.metadata.location_id, Some(id(50)));
        assert_eq!(graph.nodes[0].location_name.as_deref(), Some("loc-50"));
    }

    #[test]
    fn test_network_filter() {
        let mut source = chain();
        source.interfaces[2].native_network_id = Some(id(77));
        source.interfaces[2].network_name = Some("core".to_string());
        let filter = TopologyFilter {
            network_id: Some(id(77)),
            ..Default::default()
        };
        let graph = build_topology(&source, &filter, now());

        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].network_name.as_deref(), Some("core"));
        assert_eq!(graph.edges[0].source, id(2));
        assert_eq!(graph.edges[0].target, id(3));
    }

    #[test]
    fn test_device_filter_depth() {
        let source = chain();

        let filter = TopologyFilter {
            device_id: Some(id(1)),
            ..Default::default()
        };
        let graph = build_topology(&source, &filter, now());
        let nodes: Vec<Uuid> = graph.nodes.iter().map(|n| n.id).collect();
        assert_eq!(nodes, vec![id(1), id(2)]);
        assert_eq!(graph.edges.len(), 1);

        let filter = TopologyFilter {
            device_id: Some(id(2)),
            depth: 2,
            ..Default::default()
        };
        let graph = build_topology(&source, &filter, now());
        assert_eq!(graph.nodes.len(), 4);
        assert_eq!(graph.edges.len(), 3);

        let filter = TopologyFilter {
            device_id: Some(id(99)),
            ..Default::default()
        };
        assert!(build_topology(&source, &filter, now()).nodes.is_empty());
    }

    #[test]
    fn test_device_filter_crosses_other_locations() {
        // 1(A) - 2(B) - 3(B) - 4(A)，2-3 链路两端都不在 A
        let mut source = chain();
        source.devices = vec![device(1, Some(50)), device(2, Some(60)), device(3, Some(60)), device(4, Some(50))];
        let filter = TopologyFilter {
            location_id: Some(id(50)),
            device_id: Some(id(1)),
            depth: 3,
            ..Default::default()
        };
        let graph = build_topology(&source, &filter, now());

        let mut edges: Vec<(Uuid, Uuid)> = graph.edges.iter().map(|e| (e.source, e.target)).collect();
        edges.sort();
        assert_eq!(edges, vec![(id(1), id(2)), (id(3), id(4))]);
        assert_eq!(graph.nodes.len(), 4);

        let filter = TopologyFilter {
            depth: 2,
            ..filter
        };
        let graph = build_topology(&source, &filter, now());
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].target, id(2));
    }

    #[test]
    fn test_node_counts() {
        let mut source = chain();
        source.io_counts.insert(id(2), 48);
        let graph = build_topology(&source, &TopologyFilter::default(), now());

        let node = |n: u128| graph.nodes.iter().find(|node| node.id == id(n)).unwrap();
        assert_eq!(node(1).connection_count, 1);
        assert_eq!(node(2).connection_count, 2);
        assert_eq!(node(2).io_count, 48);
        assert_eq!(node(3).io_count, 2);
        assert_eq!(node(1).status, TopologyNodeStatus::Active);
        assert_eq!(node(1).label, "dev-1");
        assert_eq!(graph.metadata.total_devices, 4);
        assert_eq!(graph.metadata.total_connections, 3);
    }
}
