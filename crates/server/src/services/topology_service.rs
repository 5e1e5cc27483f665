/// 网络拓扑服务

use chrono::Utc;
use common::topology::{build_topology, DeviceRecord, InterfaceRecord, TopologyFilter, TopologyGraph, TopologySource};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{ColumnTrait, Condition, EntityTrait, FromQueryResult, QueryFilter, QuerySelect};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::models::device::{Column as DeviceColumn, Entity as DeviceEntity};
use crate::db::models::io::{Column as IoColumn, Entity as IoEntity};
use crate::db::models::location::Entity as LocationEntity;
use crate::db::models::network::{Column as NetworkColumn, Entity as NetworkEntity};
use crate::error::AppResult;

#[derive(Debug, FromQueryResult)]
struct NetworkNameRow {
    id: Uuid,
    network_name: String,
}

#[derive(Debug, FromQueryResult)]
struct IoCountRow {
    device_id: Uuid,
    io_count: i64,
}

pub struct TopologyService {
    state: AppState,
}

impl TopologyService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// 构建网络拓扑图
    ///
    /// 读取所有参与物理连接的接口（声明了 connected_to 的一端及被指向的一端），
    /// 再批量读取相关设备、位置、网络名称和接口数量。
    pub async fn network_topology(&self, filter: TopologyFilter) -> AppResult<TopologyGraph> {
        let db = &self.state.sea_db();

        let targets = Query::select()
            .column(IoColumn::ConnectedToIoId)
            .from(IoEntity)
            .and_where(Expr::col(IoColumn::ConnectedToIoId).is_not_null())
            .to_owned();

        let ios = IoEntity::find()
            .filter(
                Condition::any()
                    .add(IoColumn::ConnectedToIoId.is_not_null())
                    .add(IoColumn::Id.in_subquery(targets)),
            )
            .all(db)
            .await?;

        if ios.is_empty() {
            debug!("没有任何接口连接，返回空拓扑");
            return Ok(TopologyGraph::empty(&filter, Utc::now()));
        }

        let device_ids: Vec<Uuid> = ios
            .iter()
            .filter_map(|io| io.device_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let network_ids: Vec<Uuid> = ios
            .iter()
            .filter_map(|io| io.native_network_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let devices_query = DeviceEntity::find()
            .find_also_related(LocationEntity)
            .filter(DeviceColumn::Id.is_in(device_ids.clone()))
            .all(db);
        let networks_query = NetworkEntity::find()
            .select_only()
            .column(NetworkColumn::Id)
            .column(NetworkColumn::NetworkName)
            .filter(NetworkColumn::Id.is_in(network_ids))
            .into_model::<NetworkNameRow>()
            .all(db);
        let counts_query = IoEntity::find()
            .select_only()
            .column(IoColumn::DeviceId)
            .column_as(Expr::col(IoColumn::Id).count(), "io_count")
            .filter(IoColumn::DeviceId.is_in(device_ids))
            .group_by(IoColumn::DeviceId)
            .into_model::<IoCountRow>()
            .all(db);

        let (devices, networks, counts) = futures::try_join!(devices_query, networks_query, counts_query)?;

        let network_names: HashMap<Uuid, String> =
            networks.into_iter().map(|n| (n.id, n.network_name)).collect();

        let source = TopologySource {
            devices: devices
                .into_iter()
                .map(|(device, location)| DeviceRecord {
                    id: device.id,
                    hostname: device.hostname,
                    device_type: device.device_type,
                    location_id: device.location_id,
                    location_name: location.map(|l| l.location_name),
                    status: device.status,
                })
                .collect(),
            interfaces: ios
                .into_iter()
                .map(|io| InterfaceRecord {
                    network_name: io.native_network_id.and_then(|id| network_names.get(&id).cloned()),
                    id: io.id,
                    device_id: io.device_id,
                    interface_name: io.interface_name,
                    interface_type: io.interface_type,
                    speed: io.speed,
                    trunk_mode: io.trunk_mode,
                    native_network_id: io.native_network_id,
                    connected_to: io.connected_to_io_id,
                })
                .collect(),
            io_counts: counts
                .into_iter()
                .map(|row| (row.device_id, row.io_count.max(0) as u64))
                .collect(),
        };

        let graph = build_topology(&source, &filter, Utc::now());
        info!(
            "拓扑图已生成: {} 个设备, {} 条连接",
            graph.metadata.total_devices, graph.metadata.total_connections
        );
        Ok(graph)
    }
}
