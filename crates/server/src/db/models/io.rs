/// 接口（端口）数据模型

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 设备接口
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ios")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub device_id: Option<Uuid>,
    pub native_network_id: Option<Uuid>,
    /// 物理连接的对端接口
    pub connected_to_io_id: Option<Uuid>,
    pub interface_name: String,
    pub interface_type: String,
    pub speed: Option<String>,
    pub trunk_mode: Option<String>, // access, trunk, hybrid, n/a
    pub status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::device::Entity",
        from = "Column::DeviceId",
        to = "super::device::Column::Id"
    )]
    Device,

    #[sea_orm(
        belongs_to = "super::network::Entity",
        from = "Column::NativeNetworkId",
        to = "super::network::Column::Id"
    )]
    NativeNetwork,
}

impl Related<super::device::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Device.def()
    }
}

impl Related<super::network::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::NativeNetwork.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
