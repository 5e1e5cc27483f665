/// 接口与 VLAN 标记网络的关联表

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "io_tagged_networks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub io_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub network_id: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::io::Entity",
        from = "Column::IoId",
        to = "super::io::Column::Id"
    )]
    Io,

    #[sea_orm(
        belongs_to = "super::network::Entity",
        from = "Column::NetworkId",
        to = "super::network::Column::Id"
    )]
    Network,
}

impl ActiveModelBehavior for ActiveModel {}
