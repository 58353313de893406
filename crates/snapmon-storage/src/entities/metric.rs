use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "metric")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    #[sea_orm(column_type = "Double")]
    pub value: f64,
    pub unit: String,
    pub snapshot_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::metric_snapshot::Entity",
        from = "Column::SnapshotId",
        to = "super::metric_snapshot::Column::Id",
        on_delete = "Cascade"
    )]
    MetricSnapshot,
}

impl Related<super::metric_snapshot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MetricSnapshot.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
