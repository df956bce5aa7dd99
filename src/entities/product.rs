use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StringList;

/// Product record as stored. The API returns it with the car populated, see
/// `services::products::ProductView`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[serde(rename = "_id")]
    pub id: Uuid,

    pub name: String,

    /// Description lines, rendered as bullet points
    #[sea_orm(column_type = "Json")]
    pub description: StringList,

    /// Category path; not enforced as a foreign key
    pub category: String,

    pub price: Decimal,
    pub offer_price: Decimal,

    /// Image URLs in display order
    #[sea_orm(column_type = "Json")]
    pub image: StringList,

    pub in_stock: bool,

    #[sea_orm(nullable)]
    #[serde(rename = "car")]
    pub car_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::car::Entity",
        from = "Column::CarId",
        to = "super::car::Column::Id",
        on_delete = "SetNull"
    )]
    Car,
}

impl Related<super::car::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Car.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
