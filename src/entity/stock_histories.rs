use sea_orm::entity::prelude::*;

/// Append-only stock ledger. Rows are inserted, never updated.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "stock_histories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub pharmacy_product_id: i64,
    pub pharmacy_id: i64,
    pub quantity: i32,
    pub description: String,
    pub created_at: DateTimeWithTimeZone,
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pharmacy_products::Entity",
        from = "Column::PharmacyProductId",
        to = "super::pharmacy_products::Column::Id"
    )]
    PharmacyProducts,
}

impl Related<super::pharmacy_products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PharmacyProducts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
