use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub order_id: i64,
    pub pharmacy_product_id: i64,
    pub quantity: i32,
    pub price: Decimal,
    pub stock_taken: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::orders::Entity",
        from = "Column::OrderId",
        to = "super::orders::Column::Id"
    )]
    Orders,
    #[sea_orm(
        belongs_to = "super::pharmacy_products::Entity",
        from = "Column::PharmacyProductId",
        to = "super::pharmacy_products::Column::Id"
    )]
    PharmacyProducts,
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl Related<super::pharmacy_products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PharmacyProducts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
