use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "pharmacies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub pharmacy_manager_id: i64,
    pub name: String,
    pub pharmacist_name: String,
    pub operational_hours: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::pharmacy_products::Entity")]
    PharmacyProducts,
    #[sea_orm(has_many = "super::orders::Entity")]
    Orders,
}

impl Related<super::pharmacy_products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PharmacyProducts.def()
    }
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
