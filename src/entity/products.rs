use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub generic_name: String,
    pub content: String,
    pub weight: Decimal,
    pub height: Decimal,
    pub length: Decimal,
    pub width: Decimal,
    pub selling_unit: String,
    pub pack_size: String,
    pub picture_url: Option<String>,
    pub slug: String,
    pub product_form_id: Option<i64>,
    pub product_classification_id: Option<i64>,
    pub manufacture_id: Option<i64>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::pharmacy_products::Entity")]
    PharmacyProducts,
}

impl Related<super::pharmacy_products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PharmacyProducts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
