use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "stock_transfer_requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub pharmacy_sender_id: i64,
    pub pharmacy_receiver_id: i64,
    pub product_id: i64,
    pub mutation_status_id: i64,
    pub quantity: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
