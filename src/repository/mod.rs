//! SQL access. Functions generic over `ConnectionTrait` run on whatever
//! executor the caller holds: the pooled connection or an open transaction.
//! Read-model queries that never join a unit of work take the sqlx pool.

pub mod accounts;
pub mod cart_items;
pub mod geo;
pub mod orders;
pub mod pharmacies;
pub mod pharmacy_products;
pub mod stock_histories;
pub mod stock_transfers;

/// SQL fragment for the buyer point, using binds `$1` (longitude) and `$2` (latitude).
pub(crate) const BUYER_POINT: &str = "ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography";
