use std::sync::Arc;

use crate::{
    carrier::ShippingCarrier,
    chat::ChatHub,
    config::AppConfig,
    db::{DbPool, OrmConn},
    storage::FileUploader,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub uploader: Arc<dyn FileUploader>,
    pub carrier: Arc<dyn ShippingCarrier>,
    pub chat: ChatHub,
}
