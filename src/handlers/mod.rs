use std::sync::Arc;

use crate::{
    auth::AuthService,
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    logging,
    services::{
        backup::BackupService,
        notifier::{NotifierConfig, SupplierNotifier},
        order_number::OrderNumberAllocator,
        orders::OrderService,
        quotes::QuoteService,
        suppliers::SupplierService,
    },
};

pub mod admin;
pub mod auth;
pub mod orders;
pub mod portal;
pub mod quotes;
pub mod suppliers;

/// Aggregated services shared by all HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub quotes: Arc<QuoteService>,
    pub suppliers: Arc<SupplierService>,
    pub notifier: Arc<SupplierNotifier>,
    pub auth: Arc<AuthService>,
    pub backup: Arc<BackupService>,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        let allocator = OrderNumberAllocator::from_config(config);
        let base_logger = logging::setup_logger(logging::LoggerConfig::default());

        Self {
            orders: Arc::new(OrderService::new(
                db.clone(),
                allocator,
                Some(event_sender.clone()),
            )),
            quotes: Arc::new(QuoteService::new(db.clone(), Some(event_sender.clone()))),
            suppliers: Arc::new(SupplierService::new(db.clone(), Some(event_sender))),
            notifier: Arc::new(SupplierNotifier::new(
                NotifierConfig::from(config),
                config.public_base_url.clone(),
                base_logger,
            )),
            auth: Arc::new(AuthService::new(&config.jwt_secret, config.jwt_expiration)),
            backup: Arc::new(BackupService::new(config)),
        }
    }
}
