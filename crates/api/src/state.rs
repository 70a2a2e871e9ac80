//! Shared application state.

use std::sync::Arc;

use common::{Clock, SystemClock};
use domain::{AppointmentService, CartService, InMemoryCatalog, InMemoryDirectory};
use event_store::EventStore;
use projections::ReadSide;
use scheduler::DeferredTasks;
use settlement::{InMemoryPaymentIntentService, SettlementEngine, StockLedger};

use crate::config::Config;

/// Services shared by every handler.
///
/// The directory and catalog are in-process stand-ins for the clinic's
/// people and medication records; the seeding routes write to them.
pub struct AppState<S: EventStore + Clone + 'static> {
    pub appointments: AppointmentService<S>,
    pub carts: CartService<S>,
    pub settlement: SettlementEngine<S>,
    pub read: ReadSide<S>,
    pub directory: InMemoryDirectory,
    pub catalog: InMemoryCatalog,
    pub payments: InMemoryPaymentIntentService,
}

impl<S: EventStore + Clone + 'static> AppState<S> {
    /// Wires every service over one event store using the wall clock.
    pub fn new(store: S, stock: Arc<dyn StockLedger>, config: &Config) -> Self {
        Self::with_clock(store, stock, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: S,
        stock: Arc<dyn StockLedger>,
        config: &Config,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let directory = InMemoryDirectory::new();
        let catalog = InMemoryCatalog::new();
        let payments = InMemoryPaymentIntentService::new();

        let appointments = AppointmentService::new(
            store.clone(),
            Arc::new(directory.clone()),
            clock.clone(),
            DeferredTasks::new(),
        )
        .with_purge_settings(config.purge_settings());

        let carts = CartService::new(store.clone(), Arc::new(catalog.clone()), clock.clone());

        let settlement = SettlementEngine::new(
            store.clone(),
            stock,
            Arc::new(payments.clone()),
            clock.clone(),
        );

        Self {
            appointments,
            carts,
            settlement,
            read: ReadSide::new(store, clock),
            directory,
            catalog,
            payments,
        }
    }
}
