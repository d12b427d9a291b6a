use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    AdminAlertEvent,
    EventHandler,
    EventProducer,
    Handler,
    LowStockEvent,
    OrderAnnulledEvent,
    OrderPaidEvent,
    TopupAnnulledEvent,
    TopupPaidEvent,
};

/// The set of producers handed to the API layer. Publishing to an event type with no registered hook is a
/// no-op, since the producer vector is simply empty.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_paid_producer: Vec<EventProducer<OrderPaidEvent>>,
    pub order_annulled_producer: Vec<EventProducer<OrderAnnulledEvent>>,
    pub topup_paid_producer: Vec<EventProducer<TopupPaidEvent>>,
    pub topup_annulled_producer: Vec<EventProducer<TopupAnnulledEvent>>,
    pub low_stock_producer: Vec<EventProducer<LowStockEvent>>,
    pub admin_alert_producer: Vec<EventProducer<AdminAlertEvent>>,
}

pub struct EventHandlers {
    pub on_order_paid: Option<EventHandler<OrderPaidEvent>>,
    pub on_order_annulled: Option<EventHandler<OrderAnnulledEvent>>,
    pub on_topup_paid: Option<EventHandler<TopupPaidEvent>>,
    pub on_topup_annulled: Option<EventHandler<TopupAnnulledEvent>>,
    pub on_low_stock: Option<EventHandler<LowStockEvent>>,
    pub on_admin_alert: Option<EventHandler<AdminAlertEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_paid = hooks.on_order_paid.map(|f| EventHandler::new(buffer_size, f));
        let on_order_annulled = hooks.on_order_annulled.map(|f| EventHandler::new(buffer_size, f));
        let on_topup_paid = hooks.on_topup_paid.map(|f| EventHandler::new(buffer_size, f));
        let on_topup_annulled = hooks.on_topup_annulled.map(|f| EventHandler::new(buffer_size, f));
        let on_low_stock = hooks.on_low_stock.map(|f| EventHandler::new(buffer_size, f));
        let on_admin_alert = hooks.on_admin_alert.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_paid, on_order_annulled, on_topup_paid, on_topup_annulled, on_low_stock, on_admin_alert }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_paid {
            result.order_paid_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_annulled {
            result.order_annulled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_topup_paid {
            result.topup_paid_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_topup_annulled {
            result.topup_annulled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_low_stock {
            result.low_stock_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_admin_alert {
            result.admin_alert_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_paid {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_order_annulled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_topup_paid {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_topup_annulled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_low_stock {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_admin_alert {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_paid: Option<Handler<OrderPaidEvent>>,
    pub on_order_annulled: Option<Handler<OrderAnnulledEvent>>,
    pub on_topup_paid: Option<Handler<TopupPaidEvent>>,
    pub on_topup_annulled: Option<Handler<TopupAnnulledEvent>>,
    pub on_low_stock: Option<Handler<LowStockEvent>>,
    pub on_admin_alert: Option<Handler<AdminAlertEvent>>,
}

impl EventHooks {
    pub fn on_order_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderPaidEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_paid = Some(Arc::new(f));
        self
    }

    pub fn on_order_annulled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderAnnulledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_annulled = Some(Arc::new(f));
        self
    }

    pub fn on_topup_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(TopupPaidEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_topup_paid = Some(Arc::new(f));
        self
    }

    pub fn on_topup_annulled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(TopupAnnulledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_topup_annulled = Some(Arc::new(f));
        self
    }

    pub fn on_low_stock<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(LowStockEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_low_stock = Some(Arc::new(f));
        self
    }

    pub fn on_admin_alert<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(AdminAlertEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_admin_alert = Some(Arc::new(f));
        self
    }
}
