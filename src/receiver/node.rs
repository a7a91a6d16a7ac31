use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::backoff::{BackoffConfig, BackoffController};
use crate::broker::{Broker, BrokerError, Delivery, PollingSource};
use crate::context::MessagingContext;
use crate::dispatch::{DispatchStats, Dispatcher, DispatcherHandle, HandlerError};
use crate::hooks::HookRegistry;
use crate::message::{AnyMessage, Message, TypeRegistry};

type MessageHandler = dyn Fn(&dyn AnyMessage) -> Result<(), HandlerError> + Send + Sync;

struct Route {
    contract: &'static str,
    handler: Arc<MessageHandler>,
}

/// Listens on one endpoint and runs the handlers whose contract a delivered
/// message satisfies.
///
/// ```ignore
/// let node = context.receiver(&config, broker.clone(), "billing");
/// node.handle::<OrderPlaced, _>(|order| charge(order))?;
/// node.start();
/// // ...
/// let stats = node.stop();
/// ```
///
/// Each delivery is decoded through the context's type registry, reported to
/// the hooks with `message_received`, then handed to every matching handler.
/// A decode failure or a failing handler aborts the delivery so the broker
/// redelivers it.
pub struct ReceiverNode {
    endpoint: String,
    broker: Arc<dyn Broker>,
    types: Arc<TypeRegistry>,
    hooks: HookRegistry,
    routes: Arc<RwLock<Vec<Route>>>,
    source: Arc<PollingSource>,
    dispatcher: Mutex<Option<DispatcherHandle<PollingSource>>>,
    max_in_flight: usize,
}

impl ReceiverNode {
    pub fn new(context: &MessagingContext, broker: Arc<dyn Broker>, endpoint: &str) -> Self {
        let backoff = Arc::new(BackoffController::new(BackoffConfig::default()));
        Self {
            endpoint: endpoint.to_string(),
            source: Arc::new(PollingSource::new(Arc::clone(&broker), endpoint, backoff)),
            broker,
            types: Arc::clone(context.types()),
            hooks: context.hooks().clone(),
            routes: Arc::new(RwLock::new(Vec::new())),
            dispatcher: Mutex::new(None),
            max_in_flight: 1,
        }
    }

    /// Replace the polling backoff. Bindings recorded so far are kept.
    pub fn with_backoff(mut self, config: BackoffConfig) -> Self {
        let source = PollingSource::new(
            Arc::clone(&self.broker),
            self.endpoint.clone(),
            Arc::new(BackoffController::new(config)),
        );
        for message_type in self.source.bound_types() {
            source.add_message_type(&message_type);
        }
        self.source = Arc::new(source);
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn source(&self) -> &Arc<PollingSource> {
        &self.source
    }

    /// Handle messages of type `M`. Registers `M` for decoding, records the
    /// binding for rebuilds and declares it on the broker.
    pub fn handle<M, F>(&self, handler: F) -> Result<(), BrokerError>
    where
        M: Message,
        F: Fn(&M) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.types.register::<M>();
        self.bind(
            M::TYPE_NAME,
            Arc::new(move |message: &dyn AnyMessage| match message.downcast_ref::<M>() {
                Some(message) => handler(message),
                None => Err(HandlerError::failed(format!(
                    "expected {}, got {}",
                    M::TYPE_NAME,
                    message.type_name()
                ))),
            }),
        )
    }

    /// Handle every message that declares `contract` among its supertypes.
    /// The message types themselves must be registered with the context.
    pub fn handle_contract<F>(&self, contract: &'static str, handler: F) -> Result<(), BrokerError>
    where
        F: Fn(&dyn AnyMessage) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.bind(contract, Arc::new(handler))
    }

    fn bind(&self, contract: &'static str, handler: Arc<MessageHandler>) -> Result<(), BrokerError> {
        self.source.add_message_type(contract);
        self.broker.create_destination(contract, &self.endpoint)?;
        self.routes.write().push(Route { contract, handler });
        debug!(endpoint = %self.endpoint, contract, "handler bound");
        Ok(())
    }

    /// Start polling. Calling it while running does nothing.
    pub fn start(&self) {
        let mut dispatcher = self.dispatcher.lock();
        if dispatcher.is_some() {
            return;
        }

        let types = Arc::clone(&self.types);
        let hooks = self.hooks.clone();
        let routes = Arc::clone(&self.routes);
        let endpoint = self.endpoint.clone();

        let handle = Dispatcher::new(Arc::clone(&self.source), move |delivery: &Delivery| {
            deliver(&types, &hooks, &routes, &endpoint, delivery)
        })
        .with_max_in_flight(self.max_in_flight)
        .with_name(format!("receiver-{}", self.endpoint))
        .start();

        info!(endpoint = %self.endpoint, workers = self.max_in_flight, "receiver started");
        *dispatcher = Some(handle);
    }

    pub fn is_running(&self) -> bool {
        self.dispatcher.lock().is_some()
    }

    /// Stop polling and wait for in-flight handlers.
    pub fn stop(&self) -> DispatchStats {
        match self.dispatcher.lock().take() {
            Some(handle) => handle.stop(),
            None => DispatchStats::default(),
        }
    }
}

impl Drop for ReceiverNode {
    fn drop(&mut self) {
        if let Some(handle) = self.dispatcher.get_mut().take() {
            handle.stop();
        }
    }
}

fn deliver(
    types: &TypeRegistry,
    hooks: &HookRegistry,
    routes: &RwLock<Vec<Route>>,
    endpoint: &str,
    delivery: &Delivery,
) -> Result<(), HandlerError> {
    let message = types.decode(&delivery.envelope)?;
    hooks.notify_received(&*message, endpoint);

    let handlers: Vec<Arc<MessageHandler>> = routes
        .read()
        .iter()
        .filter(|route| types.is_a(message.type_name(), route.contract))
        .map(|route| Arc::clone(&route.handler))
        .collect();

    if handlers.is_empty() {
        warn!(
            endpoint,
            message_type = message.type_name(),
            "no handler for delivered message, discarding"
        );
    }
    for handler in handlers {
        handler(&*message)?;
    }
    Ok(())
}
