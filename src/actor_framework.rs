use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

// =============================================================================
// 1. THE ABSTRACTION (Traits with Hooks, Payloads, and Actions)
// =============================================================================

/// Trait that any stored record must implement to be managed by ResourceActor
pub trait Entity: Clone + PartialEq + Send + Sync + 'static {
    type Id: Eq + Hash + Clone + Send + Sync + Display + Debug;
    type CreatePayload: Send + Sync + Debug;
    type Patch: Send + Sync + Debug;
    type Action: Send + Sync + Debug;
    type ActionResult: Send + Sync + Debug;

    /// Collection-wide state that commits together with a create, or not at all.
    type Context: Clone + Default + Send + Sync + 'static;

    fn id(&self) -> &Self::Id;

    /// Records whose id comes from outside (e.g. an identity provider) return it here.
    fn requested_id(_payload: &Self::CreatePayload) -> Option<Self::Id> {
        None
    }

    /// Construct the full record from the id and payload.
    fn from_create(
        id: Self::Id,
        payload: Self::CreatePayload,
        context: &mut Self::Context,
    ) -> Result<Self, String>;

    // --- Lifecycle Hooks ---

    fn on_create(&mut self) -> Result<(), String> {
        Ok(())
    }
    fn on_update(&mut self, patch: Self::Patch) -> Result<(), String>;
    fn on_delete(&self) -> Result<(), String> {
        Ok(())
    }

    // --- Action Handler ---

    /// Handle a domain-specific read-check-write on a single record.
    fn handle_action(&mut self, action: Self::Action) -> Result<Self::ActionResult, String>;
}

/// Transport-level failures of the document store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FrameworkError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Item already exists: {0}")]
    AlreadyExists(String),
    #[error("Rejected: {0}")]
    Rejected(String),
    #[error("Transaction conflict: {0}")]
    Conflict(String),
    #[error("Actor closed")]
    ActorClosed,
    #[error("Actor dropped the request")]
    ActorDropped,
}

// =============================================================================
// 2. THE GENERIC MESSAGES
// =============================================================================

pub type Response<T> = oneshot::Sender<Result<T, FrameworkError>>;

/// Predicate selecting the records a query or subscription cares about.
pub type Filter<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

pub enum ResourceRequest<T: Entity> {
    /// Replies with the record as committed, so no read-back is needed.
    Create {
        payload: T::CreatePayload,
        respond_to: Response<T>,
    },
    Get {
        id: T::Id,
        respond_to: Response<Option<T>>,
    },
    Update {
        id: T::Id,
        patch: T::Patch,
        respond_to: Response<T>,
    },
    Delete {
        id: T::Id,
        respond_to: Response<()>,
    },
    Action {
        id: T::Id,
        action: T::Action,
        respond_to: Response<T::ActionResult>,
    },
    Query {
        filter: Filter<T>,
        respond_to: Response<Vec<T>>,
    },
    Subscribe {
        filter: Filter<T>,
        respond_to: Response<Subscription<T>>,
    },
    Shutdown,
}

impl<T: Entity> Debug for ResourceRequest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceRequest::Create { payload, .. } => {
                f.debug_struct("Create").field("payload", payload).finish()
            }
            ResourceRequest::Get { id, .. } => f.debug_struct("Get").field("id", id).finish(),
            ResourceRequest::Update { id, patch, .. } => f
                .debug_struct("Update")
                .field("id", id)
                .field("patch", patch)
                .finish(),
            ResourceRequest::Delete { id, .. } => f.debug_struct("Delete").field("id", id).finish(),
            ResourceRequest::Action { id, action, .. } => f
                .debug_struct("Action")
                .field("id", id)
                .field("action", action)
                .finish(),
            ResourceRequest::Query { .. } => f.write_str("Query"),
            ResourceRequest::Subscribe { .. } => f.write_str("Subscribe"),
            ResourceRequest::Shutdown => f.write_str("Shutdown"),
        }
    }
}

// =============================================================================
// 3. SUBSCRIPTIONS
// =============================================================================

/// Live view over the records matching a filter.
///
/// The first snapshot arrives immediately; a new one follows every change that
/// touches a matching record. Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: mpsc::UnboundedReceiver<Vec<T>>,
}

impl<T> Subscription<T> {
    /// Wait for the next snapshot. `None` once the actor has stopped.
    pub async fn next(&mut self) -> Option<Vec<T>> {
        self.receiver.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.receiver.close();
    }
}

struct Subscriber<T> {
    filter: Filter<T>,
    sender: mpsc::UnboundedSender<Vec<T>>,
}

// =============================================================================
// 4. THE GENERIC ACTOR SERVER
// =============================================================================

pub struct ResourceActor<T: Entity> {
    name: &'static str,
    receiver: mpsc::Receiver<ResourceRequest<T>>,
    store: HashMap<T::Id, T>,
    context: T::Context,
    subscribers: Vec<Subscriber<T>>,
    next_id_fn: Box<dyn Fn() -> T::Id + Send + Sync>,
}

impl<T: Entity> ResourceActor<T> {
    pub fn new(
        name: &'static str,
        buffer_size: usize,
        next_id_fn: impl Fn() -> T::Id + Send + Sync + 'static,
    ) -> (Self, ResourceClient<T>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self {
            name,
            receiver,
            store: HashMap::new(),
            context: T::Context::default(),
            subscribers: Vec::new(),
            next_id_fn: Box::new(next_id_fn),
        };
        let client = ResourceClient::new(sender);
        (actor, client)
    }

    pub async fn run(mut self) {
        info!(collection = self.name, "Resource actor starting");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                ResourceRequest::Create { payload, respond_to } => {
                    let result = self.handle_create(payload);
                    let _ = respond_to.send(result);
                }
                ResourceRequest::Get { id, respond_to } => {
                    let item = self.store.get(&id).cloned();
                    let _ = respond_to.send(Ok(item));
                }
                ResourceRequest::Update {
                    id,
                    patch,
                    respond_to,
                } => {
                    let result = self.handle_update(id, patch);
                    let _ = respond_to.send(result);
                }
                ResourceRequest::Delete { id, respond_to } => {
                    let result = self.handle_delete(id);
                    let _ = respond_to.send(result);
                }
                ResourceRequest::Action {
                    id,
                    action,
                    respond_to,
                } => {
                    let result = self.handle_action(id, action);
                    let _ = respond_to.send(result);
                }
                ResourceRequest::Query { filter, respond_to } => {
                    let items = self.snapshot(&filter);
                    let _ = respond_to.send(Ok(items));
                }
                ResourceRequest::Subscribe { filter, respond_to } => {
                    let subscription = self.handle_subscribe(filter);
                    let _ = respond_to.send(Ok(subscription));
                }
                ResourceRequest::Shutdown => {
                    info!(collection = self.name, "Resource actor shutting down");
                    break;
                }
            }
        }

        info!(collection = self.name, "Resource actor stopped");
    }

    fn handle_create(&mut self, payload: T::CreatePayload) -> Result<T, FrameworkError> {
        let id = match T::requested_id(&payload) {
            Some(id) if self.store.contains_key(&id) => {
                return Err(FrameworkError::AlreadyExists(id.to_string()));
            }
            Some(id) => id,
            None => (self.next_id_fn)(),
        };

        // Context changes are staged so a rejected create leaves no trace.
        let mut staged = self.context.clone();
        let mut item =
            T::from_create(id.clone(), payload, &mut staged).map_err(FrameworkError::Rejected)?;
        item.on_create().map_err(FrameworkError::Rejected)?;

        self.context = staged;
        self.store.insert(id.clone(), item.clone());
        debug!(collection = self.name, id = %id, "Item created");
        self.publish(None, Some(&item));
        Ok(item)
    }

    fn handle_update(&mut self, id: T::Id, patch: T::Patch) -> Result<T, FrameworkError> {
        let current = self
            .store
            .get(&id)
            .ok_or_else(|| FrameworkError::NotFound(id.to_string()))?;

        let mut staged = current.clone();
        staged.on_update(patch).map_err(FrameworkError::Rejected)?;
        self.commit(id, staged.clone());
        Ok(staged)
    }

    fn handle_delete(&mut self, id: T::Id) -> Result<(), FrameworkError> {
        let item = self
            .store
            .get(&id)
            .ok_or_else(|| FrameworkError::NotFound(id.to_string()))?;
        item.on_delete().map_err(FrameworkError::Rejected)?;

        if let Some(removed) = self.store.remove(&id) {
            self.publish(Some(&removed), None);
        }
        Ok(())
    }

    fn handle_action(
        &mut self,
        id: T::Id,
        action: T::Action,
    ) -> Result<T::ActionResult, FrameworkError> {
        let current = self
            .store
            .get(&id)
            .ok_or_else(|| FrameworkError::NotFound(id.to_string()))?;

        let mut staged = current.clone();
        let result = staged
            .handle_action(action)
            .map_err(FrameworkError::Rejected)?;
        self.commit(id, staged);
        Ok(result)
    }

    fn handle_subscribe(&mut self, filter: Filter<T>) -> Subscription<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let _ = sender.send(self.snapshot(&filter));
        self.subscribers.push(Subscriber { filter, sender });
        debug!(
            collection = self.name,
            subscribers = self.subscribers.len(),
            "Subscriber added"
        );
        Subscription { receiver }
    }

    fn commit(&mut self, id: T::Id, staged: T) {
        let previous = self.store.insert(id, staged.clone());
        if previous.as_ref() != Some(&staged) {
            self.publish(previous.as_ref(), Some(&staged));
        }
    }

    fn snapshot(&self, filter: &Filter<T>) -> Vec<T> {
        self.store
            .values()
            .filter(|item| filter(item))
            .cloned()
            .collect()
    }

    /// Push a fresh snapshot to every subscriber whose view the change touches.
    fn publish(&mut self, before: Option<&T>, after: Option<&T>) {
        let store = &self.store;
        self.subscribers.retain(|subscriber| {
            if subscriber.sender.is_closed() {
                return false;
            }
            let touched = before.is_some_and(|item| (subscriber.filter)(item))
                || after.is_some_and(|item| (subscriber.filter)(item));
            if !touched {
                return true;
            }
            let items: Vec<T> = store
                .values()
                .filter(|item| (subscriber.filter)(item))
                .cloned()
                .collect();
            subscriber.sender.send(items).is_ok()
        });
    }
}

// =============================================================================
// 5. THE GENERIC CLIENT
// =============================================================================

pub struct ResourceClient<T: Entity> {
    sender: mpsc::Sender<ResourceRequest<T>>,
}

impl<T: Entity> Clone for ResourceClient<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T: Entity> ResourceClient<T> {
    pub fn new(sender: mpsc::Sender<ResourceRequest<T>>) -> Self {
        Self { sender }
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(Response<R>) -> ResourceRequest<T>,
    ) -> Result<R, FrameworkError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| FrameworkError::ActorClosed)?;
        response.await.map_err(|_| FrameworkError::ActorDropped)?
    }

    pub async fn create(&self, payload: T::CreatePayload) -> Result<T, FrameworkError> {
        self.request(|respond_to| ResourceRequest::Create {
            payload,
            respond_to,
        })
        .await
    }

    pub async fn get(&self, id: T::Id) -> Result<Option<T>, FrameworkError> {
        self.request(|respond_to| ResourceRequest::Get { id, respond_to })
            .await
    }

    pub async fn update(&self, id: T::Id, patch: T::Patch) -> Result<T, FrameworkError> {
        self.request(|respond_to| ResourceRequest::Update {
            id,
            patch,
            respond_to,
        })
        .await
    }

    pub async fn delete(&self, id: T::Id) -> Result<(), FrameworkError> {
        self.request(|respond_to| ResourceRequest::Delete { id, respond_to })
            .await
    }

    pub async fn perform_action(
        &self,
        id: T::Id,
        action: T::Action,
    ) -> Result<T::ActionResult, FrameworkError> {
        self.request(|respond_to| ResourceRequest::Action {
            id,
            action,
            respond_to,
        })
        .await
    }

    pub async fn query(
        &self,
        filter: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Result<Vec<T>, FrameworkError> {
        let filter: Filter<T> = Box::new(filter);
        self.request(|respond_to| ResourceRequest::Query { filter, respond_to })
            .await
    }

    pub async fn subscribe(
        &self,
        filter: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Result<Subscription<T>, FrameworkError> {
        let filter: Filter<T> = Box::new(filter);
        self.request(|respond_to| ResourceRequest::Subscribe { filter, respond_to })
            .await
    }

    pub async fn shutdown(&self) -> Result<(), FrameworkError> {
        self.sender
            .send(ResourceRequest::Shutdown)
            .await
            .map_err(|_| {
                warn!("Shutdown requested for an actor that already stopped");
                FrameworkError::ActorClosed
            })
    }
}

// =============================================================================
// 6. EXAMPLE USAGE (Test)
// =============================================================================
