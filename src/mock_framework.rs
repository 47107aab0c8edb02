//! # Mock Framework
//!
//! Utilities for testing clients in isolation.
//!
//! Use [`create_mock_client`] to get a client and a receiver.
//! Then use helpers like [`expect_create`] or [`expect_action`] to script the
//! store's side of the conversation.

use crate::actor_framework::{Entity, FrameworkError, ResourceClient, ResourceRequest, Response};
use tokio::sync::mpsc;

/// Creates a mock client and a receiver for asserting requests.
///
/// The client talks to a channel the test owns instead of a running
/// `ResourceActor`, so every reply (success, rejection, conflict, silence)
/// is decided by the test.
pub fn create_mock_client<T: Entity>(
    buffer_size: usize,
) -> (ResourceClient<T>, mpsc::Receiver<ResourceRequest<T>>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (ResourceClient::new(sender), receiver)
}

/// Helper to verify that the next message is a Create request
pub async fn expect_create<T: Entity>(
    receiver: &mut mpsc::Receiver<ResourceRequest<T>>,
) -> Option<(T::CreatePayload, Response<T>)> {
    match receiver.recv().await {
        Some(ResourceRequest::Create {
            payload,
            respond_to,
        }) => Some((payload, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is a Get request
pub async fn expect_get<T: Entity>(
    receiver: &mut mpsc::Receiver<ResourceRequest<T>>,
) -> Option<(T::Id, Response<Option<T>>)> {
    match receiver.recv().await {
        Some(ResourceRequest::Get { id, respond_to }) => Some((id, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is an Action request
pub async fn expect_action<T: Entity>(
    receiver: &mut mpsc::Receiver<ResourceRequest<T>>,
) -> Option<(T::Id, T::Action, Response<T::ActionResult>)> {
    match receiver.recv().await {
        Some(ResourceRequest::Action {
            id,
            action,
            respond_to,
        }) => Some((id, action, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is a Query request.
///
/// Answers it by running the query's own filter over `records`.
pub async fn expect_query<T: Entity>(
    receiver: &mut mpsc::Receiver<ResourceRequest<T>>,
    records: Vec<T>,
) -> bool {
    match receiver.recv().await {
        Some(ResourceRequest::Query { filter, respond_to }) => {
            let matching = records.into_iter().filter(|item| filter(item)).collect();
            let _ = respond_to.send(Ok(matching));
            true
        }
        _ => false,
    }
}

/// Assert nothing else reached the store; the client side has been dropped.
pub async fn expect_closed<T: Entity>(receiver: &mut mpsc::Receiver<ResourceRequest<T>>) -> bool {
    receiver.recv().await.is_none()
}

/// A conflict reply, as a contended transaction would produce.
pub fn conflict(reason: &str) -> FrameworkError {
    FrameworkError::Conflict(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor_framework::Entity;
    use crate::clients::UserClient;
    use crate::domain::{User, UserCreate};

    #[tokio::test]
    async fn test_mock_client() {
        let (client, mut receiver) = create_mock_client::<User>(10);
        let users = UserClient::new(client);

        let create_task = tokio::spawn(async move {
            users
                .create_user(UserCreate::new("uid_9", "Test", "test@example.com"))
                .await
        });

        let (payload, responder) = expect_create(&mut receiver)
            .await
            .expect("Expected Create request");
        assert_eq!(payload.profile.name, "Test");
        let created = User::from_create("uid_9".to_string(), payload, &mut ()).unwrap();
        responder.send(Ok(created)).unwrap();

        let result = create_task.await.unwrap();
        assert_eq!(result, Ok("uid_9".to_string()));
    }

    #[tokio::test]
    async fn query_is_answered_with_the_filter() {
        let (client, mut receiver) = create_mock_client::<User>(10);

        let task = tokio::spawn(async move {
            client
                .query(|user: &User| user.wallet_points > 10)
                .await
        });

        let mut rich = User {
            id: "a".to_string(),
            name: "A".to_string(),
            email: "a@example.com".to_string(),
            phone: String::new(),
            address: String::new(),
            wallet_points: 50,
            is_first_order_completed: true,
            created_at: chrono::Utc::now(),
        };
        let mut poor = rich.clone();
        poor.id = "b".to_string();
        poor.wallet_points = 0;
        rich.name = "Rich".to_string();

        assert!(expect_query(&mut receiver, vec![rich, poor]).await);
        let found = task.await.unwrap().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Rich");
    }
}
