/// Generates `get_<name>`, `require_<name>` and `shutdown` for a typed client
/// wrapping `inner: ResourceClient<$entity>`.
///
/// The error type needs `From<FrameworkError>` and a `NotFound(String)` variant.
#[macro_export]
macro_rules! impl_client_methods {
    ($client_name:ident, $entity:ty, $error:ty, $entity_name_snake:ident) => {
        paste::paste! {
            impl $client_name {
                #[tracing::instrument(skip(self))]
                pub async fn [<get_ $entity_name_snake>](&self, id: &str) -> Result<Option<$entity>, $error> {
                    tracing::debug!("Sending request");
                    self.inner.get(id.to_string()).await.map_err(<$error>::from)
                }

                /// Like the plain getter, but a missing record is an error.
                #[tracing::instrument(skip(self))]
                pub async fn [<require_ $entity_name_snake>](&self, id: &str) -> Result<$entity, $error> {
                    self.[<get_ $entity_name_snake>](id)
                        .await?
                        .ok_or_else(|| <$error>::NotFound(id.to_string()))
                }

                /// Stop the backing actor, even while other clones are alive.
                pub async fn shutdown(&self) -> Result<(), $error> {
                    self.inner.shutdown().await.map_err(<$error>::from)
                }
            }
        }
    };
}

#[macro_export]
macro_rules! impl_client_new {
    ($client_name:ident, $entity:ty) => {
        impl $client_name {
            pub fn new(inner: $crate::actor_framework::ResourceClient<$entity>) -> Self {
                Self { inner }
            }
        }
    };
}

#[macro_export]
macro_rules! impl_basic_client {
    ($client_name:ident, $entity:ty, $error:ty, $entity_name_snake:ident) => {
        $crate::impl_client_new!($client_name, $entity);
        $crate::impl_client_methods!($client_name, $entity, $error, $entity_name_snake);
    };
}
