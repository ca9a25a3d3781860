use nexrpc_common::service::Arguments;
use nexrpc_common::transport::Serializer;
use nexrpc_common::{Request, Response, RpcError, StatusCode};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, warn};

use crate::provider::ServiceProvider;

/// Turns decoded requests into responses.
///
/// Method bodies run on Tokio's blocking pool, at most `max_workers` at a
/// time, so a slow method never stalls the connection that carried it.
/// Every failure (unknown service, unknown overload, method error, panic) is
/// reported as a response and the connection stays usable.
#[derive(Clone)]
pub struct Dispatcher {
    provider: Arc<ServiceProvider>,
    workers: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(provider: Arc<ServiceProvider>, max_workers: usize) -> Self {
        Self {
            provider,
            workers: Arc::new(Semaphore::new(max_workers.max(1))),
        }
    }

    pub fn provider(&self) -> &Arc<ServiceProvider> {
        &self.provider
    }

    /// Handles `request` on the calling thread.
    ///
    /// Heartbeats produce no response.
    pub fn handle(&self, request: &Request, serializer: Serializer) -> Option<Response> {
        if request.heartbeat {
            debug!(request_id = %request.request_id, "Discarding heartbeat");
            return None;
        }
        Some(self.invoke(request, serializer))
    }

    fn invoke(&self, request: &Request, serializer: Serializer) -> Response {
        let request_id = request.request_id.clone();

        if let Err(e) = request.validate() {
            warn!(request_id = %request_id, error = %e, "Rejecting malformed request");
            return Response::fail(request_id, StatusCode::Fail, e.to_string());
        }

        let Some(handler) = self.provider.get(&request.interface_name) else {
            warn!(interface = %request.interface_name, "Service not bound");
            return Response::fail(request_id, StatusCode::ClassNotFound, &request.interface_name);
        };

        if handler
            .find_method(&request.method_name, &request.param_types)
            .is_none()
        {
            let signature = format!(
                "{}#{}({})",
                request.interface_name,
                request.method_name,
                request.param_types.join(", ")
            );
            warn!(method = %signature, "Method not found");
            return Response::fail(request_id, StatusCode::MethodNotFound, signature);
        }

        match handler.call(
            &request.method_name,
            Arguments::new(serializer, &request.parameters),
        ) {
            Ok(data) => {
                debug!(
                    request_id = %request_id,
                    interface = %request.interface_name,
                    method = %request.method_name,
                    "Method invoked"
                );
                Response::success(request_id, data)
            }
            Err(RpcError::MethodNotFound(method)) => {
                Response::fail(request_id, StatusCode::MethodNotFound, method)
            }
            Err(e) => {
                warn!(
                    request_id = %request_id,
                    interface = %request.interface_name,
                    method = %request.method_name,
                    error = %e,
                    "Method invocation failed"
                );
                Response::fail(request_id, StatusCode::Fail, e.to_string())
            }
        }
    }

    /// Waits for a free worker. `None` once the pool is closed.
    pub async fn reserve(&self) -> Option<OwnedSemaphorePermit> {
        self.workers.clone().acquire_owned().await.ok()
    }

    /// Handles `request` on the bounded worker pool.
    pub async fn dispatch(&self, request: Request, serializer: Serializer) -> Option<Response> {
        if request.heartbeat {
            return None;
        }

        match self.reserve().await {
            Some(permit) => self.run(permit, request, serializer).await,
            None => Some(Response::fail(
                request.request_id,
                StatusCode::Fail,
                "dispatcher is shutting down",
            )),
        }
    }

    /// Handles `request` on the worker reserved by `permit`.
    pub async fn run(
        &self,
        permit: OwnedSemaphorePermit,
        request: Request,
        serializer: Serializer,
    ) -> Option<Response> {
        let request_id = request.request_id.clone();
        let dispatcher = self.clone();
        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            dispatcher.handle(&request, serializer)
        })
        .await;

        match result {
            Ok(response) => response,
            Err(e) => {
                error!(request_id = %request_id, error = %e, "Service method panicked");
                Some(Response::fail(
                    request_id,
                    StatusCode::Fail,
                    "service method panicked",
                ))
            }
        }
    }
}
