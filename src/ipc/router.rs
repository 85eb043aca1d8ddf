//! Top-level router: routes by service id, delegates to service bindings.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::ipc::codec::{BasicDecoder, BasicEncoder, MessageHeader, MessageType};
use crate::types::{Error, Result};

/// A handler bound to a service id and its request table.
///
/// Implementations decode arguments from `args`, invoke the handler, and
/// write results into `results`. The reply header is already written.
#[async_trait]
pub trait Service: Send + Sync {
    /// Service id on the wire.
    fn id(&self) -> u8;

    /// Human-readable name for logs.
    fn name(&self) -> &'static str;

    async fn handle(
        &self,
        request: u8,
        args: &mut BasicDecoder,
        results: &mut BasicEncoder,
    ) -> Result<()>;
}

/// Result from routing a request.
#[derive(Debug)]
pub enum DispatchResponse {
    /// Encoded reply message (header + results), ready to be framed.
    Reply(Bytes),
    /// One-way call; nothing goes back to the caller.
    NoReply,
}

/// Services keyed by id.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<u8, Arc<dyn Service>>,
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self
            .services
            .values()
            .map(|service| (service.id(), service.name()))
            .collect();
        names.sort_unstable();
        f.debug_struct("ServiceRegistry")
            .field("services", &names)
            .finish()
    }
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service. A service with the same id replaces the previous one.
    pub fn add_service(&mut self, service: Arc<dyn Service>) {
        let id = service.id();
        let name = service.name();
        if let Some(previous) = self.services.insert(id, service) {
            tracing::warn!(
                service_id = id,
                previous = previous.name(),
                replacement = name,
                "Service id registered twice, replacing"
            );
        } else {
            tracing::debug!(service_id = id, service = name, "Service registered");
        }
    }

    pub fn get(&self, id: u8) -> Option<&Arc<dyn Service>> {
        self.services.get(&id)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Route a decoded request to its service.
    ///
    /// `body` must be positioned just past the message header.
    pub async fn route_request(
        &self,
        header: &MessageHeader,
        body: &mut BasicDecoder,
    ) -> Result<DispatchResponse> {
        let expects_reply = match header.message_type {
            MessageType::Invocation => true,
            MessageType::Oneway => false,
            other => return Err(Error::UnexpectedMessage(other)),
        };

        let service = self
            .get(header.service)
            .ok_or(Error::UnknownService(header.service))?;

        let mut results = if expects_reply {
            BasicEncoder::with_header(&header.reply())
        } else {
            BasicEncoder::new()
        };
        service.handle(header.request, body, &mut results).await?;

        if expects_reply {
            Ok(DispatchResponse::Reply(results.into_bytes()))
        } else {
            Ok(DispatchResponse::NoReply)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::codec::MESSAGE_HEADER_LEN;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes its single `u32` argument for request 1.
    struct EchoService {
        id: u8,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Service for EchoService {
        fn id(&self) -> u8 {
            self.id
        }

        fn name(&self) -> &'static str {
            "echo"
        }

        async fn handle(
            &self,
            request: u8,
            args: &mut BasicDecoder,
            results: &mut BasicEncoder,
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match request {
                1 => {
                    let value = args.read_u32()?;
                    results.write_u32(value);
                    Ok(())
                }
                _ => Err(Error::UnknownMethod {
                    service: self.id,
                    request,
                }),
            }
        }
    }

    fn echo(id: u8) -> Arc<EchoService> {
        Arc::new(EchoService {
            id,
            calls: AtomicUsize::new(0),
        })
    }

    fn header(message_type: MessageType, service: u8, request: u8) -> MessageHeader {
        MessageHeader {
            message_type,
            service,
            request,
            sequence: 7,
        }
    }

    fn args(value: u32) -> BasicDecoder {
        let mut encoder = BasicEncoder::new();
        encoder.write_u32(value);
        BasicDecoder::new(encoder.into_bytes())
    }

    #[tokio::test]
    async fn test_invocation_builds_reply() {
        let mut registry = ServiceRegistry::new();
        registry.add_service(echo(5));

        let response = registry
            .route_request(&header(MessageType::Invocation, 5, 1), &mut args(99))
            .await
            .unwrap();

        let DispatchResponse::Reply(bytes) = response else {
            panic!("expected a reply");
        };
        assert_eq!(bytes.len(), MESSAGE_HEADER_LEN + 4);
        let mut decoder = BasicDecoder::new(bytes);
        assert_eq!(
            decoder.read_header().unwrap(),
            header(MessageType::Reply, 5, 1)
        );
        assert_eq!(decoder.read_u32().unwrap(), 99);
    }

    #[tokio::test]
    async fn test_oneway_runs_handler_without_reply() {
        let service = echo(5);
        let mut registry = ServiceRegistry::new();
        registry.add_service(service.clone());

        let response = registry
            .route_request(&header(MessageType::Oneway, 5, 1), &mut args(1))
            .await
            .unwrap();
        assert!(matches!(response, DispatchResponse::NoReply));
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_service() {
        let registry = ServiceRegistry::new();
        let err = registry
            .route_request(&header(MessageType::Invocation, 9, 1), &mut args(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownService(9)));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let mut registry = ServiceRegistry::new();
        registry.add_service(echo(5));
        let err = registry
            .route_request(&header(MessageType::Invocation, 5, 4), &mut args(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownMethod { service: 5, request: 4 }));
    }

    #[tokio::test]
    async fn test_rejects_replies_sent_to_server() {
        let mut registry = ServiceRegistry::new();
        registry.add_service(echo(5));
        let err = registry
            .route_request(&header(MessageType::Reply, 5, 1), &mut args(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedMessage(MessageType::Reply)));
    }

    #[tokio::test]
    async fn test_duplicate_registration_replaces() {
        let first = echo(5);
        let second = echo(5);
        let mut registry = ServiceRegistry::new();
        registry.add_service(first.clone());
        registry.add_service(second.clone());
        assert_eq!(registry.len(), 1);

        let response = registry
            .route_request(&header(MessageType::Invocation, 5, 1), &mut args(3))
            .await
            .unwrap();
        assert!(matches!(response, DispatchResponse::Reply(_)));
        assert_eq!(first.calls.load(Ordering::SeqCst), 0);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_truncated_arguments() {
        let mut registry = ServiceRegistry::new();
        registry.add_service(echo(5));
        let err = registry
            .route_request(
                &header(MessageType::Invocation, 5, 1),
                &mut BasicDecoder::new(vec![0u8; 2]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
    }
}
