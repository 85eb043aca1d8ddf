//! Host service: BLE stack lifecycle (`init`, `start`, `deinit`).

use async_trait::async_trait;

use crate::ipc::client::RpcClient;
use crate::ipc::codec::{BasicDecoder, BasicEncoder};
use crate::ipc::router::Service;
use crate::types::{Error, Result};

/// Service id of the host service.
pub const HOST_SERVICE_ID: u8 = 1;

/// Request ids of the host service.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HostMethod {
    Init = 1,
    Start = 2,
    Deinit = 3,
}

impl HostMethod {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(HostMethod::Init),
            2 => Some(HostMethod::Start),
            3 => Some(HostMethod::Deinit),
            _ => None,
        }
    }
}

/// Application side of the host service.
#[async_trait]
pub trait HostHandler: Send + Sync {
    async fn init(&self);
    async fn start(&self);
    async fn deinit(&self);
}

/// Handler that only reports each call.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHostHandler;

#[async_trait]
impl HostHandler for LoggingHostHandler {
    async fn init(&self) {
        tracing::info!("init invoked");
    }

    async fn start(&self) {
        tracing::info!("start invoked");
    }

    async fn deinit(&self) {
        tracing::info!("deinit invoked");
    }
}

/// Binds a [`HostHandler`] to [`HOST_SERVICE_ID`].
#[derive(Debug)]
pub struct HostService<H> {
    handler: H,
}

impl<H: HostHandler> HostService<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<H: HostHandler> Service for HostService<H> {
    fn id(&self) -> u8 {
        HOST_SERVICE_ID
    }

    fn name(&self) -> &'static str {
        "host"
    }

    async fn handle(
        &self,
        request: u8,
        _args: &mut BasicDecoder,
        _results: &mut BasicEncoder,
    ) -> Result<()> {
        let method = HostMethod::from_id(request).ok_or(Error::UnknownMethod {
            service: HOST_SERVICE_ID,
            request,
        })?;
        match method {
            HostMethod::Init => self.handler.init().await,
            HostMethod::Start => self.handler.start().await,
            HostMethod::Deinit => self.handler.deinit().await,
        }
        Ok(())
    }
}

/// Typed caller for the host service.
#[derive(Debug)]
pub struct HostClient<'a> {
    client: &'a mut RpcClient,
}

impl<'a> HostClient<'a> {
    pub fn new(client: &'a mut RpcClient) -> Self {
        Self { client }
    }

    pub async fn init(&mut self) -> Result<()> {
        self.call(HostMethod::Init).await
    }

    pub async fn start(&mut self) -> Result<()> {
        self.call(HostMethod::Start).await
    }

    pub async fn deinit(&mut self) -> Result<()> {
        self.call(HostMethod::Deinit).await
    }

    async fn call(&mut self, method: HostMethod) -> Result<()> {
        self.client
            .invoke(HOST_SERVICE_ID, method as u8, |_| Ok(()))
            .await?;
        Ok(())
    }
}
