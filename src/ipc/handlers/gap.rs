//! GAP service: parameter updates (`set_param`).

use async_trait::async_trait;

use crate::ipc::client::RpcClient;
use crate::ipc::codec::{BasicDecoder, BasicEncoder};
use crate::ipc::router::Service;
use crate::types::{Error, Result};

/// Service id of the GAP service.
pub const GAP_SERVICE_ID: u8 = 2;

/// Request id of `set_param`.
pub const SET_PARAM_ID: u8 = 1;

/// Application side of the GAP service.
#[async_trait]
pub trait GapHandler: Send + Sync {
    async fn set_param(&self, param: i32, value: i32) -> i32;
}

/// Handler that reports each call and answers `param - 1`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingGapHandler;

#[async_trait]
impl GapHandler for LoggingGapHandler {
    async fn set_param(&self, param: i32, value: i32) -> i32 {
        tracing::info!(param, value, "set_param invoked");
        // Unchecked on the wire: i32::MIN wraps to i32::MAX instead of panicking.
        param.wrapping_sub(1)
    }
}

/// Binds a [`GapHandler`] to [`GAP_SERVICE_ID`].
#[derive(Debug)]
pub struct GapService<H> {
    handler: H,
}

impl<H: GapHandler> GapService<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<H: GapHandler> Service for GapService<H> {
    fn id(&self) -> u8 {
        GAP_SERVICE_ID
    }

    fn name(&self) -> &'static str {
        "gap"
    }

    async fn handle(
        &self,
        request: u8,
        args: &mut BasicDecoder,
        results: &mut BasicEncoder,
    ) -> Result<()> {
        match request {
            SET_PARAM_ID => {
                let param = args.read_i32()?;
                let value = args.read_i32()?;
                let result = self.handler.set_param(param, value).await;
                results.write_i32(result);
                Ok(())
            }
            _ => Err(Error::UnknownMethod {
                service: GAP_SERVICE_ID,
                request,
            }),
        }
    }
}

/// Typed caller for the GAP service.
#[derive(Debug)]
pub struct GapClient<'a> {
    client: &'a mut RpcClient,
}

impl<'a> GapClient<'a> {
    pub fn new(client: &'a mut RpcClient) -> Self {
        Self { client }
    }

    pub async fn set_param(&mut self, param: i32, value: i32) -> Result<i32> {
        let mut reply = self
            .client
            .invoke(GAP_SERVICE_ID, SET_PARAM_ID, |args| {
                args.write_i32(param);
                args.write_i32(value);
                Ok(())
            })
            .await?;
        Ok(reply.read_i32()?)
    }
}
