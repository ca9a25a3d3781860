use anyhow::{anyhow, Result};
use nexrpc_api::{
    ByeService, ByeServiceClient, HelloObject, HelloService, HelloServiceClient,
};
use nexrpc_client::{ClientConfig, ClientProxy, RpcClient};
use nexrpc_common::transport::Serializer;
use nexrpc_common::Endpoint;
use nexrpc_discovery::StaticRegistry;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Demo method reachable from the `call` subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoMethod {
    Hello,
    Bye,
}

impl FromStr for DemoMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "hello" => Ok(DemoMethod::Hello),
            "bye" => Ok(DemoMethod::Bye),
            other => Err(format!("unknown method '{}', expected hello or bye", other)),
        }
    }
}

impl fmt::Display for DemoMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemoMethod::Hello => write!(f, "hello"),
            DemoMethod::Bye => write!(f, "bye"),
        }
    }
}

/// Options of the `call` subcommand.
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub endpoint: Endpoint,
    pub method: DemoMethod,
    pub id: i32,
    pub message: String,
    pub serializer: Serializer,
    pub timeout: Duration,
}

/// Calls one demo method on `options.endpoint` and returns the reply.
///
/// The endpoint is used directly; no directory lookup takes place.
pub async fn run_call(options: CallOptions) -> Result<String> {
    let config = ClientConfig {
        serializer: options.serializer,
        call_timeout: options.timeout,
        ..ClientConfig::default()
    };
    let registry = Arc::new(StaticRegistry::single(options.endpoint.clone()));
    let client = Arc::new(RpcClient::new(config, registry));
    let proxy = ClientProxy::current(client.clone())?;

    let CallOptions {
        method, id, message, ..
    } = options;
    let reply = tokio::task::spawn_blocking(move || match method {
        DemoMethod::Hello => HelloServiceClient::new(proxy).hello(HelloObject::new(id, message)),
        DemoMethod::Bye => ByeServiceClient::new(proxy).bye(message),
    })
    .await
    .map_err(|e| anyhow!("call task failed: {}", e))?;

    client.shutdown().await;
    Ok(reply?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method() {
        assert_eq!("hello".parse::<DemoMethod>().unwrap(), DemoMethod::Hello);
        assert_eq!("bye".parse::<DemoMethod>().unwrap(), DemoMethod::Bye);
        assert!("wave".parse::<DemoMethod>().is_err());
        assert_eq!(DemoMethod::Bye.to_string(), "bye");
    }
}
