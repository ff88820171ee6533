//! JSON request/response boundary in front of the dispatcher.

use std::sync::Arc;

use domain::error::Result;
use domain::printer::{ConnectionId, PrintJob, Protocol, TransportKind};
use domain::{AdapterState, PrinterError};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::dispatcher::{ConnectOptions, Dispatcher};
use crate::relay::AdapterStatus;

/// A host request, tagged by `method`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum Request {
    State,
    IsAvailable,
    IsOn,
    IsConnected {
        #[serde(default)]
        id: ConnectionId,
    },
    Connect {
        #[serde(default)]
        id: ConnectionId,
        #[serde(default)]
        address: Option<String>,
        #[serde(default)]
        transport: Option<TransportKind>,
        #[serde(default)]
        protocol: Option<Protocol>,
    },
    Disconnect {
        #[serde(default)]
        id: ConnectionId,
    },
    Destroy,
    #[serde(alias = "printReceipt", alias = "printLabel")]
    Print {
        #[serde(default)]
        id: ConnectionId,
        #[serde(default)]
        config: Option<Value>,
        #[serde(default)]
        data: Option<Value>,
    },
    PrintTest {
        #[serde(default)]
        id: ConnectionId,
    },
}

impl Request {
    pub fn method(&self) -> &'static str {
        match self {
            Self::State => "state",
            Self::IsAvailable => "isAvailable",
            Self::IsOn => "isOn",
            Self::IsConnected { .. } => "isConnected",
            Self::Connect { .. } => "connect",
            Self::Disconnect { .. } => "disconnect",
            Self::Destroy => "destroy",
            Self::Print { .. } => "print",
            Self::PrintTest { .. } => "printTest",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Response {
    Ok(Value),
    Error { code: String, message: String },
}

impl Response {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Ok(_) => None,
            Self::Error { code, .. } => Some(code),
        }
    }
}

impl From<Result<Value>> for Response {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(e) => Self::Error {
                code: e.code().to_string(),
                message: e.to_string(),
            },
        }
    }
}

pub struct PrinterApi {
    dispatcher: Arc<Dispatcher>,
    adapter: AdapterStatus,
}

impl PrinterApi {
    pub fn new(dispatcher: Arc<Dispatcher>, adapter: AdapterStatus) -> Self {
        Self {
            dispatcher,
            adapter,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub async fn handle(&self, request: Request) -> Response {
        debug!(method = request.method(), "Handling request");
        self.dispatch(request).await.into()
    }

    async fn dispatch(&self, request: Request) -> Result<Value> {
        // Everything but isAvailable needs the adapter; connect checks
        // its own transport instead when one is named
        let needs_default = match &request {
            Request::IsAvailable => false,
            Request::Connect { transport, .. } => transport.is_none(),
            _ => true,
        };
        if needs_default && !self.dispatcher.is_available() {
            return Err(PrinterError::Unavailable(format!(
                "{} transport is not available",
                self.dispatcher.config().default_transport
            )));
        }

        match request {
            Request::State => Ok(json!(self.adapter.state().map_or(0, |s| s.code()))),
            Request::IsAvailable => Ok(json!(self.dispatcher.is_available())),
            Request::IsOn => {
                let on = match self.adapter.state() {
                    Some(state) => state == AdapterState::On,
                    None => self.dispatcher.is_available(),
                };
                Ok(json!(on))
            }
            Request::IsConnected { id } => Ok(json!(self.dispatcher.is_connected(id))),
            Request::Connect {
                id,
                address,
                transport,
                protocol,
            } => {
                let address = address.ok_or_else(|| {
                    PrinterError::InvalidArgument("argument 'address' not found".to_string())
                })?;
                let options = ConnectOptions {
                    transport,
                    protocol,
                };
                self.dispatcher.connect(id, &address, options).await?;
                Ok(json!(true))
            }
            Request::Disconnect { id } => {
                self.dispatcher.disconnect(id).await;
                Ok(json!(true))
            }
            Request::Destroy => {
                self.dispatcher.destroy().await;
                Ok(json!(true))
            }
            Request::Print { id, config, data } => {
                self.dispatcher.connection(id)?;
                let (Some(config), Some(data)) = (config, data) else {
                    return Err(PrinterError::InvalidArgument(
                        "please add config or data".to_string(),
                    ));
                };
                let job = PrintJob::from_values(config, data)?;
                self.dispatcher.print(id, &job)?;
                Ok(json!(true))
            }
            Request::PrintTest { id } => {
                self.dispatcher.print_test(id)?;
                Ok(json!(true))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_parsing() {
        let request: Request =
            serde_json::from_value(json!({"method": "printLabel", "id": 1, "config": {}, "data": []}))
                .unwrap();
        assert_eq!(request.method(), "print");

        let request: Request = serde_json::from_value(json!({"method": "isConnected"})).unwrap();
        assert_eq!(request, Request::IsConnected { id: 0 });

        let request: Request = serde_json::from_value(
            json!({"method": "connect", "address": "AA:BB", "protocol": "tsc"}),
        )
        .unwrap();
        assert!(matches!(
            request,
            Request::Connect {
                protocol: Some(Protocol::Tsc),
                transport: None,
                ..
            }
        ));

        assert!(serde_json::from_value::<Request>(json!({"method": "startScan"})).is_err());
    }

    #[test]
    fn test_response_shape() {
        let ok = Response::from(Ok::<_, PrinterError>(json!(true)));
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"ok": true}));

        let err = Response::from(Err::<Value, _>(PrinterError::NotConnected));
        assert_eq!(err.error_code(), Some("not_connected"));
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"error": {"code": "not_connected", "message": "Not connected"}})
        );
    }
}
