//! The JSON-RPC surface.
//!
//! One HTTP endpoint serves the upstream engine's method set: JSON-RPC 2.0
//! envelopes over POST at `/`, and GET at `/<Method>` with query parameters
//! mapped to each method's positional params. CORS is wide open so browser
//! dashboards can poll the mock directly.

mod handlers;
mod params;
mod types;

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use axum::{
    extract::{
        rejection::JsonRejection,
        Path,
        Query,
        State,
    },
    routing::{
        get,
        post,
    },
    Json,
    Router,
};
use eyre::WrapErr as _;
use http::Method;
use serde::Deserialize;
use serde_json::{
    json,
    Value,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{
    Any,
    CorsLayer,
};
use tracing::debug;

use self::params::RequestParams;
use crate::engine::Engine;

pub(crate) struct Builder {
    pub(crate) listen_addr: SocketAddr,
    pub(crate) engine: Arc<Engine>,
    pub(crate) moniker: String,
    pub(crate) broadcast_tx_commit_timeout: Duration,
    pub(crate) shutdown_token: CancellationToken,
}

impl Builder {
    /// Binds the listener and assembles the router. Binding eagerly makes a
    /// port collision a construction error rather than a late task failure.
    pub(crate) async fn bind(self) -> eyre::Result<RpcServer> {
        let Self {
            listen_addr,
            engine,
            moniker,
            broadcast_tx_commit_timeout,
            shutdown_token,
        } = self;

        let listener = TcpListener::bind(listen_addr)
            .await
            .wrap_err_with(|| format!("failed to bind RPC listener to `{listen_addr}`"))?;
        let local_addr = listener
            .local_addr()
            .wrap_err("failed reading the RPC listener's local address")?;

        let state = RpcState {
            engine,
            moniker,
            broadcast_tx_commit_timeout,
            listen_addr: local_addr,
        };
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
            .allow_headers([http::header::CONTENT_TYPE]);
        let router = Router::new()
            .route("/", post(handle_post))
            .route("/:method", get(handle_get))
            .layer(cors)
            .with_state(state);

        Ok(RpcServer {
            listener,
            local_addr,
            router,
            shutdown_token,
        })
    }
}

#[derive(Clone)]
pub(crate) struct RpcState {
    pub(crate) engine: Arc<Engine>,
    pub(crate) moniker: String,
    pub(crate) broadcast_tx_commit_timeout: Duration,
    pub(crate) listen_addr: SocketAddr,
}

pub(crate) struct RpcServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Router,
    shutdown_token: CancellationToken,
}

impl RpcServer {
    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub(crate) async fn run_until_stopped(self) -> eyre::Result<()> {
        let Self {
            listener,
            router,
            shutdown_token,
            ..
        } = self;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_token.cancelled_owned())
            .await
            .wrap_err("RPC server exited with error")
    }
}

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default = "default_jsonrpc")]
    jsonrpc: String,
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

fn default_jsonrpc() -> String {
    "2.0".to_string()
}

async fn handle_post(
    State(state): State<RpcState>,
    request: Result<Json<RpcRequest>, JsonRejection>,
) -> Json<Value> {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => {
            return Json(error_envelope(
                Value::Null,
                RpcError::parse_error(rejection.body_text()),
            ));
        }
    };
    if request.jsonrpc != "2.0" {
        return Json(error_envelope(
            request.id,
            RpcError::invalid_request("jsonrpc version must be \"2.0\""),
        ));
    }
    let params = match RequestParams::from_value(request.params) {
        Ok(params) => params,
        Err(error) => return Json(error_envelope(request.id, error)),
    };
    debug!(method = %request.method, "received JSON-RPC request");
    Json(match handlers::dispatch(&state, &request.method, params).await {
        Ok(result) => result_envelope(request.id, result),
        Err(error) => error_envelope(request.id, error),
    })
}

async fn handle_get(
    State(state): State<RpcState>,
    Path(method): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    debug!(%method, "received GET request");
    let params = RequestParams::from_query(query);
    // GET requests have no JSON-RPC id; mirror the upstream engine's `-1`.
    let id = json!(-1);
    Json(match handlers::dispatch(&state, &method, params).await {
        Ok(result) => result_envelope(id, result),
        Err(error) => error_envelope(id, error),
    })
}

fn result_envelope(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

fn error_envelope(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": error.into_value(),
    })
}

/// JSON-RPC error object. Invariant violations and out-of-range reads become
/// error responses; they never halt the engine.
#[derive(Clone, Debug)]
pub(crate) struct RpcError {
    code: i64,
    message: String,
    data: Option<String>,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    fn parse_error(data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::new(-32700, "parse error")
        }
    }

    fn invalid_request(data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::new(-32600, "invalid request")
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            data: Some(format!("method `{method}` is not known")),
            ..Self::new(-32601, "method not found")
        }
    }

    pub(crate) fn invalid_params(data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::new(-32602, "invalid params")
        }
    }

    pub(crate) fn internal(data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::new(-32603, "internal error")
        }
    }

    /// Application-level failure, e.g. a height that is not available.
    pub(crate) fn server_error(data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::new(-32000, "server error")
        }
    }

    fn into_value(self) -> Value {
        json!({
            "code": self.code,
            "message": self.message,
            "data": self.data,
        })
    }
}
