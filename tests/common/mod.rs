#![allow(dead_code)]

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{sleep, timeout};

use session_link::{Error, Message, RawPayload, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    pub count: i64,
}

impl Message for Ping {
    const TAG: &'static str = "ping";

    fn to_fields(&self) -> Result<RawPayload> {
        session_link::to_fields(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pong {
    pub count: i64,
}

impl Message for Pong {
    const TAG: &'static str = "pong";

    fn to_fields(&self) -> Result<RawPayload> {
        session_link::to_fields(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub title: String,
    pub position_s: f64,
    pub volume: i32,
    pub queue: Vec<String>,
}

impl Message for NowPlaying {
    const TAG: &'static str = "now_playing";

    fn to_fields(&self) -> Result<RawPayload> {
        session_link::to_fields(self)
    }
}

/// Build a payload from a `json!` object literal.
pub fn payload(value: Value) -> RawPayload {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

/// Shared log of values seen by a subscriber.
pub fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(T) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |value: T| sink.lock().unwrap().push(value))
}

/// Poll `check` until it holds or a second passes.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    // ---
    let poll = async {
        while !check() {
            sleep(Duration::from_millis(5)).await;
        }
    };
    timeout(Duration::from_secs(1), poll).await.is_ok()
}

/// Await a future with a test-sized timeout.
pub async fn within<T>(fut: impl Future<Output = T>) -> T {
    timeout(Duration::from_secs(1), fut)
        .await
        .expect("timed out")
}

pub fn is_inactive(result: &Result<()>) -> bool {
    matches!(result, Err(Error::InactiveSession))
}

#[cfg(feature = "logging")]
mod imp {
    use std::sync::Once;
    use tracing_subscriber::{fmt as tracing_format, EnvFilter};

    static INIT: Once = Once::new();

    pub fn init() {
        INIT.call_once(|| {
            let _ = tracing_format()
                .with_env_filter(EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        });
    }
}

#[cfg(not(feature = "logging"))]
mod imp {
    #[inline]
    pub fn init() {}
}

pub fn init_logging() {
    imp::init();
}
