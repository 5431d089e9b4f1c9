//! Transport selection, dry-run, and queue-gate behavior, exercised
//! with counting fake transports.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mixpa::visibility::{self, Visibility, VisibilityListener, VisibilitySource};
use mixpa::{
    BeaconSender, BoxFuture, CallbackSender, DebugLevel, Error, ExecuteSend, HttpSender, Method,
    Mixpa, OutboundRequest, Properties, TransportError, TransportReply,
};
use serde_json::Value;

#[derive(Clone, Default)]
struct CountingBeacon {
    hits: Arc<AtomicUsize>,
}

impl BeaconSender for CountingBeacon {
    fn send(&self, _url: &str, _payload: &str) -> bool {
        self.hits.fetch_add(1, Ordering::SeqCst);
        true
    }
}

#[derive(Clone, Default)]
struct CountingHttp {
    hits: Arc<AtomicUsize>,
}

#[async_trait]
impl HttpSender for CountingHttp {
    async fn send(&self, _request: OutboundRequest) -> Result<TransportReply, TransportError> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        Ok(TransportReply {
            status: 200,
            body: None,
        })
    }
}

#[derive(Clone, Default)]
struct CountingCallback {
    hits: Arc<AtomicUsize>,
}

impl CallbackSender for CountingCallback {
    fn send(
        &self,
        _request: OutboundRequest,
        done: Box<dyn FnOnce(Result<TransportReply, TransportError>) + Send>,
    ) {
        self.hits.fetch_add(1, Ordering::SeqCst);
        done(Ok(TransportReply {
            status: 200,
            body: None,
        }));
    }
}

struct FakeVisibility {
    state: Mutex<Visibility>,
    listener: Mutex<Option<VisibilityListener>>,
}

impl FakeVisibility {
    fn new(state: Visibility) -> Self {
        Self {
            state: Mutex::new(state),
            listener: Mutex::new(None),
        }
    }

    fn fire(&self, state: Visibility) {
        *self.state.lock().unwrap() = state;
        if let Some(listener) = self.listener.lock().unwrap().as_ref() {
            listener(state);
        }
    }
}

impl VisibilitySource for FakeVisibility {
    fn visibility(&self) -> Visibility {
        *self.state.lock().unwrap()
    }

    fn on_change(&self, listener: VisibilityListener) {
        *self.listener.lock().unwrap() = Some(listener);
    }
}

/// The only test in this binary that touches the process-wide
/// visibility flag; it restores the visible state before finishing.
#[tokio::test]
async fn test_hidden_page_routes_through_beacon() {
    let beacon = CountingBeacon::default();
    let http = CountingHttp::default();
    let client = Mixpa::builder("tk_test")
        .beacon(beacon.clone())
        .http(http.clone())
        .build()
        .unwrap();

    let source = FakeVisibility::new(Visibility::Hidden);
    visibility::install(&source);

    client
        .set_user_props_for("U1", Properties::new().insert("$name", "Ada"))
        .await
        .unwrap();

    assert_eq!(beacon.hits.load(Ordering::SeqCst), 1);
    assert_eq!(http.hits.load(Ordering::SeqCst), 0);

    source.fire(Visibility::Visible);

    client
        .set_user_props_for("U1", Properties::new().insert("$name", "Ada"))
        .await
        .unwrap();

    assert_eq!(beacon.hits.load(Ordering::SeqCst), 1);
    assert_eq!(http.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dry_run_invokes_no_transport() {
    let beacon = CountingBeacon::default();
    let http = CountingHttp::default();
    let client = Mixpa::builder("tk_test")
        .debug(DebugLevel::DryRun)
        .beacon(beacon.clone())
        .http(http.clone())
        .build()
        .unwrap();

    client.track("dry", Properties::new());
    client
        .set_user_props_for("U1", Properties::new().insert("$name", "Ada"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(beacon.hits.load(Ordering::SeqCst), 0);
    assert_eq!(http.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_callback_transport_serves_when_alone() {
    let callback = CountingCallback::default();
    let client = Mixpa::builder("tk_test")
        .callback(callback.clone())
        .build()
        .unwrap();

    client
        .set_user_props_for("U1", Properties::new().insert("$name", "Ada"))
        .await
        .unwrap();

    assert_eq!(callback.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_gate_that_withholds_sends_nothing() {
    let http = CountingHttp::default();
    let recorded: Arc<Mutex<Vec<(Method, Value)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = recorded.clone();
    let client = Mixpa::builder("tk_test")
        .http(http.clone())
        .queue(move |send: ExecuteSend, method, data| {
            let sink = sink.clone();
            let fut: BoxFuture<Result<(), Error>> = Box::pin(async move {
                sink.lock().unwrap().push((method, data));
                drop(send);
                Ok(())
            });
            fut
        })
        .build()
        .unwrap();

    client.track("suppressed", Properties::new().insert("plan", "pro"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(http.hits.load(Ordering::SeqCst), 0);
    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].0, Method::Track);
    assert_eq!(recorded[0].1["event"], "suppressed");
    assert_eq!(recorded[0].1["properties"]["plan"], "pro");
}

#[tokio::test]
async fn test_gate_can_defer_the_send() {
    let http = CountingHttp::default();
    let parked: Arc<Mutex<Vec<ExecuteSend>>> = Arc::new(Mutex::new(Vec::new()));
    let lot = parked.clone();
    let client = Mixpa::builder("tk_test")
        .http(http.clone())
        .queue(move |send: ExecuteSend, _method, _data| {
            let lot = lot.clone();
            let fut: BoxFuture<Result<(), Error>> = Box::pin(async move {
                lot.lock().unwrap().push(send);
                Ok(())
            });
            fut
        })
        .build()
        .unwrap();

    client.track("deferred", Properties::new());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(http.hits.load(Ordering::SeqCst), 0);

    let send = parked.lock().unwrap().pop().expect("gate parked the send");
    send().await.unwrap();
    assert_eq!(http.hits.load(Ordering::SeqCst), 1);
}
