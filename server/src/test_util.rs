//! test utilities. Provides fakes for the location, feed and mission
//! collaborators.

use crate::location::{
    Fix, FixedLocation, LocationAcquirer, LocationError, LocationProvider, LocationRequest,
};
use crate::tracking::feed::{FeedConnector, FeedError, FeedEvent, FeedStream};
use crate::tracking::session::SessionPublisher;
use crate::tracking::{Coordinate, DeliverySession, PositionSource, SessionState};
use futures::channel::mpsc;
use futures::future::BoxFuture;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Writes a debug! message to the test::ut logger
macro_rules! ut_debug {
    ($($arg:tt)+) => {
        log::debug!(target: "test::ut", $($arg)+)
    };
}

/// Writes an info! message to the test::ut logger
macro_rules! ut_info {
    ($($arg:tt)+) => {
        log::info!(target: "test::ut", $($arg)+)
    };
}

/// Writes a warn! message to the test::ut logger
#[allow(unused_macros)]
macro_rules! ut_warn {
    ($($arg:tt)+) => {
        log::warn!(target: "test::ut", $($arg)+)
    };
}

/// Writes an error! message to the test::ut logger
macro_rules! ut_error {
    ($($arg:tt)+) => {
        log::error!(target: "test::ut", $($arg)+)
    };
}

/// Upper bound for [`wait_for`]
const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// Shared liveness flag of an [`IdleSource`] task
#[derive(Debug, Clone, Default)]
pub struct AliveFlag(Arc<AtomicBool>);

impl AliveFlag {
    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Position source that never moves the drone, it only waits to be
/// cancelled.
#[derive(Debug, Default)]
pub struct IdleSource {
    alive: AliveFlag,
}

impl IdleSource {
    pub fn boxed() -> Box<dyn PositionSource> {
        Box::<IdleSource>::default()
    }

    pub fn tracked() -> (IdleSource, AliveFlag) {
        let source = IdleSource::default();
        let alive = source.alive.clone();
        (source, alive)
    }
}

impl PositionSource for IdleSource {
    fn name(&self) -> &'static str {
        "idle"
    }

    fn run(
        self: Box<Self>,
        publisher: SessionPublisher,
        _destination: Coordinate,
    ) -> BoxFuture<'static, ()> {
        let alive = self.alive.clone();
        Box::pin(async move {
            alive.0.store(true, Ordering::SeqCst);
            publisher.cancel_token().cancelled().await;
            alive.0.store(false, Ordering::SeqCst);
        })
    }
}

/// Feed whose connections are fed by the test through channels.
///
/// Each [`ChannelFeed::push_connection`] queues one successful
/// connection; connecting with an empty queue fails.
#[derive(Debug, Default)]
pub struct ChannelFeed {
    pending: Mutex<VecDeque<mpsc::UnboundedReceiver<FeedEvent>>>,
    connections: AtomicUsize,
}

impl ChannelFeed {
    pub fn new() -> Arc<ChannelFeed> {
        Arc::new(ChannelFeed::default())
    }

    /// Queue a connection, events sent on the returned channel are
    /// delivered on it
    pub fn push_connection(&self) -> mpsc::UnboundedSender<FeedEvent> {
        let (sender, receiver) = mpsc::unbounded();
        self.pending
            .lock()
            .expect("feed queue poisoned")
            .push_back(receiver);
        sender
    }

    /// Successful connections so far
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl FeedConnector for ChannelFeed {
    fn endpoint(&self) -> String {
        String::from("channel://test")
    }

    fn connect(&self) -> BoxFuture<'_, Result<FeedStream, FeedError>> {
        Box::pin(async move {
            let next = self.pending.lock().expect("feed queue poisoned").pop_front();
            match next {
                Some(receiver) => {
                    self.connections.fetch_add(1, Ordering::SeqCst);
                    Ok(receiver.boxed())
                }
                None => Err(FeedError::Connect(String::from("no connection queued"))),
            }
        })
    }
}

/// Location provider answering with a fixed result after a delay
#[derive(Debug, Clone)]
pub struct ScriptedLocation {
    delay: Duration,
    result: Result<Fix, LocationError>,
}

impl ScriptedLocation {
    pub fn failing(error: LocationError) -> Self {
        ScriptedLocation {
            delay: Duration::ZERO,
            result: Err(error),
        }
    }

    pub fn delayed(delay: Duration, latitude: f64, longitude: f64) -> Self {
        ScriptedLocation {
            delay,
            result: Ok(Fix {
                latitude,
                longitude,
                accuracy_meters: Some(5.0),
            }),
        }
    }
}

impl LocationProvider for ScriptedLocation {
    fn current_position<'a>(
        &'a self,
        _request: &'a LocationRequest,
    ) -> BoxFuture<'a, Result<Fix, LocationError>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            self.result.clone()
        })
    }
}

/// Acquirer that always finds the customer at `coordinate`
pub fn fixed_acquirer(coordinate: Coordinate) -> LocationAcquirer {
    LocationAcquirer::new(
        Some(Arc::new(FixedLocation::new(
            coordinate.latitude(),
            coordinate.longitude(),
        ))),
        LocationRequest::default(),
    )
}

/// A session whose customer was found at `destination`
pub async fn located_session(destination: Coordinate) -> DeliverySession {
    let mut session = DeliverySession::new();
    session
        .locate(&fixed_acquirer(destination))
        .await
        .expect("fixed location never fails");
    session
}

/// Wait until the session state satisfies `predicate`, panics after
/// [`WAIT_LIMIT`].
pub async fn wait_for<F>(receiver: &mut watch::Receiver<SessionState>, predicate: F) -> SessionState
where
    F: Fn(&SessionState) -> bool,
{
    let wait = async {
        loop {
            {
                let state = receiver.borrow_and_update();
                if predicate(&state) {
                    return state.clone();
                }
            }

            if receiver.changed().await.is_err() {
                let state = receiver.borrow().clone();
                ut_error!("(wait_for) session closed in state {:?}", state);
                panic!("session closed before the expected state");
            }
        }
    };

    match tokio::time::timeout(WAIT_LIMIT, wait).await {
        Ok(state) => state,
        Err(_) => {
            ut_error!("(wait_for) gave up, last state {:?}", receiver.borrow().clone());
            panic!("expected session state not reached in {:?}", WAIT_LIMIT);
        }
    }
}

/// Serve exactly one HTTP request on a local port.
///
/// Returns the base URL and a handle resolving to the raw request text.
pub async fn stub_http_server(status: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("could not bind stub server");
    let address = listener.local_addr().expect("stub server has no address");
    let response = format!(
        "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("stub server accept failed");
        let mut request = Vec::new();
        let mut buffer = [0u8; 4096];

        loop {
            let read = socket.read(&mut buffer).await.expect("stub server read failed");
            if read == 0 {
                break;
            }
            request.extend_from_slice(&buffer[..read]);
            if request_complete(&request) {
                break;
            }
        }

        socket
            .write_all(response.as_bytes())
            .await
            .expect("stub server write failed");
        let _ = socket.shutdown().await;

        let request = String::from_utf8_lossy(&request).into_owned();
        ut_debug!("(stub_http_server) served request: {}", request);
        request
    });

    (format!("http://{}", address), handle)
}

/// Headers received and the body as long as `content-length` says
fn request_complete(request: &[u8]) -> bool {
    let text = String::from_utf8_lossy(request);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };

    let content_length = text[..header_end]
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    request.len() >= header_end + 4 + content_length
}
