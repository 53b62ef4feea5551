use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use url::Url;

use avatar_picker::{AvatarError, AvatarFetcher, AvatarSource, RetryPolicy};

const SEED: &str = "45678945";

#[derive(Clone)]
struct Generator {
    hits: Arc<AtomicUsize>,
    /// The first `limited` requests are answered with 429.
    limited: usize,
    /// Candidates with this number answer 500.
    broken: Option<u32>,
    /// Lower numbers answer later.
    stagger: bool,
}

impl Generator {
    fn new() -> Self {
        Self {
            hits: Arc::new(AtomicUsize::new(0)),
            limited: 0,
            broken: None,
            stagger: false,
        }
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn avatar(
    State(state): State<Generator>,
    Path((_seed, number)): Path<(String, u32)>,
) -> Response {
    let hit = state.hits.fetch_add(1, Ordering::SeqCst) + 1;
    if hit <= state.limited {
        return StatusCode::TOO_MANY_REQUESTS.into_response();
    }
    if state.broken == Some(number) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if state.stagger {
        let delay = 50 * 5u64.saturating_sub(number as u64);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    (StatusCode::OK, format!("<svg>{}</svg>", number)).into_response()
}

async fn serve(state: Generator) -> Url {
    let app = Router::new()
        .route("/:seed/:number", get(avatar))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{}", addr)).unwrap()
}

fn fetcher(base: Url) -> AvatarFetcher {
    AvatarFetcher::new(
        base,
        SEED.to_owned(),
        RetryPolicy::new(3, Duration::from_millis(10)),
    )
    .unwrap()
}

fn body(candidate: &avatar_picker::AvatarCandidate) -> String {
    String::from_utf8(candidate.decode().unwrap()).unwrap()
}

#[tokio::test]
async fn results_follow_request_order() {
    let state = Generator {
        stagger: true,
        ..Generator::new()
    };
    let fetcher = fetcher(serve(state.clone()).await);
    let urls: Vec<Url> = (0..5)
        .map(|n| fetcher.candidate_url(n).unwrap())
        .collect();

    let avatars = fetcher.fetch_urls(&urls).await.unwrap();

    assert_eq!(avatars.len(), 5);
    for (n, avatar) in avatars.iter().enumerate() {
        assert_eq!(body(avatar), format!("<svg>{}</svg>", n));
    }
    assert_eq!(state.hits(), 5);
}

#[tokio::test]
async fn fetch_all_returns_requested_count() {
    let state = Generator::new();
    let fetcher = fetcher(serve(state.clone()).await);

    for count in [1, 4, 7] {
        let avatars = fetcher.fetch_all(count).await.unwrap();
        assert_eq!(avatars.len(), count);
        assert!(avatars.iter().all(|a| body(a).starts_with("<svg>")));
    }
    assert_eq!(state.hits(), 12);
}

#[tokio::test]
async fn rate_limit_is_retried_with_backoff() {
    let state = Generator {
        limited: 3,
        ..Generator::new()
    };
    let fetcher = fetcher(serve(state.clone()).await);
    let url = fetcher.candidate_url(7).unwrap();

    let started = Instant::now();
    let avatar = fetcher.fetch_one_with_retry(&url).await.unwrap();

    assert_eq!(body(&avatar), "<svg>7</svg>");
    assert_eq!(state.hits(), 4);
    assert!(started.elapsed() >= Duration::from_millis(10 + 20 + 40));
}

#[tokio::test]
async fn persistent_rate_limit_gives_up() {
    let state = Generator {
        limited: usize::MAX,
        ..Generator::new()
    };
    let fetcher = fetcher(serve(state.clone()).await);
    let url = fetcher.candidate_url(7).unwrap();

    let result = fetcher.fetch_one_with_retry(&url).await;

    assert!(matches!(result, Err(AvatarError::RateLimited { .. })));
    assert_eq!(state.hits(), 4);
}

#[tokio::test]
async fn server_error_is_not_retried() {
    let state = Generator {
        broken: Some(7),
        ..Generator::new()
    };
    let fetcher = fetcher(serve(state.clone()).await);
    let url = fetcher.candidate_url(7).unwrap();

    let result = fetcher.fetch_one_with_retry(&url).await;

    assert!(matches!(
        result,
        Err(AvatarError::Upstream { status: 500, .. })
    ));
    assert_eq!(state.hits(), 1);
}

#[tokio::test]
async fn one_broken_candidate_fails_the_batch() {
    let state = Generator {
        broken: Some(2),
        ..Generator::new()
    };
    let fetcher = fetcher(serve(state).await);
    let urls: Vec<Url> = (0..4)
        .map(|n| fetcher.candidate_url(n).unwrap())
        .collect();

    let result = fetcher.fetch_urls(&urls).await;

    assert!(matches!(
        result,
        Err(AvatarError::Upstream { status: 500, .. })
    ));
}

#[tokio::test]
async fn unreachable_generator_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let fetcher =
        fetcher(Url::parse(&format!("http://{}", addr)).unwrap());

    let result = fetcher.fetch_all(2).await;

    assert!(matches!(result, Err(AvatarError::Transport(_))));
}
