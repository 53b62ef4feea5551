pub mod errors;
pub use errors::{AvatarError, Result};

pub mod api;
pub mod config;
pub mod controller;
pub mod fetcher;
pub mod model;
pub mod retry;
pub mod storage;
pub mod ui;

pub use api::{AvatarApi, HttpAvatarApi};
pub use config::Config;
pub use controller::{Mount, Phase, SetAvatarPage, Submission};
pub use fetcher::{AvatarFetcher, AvatarSource};
pub use model::{AvatarCandidate, AvatarList, SessionUser};
pub use retry::RetryPolicy;
pub use storage::{
    FileStorage, MemoryStorage, SessionStorage, SESSION_USER_KEY,
};
pub use ui::{Navigator, Notifier, Route, ToastOptions};
