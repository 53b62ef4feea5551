use crate::api::AvatarApi;
use crate::fetcher::AvatarSource;
use crate::model::{AvatarCandidate, AvatarList, SessionUser};
use crate::config::DEFAULT_CANDIDATE_COUNT;
use crate::storage::{
    has_session_user, load_session_user, store_session_user, SessionStorage,
};
use crate::ui::{Navigator, Notifier, Route, ToastOptions};
use crate::{AvatarError, Result};

pub const FETCH_FAILED: &str =
    "Error fetching avatars. Please try again later.";
pub const NOTHING_SELECTED: &str = "Please select an avatar";
pub const SET_FAILED: &str = "Error setting avatar. Please try again";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Submitting,
    /// The page navigated away, nothing is accepted anymore.
    Done,
}

impl Phase {
    fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Submitting => "submitting",
            Phase::Done => "done",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mount {
    Ready,
    Redirected,
}

/// What happened to a submission. Failures were already shown to the user.
#[derive(Debug)]
pub enum Submission {
    Saved(SessionUser),
    NothingSelected,
    Rejected,
    Failed(AvatarError),
    Ignored,
}

/// State of the "pick your avatar" page.
///
/// `mount` checks the session and loads the candidates once, `select`
/// and `submit` follow user input. All collaborators are injected.
pub struct SetAvatarPage {
    storage: Box<dyn SessionStorage + Send>,
    source: Box<dyn AvatarSource>,
    api: Box<dyn AvatarApi>,
    navigator: Box<dyn Navigator + Send>,
    notifier: Box<dyn Notifier + Send>,
    toast: ToastOptions,
    candidate_count: usize,
    avatars: AvatarList,
    selected: Option<usize>,
    is_loading: bool,
    uploading: bool,
    fetched: bool,
    phase: Phase,
}

impl SetAvatarPage {
    pub fn new(
        storage: Box<dyn SessionStorage + Send>,
        source: Box<dyn AvatarSource>,
        api: Box<dyn AvatarApi>,
        navigator: Box<dyn Navigator + Send>,
        notifier: Box<dyn Notifier + Send>,
    ) -> Self {
        Self {
            storage,
            source,
            api,
            navigator,
            notifier,
            toast: ToastOptions::default(),
            candidate_count: DEFAULT_CANDIDATE_COUNT,
            avatars: Vec::new(),
            selected: None,
            is_loading: true,
            uploading: false,
            fetched: false,
            phase: Phase::Idle,
        }
    }

    pub fn with_candidate_count(mut self, count: usize) -> Self {
        self.candidate_count = count;
        self
    }

    pub fn with_toast_options(mut self, toast: ToastOptions) -> Self {
        self.toast = toast;
        self
    }

    pub fn avatars(&self) -> &[AvatarCandidate] {
        &self.avatars
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn storage(&self) -> &(dyn SessionStorage + Send) {
        &*self.storage
    }

    /// Page entry. Without a session user the page redirects to the login
    /// screen before anything is fetched. The record itself is only parsed
    /// on submit.
    pub async fn mount(&mut self) -> Mount {
        let logged_in = match has_session_user(&*self.storage) {
            Ok(present) => present,
            Err(e) => {
                log::warn!("session storage is unreadable: {}", e);
                false
            }
        };
        if !logged_in {
            log::info!("no session user, redirecting to {}", Route::Login);
            self.phase = Phase::Done;
            self.navigator.navigate(Route::Login);
            return Mount::Redirected;
        }

        if !self.fetched {
            self.load_avatars().await;
        }
        Mount::Ready
    }

    async fn load_avatars(&mut self) {
        self.fetched = true;
        self.is_loading = true;

        match self.source.fetch_all(self.candidate_count).await {
            Ok(avatars) => {
                log::debug!("{} avatars loaded", avatars.len());
                self.avatars = avatars;
            }
            Err(e) => {
                log::error!("Error fetching avatars: {}", e);
                self.avatars.clear();
                self.notify(FETCH_FAILED);
            }
        }

        self.is_loading = false;
    }

    pub fn select(&mut self, index: usize) -> Result<()> {
        if self.phase != Phase::Idle {
            return Err(AvatarError::InvalidState(self.phase.as_str()));
        }
        if index >= self.avatars.len() {
            return Err(AvatarError::Validation(format!(
                "There is no avatar number {}",
                index
            )));
        }

        self.selected = Some(index);
        Ok(())
    }

    /// Store the selected avatar for the current user.
    pub async fn submit(&mut self) -> Submission {
        if self.phase != Phase::Idle {
            log::debug!("submit ignored while {}", self.phase.as_str());
            return Submission::Ignored;
        }

        let candidate = match self.selected.and_then(|i| self.avatars.get(i))
        {
            Some(candidate) => candidate.clone(),
            None => {
                self.notify(NOTHING_SELECTED);
                return Submission::NothingSelected;
            }
        };

        self.uploading = true;
        self.phase = Phase::Submitting;
        let outcome = self.persist(&candidate).await;
        self.uploading = false;

        match outcome {
            Ok(user) => {
                self.phase = Phase::Done;
                self.navigator.navigate(Route::Home);
                Submission::Saved(user)
            }
            Err(AvatarError::SubmissionRejected) => {
                self.phase = Phase::Idle;
                self.notify(SET_FAILED);
                Submission::Rejected
            }
            Err(e) => {
                log::error!("Error setting profile picture: {}", e);
                self.phase = Phase::Idle;
                self.notify(SET_FAILED);
                Submission::Failed(e)
            }
        }
    }

    async fn persist(
        &mut self,
        candidate: &AvatarCandidate,
    ) -> Result<SessionUser> {
        let mut user = load_session_user(&*self.storage)?
            .ok_or(AvatarError::NoSessionUser)?;

        let response = self.api.set_avatar(&user.id, candidate).await?;
        if !response.is_set {
            return Err(AvatarError::SubmissionRejected);
        }

        // The backend may answer without echoing the image back.
        let image = response
            .image
            .unwrap_or_else(|| candidate.as_base64().to_owned());
        user.set_avatar(image);
        store_session_user(&mut *self.storage, &user)?;

        Ok(user)
    }

    fn notify(&mut self, message: &str) {
        self.notifier.error(message, &self.toast);
    }
}
