use std::fmt;
use std::time::Duration;

/// Places the avatar page can send the user to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Login,
    Home,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Home => "/",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

pub trait Navigator {
    fn navigate(&mut self, route: Route);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

/// How an error notification is presented.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToastOptions {
    pub position: ToastPosition,
    pub auto_close: Duration,
    pub pause_on_hover: bool,
    pub draggable: bool,
    pub theme: Theme,
}

impl Default for ToastOptions {
    fn default() -> Self {
        Self {
            position: ToastPosition::BottomRight,
            auto_close: Duration::from_millis(8000),
            pause_on_hover: true,
            draggable: true,
            theme: Theme::Dark,
        }
    }
}

/// User facing error notifications.
pub trait Notifier {
    fn error(&mut self, message: &str, options: &ToastOptions);
}
