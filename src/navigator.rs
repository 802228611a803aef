/// Host hook invoked when the session can no longer be recovered.
///
/// A webview host navigates to `route`; a desktop or terminal host switches
/// to its login screen.
pub trait Navigator: Send + Sync + 'static {
    fn redirect_to_sign_in(&self, route: &str);
}

/// Default navigator: records the redirect in the log and does nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect_to_sign_in(&self, route: &str) {
        tracing::info!(route, "Redirecting to sign-in");
    }
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn redirect_to_sign_in(&self, route: &str) {
        self(route);
    }
}
