//! Navigation seam between the state machine and its host.

use url::Url;

use crate::error::Result;

/// Sends the user agent to a URL (authorize page, provider logout).
///
/// Browser hosts assign the location; desktop hosts open the system browser.
/// A service built without a navigator has no navigable context and
/// `login` fails with [`Error::NavigationUnavailable`](crate::Error::NavigationUnavailable).
pub trait Navigator: Send + Sync {
    /// Navigates to `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot navigate.
    fn navigate(&self, url: &Url) -> Result<()>;
}

impl<F> Navigator for F
where
    F: Fn(&Url) -> Result<()> + Send + Sync,
{
    fn navigate(&self, url: &Url) -> Result<()> {
        self(url)
    }
}
