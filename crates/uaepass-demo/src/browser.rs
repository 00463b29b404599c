//! Navigator that hands URLs to the system browser.

use tracing::warn;
use uaepass_auth::{Error, Navigator, Result};
use url::Url;

/// Opens URLs with the platform opener, or only prints them.
#[derive(Debug, Clone, Copy)]
pub struct SystemBrowser {
    open: bool,
}

impl SystemBrowser {
    /// Creates a navigator. With `open == false` URLs are only printed.
    pub const fn new(open: bool) -> Self {
        Self { open }
    }
}

impl Navigator for SystemBrowser {
    fn navigate(&self, url: &Url) -> Result<()> {
        println!("\n  {url}\n");
        if !self.open {
            return Ok(());
        }
        opener::open(url.as_str()).map_err(|e| {
            warn!(error = %e, "failed to open browser");
            Error::NavigationUnavailable
        })
    }
}
