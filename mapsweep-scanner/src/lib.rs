pub mod browser;
pub mod email;
pub mod error;
pub mod extract;
pub mod pacing;
pub mod record;
pub mod retry;
pub mod walker;
pub mod webdriver;

pub use browser::{Browser, Locator, SelectorTable, SessionLauncher};
pub use email::{EmailLookup, HttpEmailLookup};
pub use error::{ErrorKind, SweepError};
pub use pacing::{DelayRange, Pacing};
pub use record::{BusinessRecord, OUTPUT_HEADER, SearchTerm};
pub use retry::{Backoff, RetryPolicy};
pub use walker::{SearchScraper, Walker, WalkerConfig};
pub use webdriver::{WebDriverBrowser, WebDriverLauncher};
