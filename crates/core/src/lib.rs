pub mod client;
pub mod credentials;
pub mod error;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod model;
pub mod parse;
pub mod preferences;
pub mod selectors;
pub mod storage;
pub mod transform;
pub mod xpath;

pub use client::{AnytypeClient, APP_NAME, DEFAULT_BASE_URL, validate_pairing_code};
pub use credentials::CredentialStore;
pub use error::{ExcerpoError, Result};
pub use export::{BatchReport, ExportController, ExportDestination, ExportTarget, default_title};
pub use extract::{ExtractConfig, extract};
pub use fetch::{FetchConfig, fetch_file, fetch_stdin, fetch_url};
pub use model::{ContentBlock, PairingSession};
pub use parse::{Document, Element};
pub use preferences::{PreferenceStore, Selection, pick_space, pick_template, pick_type};
pub use selectors::{ArticleSelectors, Category, ResearchSelectors};
pub use storage::Storage;
pub use transform::{normalize_image_url, transform, transform_description, transform_fragment};
#[doc(hidden)]
pub use xpath::XPathEvaluator;
