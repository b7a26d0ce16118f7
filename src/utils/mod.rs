pub mod url;
pub use self::url::{UrlError, join_path, normalize_base_url, same_origin};
