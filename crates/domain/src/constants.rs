//! SDK constants
//!
//! Centralized location for defaults and wire-level constants.

// Configuration defaults
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_TOKEN_BUFFER_SECS: u64 = 60;
pub const DEFAULT_RATE_LIMIT_CALLS: u32 = 20;
pub const DEFAULT_RATE_LIMIT_PERIOD_SECS: u64 = 60;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 500;
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;
pub const DEFAULT_BULK_BATCH_SIZE: usize = 100;
pub const DEFAULT_BULK_CONCURRENCY: usize = 4;
pub const DEFAULT_PAGE_LIMIT: u32 = 100;
/// Upper bound on any server-sent `Retry-After` pause
pub const MAX_RETRY_AFTER_SECS: u64 = 3_600;
pub const DEFAULT_USER_AGENT: &str = concat!("pimsdk/", env!("CARGO_PKG_VERSION"));

// Endpoints
pub const TOKEN_PATH: &str = "/api/oauth/v1/token";
pub const PRODUCTS_UUID_PATH: &str = "/api/rest/v1/products-uuid";
pub const PRODUCTS_PATH: &str = "/api/rest/v1/products";
pub const PRODUCT_MODELS_PATH: &str = "/api/rest/v1/product-models";
pub const FAMILIES_PATH: &str = "/api/rest/v1/families";
pub const CATEGORIES_PATH: &str = "/api/rest/v1/categories";
pub const MEDIA_FILES_PATH: &str = "/api/rest/v1/media-files";
pub const CATEGORY_MEDIA_FILES_PATH: &str = "/api/rest/v1/category-media-files";

// Content types
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const COLLECTION_CONTENT_TYPE: &str = "application/vnd.akeneo.collection+json";

// Pagination link relations
pub const REL_SELF: &str = "self";
pub const REL_FIRST: &str = "first";
pub const REL_PREVIOUS: &str = "previous";
pub const REL_NEXT: &str = "next";
pub const REL_LAST: &str = "last";
