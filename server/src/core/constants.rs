// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and platform directories)
pub const APP_NAME: &str = "LeadFlow";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "leadflow";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".leadflow";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "leadflow.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "LEADFLOW_CONFIG";

// =============================================================================
// Environment Variables - Debug
// =============================================================================

/// Environment variable for debug mode
pub const ENV_DEBUG: &str = "LEADFLOW_DEBUG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "LEADFLOW_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "LEADFLOW_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "LEADFLOW_LOG";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 5470;

// =============================================================================
// Environment Variables - Storage
// =============================================================================

/// Environment variable to override data directory
pub const ENV_DATA_DIR: &str = "LEADFLOW_DATA_DIR";

// =============================================================================
// Environment Variables - Facebook Integration
// =============================================================================

/// Environment variable for the Facebook app secret (webhook signatures)
pub const ENV_FB_APP_SECRET: &str = "LEADFLOW_FB_APP_SECRET";

/// Environment variable for the Facebook webhook verify token
pub const ENV_FB_VERIFY_TOKEN: &str = "LEADFLOW_FB_VERIFY_TOKEN";

/// Environment variable for the Facebook page access token
pub const ENV_FB_ACCESS_TOKEN: &str = "LEADFLOW_FB_ACCESS_TOKEN";

// =============================================================================
// Facebook Graph API
// =============================================================================

/// Graph API base URL (overridable in config for tests)
pub const FB_GRAPH_BASE: &str = "https://graph.facebook.com/v18.0";

/// Fields requested when fetching a leadgen object
pub const FB_LEAD_FIELDS: &str = "created_time,ad_id,adset_id,campaign_id,form_id,field_data";

/// Graph API request timeout in seconds
pub const FB_GRAPH_TIMEOUT_SECS: u64 = 10;

/// Graph API fetch attempts (initial call + one retry)
pub const FB_GRAPH_MAX_ATTEMPTS: u32 = 2;

// =============================================================================
// SQLite Database
// =============================================================================

/// SQLite database filename
pub const SQLITE_DB_FILENAME: &str = "leadflow.db";

/// SQLite connection pool max connections
pub const SQLITE_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in seconds
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

/// SQLite cache size (negative = KB, so -64000 = 64MB)
pub const SQLITE_CACHE_SIZE: &str = "-64000";

/// SQLite WAL auto-checkpoint threshold (pages, ~4MB at 1000)
pub const SQLITE_WAL_AUTOCHECKPOINT: &str = "1000";

/// WAL checkpoint interval in seconds (5 minutes)
pub const SQLITE_CHECKPOINT_INTERVAL_SECS: u64 = 300;

// =============================================================================
// Request Body Limits
// =============================================================================

/// Default body limit for general API requests (1 MB)
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Body limit for webhook endpoints (256 KB - provider payloads are small)
pub const WEBHOOK_BODY_LIMIT: usize = 256 * 1024;

// =============================================================================
// Topic Names
// =============================================================================

/// Topic name for inbound lead events awaiting processing
pub const TOPIC_LEAD_EVENTS: &str = "lead-events";

// =============================================================================
// Topic Configuration
// =============================================================================

/// Maximum retained messages per stream before oldest are dropped
pub const DEFAULT_STREAM_MAX_LEN: usize = 100_000;

// =============================================================================
// Shutdown
// =============================================================================

/// Graceful shutdown timeout in seconds (5 minutes)
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 300;

// =============================================================================
// Webhooks
// =============================================================================

/// Header carrying the Facebook payload signature
pub const HEADER_HUB_SIGNATURE: &str = "x-hub-signature-256";

/// Header carrying the website form shared key
pub const HEADER_WEBHOOK_KEY: &str = "x-webhook-key";

/// Byte length of generated website webhook keys
pub const WEBHOOK_KEY_BYTES: usize = 24;

// =============================================================================
// Users & Roles
// =============================================================================

/// Tenant role: viewer (read-only access)
pub const ROLE_VIEWER: &str = "viewer";

/// Tenant role: member (read + write access)
pub const ROLE_MEMBER: &str = "member";

/// Tenant role: manager (bulk operations + team visibility)
pub const ROLE_MANAGER: &str = "manager";

/// Tenant role: admin (full tenant control)
pub const ROLE_ADMIN: &str = "admin";

/// Byte length of generated user API tokens
pub const API_TOKEN_BYTES: usize = 32;

// =============================================================================
// Pipeline
// =============================================================================

/// Initial pipeline status for every new lead
pub const STATUS_NEW: &str = "new";

/// Terminal pipeline status: deal won
pub const STATUS_WON: &str = "won";

/// Terminal pipeline status: deal lost
pub const STATUS_LOST: &str = "lost";

/// Environment variable for a transition-graph override file
pub const ENV_TRANSITIONS_FILE: &str = "LEADFLOW_TRANSITIONS_FILE";

// =============================================================================
// Assignment
// =============================================================================

/// Default per-user cap for bulk assignment
pub const DEFAULT_MAX_LEADS_PER_USER: u32 = 20;

// =============================================================================
// Ingestion
// =============================================================================

/// Platform identifier for Facebook Lead Ads
pub const PLATFORM_FACEBOOK: &str = "facebook";

/// Platform identifier for website contact forms
pub const PLATFORM_WEBSITE: &str = "website";

/// Meta processing status: stored, details not yet fetched/normalized
pub const PROCESSING_RECEIVED: &str = "received";

/// Meta processing status: lead fully normalized and stored
pub const PROCESSING_PROCESSED: &str = "processed";

/// Meta processing status: fetch or normalize failed (error recorded)
pub const PROCESSING_FAILED: &str = "failed";
