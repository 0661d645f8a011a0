//! SQLite schema definitions
//!
//! Initial schema with all tables. No migrations needed for first version.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema SQL
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at INTEGER NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms INTEGER,
    success INTEGER NOT NULL DEFAULT 1
);

-- =============================================================================
-- 1. Tenants (isolation boundary, must be first due to FKs)
-- =============================================================================
CREATE TABLE IF NOT EXISTS tenants (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL CHECK(length(name) >= 1 AND length(name) <= 100),
    -- Facebook page owned by this tenant; routes incoming webhook entries
    fb_page_id TEXT,
    -- Shared secret presented by website form posts (x-webhook-key header)
    webhook_key TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_tenants_fb_page
    ON tenants(fb_page_id) WHERE fb_page_id IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS idx_tenants_webhook_key ON tenants(webhook_key);

-- =============================================================================
-- 2. Users
-- =============================================================================
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    email TEXT NOT NULL CHECK(length(email) >= 3),
    first_name TEXT NOT NULL DEFAULT '',
    last_name TEXT NOT NULL DEFAULT '',
    role TEXT NOT NULL DEFAULT 'member' CHECK(role IN ('viewer', 'member', 'manager', 'admin')),
    is_active INTEGER NOT NULL DEFAULT 1,
    -- SHA-256 of the user's bearer token; NULL means no API access
    api_token_hash TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (tenant_id, email)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_users_token
    ON users(api_token_hash) WHERE api_token_hash IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_users_tenant_active ON users(tenant_id, is_active);

-- =============================================================================
-- 3. Pipeline status catalog (seeded, referenced by lead_data/lead_stages)
-- =============================================================================
CREATE TABLE IF NOT EXISTS lead_statuses (
    name TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    sort_order INTEGER NOT NULL,
    is_terminal INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO lead_statuses (name, display_name, sort_order, is_terminal) VALUES
    ('new', 'New', 1, 0),
    ('qualified', 'Qualified', 2, 0),
    ('contacted', 'Contacted', 3, 0),
    ('meeting_scheduled', 'Meeting Scheduled', 4, 0),
    ('proposal_sent', 'Proposal Sent', 5, 0),
    ('negotiation', 'Negotiation', 6, 0),
    ('won', 'Won', 7, 1),
    ('lost', 'Lost', 8, 1);

-- =============================================================================
-- 4. Lead ingestion metadata
-- =============================================================================
CREATE TABLE IF NOT EXISTS lead_meta (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    platform TEXT NOT NULL CHECK(platform IN ('facebook', 'website')),
    external_id TEXT NOT NULL,
    page_id TEXT,
    form_id TEXT,
    ad_id TEXT,
    adset_id TEXT,
    campaign_id TEXT,
    page_url TEXT,
    utm_source TEXT,
    utm_medium TEXT,
    utm_campaign TEXT,
    utm_term TEXT,
    utm_content TEXT,
    -- When the provider created the lead (unix seconds)
    source_created_at INTEGER,
    processing_status TEXT NOT NULL DEFAULT 'received'
        CHECK(processing_status IN ('received', 'processed', 'failed')),
    processing_error TEXT,
    received_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (tenant_id, platform, external_id)
);

CREATE INDEX IF NOT EXISTS idx_lead_meta_status ON lead_meta(tenant_id, processing_status);

-- =============================================================================
-- 5. Lead data (canonical contact record, 1:1 with lead_meta)
-- =============================================================================
CREATE TABLE IF NOT EXISTS lead_data (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    meta_id TEXT NOT NULL UNIQUE REFERENCES lead_meta(id) ON DELETE CASCADE,
    email TEXT,
    phone TEXT,
    first_name TEXT,
    last_name TEXT,
    full_name TEXT,
    company TEXT,
    job_title TEXT,
    city TEXT,
    state TEXT,
    country TEXT,
    zip_code TEXT,
    message TEXT,
    -- Original provider payload (JSON text), preserved verbatim
    raw_payload TEXT NOT NULL DEFAULT '{}',
    consent_at INTEGER,
    -- Denormalized pipeline status; lead_stages is authoritative per interval
    status TEXT NOT NULL DEFAULT 'new' REFERENCES lead_statuses(name),
    -- Denormalized assignee; assignment_events is the source of truth
    assigned_user_id TEXT REFERENCES users(id),
    assigned_at INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_lead_data_tenant_status ON lead_data(tenant_id, status);
CREATE INDEX IF NOT EXISTS idx_lead_data_tenant_assignee ON lead_data(tenant_id, assigned_user_id);
CREATE INDEX IF NOT EXISTS idx_lead_data_tenant_created ON lead_data(tenant_id, created_at);

-- =============================================================================
-- 6. Stage history (one row per status interval, ordered by per-lead seq)
-- =============================================================================
CREATE TABLE IF NOT EXISTS lead_stages (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    lead_id TEXT NOT NULL REFERENCES lead_data(id) ON DELETE CASCADE,
    status TEXT NOT NULL REFERENCES lead_statuses(name),
    -- Explicit per-lead ordering; never reconstructed from timestamps
    seq INTEGER NOT NULL,
    acting_user_id TEXT REFERENCES users(id),
    entered_at INTEGER NOT NULL,
    exited_at INTEGER,
    duration_hours REAL,
    notes TEXT,
    next_action TEXT,
    UNIQUE (lead_id, seq)
);

-- At most one open stage per lead
CREATE UNIQUE INDEX IF NOT EXISTS idx_lead_stages_open
    ON lead_stages(lead_id) WHERE exited_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_lead_stages_tenant_status
    ON lead_stages(tenant_id, status, entered_at);

-- =============================================================================
-- 7. Assignments (single-row snapshot + append-only event log)
-- =============================================================================
CREATE TABLE IF NOT EXISTS lead_assignments (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    lead_id TEXT NOT NULL UNIQUE REFERENCES lead_data(id) ON DELETE CASCADE,
    assigned_user_id TEXT REFERENCES users(id),
    assigned_by_user_id TEXT REFERENCES users(id),
    previous_user_id TEXT REFERENCES users(id),
    reason TEXT,
    notes TEXT,
    assigned_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_lead_assignments_tenant_user
    ON lead_assignments(tenant_id, assigned_user_id);

CREATE TABLE IF NOT EXISTS assignment_events (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    lead_id TEXT NOT NULL REFERENCES lead_data(id) ON DELETE CASCADE,
    assigned_user_id TEXT REFERENCES users(id),
    assigned_by_user_id TEXT REFERENCES users(id),
    previous_user_id TEXT REFERENCES users(id),
    reason TEXT,
    notes TEXT,
    assigned_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_assignment_events_lead ON assignment_events(lead_id, assigned_at);
CREATE INDEX IF NOT EXISTS idx_assignment_events_tenant
    ON assignment_events(tenant_id, assigned_at);

-- =============================================================================
-- 8. Activities
-- =============================================================================
CREATE TABLE IF NOT EXISTS lead_activities (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    lead_id TEXT NOT NULL REFERENCES lead_data(id) ON DELETE CASCADE,
    user_id TEXT REFERENCES users(id),
    activity_type TEXT NOT NULL CHECK(activity_type IN
        ('call', 'email', 'meeting', 'note', 'status_change', 'assignment', 'follow_up')),
    description TEXT NOT NULL DEFAULT '',
    follow_up_at INTEGER,
    priority TEXT NOT NULL DEFAULT 'medium'
        CHECK(priority IN ('low', 'medium', 'high', 'urgent')),
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK(status IN ('pending', 'completed', 'cancelled')),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_lead_activities_lead ON lead_activities(lead_id, created_at);
CREATE INDEX IF NOT EXISTS idx_lead_activities_tenant_type
    ON lead_activities(tenant_id, activity_type);
CREATE INDEX IF NOT EXISTS idx_lead_activities_follow_up
    ON lead_activities(tenant_id, status, follow_up_at)
    WHERE follow_up_at IS NOT NULL;
"#;
