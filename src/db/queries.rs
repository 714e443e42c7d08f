//! SQL query constants
//!
//! Contains the schema and the queries used by the PostgreSQL store.

/// Schema statements, run in order at startup
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        user_type VARCHAR(16) NOT NULL,
        status VARCHAR(32) NOT NULL,
        name VARCHAR(255) NOT NULL,
        email VARCHAR(255) UNIQUE NOT NULL,
        job_title VARCHAR(255),
        password_hash VARCHAR(255) NOT NULL,
        accepted_terms_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS organizations (
        id UUID PRIMARY KEY,
        legal_name VARCHAR(255) NOT NULL,
        website_url TEXT,
        contact_email VARCHAR(255) NOT NULL,
        active BOOLEAN NOT NULL DEFAULT true,
        possess_all_capabilities BOOLEAN NOT NULL DEFAULT false,
        service_areas TEXT[] NOT NULL DEFAULT '{}',
        accepted_swu_terms_at TIMESTAMPTZ,
        accepted_twu_terms_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS affiliations (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
        membership_type VARCHAR(16) NOT NULL,
        membership_status VARCHAR(16) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        UNIQUE(user_id, organization_id)
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS opportunities (
        id UUID PRIMARY KEY,
        program VARCHAR(32) NOT NULL,
        status VARCHAR(64) NOT NULL,
        title VARCHAR(255) NOT NULL,
        teaser TEXT NOT NULL,
        description TEXT NOT NULL,
        location VARCHAR(255) NOT NULL,
        remote_ok BOOLEAN NOT NULL,
        remote_desc TEXT,
        proposal_deadline TIMESTAMPTZ NOT NULL,
        details JSONB NOT NULL,
        evaluation_panel JSONB NOT NULL DEFAULT '[]',
        addenda JSONB NOT NULL DEFAULT '[]',
        created_by UUID NOT NULL REFERENCES users(id),
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS opportunity_history (
        id UUID PRIMARY KEY,
        opportunity_id UUID NOT NULL REFERENCES opportunities(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL,
        created_by UUID REFERENCES users(id),
        status VARCHAR(64),
        event VARCHAR(64),
        note TEXT,
        CHECK ((status IS NULL) <> (event IS NULL))
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS proposals (
        id UUID PRIMARY KEY,
        program VARCHAR(32) NOT NULL,
        opportunity_id UUID NOT NULL REFERENCES opportunities(id),
        organization_id UUID REFERENCES organizations(id),
        status VARCHAR(64) NOT NULL,
        details JSONB NOT NULL,
        scores JSONB NOT NULL DEFAULT '{}',
        submitted_at TIMESTAMPTZ,
        created_by UUID NOT NULL REFERENCES users(id),
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        UNIQUE(opportunity_id, created_by)
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS proposal_history (
        id UUID PRIMARY KEY,
        proposal_id UUID NOT NULL REFERENCES proposals(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL,
        created_by UUID REFERENCES users(id),
        status VARCHAR(64),
        event VARCHAR(64),
        note TEXT,
        CHECK ((status IS NULL) <> (event IS NULL))
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS evaluations (
        id UUID PRIMARY KEY,
        proposal_id UUID NOT NULL REFERENCES proposals(id),
        opportunity_id UUID NOT NULL REFERENCES opportunities(id),
        evaluator_id UUID NOT NULL REFERENCES users(id),
        kind VARCHAR(16) NOT NULL,
        status VARCHAR(16) NOT NULL,
        scores JSONB NOT NULL DEFAULT '[]',
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        UNIQUE(proposal_id, evaluator_id, kind)
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS subscribers (
        opportunity_id UUID NOT NULL REFERENCES opportunities(id) ON DELETE CASCADE,
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (opportunity_id, user_id)
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS counters (
        name VARCHAR(100) PRIMARY KEY,
        count BIGINT NOT NULL DEFAULT 0
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_opportunities_program ON opportunities(program)",
    "CREATE INDEX IF NOT EXISTS idx_proposals_opportunity_id ON proposals(opportunity_id)",
    "CREATE INDEX IF NOT EXISTS idx_proposals_created_by ON proposals(created_by)",
    "CREATE INDEX IF NOT EXISTS idx_opportunity_history_opportunity_id ON opportunity_history(opportunity_id)",
    "CREATE INDEX IF NOT EXISTS idx_proposal_history_proposal_id ON proposal_history(proposal_id)",
    "CREATE INDEX IF NOT EXISTS idx_evaluations_opportunity_id ON evaluations(opportunity_id)",
];

// ============================================
// Users and sessions
// ============================================

pub const USER_COLUMNS: &str = "id, user_type, status, name, email, job_title, password_hash, \
     accepted_terms_at, created_at, updated_at";

pub const INSERT_USER: &str = r#"
    INSERT INTO users (id, user_type, status, name, email, job_title, password_hash,
                       accepted_terms_at, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
"#;

pub const UPDATE_USER: &str = r#"
    UPDATE users
    SET user_type = $2, status = $3, name = $4, email = $5, job_title = $6,
        password_hash = $7, accepted_terms_at = $8, updated_at = $9
    WHERE id = $1
"#;

pub const INSERT_SESSION: &str =
    "INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES ($1, $2, $3, $4)";

pub const FIND_SESSION: &str =
    "SELECT id, user_id, created_at, expires_at FROM sessions WHERE id = $1";

pub const DELETE_SESSION: &str = "DELETE FROM sessions WHERE id = $1";

// ============================================
// Organizations and affiliations
// ============================================

pub const ORGANIZATION_COLUMNS: &str = "id, legal_name, website_url, contact_email, active, \
     possess_all_capabilities, service_areas, accepted_swu_terms_at, accepted_twu_terms_at, \
     created_at, updated_at";

pub const INSERT_ORGANIZATION: &str = r#"
    INSERT INTO organizations (id, legal_name, website_url, contact_email, active,
                               possess_all_capabilities, service_areas, accepted_swu_terms_at,
                               accepted_twu_terms_at, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
"#;

pub const UPDATE_ORGANIZATION: &str = r#"
    UPDATE organizations
    SET legal_name = $2, website_url = $3, contact_email = $4, active = $5,
        possess_all_capabilities = $6, service_areas = $7, accepted_swu_terms_at = $8,
        accepted_twu_terms_at = $9, updated_at = $10
    WHERE id = $1
"#;

pub const AFFILIATION_COLUMNS: &str =
    "id, user_id, organization_id, membership_type, membership_status, created_at, updated_at";

pub const INSERT_AFFILIATION: &str = r#"
    INSERT INTO affiliations (id, user_id, organization_id, membership_type, membership_status,
                              created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
"#;

pub const UPDATE_AFFILIATION: &str = r#"
    UPDATE affiliations SET membership_type = $2, membership_status = $3, updated_at = $4
    WHERE id = $1
"#;

// ============================================
// Opportunities and proposals
// ============================================

pub const OPPORTUNITY_COLUMNS: &str = "id, program, status, title, teaser, description, location, \
     remote_ok, remote_desc, proposal_deadline, details, evaluation_panel, addenda, created_by, \
     created_at, updated_at";

pub const INSERT_OPPORTUNITY: &str = r#"
    INSERT INTO opportunities (id, program, status, title, teaser, description, location,
                               remote_ok, remote_desc, proposal_deadline, details,
                               evaluation_panel, addenda, created_by, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
"#;

/// Root fields only; history lives in its own table
pub const UPDATE_OPPORTUNITY: &str = r#"
    UPDATE opportunities
    SET status = $2, title = $3, teaser = $4, description = $5, location = $6, remote_ok = $7,
        remote_desc = $8, proposal_deadline = $9, details = $10, evaluation_panel = $11,
        addenda = $12, updated_at = $13
    WHERE id = $1 AND status = $14
"#;

pub const OPPORTUNITY_EXISTS: &str = "SELECT 1 FROM opportunities WHERE id = $1";

pub const INSERT_OPPORTUNITY_HISTORY: &str = r#"
    INSERT INTO opportunity_history (id, opportunity_id, created_at, created_by, status, event, note)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
"#;

pub const OPPORTUNITY_HISTORY: &str = r#"
    SELECT id, created_at, created_by, status, event, note
    FROM opportunity_history WHERE opportunity_id = $1
    ORDER BY created_at, id
"#;

pub const PROPOSAL_COLUMNS: &str = "id, program, opportunity_id, organization_id, status, details, \
     scores, submitted_at, created_by, created_at, updated_at";

pub const INSERT_PROPOSAL: &str = r#"
    INSERT INTO proposals (id, program, opportunity_id, organization_id, status, details, scores,
                           submitted_at, created_by, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
"#;

pub const UPDATE_PROPOSAL: &str = r#"
    UPDATE proposals
    SET organization_id = $2, status = $3, details = $4, scores = $5, submitted_at = $6,
        updated_at = $7
    WHERE id = $1 AND status = $8
"#;

pub const PROPOSAL_EXISTS: &str = "SELECT 1 FROM proposals WHERE id = $1";

pub const INSERT_PROPOSAL_HISTORY: &str = r#"
    INSERT INTO proposal_history (id, proposal_id, created_at, created_by, status, event, note)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
"#;

pub const PROPOSAL_HISTORY: &str = r#"
    SELECT id, created_at, created_by, status, event, note
    FROM proposal_history WHERE proposal_id = $1
    ORDER BY created_at, id
"#;

// ============================================
// Evaluations, subscribers, counters
// ============================================

pub const EVALUATION_COLUMNS: &str =
    "id, proposal_id, opportunity_id, evaluator_id, kind, status, scores, created_at, updated_at";

pub const INSERT_EVALUATION: &str = r#"
    INSERT INTO evaluations (id, proposal_id, opportunity_id, evaluator_id, kind, status, scores,
                             created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
"#;

pub const UPDATE_EVALUATION: &str =
    "UPDATE evaluations SET status = $2, scores = $3, updated_at = $4 WHERE id = $1";

pub const INSERT_SUBSCRIBER: &str = r#"
    INSERT INTO subscribers (opportunity_id, user_id, created_at) VALUES ($1, $2, $3)
    ON CONFLICT (opportunity_id, user_id) DO NOTHING
"#;

pub const FIND_SUBSCRIBER: &str = r#"
    SELECT opportunity_id, user_id, created_at FROM subscribers
    WHERE opportunity_id = $1 AND user_id = $2
"#;

pub const DELETE_SUBSCRIBER: &str =
    "DELETE FROM subscribers WHERE opportunity_id = $1 AND user_id = $2";

pub const INCREMENT_COUNTER: &str = r#"
    INSERT INTO counters (name, count) VALUES ($1, 1)
    ON CONFLICT (name) DO UPDATE SET count = counters.count + 1
    RETURNING count
"#;

pub const GET_COUNTERS: &str = "SELECT name, count FROM counters WHERE name = ANY($1)";
