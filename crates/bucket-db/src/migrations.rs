use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (accounts, verification tokens, oauth sessions)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                          TEXT PRIMARY KEY,
                email                       TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password                    TEXT,
                first_name                  TEXT,
                last_name                   TEXT,
                phone                       TEXT,
                picture                     TEXT,
                email_verified              INTEGER NOT NULL DEFAULT 0,
                phone_verified              INTEGER NOT NULL DEFAULT 0,
                pay_tag                     TEXT UNIQUE,
                referred_by                 TEXT REFERENCES users(id),
                role                        TEXT NOT NULL DEFAULT 'user',
                payid_access_token          TEXT,
                payid_refresh_token         TEXT,
                payid_id_token              TEXT,
                payid_sub                   TEXT,
                payid_pay_tag               TEXT,
                payid_kyc_verified          INTEGER NOT NULL DEFAULT 0,
                payid_verification_level    TEXT,
                payid_session_id            TEXT,
                payid_provider              TEXT,
                payid_updated_at            TEXT,
                created_at                  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                CHECK (referred_by IS NULL OR referred_by != id)
            );

            CREATE INDEX idx_users_referred_by ON users(referred_by);
            CREATE INDEX idx_users_role ON users(role);

            CREATE TABLE verification_tokens (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                identifier  TEXT NOT NULL,
                token_hash  TEXT NOT NULL,
                purpose     TEXT NOT NULL CHECK (purpose IN ('OTP', 'MAGIC_LINK')),
                expires_at  INTEGER NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_verification_tokens_lookup
                ON verification_tokens(identifier, purpose);
            CREATE INDEX idx_verification_tokens_expiry
                ON verification_tokens(expires_at);

            CREATE TABLE oauth_sessions (
                state           TEXT PRIMARY KEY,
                code_verifier   TEXT NOT NULL,
                csrf            TEXT NOT NULL,
                referral_id     TEXT,
                return_url      TEXT,
                expires_at      INTEGER NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_oauth_sessions_expiry ON oauth_sessions(expires_at);

            INSERT INTO schema_version (version) VALUES (1);
            "
        )?;
    }

    Ok(())
}
