use crate::models::{
    NewUser, OAuthSessionRow, PayIdLinkRow, PayIdUpsert, UserRow, VerificationTokenRow,
};
use crate::Database;
use anyhow::{Result, anyhow};
use bucket_types::models::{ROLE_ADMIN, ROLE_USER, VerificationPurpose};
use rusqlite::{Connection, Row, params};

const USER_COLUMNS: &str = "id, email, password, first_name, last_name, phone, picture,
    email_verified, phone_verified, pay_tag, referred_by, role,
    payid_access_token, payid_refresh_token, payid_id_token, payid_sub, payid_pay_tag,
    payid_kyc_verified, payid_verification_level, payid_session_id, payid_provider,
    payid_updated_at, created_at";

/// KYC bookkeeping written after a provider KYC call.
#[derive(Debug, Clone, Default)]
pub struct KycStateUpdate {
    /// Left unchanged when `None`.
    pub session_id: Option<String>,
    /// Left unchanged when `None`.
    pub provider: Option<String>,
    pub kyc_verified: bool,
    pub verification_level: Option<String>,
}

impl Database {
    // -- Users --

    /// Insert a new account. Returns `false` if the email is already taken.
    pub fn create_user(&self, id: &str, user: &NewUser) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, email, password, first_name, last_name, phone, email_verified, referred_by, role)
                 VALUES (?1, lower(?2), ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(email) DO NOTHING",
                params![
                    id,
                    user.email,
                    user.password,
                    user.first_name,
                    user.last_name,
                    user.phone,
                    user.email_verified,
                    user.referred_by,
                    ROLE_USER,
                ],
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    pub fn get_user_by_pay_tag(&self, pay_tag: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "pay_tag = ?1", pay_tag))
    }

    pub fn mark_email_verified(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE users SET email_verified = 1 WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    /// Bind a referrer if the user has none yet.
    ///
    /// Returns `false` when the user already has a referrer, the referrer is the
    /// user, or the referrer does not exist. The check and write are one statement.
    pub fn set_referred_by(&self, user_id: &str, referrer_id: &str) -> Result<bool> {
        self.with_conn(|conn| bind_referrer(conn, user_id, referrer_id))
    }

    /// Users referred by `referrer_id`, newest first.
    pub fn list_referred_users(&self, referrer_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            query_users(
                conn,
                "referred_by = ?1 ORDER BY created_at DESC, rowid DESC",
                referrer_id,
            )
        })
    }

    pub fn list_admins(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| query_users(conn, "role = ?1", ROLE_ADMIN))
    }

    // -- PayID identity --

    /// Create or update the account for a PayID profile, attach the encrypted
    /// provider tokens, and bind the carried referrer, all in one transaction.
    ///
    /// `new_id` is only used when no account exists for the email.
    pub fn upsert_payid_user(&self, new_id: &str, upsert: &PayIdUpsert) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let id = match query_user(&tx, "email = ?1", &upsert.email)? {
                None => {
                    tx.execute(
                        "INSERT INTO users (id, email, first_name, last_name, picture, phone, pay_tag, email_verified, phone_verified, role)
                         VALUES (?1, lower(?2), ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                        params![
                            new_id,
                            upsert.email,
                            upsert.first_name,
                            upsert.last_name,
                            upsert.picture,
                            upsert.phone,
                            upsert.pay_tag,
                            upsert.email_verified,
                            upsert.phone_verified,
                            ROLE_USER,
                        ],
                    )?;
                    new_id.to_string()
                }
                Some(existing) => {
                    // Verification already proven locally is never revoked by the provider.
                    tx.execute(
                        "UPDATE users SET
                            first_name = COALESCE(?2, first_name),
                            last_name = COALESCE(?3, last_name),
                            picture = COALESCE(?4, picture),
                            phone = COALESCE(?5, phone),
                            pay_tag = COALESCE(?6, pay_tag),
                            email_verified = (email_verified OR ?7),
                            phone_verified = (phone_verified OR ?8)
                         WHERE id = ?1",
                        params![
                            existing.id,
                            upsert.first_name,
                            upsert.last_name,
                            upsert.picture,
                            upsert.phone,
                            upsert.pay_tag,
                            upsert.email_verified,
                            upsert.phone_verified,
                        ],
                    )?;
                    existing.id
                }
            };

            tx.execute(
                "UPDATE users SET
                    payid_access_token = ?2,
                    payid_refresh_token = ?3,
                    payid_id_token = ?4,
                    payid_sub = ?5,
                    payid_pay_tag = ?6,
                    payid_kyc_verified = ?7,
                    payid_verification_level = ?8,
                    payid_updated_at = datetime('now')
                 WHERE id = ?1",
                params![
                    id,
                    upsert.access_token,
                    upsert.refresh_token,
                    upsert.id_token,
                    upsert.sub,
                    upsert.pay_tag,
                    upsert.kyc_verified,
                    upsert.verification_level,
                ],
            )?;

            if let Some(referrer_id) = &upsert.referral_id {
                bind_referrer(&tx, &id, referrer_id)?;
            }

            let user = query_user(&tx, "id = ?1", &id)?
                .ok_or_else(|| anyhow!("User {} missing after upsert", id))?;
            tx.commit()?;
            Ok(user)
        })
    }

    /// Replace stored provider tokens (ciphertext). A `None` refresh/id token keeps the old one.
    pub fn update_payid_tokens(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        id_token: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET
                    payid_access_token = ?2,
                    payid_refresh_token = COALESCE(?3, payid_refresh_token),
                    payid_id_token = COALESCE(?4, payid_id_token),
                    payid_updated_at = datetime('now')
                 WHERE id = ?1",
                params![user_id, access_token, refresh_token, id_token],
            )?;
            Ok(())
        })
    }

    /// Forget access and refresh tokens after the provider rejected them.
    pub fn clear_payid_tokens(&self, user_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET payid_access_token = NULL, payid_refresh_token = NULL
                 WHERE id = ?1 AND payid_updated_at IS NOT NULL",
                [user_id],
            )?;
            Ok(())
        })
    }

    pub fn update_kyc_state(&self, user_id: &str, update: &KycStateUpdate) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET
                    payid_session_id = COALESCE(?2, payid_session_id),
                    payid_provider = COALESCE(?3, payid_provider),
                    payid_kyc_verified = ?4,
                    payid_verification_level = ?5,
                    payid_updated_at = datetime('now')
                 WHERE id = ?1 AND payid_updated_at IS NOT NULL",
                params![
                    user_id,
                    update.session_id,
                    update.provider,
                    update.kyc_verified,
                    update.verification_level,
                ],
            )?;
            Ok(())
        })
    }

    // -- Verification tokens --

    /// Store a new token hash, deleting every other token of the same purpose
    /// for the identifier. Returns the new token id.
    pub fn replace_verification_token(
        &self,
        identifier: &str,
        purpose: VerificationPurpose,
        token_hash: &str,
        expires_at: i64,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM verification_tokens WHERE identifier = ?1 AND purpose = ?2",
                (identifier, purpose.as_str()),
            )?;
            tx.execute(
                "INSERT INTO verification_tokens (identifier, token_hash, purpose, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![identifier, token_hash, purpose.as_str(), expires_at],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(id)
        })
    }

    /// Newest token for (identifier, purpose) that has not expired at `now`.
    pub fn find_live_verification_token(
        &self,
        identifier: &str,
        purpose: VerificationPurpose,
        now: i64,
    ) -> Result<Option<VerificationTokenRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, identifier, token_hash, expires_at FROM verification_tokens
                     WHERE identifier = ?1 AND purpose = ?2 AND expires_at > ?3
                     ORDER BY id DESC LIMIT 1",
                    params![identifier, purpose.as_str(), now],
                    |row| {
                        Ok(VerificationTokenRow {
                            id: row.get(0)?,
                            identifier: row.get(1)?,
                            token_hash: row.get(2)?,
                            purpose,
                            expires_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Delete a token by id. Exactly one caller ever sees `true` for a given id.
    pub fn delete_verification_token(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM verification_tokens WHERE id = ?1", [id])?;
            Ok(deleted == 1)
        })
    }

    // -- OAuth sessions --

    pub fn create_oauth_session(&self, session: &OAuthSessionRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO oauth_sessions (state, code_verifier, csrf, referral_id, return_url, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    session.state,
                    session.code_verifier,
                    session.csrf,
                    session.referral_id,
                    session.return_url,
                    session.expires_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Atomically remove and return the session for `state`.
    ///
    /// Expired rows are returned too; the caller decides what expiry means.
    pub fn take_oauth_session(&self, state: &str) -> Result<Option<OAuthSessionRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "DELETE FROM oauth_sessions WHERE state = ?1
                     RETURNING state, code_verifier, csrf, referral_id, return_url, expires_at",
                    [state],
                    |row| {
                        Ok(OAuthSessionRow {
                            state: row.get(0)?,
                            code_verifier: row.get(1)?,
                            csrf: row.get(2)?,
                            referral_id: row.get(3)?,
                            return_url: row.get(4)?,
                            expires_at: row.get(5)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Expiry --

    /// Delete expired verification tokens and OAuth sessions.
    /// Returns (tokens, sessions) removed.
    pub fn purge_expired(&self, now: i64) -> Result<(usize, usize)> {
        self.with_conn(|conn| {
            let tokens = conn.execute(
                "DELETE FROM verification_tokens WHERE expires_at <= ?1",
                [now],
            )?;
            let sessions =
                conn.execute("DELETE FROM oauth_sessions WHERE expires_at <= ?1", [now])?;
            Ok((tokens, sessions))
        })
    }
}

fn bind_referrer(conn: &Connection, user_id: &str, referrer_id: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET referred_by = ?2
         WHERE id = ?1 AND referred_by IS NULL AND id != ?2
           AND EXISTS (SELECT 1 FROM users WHERE id = ?2)",
        (user_id, referrer_id),
    )?;
    Ok(changed == 1)
}

fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, predicate);
    let row = conn.query_row(&sql, [value], user_from_row).optional()?;
    Ok(row)
}

fn query_users(conn: &Connection, predicate: &str, value: &str) -> Result<Vec<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, predicate);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([value], user_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    let payid = match row.get::<_, Option<String>>(21)? {
        Some(updated_at) => Some(PayIdLinkRow {
            access_token: row.get(12)?,
            refresh_token: row.get(13)?,
            id_token: row.get(14)?,
            sub: row.get(15)?,
            pay_tag: row.get(16)?,
            kyc_verified: row.get(17)?,
            verification_level: row.get(18)?,
            session_id: row.get(19)?,
            provider: row.get(20)?,
            updated_at,
        }),
        None => None,
    };

    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        phone: row.get(5)?,
        picture: row.get(6)?,
        email_verified: row.get(7)?,
        phone_verified: row.get(8)?,
        pay_tag: row.get(9)?,
        referred_by: row.get(10)?,
        role: row.get(11)?,
        payid,
        created_at: row.get(22)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn add_user(db: &Database, id: &str, email: &str) {
        let user = NewUser {
            email: email.to_string(),
            ..Default::default()
        };
        assert!(db.create_user(id, &user).unwrap());
    }

    fn set_pay_tag(db: &Database, id: &str, pay_tag: &str) {
        db.with_conn(|conn| {
            conn.execute("UPDATE users SET pay_tag = ?2 WHERE id = ?1", (id, pay_tag))?;
            Ok(())
        })
        .unwrap();
    }

    fn payid_upsert(email: &str) -> PayIdUpsert {
        PayIdUpsert {
            email: email.to_string(),
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            picture: None,
            phone: None,
            pay_tag: Some("ada".into()),
            email_verified: true,
            phone_verified: false,
            access_token: "enc-access".into(),
            refresh_token: Some("enc-refresh".into()),
            id_token: Some("enc-id".into()),
            sub: "payid|1".into(),
            kyc_verified: false,
            verification_level: None,
            referral_id: None,
        }
    }

    #[test]
    fn email_lookup_is_case_insensitive() {
        let db = db();
        add_user(&db, "u1", "Mixed@Example.com");
        let user = db.get_user_by_email("mixed@EXAMPLE.com").unwrap().unwrap();
        assert_eq!(user.email, "mixed@example.com");
        assert_eq!(user.role, ROLE_USER);
        assert!(user.payid.is_none());
    }

    #[test]
    fn duplicate_email_is_not_inserted() {
        let db = db();
        add_user(&db, "u1", "a@example.com");
        let dup = NewUser {
            email: "A@example.com".into(),
            ..Default::default()
        };
        assert!(!db.create_user("u2", &dup).unwrap());
        assert!(db.get_user_by_id("u2").unwrap().is_none());
    }

    #[test]
    fn replacing_a_token_leaves_one_live_row() {
        let db = db();
        let first = db
            .replace_verification_token("a@example.com", VerificationPurpose::Otp, "h1", 2_000)
            .unwrap();
        let second = db
            .replace_verification_token("a@example.com", VerificationPurpose::Otp, "h2", 2_000)
            .unwrap();
        db.replace_verification_token("a@example.com", VerificationPurpose::MagicLink, "m1", 2_000)
            .unwrap();

        let live = db
            .find_live_verification_token("a@example.com", VerificationPurpose::Otp, 1_000)
            .unwrap()
            .unwrap();
        assert_eq!(live.id, second);
        assert_eq!(live.token_hash, "h2");
        assert!(!db.delete_verification_token(first).unwrap());

        let link = db
            .find_live_verification_token("a@example.com", VerificationPurpose::MagicLink, 1_000)
            .unwrap();
        assert!(link.is_some());
    }

    #[test]
    fn expired_tokens_are_invisible_before_purge() {
        let db = db();
        db.replace_verification_token("a@example.com", VerificationPurpose::Otp, "h", 1_000)
            .unwrap();
        assert!(
            db.find_live_verification_token("a@example.com", VerificationPurpose::Otp, 1_000)
                .unwrap()
                .is_none()
        );
        assert!(
            db.find_live_verification_token("a@example.com", VerificationPurpose::Otp, 999)
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn token_delete_succeeds_once() {
        let db = db();
        let id = db
            .replace_verification_token("a@example.com", VerificationPurpose::Otp, "h", 2_000)
            .unwrap();
        assert!(db.delete_verification_token(id).unwrap());
        assert!(!db.delete_verification_token(id).unwrap());
    }

    #[test]
    fn oauth_session_can_be_taken_once() {
        let db = db();
        db.create_oauth_session(&OAuthSessionRow {
            state: "s".into(),
            code_verifier: "v".into(),
            csrf: "c".into(),
            referral_id: None,
            return_url: Some("/settings".into()),
            expires_at: 2_000,
        })
        .unwrap();

        let taken = db.take_oauth_session("s").unwrap().unwrap();
        assert_eq!(taken.code_verifier, "v");
        assert_eq!(taken.return_url.as_deref(), Some("/settings"));
        assert!(db.take_oauth_session("s").unwrap().is_none());
    }

    #[test]
    fn purge_removes_only_expired_rows() {
        let db = db();
        db.replace_verification_token("old@example.com", VerificationPurpose::Otp, "h", 100)
            .unwrap();
        db.replace_verification_token("new@example.com", VerificationPurpose::Otp, "h", 5_000)
            .unwrap();
        db.create_oauth_session(&OAuthSessionRow {
            state: "old".into(),
            code_verifier: "v".into(),
            csrf: "c".into(),
            referral_id: None,
            return_url: None,
            expires_at: 100,
        })
        .unwrap();

        assert_eq!(db.purge_expired(1_000).unwrap(), (1, 1));
        assert!(
            db.find_live_verification_token("new@example.com", VerificationPurpose::Otp, 1_000)
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn referrer_binds_once_and_never_to_self() {
        let db = db();
        add_user(&db, "referrer", "r@example.com");
        add_user(&db, "other", "o@example.com");
        add_user(&db, "newbie", "n@example.com");

        assert!(!db.set_referred_by("newbie", "newbie").unwrap());
        assert!(!db.set_referred_by("newbie", "ghost").unwrap());
        assert!(db.set_referred_by("newbie", "referrer").unwrap());
        assert!(!db.set_referred_by("newbie", "other").unwrap());

        let user = db.get_user_by_id("newbie").unwrap().unwrap();
        assert_eq!(user.referred_by.as_deref(), Some("referrer"));
    }

    #[test]
    fn referred_users_are_listed_newest_first() {
        let db = db();
        add_user(&db, "referrer", "r@example.com");
        add_user(&db, "first", "1@example.com");
        add_user(&db, "second", "2@example.com");
        db.set_referred_by("first", "referrer").unwrap();
        db.set_referred_by("second", "referrer").unwrap();

        let ids: Vec<String> = db
            .list_referred_users("referrer")
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(ids, vec!["second".to_string(), "first".to_string()]);
    }

    #[test]
    fn payid_upsert_creates_then_updates() {
        let db = db();
        let created = db.upsert_payid_user("new-id", &payid_upsert("ada@example.com")).unwrap();
        assert_eq!(created.id, "new-id");
        assert_eq!(created.pay_tag.as_deref(), Some("ada"));
        assert_eq!(created.role, ROLE_USER);
        let link = created.payid.unwrap();
        assert_eq!(link.access_token.as_deref(), Some("enc-access"));
        assert_eq!(link.sub.as_deref(), Some("payid|1"));

        let mut again = payid_upsert("ADA@example.com");
        again.first_name = None;
        again.access_token = "enc-access-2".into();
        again.email_verified = false;
        let updated = db.upsert_payid_user("ignored", &again).unwrap();
        assert_eq!(updated.id, "new-id");
        assert_eq!(updated.first_name.as_deref(), Some("Ada"));
        assert!(updated.email_verified);
        assert_eq!(
            updated.payid.unwrap().access_token.as_deref(),
            Some("enc-access-2")
        );
        assert!(db.get_user_by_id("ignored").unwrap().is_none());
    }

    #[test]
    fn payid_upsert_binds_referrer_but_not_self() {
        let db = db();
        add_user(&db, "referrer", "r@example.com");
        set_pay_tag(&db, "referrer", "rita");

        let mut upsert = payid_upsert("ada@example.com");
        upsert.referral_id = Some("referrer".into());
        let user = db.upsert_payid_user("ada", &upsert).unwrap();
        assert_eq!(user.referred_by.as_deref(), Some("referrer"));

        let mut own = payid_upsert("r@example.com");
        own.pay_tag = Some("rita".into());
        own.referral_id = Some("referrer".into());
        let referrer = db.upsert_payid_user("x", &own).unwrap();
        assert!(referrer.referred_by.is_none());
    }

    #[test]
    fn token_refresh_keeps_old_refresh_token() {
        let db = db();
        db.upsert_payid_user("u", &payid_upsert("ada@example.com")).unwrap();
        db.update_payid_tokens("u", "enc-access-2", None, Some("enc-id-2")).unwrap();

        let link = db.get_user_by_id("u").unwrap().unwrap().payid.unwrap();
        assert_eq!(link.access_token.as_deref(), Some("enc-access-2"));
        assert_eq!(link.refresh_token.as_deref(), Some("enc-refresh"));
        assert_eq!(link.id_token.as_deref(), Some("enc-id-2"));

        db.clear_payid_tokens("u").unwrap();
        let link = db.get_user_by_id("u").unwrap().unwrap().payid.unwrap();
        assert!(link.access_token.is_none());
        assert!(link.refresh_token.is_none());
    }

    #[test]
    fn kyc_state_keeps_session_when_not_supplied() {
        let db = db();
        db.upsert_payid_user("u", &payid_upsert("ada@example.com")).unwrap();
        db.update_kyc_state(
            "u",
            &KycStateUpdate {
                session_id: Some("kyc-1".into()),
                provider: Some("plaid".into()),
                kyc_verified: false,
                verification_level: None,
            },
        )
        .unwrap();
        db.update_kyc_state(
            "u",
            &KycStateUpdate {
                kyc_verified: true,
                verification_level: Some("tier2".into()),
                ..Default::default()
            },
        )
        .unwrap();

        let link = db.get_user_by_id("u").unwrap().unwrap().payid.unwrap();
        assert_eq!(link.session_id.as_deref(), Some("kyc-1"));
        assert_eq!(link.provider.as_deref(), Some("plaid"));
        assert!(link.kyc_verified);
        assert_eq!(link.verification_level.as_deref(), Some("tier2"));
    }

    #[test]
    fn admins_are_listed_by_role() {
        let db = db();
        add_user(&db, "boss", "boss@example.com");
        add_user(&db, "pleb", "pleb@example.com");
        db.with_conn(|conn| {
            conn.execute("UPDATE users SET role = 'admin' WHERE id = 'boss'", [])?;
            Ok(())
        })
        .unwrap();

        let admins = db.list_admins().unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].email, "boss@example.com");
    }
}
