use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Token payload. `sid` ties the token to the session stored on the user row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub sid: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

impl Claims {
    pub fn issue(
        user_id: Uuid,
        sid: Uuid,
        kind: TokenKind,
        ttl: std::time::Duration,
        issuer: &str,
        audience: &str,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        let ttl = Duration::seconds(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX));
        let exp = now.saturating_add(ttl);
        Self {
            sub: user_id,
            sid,
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            kind,
        }
    }

    pub fn expect_kind(self, kind: TokenKind) -> anyhow::Result<Self> {
        anyhow::ensure!(self.kind == kind, "expected a {kind:?} token, got {:?}", self.kind);
        Ok(self)
    }
}
