use uuid::Uuid;

/// Unguessable identifier printed in an asset's QR code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetToken(Uuid);

impl AssetToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Accepts a full UUID only; prefixes and other shapes are not tokens.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.len() != 36 {
            return None;
        }
        Uuid::parse_str(trimmed).ok().map(Self)
    }

    /// Canonical lowercase hyphenated form, as stored.
    pub fn as_stored(&self) -> String {
        self.0.hyphenated().to_string()
    }
}

pub fn public_asset_url(base_url: &str, token: &str) -> String {
    format!("{}/a/{token}/", base_url.trim_end_matches('/'))
}
