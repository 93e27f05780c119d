use std::{
    fmt::{self, Display},
    str::FromStr,
};

use mailparse::MailAddr;

use crate::error::ConfigError;

/// The parsed `postmaster.email` address.
///
/// Accepts a single RFC 5322 mailbox, either bare (`postmaster@example.com`)
/// or with a display name (`Postmaster <postmaster@example.com>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostmasterAddress {
    display_name: Option<String>,
    address: String,
}

impl PostmasterAddress {
    /// Parse a postmaster address.
    ///
    /// # Errors
    /// [`ConfigError::AddressParse`] if `raw` is not exactly one mailbox with a
    /// non-empty local part and domain.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let fail = |reason: &str| ConfigError::AddressParse {
            address: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.trim().is_empty() {
            return Err(fail("address is empty"));
        }

        let list = mailparse::addrparse(raw).map_err(|e| fail(&e.to_string()))?;
        let info = match list.as_slice() {
            [MailAddr::Single(info)] => info,
            [MailAddr::Group(_)] => return Err(fail("expected a mailbox, found a group")),
            [] => return Err(fail("no mailbox found")),
            _ => return Err(fail("expected exactly one mailbox")),
        };

        let address = info.addr.trim();
        let Some((local, domain)) = address.rsplit_once('@') else {
            return Err(fail("missing '@'"));
        };

        if local.is_empty() {
            return Err(fail("empty local part"));
        }
        if domain.is_empty() || domain.starts_with('.') || domain.ends_with('.') {
            return Err(fail("invalid domain"));
        }
        if address.chars().any(char::is_whitespace) {
            return Err(fail("whitespace in address"));
        }

        Ok(Self {
            display_name: info
                .display_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            address: address.to_string(),
        })
    }

    /// The bare `local@domain` address
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        self.address
            .rsplit_once('@')
            .map_or("", |(_, domain)| domain)
    }
}

impl Display for PostmasterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.display_name {
            Some(name) => write!(f, "{name} <{}>", self.address),
            None => f.write_str(&self.address),
        }
    }
}

impl FromStr for PostmasterAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
