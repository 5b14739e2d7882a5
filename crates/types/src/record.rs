//! Account record and status definitions.
//!
//! An [`AccountRecord`] is one entry per storage account, created by the
//! storage collector or reconstructed from a transport line, merged by the
//! merger, and classified exactly once by the verifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sentinel for identity metadata that was never discovered or resolved.
pub const UNKNOWN: &str = "_unknown";

/// System account used by the object expirer. It has no tenant to reconcile
/// against and is excluded from both collection and verification.
pub const EXPIRING_OBJECTS_ACCOUNT: &str = ".expiring_objects";

/// Default reseller prefix stripped from account ids to recover project ids.
pub const DEFAULT_RESELLER_PREFIX: &str = "AUTH_";

/// Default field delimiter for the transport line format.
pub const DEFAULT_DELIMITER: char = ';';

/// Classification assigned to an account by one verification pass.
///
/// Starts [`AccountStatus::Unknown`] and is assigned at most once per pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AccountStatus {
    /// Not yet verified, or unverifiable this run (domain metadata missing
    /// or identity backend unreachable).
    #[default]
    Unknown,
    /// Domain and project both exist and are enabled.
    Valid,
    /// Domain or project exists but is disabled, or the domain is rejected
    /// as invalid by the identity backend.
    Invalid,
    /// The mapped project no longer exists in its domain while the storage
    /// record is not tombstoned. The primary signal this system surfaces.
    Orphan,
    /// The storage engine's own tombstone flag is set.
    Deleted,
}

impl AccountStatus {
    /// Wire representation used in the transport line format.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => UNKNOWN,
            Self::Valid => "VALID",
            Self::Invalid => "INVALID",
            Self::Orphan => "ORPHAN",
            Self::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            UNKNOWN => Ok(Self::Unknown),
            "VALID" => Ok(Self::Valid),
            "INVALID" => Ok(Self::Invalid),
            "ORPHAN" => Ok(Self::Orphan),
            "DELETED" => Ok(Self::Deleted),
            other => Err(UnknownStatus { value: other.to_owned() }),
        }
    }
}

/// Error returned when parsing an unrecognized status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus {
    /// The unrecognized input.
    pub value: String,
}

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown account status '{}'", self.value)
    }
}

impl std::error::Error for UnknownStatus {}

/// One entry per storage account.
///
/// `account_id` uniquely identifies a record after merge. The identity
/// fields (`domain_name`, `backend`, `project_name`, `status`) default to
/// unknown until the verifier fills them in; the collected fields pass
/// through from the storage engine unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Storage-assigned account id, the unique merge key.
    pub account_id: String,
    /// Identity domain recorded on the storage account, `"_unknown"` when
    /// the storage engine never recorded one.
    pub domain_id: String,
    /// Domain name, resolved lazily by the verifier.
    pub domain_name: String,
    /// Identity-backend host that resolved the domain.
    pub backend: String,
    /// Project id derived from the account id by stripping the reseller
    /// prefix.
    pub project_id: String,
    /// Project name, resolved lazily by the verifier.
    pub project_name: String,
    /// Classification assigned by the verifier.
    pub status: AccountStatus,
    /// Number of objects in the account.
    pub object_count: u64,
    /// Bytes used by the account.
    pub bytes_used: u64,
    /// Account quota in bytes, 0 for unlimited.
    pub quota_bytes: u64,
    /// Storage engine's own tombstone flag.
    pub status_deleted: bool,
    /// Opaque creation timestamp, passed through unmodified.
    pub created_at: String,
    /// Opaque deletion timestamp, passed through unmodified.
    pub delete_timestamp: String,
}

impl AccountRecord {
    /// Creates a record as the storage collector would, with identity fields
    /// defaulted and the project id derived from the account id.
    ///
    /// The reseller prefix is removed with exact prefix matching; an account
    /// id without the prefix keeps its full id as project id.
    pub fn collected(account_id: impl Into<String>, domain_id: impl Into<String>, reseller_prefix: &str) -> Self {
        let account_id = account_id.into();
        let project_id = account_id
            .strip_prefix(reseller_prefix)
            .unwrap_or(&account_id)
            .to_owned();

        Self {
            account_id,
            domain_id: domain_id.into(),
            domain_name: UNKNOWN.to_owned(),
            backend: UNKNOWN.to_owned(),
            project_id,
            project_name: UNKNOWN.to_owned(),
            status: AccountStatus::Unknown,
            object_count: 0,
            bytes_used: 0,
            quota_bytes: 0,
            status_deleted: false,
            created_at: String::new(),
            delete_timestamp: String::new(),
        }
    }

    /// True for the object expirer's system account, which is excluded from
    /// merge and verification.
    pub fn is_system_account(&self) -> bool {
        self.account_id == EXPIRING_OBJECTS_ACCOUNT
    }
}
