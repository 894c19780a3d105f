pub mod allocate;
pub mod import;
pub mod passages;
pub mod status;
pub mod words;

use anyhow::{Context, Result};
use regex::Regex;

use crate::cli::{StoreArgs, UserArgs};
use crate::error::{ServiceError, ServiceResult};
use crate::store::VocabularyStore;
use crate::util::ensure_directory;

const USER_ID_PATTERN: &str = r"^[A-Za-z0-9_.@-]{1,64}$";

/// The acting user, or `NotFound` when none is supplied.
pub(crate) fn resolve_user(args: &UserArgs) -> ServiceResult<String> {
    let Some(user) = args.user.as_deref().map(str::trim).filter(|value| !value.is_empty())
    else {
        return Err(ServiceError::NotFound("user not found".to_string()));
    };

    let pattern = Regex::new(USER_ID_PATTERN)
        .map_err(|err| ServiceError::ValidationError(format!("invalid user id pattern: {err}")))?;
    if !pattern.is_match(user) {
        return Err(ServiceError::ValidationError(format!(
            "invalid user id: {user:?}"
        )));
    }

    Ok(user.to_string())
}

pub(crate) fn positive_amount(name: &str, value: i64) -> ServiceResult<usize> {
    if value <= 0 {
        return Err(ServiceError::ValidationError(format!(
            "{name} must be a positive integer, got {value}"
        )));
    }
    usize::try_from(value)
        .map_err(|_| ServiceError::ValidationError(format!("{name} is too large: {value}")))
}

pub(crate) fn open_store(args: &StoreArgs) -> Result<VocabularyStore> {
    let db_path = args.resolved_db_path();
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory(parent).map_err(|err| {
                ServiceError::UpstreamUnavailable(format!("vocabulary store unavailable: {err:#}"))
            })?;
        }
    }

    let store = VocabularyStore::open(&db_path)
        .with_context(|| format!("failed to open vocabulary store {}", db_path.display()))?;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(value: Option<&str>) -> UserArgs {
        UserArgs {
            user: value.map(ToOwned::to_owned),
        }
    }

    #[test]
    fn missing_or_blank_user_is_not_found() {
        assert_eq!(resolve_user(&user(None)).unwrap_err().kind(), "not_found");
        assert_eq!(resolve_user(&user(Some("  "))).unwrap_err().kind(), "not_found");
    }

    #[test]
    fn malformed_user_is_validation_error() {
        let err = resolve_user(&user(Some("robert'); DROP TABLE"))).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn user_is_trimmed() {
        assert_eq!(resolve_user(&user(Some(" learner-1 "))).unwrap(), "learner-1");
    }

    #[test]
    fn amounts_must_be_positive() {
        assert_eq!(positive_amount("amount", 3).unwrap(), 3);
        assert_eq!(positive_amount("amount", 0).unwrap_err().kind(), "validation_error");
        assert_eq!(positive_amount("amount", -2).unwrap_err().kind(), "validation_error");
    }

    #[test]
    fn unwritable_data_root_is_upstream_unavailable() {
        let blocker = std::env::temp_dir().join(format!(
            "vocab-study-blocker-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        std::fs::write(&blocker, b"not a directory").unwrap();

        let args = StoreArgs {
            data_root: blocker.join("nested"),
            db_path: None,
        };
        let err = open_store(&args).err().unwrap();
        std::fs::remove_file(&blocker).unwrap();

        let service_error = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<ServiceError>())
            .unwrap();
        assert_eq!(service_error.kind(), "upstream_unavailable");
        assert_eq!(service_error.exit_code(), 4);
    }
}
