//! 平台错误码表：将服务端机器码映射为可按身份比较的哨兵错误。
//!
//! Known platform error codes.
//!
//! The API reports failures as `{"code": "...", "message": "...", "status": N}`.
//! This module maps the machine codes (and the aliases different API surfaces
//! use for the same condition) to a fixed set of sentinels, so callers compare
//! by identity instead of parsing messages.
//!
//! | Category      | Sentinels                                                       |
//! |---------------|-----------------------------------------------------------------|
//! | `rate`        | rate limit exceeded, quota exceeded                             |
//! | `not_found`   | app, conversation, message, dataset, document, file, generic    |
//! | `file`        | unsupported file type, file too large, too many files, no file  |
//! | `client`      | invalid param, unauthorized, forbidden                          |
//! | `provider`    | app unavailable, provider not initialized, model not supported  |
//! | `server`      | completion request error, internal error, service unavailable   |
//!
//! ## Example
//!
//! ```rust
//! use dify_client::error_code::ErrorCode;
//!
//! let code = ErrorCode::from_api_code("provider_quota_exceeded").unwrap();
//! assert_eq!(code, ErrorCode::QuotaExceeded);
//! assert!(!code.retryable());
//! assert_eq!(code.category(), "rate");
//! ```

use std::fmt;

/// Sentinel for a recognized platform error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Request rate limit exceeded; transient.
    RateLimitExceeded,
    /// Account or model-provider quota used up; permanent until topped up.
    QuotaExceeded,
    AppNotFound,
    ConversationNotFound,
    MessageNotFound,
    DatasetNotFound,
    DocumentNotFound,
    FileNotFound,
    /// Generic `not_found` without a more specific resource.
    NotFound,
    UnsupportedFileType,
    FileTooLarge,
    TooManyFiles,
    NoFileUploaded,
    InvalidParam,
    Unauthorized,
    Forbidden,
    AppUnavailable,
    ProviderNotInitialized,
    ModelNotSupported,
    CompletionRequestError,
    InternalServerError,
    ServiceUnavailable,
}

impl ErrorCode {
    /// Canonical machine code as sent on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::QuotaExceeded => "provider_quota_exceeded",
            Self::AppNotFound => "app_not_found",
            Self::ConversationNotFound => "conversation_not_exists",
            Self::MessageNotFound => "message_not_exists",
            Self::DatasetNotFound => "dataset_not_found",
            Self::DocumentNotFound => "document_not_found",
            Self::FileNotFound => "file_not_found",
            Self::NotFound => "not_found",
            Self::UnsupportedFileType => "unsupported_file_type",
            Self::FileTooLarge => "file_too_large",
            Self::TooManyFiles => "too_many_files",
            Self::NoFileUploaded => "no_file_uploaded",
            Self::InvalidParam => "invalid_param",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::AppUnavailable => "app_unavailable",
            Self::ProviderNotInitialized => "provider_not_initialize",
            Self::ModelNotSupported => "model_currently_not_support",
            Self::CompletionRequestError => "completion_request_error",
            Self::InternalServerError => "internal_server_error",
            Self::ServiceUnavailable => "service_unavailable",
        }
    }

    /// Short human description used for sentinel instances.
    pub fn description(&self) -> &'static str {
        match self {
            Self::RateLimitExceeded => "rate limit exceeded",
            Self::QuotaExceeded => "quota exceeded",
            Self::AppNotFound => "app not found",
            Self::ConversationNotFound => "conversation not found",
            Self::MessageNotFound => "message not found",
            Self::DatasetNotFound => "dataset not found",
            Self::DocumentNotFound => "document not found",
            Self::FileNotFound => "file not found",
            Self::NotFound => "resource not found",
            Self::UnsupportedFileType => "unsupported file type",
            Self::FileTooLarge => "file too large",
            Self::TooManyFiles => "too many files",
            Self::NoFileUploaded => "no file uploaded",
            Self::InvalidParam => "invalid parameter",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::AppUnavailable => "app unavailable",
            Self::ProviderNotInitialized => "model provider not initialized",
            Self::ModelNotSupported => "model not supported",
            Self::CompletionRequestError => "completion request failed",
            Self::InternalServerError => "internal server error",
            Self::ServiceUnavailable => "service unavailable",
        }
    }

    /// Status the platform normally pairs with this code.
    pub fn default_status(&self) -> u16 {
        match self {
            Self::RateLimitExceeded => 429,
            Self::AppNotFound
            | Self::ConversationNotFound
            | Self::MessageNotFound
            | Self::DatasetNotFound
            | Self::DocumentNotFound
            | Self::FileNotFound
            | Self::NotFound => 404,
            Self::UnsupportedFileType => 415,
            Self::FileTooLarge => 413,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::InternalServerError => 500,
            Self::ServiceUnavailable => 503,
            Self::QuotaExceeded
            | Self::TooManyFiles
            | Self::NoFileUploaded
            | Self::InvalidParam
            | Self::AppUnavailable
            | Self::ProviderNotInitialized
            | Self::ModelNotSupported
            | Self::CompletionRequestError => 400,
        }
    }

    /// Whether the condition can clear on its own.
    ///
    /// Only consulted for statuses that are retryable in the first place
    /// (429 and 5xx); a permanent code on such a status suppresses the retry.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded | Self::InternalServerError | Self::ServiceUnavailable
        )
    }

    pub fn is_not_found(&self) -> bool {
        self.category() == "not_found"
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::RateLimitExceeded | Self::QuotaExceeded => "rate",
            Self::AppNotFound
            | Self::ConversationNotFound
            | Self::MessageNotFound
            | Self::DatasetNotFound
            | Self::DocumentNotFound
            | Self::FileNotFound
            | Self::NotFound => "not_found",
            Self::UnsupportedFileType
            | Self::FileTooLarge
            | Self::TooManyFiles
            | Self::NoFileUploaded => "file",
            Self::InvalidParam | Self::Unauthorized | Self::Forbidden => "client",
            Self::AppUnavailable | Self::ProviderNotInitialized | Self::ModelNotSupported => {
                "provider"
            }
            Self::CompletionRequestError | Self::InternalServerError | Self::ServiceUnavailable => {
                "server"
            }
        }
    }

    /// Maps a server machine code to its sentinel, accepting known aliases.
    pub fn from_api_code(code: &str) -> Option<Self> {
        let kind = match code {
            "rate_limit_exceeded" | "rate_limit_error" | "too_many_requests" => {
                Self::RateLimitExceeded
            }
            "provider_quota_exceeded" | "quota_exceeded" | "insufficient_quota" => {
                Self::QuotaExceeded
            }
            "app_not_found" | "app_not_exists" => Self::AppNotFound,
            "conversation_not_exists" | "conversation_not_found" => Self::ConversationNotFound,
            "message_not_exists" | "message_not_found" => Self::MessageNotFound,
            "dataset_not_found" | "dataset_not_exists" => Self::DatasetNotFound,
            "document_not_found" | "document_not_exists" => Self::DocumentNotFound,
            "file_not_found" | "file_not_exists" => Self::FileNotFound,
            "not_found" => Self::NotFound,
            "unsupported_file_type" | "file_extension_blocked" | "unsupported_preview" => {
                Self::UnsupportedFileType
            }
            "file_too_large" | "s3_file_too_large" => Self::FileTooLarge,
            "too_many_files" => Self::TooManyFiles,
            "no_file_uploaded" => Self::NoFileUploaded,
            "invalid_param" | "bad_request" => Self::InvalidParam,
            "unauthorized" | "invalid_api_key" => Self::Unauthorized,
            "forbidden" | "access_denied" => Self::Forbidden,
            "app_unavailable" => Self::AppUnavailable,
            "provider_not_initialize" | "provider_not_initialized" => {
                Self::ProviderNotInitialized
            }
            "model_currently_not_support" | "model_not_supported" => Self::ModelNotSupported,
            "completion_request_error" => Self::CompletionRequestError,
            "internal_server_error" => Self::InternalServerError,
            "service_unavailable" | "overloaded" => Self::ServiceUnavailable,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[ErrorCode] = &[
        ErrorCode::RateLimitExceeded,
        ErrorCode::QuotaExceeded,
        ErrorCode::AppNotFound,
        ErrorCode::ConversationNotFound,
        ErrorCode::MessageNotFound,
        ErrorCode::DatasetNotFound,
        ErrorCode::DocumentNotFound,
        ErrorCode::FileNotFound,
        ErrorCode::NotFound,
        ErrorCode::UnsupportedFileType,
        ErrorCode::FileTooLarge,
        ErrorCode::TooManyFiles,
        ErrorCode::NoFileUploaded,
        ErrorCode::InvalidParam,
        ErrorCode::Unauthorized,
        ErrorCode::Forbidden,
        ErrorCode::AppUnavailable,
        ErrorCode::ProviderNotInitialized,
        ErrorCode::ModelNotSupported,
        ErrorCode::CompletionRequestError,
        ErrorCode::InternalServerError,
        ErrorCode::ServiceUnavailable,
    ];

    #[test]
    fn canonical_codes_resolve_to_themselves() {
        for kind in ALL {
            assert_eq!(ErrorCode::from_api_code(kind.code()), Some(*kind), "{kind}");
        }
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!(
            ErrorCode::from_api_code("too_many_requests"),
            Some(ErrorCode::RateLimitExceeded)
        );
        assert_eq!(
            ErrorCode::from_api_code("quota_exceeded"),
            Some(ErrorCode::QuotaExceeded)
        );
        assert_eq!(
            ErrorCode::from_api_code("file_extension_blocked"),
            Some(ErrorCode::UnsupportedFileType)
        );
        assert_eq!(ErrorCode::from_api_code("something_new"), None);
        assert_eq!(ErrorCode::from_api_code(""), None);
    }

    #[test]
    fn not_found_variants_share_a_category() {
        let not_found: Vec<_> = ALL.iter().filter(|k| k.is_not_found()).collect();
        assert_eq!(not_found.len(), 7);
        assert!(not_found.iter().all(|k| k.default_status() == 404));
    }

    #[test]
    fn only_transient_codes_are_retryable() {
        let retryable: Vec<_> = ALL.iter().copied().filter(ErrorCode::retryable).collect();
        assert_eq!(
            retryable,
            vec![
                ErrorCode::RateLimitExceeded,
                ErrorCode::InternalServerError,
                ErrorCode::ServiceUnavailable
            ]
        );
    }
}
