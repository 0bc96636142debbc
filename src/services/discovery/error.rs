use std::time::Duration;

use http::StatusCode;

/// 注册中心操作类型，用于错误上下文
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryOperation {
    Register,
    Deregister,
    Query,
}

impl std::fmt::Display for RegistryOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryOperation::Register => write!(f, "register"),
            RegistryOperation::Deregister => write!(f, "deregister"),
            RegistryOperation::Query => write!(f, "query"),
        }
    }
}

/// 服务注册与发现错误类型
///
/// `target` 是服务 ID（注册/注销）或服务名（查询）。
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Registration of {service_id} rejected by registry: HTTP {status}")]
    RegistrationRejected {
        service_id: String,
        status: StatusCode,
    },
    #[error("Registry unreachable during {operation} of {target}: {message}")]
    Transport {
        operation: RegistryOperation,
        target: String,
        message: String,
    },
    #[error("Registry returned HTTP {status} during {operation} of {target}")]
    UnexpectedStatus {
        operation: RegistryOperation,
        target: String,
        status: StatusCode,
    },
    #[error("Invalid registry response for {target}: {message}")]
    InvalidResponse { target: String, message: String },
    #[error("Registry {operation} of {target} timed out after {timeout:?}")]
    Timeout {
        operation: RegistryOperation,
        target: String,
        timeout: Duration,
    },
    #[error("Invalid registry address {address}: {message}")]
    InvalidAddress { address: String, message: String },
    #[error("Registry {operation} cancelled")]
    Cancelled { operation: RegistryOperation },
}

impl DiscoveryError {
    /// 是否属于注册中心自身不可用（降级）的情况
    pub fn is_registry_failure(&self) -> bool {
        !matches!(self, DiscoveryError::Cancelled { .. })
    }

    /// 传输层返回的 HTTP 状态码（如果有）
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DiscoveryError::RegistrationRejected { status, .. }
            | DiscoveryError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
