//! Driver Error Types
//!
//! 드라이버 에러 정의

use thiserror::Error;

use crate::graphson::{GraphsonError, ResponseStatusCode};

// ============================================================================
// DriverError - 드라이버 에러
// ============================================================================

/// 드라이버 에러
#[derive(Error, Debug)]
pub enum DriverError {
    /// 브레이커 차단 (전송 시도 없음)
    #[error("Admission denied: {0}")]
    AdmissionDenied(String),

    /// 풀 획득 타임아웃
    #[error("Pool timeout: {0}")]
    PoolTimeout(String),

    /// 풀 닫힘
    #[error("Pool closed")]
    PoolClosed,

    /// 전송 에러 (연결/쓰기/읽기)
    #[error("Transport error: {0}")]
    Transport(String),

    /// 응답 프레임 해석 실패
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// 서버가 반환한 실패 상태
    #[error("Server returned {code}: {message}")]
    Application {
        /// 상태 코드
        code: u16,
        /// 서버 메시지
        message: String,
    },

    /// 실패 후 롤백마저 실패 (서버 측 결과 불명)
    #[error("Unstable transaction, rollback failed: {rollback} (after: {cause})")]
    TransactionUnstable {
        /// 롤백 에러
        rollback: Box<DriverError>,
        /// 롤백을 유발한 에러
        cause: Box<DriverError>,
    },

    /// 세션 에러
    #[error("Session error: {0}")]
    Session(String),

    /// 프로토콜 에러
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 타임아웃
    #[error("Timeout: {0}")]
    Timeout(String),

    /// 호출자 취소
    #[error("Cancelled")]
    Cancelled,

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 타입 변환 에러
    #[error("Type conversion error: {0}")]
    TypeConversion(String),
}

impl DriverError {
    /// 브레이커 차단 에러 생성
    pub fn admission_denied(msg: impl Into<String>) -> Self {
        Self::AdmissionDenied(msg.into())
    }

    /// 풀 타임아웃 에러 생성
    pub fn pool_timeout(msg: impl Into<String>) -> Self {
        Self::PoolTimeout(msg.into())
    }

    /// 전송 에러 생성
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// 응답 에러 생성
    pub fn application(code: u16, message: impl Into<String>) -> Self {
        Self::Application {
            code,
            message: message.into(),
        }
    }

    /// 세션 에러 생성
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// 프로토콜 에러 생성
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// 타임아웃 에러 생성
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// 설정 에러 생성
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// 타입 변환 에러 생성
    pub fn type_conversion(msg: impl Into<String>) -> Self {
        Self::TypeConversion(msg.into())
    }

    /// 브레이커 실패로 기록할지 여부 (전송 계층 실패만)
    pub fn trips_breaker(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// 재시도 가능 여부
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::PoolTimeout(_) | Self::AdmissionDenied(_) => true,
            Self::Application { code, .. } => *code == ResponseStatusCode::SERVER_TIMEOUT,
            _ => false,
        }
    }

    /// 서버 응답 에러 여부
    pub fn is_application(&self) -> bool {
        matches!(self, Self::Application { .. })
    }

    /// 인증 실패 여부
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self.status_code(),
            Some(ResponseStatusCode::UNAUTHORIZED) | Some(ResponseStatusCode::AUTHENTICATE)
        )
    }

    /// 스크립트 평가 타임아웃/에러 여부
    pub fn is_script_timeout(&self) -> bool {
        matches!(
            self.status_code(),
            Some(ResponseStatusCode::SCRIPT_EVALUATION_ERROR) | Some(ResponseStatusCode::SERVER_TIMEOUT)
        )
    }

    /// 서버 상태 코드
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Application { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<GraphsonError> for DriverError {
    fn from(err: GraphsonError) -> Self {
        match err {
            GraphsonError::MalformedFrame(msg) => DriverError::MalformedFrame(msg),
            GraphsonError::InvalidValue { .. } => DriverError::MalformedFrame(err.to_string()),
            GraphsonError::InvalidRequest(msg) => DriverError::Protocol(msg),
            GraphsonError::Json(e) => DriverError::Protocol(e.to_string()),
        }
    }
}

// ============================================================================
// Result Type
// ============================================================================

/// 드라이버 결과 타입
pub type DriverResult<T> = Result<T, DriverError>;

// ============================================================================
// Tests
// ============================================================================
