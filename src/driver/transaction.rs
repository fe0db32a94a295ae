//! Transaction State
//!
//! 세션 배치의 트랜잭션 상태와 제어 스크립트

use std::fmt;

/// 트랜잭션 시작 스크립트
pub(crate) const OPEN_SCRIPT: &str = "g.tx().open()";
/// 커밋 스크립트
pub(crate) const COMMIT_SCRIPT: &str = "g.tx().commit()";
/// 롤백 스크립트
pub(crate) const ROLLBACK_SCRIPT: &str = "g.tx().rollback()";

// ============================================================================
// TransactionState - 트랜잭션 상태
// ============================================================================

/// 트랜잭션 상태
///
/// ```text
/// Idle → Open → Committed
///             → RolledBack
///             → Unstable (롤백 실패, 서버 측 결과 불명)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    /// 배치 시작 전
    #[default]
    Idle,
    /// 진행 중
    Open,
    /// 커밋됨
    Committed,
    /// 롤백됨
    RolledBack,
    /// 롤백 실패 (이 세션으로는 복구 불가)
    Unstable,
}

impl TransactionState {
    /// 진행 중 여부
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// 새 배치를 시작할 수 있는지 여부
    pub fn can_begin(&self) -> bool {
        !matches!(self, Self::Open | Self::Unstable)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Open => "open",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
            Self::Unstable => "unstable",
        };
        f.write_str(name)
    }
}
