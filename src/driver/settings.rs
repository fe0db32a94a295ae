//! Client Settings
//!
//! 클라이언트 설정과 기본값

use std::fmt;
use std::time::Duration;

use super::breaker::BreakerConfig;
use super::error::{DriverError, DriverResult};
use super::pool::PoolConfig;

/// 기본 포트
pub const DEFAULT_PORT: u16 = 8182;
/// 기본 경로
pub const DEFAULT_PATH: &str = "/gremlin";

// ============================================================================
// ServerAddress - 서버 주소
// ============================================================================

/// 서버 주소
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    /// 호스트
    pub host: String,
    /// 포트
    pub port: u16,
}

impl ServerAddress {
    /// 새 서버 주소 생성
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// URI에서 파싱 (ws://host:port/path 또는 host:port)
    pub fn from_uri(uri: &str) -> DriverResult<Self> {
        parse_uri(uri).map(|(address, _)| address)
    }

    fn parse_authority(authority: &str) -> DriverResult<Self> {
        let parse_port = |port: &str| -> DriverResult<u16> {
            port.parse()
                .map_err(|_| DriverError::configuration(format!("Invalid port: {}", port)))
        };

        // [::1]:8182 형식의 IPv6 리터럴
        if let Some(rest) = authority.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(|| {
                DriverError::configuration(format!("Invalid server address: {}", authority))
            })?;
            if host.is_empty() {
                return Err(DriverError::configuration(format!(
                    "Invalid server address: {}",
                    authority
                )));
            }
            return match tail {
                "" => Ok(Self::new(host, DEFAULT_PORT)),
                _ => match tail.strip_prefix(':') {
                    Some(port) => Ok(Self::new(host, parse_port(port)?)),
                    None => Err(DriverError::configuration(format!(
                        "Invalid server address: {}",
                        authority
                    ))),
                },
            };
        }

        let parts: Vec<&str> = authority.split(':').collect();
        match parts.as_slice() {
            [host] if !host.is_empty() => Ok(Self::new(*host, DEFAULT_PORT)),
            [host, port] if !host.is_empty() => Ok(Self::new(*host, parse_port(port)?)),
            _ => Err(DriverError::configuration(format!(
                "Invalid server address: {}",
                authority
            ))),
        }
    }
}

/// `ws://` URI를 주소와 경로로 분리
///
/// TLS 전송이 없으므로 `wss://`와 그 외 스킴은 설정 에러입니다.
fn parse_uri(uri: &str) -> DriverResult<(ServerAddress, Option<String>)> {
    let rest = match uri.split_once("://") {
        None => uri,
        Some(("ws", rest)) => rest,
        Some((scheme, _)) => {
            return Err(DriverError::configuration(format!(
                "Unsupported scheme '{}' in {}: only ws:// is supported",
                scheme, uri
            )))
        }
    };

    let (authority, path) = match rest.find('/') {
        Some(index) => (&rest[..index], Some(rest[index..].to_string())),
        None => (rest, None),
    };
    if authority.is_empty() {
        return Err(DriverError::configuration(format!("Invalid server address: {}", uri)));
    }
    let address = ServerAddress::parse_authority(authority)?;
    Ok((address, path.filter(|p| p != "/")))
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl Default for ServerAddress {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_PORT)
    }
}

// ============================================================================
// Settings - 클라이언트 설정
// ============================================================================

/// 클라이언트 설정
///
/// # 필드
///
/// | 필드 | 기본값 | 설명 |
/// |------|--------|------|
/// | `address` | localhost:8182 | 서버 주소 |
/// | `pool_size` | 8 | 최대 연결 수 (세션 클라이언트는 1) |
/// | `max_concurrent_request` | 4 | 연결당 동시 요청 수 (세션 클라이언트는 2) |
/// | `write_timeout` | 5초 | 쓰기 타임아웃 |
/// | `read_timeout` | write_timeout | 읽기(헬스 프로브) 타임아웃 |
/// | `pool_timeout` | read_timeout + 1초 | 풀 획득 타임아웃 |
/// | `ping_interval` | 1분 | WebSocket keep-alive ping 주기 |
/// | `alive_check_interval` | 1분 | 헬스 체크 주기 (`None`이면 비활성) |
/// | `handshake_timeout` | 5초 | WebSocket 핸드셰이크 타임아웃 |
/// | `read_buffer_size` / `write_buffer_size` | 8 KiB | WebSocket 버퍼 |
/// | `session_close_timeout` | 2초 | 세션 종료 응답 대기 |
/// | `max_reconnect_backoff` | 5초 | 재연결 backoff 상한 |
#[derive(Debug, Clone)]
pub struct Settings {
    /// 서버 주소
    pub address: ServerAddress,
    /// WebSocket 경로
    pub path: String,
    /// 사용자 이름
    pub username: Option<String>,
    /// 비밀번호
    pub password: Option<String>,
    /// 세션에서 서버가 트랜잭션을 관리할지 여부
    pub manage_transaction: bool,
    /// 최대 연결 수
    pub pool_size: usize,
    /// 연결당 동시 요청 수
    pub max_concurrent_request: usize,
    /// 풀 획득 타임아웃
    pub pool_timeout: Option<Duration>,
    /// keep-alive ping 주기
    pub ping_interval: Duration,
    /// 쓰기 타임아웃
    pub write_timeout: Duration,
    /// 읽기 타임아웃
    pub read_timeout: Option<Duration>,
    /// 헬스 체크 주기
    pub alive_check_interval: Option<Duration>,
    /// 연결 최대 수명
    pub max_conn_age: Option<Duration>,
    /// 읽기 버퍼 크기
    pub read_buffer_size: usize,
    /// 쓰기 버퍼 크기
    pub write_buffer_size: usize,
    /// 핸드셰이크 타임아웃
    pub handshake_timeout: Duration,
    /// 세션 종료 응답 대기
    pub session_close_timeout: Duration,
    /// 재연결 backoff 상한
    pub max_reconnect_backoff: Duration,
    /// 브레이커 설정
    pub breaker: BreakerConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            address: ServerAddress::default(),
            path: DEFAULT_PATH.to_string(),
            username: None,
            password: None,
            manage_transaction: false,
            pool_size: 8,
            max_concurrent_request: 4,
            pool_timeout: None,
            ping_interval: Duration::from_secs(60),
            write_timeout: Duration::from_secs(5),
            read_timeout: None,
            alive_check_interval: Some(Duration::from_secs(60)),
            max_conn_age: None,
            read_buffer_size: 8 * 1024,
            write_buffer_size: 8 * 1024,
            handshake_timeout: Duration::from_secs(5),
            session_close_timeout: Duration::from_secs(2),
            max_reconnect_backoff: Duration::from_secs(5),
            breaker: BreakerConfig::default(),
        }
    }
}

impl Settings {
    /// 빌더 시작
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// 읽기 타임아웃 (기본값: 쓰기 타임아웃)
    pub fn effective_read_timeout(&self) -> Duration {
        self.read_timeout.unwrap_or(self.write_timeout)
    }

    /// 풀 획득 타임아웃 (기본값: 읽기 타임아웃 + 1초)
    pub fn effective_pool_timeout(&self) -> Duration {
        self.pool_timeout
            .unwrap_or_else(|| self.effective_read_timeout() + Duration::from_secs(1))
    }

    /// 파생 기본값을 채운 설정
    pub fn resolved(&self) -> Self {
        let mut resolved = self.clone();
        resolved.read_timeout = Some(self.effective_read_timeout());
        resolved.pool_timeout = Some(self.effective_pool_timeout());
        resolved
    }

    /// 접속 URL
    pub fn url(&self) -> String {
        format!("ws://{}{}", self.address, self.path)
    }

    /// 인증 정보 (사용자 이름이 있을 때)
    pub fn credentials(&self) -> Option<(String, String)> {
        self.username
            .as_ref()
            .map(|u| (u.clone(), self.password.clone().unwrap_or_default()))
    }

    /// 설정 검증
    pub fn validate(&self) -> DriverResult<()> {
        if self.address.host.is_empty() {
            return Err(DriverError::configuration("host must not be empty"));
        }
        if self.pool_size == 0 {
            return Err(DriverError::configuration("pool_size must be positive"));
        }
        if self.max_concurrent_request == 0 {
            return Err(DriverError::configuration("max_concurrent_request must be positive"));
        }
        if self.write_timeout.is_zero() {
            return Err(DriverError::configuration("write_timeout must be positive"));
        }
        Ok(())
    }

    /// 세션 없는 클라이언트용 풀 설정
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            url: self.url(),
            credentials: self.credentials(),
            max_size: self.pool_size,
            max_in_flight: self.max_concurrent_request,
            acquire_timeout: self.effective_pool_timeout(),
            write_timeout: self.write_timeout,
            read_timeout: self.effective_read_timeout(),
            ping_interval: self.ping_interval,
            alive_check_interval: self.alive_check_interval,
            max_lifetime: self.max_conn_age,
            read_buffer_size: self.read_buffer_size,
            write_buffer_size: self.write_buffer_size,
            handshake_timeout: self.handshake_timeout,
            max_backoff: self.max_reconnect_backoff,
        }
    }

    /// 세션 클라이언트용 풀 설정 (연결 1개, 동시 요청 2개)
    pub fn session_pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_size: 1,
            max_in_flight: 2,
            ..self.pool_config()
        }
    }
}

// ============================================================================
// SettingsBuilder - 설정 빌더
// ============================================================================

/// 설정 빌더
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    /// 호스트 설정
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.settings.address.host = host.into();
        self
    }

    /// 포트 설정
    pub fn port(mut self, port: u16) -> Self {
        self.settings.address.port = port;
        self
    }

    /// URI로 주소와 경로 설정
    ///
    /// URI에 경로가 없으면 현재 경로를 유지합니다.
    pub fn uri(mut self, uri: &str) -> DriverResult<Self> {
        let (address, path) = parse_uri(uri)?;
        self.settings.address = address;
        if let Some(path) = path {
            self.settings.path = path;
        }
        Ok(self)
    }

    /// WebSocket 경로 설정
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.settings.path = path.into();
        self
    }

    /// 인증 정보 설정
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.settings.username = Some(username.into());
        self.settings.password = Some(password.into());
        self
    }

    /// 서버 관리 트랜잭션 설정
    pub fn manage_transaction(mut self, manage: bool) -> Self {
        self.settings.manage_transaction = manage;
        self
    }

    /// 최대 연결 수 설정
    pub fn pool_size(mut self, size: usize) -> Self {
        self.settings.pool_size = size;
        self
    }

    /// 연결당 동시 요청 수 설정
    pub fn max_concurrent_request(mut self, max: usize) -> Self {
        self.settings.max_concurrent_request = max;
        self
    }

    /// 풀 획득 타임아웃 설정
    pub fn pool_timeout(mut self, timeout: Duration) -> Self {
        self.settings.pool_timeout = Some(timeout);
        self
    }

    /// keep-alive ping 주기 설정
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.settings.ping_interval = interval;
        self
    }

    /// 쓰기 타임아웃 설정
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.settings.write_timeout = timeout;
        self
    }

    /// 읽기 타임아웃 설정
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.settings.read_timeout = Some(timeout);
        self
    }

    /// 헬스 체크 주기 설정
    pub fn alive_check_interval(mut self, interval: Duration) -> Self {
        self.settings.alive_check_interval = Some(interval);
        self
    }

    /// 헬스 체크 비활성화
    pub fn disable_alive_check(mut self) -> Self {
        self.settings.alive_check_interval = None;
        self
    }

    /// 연결 최대 수명 설정
    pub fn max_conn_age(mut self, age: Duration) -> Self {
        self.settings.max_conn_age = Some(age);
        self
    }

    /// WebSocket 버퍼 크기 설정
    pub fn buffer_sizes(mut self, read: usize, write: usize) -> Self {
        self.settings.read_buffer_size = read;
        self.settings.write_buffer_size = write;
        self
    }

    /// 핸드셰이크 타임아웃 설정
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.settings.handshake_timeout = timeout;
        self
    }

    /// 세션 종료 대기 시간 설정
    pub fn session_close_timeout(mut self, timeout: Duration) -> Self {
        self.settings.session_close_timeout = timeout;
        self
    }

    /// 재연결 backoff 상한 설정
    pub fn max_reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.settings.max_reconnect_backoff = backoff;
        self
    }

    /// 브레이커 설정
    pub fn breaker(mut self, config: BreakerConfig) -> Self {
        self.settings.breaker = config;
        self
    }

    /// 설정 빌드
    pub fn build(self) -> Settings {
        self.settings
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.address, ServerAddress::new("localhost", 8182));
        assert_eq!(s.pool_size, 8);
        assert_eq!(s.max_concurrent_request, 4);
        assert_eq!(s.write_timeout, Duration::from_secs(5));
        assert_eq!(s.effective_read_timeout(), Duration::from_secs(5));
        assert_eq!(s.effective_pool_timeout(), Duration::from_secs(6));
        assert_eq!(s.alive_check_interval, Some(Duration::from_secs(60)));
        assert_eq!(s.read_buffer_size, 8192);
        assert_eq!(s.handshake_timeout, Duration::from_secs(5));
        assert_eq!(s.url(), "ws://localhost:8182/gremlin");
    }

    #[test]
    fn test_derived_timeouts_follow_overrides() {
        let s = Settings::builder().write_timeout(Duration::from_secs(2)).build();
        assert_eq!(s.effective_read_timeout(), Duration::from_secs(2));
        assert_eq!(s.effective_pool_timeout(), Duration::from_secs(3));

        let s = Settings::builder()
            .read_timeout(Duration::from_secs(10))
            .pool_timeout(Duration::from_millis(100))
            .build()
            .resolved();
        assert_eq!(s.read_timeout, Some(Duration::from_secs(10)));
        assert_eq!(s.pool_timeout, Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_session_pool_config() {
        let s = Settings::builder().pool_size(16).max_concurrent_request(8).build();
        let config = s.pool_config();
        assert_eq!(config.max_size, 16);
        assert_eq!(config.max_in_flight, 8);

        let session = s.session_pool_config();
        assert_eq!(session.max_size, 1);
        assert_eq!(session.max_in_flight, 2);
        assert_eq!(session.url, config.url);
    }

    #[test]
    fn test_server_address_from_uri() {
        assert_eq!(
            ServerAddress::from_uri("ws://db.local:9000/gremlin").unwrap(),
            ServerAddress::new("db.local", 9000)
        );
        assert_eq!(ServerAddress::from_uri("db.local").unwrap().port, 8182);
        assert!(ServerAddress::from_uri("ws://db:abc").is_err());
        assert!(ServerAddress::from_uri("").is_err());
    }

    #[test]
    fn test_uri_carries_path() {
        let s = Settings::builder().uri("ws://db:8183/custom/gremlin").unwrap().build();
        assert_eq!(s.path, "/custom/gremlin");
        assert_eq!(s.url(), "ws://db:8183/custom/gremlin");

        let s = Settings::builder().path("/g").uri("ws://db").unwrap().build();
        assert_eq!(s.url(), "ws://db:8182/g");
    }

    #[test]
    fn test_uri_rejects_tls_scheme() {
        let err = Settings::builder().uri("wss://db:8182/custom").unwrap_err();
        assert!(matches!(err, DriverError::Configuration(_)));
        assert!(err.to_string().contains("wss"));
        assert!(Settings::builder().uri("http://db:8182").is_err());
    }

    #[test]
    fn test_ipv6_address() {
        let address = ServerAddress::from_uri("ws://[::1]:9000/gremlin").unwrap();
        assert_eq!(address, ServerAddress::new("::1", 9000));
        assert_eq!(address.to_string(), "[::1]:9000");
        assert_eq!(ServerAddress::from_uri("[::1]").unwrap().port, 8182);
        assert!(ServerAddress::from_uri("[::1").is_err());
        assert!(ServerAddress::from_uri("[::1]x").is_err());

        let s = Settings::builder().uri("[fe80::2]:8182").unwrap().build();
        assert_eq!(s.url(), "ws://[fe80::2]:8182/gremlin");
    }

    #[test]
    fn test_validate() {
        assert!(Settings::default().validate().is_ok());
        assert!(Settings::builder().pool_size(0).build().validate().is_err());
        assert!(Settings::builder().max_concurrent_request(0).build().validate().is_err());
        assert!(Settings::builder().host("").build().validate().is_err());
    }

    #[test]
    fn test_credentials() {
        assert!(Settings::default().credentials().is_none());
        let s = Settings::builder().credentials("user", "pass").build();
        assert_eq!(s.credentials(), Some(("user".to_string(), "pass".to_string())));
    }

    #[test]
    fn test_disable_alive_check() {
        let s = Settings::builder().disable_alive_check().build();
        assert!(s.alive_check_interval.is_none());
        assert!(s.pool_config().alive_check_interval.is_none());
    }
}
