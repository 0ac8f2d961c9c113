use std::fmt;

/// Код статуса доменной ошибки.
///
/// Старшая цифра задаёт область:
/// - 6xxx: соединения подписчиков и backend;
/// - 8xxx: RESP-фреймы;
/// - 9xxx: настройки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
#[non_exhaustive]
pub enum StatusCode {
    Io = 6000,
    ConnectionClosed = 6001,
    UnexpectedEof = 6002,
    BackendUnavailable = 6100,
    BackendRejected = 6101,
    BackendProtocol = 6102,

    InvalidFrame = 8000,
    InvalidInteger = 8001,
    InvalidUtf8 = 8002,
    SizeLimit = 8003,
    DepthLimit = 8004,

    ConfigLoad = 9000,
    ConfigInvalid = 9001,
}

impl StatusCode {
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// `true` для сбоев соединения: повторное подключение может помочь.
    ///
    /// Отказ сервера повтором не лечится.
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Io | Self::ConnectionClosed | Self::UnexpectedEof | Self::BackendUnavailable
        )
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "E{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(StatusCode::Io, true)]
    #[case(StatusCode::ConnectionClosed, true)]
    #[case(StatusCode::UnexpectedEof, true)]
    #[case(StatusCode::BackendUnavailable, true)]
    #[case(StatusCode::BackendRejected, false)]
    #[case(StatusCode::BackendProtocol, false)]
    #[case(StatusCode::DepthLimit, false)]
    #[case(StatusCode::ConfigInvalid, false)]
    fn test_retryable(
        #[case] code: StatusCode,
        #[case] retryable: bool,
    ) {
        assert_eq!(code.is_retryable(), retryable);
    }

    #[test]
    fn test_display() {
        assert_eq!(StatusCode::BackendRejected.to_string(), "E6101");
        assert_eq!(StatusCode::ConfigLoad.code(), 9000);
    }
}
