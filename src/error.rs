//! 统一错误处理模块
//!
//! 提供词典加载、框架访问和DOM处理的错误类型定义

// 标准库导入
use std::fmt;

/// 词典加载错误
///
/// 所有来源都失败时才会以 `Exhausted` 形式返回给调用方，
/// 调用方应将翻译视为不可用，但不能崩溃
#[derive(Debug)]
pub enum LoadError {
    /// 网络请求相关错误
    Network {
        /// 来源地址
        source: String,
        /// 错误消息
        message: String,
        /// HTTP状态码（如果适用）
        status_code: Option<u16>,
    },

    /// 本地文件读取错误
    Io {
        /// 文件路径
        path: String,
        /// 底层错误信息
        message: String,
    },

    /// 词典内容格式错误
    Malformed {
        /// 来源标识
        source: String,
        /// 错误原因
        reason: String,
    },

    /// 所有来源均已尝试失败
    Exhausted {
        /// 每个来源的失败原因（按尝试顺序）
        attempts: Vec<(String, String)>,
    },
}

impl LoadError {
    /// 检查错误是否值得重试
    ///
    /// 只有网络错误和5xx状态会重试，格式错误重试也不会变好
    pub fn is_retryable(&self) -> bool {
        match self {
            LoadError::Network { status_code, .. } => match status_code {
                Some(code) => *code >= 500,
                None => true,
            },
            _ => false,
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Network { source, message, status_code } => {
                if let Some(code) = status_code {
                    write!(f, "词典请求失败 [{}] {}: {}", code, source, message)
                } else {
                    write!(f, "词典请求失败 {}: {}", source, message)
                }
            }
            LoadError::Io { path, message } => {
                write!(f, "词典文件读取失败 [{}]: {}", path, message)
            }
            LoadError::Malformed { source, reason } => {
                write!(f, "词典格式错误 [{}]: {}", source, reason)
            }
            LoadError::Exhausted { attempts } => {
                if attempts.is_empty() {
                    return write!(f, "没有可用的词典来源");
                }
                write!(f, "所有词典来源均加载失败 ({} 个)", attempts.len())?;
                for (source, reason) in attempts {
                    write!(f, "; {}: {}", source, reason)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for LoadError {}

/// 便捷的错误创建宏
#[macro_export]
macro_rules! load_error {
    (network, $src:expr, $msg:expr) => {
        $crate::error::LoadError::Network {
            source: $src.to_string(),
            message: $msg.to_string(),
            status_code: None,
        }
    };
    (network, $src:expr, $msg:expr, $code:expr) => {
        $crate::error::LoadError::Network {
            source: $src.to_string(),
            message: $msg.to_string(),
            status_code: Some($code),
        }
    };
    (io, $path:expr, $msg:expr) => {
        $crate::error::LoadError::Io {
            path: $path.to_string(),
            message: $msg.to_string(),
        }
    };
    (malformed, $src:expr, $reason:expr) => {
        $crate::error::LoadError::Malformed {
            source: $src.to_string(),
            reason: $reason.to_string(),
        }
    };
}

/// 从reqwest::Error转换为LoadError
impl From<reqwest::Error> for LoadError {
    fn from(error: reqwest::Error) -> Self {
        let status_code = error.status().map(|s| s.as_u16());
        let source = error
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        LoadError::Network {
            source,
            message: error.to_string(),
            status_code,
        }
    }
}

/// 从std::io::Error转换为LoadError
impl From<std::io::Error> for LoadError {
    fn from(error: std::io::Error) -> Self {
        LoadError::Io {
            path: "unknown".to_string(),
            message: error.to_string(),
        }
    }
}

/// 框架文档访问错误
///
/// 跨域框架访问失败是预期行为，扫描器会静默跳过
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameAccessError {
    /// 框架与页面不同源
    CrossOrigin {
        /// 框架地址
        frame_url: String,
    },

    /// 框架地址无法解析
    InvalidUrl {
        /// 原始 src 值
        src: String,
    },
}

impl fmt::Display for FrameAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameAccessError::CrossOrigin { frame_url } => {
                write!(f, "跨域框架无法访问: {}", frame_url)
            }
            FrameAccessError::InvalidUrl { src } => {
                write!(f, "框架地址无效: {}", src)
            }
        }
    }
}

impl std::error::Error for FrameAccessError {}

/// DOM解析与序列化错误
#[derive(Debug)]
pub enum DomError {
    /// HTML解析失败
    Parse {
        /// 具体错误信息
        details: String,
    },

    /// HTML序列化失败
    Serialize {
        /// 具体错误信息
        details: String,
    },
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomError::Parse { details } => write!(f, "HTML解析失败: {}", details),
            DomError::Serialize { details } => write!(f, "HTML序列化失败: {}", details),
        }
    }
}

impl std::error::Error for DomError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoadError::Network {
            source: "https://example.com/zh.json".to_string(),
            message: "Connection failed".to_string(),
            status_code: Some(404),
        };

        assert_eq!(
            format!("{}", err),
            "词典请求失败 [404] https://example.com/zh.json: Connection failed"
        );
    }

    #[test]
    fn test_error_macro() {
        let err = load_error!(network, "remote", "timeout", 503);
        match err {
            LoadError::Network { ref message, status_code, .. } => {
                assert_eq!(message, "timeout");
                assert_eq!(status_code, Some(503));
            }
            _ => panic!("Wrong error type"),
        }
        assert!(err.is_retryable());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(load_error!(network, "remote", "reset").is_retryable());
        assert!(!load_error!(network, "remote", "missing", 404).is_retryable());
        assert!(!load_error!(malformed, "remote", "not an object").is_retryable());
        assert!(!load_error!(io, "lang/zh.json", "not found").is_retryable());
    }

    #[test]
    fn test_exhausted_lists_attempts() {
        let err = LoadError::Exhausted {
            attempts: vec![
                ("a.json".to_string(), "bad".to_string()),
                ("b.json".to_string(), "worse".to_string()),
            ],
        };
        let message = err.to_string();
        assert!(message.contains("2 个"));
        assert!(message.contains("a.json: bad"));
        assert!(message.contains("b.json: worse"));
    }
}
