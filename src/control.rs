//! 控制消息模块
//!
//! 宿主（弹窗、命令行）与引擎之间的 JSON 消息

// 第三方crate导入
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 控制消息，按 `type` 字段区分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ControlMessage {
    /// 导出提取目录
    Export,
    /// 清空目录和已访问集合并重新全量扫描
    Reset,
    /// 存活检测
    Ping,
    /// 启停监听
    Toggle {
        /// 是否启用
        enabled: bool,
    },
}

impl ControlMessage {
    /// 从 JSON 文本解析
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

/// 控制消息应答 `{ok, data?, error?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    /// 是否成功
    pub ok: bool,
    /// 返回数据
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// 错误信息
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    /// 成功且无数据
    pub fn ack() -> Self {
        Self {
            ok: true,
            data: None,
            error: None,
        }
    }

    /// 成功并携带数据
    pub fn with_data(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// 失败
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_parsing() {
        assert_eq!(ControlMessage::from_json(r#"{"type":"export"}"#).unwrap(), ControlMessage::Export);
        assert_eq!(ControlMessage::from_json(r#"{"type":"ping"}"#).unwrap(), ControlMessage::Ping);
        assert_eq!(
            ControlMessage::from_json(r#"{"type":"toggle","enabled":false}"#).unwrap(),
            ControlMessage::Toggle { enabled: false }
        );
        assert!(ControlMessage::from_json(r#"{"type":"toggle"}"#).is_err());
        assert!(ControlMessage::from_json(r#"{"type":"explode"}"#).is_err());
    }

    #[test]
    fn test_response_shape() {
        assert_eq!(serde_json::to_value(ControlResponse::ack()).unwrap(), json!({"ok": true}));
        assert_eq!(
            serde_json::to_value(ControlResponse::failure("nope")).unwrap(),
            json!({"ok": false, "error": "nope"})
        );
        let with_data = ControlResponse::with_data(json!({"a": 1}));
        assert_eq!(serde_json::to_value(&with_data).unwrap()["data"]["a"], 1);
        assert_eq!(serde_json::to_value(ControlMessage::Reset).unwrap(), json!({"type": "reset"}));
    }
}
