//! 宿主消息桥
//!
//! 渲染层与引擎之间只交换有限的几种消息，用带 `type` 标签的枚举表示，
//! 通过有界 `tokio::mpsc` 通道传递，跨进程时编码为 JSON。

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::translation::error::TranslationResult;

/// 默认通道容量
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// 处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProgressStage {
    Tokenizing,
    Resolving,
    Replacing,
    Done,
}

/// 宿主与引擎之间的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BridgeMessage {
    /// 用户点击了一个外语词
    #[serde(rename_all = "camelCase")]
    WordTap {
        word_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        original: Option<String>,
    },
    /// 悬停结束
    #[serde(rename_all = "camelCase")]
    WordHoverEnd { word_id: String },
    /// 处理进度
    #[serde(rename_all = "camelCase")]
    Progress {
        stage: ProgressStage,
        completed: usize,
        total: usize,
    },
}

impl BridgeMessage {
    pub fn progress(stage: ProgressStage, completed: usize, total: usize) -> Self {
        BridgeMessage::Progress {
            stage,
            completed,
            total,
        }
    }

    pub fn to_json(&self) -> TranslationResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> TranslationResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

pub type BridgeSender = mpsc::Sender<BridgeMessage>;
pub type BridgeReceiver = mpsc::Receiver<BridgeMessage>;

/// 创建有界消息通道
pub fn channel(capacity: usize) -> (BridgeSender, BridgeReceiver) {
    mpsc::channel(capacity.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_json() {
        let tap = BridgeMessage::WordTap {
            word_id: "w_0123".to_string(),
            original: None,
        };
        assert_eq!(tap.to_json().unwrap(), r#"{"type":"wordTap","wordId":"w_0123"}"#);

        let parsed = BridgeMessage::from_json(r#"{"type":"wordHoverEnd","wordId":"w_9"}"#).unwrap();
        assert_eq!(
            parsed,
            BridgeMessage::WordHoverEnd {
                word_id: "w_9".to_string()
            }
        );

        let progress = BridgeMessage::progress(ProgressStage::Resolving, 3, 10);
        let json: serde_json::Value = serde_json::from_str(&progress.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["stage"], "resolving");
        assert_eq!(json["total"], 10);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(BridgeMessage::from_json(r#"{"type":"explode"}"#).is_err());
        assert!(BridgeMessage::from_json("not json").is_err());
    }

    #[tokio::test]
    async fn test_channel_delivers_in_order() {
        let (tx, mut rx) = channel(4);
        tx.send(BridgeMessage::progress(ProgressStage::Tokenizing, 0, 1))
            .await
            .unwrap();
        tx.send(BridgeMessage::progress(ProgressStage::Done, 1, 1))
            .await
            .unwrap();
        drop(tx);

        let mut stages = Vec::new();
        while let Some(BridgeMessage::Progress { stage, .. }) = rx.recv().await {
            stages.push(stage);
        }
        assert_eq!(stages, vec![ProgressStage::Tokenizing, ProgressStage::Done]);
    }
}
