//! Cloud Synthesis Provider - 调用云端神经语音服务
//!
//! 服务 API:
//! POST {base_url}/api/speech/synthesize
//! Request: {"text": "...", "voiceId": "...", "rate": 1.0}  (JSON)
//! Response: {"audioUrl": "...", "costUnits": 3, "cached": false}
//!
//! 响应里的 `cached` 指服务自身的缓存，与本地音频缓存无关

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::{AudioData, SynthesisError};
use crate::domain::voice::Voice;

/// 合成请求体 (JSON)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    text: &'a str,
    voice_id: &'a str,
    rate: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_url: String,
    cost_units: u32,
    cached: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoiceListing {
    id: String,
    language_tag: String,
    display_name: String,
}

/// 云端 provider 配置
#[derive(Debug, Clone)]
pub struct CloudProviderConfig {
    /// 语音服务基础 URL
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
    /// 超过此字符数的请求不发网络直接拒绝
    pub max_text_len: usize,
}

impl Default for CloudProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7030".to_string(),
            timeout_secs: 30,
            max_text_len: 4000,
        }
    }
}

impl CloudProviderConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// 云端合成适配器
pub struct CloudProvider {
    client: Client,
    config: CloudProviderConfig,
}

impl CloudProvider {
    pub fn new(config: CloudProviderConfig) -> Result<Self, SynthesisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SynthesisError::Unreachable(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn with_default_config() -> Result<Self, SynthesisError> {
        Self::new(CloudProviderConfig::default())
    }

    fn synthesize_url(&self) -> String {
        format!("{}/api/speech/synthesize", self.config.base_url)
    }

    fn voices_url(&self) -> String {
        format!("{}/api/speech/voices", self.config.base_url)
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.config.base_url)
    }

    /// 用云端语音合成 `text`
    pub async fn synthesize(
        &self,
        text: &str,
        voice: &Voice,
        rate: f32,
    ) -> Result<Arc<AudioData>, SynthesisError> {
        if text.chars().count() > self.config.max_text_len {
            return Err(SynthesisError::RequestRejected(format!(
                "text exceeds {} characters",
                self.config.max_text_len
            )));
        }

        let request = SynthesizeRequest {
            text,
            voice_id: &voice.id,
            rate,
        };

        tracing::debug!(
            url = %self.synthesize_url(),
            text_len = text.len(),
            voice_id = %voice.id,
            "Sending synthesis request"
        );

        let response = self
            .client
            .post(self.synthesize_url())
            .json(&request)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_error_status(status, &voice.id, &body));
        }

        let parsed: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| SynthesisError::InvalidResponse(e.to_string()))?;

        tracing::info!(
            voice_id = %voice.id,
            cost_units = parsed.cost_units,
            server_cached = parsed.cached,
            "Cloud synthesis completed"
        );

        Ok(Arc::new(AudioData {
            url: parsed.audio_url,
            cost_units: parsed.cost_units,
            server_cached: parsed.cached,
            duration_ms: None,
        }))
    }

    /// 服务当前提供的语音列表
    pub async fn voices(&self) -> Result<Vec<Voice>, SynthesisError> {
        let response = self
            .client
            .get(self.voices_url())
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SynthesisError::Unreachable(format!("HTTP {}", status)));
        }

        let listings: Vec<VoiceListing> = response
            .json()
            .await
            .map_err(|e| SynthesisError::InvalidResponse(e.to_string()))?;

        Ok(listings
            .into_iter()
            .map(|v| Voice::cloud(v.id, v.language_tag, v.display_name))
            .collect())
    }

    /// 服务的健康端点是否有应答
    pub async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.health_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

fn map_send_error(e: reqwest::Error) -> SynthesisError {
    if e.is_timeout() {
        SynthesisError::Timeout
    } else if e.is_connect() {
        SynthesisError::Unreachable(format!("cannot connect to voice service: {}", e))
    } else {
        SynthesisError::Unreachable(e.to_string())
    }
}

/// 非 2xx 状态码到类型化失败的映射
///
/// 404 表示服务不认识该 voice id。413/422 表示请求本身被拒
/// （文本超长或畸形），一定不能重试。其余都算服务故障。
fn map_error_status(status: StatusCode, voice_id: &str, body: &str) -> SynthesisError {
    match status {
        StatusCode::NOT_FOUND => SynthesisError::VoiceRejected(voice_id.to_string()),
        StatusCode::PAYLOAD_TOO_LARGE | StatusCode::UNPROCESSABLE_ENTITY => {
            SynthesisError::RequestRejected(format!("HTTP {}: {}", status, body))
        }
        _ => SynthesisError::Unreachable(format!("HTTP {}: {}", status, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_voice() -> Voice {
        Voice::cloud("neural-en-1", "en", "Ava")
    }

    #[test]
    fn test_config_default() {
        let config = CloudProviderConfig::default();
        assert_eq!(config.base_url, "http://localhost:7030");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_config_builder() {
        let config = CloudProviderConfig::new("http://voice.example.com").with_timeout(10);
        assert_eq!(config.base_url, "http://voice.example.com");
        assert_eq!(config.timeout_secs, 10);
    }

    #[test]
    fn test_error_status_mapping() {
        assert!(matches!(
            map_error_status(StatusCode::NOT_FOUND, "v1", ""),
            SynthesisError::VoiceRejected(_)
        ));
        assert!(matches!(
            map_error_status(StatusCode::PAYLOAD_TOO_LARGE, "v1", "too long"),
            SynthesisError::RequestRejected(_)
        ));
        assert!(matches!(
            map_error_status(StatusCode::INTERNAL_SERVER_ERROR, "v1", ""),
            SynthesisError::Unreachable(_)
        ));
    }

    #[tokio::test]
    async fn test_synthesize_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/speech/synthesize")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"audioUrl":"https://cdn.example.com/a.mp3","costUnits":7,"cached":true}"#)
            .create_async()
            .await;

        let provider = CloudProvider::new(CloudProviderConfig::new(server.url())).unwrap();
        let audio = provider.synthesize("hello", &test_voice(), 1.0).await.unwrap();

        assert_eq!(audio.url, "https://cdn.example.com/a.mp3");
        assert_eq!(audio.cost_units, 7);
        assert!(audio.server_cached);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_synthesize_unknown_voice() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/speech/synthesize")
            .with_status(404)
            .create_async()
            .await;

        let provider = CloudProvider::new(CloudProviderConfig::new(server.url())).unwrap();
        let err = provider
            .synthesize("hello", &test_voice(), 1.0)
            .await
            .unwrap_err();

        assert!(matches!(err, SynthesisError::VoiceRejected(_)));
    }

    #[tokio::test]
    async fn test_synthesize_oversized_text_rejected_locally() {
        let mut config = CloudProviderConfig::new("http://localhost:1");
        config.max_text_len = 10;
        let provider = CloudProvider::new(config).unwrap();

        let err = provider
            .synthesize("a text far beyond ten characters", &test_voice(), 1.0)
            .await
            .unwrap_err();

        assert!(matches!(err, SynthesisError::RequestRejected(_)));
    }

    #[tokio::test]
    async fn test_synthesize_unreachable_service() {
        // 端口 1 上没有任何服务
        let provider = CloudProvider::new(CloudProviderConfig::new("http://127.0.0.1:1")).unwrap();
        let err = provider
            .synthesize("hello", &test_voice(), 1.0)
            .await
            .unwrap_err();

        assert!(matches!(err, SynthesisError::Unreachable(_)));
        assert!(err.allows_fallback());
    }

    #[tokio::test]
    async fn test_voice_listing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/speech/voices")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"id":"neural-fr-1","languageTag":"fr","displayName":"Céleste"},
                    {"id":"neural-en-1","languageTag":"en","displayName":"Ava"}]"#,
            )
            .create_async()
            .await;

        let provider = CloudProvider::new(CloudProviderConfig::new(server.url())).unwrap();
        let voices = provider.voices().await.unwrap();

        assert_eq!(voices.len(), 2);
        assert_eq!(voices[0].id, "neural-fr-1");
        assert_eq!(voices[0].language_tag, "fr");
    }
}
