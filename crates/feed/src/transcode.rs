//! Mux-backed video transcoding.

use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{ErrorKind, Result};
use crate::traits::{TranscodeAsset, TranscodeStatus, Transcoder};

const API_BASE: &str = "https://api.mux.com";
const PLAYBACK_HOST: &str = "stream.mux.com";
const THUMBNAIL_HOST: &str = "image.mux.com";

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Submits source URLs to Mux as pull-through assets with a public playback
/// policy. Mux fetches the source itself, so the origin URL must stay
/// reachable until the asset reaches `ready`.
pub struct MuxTranscoder {
    http: reqwest::Client,
    token_id: String,
    token_secret: String,
}

impl MuxTranscoder {
    pub fn new(token_id: impl Into<String>, token_secret: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_id: token_id.into(),
            token_secret: token_secret.into(),
        }
    }
}

#[async_trait]
impl Transcoder for MuxTranscoder {
    #[instrument(skip(self))]
    async fn submit(&self, source_url: &str) -> Result<String> {
        let response = self
            .http
            .post(format!("{API_BASE}/video/v1/assets"))
            .basic_auth(&self.token_id, Some(&self.token_secret))
            .json(&serde_json::json!({
                "input": [{ "url": source_url }],
                "playback_policy": ["public"],
            }))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .or_raise(|| ErrorKind::TranscodeFailed)?;
        if !response.status().is_success() {
            exn::bail!(ErrorKind::TranscodeFailed);
        }
        let created: Envelope<AssetResponse> =
            response.json().await.or_raise(|| ErrorKind::TranscodeFailed)?;
        debug!(asset_id = %created.data.id, "asset submitted");
        Ok(created.data.id)
    }

    async fn poll(&self, asset_id: &str) -> Result<TranscodeStatus> {
        let response = self
            .http
            .get(format!("{API_BASE}/video/v1/assets/{asset_id}"))
            .basic_auth(&self.token_id, Some(&self.token_secret))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .or_raise(|| ErrorKind::TranscodeFailed)?;
        if !response.status().is_success() {
            exn::bail!(ErrorKind::TranscodeFailed);
        }
        let asset: Envelope<AssetResponse> =
            response.json().await.or_raise(|| ErrorKind::TranscodeFailed)?;
        status_of(asset.data)
    }

    fn playback_host(&self) -> &str {
        PLAYBACK_HOST
    }
}

fn status_of(asset: AssetResponse) -> Result<TranscodeStatus> {
    Ok(match asset.status.as_str() {
        "ready" => {
            let (width, height) = asset.resolution().unwrap_or((0, 0));
            let playback_id = asset
                .playback_ids
                .into_iter()
                .next()
                .map(|p| p.id)
                .ok_or_raise(|| ErrorKind::TranscodeFailed)?;
            TranscodeStatus::Ready(TranscodeAsset {
                playback_url: format!("https://{PLAYBACK_HOST}/{playback_id}.m3u8"),
                thumbnail_url: Some(format!("https://{THUMBNAIL_HOST}/{playback_id}/thumbnail.jpg")),
                width,
                height,
            })
        },
        "errored" => TranscodeStatus::Errored,
        // "preparing" plus any state added to the API later.
        _ => TranscodeStatus::Pending,
    })
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct AssetResponse {
    id: String,
    status: String,
    #[serde(default)]
    playback_ids: Vec<PlaybackId>,
    #[serde(default)]
    tracks: Vec<Track>,
}

impl AssetResponse {
    /// Dimensions of the first video track, when Mux has probed them.
    fn resolution(&self) -> Option<(u32, u32)> {
        self.tracks
            .iter()
            .find(|track| track.kind == "video")
            .and_then(|track| Some((track.max_width?, track.max_height?)))
    }
}

#[derive(Deserialize)]
struct PlaybackId {
    id: String,
}

#[derive(Deserialize)]
struct Track {
    #[serde(rename = "type")]
    kind: String,
    max_width: Option<u32>,
    max_height: Option<u32>,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn asset(status: &str, playback: &[&str]) -> AssetResponse {
        AssetResponse {
            id: "asset-1".to_string(),
            status: status.to_string(),
            playback_ids: playback.iter().map(|id| PlaybackId { id: id.to_string() }).collect(),
            tracks: vec![Track { kind: "video".to_string(), max_width: Some(1920), max_height: Some(1080) }],
        }
    }

    #[rstest]
    #[case("preparing")]
    #[case("waiting")]
    fn test_nonterminal_status_is_pending(#[case] status: &str) {
        assert_eq!(status_of(asset(status, &[])).unwrap(), TranscodeStatus::Pending);
    }

    #[test]
    fn test_ready_builds_playback_and_thumbnail_urls() {
        let TranscodeStatus::Ready(ready) = status_of(asset("ready", &["pb123"])).unwrap() else {
            panic!("expected ready");
        };
        assert_eq!(ready.playback_url, "https://stream.mux.com/pb123.m3u8");
        assert_eq!(ready.thumbnail_url.as_deref(), Some("https://image.mux.com/pb123/thumbnail.jpg"));
        assert_eq!((ready.width, ready.height), (1920, 1080));
    }

    #[test]
    fn test_ready_without_playback_id_is_an_error() {
        let err = status_of(asset("ready", &[])).unwrap_err();
        assert!(matches!(&*err, ErrorKind::TranscodeFailed));
    }

    #[test]
    fn test_errored_is_terminal() {
        assert_eq!(status_of(asset("errored", &["pb123"])).unwrap(), TranscodeStatus::Errored);
    }

    #[test]
    fn test_asset_response_parses_mux_payload() {
        let envelope: Envelope<AssetResponse> = serde_json::from_value(serde_json::json!({
            "data": {
                "id": "asset-1",
                "status": "ready",
                "playback_ids": [{ "id": "pb123", "policy": "public" }],
                "tracks": [
                    { "type": "audio" },
                    { "type": "video", "max_width": 1280, "max_height": 720 }
                ]
            }
        }))
        .unwrap();
        assert_eq!(envelope.data.resolution(), Some((1280, 720)));
    }
}
