use crate::domain::model::ChatResponse;
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// 取出 data URL 的 base64 部分：第一個逗號之後的全部內容；沒有逗號時視為純 payload
pub fn data_url_payload(data_url: &str) -> &str {
    match data_url.split_once(',') {
        Some((_, payload)) => payload,
        None => data_url,
    }
}

/// data URL 宣告的 MIME 類型，例如 `image/png`
pub fn data_url_mime(data_url: &str) -> Option<&str> {
    let header = data_url.strip_prefix("data:")?.split_once(',')?.0;
    let mime = header.split(';').next()?;
    (!mime.is_empty()).then_some(mime)
}

pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>> {
    let payload = data_url_payload(data_url).trim();
    Ok(BASE64.decode(payload)?)
}

pub fn encode_png_data_url(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(bytes))
}

/// 解碼並寫入一張圖片，回傳寫入的位元組數
pub async fn save_data_url<S: Storage>(storage: &S, data_url: &str, filename: &str) -> Result<usize> {
    let bytes = decode_data_url(data_url)?;
    storage.write_file(filename, &bytes).await?;
    tracing::info!("✓ Image saved: {}", storage.display_path(filename));
    Ok(bytes.len())
}

/// 將回應中所有內嵌圖片依序寫成 `<prefix>_<n>.png`（從 1 開始），回傳檔名
pub async fn save_response_images<S: Storage>(
    storage: &S,
    response: &ChatResponse,
    prefix: &str,
) -> Result<Vec<String>> {
    let urls = response.image_urls();
    tracing::debug!("Found {} embedded images", urls.len());

    let mut saved = Vec::with_capacity(urls.len());
    for (i, url) in urls.iter().enumerate() {
        if let Some(mime) = data_url_mime(url) {
            if mime != "image/png" {
                tracing::warn!("Image {} is {}, saving bytes verbatim as .png", i + 1, mime);
            }
        }
        let filename = format!("{}_{}.png", prefix, i + 1);
        save_data_url(storage, url, &filename).await?;
        saved.push(filename);
    }
    Ok(saved)
}

/// 文字回覆看起來是否帶有圖片連結
pub fn mentions_image_link(content: &str) -> bool {
    let lower = content.to_lowercase();
    lower.contains("http")
        && [".png", ".jpg", ".jpeg", "image"]
            .iter()
            .any(|marker| lower.contains(marker))
}
