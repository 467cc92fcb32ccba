//! Multipart form decoding for the render endpoint

use axum::extract::Multipart;
use url::Url;

use crate::slideshow::{AssetSet, Result, SlideshowError};

/// Pull the request fields out of the form, in any order
///
/// Unknown fields are ignored. `output_filename` is optional.
pub async fn read_assets(mut multipart: Multipart) -> Result<AssetSet> {
    let mut image_urls = None;
    let mut audio_url = None;
    let mut subtitle = None;
    let mut output_filename = None;

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "image_urls_json" => {
                image_urls = Some(parse_image_urls(&field.text().await.map_err(invalid)?)?);
            }
            "audio_url" => {
                let url = field.text().await.map_err(invalid)?;
                validate_url("audio_url", url.trim())?;
                audio_url = Some(url.trim().to_string());
            }
            "subtitle_file" => subtitle = Some(field.bytes().await.map_err(invalid)?.to_vec()),
            "output_filename" => output_filename = Some(field.text().await.map_err(invalid)?),
            _ => {}
        }
    }

    let assets = AssetSet::new(
        image_urls.ok_or_else(|| missing("image_urls_json"))?,
        audio_url.ok_or_else(|| missing("audio_url"))?,
        subtitle.ok_or_else(|| missing("subtitle_file"))?,
    );

    Ok(match output_filename {
        Some(name) => assets.with_output_filename(&name),
        None => assets,
    })
}

/// Decode `image_urls_json`: a JSON array of http(s) URLs
pub fn parse_image_urls(json: &str) -> Result<Vec<String>> {
    let urls: Vec<String> = serde_json::from_str(json).map_err(|e| {
        SlideshowError::InvalidRequest(format!(
            "image_urls_json must be a JSON array of strings: {e}"
        ))
    })?;

    for (i, url) in urls.iter().enumerate() {
        validate_url(&format!("image_urls_json[{i}]"), url)?;
    }
    Ok(urls)
}

fn validate_url(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| SlideshowError::InvalidRequest(format!("{field} is not a valid URL: {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(SlideshowError::InvalidRequest(format!(
            "{field} must use http or https, got {other}"
        ))),
    }
}

fn missing(field: &str) -> SlideshowError {
    SlideshowError::MalformedForm(format!("missing form field: {field}"))
}

fn invalid(err: axum::extract::multipart::MultipartError) -> SlideshowError {
    SlideshowError::MalformedForm(format!("malformed multipart body: {err}"))
}
