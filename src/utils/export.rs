use crate::core::config::AudioFormat;
use crate::core::state::StoryResult;
use crate::utils::audio::{decode_base64, decode_payload, write_wav, DecodedAudioBuffer};
use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Splits `data:<mime>;base64,<data>` into its mime type and decoded bytes.
pub fn parse_data_uri(uri: &str) -> Result<(String, Vec<u8>)> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| anyhow!("Not a data URI"))?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| anyhow!("Data URI has no payload"))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| anyhow!("Only base64 data URIs are supported"))?;

    Ok((mime.to_string(), decode_base64(data)?))
}

/// File-name friendly version of a story title.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "story".to_string()
    } else {
        slug
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}

/// Writes the illustration and the narration of a finished story into `dir`.
///
/// Both payloads are decoded before anything touches the disk, and a failed
/// write removes whatever this call already wrote.
pub fn save_story_artifacts(
    story: &StoryResult,
    dir: &Path,
    format: AudioFormat,
) -> Result<Vec<PathBuf>> {
    let image = story
        .image_url
        .as_deref()
        .map(parse_data_uri)
        .transpose()
        .context("Failed to decode illustration")?;
    let narration = story
        .audio_payload
        .as_deref()
        .map(|payload| decode_payload(payload, format))
        .transpose()
        .context("Failed to decode narration")?;

    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    let slug = slugify(&story.title);
    let mut written = Vec::new();

    let outcome = write_artifacts(dir, &slug, image, narration, &mut written);
    if outcome.is_err() {
        for path in &written {
            if let Err(e) = std::fs::remove_file(path) {
                log::warn!("Failed to remove partial export {:?}: {}", path, e);
            }
        }
    }
    outcome.map(|()| written)
}

fn write_artifacts(
    dir: &Path,
    slug: &str,
    image: Option<(String, Vec<u8>)>,
    narration: Option<DecodedAudioBuffer>,
    written: &mut Vec<PathBuf>,
) -> Result<()> {
    if let Some((mime, bytes)) = image {
        let path = dir.join(format!("{}.{}", slug, extension_for(&mime)));
        std::fs::write(&path, bytes).with_context(|| format!("Failed to write {:?}", path))?;
        log::info!("Saved illustration to {:?}", path);
        written.push(path);
    }

    if let Some(buffer) = narration {
        let path = dir.join(format!("{}.wav", slug));
        let file = File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
        written.push(path.clone());
        write_wav(&buffer, BufWriter::new(file))?;
        log::info!(
            "Saved narration to {:?} ({:.1}s)",
            path,
            buffer.duration().as_secs_f32()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_uri() {
        let (mime, bytes) = parse_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_parse_data_uri_rejects_other_shapes() {
        assert!(parse_data_uri("https://example.com/a.png").is_err());
        assert!(parse_data_uri("data:image/png,plain").is_err());
        assert!(parse_data_uri("data:image/png;base64").is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Luna and the Sleepy Star!"), "luna-and-the-sleepy-star");
        assert_eq!(slugify("  ...  "), "story");
    }

    #[test]
    fn test_save_story_artifacts() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let story = StoryResult {
            title: "Moon Nap".to_string(),
            content: "Zzz".to_string(),
            image_url: Some("data:image/png;base64,aGVsbG8=".to_string()),
            // two 16-bit samples
            audio_payload: Some("AAD/fw==".to_string()),
        };

        let written = save_story_artifacts(&story, temp_dir.path(), AudioFormat::default())?;
        assert_eq!(written.len(), 2);
        assert_eq!(std::fs::read(temp_dir.path().join("moon-nap.png"))?, b"hello");

        let reader = hound::WavReader::open(temp_dir.path().join("moon-nap.wav"))?;
        assert_eq!(reader.spec().sample_rate, 24000);
        assert_eq!(reader.len(), 2);
        Ok(())
    }

    #[test]
    fn test_bad_audio_leaves_no_files() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let story = StoryResult {
            title: "Broken".to_string(),
            image_url: Some("data:image/png;base64,aGVsbG8=".to_string()),
            audio_payload: Some("%%%".to_string()),
            ..Default::default()
        };

        assert!(save_story_artifacts(&story, temp_dir.path(), AudioFormat::default()).is_err());
        assert!(!temp_dir.path().join("broken.png").exists());
        assert_eq!(std::fs::read_dir(temp_dir.path())?.count(), 0);
        Ok(())
    }
}
