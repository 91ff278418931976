use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

static IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";
static TEXT_HEIGHT_INSTRUCTION: &str = "All text in the image should have a height equal to the full height of the image. Text should be large, bold, and fill the vertical space completely.";

#[derive(Parser, Debug)]
#[command(name = "generate-image", about = "Generate a label image with the OpenAI images API")]
struct Args {
    /// Label design prompt
    #[arg(long)]
    prompt: String,

    /// Where the PNG is written
    #[arg(long, value_name = "FILE")]
    output: PathBuf,

    #[arg(long, default_value = "1792x1024")]
    size: String,
}

#[derive(Deserialize)]
struct ImagesResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
}

fn enhanced_prompt(prompt: &str) -> String {
    let mut prompt = prompt.trim().to_string();

    if !prompt.to_lowercase().contains("landscape") {
        prompt.push_str(", landscape orientation");
    }

    format!("{TEXT_HEIGHT_INSTRUCTION} {prompt}")
}

async fn generate(args: &Args, api_key: &str) -> anyhow::Result<()> {
    let target_dir = args
        .output
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty());

    if let Some(dir) = target_dir {
        if !dir.is_dir() {
            bail!("Target directory does not exist: {}", dir.display());
        }
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .build()?;

    let prompt = enhanced_prompt(&args.prompt);
    info!("Generating image with prompt: {prompt}");
    info!("Using size: {}", args.size);

    let body = serde_json::json!({
        "model": "dall-e-3",
        "prompt": prompt,
        "size": args.size,
        "quality": "standard",
        "n": 1,
    });

    let response = client
        .post(IMAGES_URL)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .context("Error sending request")?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        bail!("Images API responded with {status}: {text}");
    }

    let images: ImagesResponse = response.json().await?;
    let url = images
        .data
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No image data received"))?
        .url
        .ok_or_else(|| anyhow!("No image URL received"))?;

    info!("Downloading generated image");
    let bytes = client
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    tokio::fs::write(&args.output, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!("Image saved to: {}", args.output.display());

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    dotenvy::dotenv().ok();

    let args = Args::parse();
    let api_key = std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| anyhow!("OPENAI_API_KEY not found in environment variables"))?;

    generate(&args, &api_key)
        .await
        .context("Failed to generate image")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_gets_text_height_prefix_and_orientation() {
        let prompt = enhanced_prompt("red golf label");

        assert!(prompt.starts_with(TEXT_HEIGHT_INSTRUCTION));
        assert!(prompt.ends_with("red golf label, landscape orientation"));
    }

    #[test]
    fn existing_orientation_is_not_repeated() {
        let prompt = enhanced_prompt("Landscape label with a flag");

        assert!(!prompt.contains("landscape orientation"));
    }

    #[test]
    fn size_defaults_to_wide_format() {
        let args = Args::parse_from(["generate-image", "--prompt", "x", "--output", "out.png"]);

        assert_eq!(args.size, "1792x1024");
    }
}
