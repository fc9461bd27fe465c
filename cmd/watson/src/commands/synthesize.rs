//! Speech synthesis command.

use std::sync::Arc;

use bytes::Bytes;
use clap::Args;
use parking_lot::Mutex;
use tracing::debug;

use watson_cli::guess_extension;
use watson_sdk::{
    CallArgs, ChannelHandler, ChannelState, Error, ServiceKind, stream::synthesize_message,
};

use super::{create_client, format_bytes, get_context, output, print_success, print_verbose};
use crate::Cli;

/// Synthesize speech from text with Text to Speech.
///
/// The text is taken from the argument, or read from the file given with -f.
/// Audio is written to -o, or to `speech.<ext>` by default. With --stream
/// the audio is received over a WebSocket as it is produced.
#[derive(Args)]
pub struct SynthesizeCommand {
    /// Text to synthesize
    text: Option<String>,

    /// Voice name (default: context default voice, then service default)
    #[arg(long)]
    voice: Option<String>,

    /// Audio format
    #[arg(long, default_value = "audio/wav")]
    accept: String,

    /// Custom voice model
    #[arg(long)]
    customization_id: Option<String>,

    /// Stream over WebSocket instead of a single HTTP call
    #[arg(long)]
    stream: bool,
}

/// Collects streamed audio chunks.
#[derive(Default)]
struct AudioCollector {
    audio: Mutex<Vec<u8>>,
    chunks: Mutex<usize>,
    error: Mutex<Option<String>>,
}

impl ChannelHandler for AudioCollector {
    fn on_message(&self, data: Bytes) {
        self.audio.lock().extend_from_slice(&data);
        *self.chunks.lock() += 1;
    }

    fn on_text(&self, text: &str) {
        debug!(message = text, "synthesis status");
    }

    fn on_error(&self, error: &Error) {
        *self.error.lock() = Some(error.to_string());
    }

    fn on_close(&self) {
        debug!("synthesis channel closed");
    }
}

impl SynthesizeCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let text = match (&self.text, cli.input.as_deref()) {
            (Some(text), _) => text.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)?,
            (None, None) => anyhow::bail!("text is required, as an argument or with -f"),
        };
        if text.trim().is_empty() {
            anyhow::bail!("text must not be empty");
        }

        let voice = match &self.voice {
            Some(voice) => Some(voice.clone()),
            None => get_context(cli)?
                .map(|ctx| ctx.default_voice)
                .filter(|v| !v.is_empty()),
        };

        let client = create_client(cli, ServiceKind::TextToSpeech)?;
        let tts = client.text_to_speech();
        let args = CallArgs::new()
            .opt("voice", voice.as_deref())
            .opt("customization_id", self.customization_id.as_deref());

        print_verbose(cli, &format!("Voice: {}", voice.as_deref().unwrap_or("(default)")));
        print_verbose(cli, &format!("Text length: {} characters", text.chars().count()));

        let (audio, chunks) = if self.stream {
            let collector = Arc::new(AudioCollector::default());
            let channel = tts
                .open_channel(
                    "synthesize_stream",
                    args,
                    Some(synthesize_message(&text, &self.accept)),
                    collector.clone(),
                )
                .await?;

            let state = tokio::select! {
                state = channel.wait() => state,
                _ = tokio::signal::ctrl_c() => {
                    channel.cancel();
                    anyhow::bail!("interrupted");
                }
            };
            if state == ChannelState::Error {
                let message = collector.error.lock().take().unwrap_or_default();
                anyhow::bail!("synthesis failed: {}", message);
            }

            let audio = std::mem::take(&mut *collector.audio.lock());
            let chunks = *collector.chunks.lock();
            (audio, chunks)
        } else {
            let args = args
                .arg("accept", &self.accept)
                .json(&serde_json::json!({ "text": text }))?;
            let resp = tts.call_bytes("synthesize", args).await?;
            (resp.result.to_vec(), 1)
        };

        if audio.is_empty() {
            anyhow::bail!("no audio received");
        }

        let path = cli
            .output
            .clone()
            .unwrap_or_else(|| format!("speech.{}", guess_extension(&self.accept)));
        output(cli).write_binary(&audio, &path)?;
        print_success(&format!(
            "Wrote {} in {} chunk(s) to {}",
            format_bytes(audio.len()),
            chunks,
            path
        ));
        Ok(())
    }
}
