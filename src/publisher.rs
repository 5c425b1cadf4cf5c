use crate::repository::EpisodeRepository;
use crate::storage::{audio_object_key, ObjectStorage};
use crate::synthesizer::estimate_duration_minutes;
use crate::types::{
    Category, Edition, Episode, GeneratedScript, NewEpisode, Result, SynthesizedAudio,
};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};

/// Final pipeline stage: upload the rendered audio and promote the new
/// episode to live.
///
/// Upload failure does not sink a run that already has a good script; the
/// episode is published with a null audio URL instead. Repository failure
/// is fatal. An upload orphaned by a later failure is harmless: its key is
/// deterministic, so the next successful rerun overwrites it.
pub struct Publisher {
    storage: Arc<dyn ObjectStorage>,
    repository: Arc<dyn EpisodeRepository>,
}

impl Publisher {
    pub fn new(storage: Arc<dyn ObjectStorage>, repository: Arc<dyn EpisodeRepository>) -> Self {
        Self { storage, repository }
    }

    pub async fn publish(
        &self,
        category: Category,
        edition: Edition,
        brief_date: NaiveDate,
        script: GeneratedScript,
        audio: Option<SynthesizedAudio>,
    ) -> Result<Episode> {
        let audio_url = match audio {
            Some(synthesized) => {
                let key = audio_object_key(category, brief_date, edition);
                match self
                    .storage
                    .put(&key, synthesized.audio, "audio/mpeg")
                    .await
                {
                    Ok(url) => Some(url),
                    Err(e) => {
                        warn!(
                            "Audio upload failed for {}, publishing script-only episode: {}",
                            category, e
                        );
                        None
                    }
                }
            }
            None => None,
        };

        let episode = self
            .repository
            .publish_live(NewEpisode {
                category,
                edition,
                brief_date,
                title: script.title,
                duration_minutes: estimate_duration_minutes(&script.script_text),
                script_text: script.script_text,
                audio_url,
            })
            .await?;

        info!(
            "Episode {} is live for {} ({} edition, audio: {})",
            episode.id,
            category,
            edition,
            if episode.audio_url.is_some() { "yes" } else { "none" }
        );
        Ok(episode)
    }
}
