//! Stream overlay cues
//!
//! Shows the configured OBS sources (and optional filter) while a reply is
//! playing, hides them afterwards. Toggle failures never abort playback.

mod obs;

use async_trait::async_trait;

pub use obs::{ObsClient, authentication};

use crate::Result;
use crate::config::{ObsConfig, SceneSource, SourceFilter};

/// Scene-graph toggles of a streaming application
#[async_trait]
pub trait SceneController: Send {
    /// Show or hide `source` inside `scene`
    ///
    /// # Errors
    ///
    /// Returns error if the request fails
    async fn set_source_visible(&mut self, scene: &str, source: &str, visible: bool) -> Result<()>;

    /// Enable or disable `filter` on `source`
    ///
    /// # Errors
    ///
    /// Returns error if the request fails
    async fn set_filter_enabled(&mut self, source: &str, filter: &str, enabled: bool) -> Result<()>;

    /// Close the connection
    async fn close(&mut self);
}

/// The sources and filter toggled around each reply
pub struct OverlayCues {
    controller: Box<dyn SceneController>,
    image: SceneSource,
    head: Option<SceneSource>,
    filter: Option<SourceFilter>,
}

impl OverlayCues {
    #[must_use]
    pub fn new(
        controller: Box<dyn SceneController>,
        image: SceneSource,
        head: Option<SceneSource>,
        filter: Option<SourceFilter>,
    ) -> Self {
        Self {
            controller,
            image,
            head,
            filter,
        }
    }

    /// Connect to OBS using resolved settings
    ///
    /// # Errors
    ///
    /// Returns error if the connection or identification fails
    pub async fn connect(config: ObsConfig) -> Result<Self> {
        let client = ObsClient::connect(&config.url(), config.password.as_ref()).await?;
        Ok(Self::new(
            Box::new(client),
            config.image,
            config.head,
            config.filter,
        ))
    }

    /// Show the cues
    pub async fn show(&mut self) {
        self.apply(true).await;
    }

    /// Hide the cues
    pub async fn hide(&mut self) {
        self.apply(false).await;
    }

    async fn apply(&mut self, on: bool) {
        let sources = std::iter::once(&self.image).chain(self.head.as_ref());
        for source in sources {
            if let Err(e) = self
                .controller
                .set_source_visible(&source.scene_name, &source.source_name, on)
                .await
            {
                tracing::warn!(
                    scene = %source.scene_name,
                    source = %source.source_name,
                    visible = on,
                    error = %e,
                    "failed to toggle overlay source"
                );
            }
        }

        if let Some(filter) = &self.filter
            && let Err(e) = self
                .controller
                .set_filter_enabled(&filter.source_name, &filter.filter_name, on)
                .await
        {
            tracing::warn!(
                source = %filter.source_name,
                filter = %filter.filter_name,
                enabled = on,
                error = %e,
                "failed to toggle overlay filter"
            );
        }
    }

    /// Close the controller connection
    pub async fn close(&mut self) {
        self.controller.close().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::Error;

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<String>>>,
        fail_sources: bool,
    }

    #[async_trait]
    impl SceneController for Recorder {
        async fn set_source_visible(&mut self, scene: &str, source: &str, visible: bool) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("source {scene}/{source} {visible}"));
            if self.fail_sources {
                return Err(Error::Overlay("scene not found".to_string()));
            }
            Ok(())
        }

        async fn set_filter_enabled(&mut self, source: &str, filter: &str, enabled: bool) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("filter {source}/{filter} {enabled}"));
            Ok(())
        }

        async fn close(&mut self) {}
    }

    fn source(scene: &str, name: &str) -> SceneSource {
        SceneSource {
            scene_name: scene.to_string(),
            source_name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_show_and_hide_all_cues() {
        let recorder = Recorder::default();
        let mut cues = OverlayCues::new(
            Box::new(recorder.clone()),
            source("Main", "Avatar"),
            Some(source("Main", "Head")),
            Some(SourceFilter {
                enabled: true,
                source_name: "Avatar".to_string(),
                filter_name: "Glow".to_string(),
            }),
        );

        cues.show().await;
        cues.hide().await;

        assert_eq!(
            *recorder.calls.lock().unwrap(),
            vec![
                "source Main/Avatar true",
                "source Main/Head true",
                "filter Avatar/Glow true",
                "source Main/Avatar false",
                "source Main/Head false",
                "filter Avatar/Glow false",
            ]
        );
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_remaining_cues() {
        let recorder = Recorder {
            fail_sources: true,
            ..Recorder::default()
        };
        let mut cues = OverlayCues::new(
            Box::new(recorder.clone()),
            source("Main", "Avatar"),
            None,
            Some(SourceFilter {
                enabled: true,
                source_name: "Avatar".to_string(),
                filter_name: "Glow".to_string(),
            }),
        );

        cues.show().await;

        assert_eq!(recorder.calls.lock().unwrap().len(), 2);
    }
}
