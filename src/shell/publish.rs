// Publishes UI frames over zenoh for a remote shell to render.
// Nothing is subscribed: the network can watch the robot but never drive it.

use tokio::sync::watch;
use tracing::{info, warn};
use zenoh::pubsub::Publisher;

use crate::config::{TOPIC_DRIVE_STATE, TOPIC_STATUS};
use crate::messages::UiFrame;

pub struct SnapshotPublisher {
    // Keeps the session alive for the publishers
    _session: zenoh::Session,
    drive: Publisher<'static>,
    status: Publisher<'static>,
}

impl SnapshotPublisher {
    pub async fn open() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        info!("Opening Zenoh session...");
        let session = zenoh::open(zenoh::Config::default()).await?;
        let drive = session.declare_publisher(TOPIC_DRIVE_STATE).await?;
        let status = session.declare_publisher(TOPIC_STATUS).await?;
        info!("Publishing to: {}, {}", TOPIC_DRIVE_STATE, TOPIC_STATUS);
        Ok(Self {
            _session: session,
            drive,
            status,
        })
    }

    async fn publish(&self, frame: &UiFrame) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let frame_json = serde_json::to_string(frame)?;
        self.drive.put(frame_json).await?;
        self.status.put(frame.status.to_string()).await?;
        Ok(())
    }

    /// Publish every frame until the runtime goes away
    pub async fn run(self, mut frames: watch::Receiver<UiFrame>) {
        loop {
            let frame = frames.borrow_and_update().clone();
            if let Err(e) = self.publish(&frame).await {
                warn!("Failed to publish frame: {}", e);
            }
            if frames.changed().await.is_err() {
                break;
            }
        }
    }
}
