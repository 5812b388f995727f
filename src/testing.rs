//! In-memory fakes shared by unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::{DynamicImage, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::killboard::model::parse_timestamp;
use crate::killboard::{FetchError, Item, KillEvent, KillSource};
use crate::notify::{NotificationSink, SinkError};
use crate::render::{IconError, IconSource};

pub fn ts(raw: &str) -> DateTime<Utc> {
    parse_timestamp(raw).expect("valid test timestamp")
}

pub fn item(item_type: &str, count: u32) -> Item {
    Item {
        item_type: item_type.to_string(),
        count,
    }
}

/// A kill with no gear.
pub fn kill(event_id: &str, timestamp: &str) -> KillEvent {
    KillEvent {
        event_id: event_id.to_string(),
        timestamp: ts(timestamp),
        killer_name: "Killer".to_string(),
        victim_name: "Victim".to_string(),
        location: "Somewhere".to_string(),
        victim_equipment: Vec::new(),
        victim_inventory: Vec::new(),
    }
}

/// A kill whose victim carried one item.
pub fn kill_with_item(event_id: &str, timestamp: &str, item_type: &str) -> KillEvent {
    let mut event = kill(event_id, timestamp);
    event.victim_equipment = vec![("MainHand".to_string(), Some(item(item_type, 1)))];
    event
}

pub fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba(rgba));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("encode test png");
    buf
}

/// Kill source answering from a per-player table.
#[derive(Default)]
pub struct FakeKillSource {
    responses: Mutex<HashMap<String, Result<Vec<KillEvent>, FetchError>>>,
    calls: AtomicUsize,
}

impl FakeKillSource {
    pub fn set(&self, player_id: &str, response: Result<Vec<KillEvent>, FetchError>) {
        self.responses
            .lock()
            .unwrap()
            .insert(player_id.to_string(), response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KillSource for FakeKillSource {
    async fn fetch_kills(&self, player_id: &str) -> Result<Vec<KillEvent>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .get(player_id)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SentMessage {
    Text {
        channel_id: String,
        text: String,
    },
    Image {
        channel_id: String,
        filename: String,
        bytes: Vec<u8>,
    },
}

/// Sink that records every successful call; failures can be switched on.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<SentMessage>>,
    fail_text: AtomicBool,
    fail_images: AtomicBool,
}

impl RecordingSink {
    pub fn fail_text(&self, fail: bool) {
        self.fail_text.store(fail, Ordering::SeqCst);
    }

    pub fn fail_images(&self, fail: bool) {
        self.fail_images.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m {
                SentMessage::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn image_count(&self) -> usize {
        self.sent()
            .iter()
            .filter(|m| matches!(m, SentMessage::Image { .. }))
            .count()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send_text(&self, channel_id: &str, text: &str) -> Result<(), SinkError> {
        if self.fail_text.load(Ordering::SeqCst) {
            return Err(SinkError::Transport("connection reset".to_string()));
        }
        self.sent.lock().unwrap().push(SentMessage::Text {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_image(
        &self,
        channel_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<(), SinkError> {
        if self.fail_images.load(Ordering::SeqCst) {
            return Err(SinkError::Status(500));
        }
        self.sent.lock().unwrap().push(SentMessage::Image {
            channel_id: channel_id.to_string(),
            filename: filename.to_string(),
            bytes,
        });
        Ok(())
    }
}

/// Icon source that paints each item a solid colour named by its type.
///
/// `RED`, `GREEN` and `BLUE` map to primaries, `MISSING` fails with 404 and
/// anything else is grey.
pub struct SolidIcons {
    pub size: u32,
}

impl Default for SolidIcons {
    fn default() -> Self {
        Self { size: 64 }
    }
}

#[async_trait]
impl IconSource for SolidIcons {
    async fn fetch_icon(&self, item_type: &str, _size: u32) -> Result<DynamicImage, IconError> {
        let color = match item_type {
            "RED" => [255, 0, 0, 255],
            "GREEN" => [0, 255, 0, 255],
            "BLUE" => [0, 0, 255, 255],
            "MISSING" => return Err(IconError::Status(404)),
            _ => [128, 128, 128, 255],
        };
        Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            self.size,
            self.size,
            Rgba(color),
        )))
    }
}
