use ab_glyph::{FontArc, PxScale};
use anyhow::{anyhow, Context, Result};
use futures::future::join_all;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{IconSource, InventorySlotMap, RenderError};

pub const DEFAULT_COLUMNS: u32 = 10;
pub const DEFAULT_ICON_SIZE: u32 = 64;
pub const DEFAULT_PADDING: u32 = 5;
pub const DEFAULT_BACKGROUND: [u8; 3] = [73, 109, 137];
pub const DEFAULT_FONT_SIZE: f32 = 18.0;

/// Distance of the count label from the cell's right and bottom edges.
const LABEL_INSET_X: u32 = 21;
const LABEL_INSET_Y: u32 = 18;

const LABEL_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Geometry of the icon grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub columns: u32,
    pub icon_size: u32,
    pub padding: u32,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS,
            icon_size: DEFAULT_ICON_SIZE,
            padding: DEFAULT_PADDING,
        }
    }
}

impl GridLayout {
    fn stride(&self) -> u32 {
        self.icon_size + self.padding
    }

    fn columns(&self) -> usize {
        self.columns.max(1) as usize
    }

    /// Canvas size for `cells` placed icons.
    ///
    /// Padding sits only between cells. Fewer icons than a full row shrink the
    /// width; zero icons still yield one cell.
    pub fn dimensions(&self, cells: usize) -> (u32, u32) {
        let cells = cells.max(1);
        let used_columns = cells.min(self.columns()) as u32;
        let rows = cells.div_ceil(self.columns()) as u32;
        (
            used_columns * self.stride() - self.padding,
            rows * self.stride() - self.padding,
        )
    }

    /// Top-left pixel of the cell at `index`, filled left-to-right, top-to-bottom.
    pub fn cell_origin(&self, index: usize) -> (u32, u32) {
        let column = (index % self.columns()) as u32;
        let row = (index / self.columns()) as u32;
        (column * self.stride(), row * self.stride())
    }
}

/// Overlay text for a stack, or `None` for single items.
pub fn count_label(count: u32) -> Option<String> {
    (count > 1).then(|| count.to_string())
}

/// Loads the font used for stack counts.
pub fn load_font(path: &Path) -> Result<FontArc> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read font file {}", path.display()))?;
    FontArc::try_from_vec(bytes).map_err(|e| anyhow!("Invalid font file {}: {}", path.display(), e))
}

/// Renders an [`InventorySlotMap`] as a PNG grid of item icons.
pub struct GridComposer {
    icons: Arc<dyn IconSource>,
    layout: GridLayout,
    background: Rgba<u8>,
    font: Option<FontArc>,
    font_size: f32,
}

impl GridComposer {
    pub fn new(icons: Arc<dyn IconSource>, layout: GridLayout) -> Self {
        let [r, g, b] = DEFAULT_BACKGROUND;
        Self {
            icons,
            layout,
            background: Rgba([r, g, b, 255]),
            font: None,
            font_size: DEFAULT_FONT_SIZE,
        }
    }

    pub fn with_background(mut self, [r, g, b]: [u8; 3]) -> Self {
        self.background = Rgba([r, g, b, 255]);
        self
    }

    /// Enables count labels. Without a font, stacks are drawn unlabelled.
    pub fn with_font(mut self, font: FontArc, font_size: f32) -> Self {
        self.font = Some(font);
        self.font_size = font_size;
        self
    }

    /// Fetches icons for every present item, in slot order.
    ///
    /// Fetches run concurrently. Slots whose icon could not be fetched are
    /// dropped, so later icons move up into the freed cell.
    pub async fn fetch_icons(&self, slots: &InventorySlotMap) -> Vec<(RgbaImage, u32)> {
        let size = self.layout.icon_size;
        let fetches = slots.items().map(|(slot, item)| async move {
            let result = self.icons.fetch_icon(&item.item_type, size).await;
            (slot, item, result)
        });

        let mut placed = Vec::new();
        for (slot, item, result) in join_all(fetches).await {
            match result {
                Ok(icon) => placed.push((fit_icon(icon, size), item.count)),
                Err(e) => warn!(
                    slot = %slot,
                    item_type = %item.item_type,
                    error = %e,
                    "Skipping item icon"
                ),
            }
        }
        placed
    }

    /// Draws already-fetched icons onto a fresh canvas.
    pub fn draw(&self, placed: &[(RgbaImage, u32)]) -> RgbaImage {
        let (width, height) = self.layout.dimensions(placed.len());
        let mut canvas = RgbaImage::from_pixel(width, height, self.background);

        for (index, (icon, count)) in placed.iter().enumerate() {
            let (x, y) = self.layout.cell_origin(index);
            imageops::overlay(&mut canvas, icon, i64::from(x), i64::from(y));

            if let (Some(font), Some(label)) = (&self.font, count_label(*count)) {
                let size = self.layout.icon_size;
                draw_text_mut(
                    &mut canvas,
                    LABEL_COLOR,
                    (x + size.saturating_sub(LABEL_INSET_X)) as i32,
                    (y + size.saturating_sub(LABEL_INSET_Y)) as i32,
                    PxScale::from(self.font_size),
                    font,
                    &label,
                );
            }
        }
        canvas
    }

    /// Fetches, lays out and PNG-encodes the present items of `slots`.
    pub async fn compose(&self, slots: &InventorySlotMap) -> Result<Vec<u8>, RenderError> {
        let placed = self.fetch_icons(slots).await;
        debug!(
            requested = slots.item_count(),
            placed = placed.len(),
            "Composing inventory grid"
        );

        let canvas = DynamicImage::ImageRgba8(self.draw(&placed)).to_rgb8();
        let mut buffer = Vec::new();
        canvas
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| RenderError::Encode(e.to_string()))?;
        Ok(buffer)
    }
}

fn fit_icon(icon: DynamicImage, size: u32) -> RgbaImage {
    let rgba = icon.to_rgba8();
    if rgba.width() == size && rgba.height() == size {
        rgba
    } else {
        imageops::resize(&rgba, size, size, FilterType::Triangle)
    }
}
