use crate::window::{DialogKind, MessageDialog};
use ai::ModelInfo;
use egui::{Color32, ColorImage, RichText, TextureHandle, TextureOptions};
use file_handler::{FileInfo, ImageFeatures};
use image::{DynamicImage, RgbImage};

/// Largest side of an image shown in the window.
pub const VIEWPORT_SIZE: f32 = 400.0;

pub fn load_texture(ctx: &egui::Context, name: &str, image: &RgbImage) -> TextureHandle {
    let size = [image.width() as usize, image.height() as usize];
    let color_image = ColorImage::from_rgb(size, image.as_raw());
    ctx.load_texture(name, color_image, TextureOptions::LINEAR)
}

/// Shrinks `image` to fit the viewport before it becomes a texture.
pub fn preview_image(image: &DynamicImage) -> RgbImage {
    let max = VIEWPORT_SIZE as u32 * 2;
    if image.width() > max || image.height() > max {
        image.thumbnail(max, max).to_rgb8()
    } else {
        image.to_rgb8()
    }
}

pub fn image_viewport(ui: &mut egui::Ui, texture: Option<&TextureHandle>, placeholder: &str) {
    let size = egui::vec2(VIEWPORT_SIZE, VIEWPORT_SIZE);
    egui::Frame::group(ui.style()).show(ui, |ui| {
        ui.set_min_size(size);
        ui.set_max_size(size);
        ui.centered_and_justified(|ui| match texture {
            Some(texture) => {
                ui.add(
                    egui::Image::new(texture)
                        .max_size(size)
                        .maintain_aspect_ratio(true),
                );
            }
            None => {
                ui.label(RichText::new(placeholder).color(Color32::GRAY));
            }
        });
    });
}

pub fn file_summary(ui: &mut egui::Ui, info: &FileInfo, features: &ImageFeatures) {
    ui.label(
        RichText::new(format!(
            "{} · {} x {} · {:?} MB · {}{}",
            info.name,
            features.width,
            features.height,
            info.size_mb,
            features.color_type,
            if features.has_transparency {
                " · transparency"
            } else {
                ""
            },
        ))
        .small(),
    );
}

pub fn model_info_panel(ui: &mut egui::Ui, info: &ModelInfo) {
    ui.heading("Current Model");
    ui.separator();

    egui::Grid::new("model_info")
        .num_columns(2)
        .striped(true)
        .show(ui, |ui| {
            let load_time = info
                .load_time
                .map(|t| format!("{:.1}s", t))
                .unwrap_or_else(|| "-".to_string());
            let rows = [
                ("Name", info.name.as_str()),
                ("Type", info.description.model_type.as_str()),
                ("Device", info.description.device.as_str()),
                ("Input", info.description.input_type.as_str()),
                ("Output", info.description.output_type.as_str()),
                ("Loaded", if info.loaded { "yes" } else { "no" }),
                ("Load time", load_time.as_str()),
            ];
            for (key, value) in rows {
                ui.label(key);
                ui.label(value);
                ui.end_row();
            }
        });

    ui.add_space(8.0);
    ui.label(&info.description.description);
}

/// Draws `dialog` centred over the window. Returns true once it was acknowledged.
pub fn message_dialog(ctx: &egui::Context, dialog: &MessageDialog) -> bool {
    let mut acknowledged = false;
    let color = match dialog.kind {
        DialogKind::Error => Color32::LIGHT_RED,
        DialogKind::Info => ctx.style().visuals.text_color(),
    };

    egui::Window::new(dialog.title.as_str())
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.label(RichText::new(&dialog.message).color(color));
            ui.add_space(8.0);
            if ui.button("OK").clicked() {
                acknowledged = true;
            }
        });

    acknowledged
}
