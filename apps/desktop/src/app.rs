use crate::{
    models::Processor,
    request::{ProcessingMode, ProcessingResult},
    widgets,
    window::MainWindow,
};
use egui::TextureHandle;
use file_handler::FileDialog;
use strum::IntoEnumIterator;

pub struct ModelStudioApp<D, P> {
    window: MainWindow<D, P>,
    input_texture: Option<TextureHandle>,
    input_revision: u64,
    output_texture: Option<TextureHandle>,
    output_revision: u64,
}

impl<D: FileDialog, P: Processor> ModelStudioApp<D, P> {
    pub fn new(window: MainWindow<D, P>) -> Self {
        Self {
            input_revision: window.input_revision(),
            output_revision: window.output_revision(),
            window,
            input_texture: None,
            output_texture: None,
        }
    }

    fn refresh_textures(&mut self, ctx: &egui::Context) {
        if self.input_revision != self.window.input_revision() {
            self.input_revision = self.window.input_revision();
            self.input_texture = self.window.selected_image().map(|selected| {
                widgets::load_texture(ctx, "input-preview", &widgets::preview_image(&selected.image))
            });
        }

        if self.output_revision != self.window.output_revision() {
            self.output_revision = self.window.output_revision();
            self.output_texture = match self.window.output() {
                Some(ProcessingResult::Image { image, .. }) => {
                    Some(widgets::load_texture(ctx, "output-image", image))
                }
                _ => None,
            };
        }
    }

    fn menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    let open = egui::Button::new("Open Image…");
                    if ui.add_enabled(self.window.can_trigger(), open).clicked() {
                        ui.close_menu();
                        self.window.set_mode(ProcessingMode::ImageToCaption);
                        self.window.browse_image();
                    }
                    let save = egui::Button::new("Save Result…");
                    if ui.add_enabled(self.window.can_save(), save).clicked() {
                        ui.close_menu();
                        self.window.save_result();
                    }
                    ui.separator();
                    if ui.button("Exit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
                ui.menu_button("Help", |ui| {
                    if ui.button("About").clicked() {
                        ui.close_menu();
                        self.window.show_about();
                    }
                });
            });
        });
    }

    fn input_section(&mut self, ui: &mut egui::Ui) {
        let mut mode = self.window.mode();
        ui.add_enabled_ui(self.window.can_trigger(), |ui| {
            egui::ComboBox::from_label("Mode")
                .selected_text(mode.to_string())
                .show_ui(ui, |ui| {
                    for m in ProcessingMode::iter() {
                        ui.selectable_value(&mut mode, m, m.to_string());
                    }
                });
        });
        self.window.set_mode(mode);
        ui.add_space(6.0);

        match mode {
            ProcessingMode::TextToImage => {
                ui.label("Prompt");
                ui.add(
                    egui::TextEdit::multiline(self.window.prompt_mut())
                        .hint_text("Describe the image to generate")
                        .desired_rows(4)
                        .desired_width(f32::INFINITY),
                );
            }
            ProcessingMode::ImageToCaption => {
                ui.horizontal(|ui| {
                    if ui.button("Browse Image…").clicked() {
                        self.window.browse_image();
                    }
                    match self.window.selected_image() {
                        Some(selected) => {
                            ui.label(selected.info.name.as_str());
                        }
                        None => {
                            ui.weak("No image selected");
                        }
                    }
                });
                if let Some(selected) = self.window.selected_image() {
                    widgets::file_summary(ui, &selected.info, &selected.features);
                }
                widgets::image_viewport(ui, self.input_texture.as_ref(), "No image loaded");
                ui.horizontal(|ui| {
                    ui.label("Caption prefix");
                    ui.add(
                        egui::TextEdit::singleline(self.window.caption_prefix_mut())
                            .hint_text("optional, e.g. \"a photography of\""),
                    );
                });
            }
        }
    }

    fn output_section(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let trigger = egui::Button::new(self.window.trigger_label());
            if ui.add_enabled(self.window.can_trigger(), trigger).clicked() {
                self.window.trigger();
            }
            if self.window.is_processing() {
                ui.spinner();
            }
        });
        ui.separator();

        if self.window.mode() == ProcessingMode::TextToImage {
            widgets::image_viewport(ui, self.output_texture.as_ref(), "No image generated");
        }

        let mut text = self.window.output_text();
        ui.add(
            egui::TextEdit::multiline(&mut text)
                .interactive(false)
                .desired_rows(3)
                .desired_width(f32::INFINITY),
        );

        let save = egui::Button::new("Save Result");
        if ui.add_enabled(self.window.can_save(), save).clicked() {
            self.window.save_result();
        }
    }
}

impl<D: FileDialog, P: Processor> eframe::App for ModelStudioApp<D, P> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.window.poll();
        self.refresh_textures(ctx);

        self.menu_bar(ctx);

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.label(self.window.status());
        });

        egui::SidePanel::right("model_info")
            .resizable(false)
            .default_width(260.0)
            .show(ctx, |ui| {
                widgets::model_info_panel(ui, &self.window.model_info());
            });

        let modal_open = self.window.dialog().is_some();
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_enabled_ui(!modal_open, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.input_section(ui);
                    ui.add_space(10.0);
                    self.output_section(ui);
                });
            });
        });

        if let Some(dialog) = self.window.dialog() {
            if widgets::message_dialog(ctx, dialog) {
                self.window.dismiss_dialog();
            }
        }
    }
}
